pub mod config;
pub mod drafts;
pub mod error;
pub mod trace;
