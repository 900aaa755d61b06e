//! Background machinery behind the HTTP surface and the CLI.
//!
//! - [`drafts`]: the bulk draft generation engine
//! - [`cancel`]: the registry that lets a running operation be cancelled by id

pub mod cancel;
pub mod drafts;

pub use cancel::{OperationLease, OperationRegistry};
pub use drafts::{start_operation, DraftEvent, DraftJob};
