//! # Herald Core
//!
//! Shared foundation for the Herald workspace: configuration, the error
//! type, common data types, and the traits that sit at the boundaries to
//! the spreadsheet store, the mail transport, and the template store.

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use config::HeraldConfig;
pub use error::{HeraldError, Result};
pub use traits::{MailTransport, SheetStore, TemplateStore};
pub use types::{Attachment, Grid, OutgoingEmail, RangeUpdate};
