//! Boundary traits for Herald's external collaborators.
//!
//! The engine only ever talks to these traits; the real clients live in
//! `herald-sheets` and `herald-mail`, and tests substitute in-memory fakes.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{Grid, OutgoingEmail, RangeUpdate};

/// Tabular store supporting range reads and batched range writes.
#[async_trait]
pub trait SheetStore: Send + Sync {
    /// Fetch the identity and state ranges in one round trip.
    /// Both grids include their header row.
    async fn fetch_ranges(&self, identity_range: &str, state_range: &str) -> Result<(Grid, Grid)>;

    /// Apply all staged updates in a single batched write.
    async fn batch_update(&self, updates: Vec<RangeUpdate>) -> Result<()>;
}

/// Mail delivery service. Returns a transport-assigned delivery id.
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, email: &OutgoingEmail) -> Result<String>;
}

/// Key-value lookup from template name to HTML content.
#[async_trait]
pub trait TemplateStore: Send + Sync {
    /// Fetch a template by name. `HeraldError::Template` when not found.
    async fn lookup(&self, name: &str) -> Result<String>;
}
