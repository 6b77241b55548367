//! # Herald Sheets
//!
//! Client for the tracker's spreadsheet store: one batched range read and
//! one batched range write per poll cycle, authenticated by a
//! service-account key. The access token is an explicitly-owned cached
//! resource with a defined re-initialization path on 401 — no hidden
//! singletons.

pub mod auth;
pub mod client;

pub use auth::{ServiceAccountKey, TokenProvider};
pub use client::SheetsClient;
