//! ThingBook API integration module
//!
//! This module provides the HTTP client and types for interacting with a
//! ThingBook API instance. The [`RemoteApi`] trait abstracts the transport so
//! the loading engine can be exercised against an in-memory server in tests.

/// REST client for a ThingBook instance
mod client;
/// Type definitions for API records and errors
mod types;

pub use client::{RemoteApi, SEARCH_PAGE_SIZE, ThingBookClient};
pub use types::*;
