//! REST API client module for the Aviator backend.
//!
//! This module provides the `ApiClient` for the session, registration,
//! flight and airline/airport search endpoints.
//!
//! Authenticated endpoints take the session token in the JSON body rather
//! than in a header.

pub mod client;
pub mod error;

pub use client::ApiClient;
pub use error::ApiError;
