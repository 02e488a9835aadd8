//! Core library for the Aviator flight log client.
//!
//! This crate provides:
//! - `api`: REST client for the Aviator backend
//! - `auth`: encrypted refresh-token storage and the session state machine
//! - `config`: client configuration
//! - `flights`: the in-memory flight log
//! - `models`: wire and domain types

pub mod api;
pub mod auth;
pub mod config;
pub mod flights;
pub mod models;

pub use api::{ApiClient, ApiError};
pub use auth::{AuthState, PostLoginSession, SessionController};
pub use config::Config;
pub use flights::FlightLog;
