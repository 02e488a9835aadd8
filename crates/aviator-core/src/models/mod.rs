//! Data models for Aviator entities.
//!
//! This module contains the request/response bodies exchanged with the
//! backend and the domain types built from them:
//!
//! - Session types: `LoginRequest`, `LoginResponse`, `SessionRequest`, `SessionResponse`
//! - Registration types: OTP, email check and account creation bodies
//! - `Flight`, `NewFlight`: logged flights and flight input
//! - `Airline`, `Airport`: search results

pub mod auth;
pub mod flight;
pub mod registration;
pub mod search;

pub use auth::{LoginRequest, LoginResponse, SessionRequest, SessionResponse};
pub use flight::{
    sort_latest_first, Coordinates, CreateFlightRequest, CreateFlightResponse,
    DeleteFlightRequest, DeleteFlightResponse, Flight, FlightInputError, FlightRecord,
    FlightsResponse, GetFlightsRequest, NewFlight,
};
pub use registration::{
    EmailExistsRequest, EmailExistsResponse, OtpRequest, OtpResponse, RegisterRequest,
    RegisterResponse,
};
pub use search::{Airline, AirlinesResponse, Airport, AirportsResponse, SearchRequest};
