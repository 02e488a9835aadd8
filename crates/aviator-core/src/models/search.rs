//! Airline and airport search types.

use serde::{Deserialize, Serialize};

/// Result count used when the caller does not ask for a specific limit.
pub const DEFAULT_SEARCH_LIMIT: u32 = 10;

/// Body shared by the airline and airport search endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct SearchRequest<'a> {
    #[serde(rename = "sessionToken")]
    pub session_token: &'a str,
    pub query: &'a str,
    pub limit: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Airline {
    pub name: String,
    /// ICAO code
    pub code: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Airport {
    pub name: String,
    pub code: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AirlinesResponse {
    #[serde(default)]
    pub airlines: Vec<Airline>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AirportsResponse {
    #[serde(default)]
    pub airports: Vec<Airport>,
}
