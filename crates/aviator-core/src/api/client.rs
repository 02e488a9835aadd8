//! API client for communicating with the Aviator REST backend.
//!
//! Every endpoint is a JSON `POST`. Calls are issued exactly once: there is
//! no retry or backoff, and the request timeout is only set when configured.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;
use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;

use crate::models::{
    Airline, AirlinesResponse, Airport, AirportsResponse, CreateFlightRequest,
    CreateFlightResponse, DeleteFlightRequest, DeleteFlightResponse, EmailExistsRequest,
    EmailExistsResponse, Flight, FlightsResponse, GetFlightsRequest, LoginRequest, LoginResponse,
    NewFlight, OtpRequest, OtpResponse, RegisterRequest, RegisterResponse, SearchRequest,
    SessionRequest, SessionResponse,
};

use super::ApiError;

// ============================================================================
// Endpoints
// ============================================================================

const REFRESH_TOKEN_PATH: &str = "/api/sessions/getRefreshToken";
const SESSION_PATH: &str = "/api/sessions/login";
const OTP_PATH: &str = "/api/otp/generate";
const CHECK_EMAIL_PATH: &str = "/api/users/checkEmail";
const CREATE_USER_PATH: &str = "/api/users/createUser";
const GET_FLIGHTS_PATH: &str = "/api/flights/getFlights";
const CREATE_FLIGHT_PATH: &str = "/api/flights/createFlight";
const DELETE_FLIGHT_PATH: &str = "/api/flights/deleteFlight";
const AIRLINES_PATH: &str = "/api/airlines/getAirlines";
const AIRPORTS_PATH: &str = "/api/airports/getAirports";

/// API client for the Aviator backend.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    /// Create a new API client rooted at `base_url`.
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body).into())
        }
    }

    async fn post<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T> {
        let url = self.url(path);
        debug!(path = path, "POST");

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(ApiError::from)
            .with_context(|| format!("Failed to send POST request to {}", path))?;

        let response = Self::check_response(response).await?;

        let body = response
            .text()
            .await
            .map_err(ApiError::from)
            .with_context(|| format!("Failed to read response body from {}", path))?;

        // A 2xx answer the backend got wrong is not a transport failure
        serde_json::from_str(&body)
            .map_err(|e| ApiError::InvalidResponse(e.to_string()))
            .with_context(|| format!("Failed to parse JSON response from {}", path))
    }

    // ===== Sessions =====

    /// Exchange email and password for a long-lived refresh token.
    ///
    /// The backend reports refused credentials with an empty token rather than
    /// an error status, so callers must inspect `token`.
    pub async fn get_refresh_token(&self, email: &str, password: &str) -> Result<LoginResponse> {
        self.post(REFRESH_TOKEN_PATH, &LoginRequest { email, password })
            .await
    }

    /// Exchange a refresh token for a session token.
    pub async fn exchange_session(&self, refresh_token: &str) -> Result<String> {
        let resp: SessionResponse = self
            .post(SESSION_PATH, &SessionRequest { refresh_token })
            .await?;

        if !resp.success || resp.token.is_empty() {
            return Err(ApiError::Rejected(resp.message).into());
        }
        Ok(resp.token)
    }

    // ===== Registration =====

    /// Ask the backend to email a one-time passcode. Returns the server message.
    pub async fn generate_otp(&self, email: &str) -> Result<String> {
        let resp: OtpResponse = self.post(OTP_PATH, &OtpRequest { email }).await?;
        Ok(resp.message)
    }

    pub async fn email_exists(&self, email: &str) -> Result<bool> {
        let resp: EmailExistsResponse = self
            .post(CHECK_EMAIL_PATH, &EmailExistsRequest { email })
            .await?;
        Ok(resp.exists)
    }

    /// Create an account using the passcode from `generate_otp`. Returns the server message.
    pub async fn create_user(&self, email: &str, password: &str, otp: &str) -> Result<String> {
        let resp: RegisterResponse = self
            .post(CREATE_USER_PATH, &RegisterRequest { email, password, otp })
            .await?;
        Ok(resp.message)
    }

    // ===== Flights =====

    /// Fetch every flight logged by the session's user
    pub async fn fetch_flights(&self, session_token: &str) -> Result<Vec<Flight>> {
        let resp: FlightsResponse = self
            .post(GET_FLIGHTS_PATH, &GetFlightsRequest { session_token })
            .await?;

        if !resp.success {
            return Err(ApiError::Rejected(resp.message).into());
        }
        debug!(count = resp.flights.len(), "Fetched flights");
        Ok(resp.flights.iter().map(|r| r.to_flight()).collect())
    }

    /// Log a new flight. The backend fills in airport positions and duration.
    pub async fn create_flight(&self, session_token: &str, input: NewFlight) -> Result<Flight> {
        let body = CreateFlightRequest {
            session_token,
            airline_code: &input.airline_code,
            departure_code: &input.departure_code,
            arrival_code: &input.arrival_code,
            departure_date: &input.departure_date,
        };
        let resp: CreateFlightResponse = self.post(CREATE_FLIGHT_PATH, &body).await?;

        if !resp.success {
            return Err(ApiError::Rejected(resp.message).into());
        }
        Ok(input.into_flight(resp))
    }

    pub async fn delete_flight(&self, session_token: &str, flight_id: &str) -> Result<()> {
        let resp: DeleteFlightResponse = self
            .post(
                DELETE_FLIGHT_PATH,
                &DeleteFlightRequest {
                    session_token,
                    flight_id,
                },
            )
            .await?;

        if !resp.success {
            return Err(ApiError::Rejected(resp.message).into());
        }
        Ok(())
    }

    // ===== Search =====

    pub async fn search_airlines(
        &self,
        session_token: &str,
        query: &str,
        limit: u32,
    ) -> Result<Vec<Airline>> {
        let resp: AirlinesResponse = self
            .post(
                AIRLINES_PATH,
                &SearchRequest {
                    session_token,
                    query,
                    limit,
                },
            )
            .await?;
        Ok(resp.airlines)
    }

    pub async fn search_airports(
        &self,
        session_token: &str,
        query: &str,
        limit: u32,
    ) -> Result<Vec<Airport>> {
        let resp: AirportsResponse = self
            .post(
                AIRPORTS_PATH,
                &SearchRequest {
                    session_token,
                    query,
                    limit,
                },
            )
            .await?;
        Ok(resp.airports)
    }
}
