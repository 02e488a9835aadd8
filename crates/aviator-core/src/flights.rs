//! In-memory flight log for the signed-in user.
//!
//! The log is refreshed from the backend as a whole. Deletions are applied
//! locally first and then sent; a failed remote delete is reported but the
//! local removal stands, matching what the user already saw disappear.

use anyhow::Result;
use tracing::{debug, warn};

use crate::api::ApiClient;
use crate::models::{sort_latest_first, Flight, NewFlight};

#[derive(Debug, Default)]
pub struct FlightLog {
    flights: Vec<Flight>,
}

impl FlightLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn flights(&self) -> &[Flight] {
        &self.flights
    }

    pub fn len(&self) -> usize {
        self.flights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flights.is_empty()
    }

    pub fn get(&self, flight_id: &str) -> Option<&Flight> {
        self.flights.iter().find(|f| f.flight_id == flight_id)
    }

    /// Flights ordered most recent first
    pub fn sorted(&self) -> Vec<Flight> {
        let mut flights = self.flights.clone();
        sort_latest_first(&mut flights);
        flights
    }

    /// Replace the log with the backend's list. On failure the current
    /// contents are kept.
    pub async fn refresh(&mut self, api: &ApiClient, session_token: &str) -> Result<()> {
        match api.fetch_flights(session_token).await {
            Ok(flights) => {
                self.flights = flights;
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Error loading flights");
                Err(e)
            }
        }
    }

    /// Validate and log a new flight, appending the backend's version of it.
    pub async fn record(
        &mut self,
        api: &ApiClient,
        session_token: &str,
        input: NewFlight,
    ) -> Result<&Flight> {
        input.validate()?;
        let flight = api.create_flight(session_token, input).await?;
        debug!(flight_id = %flight.flight_id, "Recorded flight");
        self.flights.push(flight);
        Ok(&self.flights[self.flights.len() - 1])
    }

    /// Remove a flight locally, then delete it on the backend.
    ///
    /// Returns `Ok(false)` if the flight was not in the log.
    pub async fn remove(
        &mut self,
        api: &ApiClient,
        session_token: &str,
        flight_id: &str,
    ) -> Result<bool> {
        let before = self.flights.len();
        self.flights.retain(|f| f.flight_id != flight_id);
        if self.flights.len() == before {
            return Ok(false);
        }

        if let Err(e) = api.delete_flight(session_token, flight_id).await {
            warn!(flight_id = flight_id, error = %e, "Failed to delete flight");
            return Err(e);
        }
        Ok(true)
    }
}
