//! Flight log models.
//!
//! `FlightRecord` and the create/delete bodies mirror the backend's wire
//! format. `Flight` is the domain type the rest of the crate works with.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Departure dates are exchanged as plain calendar days.
pub const DEPARTURE_DATE_FORMAT: &str = "%Y-%m-%d";

/// Latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

/// A logged flight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flight {
    pub flight_id: String,
    pub airline_code: String,
    pub departure_code: String,
    pub arrival_code: String,
    pub departure_coords: Coordinates,
    pub arrival_coords: Coordinates,
    /// `yyyy-MM-dd` as sent by the backend
    pub departure_date: String,
    pub duration_hours: f64,
}

impl Flight {
    /// Parse the departure date, `None` if the backend sent something unexpected.
    pub fn departure_day(&self) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(&self.departure_date, DEPARTURE_DATE_FORMAT).ok()
    }

    /// Short route label, e.g. `CDG -> JFK`.
    pub fn route(&self) -> String {
        format!("{} -> {}", self.departure_code, self.arrival_code)
    }
}

/// Sort flights by departure date, most recent first.
///
/// The sort is stable; flights whose date cannot be parsed go last.
pub fn sort_latest_first(flights: &mut [Flight]) {
    flights.sort_by(|a, b| b.departure_day().cmp(&a.departure_day()));
}

// ===== Wire types =====

#[derive(Debug, Clone, Serialize)]
pub struct GetFlightsRequest<'a> {
    #[serde(rename = "sessionToken")]
    pub session_token: &'a str,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FlightsResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub flights: Vec<FlightRecord>,
}

/// Flight as returned by `getFlights`.
#[derive(Debug, Clone, Deserialize)]
pub struct FlightRecord {
    #[serde(rename = "flightId", deserialize_with = "deserialize_string_or_number")]
    pub flight_id: String,
    #[serde(rename = "airlineCode")]
    pub airline_code: String,
    #[serde(rename = "departureCode")]
    pub departure_code: String,
    #[serde(rename = "arrivalCode")]
    pub arrival_code: String,
    #[serde(rename = "departureAirportLat", default)]
    pub departure_airport_lat: f64,
    #[serde(rename = "departureAirportLon", default)]
    pub departure_airport_lon: f64,
    #[serde(rename = "arrivalAirportLat", default)]
    pub arrival_airport_lat: f64,
    #[serde(rename = "arrivalAirportLon", default)]
    pub arrival_airport_lon: f64,
    #[serde(rename = "departureDate")]
    pub departure_date: String,
    #[serde(default)]
    pub duration: f64,
}

impl FlightRecord {
    pub fn to_flight(&self) -> Flight {
        Flight {
            flight_id: self.flight_id.clone(),
            airline_code: self.airline_code.clone(),
            departure_code: self.departure_code.clone(),
            arrival_code: self.arrival_code.clone(),
            departure_coords: Coordinates {
                lat: self.departure_airport_lat,
                lon: self.departure_airport_lon,
            },
            arrival_coords: Coordinates {
                lat: self.arrival_airport_lat,
                lon: self.arrival_airport_lon,
            },
            departure_date: self.departure_date.clone(),
            duration_hours: self.duration,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateFlightRequest<'a> {
    #[serde(rename = "sessionToken")]
    pub session_token: &'a str,
    #[serde(rename = "airlineCode")]
    pub airline_code: &'a str,
    #[serde(rename = "departureCode")]
    pub departure_code: &'a str,
    #[serde(rename = "arrivalCode")]
    pub arrival_code: &'a str,
    #[serde(rename = "departureDate")]
    pub departure_date: &'a str,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FlightPositions {
    #[serde(default)]
    pub departure: Coordinates,
    #[serde(default)]
    pub arrival: Coordinates,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateFlightResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: String,
    #[serde(rename = "flightId", default, deserialize_with = "deserialize_string_or_number")]
    pub flight_id: String,
    #[serde(default)]
    pub duration: f64,
    #[serde(default)]
    pub positions: FlightPositions,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeleteFlightRequest<'a> {
    #[serde(rename = "sessionToken")]
    pub session_token: &'a str,
    #[serde(rename = "flightId")]
    pub flight_id: &'a str,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeleteFlightResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: String,
}

// The backend has sent flight ids both as numbers and as strings
fn deserialize_string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de;

    struct StringOrNumberVisitor;

    impl<'de> de::Visitor<'de> for StringOrNumberVisitor {
        type Value = String;

        fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
            formatter.write_str("a string or number")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E> {
            Ok(v.to_string())
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E> {
            Ok(v.to_string())
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E> {
            Ok(v.to_string())
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E> {
            Ok(String::new())
        }
    }

    deserializer.deserialize_any(StringOrNumberVisitor)
}

// ===== Input =====

#[derive(Error, Debug, PartialEq, Eq)]
pub enum FlightInputError {
    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("Departure and arrival airport codes cannot be the same")]
    SameAirport,

    #[error("Invalid departure date: {0}")]
    InvalidDate(String),
}

/// A flight the user wants to log. The backend resolves coordinates and duration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewFlight {
    pub airline_code: String,
    pub departure_code: String,
    pub arrival_code: String,
    pub departure_date: String,
}

impl NewFlight {
    pub fn validate(&self) -> Result<(), FlightInputError> {
        let fields = [
            ("airline", &self.airline_code),
            ("departure airport", &self.departure_code),
            ("arrival airport", &self.arrival_code),
            ("departure date", &self.departure_date),
        ];
        for (name, value) in fields {
            if value.trim().is_empty() {
                return Err(FlightInputError::MissingField(name));
            }
        }
        if self.departure_code.eq_ignore_ascii_case(&self.arrival_code) {
            return Err(FlightInputError::SameAirport);
        }
        if NaiveDate::parse_from_str(&self.departure_date, DEPARTURE_DATE_FORMAT).is_err() {
            return Err(FlightInputError::InvalidDate(self.departure_date.clone()));
        }
        Ok(())
    }

    /// Build the domain flight from the backend's creation reply.
    pub fn into_flight(self, created: CreateFlightResponse) -> Flight {
        Flight {
            flight_id: created.flight_id,
            airline_code: self.airline_code,
            departure_code: self.departure_code,
            arrival_code: self.arrival_code,
            departure_coords: created.positions.departure,
            arrival_coords: created.positions.arrival,
            departure_date: self.departure_date,
            duration_hours: created.duration,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn flight(id: &str, date: &str) -> Flight {
        Flight {
            flight_id: id.to_string(),
            airline_code: "AFR".to_string(),
            departure_code: "CDG".to_string(),
            arrival_code: "JFK".to_string(),
            departure_coords: Coordinates::default(),
            arrival_coords: Coordinates::default(),
            departure_date: date.to_string(),
            duration_hours: 8.0,
        }
    }

    #[test]
    fn test_sort_latest_first() {
        let mut flights = vec![
            flight("1", "2024-01-05"),
            flight("2", "not a date"),
            flight("3", "2025-03-01"),
            flight("4", "2024-01-05"),
        ];
        sort_latest_first(&mut flights);
        let ids: Vec<&str> = flights.iter().map(|f| f.flight_id.as_str()).collect();
        assert_eq!(ids, vec!["3", "1", "4", "2"]);
    }

    #[test]
    fn test_parse_flight_record_numeric_id() {
        let json = r#"{"flightId": 42, "airlineCode": "AFR", "departureCode": "CDG",
            "arrivalCode": "JFK", "departureAirportLat": 49.0097, "departureAirportLon": 2.5479,
            "arrivalAirportLat": 40.6413, "arrivalAirportLon": -73.7781,
            "departureDate": "2025-06-01", "duration": 8.5}"#;
        let record: FlightRecord = serde_json::from_str(json).expect("valid flight record");
        let flight = record.to_flight();
        assert_eq!(flight.flight_id, "42");
        assert_eq!(flight.route(), "CDG -> JFK");
        assert_eq!(flight.arrival_coords.lon, -73.7781);
        assert_eq!(flight.departure_day(), NaiveDate::from_ymd_opt(2025, 6, 1));
    }

    #[test]
    fn test_parse_flight_record_string_id() {
        let json = r#"{"flightId": "f-7", "airlineCode": "DLH", "departureCode": "FRA",
            "arrivalCode": "MUC", "departureDate": "2025-06-02"}"#;
        let record: FlightRecord = serde_json::from_str(json).expect("valid flight record");
        assert_eq!(record.flight_id, "f-7");
        assert_eq!(record.duration, 0.0);
    }

    #[test]
    fn test_new_flight_validation() {
        let mut input = NewFlight {
            airline_code: "AFR".to_string(),
            departure_code: "CDG".to_string(),
            arrival_code: "JFK".to_string(),
            departure_date: "2025-06-01".to_string(),
        };
        assert_eq!(input.validate(), Ok(()));

        input.arrival_code = "cdg".to_string();
        assert_eq!(input.validate(), Err(FlightInputError::SameAirport));

        input.arrival_code = " ".to_string();
        assert_eq!(
            input.validate(),
            Err(FlightInputError::MissingField("arrival airport"))
        );

        input.arrival_code = "JFK".to_string();
        input.departure_date = "01/06/2025".to_string();
        assert!(matches!(input.validate(), Err(FlightInputError::InvalidDate(_))));
    }

    #[test]
    fn test_into_flight_uses_backend_positions() {
        let input = NewFlight {
            airline_code: "AFR".to_string(),
            departure_code: "CDG".to_string(),
            arrival_code: "JFK".to_string(),
            departure_date: "2025-06-01".to_string(),
        };
        let created: CreateFlightResponse = serde_json::from_str(
            r#"{"success": true, "flightId": 9, "duration": 8.25,
                "positions": {"departure": {"lat": 49.0, "lon": 2.5},
                              "arrival": {"lat": 40.6, "lon": -73.8}}}"#,
        )
        .expect("valid create response");
        let flight = input.into_flight(created);
        assert_eq!(flight.flight_id, "9");
        assert_eq!(flight.duration_hours, 8.25);
        assert_eq!(flight.departure_coords, Coordinates { lat: 49.0, lon: 2.5 });
    }
}
