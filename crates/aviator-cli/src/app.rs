//! Application context for the command line client.
//!
//! `App` owns the configuration, the API client and the single
//! `SessionController` for this process. Commands borrow it; nothing is global.

use std::io::{self, Write};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use tracing::{debug, info};

use aviator_core::auth::{EncryptedTokenStore, KeyringKeySource, TokenStore};
use aviator_core::models::NewFlight;
use aviator_core::{ApiClient, AuthState, Config, FlightLog, SessionController};

pub struct App {
    config: Config,
    session: SessionController,
}

impl App {
    pub fn new(config: Config) -> Result<Self> {
        let api = ApiClient::new(&config.base_url, config.request_timeout())?;
        let data_dir = config.data_dir()?;
        let store: Arc<dyn TokenStore> =
            Arc::new(EncryptedTokenStore::new(&data_dir, KeyringKeySource::new()));
        debug!(base_url = %api.base_url(), data_dir = %data_dir.display(), "App configured");

        let session = SessionController::new(api, store, config.post_login);
        Ok(Self { config, session })
    }

    fn api(&self) -> &ApiClient {
        self.session.api()
    }

    /// Restore the stored session, if any.
    pub async fn start(&self) -> AuthState {
        self.session.start().await
    }

    /// Session token, or an error telling the user to log in.
    fn require_session(&self) -> Result<String> {
        self.session
            .session_token()
            .ok_or_else(|| anyhow!("Not logged in. Run `aviator login` first."))
    }

    // ===== Account =====

    pub fn status(&self) {
        let state = self.session.state();
        println!("Server: {}", self.config.base_url);
        println!("Session: {}", state);
    }

    pub async fn login(&self, email: Option<String>) -> Result<()> {
        let email = match email {
            Some(email) => email,
            None => prompt("Email: ")?,
        };
        let password = rpassword::prompt_password("Password: ")?;

        println!("\nAuthenticating...");
        match self.session.login(&email, &password).await {
            AuthState::Authenticated { .. } => {
                println!("Login successful!");
                Ok(())
            }
            _ => bail!("Login failed. Check your email and password."),
        }
    }

    pub fn logout(&self) {
        self.session.logout();
        println!("Logged out.");
    }

    pub async fn register(&self, email: &str) -> Result<()> {
        if self
            .api()
            .email_exists(email)
            .await
            .context("Failed to check email")?
        {
            bail!("An account already exists for {}", email);
        }

        let message = self
            .api()
            .generate_otp(email)
            .await
            .context("Failed to send verification code")?;
        println!("{}", message);

        let otp = prompt("Verification code: ")?;
        let password = rpassword::prompt_password("Choose a password: ")?;
        let message = self
            .api()
            .create_user(email, &password, &otp)
            .await
            .context("Failed to create account")?;
        info!(email = email, "Account creation requested");
        println!("{}", message);
        Ok(())
    }

    // ===== Flights =====

    pub async fn list_flights(&self) -> Result<()> {
        let token = self.require_session()?;
        let mut log = FlightLog::new();
        log.refresh(self.api(), &token).await?;

        if log.is_empty() {
            println!("No flights yet, go ahead and add one!");
            return Ok(());
        }
        for flight in log.sorted() {
            println!(
                "{:<10} {:<4} {:<12} {:>5.1}h  [{}]",
                flight.departure_date,
                flight.airline_code,
                flight.route(),
                flight.duration_hours,
                flight.flight_id
            );
        }
        Ok(())
    }

    pub async fn add_flight(&self, input: NewFlight) -> Result<()> {
        let token = self.require_session()?;
        let mut log = FlightLog::new();
        let flight = log.record(self.api(), &token, input).await?;
        println!(
            "Logged {} on {} ({:.1}h) [{}]",
            flight.route(),
            flight.departure_date,
            flight.duration_hours,
            flight.flight_id
        );
        Ok(())
    }

    pub async fn delete_flight(&self, flight_id: &str) -> Result<()> {
        let token = self.require_session()?;
        let mut log = FlightLog::new();
        log.refresh(self.api(), &token).await?;

        if !log.remove(self.api(), &token, flight_id).await? {
            bail!("No flight with id {}", flight_id);
        }
        println!("Deleted flight {}", flight_id);
        Ok(())
    }

    // ===== Search =====

    pub async fn search_airlines(&self, query: &str, limit: u32) -> Result<()> {
        let token = self.require_session()?;
        for airline in self.api().search_airlines(&token, query, limit).await? {
            println!("{:<6} {}", airline.code, airline.name);
        }
        Ok(())
    }

    pub async fn search_airports(&self, query: &str, limit: u32) -> Result<()> {
        let token = self.require_session()?;
        for airport in self.api().search_airports(&token, query, limit).await? {
            println!("{:<6} {}", airport.code, airport.name);
        }
        Ok(())
    }
}

fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}
