//! Aviator - command line client for the Aviator flight log.
//!
//! Log in once; the refresh token is kept encrypted on disk and exchanged for
//! a session token on every run.

mod app;

use std::io;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use aviator_core::models::{search::DEFAULT_SEARCH_LIMIT, NewFlight};
use aviator_core::Config;

use app::App;

#[derive(Parser)]
#[command(name = "aviator", version, about = "Log and browse your flights")]
struct Cli {
    /// Backend base URL (overrides the config file and AVIATOR_BASE_URL)
    #[arg(long, global = true)]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show the server and session state
    Status,
    /// Log in with email and password
    Login {
        #[arg(long)]
        email: Option<String>,
    },
    /// Forget the stored credential
    Logout,
    /// Create an account (email verification code required)
    Register {
        #[arg(long)]
        email: String,
    },
    /// Manage logged flights
    #[command(subcommand)]
    Flights(FlightsCommand),
    /// Search airlines or airports
    #[command(subcommand)]
    Search(SearchCommand),
}

#[derive(Subcommand)]
enum FlightsCommand {
    /// List flights, most recent first
    List,
    /// Log a new flight
    Add {
        /// Airline ICAO code
        #[arg(long)]
        airline: String,
        /// Departure airport code
        #[arg(long)]
        from: String,
        /// Arrival airport code
        #[arg(long)]
        to: String,
        /// Departure date (YYYY-MM-DD)
        #[arg(long)]
        date: String,
    },
    /// Delete a flight by id
    Delete { flight_id: String },
}

#[derive(Subcommand)]
enum SearchCommand {
    Airlines {
        #[arg(default_value = "")]
        query: String,
        #[arg(long, default_value_t = DEFAULT_SEARCH_LIMIT)]
        limit: u32,
    },
    Airports {
        #[arg(default_value = "")]
        query: String,
        #[arg(long, default_value_t = DEFAULT_SEARCH_LIMIT)]
        limit: u32,
    },
}

/// Initialize the tracing subscriber for logging
fn init_tracing() -> WorkerGuard {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let (writer, guard) = tracing_appender::non_blocking(io::stderr());

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(writer))
        .with(filter)
        .init();
    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let _log_guard = init_tracing();

    let mut config = Config::load()?;
    config.override_base_url(cli.base_url);
    let app = App::new(config)?;
    info!("Aviator starting");

    match cli.command {
        Command::Login { email } => app.login(email).await,
        Command::Logout => {
            app.logout();
            Ok(())
        }
        Command::Register { email } => app.register(&email).await,
        command => {
            app.start().await;
            run_session_command(&app, command).await
        }
    }
}

/// Commands that need the restored session
async fn run_session_command(app: &App, command: Command) -> Result<()> {
    match command {
        Command::Status => {
            app.status();
            Ok(())
        }
        Command::Flights(FlightsCommand::List) => app.list_flights().await,
        Command::Flights(FlightsCommand::Add {
            airline,
            from,
            to,
            date,
        }) => {
            app.add_flight(NewFlight {
                airline_code: airline,
                departure_code: from,
                arrival_code: to,
                departure_date: date,
            })
            .await
        }
        Command::Flights(FlightsCommand::Delete { flight_id }) => {
            app.delete_flight(&flight_id).await
        }
        Command::Search(SearchCommand::Airlines { query, limit }) => {
            app.search_airlines(&query, limit).await
        }
        Command::Search(SearchCommand::Airports { query, limit }) => {
            app.search_airports(&query, limit).await
        }
        Command::Login { .. } | Command::Logout | Command::Register { .. } => Ok(()),
    }
}
