//! Spotify Dashboard Library
//!
//! This library provides the core of a personal Spotify dashboard: a
//! session-scoped credential cache, the handoff protocol that bridges the
//! asynchronous OAuth callback to the page request waiting for it, and a
//! recommendation engine built on averaged audio features.
//!
//! # Modules
//!
//! - `api` - HTTP handlers for the dashboard pages and the OAuth callback
//! - `config` - Configuration management and environment variables
//! - `engine` - Batch lookups and the recommendation engine
//! - `error` - Crate error type and result alias
//! - `management` - Credential cache, pending authorizations, token storage
//!   and the `AuthSession` that owns them
//! - `server` - Router construction and the serving loop
//! - `spotify` - Music service abstraction and the Spotify Web API client
//! - `types` - Data structures and type definitions
//! - `utils` - Utility functions and helpers
//!
//! # Example
//!
//! ```
//! use spotdash::{config, server};
//!
//! #[tokio::main]
//! async fn main() -> spotdash::Result<()> {
//!     config::load_env().await?;
//!     let config = config::Config::from_env()?;
//!     server::start_api_server(config).await
//! }
//! ```

pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod management;
pub mod server;
pub mod spotify;
pub mod types;
pub mod utils;

pub use error::{Error, Result};

/// Prints an informational message with a blue bullet point.
///
/// Used by the binary for startup and shutdown notices. Library code logs
/// through `tracing` instead.
///
/// # Example
///
/// ```
/// info!("Listening on {}", addr);
/// ```
#[macro_export]
macro_rules! info {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    println!("[{}] {}", "o".blue().bold(), std::format_args!($($arg)*));
  })
}

/// Prints a success message with a green checkmark.
///
/// # Example
///
/// ```
/// success!("Dashboard stopped");
/// ```
#[macro_export]
macro_rules! success {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    println!("[{}] {}", "✓".green().bold(), std::format_args!($($arg)*));
  })
}

/// Prints an error message with a red exclamation mark and exits the program.
///
/// Reserved for unrecoverable startup failures such as missing required
/// configuration. Request handling never reaches this macro; failures there
/// are returned as [`Error`] values and rendered by the HTTP layer.
///
/// # Example
///
/// ```
/// error!("Missing required environment variable: {}", var_name);
/// // Program exits here - code after this will not execute
/// ```
#[macro_export]
macro_rules! error {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    eprintln!("[{}] {}", "!".red().bold(), std::format_args!($($arg)*));
    std::process::exit(1);
  })
}

/// Prints a warning message with a yellow exclamation mark.
///
/// # Example
///
/// ```
/// warning!("No .env file found, using process environment only");
/// ```
#[macro_export]
macro_rules! warning {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    println!("[{}] {}", "!".yellow().bold(), std::format_args!($($arg)*));
  })
}
