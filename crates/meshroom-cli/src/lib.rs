//! Meshroom CLI library
//!
//! Configuration, share links, random display names and a scripted simulator that
//! runs whole rooms of coordinators over an in-memory mesh.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod link;
pub mod names;
pub mod scenario;

pub use cli::{Cli, Commands};
pub use config::AppConfig;
pub use error::{CliError, Result};
pub use link::{build_share_link, parse_share_link};
pub use names::animal_name;
pub use scenario::{run_scenario, PeerReport, Scenario};
