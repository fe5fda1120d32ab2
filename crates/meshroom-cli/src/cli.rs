//! Command-line interface definitions and parsing

use clap::{Parser, Subcommand};

use crate::scenario::Scenario;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a scripted multi-peer session over an in-memory mesh
    Simulate {
        #[arg(value_enum)]
        scenario: Scenario,
        /// Seed for peer identities, names and room ids
        #[arg(short, long, default_value_t = 1)]
        seed: u64,
        /// Print the final reports as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the share link for a room
    Link {
        room_id: String,
        /// Page to link to instead of the configured one
        #[arg(short, long)]
        base: Option<String>,
    },
    /// Extract the room id from a share link
    ParseLink { url: String },
    /// Generate a random display name
    Name {
        #[arg(short, long)]
        seed: Option<u64>,
    },
}
