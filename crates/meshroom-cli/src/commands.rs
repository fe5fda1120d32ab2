//! Command handlers for the meshroom CLI

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::info;

use meshroom_core::{RoomId, SenderId};

use crate::cli::Commands;
use crate::config::AppConfig;
use crate::error::Result;
use crate::link::{build_share_link, parse_share_link};
use crate::names::animal_name;
use crate::scenario::{run_scenario, PeerReport, Scenario};

/// Command dispatcher for handling CLI commands
pub struct CommandDispatcher;

impl CommandDispatcher {
    pub async fn execute(command: Commands, config: &AppConfig) -> Result<()> {
        match command {
            Commands::Simulate {
                scenario,
                seed,
                json,
            } => Self::handle_simulate_command(scenario, seed, json, config).await,
            Commands::Link { room_id, base } => Self::handle_link_command(&room_id, base, config),
            Commands::ParseLink { url } => Self::handle_parse_link_command(&url),
            Commands::Name { seed } => Self::handle_name_command(seed, config),
        }
    }

    async fn handle_simulate_command(
        scenario: Scenario,
        seed: u64,
        json: bool,
        config: &AppConfig,
    ) -> Result<()> {
        let reports = run_scenario(scenario, &config.coordinator, seed).await?;
        info!(peers = reports.len(), "scenario finished");

        if json {
            println!("{}", serde_json::to_string_pretty(&reports)?);
        } else {
            for report in &reports {
                Self::print_report(report);
            }
        }
        Ok(())
    }

    fn print_report(report: &PeerReport) {
        let view = &report.snapshot;
        let role = if view.is_host { "host" } else { "guest" };
        println!(
            "== {} ({}) in room {} as {}, {} member(s)",
            report.name,
            view.self_id.short(8),
            view.room_id,
            role,
            view.member_count()
        );
        for entry in &report.transcript {
            match &entry.sender_id {
                SenderId::System => println!("   * {}", entry.content),
                SenderId::Peer(_) => println!("   <{}> {}", entry.sender_name, entry.content),
            }
        }
    }

    fn handle_link_command(room_id: &str, base: Option<String>, config: &AppConfig) -> Result<()> {
        let room_id: RoomId = room_id.parse()?;
        let base = base.as_deref().unwrap_or(&config.link.base_url);
        println!("{}", build_share_link(base, &room_id)?);
        Ok(())
    }

    fn handle_parse_link_command(url: &str) -> Result<()> {
        match parse_share_link(url)? {
            Some(room_id) => println!("{}", room_id),
            None => println!("no room in link"),
        }
        Ok(())
    }

    fn handle_name_command(seed: Option<u64>, config: &AppConfig) -> Result<()> {
        if let Some(name) = &config.identity.name {
            println!("{}", name);
            return Ok(());
        }
        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        println!("{}", animal_name(&mut rng));
        Ok(())
    }
}
