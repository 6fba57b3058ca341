//! Tent listing.

use std::sync::Arc;

use clap::Args;
use coral_club_core::models::{Tent, TentState};
use coral_club_core::sync::{Replica, SyncTransport};

use super::{parse_tent_state, OutputFormat};

#[derive(Args)]
pub struct TentsCommand {
    /// Only show tents in this state
    #[arg(long, short, value_parser = parse_tent_state)]
    state: Option<TentState>,

    /// Output format
    #[arg(long, short, value_enum, default_value = "text")]
    format: OutputFormat,
}

impl TentsCommand {
    pub async fn execute<T: SyncTransport + ?Sized>(
        &self,
        replica: &Arc<Replica<T>>,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let doc = replica.snapshot().await;
        let tents: Vec<&Tent> = doc
            .tents
            .iter()
            .filter(|t| self.state.map_or(true, |s| t.state == s))
            .collect();

        match self.format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&tents)?),
            OutputFormat::Text => {
                if tents.is_empty() {
                    println!("No tents found.");
                    return Ok(());
                }
                println!("{:<5} {:<10} {:>7} {:>7} {:>9}  HELD BY", "ID", "STATE", "X", "Y", "PRICE");
                for t in &tents {
                    let price = t
                        .price
                        .map(|p| format!("{:.2}", p))
                        .unwrap_or_else(|| "-".to_string());
                    let held_by = doc
                        .pending_for_tent(t.id)
                        .map(|r| r.customer.name.as_str())
                        .unwrap_or("");
                    println!(
                        "{:<5} {:<10} {:>7.4} {:>7.4} {:>9}  {}",
                        t.id,
                        t.state.as_str(),
                        t.x,
                        t.y,
                        price,
                        held_by
                    );
                }
                println!("\nTotal: {} tent(s)", tents.len());
            }
        }
        Ok(())
    }
}
