//! Overview of the shared state.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{Local, Utc};
use clap::Args;
use coral_club_core::models::{StateDocument, TentState};
use coral_club_core::sync::{Replica, SyncTransport};

use super::OutputFormat;

#[derive(Args)]
pub struct StatusCommand {
    /// Output format
    #[arg(long, short, value_enum, default_value = "text")]
    format: OutputFormat,
}

impl StatusCommand {
    pub async fn execute<T: SyncTransport + ?Sized>(
        &self,
        replica: &Arc<Replica<T>>,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let doc = replica.snapshot().await;
        let rev = replica.rev().await;

        match self.format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&doc)?),
            OutputFormat::Text => print_status(&doc, rev),
        }
        Ok(())
    }
}

/// Number of tents in each state, every state listed.
pub fn count_by_state(doc: &StateDocument) -> BTreeMap<&'static str, usize> {
    let mut counts: BTreeMap<&'static str, usize> = [
        TentState::Available,
        TentState::Holding,
        TentState::Occupied,
        TentState::Blocked,
    ]
    .iter()
    .map(|s| (s.as_str(), 0))
    .collect();

    for tent in &doc.tents {
        *counts.entry(tent.state.as_str()).or_insert(0) += 1;
    }
    counts
}

fn print_status(doc: &StateDocument, rev: u64) {
    let now = Utc::now();

    println!("{} (rev {})", doc.brand_name(), rev);
    println!("{}", "=".repeat(40));
    println!();

    println!("Tents: {}", doc.tents.len());
    for (state, n) in count_by_state(doc) {
        println!("  {:<10} {}", state, n);
    }
    println!();

    let pending: Vec<_> = doc.reservations.iter().filter(|r| r.is_pending()).collect();
    if pending.is_empty() {
        println!("No pending reservations.");
        return;
    }

    println!("Pending reservations:");
    for r in pending {
        let left = r.remaining(now);
        println!(
            "  #{:<4} {:<20} {:<16} expires {} ({:02}:{:02} left)",
            r.tent_id,
            r.customer.name,
            r.customer.phone,
            r.expires_at.with_timezone(&Local).format("%H:%M:%S"),
            left.num_minutes(),
            left.num_seconds() % 60
        );
        println!("        id: {}", r.id);
    }
}
