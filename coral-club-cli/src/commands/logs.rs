use std::sync::Arc;

use chrono::Local;
use clap::Args;
use coral_club_core::sync::{Replica, SyncTransport};

/// Show the audit log, newest first
#[derive(Args)]
pub struct LogsCommand {
    /// Number of entries to show
    #[arg(long, short = 'n', default_value = "20")]
    limit: usize,
}

impl LogsCommand {
    pub async fn execute<T: SyncTransport + ?Sized>(
        &self,
        replica: &Arc<Replica<T>>,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let doc = replica.snapshot().await;
        if doc.logs.is_empty() {
            println!("Log is empty.");
            return Ok(());
        }

        for entry in doc.logs.iter().take(self.limit) {
            println!(
                "{}  {:<16} {}",
                entry.timestamp.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S"),
                entry.kind,
                entry.message
            );
        }
        if doc.logs.len() > self.limit {
            println!("... {} older entries", doc.logs.len() - self.limit);
        }
        Ok(())
    }
}
