//! Long-running sync: keeps a replica current and expires holds until Ctrl+C.

use std::future::Future;
use std::sync::Arc;

use chrono::Local;
use clap::Args;
use coral_club_core::models::StateDocument;
use coral_club_core::sync::{Replica, SyncTransport};

use super::status::count_by_state;

/// Follow the shared state, expiring holds as they time out
#[derive(Args)]
pub struct WatchCommand {}

impl WatchCommand {
    pub async fn execute<T: SyncTransport + ?Sized + 'static>(
        &self,
        replica: &Arc<Replica<T>>,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let poll_interval = replica.config().poll_interval;
        println!(
            "Watching (poll every {} ms). Press Ctrl+C to stop.",
            poll_interval.as_millis()
        );
        println!("{}", summarize(&replica.snapshot().await, replica.rev().await));

        follow(replica, tokio::signal::ctrl_c()).await?;
        println!("Stopped.");
        Ok(())
    }
}

/// Prints a summary whenever the replica changes, until `shutdown` resolves.
async fn follow<T, F>(
    replica: &Arc<Replica<T>>,
    shutdown: F,
) -> Result<(), Box<dyn std::error::Error>>
where
    T: SyncTransport + ?Sized + 'static,
    F: Future<Output = std::io::Result<()>>,
{
    let handle = replica.spawn();
    let mut ticker = tokio::time::interval(replica.config().poll_interval);
    let mut last_version = replica.version().await;
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let version = replica.version().await;
                if version != last_version {
                    last_version = version;
                    let doc = replica.snapshot().await;
                    println!("{}", summarize(&doc, replica.rev().await));
                    if let Some(entry) = doc.logs.first() {
                        println!("  last: [{}] {}", entry.kind, entry.message);
                    }
                }
            }
            result = &mut shutdown => {
                if let Err(e) = result {
                    tracing::warn!("Failed to listen for Ctrl+C: {}", e);
                }
                break;
            }
        }
    }

    handle.shutdown().await?;
    Ok(())
}

/// One-line overview: local time, revision and tent counts.
fn summarize(doc: &StateDocument, rev: u64) -> String {
    let counts = count_by_state(doc)
        .into_iter()
        .map(|(state, n)| format!("{} {}", n, state))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "{}  rev {}: {}",
        Local::now().format("%H:%M:%S"),
        rev,
        counts
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing;
    use coral_club_core::lifecycle::override_tent;
    use coral_club_core::models::TentState;

    #[test]
    fn test_summarize_counts_states() {
        let mut doc = StateDocument::seed(4);
        doc.tents[0].state = TentState::Occupied;
        doc.tents[1].state = TentState::Holding;

        let line = summarize(&doc, 9);
        assert!(line.contains("rev 9"));
        assert!(line.contains("2 available"));
        assert!(line.contains("1 holding"));
        assert!(line.contains("1 occupied"));
        assert!(line.contains("0 blocked"));
    }

    #[tokio::test]
    async fn test_follow_stops_when_shutdown_fires_after_ticks() {
        let replica = testing::replica().await;
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let shutdown = async move {
            let _ = rx.await;
            Ok::<(), std::io::Error>(())
        };

        let writer = replica.clone();
        tokio::spawn(async move {
            let doc = writer.snapshot().await;
            let t = override_tent(&doc, 2, TentState::Blocked).unwrap();
            writer.apply(t.patch, Some(t.note)).await.unwrap();
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            let _ = tx.send(());
        });

        tokio::time::timeout(std::time::Duration::from_secs(5), follow(&replica, shutdown))
            .await
            .expect("follow should return once shutdown resolves")
            .unwrap();
        assert_eq!(
            replica.snapshot().await.find_tent(2).unwrap().state,
            TentState::Blocked
        );
    }
}
