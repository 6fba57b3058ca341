use std::sync::Arc;

use clap::Args;
use coral_club_core::sync::{Replica, SyncTransport};

use super::OutputFormat;

/// List extras available for a reservation
#[derive(Args)]
pub struct CatalogCommand {
    /// Output format
    #[arg(long, short, value_enum, default_value = "text")]
    format: OutputFormat,
}

impl CatalogCommand {
    pub async fn execute<T: SyncTransport + ?Sized>(
        &self,
        replica: &Arc<Replica<T>>,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let doc = replica.snapshot().await;

        match self.format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&doc.categories)?),
            OutputFormat::Text => {
                let currency = doc.currency();
                for category in &doc.categories {
                    println!("{} [{}]", category.name, category.id);
                    if category.items.is_empty() {
                        println!("  (no items)");
                    }
                    for item in &category.items {
                        println!(
                            "  {:<25} {:<30} {} {:.2}",
                            item.id, item.name, currency, item.price
                        );
                    }
                    println!();
                }
            }
        }
        Ok(())
    }
}
