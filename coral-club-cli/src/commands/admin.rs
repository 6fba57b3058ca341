//! Administrative commands.
//!
//! Every subcommand opens an [`AdminSession`] first, so a wrong PIN fails
//! before anything is sent.

use std::sync::Arc;

use clap::{Args, Subcommand};
use serde_json::{Map, Value};

use coral_club_core::admin::{self, AdminError, AdminSession};
use coral_club_core::models::TentState;
use coral_club_core::sync::{Applied, Replica, SyncTransport};

use super::{parse_tent_state, print_applied};
use crate::config::Config;

/// Manage tents, branding, payments and the catalog
#[derive(Args)]
pub struct AdminCommand {
    /// Admin PIN (defaults to admin_pin from config)
    #[arg(long, global = true)]
    pin: Option<String>,

    #[command(subcommand)]
    pub command: AdminSubcommand,
}

#[derive(Subcommand)]
pub enum AdminSubcommand {
    /// Edit tents
    Tent {
        #[command(subcommand)]
        command: TentSubcommand,
    },
    /// Set how many tents the next grid regeneration creates
    Layout {
        /// Tent count
        count: u32,
    },
    /// Edit branding
    Brand {
        /// Brand name
        #[arg(long)]
        name: Option<String>,
        /// Logo image URL
        #[arg(long)]
        logo_url: Option<String>,
        /// Logo size in pixels (24-120)
        #[arg(long)]
        logo_size: Option<i64>,
        /// Background image path
        #[arg(long)]
        background: Option<String>,
    },
    /// Set payment settings as KEY=VALUE (VALUE may be JSON)
    Payments {
        #[arg(required = true)]
        entries: Vec<String>,
    },
    /// Change the admin PIN
    Pin {
        /// New PIN
        new_pin: String,
    },
    /// Edit catalog categories
    Category {
        #[command(subcommand)]
        command: CategorySubcommand,
    },
    /// Edit catalog items
    Item {
        #[command(subcommand)]
        command: ItemSubcommand,
    },
    /// Empty the audit log
    ClearLogs,
}

#[derive(Subcommand)]
pub enum TentSubcommand {
    /// Force a tent into a state
    State {
        id: u32,
        #[arg(value_parser = parse_tent_state)]
        state: TentState,
    },
    /// Set a tent's own price (omit to clear)
    Price { id: u32, price: Option<f64> },
    /// Move a tent (coordinates in 0..1)
    Move { id: u32, x: f64, y: f64 },
    /// Add a tent in the middle of the map
    Add,
    /// Replace all tents with a fresh grid
    Regen,
}

#[derive(Subcommand)]
pub enum CategorySubcommand {
    /// Add a category
    Add { name: String },
    /// Rename a category
    Rename { id: String, name: String },
    /// Delete a category and its items
    Delete { id: String },
}

#[derive(Subcommand)]
pub enum ItemSubcommand {
    /// Add an item to a category
    Add {
        category: String,
        name: String,
        price: f64,
    },
    /// Change an item's name or price
    Edit {
        category: String,
        item: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        price: Option<f64>,
    },
    /// Set an item's image
    Image {
        category: String,
        item: String,
        img: String,
    },
    /// Delete an item
    Delete { category: String, item: String },
}

impl AdminCommand {
    pub async fn execute<T: SyncTransport + ?Sized>(
        &self,
        replica: &Arc<Replica<T>>,
        config: &Config,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let pin = resolve_pin(self.pin.as_deref(), config)?;
        let session = AdminSession::open(replica.clone(), &pin).await?;

        match &self.command {
            AdminSubcommand::Tent { command } => tent(&session, command).await?,
            AdminSubcommand::Layout { count } => {
                let count = *count;
                let applied = session.edit(|_| admin::set_layout_count(count)).await?;
                print_applied(&applied);
            }
            AdminSubcommand::Brand {
                name,
                logo_url,
                logo_size,
                background,
            } => {
                if name.is_none()
                    && logo_url.is_none()
                    && logo_size.is_none()
                    && background.is_none()
                {
                    return Err(
                        "Nothing to change; pass --name, --logo-url, --logo-size or --background"
                            .into(),
                    );
                }
                if let Some(name) = name {
                    print_applied(&session.edit(|_| admin::set_brand_name(name)).await?);
                }
                if let Some(url) = logo_url {
                    print_applied(&session.edit(|_| Ok(admin::set_logo_url(url))).await?);
                }
                if let Some(size) = logo_size {
                    let size = *size;
                    print_applied(&session.edit(|_| Ok(admin::set_logo_size(size))).await?);
                }
                if let Some(path) = background {
                    print_applied(&session.edit(|_| Ok(admin::set_background(path))).await?);
                }
            }
            AdminSubcommand::Payments { entries } => {
                let map = parse_payments(entries)?;
                print_applied(&session.edit(|_| admin::update_payments(map)).await?);
            }
            AdminSubcommand::Pin { new_pin } => {
                print_applied(&session.edit(|_| admin::change_pin(new_pin)).await?);
            }
            AdminSubcommand::Category { command } => {
                let applied = match command {
                    CategorySubcommand::Add { name } => {
                        session.edit(|doc| admin::add_category(doc, name)).await?
                    }
                    CategorySubcommand::Rename { id, name } => {
                        session
                            .edit(|doc| admin::rename_category(doc, id, name))
                            .await?
                    }
                    CategorySubcommand::Delete { id } => {
                        session.edit(|doc| admin::delete_category(doc, id)).await?
                    }
                };
                print_applied(&applied);
            }
            AdminSubcommand::Item { command } => {
                print_applied(&item(&session, command).await?);
            }
            AdminSubcommand::ClearLogs => {
                print_applied(&session.edit(|_| Ok(admin::clear_logs())).await?);
            }
        }
        Ok(())
    }
}

async fn tent<T: SyncTransport + ?Sized>(
    session: &AdminSession<T>,
    command: &TentSubcommand,
) -> Result<(), AdminError> {
    let applied = match command {
        TentSubcommand::State { id, state } => session.set_tent_state(*id, *state).await?,
        TentSubcommand::Price { id, price } => {
            session
                .edit(|doc| admin::set_tent_price(doc, *id, *price))
                .await?
        }
        TentSubcommand::Move { id, x, y } => {
            session
                .edit(|doc| admin::move_tent(doc, *id, *x, *y))
                .await?
        }
        TentSubcommand::Add => {
            let mut added = 0;
            let applied = session
                .edit(|doc| {
                    let (transition, id) = admin::add_tent(doc);
                    added = id;
                    Ok(transition)
                })
                .await?;
            println!("Added tent #{}", added);
            applied
        }
        TentSubcommand::Regen => session.edit(|doc| Ok(admin::regenerate_grid(doc))).await?,
    };
    print_applied(&applied);
    Ok(())
}

async fn item<T: SyncTransport + ?Sized>(
    session: &AdminSession<T>,
    command: &ItemSubcommand,
) -> Result<Applied, AdminError> {
    match command {
        ItemSubcommand::Add {
            category,
            name,
            price,
        } => {
            session
                .edit(|doc| admin::add_item(doc, category, name, *price))
                .await
        }
        ItemSubcommand::Edit {
            category,
            item,
            name,
            price,
        } => {
            if name.is_none() && price.is_none() {
                return Err(AdminError::InvalidValue(
                    "pass --name or --price".to_string(),
                ));
            }
            session
                .edit(|doc| admin::edit_item(doc, category, item, name.as_deref(), *price))
                .await
        }
        ItemSubcommand::Image {
            category,
            item,
            img,
        } => {
            session
                .edit(|doc| admin::set_item_image(doc, category, item, img))
                .await
        }
        ItemSubcommand::Delete { category, item } => {
            session
                .edit(|doc| admin::delete_item(doc, category, item))
                .await
        }
    }
}

/// `--pin` wins over the configured PIN.
fn resolve_pin(flag: Option<&str>, config: &Config) -> Result<String, String> {
    flag.map(str::to_string)
        .or_else(|| config.admin_pin.clone())
        .ok_or_else(|| "Admin PIN required: pass --pin or set admin_pin in config".to_string())
}

/// Parses `KEY=VALUE` pairs. Values that parse as JSON keep their type,
/// anything else is stored as a string.
fn parse_payments(entries: &[String]) -> Result<Map<String, Value>, String> {
    let mut map = Map::new();
    for entry in entries {
        let (key, raw) = entry
            .split_once('=')
            .ok_or_else(|| format!("Expected KEY=VALUE, got '{}'", entry))?;
        let key = key.trim();
        if key.is_empty() {
            return Err(format!("Empty key in '{}'", entry));
        }
        let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
        map.insert(key.to_string(), value);
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing;
    use serde_json::json;
    use tempfile::TempDir;

    fn config(pin: Option<&str>) -> (TempDir, Config) {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::load(Some(temp_dir.path().join("none.yaml"))).unwrap();
        config.admin_pin = pin.map(str::to_string);
        (temp_dir, config)
    }

    fn command(pin: Option<&str>, command: AdminSubcommand) -> AdminCommand {
        AdminCommand {
            pin: pin.map(str::to_string),
            command,
        }
    }

    #[test]
    fn test_parse_payments() {
        let entries = vec![
            "bankName=Banco Coral".to_string(),
            "enabled=true".to_string(),
            "fee=1.5".to_string(),
        ];
        let map = parse_payments(&entries).unwrap();

        assert_eq!(map["bankName"], json!("Banco Coral"));
        assert_eq!(map["enabled"], json!(true));
        assert_eq!(map["fee"], json!(1.5));
        assert!(parse_payments(&["novalue".to_string()]).is_err());
        assert!(parse_payments(&["=x".to_string()]).is_err());
    }

    #[test]
    fn test_resolve_pin() {
        let (_dir, cfg) = config(Some("4321"));
        assert_eq!(resolve_pin(Some("1111"), &cfg).unwrap(), "1111");
        assert_eq!(resolve_pin(None, &cfg).unwrap(), "4321");

        let (_dir, cfg) = config(None);
        assert!(resolve_pin(None, &cfg).is_err());
    }

    #[tokio::test]
    async fn test_wrong_pin_changes_nothing() {
        let replica = testing::replica().await;
        let before = replica.rev().await;
        let (_dir, cfg) = config(None);

        let result = command(Some("0000"), AdminSubcommand::ClearLogs)
            .execute(&replica, &cfg)
            .await;

        assert!(result.is_err());
        assert_eq!(replica.rev().await, before);
        assert!(!replica.snapshot().await.logs.is_empty());
    }

    #[tokio::test]
    async fn test_tent_state_and_add() {
        let replica = testing::replica().await;
        let (_dir, cfg) = config(Some("1234"));

        command(
            None,
            AdminSubcommand::Tent {
                command: TentSubcommand::State {
                    id: 3,
                    state: TentState::Blocked,
                },
            },
        )
        .execute(&replica, &cfg)
        .await
        .unwrap();
        command(
            None,
            AdminSubcommand::Tent {
                command: TentSubcommand::Add,
            },
        )
        .execute(&replica, &cfg)
        .await
        .unwrap();

        let doc = replica.snapshot().await;
        assert_eq!(doc.find_tent(3).unwrap().state, TentState::Blocked);
        assert_eq!(doc.tents.len(), 7);
        assert_eq!(doc.find_tent(7).unwrap().state, TentState::Available);
    }

    #[tokio::test]
    async fn test_catalog_edits() {
        let replica = testing::replica().await;
        let (_dir, cfg) = config(None);

        command(
            Some("1234"),
            AdminSubcommand::Category {
                command: CategorySubcommand::Add {
                    name: "Snacks".to_string(),
                },
            },
        )
        .execute(&replica, &cfg)
        .await
        .unwrap();
        command(
            Some("1234"),
            AdminSubcommand::Item {
                command: ItemSubcommand::Add {
                    category: "snacks".to_string(),
                    name: "Papas Fritas".to_string(),
                    price: 1.75,
                },
            },
        )
        .execute(&replica, &cfg)
        .await
        .unwrap();

        let doc = replica.snapshot().await;
        let snacks = doc.find_category("snacks").unwrap();
        assert_eq!(snacks.items[0].id, "papas-fritas");
        assert_eq!(snacks.items[0].price, 1.75);
    }

    #[tokio::test]
    async fn test_brand_requires_a_field() {
        let replica = testing::replica().await;
        let (_dir, cfg) = config(Some("1234"));

        let result = command(
            None,
            AdminSubcommand::Brand {
                name: None,
                logo_url: None,
                logo_size: None,
                background: None,
            },
        )
        .execute(&replica, &cfg)
        .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_pin_change_takes_effect() {
        let replica = testing::replica().await;
        let (_dir, cfg) = config(None);

        command(
            Some("1234"),
            AdminSubcommand::Pin {
                new_pin: "2468".to_string(),
            },
        )
        .execute(&replica, &cfg)
        .await
        .unwrap();

        let old = command(Some("1234"), AdminSubcommand::ClearLogs)
            .execute(&replica, &cfg)
            .await;
        assert!(old.is_err());
        command(Some("2468"), AdminSubcommand::ClearLogs)
            .execute(&replica, &cfg)
            .await
            .unwrap();
        assert!(replica.snapshot().await.logs.is_empty());
    }
}
