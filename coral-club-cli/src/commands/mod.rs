mod admin;
mod booking;
mod catalog;
mod config_cmd;
mod logs;
mod reserve;
mod status;
mod tents;
mod watch;

pub use admin::AdminCommand;
pub use booking::{ConfirmCommand, ReleaseCommand, SweepCommand};
pub use catalog::CatalogCommand;
pub use config_cmd::ConfigCommand;
pub use logs::LogsCommand;
pub use reserve::ReserveCommand;
pub use status::StatusCommand;
pub use tents::TentsCommand;
pub use watch::WatchCommand;

use clap::ValueEnum;
use coral_club_core::models::TentState;
use coral_club_core::sync::Applied;

#[derive(Clone, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Accepts `available`, `holding`, `occupied`, `blocked` and the short codes.
pub fn parse_tent_state(s: &str) -> Result<TentState, String> {
    s.parse()
}

/// Reports whether an edit reached the shared state.
pub fn print_applied(applied: &Applied) {
    match applied {
        Applied::Remote { rev } => println!("Saved (rev {})", rev),
        Applied::Local { rev, error } => {
            eprintln!("Warning: server merge failed: {}", error);
            println!("Saved locally only (rev {}); it will be lost on next sync", rev);
        }
    }
}
