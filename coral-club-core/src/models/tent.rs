use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Availability of a tent on the map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TentState {
    #[serde(alias = "av")]
    Available,
    /// Held by a pending reservation.
    #[serde(alias = "pr")]
    Holding,
    #[serde(alias = "oc", alias = "rs")]
    Occupied,
    /// Administratively withdrawn from sale.
    #[serde(alias = "bl")]
    Blocked,
}

impl TentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TentState::Available => "available",
            TentState::Holding => "holding",
            TentState::Occupied => "occupied",
            TentState::Blocked => "blocked",
        }
    }
}

impl fmt::Display for TentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TentState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "available" | "av" => Ok(TentState::Available),
            "holding" | "pr" => Ok(TentState::Holding),
            "occupied" | "oc" | "rs" => Ok(TentState::Occupied),
            "blocked" | "bl" => Ok(TentState::Blocked),
            _ => Err(format!(
                "Invalid tent state '{}'. Valid options: available, holding, occupied, blocked",
                s
            )),
        }
    }
}

/// A reservable slot on the map. Coordinates are fractions of the map size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tent {
    pub id: u32,
    pub state: TentState,
    pub x: f64,
    pub y: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
}

impl Tent {
    pub fn new(id: u32, x: f64, y: f64) -> Self {
        Self {
            id,
            state: TentState::Available,
            x,
            y,
            price: None,
        }
    }

    pub fn with_price(mut self, price: f64) -> Self {
        self.price = Some(price);
        self
    }

    pub fn is_available(&self) -> bool {
        self.state == TentState::Available
    }
}

/// Rounds a map coordinate to the 4 decimals stored in the document.
pub fn round_coord(v: f64) -> f64 {
    (v * 10_000.0).round() / 10_000.0
}
