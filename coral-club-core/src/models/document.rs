//! The shared state document.
//!
//! One document per deployment holds the whole booking state. It is always
//! read and written whole; partial updates go through the merge engine.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::{Category, Item, LogEntry, Reservation, Tent};
use super::tent::round_coord;

/// Tent count used when the layout does not specify one.
pub const DEFAULT_TENT_COUNT: u32 = 20;
/// Largest tent map a layout may ask for.
pub const MAX_TENT_COUNT: u32 = 500;
/// Admin PIN used when the document has none.
pub const DEFAULT_PIN: &str = "1234";

/// Object fields merged by shallow key overlay.
pub const OBJECT_MERGE_FIELDS: [&str; 5] = ["brand", "background", "layout", "payments", "security"];
/// Sequence fields replaced wholesale.
pub const REPLACE_ARRAY_FIELDS: [&str; 4] = ["categories", "tents", "reservations", "logs"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateDocument {
    #[serde(default)]
    pub rev: u64,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub brand: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub background: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub layout: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub payments: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub security: Map<String, Value>,
    #[serde(default)]
    pub categories: Vec<Category>,
    #[serde(default)]
    pub tents: Vec<Tent>,
    #[serde(default)]
    pub reservations: Vec<Reservation>,
    #[serde(default)]
    pub logs: Vec<LogEntry>,
    /// Ad hoc top-level keys, kept verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl StateDocument {
    /// The document written when the store holds none yet.
    pub fn seed(count: u32) -> Self {
        let obj = |v: Value| match v {
            Value::Object(m) => m,
            _ => Map::new(),
        };

        Self {
            rev: 0,
            brand: obj(json!({ "name": "Coral Club", "logoUrl": "/logo.png", "logoSize": 42 })),
            background: obj(json!({ "publicPath": "/Mapa.png" })),
            layout: obj(json!({ "count": count })),
            security: obj(json!({ "adminPin": DEFAULT_PIN })),
            payments: obj(json!({
                "usdToVES": 0,
                "currency": "USD",
                "whatsapp": "584121234567",
                "mp": { "link": "", "alias": "" },
                "pagoMovil": { "bank": "", "rif": "", "phone": "" },
                "zelle": { "email": "", "name": "" },
            })),
            categories: vec![
                Category::new("Servicios").with_items(vec![
                    seed_item("sombrilla", "Sombrilla (1 mesa + 2 sillas)", 10.0),
                    seed_item("toalla", "Toalla Extra", 2.0),
                    seed_item("hielera", "Hielera con Hielo", 5.0),
                ]),
                Category::new("Bebidas").with_items(vec![
                    seed_item("agua", "Agua Mineral", 2.5),
                    seed_item("refresco", "Refresco", 3.0),
                ]),
            ],
            tents: make_grid(count),
            reservations: Vec::new(),
            logs: Vec::new(),
            extra: Map::new(),
        }
    }

    pub fn find_tent(&self, id: u32) -> Option<&Tent> {
        self.tents.iter().find(|t| t.id == id)
    }

    pub fn find_reservation(&self, id: &str) -> Option<&Reservation> {
        self.reservations.iter().find(|r| r.id == id)
    }

    /// The pending reservation currently holding a tent, if any.
    pub fn pending_for_tent(&self, tent_id: u32) -> Option<&Reservation> {
        self.reservations
            .iter()
            .find(|r| r.tent_id == tent_id && r.is_pending())
    }

    pub fn find_category(&self, id: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.id == id)
    }

    /// Admin PIN, falling back to the default when unset.
    pub fn admin_pin(&self) -> &str {
        self.security
            .get("adminPin")
            .and_then(Value::as_str)
            .filter(|p| !p.is_empty())
            .unwrap_or(DEFAULT_PIN)
    }

    pub fn tent_count(&self) -> u32 {
        self.layout
            .get("count")
            .and_then(Value::as_u64)
            .and_then(|c| u32::try_from(c).ok())
            .filter(|c| *c > 0)
            .map(|c| c.min(MAX_TENT_COUNT))
            .unwrap_or(DEFAULT_TENT_COUNT)
    }

    pub fn brand_name(&self) -> &str {
        self.brand
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or("Coral Club")
    }

    pub fn currency(&self) -> &str {
        self.payments
            .get("currency")
            .and_then(Value::as_str)
            .unwrap_or("USD")
    }

    /// Largest tent id in use, 0 for an empty map.
    pub fn last_tent_id(&self) -> u32 {
        self.tents.iter().map(|t| t.id).max().unwrap_or(0)
    }
}

fn seed_item(id: &str, name: &str, price: f64) -> Item {
    Item {
        id: id.to_string(),
        name: name.to_string(),
        price,
        img: format!("/img/{}.png", id),
    }
}

/// Lays `count` tents out on an evenly spaced grid, ids starting at 1.
/// Counts above [`MAX_TENT_COUNT`] are capped.
pub fn make_grid(count: u32) -> Vec<Tent> {
    if count == 0 {
        return Vec::new();
    }
    let count = count.min(MAX_TENT_COUNT);

    let cols = (f64::from(count)).sqrt().ceil() as u32;
    let rows = count.div_ceil(cols);
    let pad_x = 0.10;
    let pad_top = 0.16;
    let pad_bottom = 0.10;
    let usable_w = 1.0 - pad_x * 2.0;
    let usable_h = 1.0 - pad_top - pad_bottom;

    (0..count)
        .map(|i| {
            let r = i / cols;
            let c = i % cols;
            let x = pad_x + ((f64::from(c) + 0.5) / f64::from(cols)) * usable_w;
            let y = pad_top + ((f64::from(r) + 0.5) / f64::from(rows)) * usable_h;
            Tent::new(i + 1, round_coord(x), round_coord(y))
        })
        .collect()
}
