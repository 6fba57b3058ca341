//! Typed merge patches.
//!
//! A patch is a set of operations, one per touched top-level field, grouped
//! by how the field combines with the current document:
//!
//! - [`PatchOp::Overlay`]: shallow key overlay onto an object field;
//! - [`PatchOp::Replace`]: wholesale replacement of a sequence field;
//! - [`PatchOp::Raw`]: any other key, copied verbatim.
//!
//! Patches arriving as JSON go through [`Patch::from_value`], which rejects
//! anything malformed before it can reach storage.

use std::collections::HashSet;
use std::fmt;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::models::{
    Category, LogEntry, Reservation, Tent, OBJECT_MERGE_FIELDS, REPLACE_ARRAY_FIELDS,
};

/// Errors for patches that must not be merged.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PatchError {
    #[error("Patch must be a JSON object")]
    NotAnObject,
    #[error("Patch rev must be a non-negative integer")]
    InvalidRev,
    #[error("Field '{0}' must be an object")]
    ExpectedObject(&'static str),
    #[error("Field '{0}' must be an array")]
    ExpectedArray(&'static str),
    #[error("Invalid element in '{field}': {reason}")]
    InvalidElement { field: &'static str, reason: String },
    #[error("Key '{0}' cannot be patched as a raw field")]
    ReservedKey(String),
    #[error("Tent id must be positive")]
    InvalidTentId,
    #[error("Duplicate tent id {0}")]
    DuplicateTentId(u32),
    #[error("Duplicate category id '{0}'")]
    DuplicateCategoryId(String),
    #[error("Duplicate item id '{item}' in category '{category}'")]
    DuplicateItemId { category: String, item: String },
    #[error("Tent {tent} coordinates ({x}, {y}) are outside the map")]
    CoordinateOutOfRange { tent: u32, x: f64, y: f64 },
    #[error("Price for {0} must be a non-negative number")]
    InvalidPrice(String),
}

/// Object fields combined by shallow overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ObjectField {
    Brand,
    Background,
    Layout,
    Payments,
    Security,
}

impl ObjectField {
    pub const ALL: [ObjectField; 5] = [
        ObjectField::Brand,
        ObjectField::Background,
        ObjectField::Layout,
        ObjectField::Payments,
        ObjectField::Security,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectField::Brand => "brand",
            ObjectField::Background => "background",
            ObjectField::Layout => "layout",
            ObjectField::Payments => "payments",
            ObjectField::Security => "security",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.as_str() == s)
    }
}

impl fmt::Display for ObjectField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// New contents for one of the sequence fields.
#[derive(Debug, Clone, PartialEq)]
pub enum Replacement {
    Categories(Vec<Category>),
    Tents(Vec<Tent>),
    Reservations(Vec<Reservation>),
    Logs(Vec<LogEntry>),
}

impl Replacement {
    pub fn field(&self) -> &'static str {
        match self {
            Replacement::Categories(_) => "categories",
            Replacement::Tents(_) => "tents",
            Replacement::Reservations(_) => "reservations",
            Replacement::Logs(_) => "logs",
        }
    }

    fn to_value(&self) -> Value {
        let encoded = match self {
            Replacement::Categories(v) => serde_json::to_value(v),
            Replacement::Tents(v) => serde_json::to_value(v),
            Replacement::Reservations(v) => serde_json::to_value(v),
            Replacement::Logs(v) => serde_json::to_value(v),
        };
        encoded.unwrap_or(Value::Array(Vec::new()))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PatchOp {
    Overlay {
        field: ObjectField,
        entries: Map<String, Value>,
    },
    Replace(Replacement),
    Raw {
        key: String,
        value: Value,
    },
}

impl PatchOp {
    fn key(&self) -> &str {
        match self {
            PatchOp::Overlay { field, .. } => field.as_str(),
            PatchOp::Replace(r) => r.field(),
            PatchOp::Raw { key, .. } => key,
        }
    }
}

/// A partial document to merge into the shared state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Patch {
    rev: Option<u64>,
    ops: Vec<PatchOp>,
}

impl Patch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses and validates a JSON patch.
    pub fn from_value(value: Value) -> Result<Self, PatchError> {
        let Value::Object(map) = value else {
            return Err(PatchError::NotAnObject);
        };

        let mut patch = Patch::new();
        for (key, value) in map {
            if key == "rev" {
                patch.rev = match value {
                    Value::Null => None,
                    v => Some(v.as_u64().ok_or(PatchError::InvalidRev)?),
                };
                continue;
            }

            if let Some(field) = ObjectField::parse(&key) {
                let Value::Object(entries) = value else {
                    return Err(PatchError::ExpectedObject(field.as_str()));
                };
                patch = patch.overlay(field, entries);
                continue;
            }

            let op = match key.as_str() {
                "categories" => Replacement::Categories(parse_array("categories", value)?),
                "tents" => Replacement::Tents(parse_array("tents", value)?),
                "reservations" => Replacement::Reservations(parse_array("reservations", value)?),
                "logs" => Replacement::Logs(parse_array("logs", value)?),
                _ => {
                    patch = patch.raw(key, value);
                    continue;
                }
            };
            patch = patch.replace(op);
        }

        patch.validate()?;
        Ok(patch)
    }

    /// Encodes the patch back to the JSON shape `from_value` accepts.
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        if let Some(rev) = self.rev {
            map.insert("rev".to_string(), Value::from(rev));
        }
        for op in &self.ops {
            let value = match op {
                PatchOp::Overlay { entries, .. } => Value::Object(entries.clone()),
                PatchOp::Replace(r) => r.to_value(),
                PatchOp::Raw { value, .. } => value.clone(),
            };
            map.insert(op.key().to_string(), value);
        }
        Value::Object(map)
    }

    fn push(mut self, op: PatchOp) -> Self {
        let key = op.key().to_string();
        self.ops.retain(|o| o.key() != key);
        self.ops.push(op);
        self
    }

    pub fn with_rev(mut self, rev: u64) -> Self {
        self.rev = Some(rev);
        self
    }

    /// Overlays `entries` onto an object field. Repeated calls for the same
    /// field accumulate.
    pub fn overlay(self, field: ObjectField, entries: Map<String, Value>) -> Self {
        let mut merged = self
            .ops
            .iter()
            .find_map(|op| match op {
                PatchOp::Overlay { field: f, entries } if *f == field => Some(entries.clone()),
                _ => None,
            })
            .unwrap_or_default();
        merged.extend(entries);
        self.push(PatchOp::Overlay {
            field,
            entries: merged,
        })
    }

    /// Overlays a single sub-key.
    pub fn set(self, field: ObjectField, key: impl Into<String>, value: Value) -> Self {
        let mut entries = Map::new();
        entries.insert(key.into(), value);
        self.overlay(field, entries)
    }

    pub fn replace(self, replacement: Replacement) -> Self {
        self.push(PatchOp::Replace(replacement))
    }

    pub fn tents(self, tents: Vec<Tent>) -> Self {
        self.replace(Replacement::Tents(tents))
    }

    pub fn reservations(self, reservations: Vec<Reservation>) -> Self {
        self.replace(Replacement::Reservations(reservations))
    }

    pub fn categories(self, categories: Vec<Category>) -> Self {
        self.replace(Replacement::Categories(categories))
    }

    pub fn logs(self, logs: Vec<LogEntry>) -> Self {
        self.replace(Replacement::Logs(logs))
    }

    pub fn raw(self, key: impl Into<String>, value: Value) -> Self {
        self.push(PatchOp::Raw {
            key: key.into(),
            value,
        })
    }

    pub fn rev(&self) -> Option<u64> {
        self.rev
    }

    pub fn ops(&self) -> &[PatchOp] {
        &self.ops
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn touches(&self, key: &str) -> bool {
        self.ops.iter().any(|op| op.key() == key)
    }

    /// Checks the document invariants a patch could break.
    pub fn validate(&self) -> Result<(), PatchError> {
        for op in &self.ops {
            match op {
                PatchOp::Raw { key, .. } => {
                    if key == "rev"
                        || OBJECT_MERGE_FIELDS.contains(&key.as_str())
                        || REPLACE_ARRAY_FIELDS.contains(&key.as_str())
                    {
                        return Err(PatchError::ReservedKey(key.clone()));
                    }
                }
                PatchOp::Replace(Replacement::Tents(tents)) => validate_tents(tents)?,
                PatchOp::Replace(Replacement::Categories(categories)) => {
                    validate_categories(categories)?
                }
                PatchOp::Replace(_) | PatchOp::Overlay { .. } => {}
            }
        }
        Ok(())
    }
}

fn parse_array<T: DeserializeOwned>(field: &'static str, value: Value) -> Result<Vec<T>, PatchError> {
    if !value.is_array() {
        return Err(PatchError::ExpectedArray(field));
    }
    serde_json::from_value(value).map_err(|e| PatchError::InvalidElement {
        field,
        reason: e.to_string(),
    })
}

fn valid_price(price: f64) -> bool {
    price.is_finite() && price >= 0.0
}

fn validate_tents(tents: &[Tent]) -> Result<(), PatchError> {
    let mut seen = HashSet::new();
    for tent in tents {
        if tent.id == 0 {
            return Err(PatchError::InvalidTentId);
        }
        if !seen.insert(tent.id) {
            return Err(PatchError::DuplicateTentId(tent.id));
        }
        if !(0.0..=1.0).contains(&tent.x) || !(0.0..=1.0).contains(&tent.y) {
            return Err(PatchError::CoordinateOutOfRange {
                tent: tent.id,
                x: tent.x,
                y: tent.y,
            });
        }
        if let Some(price) = tent.price {
            if !valid_price(price) {
                return Err(PatchError::InvalidPrice(format!("tent {}", tent.id)));
            }
        }
    }
    Ok(())
}

fn validate_categories(categories: &[Category]) -> Result<(), PatchError> {
    let mut seen = HashSet::new();
    for category in categories {
        if !seen.insert(category.id.as_str()) {
            return Err(PatchError::DuplicateCategoryId(category.id.clone()));
        }
        let mut items = HashSet::new();
        for item in &category.items {
            if !items.insert(item.id.as_str()) {
                return Err(PatchError::DuplicateItemId {
                    category: category.id.clone(),
                    item: item.id.clone(),
                });
            }
            if !valid_price(item.price) {
                return Err(PatchError::InvalidPrice(format!("item '{}'", item.id)));
            }
        }
    }
    Ok(())
}
