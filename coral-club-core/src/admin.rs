//! Administrative edits.
//!
//! Each edit is computed from a snapshot and submitted as a patch like any
//! other change. Sequence fields are always sent whole, so two admins editing
//! the catalog at the same time overwrite each other.

use std::sync::Arc;

use serde_json::{json, Map, Value};
use subtle::ConstantTimeEq;

use crate::lifecycle::{override_tent, LifecycleError, Transition};
use crate::merge::{ObjectField, Patch, PatchError};
use crate::models::{
    make_grid, round_coord, slugify, Category, Item, LogEntry, StateDocument, Tent, TentState,
    MAX_TENT_COUNT,
};
use crate::sync::{Applied, Replica, SyncTransport};

/// Smallest and largest logo edge in pixels.
pub const LOGO_SIZE_RANGE: (i64, i64) = (24, 120);
/// Tents cannot be dragged closer than this to the map edge.
pub const COORD_RANGE: (f64, f64) = (0.02, 0.98);

#[derive(Debug, thiserror::Error)]
pub enum AdminError {
    #[error("Invalid admin PIN")]
    InvalidPin,
    #[error("Tent {0} not found")]
    TentNotFound(u32),
    #[error("Category '{0}' not found")]
    CategoryNotFound(String),
    #[error("Item '{item}' not found in category '{category}'")]
    ItemNotFound { category: String, item: String },
    #[error("Category '{0}' already exists")]
    DuplicateCategory(String),
    #[error("Item '{item}' already exists in category '{category}'")]
    DuplicateItem { category: String, item: String },
    #[error("Invalid value: {0}")]
    InvalidValue(String),
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    #[error(transparent)]
    Patch(#[from] PatchError),
}

/// Compares `pin` with the document's admin PIN in constant time.
pub fn verify_pin(doc: &StateDocument, pin: &str) -> bool {
    doc.admin_pin()
        .as_bytes()
        .ct_eq(pin.trim().as_bytes())
        .into()
}

fn admin_note(message: impl Into<String>) -> LogEntry {
    LogEntry::new("admin", message)
}

fn edit(patch: Patch, message: impl Into<String>) -> Transition {
    Transition {
        patch,
        note: admin_note(message),
    }
}

fn update_tent(
    doc: &StateDocument,
    id: u32,
    f: impl Fn(&mut Tent),
) -> Result<Vec<Tent>, AdminError> {
    if doc.find_tent(id).is_none() {
        return Err(AdminError::TentNotFound(id));
    }
    Ok(doc
        .tents
        .iter()
        .map(|t| {
            let mut t = t.clone();
            if t.id == id {
                f(&mut t);
            }
            t
        })
        .collect())
}

fn non_empty(value: &str, what: &str) -> Result<String, AdminError> {
    let value = value.trim();
    if value.is_empty() {
        Err(AdminError::InvalidValue(format!("{} cannot be empty", what)))
    } else {
        Ok(value.to_string())
    }
}

fn price(value: f64) -> Result<f64, AdminError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(AdminError::InvalidValue(format!("price {}", value)))
    }
}

// Tents

/// Sets a tent's own price; `None` clears it.
pub fn set_tent_price(
    doc: &StateDocument,
    id: u32,
    value: Option<f64>,
) -> Result<Transition, AdminError> {
    let value = value.map(price).transpose()?;
    let tents = update_tent(doc, id, |t| t.price = value)?;
    Ok(edit(Patch::new().tents(tents), format!("Set price of tent #{}", id)))
}

/// Moves a tent, clamping into the map's usable area.
pub fn move_tent(doc: &StateDocument, id: u32, x: f64, y: f64) -> Result<Transition, AdminError> {
    if !x.is_finite() || !y.is_finite() {
        return Err(AdminError::InvalidValue(format!("position ({}, {})", x, y)));
    }
    let (lo, hi) = COORD_RANGE;
    let x = round_coord(x.clamp(lo, hi));
    let y = round_coord(y.clamp(lo, hi));
    let tents = update_tent(doc, id, |t| {
        t.x = x;
        t.y = y;
    })?;
    Ok(edit(Patch::new().tents(tents), format!("Move tent #{}", id)))
}

/// Appends an available tent in the middle of the map.
///
/// Returns the transition and the new tent's id.
pub fn add_tent(doc: &StateDocument) -> (Transition, u32) {
    let id = doc.last_tent_id() + 1;
    let mut tents = doc.tents.clone();
    tents.push(Tent::new(id, 0.5, 0.5));
    (edit(Patch::new().tents(tents), format!("Add tent #{}", id)), id)
}

/// Replaces every tent with a fresh grid of `layout.count` available tents.
pub fn regenerate_grid(doc: &StateDocument) -> Transition {
    let count = doc.tent_count();
    edit(
        Patch::new().tents(make_grid(count)),
        format!("Regenerate grid of {} tents", count),
    )
}

/// Sets the tent count used by the next grid regeneration.
pub fn set_layout_count(count: u32) -> Result<Transition, AdminError> {
    if count == 0 || count > MAX_TENT_COUNT {
        return Err(AdminError::InvalidValue(format!(
            "tent count must be between 1 and {}",
            MAX_TENT_COUNT
        )));
    }
    Ok(edit(
        Patch::new().set(ObjectField::Layout, "count", json!(count)),
        format!("Set tent count to {}", count),
    ))
}

// Branding

pub fn set_brand_name(name: &str) -> Result<Transition, AdminError> {
    let name = non_empty(name, "brand name")?;
    Ok(edit(
        Patch::new().set(ObjectField::Brand, "name", json!(name)),
        "Edit brand",
    ))
}

pub fn set_logo_url(url: &str) -> Transition {
    edit(
        Patch::new().set(ObjectField::Brand, "logoUrl", json!(url.trim())),
        "Edit logo",
    )
}

/// Logo edge in pixels, clamped to [`LOGO_SIZE_RANGE`].
pub fn set_logo_size(size: i64) -> Transition {
    let size = size.clamp(LOGO_SIZE_RANGE.0, LOGO_SIZE_RANGE.1);
    edit(
        Patch::new().set(ObjectField::Brand, "logoSize", json!(size)),
        format!("Logo size {}", size),
    )
}

pub fn set_background(path: &str) -> Transition {
    edit(
        Patch::new().set(ObjectField::Background, "publicPath", json!(path.trim())),
        "Edit background",
    )
}

/// Overlays payment settings. Keys not named are kept.
pub fn update_payments(entries: Map<String, Value>) -> Result<Transition, AdminError> {
    if entries.is_empty() {
        return Err(AdminError::InvalidValue("no payment settings given".into()));
    }
    let keys: Vec<&str> = entries.keys().map(String::as_str).collect();
    let message = format!("Edit payments ({})", keys.join(", "));
    Ok(edit(
        Patch::new().overlay(ObjectField::Payments, entries),
        message,
    ))
}

pub fn change_pin(pin: &str) -> Result<Transition, AdminError> {
    let pin = non_empty(pin, "PIN")?;
    Ok(edit(
        Patch::new().set(ObjectField::Security, "adminPin", json!(pin)),
        "Change PIN",
    ))
}

// Catalog

fn category_index(doc: &StateDocument, id: &str) -> Result<usize, AdminError> {
    doc.categories
        .iter()
        .position(|c| c.id == id)
        .ok_or_else(|| AdminError::CategoryNotFound(id.to_string()))
}

fn item_index(category: &Category, id: &str) -> Result<usize, AdminError> {
    category
        .items
        .iter()
        .position(|i| i.id == id)
        .ok_or_else(|| AdminError::ItemNotFound {
            category: category.id.clone(),
            item: id.to_string(),
        })
}

/// Adds an empty category with an id derived from its name.
pub fn add_category(doc: &StateDocument, name: &str) -> Result<Transition, AdminError> {
    let category = Category::new(non_empty(name, "category name")?);
    if doc.find_category(&category.id).is_some() {
        return Err(AdminError::DuplicateCategory(category.id));
    }
    let message = format!("Add category {}", category.name);
    let mut categories = doc.categories.clone();
    categories.push(category);
    Ok(edit(Patch::new().categories(categories), message))
}

/// Renames a category. Its id stays the same.
pub fn rename_category(doc: &StateDocument, id: &str, name: &str) -> Result<Transition, AdminError> {
    let name = non_empty(name, "category name")?;
    let idx = category_index(doc, id)?;
    let mut categories = doc.categories.clone();
    categories[idx].name = name;
    Ok(edit(
        Patch::new().categories(categories),
        format!("Rename category {}", id),
    ))
}

pub fn delete_category(doc: &StateDocument, id: &str) -> Result<Transition, AdminError> {
    category_index(doc, id)?;
    let categories = doc
        .categories
        .iter()
        .filter(|c| c.id != id)
        .cloned()
        .collect();
    Ok(edit(
        Patch::new().categories(categories),
        format!("Delete category {}", id),
    ))
}

pub fn add_item(
    doc: &StateDocument,
    category_id: &str,
    name: &str,
    value: f64,
) -> Result<Transition, AdminError> {
    let item = Item::new(non_empty(name, "item name")?, price(value)?);
    let idx = category_index(doc, category_id)?;
    let mut categories = doc.categories.clone();
    let category = &mut categories[idx];
    if category.find_item(&item.id).is_some() {
        return Err(AdminError::DuplicateItem {
            category: category_id.to_string(),
            item: item.id,
        });
    }
    let message = format!("Add item {} to {}", item.name, category_id);
    category.items.push(item);
    Ok(edit(Patch::new().categories(categories), message))
}

/// Changes an item's name and/or price. The id stays the same.
pub fn edit_item(
    doc: &StateDocument,
    category_id: &str,
    item_id: &str,
    name: Option<&str>,
    value: Option<f64>,
) -> Result<Transition, AdminError> {
    let name = name.map(|n| non_empty(n, "item name")).transpose()?;
    let value = value.map(price).transpose()?;
    let idx = category_index(doc, category_id)?;
    let mut categories = doc.categories.clone();
    let item_idx = item_index(&categories[idx], item_id)?;
    let item = &mut categories[idx].items[item_idx];
    if let Some(name) = name {
        item.name = name;
    }
    if let Some(value) = value {
        item.price = value;
    }
    Ok(edit(
        Patch::new().categories(categories),
        format!("Edit item {}", item_id),
    ))
}

pub fn set_item_image(
    doc: &StateDocument,
    category_id: &str,
    item_id: &str,
    img: &str,
) -> Result<Transition, AdminError> {
    let idx = category_index(doc, category_id)?;
    let mut categories = doc.categories.clone();
    let item_idx = item_index(&categories[idx], item_id)?;
    categories[idx].items[item_idx].img = img.trim().to_string();
    Ok(edit(
        Patch::new().categories(categories),
        format!("Set image of {}", item_id),
    ))
}

pub fn delete_item(
    doc: &StateDocument,
    category_id: &str,
    item_id: &str,
) -> Result<Transition, AdminError> {
    let idx = category_index(doc, category_id)?;
    let mut categories = doc.categories.clone();
    item_index(&categories[idx], item_id)?;
    categories[idx].items.retain(|i| i.id != item_id);
    Ok(edit(
        Patch::new().categories(categories),
        format!("Delete item {}", item_id),
    ))
}

/// Empties the audit log.
pub fn clear_logs() -> Transition {
    edit(Patch::new().logs(Vec::new()), "Clear log")
}

/// An admin's access to a replica, opened with the PIN.
pub struct AdminSession<T: SyncTransport + ?Sized> {
    replica: Arc<Replica<T>>,
}

impl<T: SyncTransport + ?Sized> AdminSession<T> {
    /// Checks `pin` against the replica's current copy.
    pub async fn open(replica: Arc<Replica<T>>, pin: &str) -> Result<Self, AdminError> {
        let doc = replica.snapshot().await;
        if !verify_pin(&doc, pin) {
            tracing::warn!("Rejected admin PIN");
            return Err(AdminError::InvalidPin);
        }
        Ok(Self { replica })
    }

    pub fn replica(&self) -> &Arc<Replica<T>> {
        &self.replica
    }

    /// Builds an edit from the current copy and submits it.
    pub async fn edit<F>(&self, build: F) -> Result<Applied, AdminError>
    where
        F: FnOnce(&StateDocument) -> Result<Transition, AdminError>,
    {
        let doc = self.replica.snapshot().await;
        let transition = build(&doc)?;
        Ok(self
            .replica
            .apply(transition.patch, Some(transition.note))
            .await?)
    }

    /// Forces a tent into `state`, ignoring its reservations.
    pub async fn set_tent_state(&self, id: u32, state: TentState) -> Result<Applied, AdminError> {
        self.edit(|doc| Ok(override_tent(doc, id, state)?)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryKv;
    use crate::merge::{apply_patch, MergeEngine, StateKeys};
    use crate::sync::ReplicaConfig;

    fn doc() -> StateDocument {
        StateDocument::seed(6)
    }

    fn run(doc: &StateDocument, t: Transition) -> StateDocument {
        t.patch.validate().unwrap();
        apply_patch(doc, &t.patch)
    }

    #[test]
    fn test_verify_pin() {
        let d = doc();
        assert!(verify_pin(&d, "1234"));
        assert!(verify_pin(&d, " 1234 "));
        assert!(!verify_pin(&d, "123"));
        assert!(!verify_pin(&d, "12345"));

        let d = run(&d, change_pin("  9876 ").unwrap());
        assert_eq!(d.security["adminPin"], "9876");
        assert!(verify_pin(&d, "9876"));
        assert!(!verify_pin(&d, "1234"));
    }

    #[test]
    fn test_change_pin_rejects_blank() {
        assert!(matches!(change_pin("   "), Err(AdminError::InvalidValue(_))));
    }

    #[test]
    fn test_move_tent_clamps_and_rounds() {
        let d = run(&doc(), move_tent(&doc(), 2, 1.5, 0.123456).unwrap());
        let t = d.find_tent(2).unwrap();
        assert_eq!(t.x, 0.98);
        assert_eq!(t.y, 0.1235);

        let d = run(&d, move_tent(&d, 2, -3.0, 0.0).unwrap());
        assert_eq!(d.find_tent(2).unwrap().x, 0.02);

        assert!(matches!(
            move_tent(&d, 2, f64::NAN, 0.5),
            Err(AdminError::InvalidValue(_))
        ));
        assert!(matches!(
            move_tent(&d, 42, 0.5, 0.5),
            Err(AdminError::TentNotFound(42))
        ));
    }

    #[test]
    fn test_tent_price() {
        let d = run(&doc(), set_tent_price(&doc(), 3, Some(25.0)).unwrap());
        assert_eq!(d.find_tent(3).unwrap().price, Some(25.0));

        let d = run(&d, set_tent_price(&d, 3, None).unwrap());
        assert_eq!(d.find_tent(3).unwrap().price, None);

        assert!(set_tent_price(&d, 3, Some(-1.0)).is_err());
    }

    #[test]
    fn test_add_tent_uses_next_id() {
        let (t, id) = add_tent(&doc());
        assert_eq!(id, 7);
        let d = run(&doc(), t);
        let tent = d.find_tent(7).unwrap();
        assert_eq!((tent.x, tent.y), (0.5, 0.5));
        assert_eq!(tent.state, TentState::Available);
    }

    #[test]
    fn test_regenerate_uses_layout_count() {
        let d = run(&doc(), set_layout_count(9).unwrap());
        let d = run(&d, regenerate_grid(&d));
        assert_eq!(d.tents.len(), 9);
        assert!(d.tents.iter().all(|t| t.is_available()));

        assert!(set_layout_count(0).is_err());
        assert!(set_layout_count(MAX_TENT_COUNT).is_ok());
        assert!(matches!(
            set_layout_count(MAX_TENT_COUNT + 1),
            Err(AdminError::InvalidValue(_))
        ));
    }

    #[test]
    fn test_branding() {
        let d = run(&doc(), set_brand_name("Playa Azul").unwrap());
        let d = run(&d, set_logo_size(500));
        let d = run(&d, set_logo_url("/brand.png"));
        let d = run(&d, set_background("/playa.png"));

        assert_eq!(d.brand["name"], "Playa Azul");
        assert_eq!(d.brand["logoSize"], 120);
        assert_eq!(d.brand["logoUrl"], "/brand.png");
        assert_eq!(d.background["publicPath"], "/playa.png");
        assert_eq!(run(&d, set_logo_size(1)).brand["logoSize"], 24);
    }

    #[test]
    fn test_payments_overlay_keeps_other_keys() {
        let mut entries = Map::new();
        entries.insert("usdToVES".into(), json!(36.5));
        let d = run(&doc(), update_payments(entries).unwrap());

        assert_eq!(d.payments["usdToVES"], 36.5);
        assert_eq!(d.payments["currency"], "USD");
        assert!(update_payments(Map::new()).is_err());
    }

    #[test]
    fn test_category_lifecycle() {
        let d = run(&doc(), add_category(&doc(), "Comida Rápida").unwrap());
        let cat = d.categories.last().unwrap().clone();
        assert_eq!(cat.id, "comida-r-pida");
        assert!(cat.items.is_empty());

        assert!(matches!(
            add_category(&d, "comida rápida"),
            Err(AdminError::DuplicateCategory(_))
        ));

        let d = run(&d, rename_category(&d, &cat.id, "Snacks").unwrap());
        assert_eq!(d.find_category(&cat.id).unwrap().name, "Snacks");

        let d = run(&d, delete_category(&d, &cat.id).unwrap());
        assert!(d.find_category(&cat.id).is_none());
        assert!(matches!(
            delete_category(&d, &cat.id),
            Err(AdminError::CategoryNotFound(_))
        ));
    }

    #[test]
    fn test_item_edits() {
        let d = run(&doc(), add_item(&doc(), "bebidas", "Jugo Natural", 4.0).unwrap());
        let bebidas = d.find_category("bebidas").unwrap();
        assert_eq!(bebidas.find_item("jugo-natural").unwrap().price, 4.0);

        assert!(matches!(
            add_item(&d, "bebidas", "Jugo natural", 1.0),
            Err(AdminError::DuplicateItem { .. })
        ));
        assert!(add_item(&d, "bebidas", "Gratis", -2.0).is_err());

        let d = run(&d, edit_item(&d, "bebidas", "jugo-natural", Some("Jugo"), Some(4.5)).unwrap());
        let d = run(&d, set_item_image(&d, "bebidas", "jugo-natural", "/img/jugo.png").unwrap());
        let item = d.find_category("bebidas").unwrap().find_item("jugo-natural").unwrap();
        assert_eq!(item.name, "Jugo");
        assert_eq!(item.price, 4.5);
        assert_eq!(item.img, "/img/jugo.png");

        let d = run(&d, delete_item(&d, "bebidas", "jugo-natural").unwrap());
        assert!(d.find_category("bebidas").unwrap().find_item("jugo-natural").is_none());
        assert!(matches!(
            delete_item(&d, "bebidas", "jugo-natural"),
            Err(AdminError::ItemNotFound { .. })
        ));
    }

    #[test]
    fn test_clear_logs() {
        let mut d = doc();
        d.logs = vec![LogEntry::new("system", "Seed")];
        let t = clear_logs();
        assert!(t.patch.touches("logs"));
        assert!(run(&d, t).logs.is_empty());
    }

    #[tokio::test]
    async fn test_session_requires_pin() {
        let kv = Arc::new(MemoryKv::new());
        let engine = Arc::new(MergeEngine::new(kv, StateKeys::default()));
        let replica = Arc::new(Replica::new(engine, ReplicaConfig::default()));
        replica.bootstrap().await.unwrap();

        assert!(matches!(
            AdminSession::open(replica.clone(), "0000").await,
            Err(AdminError::InvalidPin)
        ));

        let session = AdminSession::open(replica.clone(), "1234").await.unwrap();
        session.set_tent_state(4, TentState::Blocked).await.unwrap();
        session.edit(|_| set_brand_name("Coral Sur")).await.unwrap();

        let doc = replica.snapshot().await;
        assert_eq!(doc.find_tent(4).unwrap().state, TentState::Blocked);
        assert_eq!(doc.brand["name"], "Coral Sur");
        assert_eq!(doc.logs[0].kind, "admin");
    }
}
