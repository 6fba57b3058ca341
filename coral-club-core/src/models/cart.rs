//! Customer cart of catalog extras.
//!
//! The cart lives only on the client until a reservation is placed, at which
//! point its lines are copied into the reservation as a snapshot.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::Item;

/// One line of the cart, keyed `extra:<item id>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartLine {
    pub key: String,
    pub name: String,
    pub price: f64,
    pub qty: u32,
}

impl CartLine {
    pub fn subtotal(&self) -> f64 {
        self.price * f64::from(self.qty)
    }
}

impl fmt::Display for CartLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} x{} ({:.2})", self.name, self.qty, self.subtotal())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Cart {
    pub lines: Vec<CartLine>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn line_key(item_id: &str) -> String {
        format!("extra:{}", item_id)
    }

    /// Quantity of an item currently in the cart.
    pub fn qty_of(&self, item_id: &str) -> u32 {
        let key = Self::line_key(item_id);
        self.lines
            .iter()
            .find(|l| l.key == key)
            .map(|l| l.qty)
            .unwrap_or(0)
    }

    /// Adds one unit of an item, creating the line if needed.
    pub fn add_one(&mut self, item: &Item) {
        let key = Self::line_key(&item.id);
        match self.lines.iter_mut().find(|l| l.key == key) {
            Some(line) => line.qty += 1,
            None => self.lines.push(CartLine {
                key,
                name: item.name.clone(),
                price: item.price,
                qty: 1,
            }),
        }
    }

    /// Removes one unit of an item. Lines that reach zero are dropped.
    pub fn remove_one(&mut self, item_id: &str) {
        let key = Self::line_key(item_id);
        if let Some(line) = self.lines.iter_mut().find(|l| l.key == key) {
            line.qty = line.qty.saturating_sub(1);
        }
        self.lines.retain(|l| l.qty > 0);
    }

    /// Deletes a whole line by its key. Returns true if a line was removed.
    pub fn delete_line(&mut self, key: &str) -> bool {
        let before = self.lines.len();
        self.lines.retain(|l| l.key != key);
        self.lines.len() != before
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Extras total plus the tent price, if the tent has one.
    pub fn total(&self, tent_price: Option<f64>) -> f64 {
        self.lines.iter().map(CartLine::subtotal).sum::<f64>() + tent_price.unwrap_or(0.0)
    }

    /// Lines to store on a reservation.
    pub fn snapshot(&self) -> Vec<CartLine> {
        self.lines.clone()
    }
}
