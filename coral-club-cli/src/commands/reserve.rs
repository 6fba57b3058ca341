//! Placing a reservation hold.

use std::sync::Arc;

use chrono::Local;
use clap::Args;
use coral_club_core::lifecycle::ReservationManager;
use coral_club_core::models::{Cart, Customer, Item, StateDocument};
use coral_club_core::sync::{Replica, SyncTransport};

use super::print_applied;
use crate::config::Config;

/// Hold a tent for a customer
#[derive(Args)]
pub struct ReserveCommand {
    /// Tent ID
    tent: u32,

    /// Customer name
    #[arg(long)]
    name: String,

    /// Customer phone (WhatsApp)
    #[arg(long)]
    phone: String,

    /// Customer email
    #[arg(long)]
    email: Option<String>,

    /// Extra to add, as ITEM_ID or ITEM_ID=QTY (repeatable)
    #[arg(long = "item", short)]
    items: Vec<String>,
}

impl ReserveCommand {
    pub async fn execute<T: SyncTransport + ?Sized>(
        &self,
        replica: &Arc<Replica<T>>,
        config: &Config,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let doc = replica.snapshot().await;
        let cart = build_cart(&doc, &self.items)?;
        let tent_price = doc.find_tent(self.tent).and_then(|t| t.price);

        let mut customer = Customer::new(self.name.trim(), self.phone.trim());
        if let Some(email) = &self.email {
            customer = customer.with_email(email.trim());
        }

        let manager = ReservationManager::new(replica.clone()).with_hold(config.hold());
        let (reservation, applied) = manager
            .reserve(self.tent, customer, cart.snapshot())
            .await?;

        println!("Reserved tent #{}", reservation.tent_id);
        println!("  Reservation: {}", reservation.id);
        println!(
            "  Hold expires: {}",
            reservation
                .expires_at
                .with_timezone(&Local)
                .format("%Y-%m-%d %H:%M:%S")
        );
        for line in &reservation.cart {
            println!("  {}", line);
        }
        println!(
            "  Total: {} {:.2}",
            doc.currency(),
            cart.total(tent_price)
        );
        print_applied(&applied);
        Ok(())
    }
}

/// Splits `ITEM_ID` or `ITEM_ID=QTY`.
fn parse_item_arg(arg: &str) -> Result<(&str, u32), String> {
    match arg.split_once('=') {
        None => Ok((arg.trim(), 1)),
        Some((id, qty)) => {
            let qty: u32 = qty
                .trim()
                .parse()
                .map_err(|_| format!("Invalid quantity in '{}'", arg))?;
            if qty == 0 {
                return Err(format!("Quantity must be at least 1 in '{}'", arg));
            }
            Ok((id.trim(), qty))
        }
    }
}

fn find_item<'a>(doc: &'a StateDocument, id: &str) -> Option<&'a Item> {
    doc.categories.iter().find_map(|c| c.find_item(id))
}

/// Builds a cart from `--item` arguments against the catalog.
fn build_cart(doc: &StateDocument, args: &[String]) -> Result<Cart, String> {
    let mut cart = Cart::new();
    for arg in args {
        let (id, qty) = parse_item_arg(arg)?;
        let item = find_item(doc, id).ok_or_else(|| format!("Unknown item '{}'", id))?;
        for _ in 0..qty {
            cart.add_one(item);
        }
    }
    Ok(cart)
}
