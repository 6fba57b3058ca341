//! Reservation lifecycle.
//!
//! Every transition is computed against a snapshot of the document and
//! produces one patch replacing both `tents` and `reservations`, so the two
//! never drift apart within a single merge. Preconditions are checked on that
//! snapshot only; another client may have changed the shared copy since.
//!
//! ```text
//! tent:        available --hold--> holding --confirm--> occupied
//!                  ^                  |
//!                  +---release/sweep--+
//! reservation: pending --confirm--> paid
//!              pending --release/sweep--> expired
//! ```

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::merge::{Patch, PatchError};
use crate::models::{
    CartLine, Customer, LogEntry, Reservation, ReservationStatus, StateDocument, Tent, TentState,
    HOLD_MINUTES, MAX_HOLD_MINUTES,
};
use crate::sync::{Applied, Replica, SyncTransport};

#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("Tent {0} not found")]
    TentNotFound(u32),
    #[error("Tent {id} is {state}, not available")]
    TentUnavailable { id: u32, state: TentState },
    #[error("Tent {id} is {state}, not holding")]
    TentNotHolding { id: u32, state: TentState },
    #[error("Reservation {0} not found")]
    ReservationNotFound(String),
    #[error("Cannot {action} reservation {id}: it is {status}")]
    InvalidTransition {
        id: String,
        status: ReservationStatus,
        action: &'static str,
    },
    #[error("Customer {0} is required")]
    MissingCustomerField(&'static str),
    #[error("Tent cannot be set to {0} directly")]
    InvalidTargetState(TentState),
    #[error(transparent)]
    Patch(#[from] PatchError),
}

/// A computed transition: the patch to merge and the audit note describing it.
#[derive(Debug, Clone)]
pub struct Transition {
    pub patch: Patch,
    pub note: LogEntry,
}

fn with_tent_state(tents: &[Tent], id: u32, state: TentState) -> Vec<Tent> {
    tents
        .iter()
        .map(|t| {
            if t.id == id {
                Tent { state, ..t.clone() }
            } else {
                t.clone()
            }
        })
        .collect()
}

fn with_status(reservations: &[Reservation], id: &str, status: ReservationStatus) -> Vec<Reservation> {
    reservations
        .iter()
        .map(|r| {
            if r.id == id {
                Reservation {
                    status,
                    ..r.clone()
                }
            } else {
                r.clone()
            }
        })
        .collect()
}

/// Places a hold on an available tent.
///
/// The new reservation is prepended so the most recent appears first.
pub fn hold_tent(
    doc: &StateDocument,
    tent_id: u32,
    customer: Customer,
    cart: Vec<CartLine>,
    now: DateTime<Utc>,
    hold: Duration,
) -> Result<(Transition, Reservation), LifecycleError> {
    if customer.name.trim().is_empty() {
        return Err(LifecycleError::MissingCustomerField("name"));
    }
    if customer.phone.trim().is_empty() {
        return Err(LifecycleError::MissingCustomerField("phone"));
    }

    let tent = doc
        .find_tent(tent_id)
        .ok_or(LifecycleError::TentNotFound(tent_id))?;
    if !tent.is_available() {
        return Err(LifecycleError::TentUnavailable {
            id: tent_id,
            state: tent.state,
        });
    }

    let reservation = Reservation::pending(tent_id, customer, cart, now, hold);

    let mut reservations = Vec::with_capacity(doc.reservations.len() + 1);
    reservations.push(reservation.clone());
    reservations.extend(doc.reservations.iter().cloned());

    let patch = Patch::new()
        .tents(with_tent_state(&doc.tents, tent_id, TentState::Holding))
        .reservations(reservations);
    let note = LogEntry::new(
        "action",
        format!(
            "Hold tent #{} for {} ({})",
            tent_id, reservation.customer.name, reservation.id
        ),
    );

    Ok((Transition { patch, note }, reservation))
}

/// Marks a pending reservation paid and its tent occupied.
///
/// Returns `None` when the reservation is already paid. The tent must still
/// be holding; one an admin has blocked or occupied is left alone.
pub fn confirm_payment(
    doc: &StateDocument,
    reservation_id: &str,
) -> Result<Option<Transition>, LifecycleError> {
    let reservation = doc
        .find_reservation(reservation_id)
        .ok_or_else(|| LifecycleError::ReservationNotFound(reservation_id.to_string()))?;

    match reservation.status {
        ReservationStatus::Paid => return Ok(None),
        ReservationStatus::Expired => {
            return Err(LifecycleError::InvalidTransition {
                id: reservation_id.to_string(),
                status: reservation.status,
                action: "confirm",
            })
        }
        ReservationStatus::Pending => {}
    }

    let tent_id = reservation.tent_id;
    let tent = doc
        .find_tent(tent_id)
        .ok_or(LifecycleError::TentNotFound(tent_id))?;
    if tent.state != TentState::Holding {
        return Err(LifecycleError::TentNotHolding {
            id: tent_id,
            state: tent.state,
        });
    }

    let patch = Patch::new()
        .tents(with_tent_state(&doc.tents, tent_id, TentState::Occupied))
        .reservations(with_status(
            &doc.reservations,
            reservation_id,
            ReservationStatus::Paid,
        ));
    let note = LogEntry::new(
        "action",
        format!("Confirm payment for tent #{} ({})", tent_id, reservation_id),
    );

    Ok(Some(Transition { patch, note }))
}

/// Cancels a pending reservation and moves its tent to `to_state`.
pub fn release(
    doc: &StateDocument,
    reservation_id: &str,
    to_state: TentState,
) -> Result<Transition, LifecycleError> {
    if to_state == TentState::Holding {
        return Err(LifecycleError::InvalidTargetState(to_state));
    }

    let reservation = doc
        .find_reservation(reservation_id)
        .ok_or_else(|| LifecycleError::ReservationNotFound(reservation_id.to_string()))?;
    if !reservation.is_pending() {
        return Err(LifecycleError::InvalidTransition {
            id: reservation_id.to_string(),
            status: reservation.status,
            action: "release",
        });
    }

    let tent_id = reservation.tent_id;
    if doc.find_tent(tent_id).is_none() {
        return Err(LifecycleError::TentNotFound(tent_id));
    }

    let patch = Patch::new()
        .tents(with_tent_state(&doc.tents, tent_id, to_state))
        .reservations(with_status(
            &doc.reservations,
            reservation_id,
            ReservationStatus::Expired,
        ));
    let note = LogEntry::new(
        "action",
        format!("Release tent #{} to {} ({})", tent_id, to_state, reservation_id),
    );

    Ok(Transition { patch, note })
}

/// Expires every pending hold whose time is up and frees its tent.
///
/// Returns `None` when nothing is past due, so repeated sweeps are no-ops.
pub fn sweep_expired(doc: &StateDocument, now: DateTime<Utc>) -> Option<Transition> {
    let expired: Vec<&Reservation> = doc
        .reservations
        .iter()
        .filter(|r| r.is_past_due(now))
        .collect();
    if expired.is_empty() {
        return None;
    }

    let tents = doc
        .tents
        .iter()
        .map(|t| {
            if expired.iter().any(|r| r.tent_id == t.id) {
                Tent {
                    state: TentState::Available,
                    ..t.clone()
                }
            } else {
                t.clone()
            }
        })
        .collect();
    let reservations = doc
        .reservations
        .iter()
        .map(|r| {
            if expired.iter().any(|x| x.id == r.id) {
                Reservation {
                    status: ReservationStatus::Expired,
                    ..r.clone()
                }
            } else {
                r.clone()
            }
        })
        .collect();

    let note = LogEntry::new(
        "system",
        format!("Expired {} reservation(s)", expired.len()),
    );

    Some(Transition {
        patch: Patch::new().tents(tents).reservations(reservations),
        note,
    })
}

/// Forces a tent into `state` whatever its reservations say.
pub fn override_tent(
    doc: &StateDocument,
    tent_id: u32,
    state: TentState,
) -> Result<Transition, LifecycleError> {
    if state == TentState::Holding {
        return Err(LifecycleError::InvalidTargetState(state));
    }
    if doc.find_tent(tent_id).is_none() {
        return Err(LifecycleError::TentNotFound(tent_id));
    }

    Ok(Transition {
        patch: Patch::new().tents(with_tent_state(&doc.tents, tent_id, state)),
        note: LogEntry::new("admin", format!("Set tent #{} to {}", tent_id, state)),
    })
}

/// Runs lifecycle transitions against a replica's current copy.
pub struct ReservationManager<T: SyncTransport + ?Sized> {
    replica: Arc<Replica<T>>,
    hold: Duration,
}

impl<T: SyncTransport + ?Sized> ReservationManager<T> {
    pub fn new(replica: Arc<Replica<T>>) -> Self {
        Self {
            replica,
            hold: Duration::minutes(HOLD_MINUTES),
        }
    }

    /// Sets the hold length, clamped to between one minute and [`MAX_HOLD_MINUTES`].
    pub fn with_hold(mut self, hold: Duration) -> Self {
        self.hold = hold.clamp(Duration::minutes(1), Duration::minutes(MAX_HOLD_MINUTES));
        self
    }

    pub fn hold(&self) -> Duration {
        self.hold
    }

    pub fn replica(&self) -> &Arc<Replica<T>> {
        &self.replica
    }

    pub async fn reserve(
        &self,
        tent_id: u32,
        customer: Customer,
        cart: Vec<CartLine>,
    ) -> Result<(Reservation, Applied), LifecycleError> {
        let doc = self.replica.snapshot().await;
        let (transition, reservation) =
            hold_tent(&doc, tent_id, customer, cart, Utc::now(), self.hold)?;
        let applied = self.submit(transition).await?;
        Ok((reservation, applied))
    }

    /// `Ok(None)` when the reservation was already paid.
    pub async fn confirm(&self, reservation_id: &str) -> Result<Option<Applied>, LifecycleError> {
        let doc = self.replica.snapshot().await;
        match confirm_payment(&doc, reservation_id)? {
            Some(transition) => Ok(Some(self.submit(transition).await?)),
            None => {
                tracing::info!("Reservation {} already paid", reservation_id);
                Ok(None)
            }
        }
    }

    pub async fn release(
        &self,
        reservation_id: &str,
        to_state: TentState,
    ) -> Result<Applied, LifecycleError> {
        let doc = self.replica.snapshot().await;
        let transition = release(&doc, reservation_id, to_state)?;
        self.submit(transition).await
    }

    pub async fn sweep(&self, now: DateTime<Utc>) -> Result<Option<Applied>, LifecycleError> {
        Ok(self.replica.sweep_once(now).await?)
    }

    pub async fn override_tent(
        &self,
        tent_id: u32,
        state: TentState,
    ) -> Result<Applied, LifecycleError> {
        let doc = self.replica.snapshot().await;
        let transition = override_tent(&doc, tent_id, state)?;
        self.submit(transition).await
    }

    async fn submit(&self, transition: Transition) -> Result<Applied, LifecycleError> {
        Ok(self
            .replica
            .apply(transition.patch, Some(transition.note))
            .await?)
    }
}
