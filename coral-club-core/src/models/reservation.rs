use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::cart::CartLine;

/// Default length of a hold, in minutes.
pub const HOLD_MINUTES: i64 = 15;
/// Longest hold accepted, in minutes.
pub const MAX_HOLD_MINUTES: i64 = 24 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReservationStatus {
    Pending,
    Paid,
    Expired,
}

impl ReservationStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ReservationStatus::Pending)
    }
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReservationStatus::Pending => write!(f, "pending"),
            ReservationStatus::Paid => write!(f, "paid"),
            ReservationStatus::Expired => write!(f, "expired"),
        }
    }
}

/// Contact details captured with a reservation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub email: String,
}

impl Customer {
    pub fn new(name: impl Into<String>, phone: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            phone: phone.into(),
            email: String::new(),
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = email.into();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reservation {
    pub id: String,
    pub tent_id: u32,
    pub status: ReservationStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub customer: Customer,
    /// Snapshot of the cart at the moment the hold was placed.
    #[serde(default)]
    pub cart: Vec<CartLine>,
}

impl Reservation {
    /// Creates a pending reservation whose hold ends `hold` after `now`.
    pub fn pending(
        tent_id: u32,
        customer: Customer,
        cart: Vec<CartLine>,
        now: DateTime<Utc>,
        hold: Duration,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            tent_id,
            status: ReservationStatus::Pending,
            created_at: now,
            expires_at: now + hold,
            customer,
            cart,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == ReservationStatus::Pending
    }

    /// A pending hold whose expiry time is at or before `now`.
    pub fn is_past_due(&self, now: DateTime<Utc>) -> bool {
        self.is_pending() && self.expires_at <= now
    }

    /// Time left on the hold, zero once it has passed.
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        let diff = self.expires_at - now;
        if diff < Duration::zero() {
            Duration::zero()
        } else {
            diff
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_reservation() {
        let now = Utc::now();
        let res = Reservation::pending(
            7,
            Customer::new("Ana", "+58 412"),
            Vec::new(),
            now,
            Duration::minutes(HOLD_MINUTES),
        );

        assert_eq!(res.tent_id, 7);
        assert!(res.is_pending());
        assert_eq!(res.expires_at - res.created_at, Duration::minutes(15));
        assert!(Uuid::parse_str(&res.id).is_ok());
    }

    #[test]
    fn test_past_due_only_when_pending() {
        let now = Utc::now();
        let mut res = Reservation::pending(
            1,
            Customer::default(),
            Vec::new(),
            now - Duration::minutes(20),
            Duration::minutes(15),
        );
        assert!(res.is_past_due(now));
        assert_eq!(res.remaining(now), Duration::zero());

        res.status = ReservationStatus::Paid;
        assert!(!res.is_past_due(now));
    }

    #[test]
    fn test_camel_case_wire_format() {
        let now = Utc::now();
        let res = Reservation::pending(
            2,
            Customer::new("Luis", "123").with_email("l@example.com"),
            Vec::new(),
            now,
            Duration::minutes(15),
        );
        let value = serde_json::to_value(&res).unwrap();

        assert_eq!(value["tentId"], 2);
        assert_eq!(value["status"], "pending");
        assert!(value.get("expiresAt").is_some());
        assert_eq!(value["customer"]["email"], "l@example.com");
    }
}
