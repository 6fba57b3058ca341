//! Confirming, releasing and expiring reservations.

use std::sync::Arc;

use chrono::Utc;
use clap::Args;
use coral_club_core::lifecycle::ReservationManager;
use coral_club_core::models::TentState;
use coral_club_core::sync::{Replica, SyncTransport};

use super::{parse_tent_state, print_applied};

/// Mark a reservation as paid and its tent as occupied
#[derive(Args)]
pub struct ConfirmCommand {
    /// Reservation ID
    reservation: String,
}

impl ConfirmCommand {
    pub async fn execute<T: SyncTransport + ?Sized>(
        &self,
        replica: &Arc<Replica<T>>,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let manager = ReservationManager::new(replica.clone());
        match manager.confirm(&self.reservation).await? {
            Some(applied) => {
                println!("Payment confirmed for {}", self.reservation);
                print_applied(&applied);
            }
            None => println!("Reservation {} is already paid", self.reservation),
        }
        Ok(())
    }
}

/// Cancel a pending reservation and free its tent
#[derive(Args)]
pub struct ReleaseCommand {
    /// Reservation ID
    reservation: String,

    /// State to leave the tent in (available, occupied, blocked)
    #[arg(long, default_value = "available", value_parser = parse_tent_state)]
    to: TentState,
}

impl ReleaseCommand {
    pub async fn execute<T: SyncTransport + ?Sized>(
        &self,
        replica: &Arc<Replica<T>>,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let manager = ReservationManager::new(replica.clone());
        let applied = manager.release(&self.reservation, self.to).await?;
        println!("Released {} (tent now {})", self.reservation, self.to);
        print_applied(&applied);
        Ok(())
    }
}

/// Expire every pending hold whose time is up
#[derive(Args)]
pub struct SweepCommand {}

impl SweepCommand {
    pub async fn execute<T: SyncTransport + ?Sized>(
        &self,
        replica: &Arc<Replica<T>>,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let manager = ReservationManager::new(replica.clone());
        match manager.sweep(Utc::now()).await? {
            Some(applied) => print_applied(&applied),
            None => println!("Nothing to expire."),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing;
    use coral_club_core::lifecycle::hold_tent;
    use coral_club_core::models::{Customer, ReservationStatus};

    async fn hold(
        replica: &Arc<Replica<coral_club_core::MergeEngine>>,
        tent: u32,
        minutes_ago: i64,
    ) -> String {
        let doc = replica.snapshot().await;
        let (t, r) = hold_tent(
            &doc,
            tent,
            Customer::new("Leo", "555"),
            vec![],
            Utc::now() - chrono::Duration::minutes(minutes_ago),
            chrono::Duration::minutes(15),
        )
        .unwrap();
        replica.apply(t.patch, Some(t.note)).await.unwrap();
        r.id
    }

    #[tokio::test]
    async fn test_confirm_then_confirm_again() {
        let replica = testing::replica().await;
        let id = hold(&replica, 1, 0).await;

        let cmd = ConfirmCommand {
            reservation: id.clone(),
        };
        cmd.execute(&replica).await.unwrap();
        cmd.execute(&replica).await.unwrap();

        let doc = replica.snapshot().await;
        assert_eq!(
            doc.find_reservation(&id).unwrap().status,
            ReservationStatus::Paid
        );
        assert_eq!(doc.find_tent(1).unwrap().state, TentState::Occupied);
    }

    #[tokio::test]
    async fn test_release_to_blocked() {
        let replica = testing::replica().await;
        let id = hold(&replica, 2, 0).await;

        ReleaseCommand {
            reservation: id.clone(),
            to: TentState::Blocked,
        }
        .execute(&replica)
        .await
        .unwrap();

        let doc = replica.snapshot().await;
        assert_eq!(doc.find_tent(2).unwrap().state, TentState::Blocked);
        assert_eq!(
            doc.find_reservation(&id).unwrap().status,
            ReservationStatus::Expired
        );
    }

    #[tokio::test]
    async fn test_release_unknown_reservation_fails() {
        let replica = testing::replica().await;
        let result = ReleaseCommand {
            reservation: "missing".to_string(),
            to: TentState::Available,
        }
        .execute(&replica)
        .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_sweep_frees_expired_hold() {
        let replica = testing::replica().await;
        let id = hold(&replica, 3, 20).await;

        SweepCommand {}.execute(&replica).await.unwrap();

        let doc = replica.snapshot().await;
        assert_eq!(doc.find_tent(3).unwrap().state, TentState::Available);
        assert_eq!(
            doc.find_reservation(&id).unwrap().status,
            ReservationStatus::Expired
        );
    }
}
