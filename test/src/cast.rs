//! The parties of a ticketing scenario, each with its own wallet session on
//! a shared sandbox ledger.

use anyhow::Result;
use client::Session;
use client::registry::{create_artist, create_concert, create_venue};
use sandbox::{InMemoryLedger, SandboxWallet};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init()
        .ok();
}

/// A date thirty days ahead in `datetime-local` form.
pub fn next_month() -> String {
    (chrono::Utc::now() + chrono::Duration::days(30))
        .format("%Y-%m-%dT%H:%M")
        .to_string()
}

pub struct Cast {
    pub ledger: Arc<InMemoryLedger>,
    pub artist: Session,
    pub venue: Session,
    pub fan: Session,
}

impl Cast {
    pub async fn connect(ledger: Arc<InMemoryLedger>) -> Result<Self> {
        let artist = SandboxWallet::new(Arc::clone(&ledger), "artist");
        let venue = SandboxWallet::new(Arc::clone(&ledger), "venue");
        let fan = SandboxWallet::new(Arc::clone(&ledger), "fan");
        Ok(Cast {
            artist: Session::connect(Some(&artist), None).await?,
            venue: Session::connect(Some(&venue), None).await?,
            fan: Session::connect(Some(&fan), None).await?,
            ledger,
        })
    }

    /// Registers one artist and one venue, owned by the cast's artist and venue.
    pub async fn register_profiles(&self) -> Result<(u64, u64)> {
        let artist_id = create_artist(&self.artist, "Daft Punk", 1).await?.id;
        let venue_id = create_venue(&self.venue, "Olympia", 2000, 20).await?.id;
        Ok((artist_id, venue_id))
    }

    /// Schedules a concert for the given profiles, organised by the venue.
    pub async fn schedule(&self, artist_id: u64, venue_id: u64, price: &str) -> Result<u64> {
        Ok(create_concert(&self.venue, artist_id, venue_id, &next_month(), price).await?.id)
    }
}
