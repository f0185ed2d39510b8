use crate::cast::{Cast, init_tracing};
use anyhow::Result;
use client::TicketingError;
use client::registry::get_concert;
use client::validation::{ValidatorRole, buy_ticket, validate_as};
use sandbox::InMemoryLedger;
use std::sync::Arc;

#[tokio::test]
async fn test_buy_without_artist_validation_writes_nothing() -> Result<()> {
    init_tracing();
    let cast = Cast::connect(Arc::new(InMemoryLedger::new())).await?;
    let (artist_id, venue_id) = cast.register_profiles().await?;
    let mut concert_id = 0;
    for _ in 0..5 {
        concert_id = cast.schedule(artist_id, venue_id, "0.1").await?;
    }
    assert_eq!(concert_id, 5);
    validate_as(&cast.venue, 5, ValidatorRole::Venue).await?;

    let writes_before = cast.ledger.submitted_count();
    let err = buy_ticket(&cast.fan, 5).await.err();
    assert_eq!(
        err,
        Some(TicketingError::ValidationPending {
            concert_id: 5,
            missing: ValidatorRole::Artist
        })
    );
    assert_eq!(cast.ledger.submitted_count(), writes_before);
    Ok(())
}

#[tokio::test]
async fn test_gate_names_missing_venue_validation() -> Result<()> {
    init_tracing();
    let cast = Cast::connect(Arc::new(InMemoryLedger::new())).await?;
    let (artist_id, venue_id) = cast.register_profiles().await?;
    let concert_id = cast.schedule(artist_id, venue_id, "0.1").await?;
    validate_as(&cast.artist, concert_id, ValidatorRole::Artist).await?;

    let err = buy_ticket(&cast.fan, concert_id).await.err();
    assert_eq!(
        err,
        Some(TicketingError::ValidationPending {
            concert_id,
            missing: ValidatorRole::Venue
        })
    );
    Ok(())
}

#[tokio::test]
async fn test_gate_rereads_instead_of_caching() -> Result<()> {
    init_tracing();
    let cast = Cast::connect(Arc::new(InMemoryLedger::new())).await?;
    let (artist_id, venue_id) = cast.register_profiles().await?;
    let concert_id = cast.schedule(artist_id, venue_id, "0.1").await?;

    assert!(buy_ticket(&cast.fan, concert_id).await.is_err());
    validate_as(&cast.artist, concert_id, ValidatorRole::Artist).await?;
    validate_as(&cast.venue, concert_id, ValidatorRole::Venue).await?;

    buy_ticket(&cast.fan, concert_id).await?;
    // A successful purchase implies both flags held when the gate checked.
    assert!(get_concert(&cast.fan, concert_id).await?.is_purchasable());
    assert_eq!(cast.ledger.tickets_of(cast.fan.identity().address()).len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_sold_out_surfaces_as_ledger_rejection() -> Result<()> {
    init_tracing();
    let cast = Cast::connect(Arc::new(InMemoryLedger::new())).await?;
    let artist_id = client::registry::create_artist(&cast.artist, "Air", 1).await?.id;
    let venue_id = client::registry::create_venue(&cast.venue, "Le Petit Bain", 1, 10).await?.id;
    let concert_id = cast.schedule(artist_id, venue_id, "0").await?;
    validate_as(&cast.artist, concert_id, ValidatorRole::Artist).await?;
    validate_as(&cast.venue, concert_id, ValidatorRole::Venue).await?;

    buy_ticket(&cast.fan, concert_id).await?;
    match buy_ticket(&cast.artist, concert_id).await {
        Err(TicketingError::LedgerRejected { reason, .. }) => assert_eq!(reason.as_deref(), Some("Sold out")),
        other => panic!("unexpected outcome: {:?}", other),
    }
    Ok(())
}
