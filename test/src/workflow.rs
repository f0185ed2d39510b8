use crate::cast::{Cast, init_tracing, next_month};
use anyhow::Result;
use client::registry::{create_artist, create_concert, get_artist, get_concert, next_id};
use client::submit_commands::submit_write;
use client::validation::{ValidatorRole, buy_ticket, validate_as};
use client::{TicketingError, TxStatus};
use ledger_api::{Bytes32, ContractCall, CounterKind, Wei};
use sandbox::InMemoryLedger;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[tokio::test]
async fn test_artist_id_is_discovered_from_counter() -> Result<()> {
    init_tracing();
    let cast = Cast::connect(Arc::new(InMemoryLedger::new())).await?;

    assert_eq!(next_id(&cast.artist, CounterKind::Artist).await?, 1);
    let created = create_artist(&cast.artist, "Daft Punk", 1).await?;
    assert_eq!(next_id(&cast.artist, CounterKind::Artist).await?, 2);
    assert_eq!(created.id, 1);

    let stored = get_artist(&cast.fan, created.id).await?;
    info!("Artist {} registered as {:?}", created.id, stored);
    assert_eq!(stored.name.to_text(), "Daft Punk");
    assert_eq!(stored.owner, cast.artist.identity().address());
    Ok(())
}

#[tokio::test]
async fn test_past_concert_date_is_rejected_before_any_write() -> Result<()> {
    init_tracing();
    let cast = Cast::connect(Arc::new(InMemoryLedger::new())).await?;
    let (artist_id, venue_id) = cast.register_profiles().await?;
    let writes_before = cast.ledger.submitted_count();

    let yesterday = (chrono::Utc::now() - chrono::Duration::days(1))
        .format("%Y-%m-%dT%H:%M")
        .to_string();
    let err = create_concert(&cast.venue, artist_id, venue_id, &yesterday, "0.1").await.err();
    assert!(matches!(err, Some(TicketingError::InvalidDate(_))));
    assert_eq!(cast.ledger.submitted_count(), writes_before);
    Ok(())
}

#[tokio::test]
async fn test_full_purchase_workflow() -> Result<()> {
    init_tracing();
    let cast = Cast::connect(Arc::new(InMemoryLedger::new())).await?;
    let (artist_id, venue_id) = cast.register_profiles().await?;
    let concert_id = cast.schedule(artist_id, venue_id, "0.25").await?;
    info!("Concert {} scheduled for artist {} at venue {}", concert_id, artist_id, venue_id);

    let concert = get_concert(&cast.fan, concert_id).await?;
    assert_eq!(concert.ticket_price, Wei(250_000_000_000_000_000));
    assert!(!concert.validated_by_artist && !concert.validated_by_venue);

    // Each party can only attest for itself.
    let err = validate_as(&cast.venue, concert_id, ValidatorRole::Artist).await.err();
    assert!(matches!(err, Some(TicketingError::NotAuthorized { .. })));

    validate_as(&cast.artist, concert_id, ValidatorRole::Artist).await?;
    validate_as(&cast.venue, concert_id, ValidatorRole::Venue).await?;

    // Flags are set once; a second attestation is refused by the ledger.
    let again = validate_as(&cast.artist, concert_id, ValidatorRole::Artist).await.err();
    assert!(matches!(again, Some(TicketingError::NotAuthorized { .. })));

    buy_ticket(&cast.fan, concert_id).await?;
    info!("Fan bought a ticket for concert {}", concert_id);
    let tickets = cast.ledger.tickets_of(cast.fan.identity().address());
    assert_eq!(tickets.len(), 1);
    assert_eq!(tickets[0].paid, Wei(250_000_000_000_000_000));
    Ok(())
}

#[tokio::test]
async fn test_concurrent_writes_are_tracked_independently() -> Result<()> {
    init_tracing();
    let ledger = Arc::new(InMemoryLedger::new().with_manual_mining());
    let cast = Cast::connect(Arc::clone(&ledger)).await?;
    let mut events = cast.artist.tracker().subscribe();

    let call = |name: &str| ContractCall::CreateArtist {
        name: Bytes32::from_text(name).unwrap(),
        royalty_rate: 1,
    };
    let mut first = submit_write(&cast.artist, call("Justice")).await?;
    let mut second = submit_write(&cast.artist, call("Air")).await?;

    // Nothing is final yet, and reads do not see the pending writes.
    assert!(matches!(
        first.confirmed_within(Duration::from_millis(20)).await,
        Err(TicketingError::Unconfirmed { .. })
    ));
    assert_eq!(next_id(&cast.artist, CounterKind::Artist).await?, 1);

    ledger.mine();
    first.confirmed_within(Duration::from_secs(5)).await?;
    second.confirmed_within(Duration::from_secs(5)).await?;
    assert_eq!(next_id(&cast.artist, CounterKind::Artist).await?, 3);

    let mut history: HashMap<u64, Vec<TxStatus>> = HashMap::new();
    while let Ok(tx) = events.try_recv() {
        history.entry(tx.id).or_default().push(tx.status);
    }
    assert_eq!(history.len(), 2);
    for statuses in history.values() {
        assert_eq!(statuses, &vec![TxStatus::Submitted, TxStatus::Pending, TxStatus::Confirmed]);
    }
    Ok(())
}

#[tokio::test]
async fn test_concert_with_unknown_profiles_is_rejected_by_ledger() -> Result<()> {
    init_tracing();
    let cast = Cast::connect(Arc::new(InMemoryLedger::new())).await?;
    let err = create_concert(&cast.venue, 1, 1, &next_month(), "0.1").await.err();
    match err {
        Some(TicketingError::LedgerRejected { reason, tx, .. }) => {
            assert_eq!(reason.as_deref(), Some("Artist does not exist"));
            assert!(tx.is_some());
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
    Ok(())
}
