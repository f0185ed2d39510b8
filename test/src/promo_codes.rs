use crate::cast::{Cast, init_tracing};
use anyhow::Result;
use client::TicketingError;
use client::promo::{hash_code, redeem_code, register_code};
use sandbox::InMemoryLedger;
use std::sync::Arc;
use tracing::info;

async fn cast_with_three_concerts() -> Result<Cast> {
    let cast = Cast::connect(Arc::new(InMemoryLedger::new())).await?;
    let (artist_id, venue_id) = cast.register_profiles().await?;
    for _ in 0..3 {
        cast.schedule(artist_id, venue_id, "0.1").await?;
    }
    Ok(cast)
}

#[tokio::test]
async fn test_code_redeems_exactly_once() -> Result<()> {
    init_tracing();
    let cast = cast_with_three_concerts().await?;

    register_code(&cast.venue, 3, "SUMMER").await?;
    let stored = cast.ledger.promo_code(&hash_code("SUMMER")).expect("code committed");
    assert_eq!(stored.concert_id, 3);
    assert!(!stored.redeemed);

    let receipt = redeem_code(&cast.fan, "SUMMER").await?;
    info!("SUMMER redeemed in block {}", receipt.block_number);
    assert!(cast.ledger.promo_code(&hash_code("SUMMER")).expect("code committed").redeemed);

    match redeem_code(&cast.fan, "SUMMER").await {
        Err(TicketingError::InvalidOrUsedCode { tx }) => assert!(tx.is_some()),
        other => panic!("unexpected outcome: {:?}", other),
    }
    let tickets = cast.ledger.tickets_of(cast.fan.identity().address());
    assert_eq!(tickets.len(), 1);
    assert_eq!(tickets[0].concert_id, 3);
    Ok(())
}

#[tokio::test]
async fn test_commitment_is_the_local_hash() -> Result<()> {
    init_tracing();
    let cast = cast_with_three_concerts().await?;
    register_code(&cast.venue, 1, "VIP2025").await?;

    let first = hash_code("VIP2025");
    let second = hash_code("VIP2025");
    assert_eq!(first, second);
    assert_eq!(cast.ledger.promo_code(&first).map(|c| c.secret_hash), Some(first));
    Ok(())
}

#[tokio::test]
async fn test_wrong_code_leaves_commitment_unredeemed() -> Result<()> {
    init_tracing();
    let cast = cast_with_three_concerts().await?;
    register_code(&cast.venue, 2, "WINTER").await?;

    let err = redeem_code(&cast.fan, "winter").await.err();
    assert!(matches!(err, Some(TicketingError::InvalidOrUsedCode { .. })));
    assert!(!cast.ledger.promo_code(&hash_code("WINTER")).expect("code committed").redeemed);

    redeem_code(&cast.fan, "WINTER").await?;
    assert!(cast.ledger.promo_code(&hash_code("WINTER")).expect("code committed").redeemed);
    Ok(())
}
