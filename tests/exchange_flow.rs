//! End-to-end exchange tests over the in-memory ledger.

mod common;

use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::U256;
use tokio::net::TcpListener;
use tokio::time::timeout;

use fairdex::attestation::{LocalAttestor, RuntimeEnvironments};
use fairdex::cipher::SessionKey;
use fairdex::commitment::Commitment;
use fairdex::exchange::{BuyerCoordinator, SellerCoordinator};
use fairdex::ledger::memory::{InMemoryLedger, LedgerOp};
use fairdex::ledger::LedgerClient;
use fairdex::transport::{read_message, Delivery, Listener};

use common::{BUYER, SELLER};

#[tokio::test]
async fn test_full_exchange_happy_path() {
    // Real HTTP attestor, real sockets, in-memory ledger.
    let endpoint = common::spawn_attestor().await;
    let attestor = Arc::new(common::http_attestor(endpoint));

    let ledger = InMemoryLedger::new(SELLER);
    let coordinator = Arc::new(SellerCoordinator::new(
        Arc::new(ledger.clone()),
        attestor,
        common::fast_seller_settings(),
    ));

    let listener = Listener::bind(&common::listener_config()).await.unwrap();
    let submit_addr = listener.local_addr().unwrap();

    let seller_task = {
        let coordinator = Arc::clone(&coordinator);
        tokio::spawn(async move {
            let (stream, peer, _permit) = listener.accept().await.unwrap();
            coordinator.handle_connection(stream, peer).await
        })
    };

    let buyer = BuyerCoordinator::new(
        Arc::new(ledger.handle_for(BUYER)),
        common::fast_buyer_settings(),
    );
    let buyer_task = tokio::spawn(async move { buyer.run_exchange().await });

    let submission = common::submission(3, 100);
    let plaintexts: Vec<Vec<u8>> = submission
        .data_shares
        .iter()
        .map(|s| s.share.as_bytes().to_vec())
        .collect();

    let ack = common::submit(submit_addr, &submission).await;
    assert!(ack.accepted);

    let session_id = seller_task
        .await
        .unwrap()
        .expect("seller flow should complete");
    assert_eq!(session_id, ack.session_id);

    let purchase = buyer_task
        .await
        .unwrap()
        .expect("buyer flow should complete");
    assert_eq!(purchase.seller, SELLER);
    assert_eq!(purchase.price, U256::from(100));
    assert_eq!(
        purchase.shares, plaintexts,
        "decrypted shares should match the originals in order"
    );

    // One exchange, three events, payment strictly before reveal.
    let events = ledger.events().await;
    let kinds: Vec<_> = events.iter().map(|e| e.event.kind()).collect();
    assert_eq!(kinds, ["seller_initialized", "payment_made", "key_revealed"]);
    assert!(events.windows(2).all(|w| w[0].sequence < w[1].sequence));
}

#[tokio::test]
async fn test_duplicate_payment_triggers_single_reveal() {
    let ledger = InMemoryLedger::new(SELLER);
    let coordinator = Arc::new(SellerCoordinator::new(
        Arc::new(ledger.clone()),
        Arc::new(LocalAttestor::new(RuntimeEnvironments::default())),
        common::fast_seller_settings(),
    ));

    let listener = Listener::bind(&common::listener_config()).await.unwrap();
    let submit_addr = listener.local_addr().unwrap();

    let seller_task = {
        let coordinator = Arc::clone(&coordinator);
        tokio::spawn(async move {
            let (stream, peer, _permit) = listener.accept().await.unwrap();
            coordinator.handle_connection(stream, peer).await
        })
    };

    // Hand-rolled buyer that pays twice for the same delivery.
    let buyer_ledger = ledger.handle_for(BUYER);
    let buyer_task = tokio::spawn(async move {
        let delivery_listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        let port = delivery_listener.local_addr().unwrap().port();
        buyer_ledger.claim("127.0.0.1", port).await.unwrap();

        let (mut stream, _) = delivery_listener.accept().await.unwrap();
        let delivery: Delivery = read_message(&mut stream, 1024 * 1024).await.unwrap();
        assert_eq!(delivery.blobs.len(), 2);

        buyer_ledger.accept(SELLER, U256::from(40)).await.unwrap();
        buyer_ledger.accept(SELLER, U256::from(40)).await.unwrap();
    });

    common::submit(submit_addr, &common::submission(2, 40)).await;

    timeout(Duration::from_secs(10), buyer_task)
        .await
        .unwrap()
        .unwrap();
    timeout(Duration::from_secs(10), seller_task)
        .await
        .unwrap()
        .unwrap()
        .expect("seller should complete despite the duplicate payment");

    assert_eq!(
        ledger.calls(LedgerOp::RevealKey),
        1,
        "only the first payment should trigger a reveal"
    );

    let events = ledger.events().await;
    let payments: Vec<_> = events
        .iter()
        .filter(|e| e.event.kind() == "payment_made")
        .collect();
    let reveals: Vec<_> = events
        .iter()
        .filter(|e| e.event.kind() == "key_revealed")
        .collect();
    assert_eq!(payments.len(), 2);
    assert_eq!(reveals.len(), 1);
    assert!(
        reveals[0].sequence > payments[0].sequence,
        "reveal must come after the first payment"
    );
}

#[tokio::test]
async fn test_stale_ledger_history_does_not_leak_into_new_sessions() {
    // A reveal already on the ledger from an earlier exchange sits below the
    // new session's cursor and belongs to another seller; neither side may
    // mistake it for this session's reveal.
    let other_seller = alloy::primitives::Address::repeat_byte(0xcc);
    let ledger = InMemoryLedger::new(other_seller);

    // Stale history: another seller initialized and revealed long ago.
    let stale_key = SessionKey::generate();
    let stale_blobs = vec![stale_key.encrypt(b"old").unwrap()];
    let stale_commitment =
        Commitment::over(&stale_blobs, stale_key.as_bytes()).unwrap();
    ledger
        .initialize(stale_commitment, U256::from(1))
        .await
        .unwrap();
    ledger.reveal_key(stale_key.as_bytes()).await.unwrap();

    // Fresh exchange between SELLER and BUYER on the same ledger.
    let seller_ledger = ledger.handle_for(SELLER);
    let coordinator = Arc::new(SellerCoordinator::new(
        Arc::new(seller_ledger),
        Arc::new(LocalAttestor::new(RuntimeEnvironments::default())),
        common::fast_seller_settings(),
    ));

    let listener = Listener::bind(&common::listener_config()).await.unwrap();
    let submit_addr = listener.local_addr().unwrap();
    let seller_task = {
        let coordinator = Arc::clone(&coordinator);
        tokio::spawn(async move {
            let (stream, peer, _permit) = listener.accept().await.unwrap();
            coordinator.handle_connection(stream, peer).await
        })
    };

    let mut buyer_settings = common::fast_buyer_settings();
    buyer_settings.seller_index = 1; // SELLER is second in the roster
    let buyer = BuyerCoordinator::new(Arc::new(ledger.handle_for(BUYER)), buyer_settings);
    let buyer_task = tokio::spawn(async move { buyer.run_exchange().await });

    common::submit(submit_addr, &common::submission(1, 10)).await;

    seller_task.await.unwrap().expect("seller should complete");
    let purchase = buyer_task.await.unwrap().expect("buyer should complete");
    assert_eq!(purchase.seller, SELLER);
    assert_eq!(purchase.shares, vec![b"share-0".to_vec()]);
}
