//! Integration test: end-to-end swaps through the coordinator.
//!
//! Each scenario runs a live `SwapCoordinator` (event loop, watcher tasks,
//! periodic sweep) over two simulated ledgers sharing a manual clock.

use swap_core::{CoordinatorConfig, SwapState, Timestamp};
use swap_crypto::Secret;
use swap_engine::LegStatus;
use swap_integration_tests::{policy, Balances, World};
use swap_ledger::{ContractStatus, LedgerAdapter, LedgerError};

fn never_redeem() -> CoordinatorConfig {
    CoordinatorConfig {
        max_redeem_attempts: 0,
        ..policy()
    }
}

// =========================================================================
// Scenario 1: both parties follow the protocol
// =========================================================================

#[tokio::test]
async fn test_cooperative_swap_redeems_both_legs() {
    let world = World::new(policy());
    let id = world.create().await;

    let status = world.wait_settled(&id).await;
    assert_eq!(status.state, SwapState::InitiatorRedeemed);
    assert_eq!(status.initiator_leg, LegStatus::Redeemed);
    assert_eq!(status.responder_leg, LegStatus::Redeemed);
    assert_eq!(status.deadline_initiator, Some(Timestamp(100)));
    assert_eq!(status.deadline_responder, Some(Timestamp(40)));
    assert!(status.initiator_contract.is_some());
    assert!(status.responder_contract.is_some());
    assert!(status.alarm.is_none());

    assert_eq!(world.balances(), Balances::swapped());
    assert!(!world.coordinator.vault().contains(&id));

    // Exactly one submission of each kind per leg.
    assert_eq!(world.a.call_counts().fund, 1);
    assert_eq!(world.b.call_counts().fund, 1);
    assert_eq!(world.a.call_counts().redeem, 1);
    assert_eq!(world.b.call_counts().redeem, 1);
    assert_eq!(world.a.call_counts().refund, 0);
    world.stop();
}

// =========================================================================
// Scenario 2: responder never funds
// =========================================================================

#[tokio::test]
async fn test_absent_responder_initiator_refunds_after_timeout() {
    let world = World::new(policy());
    world.b.reject_funding(true);
    let id = world.create().await;

    let status = world.wait_for(&id, |s| s.decline_reason.is_some()).await;
    assert_eq!(status.state, SwapState::InitiatorFunded);
    assert_eq!(status.responder_leg, LegStatus::Unfunded);

    // One tick before the deadline nothing is reclaimed.
    world.advance_to(99).await;
    assert_eq!(world.a.call_counts().refund, 0);
    assert_eq!(world.balances().alice_a, 900);

    world.advance_to(100).await;
    let status = world.wait_settled(&id).await;
    assert_eq!(status.state, SwapState::Refunded);
    assert_eq!(status.initiator_leg, LegStatus::Refunded);
    assert_eq!(world.balances(), Balances::untouched());
    world.stop();
}

// =========================================================================
// Scenario 3: initiator never redeems
// =========================================================================

#[tokio::test]
async fn test_silent_initiator_both_legs_refund_in_order() {
    let world = World::new(never_redeem());
    let id = world.create().await;
    world.wait_state(&id, SwapState::ResponderFunded).await;

    world.advance_to(40).await;
    let status = world
        .wait_for(&id, |s| s.responder_leg == LegStatus::Refunded)
        .await;
    assert_eq!(status.state, SwapState::ResponderFunded);
    assert_eq!(status.initiator_leg, LegStatus::Funded);
    assert_eq!(world.balances().bob_b, 1_000);

    world.advance_to(100).await;
    let status = world.wait_settled(&id).await;
    assert_eq!(status.state, SwapState::Refunded);
    assert_eq!(status.initiator_leg, LegStatus::Refunded);
    assert!(status.alarm.is_none());
    assert_eq!(world.balances(), Balances::untouched());
    world.stop();
}

// =========================================================================
// Scenario 4: redeem with the wrong secret
// =========================================================================

#[tokio::test]
async fn test_wrong_secret_is_rejected_and_changes_nothing() {
    let world = World::new(never_redeem());
    let id = world.create().await;
    let before = world.wait_state(&id, SwapState::ResponderFunded).await;
    let contract = before.responder_contract.clone().unwrap();
    let balances = world.balances();

    let result = world.b.redeem(&contract, &Secret::generate()).await;
    assert!(matches!(result, Err(LedgerError::InvalidSecret(_))));

    world.coordinator.sweep().await;
    let after = world.coordinator.get_swap_status(&id).unwrap();
    assert_eq!(after.state, SwapState::ResponderFunded);
    assert_eq!(after.responder_leg, LegStatus::Funded);
    assert_eq!(world.b.contract_status(&contract), Some(ContractStatus::Active));
    assert_eq!(world.balances(), balances);
    world.stop();
}

// =========================================================================
// Policy variations
// =========================================================================

#[tokio::test]
async fn test_without_auto_refund_swap_expires_and_keeps_funds_locked() {
    let world = World::new(CoordinatorConfig {
        auto_refund: false,
        ..never_redeem()
    });
    let id = world.create().await;
    world.wait_state(&id, SwapState::ResponderFunded).await;

    world.advance_to(40).await;
    let status = world.wait_state(&id, SwapState::Expired).await;
    assert_eq!(status.responder_leg, LegStatus::Expired);
    assert!(status.settled_at.is_none());
    assert_eq!(world.b.call_counts().refund, 0);
    world.stop();
}

#[tokio::test]
async fn test_settled_swap_is_evicted_but_still_answerable() {
    let world = World::new(CoordinatorConfig {
        terminal_grace_ms: 10,
        ..policy()
    });
    let id = world.create().await;
    world.wait_settled(&id).await;
    assert_eq!(world.coordinator.active_count(), 1);

    world.advance_to(10).await;
    assert_eq!(world.coordinator.active_count(), 0);

    // Answered from the store.
    let status = world.coordinator.get_swap_status(&id).unwrap();
    assert_eq!(status.state, SwapState::InitiatorRedeemed);
    world.stop();
}

#[tokio::test]
async fn test_parallel_swaps_do_not_interfere() {
    let world = World::new(policy());
    let mut ids = Vec::new();
    for _ in 0..4 {
        ids.push(world.create().await);
    }

    for id in &ids {
        let status = world.wait_settled(id).await;
        assert_eq!(status.state, SwapState::InitiatorRedeemed);
    }
    assert_eq!(world.a.call_counts().fund, 4);
    assert_eq!(world.b.call_counts().fund, 4);
    assert_eq!(world.balances().bob_a, 400);
    assert_eq!(world.balances().alice_b, 200);
    assert_eq!(world.coordinator.list_swaps().len(), 4);
    world.stop();
}
