//! Integration test: restarts, replays, cancellation and finality.

use std::time::Duration;

use swap_core::{CoordinatorConfig, Leg, SwapId, SwapState};
use swap_engine::{EngineError, LegStatus, SwapInput, SwapStore};
use swap_integration_tests::{parties, policy, timeouts, Balances, Driver, World};
use swap_ledger::EventCursor;

fn never_redeem() -> CoordinatorConfig {
    CoordinatorConfig {
        max_redeem_attempts: 0,
        ..policy()
    }
}

// =========================================================================
// Restart and recovery
// =========================================================================

#[tokio::test]
async fn test_restart_resumes_swap_from_store() {
    // First process gets as far as both legs funded.
    let world = World::new(never_redeem());
    let id = world.create().await;
    world.wait_state(&id, SwapState::ResponderFunded).await;

    // Second process may redeem; it only has the store and the ledgers.
    let (world, resumed) = world.restart(policy()).await;
    assert_eq!(resumed, 1);

    let status = world.wait_settled(&id).await;
    assert_eq!(status.state, SwapState::InitiatorRedeemed);
    assert_eq!(world.balances(), Balances::swapped());
    // Funding was not repeated by the restarted process.
    assert_eq!(world.a.call_counts().fund, 1);
    assert_eq!(world.b.call_counts().fund, 1);
    world.stop();
}

#[tokio::test]
async fn test_restart_after_lost_funding_reply_reattaches() {
    let world = World::new(never_redeem());
    let id = world.create().await;
    world.wait_state(&id, SwapState::ResponderFunded).await;

    // The process died after the responder's funding was on record as in
    // flight but before the ledger's reply was saved.
    let (world, resumed) = world
        .restart_edited(policy(), |store| {
            let mut record = store.load(&id).unwrap().unwrap();
            record.state = SwapState::InitiatorFunded;
            let leg = &mut record.responder_leg;
            leg.status = LegStatus::Funding;
            leg.contract = None;
            leg.observed = None;
            leg.cursor = EventCursor::START;
            leg.funded_at = None;
            store.save(&record).unwrap();
        })
        .await;
    assert_eq!(resumed, 1);

    let status = world.wait_settled(&id).await;
    assert_eq!(status.state, SwapState::InitiatorRedeemed);
    assert_eq!(world.b.call_counts().fund, 1);
    assert_eq!(world.b.contract_count(), 1);
    assert_eq!(world.balances(), Balances::swapped());
    world.stop();
}

#[tokio::test]
async fn test_restart_skips_settled_swaps() {
    let world = World::new(policy());
    let id = world.create().await;
    world.wait_settled(&id).await;

    let (world, resumed) = world.restart(policy()).await;
    assert_eq!(resumed, 0);
    assert_eq!(world.coordinator.active_count(), 0);
    let status = world.coordinator.get_swap_status(&id).unwrap();
    assert_eq!(status.state, SwapState::InitiatorRedeemed);
    world.stop();
}

#[tokio::test]
async fn test_restart_after_deadline_refunds() {
    let world = World::new(never_redeem());
    let id = world.create().await;
    world.wait_state(&id, SwapState::ResponderFunded).await;

    // The process is down while both deadlines pass.
    let (world, resumed) = world.restart(never_redeem()).await;
    assert_eq!(resumed, 1);
    world.advance_to(100).await;

    let status = world.wait_settled(&id).await;
    assert_eq!(status.state, SwapState::Refunded);
    assert_eq!(status.initiator_leg, LegStatus::Refunded);
    assert_eq!(status.responder_leg, LegStatus::Refunded);
    assert_eq!(world.balances(), Balances::untouched());
    world.stop();
}

#[tokio::test]
async fn test_duplicate_id_rejected_even_after_restart() {
    let world = World::new(policy());
    let id = world.create().await;
    world.wait_settled(&id).await;
    let (world, _) = world.restart(policy()).await;

    let (initiator, responder) = parties();
    let result = world
        .coordinator
        .create_swap_with_id(id, initiator, responder, timeouts())
        .await;
    assert!(matches!(result, Err(EngineError::DuplicateSwap(_))));
    world.stop();
}

// =========================================================================
// Replay idempotence
// =========================================================================

#[tokio::test]
async fn test_replayed_events_cause_no_ledger_calls() {
    let mut d = Driver::new(policy());
    d.send(SwapInput::Start).await;
    d.settle_at(0).await;
    assert_eq!(d.state(), SwapState::InitiatorRedeemed);

    let counts_a = d.a.call_counts();
    let counts_b = d.b.call_counts();
    let record = d.swap().clone();

    // Watchers lose their cursors and deliver the whole history again.
    d.rewind_watchers();
    assert!(d.observe(Leg::Initiator).await > 0);
    assert!(d.observe(Leg::Responder).await > 0);
    d.send(SwapInput::Tick).await;

    assert_eq!(d.a.call_counts().fund, counts_a.fund);
    assert_eq!(d.a.call_counts().redeem, counts_a.redeem);
    assert_eq!(d.a.call_counts().refund, counts_a.refund);
    assert_eq!(d.b.call_counts().fund, counts_b.fund);
    assert_eq!(d.b.call_counts().redeem, counts_b.redeem);
    assert_eq!(d.b.call_counts().refund, counts_b.refund);
    assert_eq!(d.swap().status(), record.status());
    assert_eq!(d.balances(), Balances::swapped());
}

// =========================================================================
// Cancellation
// =========================================================================

#[tokio::test]
async fn test_cancel_before_confirmation_still_refunds_late_funding() {
    let world = World::with_confirmations(policy(), 3);
    let id = world.create().await;
    world.wait_state(&id, SwapState::InitiatorFunding).await;

    world.coordinator.cancel_swap(&id).await.unwrap();
    let status = world.wait_state(&id, SwapState::Cancelled).await;
    assert!(status.settled_at.is_none());

    // The funding confirms after cancellation and is reclaimed at its deadline.
    world.a.mine(2);
    world
        .wait_for(&id, |s| s.initiator_leg == LegStatus::Funded)
        .await;
    assert_eq!(world.b.call_counts().fund, 0);

    world.advance_to(100).await;
    let status = world.wait_settled(&id).await;
    assert_eq!(status.state, SwapState::Cancelled);
    assert_eq!(status.initiator_leg, LegStatus::Refunded);
    assert_eq!(world.balances(), Balances::untouched());
    world.stop();
}

#[tokio::test]
async fn test_cancel_refused_once_funded() {
    let world = World::new(never_redeem());
    let id = world.create().await;
    world.wait_state(&id, SwapState::ResponderFunded).await;

    let result = world.coordinator.cancel_swap(&id).await;
    assert!(matches!(result, Err(EngineError::AlreadyFunded(_))));
    assert_eq!(
        world.coordinator.get_swap_status(&id).unwrap().state,
        SwapState::ResponderFunded
    );
    world.stop();
}

#[tokio::test]
async fn test_cancel_unknown_swap() {
    let world = World::new(policy());
    let result = world.coordinator.cancel_swap(&SwapId::new()).await;
    assert!(matches!(result, Err(EngineError::NotFound(_))));
    world.stop();
}

// =========================================================================
// Confirmation depth
// =========================================================================

#[tokio::test]
async fn test_funding_waits_for_required_confirmations() {
    let world = World::with_confirmations(policy(), 3);
    let id = world.create().await;

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(
        world.coordinator.get_swap_status(&id).unwrap().state,
        SwapState::InitiatorFunding
    );
    assert_eq!(world.b.call_counts().fund, 0);

    world.a.mine(1);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(world.b.call_counts().fund, 0);

    world.a.mine(1);
    let status = world.wait_settled(&id).await;
    assert_eq!(status.state, SwapState::InitiatorRedeemed);
    assert_eq!(world.balances(), Balances::swapped());
    world.stop();
}

#[tokio::test]
async fn test_unconfirmed_funding_expires_swap() {
    let world = World::with_confirmations(policy(), 3);
    let id = world.create().await;
    world.wait_state(&id, SwapState::InitiatorFunding).await;

    world.advance_to(100).await;
    let status = world.wait_state(&id, SwapState::Expired).await;
    assert!(status.settled_at.is_none());

    world.a.mine(2);
    let status = world.wait_settled(&id).await;
    assert_eq!(status.state, SwapState::Expired);
    assert_eq!(status.initiator_leg, LegStatus::Refunded);
    assert_eq!(world.balances(), Balances::untouched());
    world.stop();
}
