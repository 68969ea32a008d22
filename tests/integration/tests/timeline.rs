//! Integration test: timeline exploration around the refund deadlines.
//!
//! A single swap is stepped by hand while the moments at which each party
//! observes the other's ledger are varied across the deadline boundaries.
//! Whatever the schedule, a swap must end with both legs redeemed or with
//! every funded leg refunded, never one of each.

use swap_core::{Leg, SwapState};
use swap_engine::{LegStatus, SwapInput};
use swap_integration_tests::{policy, Balances, Driver, MARGIN_MS, T_LONG_MS, T_SHORT_MS};

/// When each observation happens, in ms on the shared timeline.
#[derive(Debug, Clone, Copy)]
struct Schedule {
    /// Responder sees the initiator leg funded.
    responder_sees_funding: u64,
    /// Initiator sees the responder leg funded.
    initiator_sees_funding: u64,
    /// Responder sees the initiator's redemption.
    responder_sees_secret: u64,
}

async fn play(schedule: Schedule) -> Driver {
    let mut d = Driver::new(policy());
    d.send(SwapInput::Start).await;

    d.set_time(schedule.responder_sees_funding);
    d.observe(Leg::Initiator).await;

    d.set_time(schedule.initiator_sees_funding);
    d.observe(Leg::Responder).await;

    d.set_time(schedule.responder_sees_secret);
    d.observe(Leg::Responder).await;
    d.observe(Leg::Initiator).await;

    // Long after both deadlines: everything still locked must be reclaimed.
    d.settle_at(T_LONG_MS * 3).await;
    d
}

fn schedules() -> Vec<Schedule> {
    let mut all = Vec::new();
    for t1 in [0, 10, 29, 30, 31, 45, 70, 99, 100, 150] {
        for d2 in [0, 5, 9, 10, 39, 40, 41, 80] {
            let t2 = t1 + d2;
            // The responder watches its counterparty's ledger continuously:
            // it sees the secret no later than the safety margin after its
            // own deadline.
            let latest_secret = t1 + T_SHORT_MS + MARGIN_MS - 1;
            for d3 in [0, 1, 15, 29, 30, 59] {
                let t3 = (t2 + d3).min(latest_secret.max(t2));
                all.push(Schedule {
                    responder_sees_funding: t1,
                    initiator_sees_funding: t2,
                    responder_sees_secret: t3,
                });
            }
        }
    }
    all
}

/// Both legs redeemed with funds swapped, or nothing moved at all.
fn assert_clean_end(d: &Driver, case: &dyn std::fmt::Debug) {
    let swap = d.swap();
    assert_ne!(swap.state, SwapState::PartialFailure, "{case:?}");
    assert!(swap.alarm.is_none(), "{case:?}");
    assert!(swap.is_settled(), "{case:?}: {:?}", swap.status());

    let balances = d.balances();
    let outcome = (swap.initiator_leg.status, swap.responder_leg.status);
    match outcome {
        (LegStatus::Redeemed, LegStatus::Redeemed) => {
            assert_eq!(swap.state, SwapState::InitiatorRedeemed, "{case:?}");
            assert_eq!(balances, Balances::swapped(), "{case:?}");
        }
        (LegStatus::Refunded, LegStatus::Refunded | LegStatus::Unfunded) => {
            assert_eq!(swap.state, SwapState::Refunded, "{case:?}");
            assert_eq!(balances, Balances::untouched(), "{case:?}");
        }
        (LegStatus::Unfunded, LegStatus::Unfunded) => {
            assert_eq!(swap.state, SwapState::Failed, "{case:?}");
            assert_eq!(balances, Balances::untouched(), "{case:?}");
        }
        other => panic!("{case:?} ended with legs {other:?}"),
    }
}

#[tokio::test]
async fn test_no_schedule_ends_in_partial_failure() {
    for schedule in schedules() {
        let d = play(schedule).await;
        assert_clean_end(&d, &schedule);
    }
}

/// A run of transient submission failures on one ledger, starting at a given
/// point of the happy path.
#[derive(Debug, Clone, Copy)]
struct Outage {
    on_a: bool,
    /// 0: before funding. 1: after the initiator funds. 2: after the
    /// responder funds, before the secret is revealed.
    from_stage: u8,
    failures: u32,
}

async fn play_outage(outage: Outage) -> Driver {
    let mut d = Driver::new(policy());
    let begin = |d: &Driver| {
        if outage.on_a {
            d.a.fail_next(outage.failures);
        } else {
            d.b.fail_next(outage.failures);
        }
    };

    if outage.from_stage == 0 {
        begin(&d);
    }
    d.send(SwapInput::Start).await;
    if outage.from_stage == 1 {
        begin(&d);
    }
    d.observe(Leg::Initiator).await;
    if outage.from_stage == 2 {
        begin(&d);
    }
    d.observe(Leg::Responder).await;

    // Sweep every 5ms until long after both deadlines.
    d.run_until(T_LONG_MS * 3, 5).await;
    d
}

#[tokio::test]
async fn test_no_outage_ends_in_partial_failure() {
    for on_a in [true, false] {
        for from_stage in 0..3 {
            for failures in [1, 2, 3, 4, 6, 8] {
                let outage = Outage {
                    on_a,
                    from_stage,
                    failures,
                };
                let d = play_outage(outage).await;
                assert_clean_end(&d, &outage);
            }
        }
    }
}

#[tokio::test]
async fn test_claim_survives_outage_after_reveal() {
    let mut d = Driver::new(policy());
    d.send(SwapInput::Start).await;
    d.observe(Leg::Initiator).await;
    d.observe(Leg::Responder).await;
    assert!(d.swap().revealed_secret.is_none());
    assert_eq!(d.b.call_counts().redeem, 1);

    // chain-a refuses the claim for longer than the reveal cap allows.
    d.a.fail_next(6);
    d.run_until(T_LONG_MS * 3, 5).await;

    assert_eq!(d.state(), SwapState::InitiatorRedeemed);
    assert_eq!(d.balances(), Balances::swapped());
    assert_eq!(d.a.call_counts().redeem, 7);
    assert_eq!(d.a.call_counts().refund, 0);
    assert!(d.swap().alarm.is_none());
}

#[tokio::test]
async fn test_responder_funds_only_with_enough_margin() {
    for t1 in [0, 29, 30, 31, 60] {
        let mut d = Driver::new(policy());
        d.send(SwapInput::Start).await;
        d.set_time(t1);
        d.observe(Leg::Initiator).await;

        // 100 >= t1 + 40 + 30 holds up to t1 = 30.
        let funded = d.b.call_counts().fund == 1;
        assert_eq!(funded, t1 + T_SHORT_MS + MARGIN_MS <= T_LONG_MS, "t1 = {t1}");
        assert_eq!(d.swap().decline_reason.is_some(), !funded, "t1 = {t1}");
    }
}

#[tokio::test]
async fn test_initiator_keeps_secret_after_responder_deadline() {
    let mut d = Driver::new(policy());
    d.send(SwapInput::Start).await;
    d.observe(Leg::Initiator).await;
    assert_eq!(d.state(), SwapState::ResponderFunded);

    // The responder leg's funding is only seen at its deadline.
    d.set_time(T_SHORT_MS);
    d.observe(Leg::Responder).await;
    assert_eq!(d.b.call_counts().redeem, 0);
    assert!(d.swap().revealed_secret.is_none());

    d.settle_at(T_LONG_MS).await;
    assert_eq!(d.state(), SwapState::Refunded);
    assert_eq!(d.balances(), Balances::untouched());
}

#[tokio::test]
async fn test_redemption_just_before_deadline_completes() {
    let mut d = Driver::new(policy());
    d.send(SwapInput::Start).await;
    d.observe(Leg::Initiator).await;

    d.set_time(T_SHORT_MS - 1);
    d.observe(Leg::Responder).await;
    assert_eq!(d.b.call_counts().redeem, 1);

    // Responder reacts after its own deadline but well before the initiator's.
    d.set_time(T_SHORT_MS + MARGIN_MS - 1);
    d.observe(Leg::Responder).await;
    d.settle_at(T_SHORT_MS + MARGIN_MS - 1).await;

    assert_eq!(d.state(), SwapState::InitiatorRedeemed);
    assert_eq!(d.balances(), Balances::swapped());
}

#[tokio::test]
async fn test_every_transition_is_persisted() {
    let mut d = Driver::new(policy());
    d.send(SwapInput::Start).await;
    assert_eq!(d.persisted().unwrap().state, SwapState::InitiatorFunding);

    d.observe(Leg::Initiator).await;
    assert_eq!(d.persisted().unwrap().state, SwapState::ResponderFunded);

    d.settle_at(0).await;
    let record = d.persisted().unwrap();
    assert_eq!(record.state, SwapState::InitiatorRedeemed);
    assert!(record.stored_secret.is_none());
    assert!(record.settled_at.is_some());
}
