//! Self-contained demonstration swap between two simulated ledgers.
//!
//! Time is simulated: the demo advances a `ManualClock` in small steps and
//! mines a block on every ledger per step, so deadline-driven scenarios
//! finish in seconds.

use anyhow::Result;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use swap_core::{Amount, ManualClock, Role, SwapParty, SwapTimeouts};
use swap_engine::{MemoryStore, SwapCoordinator, SwapStatus};
use swap_ledger::{RetryConfig, SimulatedLedger};

use crate::config::NodeConfig;
use crate::node::simulated_ledgers;

const STEP_WALL_TIME: Duration = Duration::from_millis(25);
const MAX_STEPS: usize = 2_000;
const DEMO_POLL_INTERVAL_MS: u64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Scenario {
    /// Both parties follow the protocol.
    Happy,
    /// The responder's ledger refuses its funding; the initiator is refunded.
    ResponderAbsent,
}

#[derive(Debug, Clone, clap::Args)]
pub struct DemoArgs {
    #[arg(long, value_enum, default_value = "happy")]
    pub scenario: Scenario,
    /// Funding address of the initiator on the first ledger.
    #[arg(long, default_value = "alice")]
    pub initiator: String,
    /// Funding address of the responder on the second ledger.
    #[arg(long, default_value = "bob")]
    pub responder: String,
    #[arg(long, default_value_t = 100)]
    pub amount_initiator: u64,
    #[arg(long, default_value_t = 250)]
    pub amount_responder: u64,
    /// Initiator leg timeout (ms).
    #[arg(long, default_value_t = 120_000)]
    pub t_long_ms: u64,
    /// Responder leg timeout (ms).
    #[arg(long, default_value_t = 60_000)]
    pub t_short_ms: u64,
}

/// What the demo prints.
#[derive(Debug, Serialize)]
pub struct DemoReport {
    pub status: SwapStatus,
    /// Ledger id -> address -> balance after settlement.
    pub balances: BTreeMap<String, BTreeMap<String, u128>>,
}

pub async fn run_demo(config: &NodeConfig, args: &DemoArgs) -> Result<DemoReport> {
    if config.ledgers.len() < 2 {
        anyhow::bail!("the demo needs two configured ledgers");
    }
    let mut ledger_configs = config.ledgers[..2].to_vec();
    for ledger in &mut ledger_configs {
        ledger.poll_interval_ms = DEMO_POLL_INTERVAL_MS;
    }

    let clock = Arc::new(ManualClock::new());
    let (ledgers, registry) =
        simulated_ledgers(&ledger_configs, RetryConfig::from(config.retry.clone()), clock.clone());

    let mut policy = config.coordinator.clone();
    policy.sweep_interval_ms = DEMO_POLL_INTERVAL_MS;
    // Keep the settled swap addressable until the report is taken.
    policy.terminal_grace_ms = u64::MAX;
    let coordinator = Arc::new(SwapCoordinator::new(
        registry,
        Arc::new(MemoryStore::new()),
        clock.clone(),
        policy,
    ));
    let runner = {
        let coordinator = coordinator.clone();
        tokio::spawn(async move { coordinator.run(std::future::pending()).await })
    };

    if args.scenario == Scenario::ResponderAbsent {
        ledgers[1].reject_funding(true);
    }

    let initiator = SwapParty::new(
        Role::Initiator,
        ledger_configs[0].ledger_id(),
        args.initiator.clone(),
        args.initiator.clone(),
        Amount::new(u128::from(args.amount_initiator)),
    );
    let responder = SwapParty::new(
        Role::Responder,
        ledger_configs[1].ledger_id(),
        args.responder.clone(),
        args.responder.clone(),
        Amount::new(u128::from(args.amount_responder)),
    );
    let timeouts = SwapTimeouts::new(
        Duration::from_millis(args.t_long_ms),
        Duration::from_millis(args.t_short_ms),
    );
    let id = coordinator.create_swap(initiator, responder, timeouts).await?;
    tracing::info!(swap_id = %id, scenario = ?args.scenario, "demo swap created");

    let step = Duration::from_millis((args.t_short_ms / 50).max(1));
    let mut settled = None;
    for _ in 0..MAX_STEPS {
        let waited = tokio::time::timeout(
            STEP_WALL_TIME,
            coordinator.wait_until(&id, |s| s.settled_at.is_some()),
        )
        .await;
        if let Ok(status) = waited {
            settled = Some(status?);
            break;
        }
        clock.advance(step);
        for ledger in &ledgers {
            ledger.mine(1);
        }
    }

    coordinator.shutdown();
    runner.abort();

    let status = match settled {
        Some(status) => status,
        None => {
            let status = coordinator.get_swap_status(&id)?;
            anyhow::bail!("demo swap did not settle; last state {}", status.state);
        }
    };
    if let Some(alarm) = &status.alarm {
        tracing::error!(swap_id = %id, alarm = %alarm, "demo swap settled inconsistently");
    }

    let addresses = [args.initiator.as_str(), args.responder.as_str()];
    Ok(DemoReport {
        status,
        balances: balances(&ledgers, &addresses),
    })
}

fn balances(
    ledgers: &[SimulatedLedger],
    addresses: &[&str],
) -> BTreeMap<String, BTreeMap<String, u128>> {
    use swap_ledger::LedgerAdapter;

    ledgers
        .iter()
        .map(|ledger| {
            let per_address = addresses
                .iter()
                .map(|address| (address.to_string(), ledger.balance(address)))
                .collect();
            (ledger.ledger_id().to_string(), per_address)
        })
        .collect()
}
