//! The per-swap orchestrator.
//!
//! A [`SwapStateMachine`] owns one [`Swap`] record. Every input (start,
//! ledger event, sweep tick, cancellation) is applied serially through
//! [`SwapStateMachine::handle`], which folds the input into the record and
//! then re-evaluates what the swap should do next as a function of the
//! record and the current time. Ledger calls are fire-and-observe: a
//! successful submission only moves a leg to an in-flight status, and the
//! leg advances once its watcher reports the outcome. The in-flight status
//! is persisted before the call is made.

use futures::StreamExt;
use std::sync::Arc;
use swap_core::{
    Clock, CoordinatorConfig, Leg, LifecycleEvent, SwapId, SwapLifecycle, SwapState, Timestamp,
};
use swap_crypto::{Secret, SecretVault};
use swap_ledger::{ContractEvent, ContractRef, ContractWatcher, EventCursor, FundedContract, ObservedEvent};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::error::EngineError;
use crate::registry::LedgerRegistry;
use crate::store::SwapStore;
use crate::swap::{LegStatus, Swap, SwapStatus};

/// Services shared by every state machine of a coordinator.
#[derive(Clone)]
pub struct EngineContext {
    pub vault: Arc<SecretVault>,
    pub ledgers: Arc<LedgerRegistry>,
    pub store: Arc<dyn SwapStore>,
    pub clock: Arc<dyn Clock>,
    pub config: CoordinatorConfig,
}

/// Input to a swap's serial queue.
#[derive(Debug)]
pub enum SwapInput {
    /// Submit the initiator leg.
    Start,
    /// A final event from one of the swap's contract watchers.
    Ledger { leg: Leg, event: ObservedEvent },
    /// Re-evaluate deadlines.
    Tick,
    Cancel {
        reply: oneshot::Sender<Result<(), EngineError>>,
    },
}

/// Work the machine asks its runtime to start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    Watch {
        leg: Leg,
        contract: ContractRef,
        from: EventCursor,
    },
}

/// A watcher event tagged with the swap and leg it belongs to.
#[derive(Debug, Clone)]
pub struct RoutedEvent {
    pub swap_id: SwapId,
    pub leg: Leg,
    pub event: ObservedEvent,
}

pub struct SwapStateMachine {
    swap: Swap,
    ctx: EngineContext,
}

impl SwapStateMachine {
    pub fn new(swap: Swap, ctx: EngineContext) -> Self {
        Self { swap, ctx }
    }

    /// Rebuild a machine from a persisted record.
    ///
    /// Redeems and refunds that were in flight when the record was saved may
    /// have been lost, so their legs fall back to `Funded`; a repeated
    /// submission is harmless because the ledger rejects double spends. A
    /// leg still `Funding` without a contract reference is looked up on its
    /// ledger by the next input instead of being funded again. Returns the
    /// watches to restart from the persisted cursors.
    pub fn resume(mut swap: Swap, ctx: EngineContext) -> (Self, Vec<Directive>) {
        let mut directives = Vec::new();
        for leg in Leg::BOTH {
            let l = swap.leg_mut(leg);
            if matches!(l.status, LegStatus::Redeeming | LegStatus::Refunding) {
                l.status = LegStatus::Funded;
            }
            if let Some(contract) = &l.contract {
                if !l.status.is_settled() {
                    directives.push(Directive::Watch {
                        leg,
                        contract: contract.clone(),
                        from: l.cursor,
                    });
                }
            }
        }
        (Self { swap, ctx }, directives)
    }

    pub fn id(&self) -> SwapId {
        self.swap.id
    }

    pub fn swap(&self) -> &Swap {
        &self.swap
    }

    pub fn status(&self) -> SwapStatus {
        self.swap.status()
    }

    fn now(&self) -> Timestamp {
        self.ctx.clock.now()
    }

    /// Apply one input, then drive the swap as far as the current facts allow.
    pub async fn handle(&mut self, input: SwapInput) -> Vec<Directive> {
        let mut directives = Vec::new();
        match input {
            SwapInput::Start => self.start(&mut directives).await,
            SwapInput::Ledger { leg, event } => self.on_ledger_event(leg, event),
            SwapInput::Tick => {}
            SwapInput::Cancel { reply } => {
                let result = self.cancel();
                let _ = reply.send(result);
            }
        }

        self.progress(&mut directives).await;
        self.settle();
        self.swap.updated_at = self.now();
        self.persist();
        directives
    }

    fn apply(&mut self, event: LifecycleEvent) -> bool {
        let from = self.swap.state;
        match SwapLifecycle::transition(from, event) {
            Ok(to) => {
                self.swap.state = to;
                info!(swap_id = %self.swap.id, from = %from, to = %to, "swap state changed");
                true
            }
            Err(_) => false,
        }
    }

    fn persist(&self) {
        if let Err(e) = self.ctx.store.save(&self.swap) {
            error!(swap_id = %self.swap.id, error = %e, "failed to persist swap");
        }
    }

    /// Save the record ahead of a ledger submission.
    fn checkpoint(&mut self) {
        self.swap.updated_at = self.now();
        self.persist();
    }

    // ---- inputs ----

    async fn start(&mut self, directives: &mut Vec<Directive>) {
        if self.swap.state != SwapState::Created {
            debug!(swap_id = %self.swap.id, state = %self.swap.state, "start ignored");
            return;
        }
        self.apply(LifecycleEvent::FundingSubmitted);

        let deadline = self.now().saturating_add(self.swap.timeouts.t_long);
        if let Err(e) = self.fund_leg(Leg::Initiator, deadline, directives).await {
            warn!(swap_id = %self.swap.id, error = %e, "initiator funding failed");
            self.swap.failure = Some(e.to_string());
            self.apply(LifecycleEvent::FundingFailed);
        }
    }

    fn cancel(&mut self) -> Result<(), EngineError> {
        let state = self.swap.state;
        if state.is_cancellable() {
            self.apply(LifecycleEvent::Cancelled);
            info!(swap_id = %self.swap.id, "swap cancelled by owner");
            Ok(())
        } else if state.is_final() {
            Err(EngineError::AlreadySettled {
                id: self.swap.id,
                state,
            })
        } else {
            Err(EngineError::AlreadyFunded(self.swap.id))
        }
    }

    fn on_ledger_event(&mut self, leg: Leg, observed: ObservedEvent) {
        let swap_id = self.swap.id;
        let l = self.swap.leg_mut(leg);
        if observed.cursor <= l.cursor {
            debug!(
                swap_id = %swap_id,
                leg = %leg,
                cursor = %observed.cursor,
                "duplicate ledger event ignored"
            );
            return;
        }
        l.cursor = observed.cursor;

        let now = self.now();
        match observed.event {
            ContractEvent::Funded(terms) => self.on_funded(leg, terms, now),
            ContractEvent::Redeemed { secret } => self.on_redeemed(leg, secret, now),
            ContractEvent::Refunded => self.on_refunded(leg, now),
            ContractEvent::Expired => {
                let l = self.swap.leg_mut(leg);
                if l.status == LegStatus::Funded {
                    l.status = LegStatus::Expired;
                    debug!(swap_id = %swap_id, leg = %leg, "leg deadline reached on-chain");
                }
            }
        }
    }

    fn on_funded(&mut self, leg: Leg, terms: FundedContract, now: Timestamp) {
        let swap_id = self.swap.id;
        let l = self.swap.leg_mut(leg);
        if !matches!(l.status, LegStatus::Unfunded | LegStatus::Funding) {
            return;
        }
        l.status = LegStatus::Funded;
        l.funded_at = Some(now);
        info!(
            swap_id = %swap_id,
            leg = %leg,
            amount = %terms.amount,
            deadline = %terms.refund_deadline,
            "leg funded"
        );
        l.observed = Some(terms);

        self.apply(match leg {
            Leg::Initiator => LifecycleEvent::InitiatorLegFunded,
            Leg::Responder => LifecycleEvent::ResponderLegFunded,
        });
    }

    fn on_redeemed(&mut self, leg: Leg, secret: Secret, now: Timestamp) {
        let swap_id = self.swap.id;
        let valid = SecretVault::verify(&secret, &self.swap.commitment);
        let l = self.swap.leg_mut(leg);
        if l.status.is_settled() {
            return;
        }
        l.status = LegStatus::Redeemed;
        l.redeemed_at = Some(now);
        info!(swap_id = %swap_id, leg = %leg, "leg redeemed");

        if !valid {
            error!(
                swap_id = %swap_id,
                leg = %leg,
                "ledger reports a redemption whose secret does not open the commitment"
            );
        }

        match leg {
            Leg::Responder => {
                if valid {
                    self.swap.revealed_secret = Some(secret);
                }
                self.apply(LifecycleEvent::ResponderLegRedeemed);
            }
            Leg::Initiator => {
                self.apply(LifecycleEvent::InitiatorLegRedeemed);
            }
        }
    }

    fn on_refunded(&mut self, leg: Leg, now: Timestamp) {
        let swap_id = self.swap.id;
        let l = self.swap.leg_mut(leg);
        if l.status.is_settled() {
            return;
        }
        l.status = LegStatus::Refunded;
        l.refunded_at = Some(now);
        info!(swap_id = %swap_id, leg = %leg, "leg refunded");
    }

    // ---- decisions ----

    async fn progress(&mut self, directives: &mut Vec<Directive>) {
        self.reattach_lost_funding(directives).await;
        self.fund_responder_leg(directives).await;
        self.redeem_responder_leg().await;
        self.redeem_initiator_leg().await;
        self.refund_expired_legs().await;
        self.expire_unconfirmed_funding();
    }

    /// Resolve funding submissions whose reply never arrived.
    ///
    /// The contract is looked up by its terms. If the ledger has none, the
    /// submission never landed: the responder leg becomes fundable again and
    /// the swap fails if it was the initiator leg.
    async fn reattach_lost_funding(&mut self, directives: &mut Vec<Directive>) {
        for leg in Leg::BOTH {
            let l = self.swap.leg(leg);
            if l.status != LegStatus::Funding || l.contract.is_some() {
                continue;
            }
            let Some(deadline) = l.deadline else {
                continue;
            };
            let spec = l.contract_spec(self.swap.commitment, deadline);
            let adapter = match self.ctx.ledgers.adapter(&spec.ledger_id) {
                Ok(adapter) => adapter,
                Err(e) => {
                    error!(swap_id = %self.swap.id, leg = %leg, error = %e, "cannot look up funding");
                    continue;
                }
            };

            match adapter.find_contract(&spec).await {
                Ok(Some(contract)) => {
                    info!(swap_id = %self.swap.id, leg = %leg, contract = %contract, "reattached to submitted funding");
                    let l = self.swap.leg_mut(leg);
                    l.contract = Some(contract.clone());
                    directives.push(Directive::Watch {
                        leg,
                        contract,
                        from: l.cursor,
                    });
                }
                Ok(None) => {
                    warn!(swap_id = %self.swap.id, leg = %leg, "funding submission never reached the ledger");
                    let l = self.swap.leg_mut(leg);
                    l.status = LegStatus::Unfunded;
                    l.deadline = None;
                    if leg == Leg::Initiator {
                        self.swap.failure = Some("initiator funding never reached the ledger".into());
                        self.apply(LifecycleEvent::FundingFailed);
                    }
                }
                Err(e) => {
                    warn!(swap_id = %self.swap.id, leg = %leg, error = %e, "funding lookup failed; retrying on next tick");
                }
            }
        }
    }

    /// Responder side: fund once the initiator leg is final and acceptable.
    async fn fund_responder_leg(&mut self, directives: &mut Vec<Directive>) {
        if self.swap.state != SwapState::InitiatorFunded
            || self.swap.responder_leg.status != LegStatus::Unfunded
            || self.swap.decline_reason.is_some()
        {
            return;
        }

        let deadline = self.now().saturating_add(self.swap.timeouts.t_short);
        if let Err(reason) = self.check_initiator_leg(deadline) {
            warn!(swap_id = %self.swap.id, reason = %reason, "responder declines to fund");
            self.swap.decline_reason = Some(reason);
            return;
        }

        match self.fund_leg(Leg::Responder, deadline, directives).await {
            Ok(()) => {}
            Err(EngineError::Ledger(e)) if e.is_transient() => {
                warn!(swap_id = %self.swap.id, error = %e, "responder funding unavailable; retrying on next tick");
            }
            Err(e) => {
                warn!(swap_id = %self.swap.id, error = %e, "responder funding rejected");
                self.swap.decline_reason = Some(format!("responder funding failed: {e}"));
            }
        }
    }

    /// What the responder verifies before locking its own funds.
    fn check_initiator_leg(&self, responder_deadline: Timestamp) -> Result<(), String> {
        let terms = self
            .swap
            .initiator_leg
            .observed
            .as_ref()
            .ok_or_else(|| "initiator leg terms not observed".to_string())?;
        if terms.amount != self.swap.initiator.amount {
            return Err(format!(
                "initiator leg locks {} instead of {}",
                terms.amount, self.swap.initiator.amount
            ));
        }
        if terms.commitment != self.swap.commitment {
            return Err("initiator leg commitment does not match the swap".into());
        }
        if terms.redeemer != self.swap.responder.receive_address {
            return Err("initiator leg does not pay the responder".into());
        }
        let window = self
            .swap
            .timeouts
            .t_long
            .saturating_sub(self.swap.timeouts.t_short);
        let now = self.now();
        if terms.refund_deadline.saturating_duration_since(now) < window {
            return Err(format!(
                "initiator deadline {} is less than {:?} away at {}",
                terms.refund_deadline, window, now
            ));
        }
        let margin = self.ctx.config.min_safety_margin();
        if terms.refund_deadline < responder_deadline.saturating_add(margin) {
            return Err(format!(
                "initiator deadline {} is less than {:?} after responder deadline {}",
                terms.refund_deadline, margin, responder_deadline
            ));
        }
        Ok(())
    }

    /// What the initiator verifies before revealing its secret.
    fn check_responder_leg(&self) -> Result<(), String> {
        let terms = self
            .swap
            .responder_leg
            .observed
            .as_ref()
            .ok_or_else(|| "responder leg terms not observed".to_string())?;
        if terms.amount != self.swap.responder.amount {
            return Err(format!(
                "responder leg locks {} instead of {}",
                terms.amount, self.swap.responder.amount
            ));
        }
        if terms.commitment != self.swap.commitment {
            return Err("responder leg commitment does not match the swap".into());
        }
        if terms.redeemer != self.swap.initiator.receive_address {
            return Err("responder leg does not pay the initiator".into());
        }
        let initiator_deadline = self
            .swap
            .deadline_initiator()
            .ok_or_else(|| "initiator deadline unknown".to_string())?;
        let margin = self.ctx.config.min_safety_margin();
        if terms.refund_deadline.saturating_add(margin) > initiator_deadline {
            return Err(format!(
                "responder deadline {} is less than {:?} before initiator deadline {}",
                terms.refund_deadline, margin, initiator_deadline
            ));
        }
        Ok(())
    }

    /// Whether `leg` is ready for a (re)submitted redeem.
    fn redeem_due(&self, leg: Leg) -> bool {
        let l = self.swap.leg(leg);
        match l.status {
            LegStatus::Funded => true,
            LegStatus::Redeeming => l.submission_stale(self.now(), self.ctx.config.resubmit_after()),
            _ => false,
        }
    }

    /// Initiator side: reveal the secret on the responder leg.
    async fn redeem_responder_leg(&mut self) {
        let due = self.redeem_due(Leg::Responder);
        let leg = &self.swap.responder_leg;
        if self.swap.state != SwapState::ResponderFunded
            || !due
            || self.swap.decline_reason.is_some()
            || leg.redeem_attempts >= self.ctx.config.max_redeem_attempts
        {
            return;
        }
        let Some(deadline) = leg.effective_deadline() else {
            return;
        };
        if self.now() >= deadline {
            debug!(swap_id = %self.swap.id, "responder deadline passed; secret stays hidden");
            return;
        }

        if let Err(reason) = self.check_responder_leg() {
            warn!(swap_id = %self.swap.id, reason = %reason, "initiator declines to redeem");
            self.swap.decline_reason = Some(reason);
            return;
        }
        let secret = match self.ctx.vault.reveal(self.swap.id) {
            Ok(secret) => secret,
            Err(e) => {
                error!(swap_id = %self.swap.id, error = %e, "initiator secret unavailable");
                self.swap.decline_reason = Some(format!("secret unavailable: {e}"));
                return;
            }
        };
        self.redeem_leg(Leg::Responder, secret).await;
    }

    /// Responder side: claim the initiator leg with the published secret.
    ///
    /// Once the secret is public the claim is retried until the initiator's
    /// deadline, however often the ledger fails.
    async fn redeem_initiator_leg(&mut self) {
        let Some(secret) = self.swap.revealed_secret.clone() else {
            return;
        };
        if !self.redeem_due(Leg::Initiator) {
            return;
        }
        let Some(deadline) = self.swap.initiator_leg.effective_deadline() else {
            return;
        };
        if self.now() >= deadline {
            warn!(swap_id = %self.swap.id, "initiator deadline passed before the responder could redeem");
            return;
        }
        self.redeem_leg(Leg::Initiator, secret).await;
    }

    async fn refund_expired_legs(&mut self) {
        let now = self.now();
        for leg in Leg::BOTH {
            let l = self.swap.leg(leg);
            let eligible = match l.status {
                LegStatus::Funded | LegStatus::Expired | LegStatus::Redeeming => true,
                LegStatus::Refunding => {
                    l.submission_stale(now, self.ctx.config.resubmit_after())
                }
                _ => false,
            };
            let Some(deadline) = l.effective_deadline() else {
                continue;
            };
            if !eligible || now < deadline {
                continue;
            }

            if self.ctx.config.auto_refund {
                self.refund_leg(leg).await;
                continue;
            }

            let swap_id = self.swap.id;
            let l = self.swap.leg_mut(leg);
            if l.status == LegStatus::Funded {
                l.status = LegStatus::Expired;
                warn!(swap_id = %swap_id, leg = %leg, "deadline passed; refund left to the operator");
            }
            self.apply(LifecycleEvent::DeadlineExpired);
        }
    }

    /// The initiator leg never became final before its own deadline.
    fn expire_unconfirmed_funding(&mut self) {
        if self.swap.state != SwapState::InitiatorFunding {
            return;
        }
        let Some(deadline) = self.swap.initiator_leg.deadline else {
            return;
        };
        if self.now() >= deadline {
            warn!(swap_id = %self.swap.id, "initiator leg not confirmed before its deadline");
            self.apply(LifecycleEvent::DeadlineExpired);
        }
    }

    /// Derive the outcome from the leg statuses.
    fn settle(&mut self) {
        let a = self.swap.initiator_leg.status;
        let b = self.swap.responder_leg.status;
        let redeemed = [a, b].iter().filter(|s| **s == LegStatus::Redeemed).count();
        let refunded = [a, b].iter().filter(|s| **s == LegStatus::Refunded).count();

        if redeemed == 1 && refunded == 1 {
            if self.swap.alarm.is_none() {
                let alarm = format!("initiator leg {a}, responder leg {b}");
                error!(
                    swap_id = %self.swap.id,
                    alarm = %alarm,
                    "PARTIAL FAILURE: one leg redeemed while the other was refunded"
                );
                self.swap.alarm = Some(alarm);
                self.apply(LifecycleEvent::ProtocolViolation);
            }
        } else if refunded > 0
            && redeemed == 0
            && !self.swap.initiator_leg.holds_funds()
            && !self.swap.responder_leg.holds_funds()
        {
            self.apply(LifecycleEvent::LegsRefunded);
        }

        if self.swap.settled_at.is_none() && self.swap.is_settled() {
            self.swap.settled_at = Some(self.now());
            self.swap.stored_secret = None;
            self.ctx.vault.discard(self.swap.id);
            info!(swap_id = %self.swap.id, state = %self.swap.state, "swap settled");
        }
    }

    // ---- ledger calls ----

    async fn fund_leg(
        &mut self,
        leg: Leg,
        deadline: Timestamp,
        directives: &mut Vec<Directive>,
    ) -> Result<(), EngineError> {
        let commitment = self.swap.commitment;
        let swap_id = self.swap.id;
        let l = self.swap.leg_mut(leg);
        let spec = l.contract_spec(commitment, deadline);
        let adapter = self.ctx.ledgers.adapter(&spec.ledger_id)?;

        l.status = LegStatus::Funding;
        l.deadline = Some(deadline);
        self.checkpoint();
        match adapter.fund(&spec).await {
            Ok(contract) => {
                info!(swap_id = %swap_id, leg = %leg, contract = %contract, deadline = %deadline, "funding submitted");
                let l = self.swap.leg_mut(leg);
                l.contract = Some(contract.clone());
                directives.push(Directive::Watch {
                    leg,
                    contract,
                    from: l.cursor,
                });
                Ok(())
            }
            Err(e) => {
                let l = self.swap.leg_mut(leg);
                l.status = LegStatus::Unfunded;
                l.deadline = None;
                Err(e.into())
            }
        }
    }

    async fn redeem_leg(&mut self, leg: Leg, secret: Secret) {
        let swap_id = self.swap.id;
        let now = self.now();
        let l = self.swap.leg_mut(leg);
        let Some(contract) = l.contract.clone() else {
            return;
        };
        let before = l.status;
        l.status = LegStatus::Redeeming;
        l.redeem_attempts += 1;
        let attempt = l.redeem_attempts;
        l.submitted_at = Some(now);
        self.checkpoint();

        let result = match self.ctx.ledgers.adapter(&contract.ledger_id) {
            Ok(adapter) => adapter.redeem(&contract, &secret).await.map_err(EngineError::from),
            Err(e) => Err(e),
        };
        match result {
            Ok(receipt) => {
                info!(swap_id = %swap_id, leg = %leg, tx = %receipt.tx_ref, "redeem submitted");
            }
            Err(e) => {
                warn!(swap_id = %swap_id, leg = %leg, attempt, error = %e, "redeem failed");
                self.swap.leg_mut(leg).status = before;
            }
        }
    }

    async fn refund_leg(&mut self, leg: Leg) {
        let swap_id = self.swap.id;
        let now = self.now();
        let l = self.swap.leg_mut(leg);
        let Some(contract) = l.contract.clone() else {
            return;
        };
        let before = l.status;
        l.status = LegStatus::Refunding;
        l.submitted_at = Some(now);
        self.checkpoint();

        let result = match self.ctx.ledgers.adapter(&contract.ledger_id) {
            Ok(adapter) => adapter.refund(&contract).await.map_err(EngineError::from),
            Err(e) => Err(e),
        };
        match result {
            Ok(receipt) => {
                info!(swap_id = %swap_id, leg = %leg, tx = %receipt.tx_ref, "refund submitted");
            }
            Err(e) => {
                warn!(swap_id = %swap_id, leg = %leg, error = %e, "refund failed");
                self.swap.leg_mut(leg).status = before;
            }
        }
    }

    // ---- runtime ----

    /// Actor loop: apply queued inputs one at a time until the queue closes.
    ///
    /// Watchers started for this swap forward their events to `events`; they
    /// are stopped when the loop ends or the task is aborted.
    pub async fn run(
        mut self,
        mut inputs: mpsc::Receiver<SwapInput>,
        initial: Vec<Directive>,
        events: mpsc::Sender<RoutedEvent>,
        status: watch::Sender<SwapStatus>,
    ) {
        let mut watchers = JoinSet::new();
        self.spawn_watchers(initial, &events, &mut watchers);
        status.send_replace(self.status());

        while let Some(input) = inputs.recv().await {
            let directives = self.handle(input).await;
            self.spawn_watchers(directives, &events, &mut watchers);
            status.send_replace(self.status());
        }

        watchers.abort_all();
        debug!(swap_id = %self.swap.id, "swap task stopped");
    }

    fn spawn_watchers(
        &self,
        directives: Vec<Directive>,
        events: &mpsc::Sender<RoutedEvent>,
        watchers: &mut JoinSet<()>,
    ) {
        for directive in directives {
            let Directive::Watch { leg, contract, from } = directive;
            let (adapter, config) = match (
                self.ctx.ledgers.adapter(&contract.ledger_id),
                self.ctx.ledgers.watcher_config(&contract.ledger_id),
            ) {
                (Ok(adapter), Ok(config)) => (adapter, config),
                (Err(e), _) | (_, Err(e)) => {
                    error!(swap_id = %self.swap.id, contract = %contract, error = %e, "cannot watch contract");
                    continue;
                }
            };

            debug!(swap_id = %self.swap.id, leg = %leg, contract = %contract, from = %from, "watching contract");
            let swap_id = self.swap.id;
            let events = events.clone();
            let mut stream = ContractWatcher::new(contract, from, config).into_stream(adapter.as_ref());
            watchers.spawn(async move {
                while let Some(event) = stream.next().await {
                    if events.send(RoutedEvent { swap_id, leg, event }).await.is_err() {
                        break;
                    }
                }
            });
        }
    }
}
