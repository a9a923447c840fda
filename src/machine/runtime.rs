//! Workflow coordinator
//!
//! Runs a [`TransferMachine`] on one tokio task. User events, invocation
//! results and the `done` timer are handled one at a time in a single
//! `select!` loop, so no two transitions ever run concurrently.
//!
//! ```text
//! WorkflowHandle::send ──mpsc──┐
//!                              ├──> TransferMachine::send ──> effects
//! invocation task ─────mpsc────┤          │                    │
//! done timer (Sleep) ──────────┘          │          spawn invocation / arm timer
//!                                          └──> watch<Snapshot>, broadcast<Transition>
//! ```
//!
//! Events that the current state does not define are dropped, not queued.
//! At most one invocation task exists at a time; it is aborted on shutdown.

use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, Instrument};
use uuid::Uuid;

use crate::config::WorkflowConfig;
use crate::error::{Error, Result};
use crate::machine::event::{Invocation, InvocationOutput, MachineEvent, UserEvent};
use crate::machine::snapshot::{Snapshot, Transition};
use crate::machine::transition::{Effect, TransferMachine};
use crate::wallet::WalletGateway;

const TRANSITION_CAPACITY: usize = 64;

/// Run one gateway call
async fn run_invocation(gateway: &dyn WalletGateway, invocation: Invocation) -> Result<InvocationOutput> {
    match invocation {
        Invocation::CreateWalletClient => gateway
            .create_wallet_client()
            .await
            .map(InvocationOutput::WalletClient),
        Invocation::GetAddress { client } => {
            client.client().get_address().await.map(InvocationOutput::Address)
        }
        Invocation::GetDecimals { client } => {
            client.client().get_decimals().await.map(InvocationOutput::Decimals)
        }
        Invocation::GetBalance {
            client,
            address,
            decimals,
        } => client
            .client()
            .get_balance(&address, decimals)
            .await
            .map(InvocationOutput::Balance),
        Invocation::SubmitTransaction { client, request } => client
            .client()
            .submit_transaction(&request)
            .await
            .map(InvocationOutput::TransactionId),
        Invocation::WaitForTxReceipt {
            client,
            transaction_id,
        } => client
            .client()
            .wait_for_receipt(&transaction_id)
            .await
            .map(InvocationOutput::Receipt),
    }
}

/// Resolve when the armed timer expires; never resolves when none is armed
async fn expire(timer: &mut Option<(u64, Pin<Box<Sleep>>)>) -> u64 {
    let id = match timer.as_mut() {
        Some((id, sleep)) => {
            sleep.as_mut().await;
            *id
        }
        None => std::future::pending().await,
    };
    *timer = None;
    id
}

/// A configured but not yet running workflow
pub struct Workflow {
    id: Uuid,
    machine: TransferMachine,
    gateway: Arc<dyn WalletGateway>,
    event_capacity: usize,
    snapshots: watch::Sender<Snapshot>,
    transitions: broadcast::Sender<Transition>,
}

impl Workflow {
    pub fn new(gateway: Arc<dyn WalletGateway>, config: &WorkflowConfig) -> Self {
        let machine = TransferMachine::new(config.done_reset());
        let (snapshots, _) = watch::channel(machine.snapshot());
        let (transitions, _) = broadcast::channel(TRANSITION_CAPACITY);

        Self {
            id: Uuid::new_v4(),
            machine,
            gateway,
            event_capacity: config.event_capacity.max(1),
            snapshots,
            transitions,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Subscribe to state changes before the workflow starts, so none are missed
    pub fn transitions(&self) -> broadcast::Receiver<Transition> {
        self.transitions.subscribe()
    }

    /// Spawn the coordinator task
    pub fn start(self) -> WorkflowHandle {
        let (events_tx, events_rx) = mpsc::channel(self.event_capacity);
        let (results_tx, results_rx) = mpsc::channel(1);
        let shutdown = CancellationToken::new();
        let span = info_span!("workflow", id = %self.id);

        let snapshots = self.snapshots.subscribe();
        let transitions = self.transitions.clone();

        let runner = Runner {
            machine: self.machine,
            gateway: self.gateway,
            events: events_rx,
            results_tx,
            results: results_rx,
            snapshots: self.snapshots,
            transitions: self.transitions,
            timer: None,
            in_flight: None,
            shutdown: shutdown.clone(),
        };

        let task = tokio::spawn(runner.run().instrument(span));

        WorkflowHandle {
            id: self.id,
            events: events_tx,
            snapshots,
            transitions,
            shutdown,
            task,
        }
    }
}

/// Presentation-side handle to a running workflow
pub struct WorkflowHandle {
    id: Uuid,
    events: mpsc::Sender<UserEvent>,
    snapshots: watch::Receiver<Snapshot>,
    transitions: broadcast::Sender<Transition>,
    shutdown: CancellationToken,
    task: JoinHandle<Result<()>>,
}

impl WorkflowHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Dispatch a user event
    pub async fn send(&self, event: UserEvent) -> Result<()> {
        self.events
            .send(event)
            .await
            .map_err(|_| Error::WorkflowClosed)
    }

    /// Latest published snapshot
    pub fn snapshot(&self) -> Snapshot {
        self.snapshots.borrow().clone()
    }

    /// Does the latest snapshot match `pattern`?
    pub fn matches(&self, pattern: &str) -> bool {
        self.snapshots.borrow().matches(pattern)
    }

    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.snapshots.clone()
    }

    pub fn transitions(&self) -> broadcast::Receiver<Transition> {
        self.transitions.subscribe()
    }

    /// Wait until a published snapshot satisfies `predicate`.
    ///
    /// Fails with [`Error::WorkflowClosed`] if the workflow ends first.
    pub async fn wait_for<F>(&self, mut predicate: F) -> Result<Snapshot>
    where
        F: FnMut(&Snapshot) -> bool,
    {
        let mut snapshots = self.snapshots.clone();
        let snapshot = snapshots
            .wait_for(|snapshot| predicate(snapshot))
            .await
            .map_err(|_| Error::WorkflowClosed)?;
        Ok(snapshot.clone())
    }

    /// Ask the coordinator to stop
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Wait for the coordinator task to finish
    pub async fn join(self) -> Result<()> {
        drop(self.events);
        self.task
            .await
            .map_err(|e| Error::Internal(format!("Workflow task failed: {}", e)))?
    }
}

struct Runner {
    machine: TransferMachine,
    gateway: Arc<dyn WalletGateway>,
    events: mpsc::Receiver<UserEvent>,
    results_tx: mpsc::Sender<MachineEvent>,
    results: mpsc::Receiver<MachineEvent>,
    snapshots: watch::Sender<Snapshot>,
    transitions: broadcast::Sender<Transition>,
    timer: Option<(u64, Pin<Box<Sleep>>)>,
    in_flight: Option<JoinHandle<()>>,
    shutdown: CancellationToken,
}

impl Runner {
    async fn run(mut self) -> Result<()> {
        info!("Workflow started");

        let effects = self.machine.start()?;
        self.apply(effects);
        self.publish();

        loop {
            let event = tokio::select! {
                _ = self.shutdown.cancelled() => break,
                Some(result) = self.results.recv() => result,
                id = expire(&mut self.timer) => MachineEvent::After { id },
                event = self.events.recv() => match event {
                    Some(event) => MachineEvent::User(event),
                    None => break,
                },
            };

            match self.machine.send(event) {
                Ok(effects) => {
                    self.apply(effects);
                    self.publish();
                }
                Err(e) => {
                    error!("Workflow fault: {}", e);
                    self.abort_in_flight();
                    self.publish();
                    return Err(e);
                }
            }
        }

        let effects = self.machine.stop();
        self.apply(effects);
        self.abort_in_flight();
        self.publish();
        info!("Workflow stopped");
        Ok(())
    }

    fn apply(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Invoke { id, invocation } => self.spawn_invocation(id, invocation),
                Effect::ArmTimer { id, after } => {
                    debug!("Arming timer {} for {:?}", id, after);
                    self.timer = Some((id, Box::pin(tokio::time::sleep(after))));
                }
                Effect::CancelTimer { id } => {
                    if matches!(self.timer, Some((armed, _)) if armed == id) {
                        debug!("Cancelling timer {}", id);
                        self.timer = None;
                    }
                }
            }
        }
    }

    fn spawn_invocation(&mut self, id: u64, invocation: Invocation) {
        let kind = invocation.kind();
        let gateway = self.gateway.clone();
        let results = self.results_tx.clone();
        debug!("Invoking {} ({})", kind, id);

        self.abort_in_flight();
        let task = tokio::spawn(
            async move {
                let event = match run_invocation(gateway.as_ref(), invocation).await {
                    Ok(output) => {
                        debug!("{} resolved", kind);
                        MachineEvent::Done { id, output }
                    }
                    Err(e) => MachineEvent::Failed {
                        id,
                        kind,
                        error: e.to_string(),
                    },
                };
                // The coordinator may already be gone
                let _ = results.send(event).await;
            }
            .in_current_span(),
        );
        self.in_flight = Some(task);
    }

    fn abort_in_flight(&mut self) {
        if let Some(task) = self.in_flight.take() {
            task.abort();
        }
    }

    /// Snapshot first: a transition subscriber must read a snapshot at
    /// least as new as the transition it was woken by
    fn publish(&mut self) {
        self.snapshots.send_replace(self.machine.snapshot());
        for transition in self.machine.take_transitions() {
            // No subscribers is fine
            let _ = self.transitions.send(transition);
        }
    }
}
