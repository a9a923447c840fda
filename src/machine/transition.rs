//! Transition dispatcher
//!
//! `TransferMachine` is synchronous and does no I/O. Every event goes
//! through [`TransferMachine::send`], which updates state and context and
//! returns the effects the runtime must carry out: start one gateway call,
//! arm the `done` timer, or cancel it.
//!
//! Invocations and timers are tagged with increasing ids. A completion whose
//! id is not the one currently awaited belongs to a state that has already
//! been left and is dropped.

use std::time::Duration;
use tracing::{debug, error, warn};

use crate::error::{Error, Result};
use crate::machine::context::{
    WorkflowContext, ADDRESS_LENGTH_ERROR, CONNECT_WALLET_ERROR, FETCH_ADDRESS_ERROR,
    FETCH_BALANCE_ERROR, INVALID_AMOUNT_ERROR, NOT_0X_ADDRESS_ERROR, SEND_TRANSACTION_ERROR,
};
use crate::machine::event::{Invocation, InvocationKind, InvocationOutput, MachineEvent, UserEvent};
use crate::machine::guards;
use crate::machine::snapshot::{Snapshot, Transition, WorkflowStatus};
use crate::machine::state::{AddressCheck, AmountCheck, WalletFailure, WalletStep, WorkflowState};
use crate::wallet::{TransferRequest, WalletHandle};

/// Default time spent in `done` before returning to `input`
pub const DONE_RESET: Duration = Duration::from_millis(2000);

/// Work the runtime performs on behalf of the machine
#[derive(Debug, Clone)]
pub enum Effect {
    Invoke { id: u64, invocation: Invocation },
    ArmTimer { id: u64, after: Duration },
    CancelTimer { id: u64 },
}

pub struct TransferMachine {
    state: WorkflowState,
    context: WorkflowContext,
    status: WorkflowStatus,
    done_reset: Duration,
    next_id: u64,
    /// Invocation currently awaited
    pending: Option<(u64, InvocationKind)>,
    /// Timer currently armed
    timer: Option<u64>,
    started: bool,
    transitions: Vec<Transition>,
}

impl TransferMachine {
    pub fn new(done_reset: Duration) -> Self {
        Self {
            state: WorkflowState::INITIAL,
            context: WorkflowContext::default(),
            status: WorkflowStatus::Active,
            done_reset,
            next_id: 0,
            pending: None,
            timer: None,
            started: false,
            transitions: Vec::new(),
        }
    }

    pub fn state(&self) -> WorkflowState {
        self.state
    }

    pub fn context(&self) -> &WorkflowContext {
        &self.context
    }

    pub fn status(&self) -> &WorkflowStatus {
        &self.status
    }

    pub fn matches(&self, pattern: &str) -> bool {
        self.state.matches(pattern)
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            state: self.state,
            context: self.context.clone(),
            status: self.status.clone(),
        }
    }

    /// Drain the transitions recorded since the last call
    pub fn take_transitions(&mut self) -> Vec<Transition> {
        std::mem::take(&mut self.transitions)
    }

    /// Run the entry actions of the initial state
    pub fn start(&mut self) -> Result<Vec<Effect>> {
        let mut effects = Vec::new();
        if self.started {
            return Ok(effects);
        }
        self.started = true;
        self.run_entry(&mut effects)?;
        Ok(effects)
    }

    /// Mark the workflow as no longer accepting events
    pub fn stop(&mut self) -> Vec<Effect> {
        let mut effects = Vec::new();
        if self.status == WorkflowStatus::Active {
            self.status = WorkflowStatus::Stopped;
        }
        self.pending = None;
        if let Some(id) = self.timer.take() {
            effects.push(Effect::CancelTimer { id });
        }
        effects
    }

    /// Dispatch one event.
    ///
    /// Returns `Err(Error::UnhandledFailure)` when `getDecimals` or
    /// `waitForTxReceipt` rejects; the machine is faulted afterwards and
    /// ignores further events.
    pub fn send(&mut self, event: MachineEvent) -> Result<Vec<Effect>> {
        let mut effects = Vec::new();

        if self.status != WorkflowStatus::Active {
            debug!("Ignoring {:?}: workflow is {:?}", event, self.status);
            return Ok(effects);
        }

        match event {
            MachineEvent::User(event) => self.on_user_event(event, &mut effects)?,
            MachineEvent::Done { id, output } => {
                if self.take_pending(id) {
                    self.on_done(output, &mut effects)?;
                }
            }
            MachineEvent::Failed { id, kind, error } => {
                if self.take_pending(id) {
                    self.on_failed(kind, error, &mut effects)?;
                }
            }
            MachineEvent::After { id } => {
                if self.timer == Some(id) && self.state == WorkflowState::Done {
                    self.timer = None;
                    self.transition(WorkflowState::Input, &mut effects)?;
                } else {
                    debug!("Discarding stale timer {}", id);
                }
            }
        }

        Ok(effects)
    }

    fn take_pending(&mut self, id: u64) -> bool {
        match self.pending {
            Some((pending, _)) if pending == id => {
                self.pending = None;
                true
            }
            _ => {
                debug!("Discarding stale completion of invocation {}", id);
                false
            }
        }
    }

    fn on_user_event(&mut self, event: UserEvent, effects: &mut Vec<Effect>) -> Result<()> {
        // Any event leaves `done` early; `input` then handles it
        if self.state == WorkflowState::Done {
            self.transition(WorkflowState::Input, effects)?;
        }

        match (self.state, event) {
            (
                WorkflowState::Input | WorkflowState::Validate { .. },
                UserEvent::InputToAddress(to_address),
            ) => {
                self.context.to_address = to_address;
            }
            (WorkflowState::Input | WorkflowState::Validate { .. }, UserEvent::InputAmount(amount)) => {
                self.context.amount = amount;
            }
            (WorkflowState::Input, UserEvent::Submit) => {
                self.enter_validate(effects)?;
            }
            // Re-run both guard chains from their initial sub-states
            (WorkflowState::Validate { .. }, UserEvent::Submit) => {
                self.enter_validate(effects)?;
            }
            (state, event) => {
                debug!("Ignoring {} in {}", event.event_type(), state);
            }
        }

        Ok(())
    }

    fn on_done(&mut self, output: InvocationOutput, effects: &mut Vec<Effect>) -> Result<()> {
        match (self.state, output) {
            (WorkflowState::Wallet(WalletStep::CreateWalletClient), InvocationOutput::WalletClient(client)) => {
                self.context.wallet_client = Some(client);
                self.transition(WorkflowState::Wallet(WalletStep::GetAddress), effects)
            }
            (WorkflowState::Wallet(WalletStep::GetAddress), InvocationOutput::Address(address)) => {
                self.context.address = address;
                self.transition(WorkflowState::Wallet(WalletStep::GetDecimals), effects)
            }
            (WorkflowState::Wallet(WalletStep::GetDecimals), InvocationOutput::Decimals(decimals)) => {
                self.context.decimals = decimals;
                self.transition(WorkflowState::Wallet(WalletStep::GetBalance), effects)
            }
            (WorkflowState::Wallet(WalletStep::GetBalance), InvocationOutput::Balance(balance)) => {
                self.context.balance = balance;
                self.transition(WorkflowState::Wallet(WalletStep::Success), effects)
            }
            (WorkflowState::Submit, InvocationOutput::TransactionId(transaction_id)) => {
                self.context.transaction_id = Some(transaction_id);
                self.context.to_address.clear();
                self.context.amount = 0.0;
                self.transition(WorkflowState::WaitForTxReceipt, effects)
            }
            (WorkflowState::WaitForTxReceipt, InvocationOutput::Receipt(_)) => {
                self.context.wallet_error.clear();
                self.transition(WorkflowState::Done, effects)
            }
            (state, output) => {
                let message = format!("Invocation output {:?} does not belong to {}", output, state);
                error!("{}", message);
                self.status = WorkflowStatus::Faulted {
                    step: state.name().to_string(),
                    message: message.clone(),
                };
                Err(Error::Internal(message))
            }
        }
    }

    fn on_failed(&mut self, kind: InvocationKind, error: String, effects: &mut Vec<Effect>) -> Result<()> {
        let (failure, message) = match self.state {
            WorkflowState::Wallet(WalletStep::CreateWalletClient) => {
                (WalletFailure::CreateWalletClient, CONNECT_WALLET_ERROR)
            }
            WorkflowState::Wallet(WalletStep::GetAddress) => {
                (WalletFailure::GetAddress, FETCH_ADDRESS_ERROR)
            }
            WorkflowState::Wallet(WalletStep::GetBalance) => {
                (WalletFailure::GetBalance, FETCH_BALANCE_ERROR)
            }
            WorkflowState::Submit => {
                warn!("Transaction submission failed: {}", error);
                self.context.wallet_error = SEND_TRANSACTION_ERROR.to_string();
                return self.transition(WorkflowState::Input, effects);
            }
            // getDecimals and waitForTxReceipt have no failure transition
            state => {
                error!("Unhandled failure of {} in {}: {}", kind, state, error);
                self.status = WorkflowStatus::Faulted {
                    step: kind.to_string(),
                    message: error.clone(),
                };
                return Err(Error::UnhandledFailure {
                    step: kind.to_string(),
                    message: error,
                });
            }
        };

        warn!("Wallet setup failed at {}: {}", kind, error);
        self.context.wallet_error = message.to_string();
        self.transition(WorkflowState::Wallet(WalletStep::Error(failure)), effects)
    }

    /// Enter `validate` with both regions at their initial sub-state and
    /// settle the eventless guard chains
    fn enter_validate(&mut self, effects: &mut Vec<Effect>) -> Result<()> {
        let address = self.settle_address(AddressCheck::INITIAL);
        let amount = self.settle_amount(AmountCheck::INITIAL);

        self.transition(WorkflowState::Validate { address, amount }, effects)
    }

    fn settle_address(&mut self, mut region: AddressCheck) -> AddressCheck {
        loop {
            region = match region {
                AddressCheck::Is0xAddress => {
                    if guards::is_0x_address(&self.context.to_address) {
                        AddressCheck::Is42CharAddress
                    } else {
                        self.context.address_error = NOT_0X_ADDRESS_ERROR.to_string();
                        AddressCheck::Error
                    }
                }
                AddressCheck::Is42CharAddress => {
                    if guards::is_42_char_address(&self.context.to_address) {
                        self.context.address_error.clear();
                        AddressCheck::Success
                    } else {
                        self.context.address_error = ADDRESS_LENGTH_ERROR.to_string();
                        AddressCheck::Error
                    }
                }
                settled => return settled,
            };
        }
    }

    fn settle_amount(&mut self, region: AmountCheck) -> AmountCheck {
        match region {
            AmountCheck::Check => {
                if guards::minimum_funds(self.context.amount) {
                    AmountCheck::Success
                } else {
                    self.context.amount_error = INVALID_AMOUNT_ERROR.to_string();
                    AmountCheck::Error
                }
            }
            settled => settled,
        }
    }

    /// Exit the current state, enter `target` and run its entry actions
    fn transition(&mut self, target: WorkflowState, effects: &mut Vec<Effect>) -> Result<()> {
        let from = self.state;

        if from == WorkflowState::Done && target != WorkflowState::Done {
            if let Some(id) = self.timer.take() {
                effects.push(Effect::CancelTimer { id });
            }
        }

        debug!("Transition {} -> {}", from, target);
        self.state = target;
        self.transitions.push(Transition { from, to: target });

        self.run_entry(effects)
    }

    fn run_entry(&mut self, effects: &mut Vec<Effect>) -> Result<()> {
        match self.state {
            WorkflowState::Wallet(WalletStep::CreateWalletClient) => {
                self.invoke(Invocation::CreateWalletClient, effects);
            }
            WorkflowState::Wallet(WalletStep::GetAddress) => {
                let client = self.client()?;
                self.invoke(Invocation::GetAddress { client }, effects);
            }
            WorkflowState::Wallet(WalletStep::GetDecimals) => {
                let client = self.client()?;
                self.invoke(Invocation::GetDecimals { client }, effects);
            }
            WorkflowState::Wallet(WalletStep::GetBalance) => {
                let client = self.client()?;
                self.invoke(
                    Invocation::GetBalance {
                        client,
                        address: self.context.address.clone(),
                        decimals: self.context.decimals,
                    },
                    effects,
                );
            }
            // Final sub-state: the compound `wallet` is done
            WorkflowState::Wallet(WalletStep::Success) => {
                return self.transition(WorkflowState::Input, effects);
            }
            WorkflowState::Validate {
                address: AddressCheck::Success,
                amount: AmountCheck::Success,
            } => {
                self.context.address_error.clear();
                self.context.amount_error.clear();
                return self.transition(WorkflowState::Submit, effects);
            }
            WorkflowState::Submit => {
                let client = self.client()?;
                self.context.transaction_id = None;
                let request = TransferRequest {
                    address: self.context.address.clone(),
                    to_address: self.context.to_address.clone(),
                    amount: self.context.amount,
                    decimals: self.context.decimals,
                };
                self.invoke(Invocation::SubmitTransaction { client, request }, effects);
            }
            WorkflowState::WaitForTxReceipt => {
                let client = self.client()?;
                let transaction_id = self.context.transaction_id.clone().ok_or_else(|| {
                    Error::Internal("waitForTxReceipt entered without a transaction id".to_string())
                })?;
                self.invoke(
                    Invocation::WaitForTxReceipt {
                        client,
                        transaction_id,
                    },
                    effects,
                );
            }
            WorkflowState::Done => {
                let id = self.next_id();
                self.timer = Some(id);
                effects.push(Effect::ArmTimer {
                    id,
                    after: self.done_reset,
                });
            }
            WorkflowState::Wallet(WalletStep::Error(_))
            | WorkflowState::Input
            | WorkflowState::Validate { .. } => {}
        }
        Ok(())
    }

    fn invoke(&mut self, invocation: Invocation, effects: &mut Vec<Effect>) {
        let id = self.next_id();
        self.pending = Some((id, invocation.kind()));
        effects.push(Effect::Invoke { id, invocation });
    }

    fn client(&self) -> Result<WalletHandle> {
        self.context
            .wallet_client
            .clone()
            .ok_or_else(|| Error::Internal("wallet client not initialised".to_string()))
    }

    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

impl Default for TransferMachine {
    fn default() -> Self {
        Self::new(DONE_RESET)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machine::context::WorkflowContext;
    use crate::wallet::{SimulatedGateway, TransferReceipt, WalletGateway};

    const VALID_ADDRESS: &str = "0xABCDEF0123456789ABCDEF0123456789ABCDEF01";

    async fn handle() -> WalletHandle {
        SimulatedGateway::new(6, 100.0)
            .unwrap()
            .create_wallet_client()
            .await
            .unwrap()
    }

    /// Id of the single invocation in `effects`
    fn invoked(effects: &[Effect], kind: InvocationKind) -> u64 {
        match effects {
            [Effect::Invoke { id, invocation }] if invocation.kind() == kind => *id,
            other => panic!("expected one {} invocation, got {:?}", kind, other),
        }
    }

    fn done(id: u64, output: InvocationOutput) -> MachineEvent {
        MachineEvent::Done { id, output }
    }

    fn failed(id: u64, kind: InvocationKind) -> MachineEvent {
        MachineEvent::Failed {
            id,
            kind,
            error: "rejected".to_string(),
        }
    }

    /// Drive a fresh machine through wallet setup into `input`
    async fn connected() -> TransferMachine {
        let mut machine = TransferMachine::default();
        let effects = machine.start().unwrap();
        let id = invoked(&effects, InvocationKind::CreateWalletClient);

        let effects = machine.send(done(id, InvocationOutput::WalletClient(handle().await))).unwrap();
        let id = invoked(&effects, InvocationKind::GetAddress);

        let effects = machine.send(done(id, InvocationOutput::Address("0xme".to_string()))).unwrap();
        let id = invoked(&effects, InvocationKind::GetDecimals);

        let effects = machine.send(done(id, InvocationOutput::Decimals(6))).unwrap();
        let id = invoked(&effects, InvocationKind::GetBalance);

        let effects = machine.send(done(id, InvocationOutput::Balance(100.0))).unwrap();
        assert!(effects.is_empty());
        assert_eq!(machine.state(), WorkflowState::Input);
        machine.take_transitions();
        machine
    }

    fn user(machine: &mut TransferMachine, event: UserEvent) -> Vec<Effect> {
        machine.send(MachineEvent::User(event)).unwrap()
    }

    fn fill(machine: &mut TransferMachine, to_address: &str, amount: f64) {
        user(machine, UserEvent::InputToAddress(to_address.to_string()));
        user(machine, UserEvent::InputAmount(amount));
    }

    #[tokio::test]
    async fn test_wallet_setup_populates_context() {
        let machine = connected().await;
        let context: &WorkflowContext = machine.context();
        assert_eq!(context.address, "0xme");
        assert_eq!(context.decimals, 6);
        assert_eq!(context.balance, 100.0);
        assert!(context.is_connected());
        assert!(machine.matches("input.address"));
        assert!(machine.matches("input.amount"));
    }

    #[tokio::test]
    async fn test_wallet_setup_failures() {
        // createWalletClient
        let mut machine = TransferMachine::default();
        let id = invoked(&machine.start().unwrap(), InvocationKind::CreateWalletClient);
        machine.send(failed(id, InvocationKind::CreateWalletClient)).unwrap();
        assert!(machine.matches("wallet.error.createWalletClient"));
        assert_eq!(machine.context().wallet_error, CONNECT_WALLET_ERROR);

        // getAddress
        let mut machine = TransferMachine::default();
        let id = invoked(&machine.start().unwrap(), InvocationKind::CreateWalletClient);
        let effects = machine.send(done(id, InvocationOutput::WalletClient(handle().await))).unwrap();
        let id = invoked(&effects, InvocationKind::GetAddress);
        machine.send(failed(id, InvocationKind::GetAddress)).unwrap();
        assert!(machine.matches("wallet.error.getAddress"));
        assert_eq!(machine.context().wallet_error, FETCH_ADDRESS_ERROR);

        // getBalance
        let mut machine = TransferMachine::default();
        let id = invoked(&machine.start().unwrap(), InvocationKind::CreateWalletClient);
        let effects = machine.send(done(id, InvocationOutput::WalletClient(handle().await))).unwrap();
        let id = invoked(&effects, InvocationKind::GetAddress);
        let effects = machine.send(done(id, InvocationOutput::Address("0xme".to_string()))).unwrap();
        let id = invoked(&effects, InvocationKind::GetDecimals);
        let effects = machine.send(done(id, InvocationOutput::Decimals(6))).unwrap();
        let id = invoked(&effects, InvocationKind::GetBalance);
        machine.send(failed(id, InvocationKind::GetBalance)).unwrap();
        assert!(machine.matches("wallet.error.getBalance"));
        assert_eq!(machine.context().wallet_error, FETCH_BALANCE_ERROR);

        // wallet.error is terminal for user events
        assert!(user(&mut machine, UserEvent::Submit).is_empty());
        assert!(machine.matches("wallet.error.getBalance"));
    }

    #[tokio::test]
    async fn test_mismatched_output_faults() {
        let mut machine = TransferMachine::default();
        let id = invoked(&machine.start().unwrap(), InvocationKind::CreateWalletClient);

        let result = machine.send(done(id, InvocationOutput::Decimals(6)));
        assert!(matches!(result, Err(Error::Internal(_))));
        assert!(machine.snapshot().is_faulted());
        assert!(matches!(
            machine.status(),
            WorkflowStatus::Faulted { step, .. } if step == "wallet"
        ));

        // Faulted machines ignore everything
        assert!(user(&mut machine, UserEvent::Submit).is_empty());
        assert!(machine.matches("wallet.createWalletClient"));
    }

    #[tokio::test]
    async fn test_get_decimals_failure_is_unhandled() {
        let mut machine = TransferMachine::default();
        let id = invoked(&machine.start().unwrap(), InvocationKind::CreateWalletClient);
        let effects = machine.send(done(id, InvocationOutput::WalletClient(handle().await))).unwrap();
        let id = invoked(&effects, InvocationKind::GetAddress);
        let effects = machine.send(done(id, InvocationOutput::Address("0xme".to_string()))).unwrap();
        let id = invoked(&effects, InvocationKind::GetDecimals);

        let result = machine.send(failed(id, InvocationKind::GetDecimals));
        assert!(matches!(
            result,
            Err(Error::UnhandledFailure { ref step, .. }) if step == "getDecimals"
        ));
        assert!(matches!(machine.status(), WorkflowStatus::Faulted { .. }));
        assert!(machine.matches("wallet.getDecimals"));

        // Faulted machines ignore everything
        assert!(user(&mut machine, UserEvent::Submit).is_empty());
    }

    #[tokio::test]
    async fn test_input_events_update_context_without_validation() {
        let mut machine = connected().await;
        fill(&mut machine, "nonsense", -3.0);
        assert_eq!(machine.context().to_address, "nonsense");
        assert_eq!(machine.context().amount, -3.0);
        assert!(machine.context().address_error.is_empty());
        assert!(machine.context().amount_error.is_empty());
        assert_eq!(machine.state(), WorkflowState::Input);
    }

    #[tokio::test]
    async fn test_address_without_0x_prefix() {
        let mut machine = connected().await;
        fill(&mut machine, "ABCDEF0123456789ABCDEF0123456789ABCDEF0123", 5.0);

        let effects = user(&mut machine, UserEvent::Submit);
        assert!(effects.is_empty());
        assert!(machine.matches("validate.address.error"));
        assert!(machine.matches("validate.amount.success"));
        assert_eq!(machine.context().address_error, NOT_0X_ADDRESS_ERROR);
        assert!(!machine.matches("submit"));
    }

    #[tokio::test]
    async fn test_address_with_wrong_length() {
        let mut machine = connected().await;
        fill(&mut machine, "0x1234", 5.0);

        user(&mut machine, UserEvent::Submit);
        assert!(machine.matches("validate.address.error"));
        assert_eq!(machine.context().address_error, ADDRESS_LENGTH_ERROR);
    }

    #[tokio::test]
    async fn test_non_positive_amount() {
        for amount in [0.0, -1.0, f64::NAN] {
            let mut machine = connected().await;
            fill(&mut machine, VALID_ADDRESS, amount);

            user(&mut machine, UserEvent::Submit);
            assert!(machine.matches("validate.amount.error"));
            assert!(machine.matches("validate.address.success"));
            assert_eq!(machine.context().amount_error, INVALID_AMOUNT_ERROR);
            assert!(machine.context().address_error.is_empty());
        }
    }

    #[tokio::test]
    async fn test_valid_input_goes_to_submit() {
        let mut machine = connected().await;
        fill(&mut machine, VALID_ADDRESS, 50.0);

        let effects = user(&mut machine, UserEvent::Submit);
        assert_eq!(machine.state(), WorkflowState::Submit);
        match effects.as_slice() {
            [Effect::Invoke {
                invocation: Invocation::SubmitTransaction { request, .. },
                ..
            }] => {
                assert_eq!(request.address, "0xme");
                assert_eq!(request.to_address, VALID_ADDRESS);
                assert_eq!(request.amount, 50.0);
                assert_eq!(request.decimals, 6);
            }
            other => panic!("unexpected effects {:?}", other),
        }

        let transitions = machine.take_transitions();
        assert_eq!(
            transitions.iter().map(|t| t.to).collect::<Vec<_>>(),
            vec![
                WorkflowState::Validate {
                    address: AddressCheck::Success,
                    amount: AmountCheck::Success
                },
                WorkflowState::Submit,
            ]
        );
    }

    #[tokio::test]
    async fn test_resubmit_in_validate_reruns_guards() {
        let mut machine = connected().await;
        fill(&mut machine, "0x12", 0.0);
        user(&mut machine, UserEvent::Submit);
        assert!(machine.matches("validate.address.error"));
        assert!(machine.matches("validate.amount.error"));

        // Corrections alone do not re-run the guards
        fill(&mut machine, VALID_ADDRESS, 10.0);
        assert!(machine.matches("validate.address.error"));
        assert_eq!(machine.context().address_error, ADDRESS_LENGTH_ERROR);

        let effects = user(&mut machine, UserEvent::Submit);
        assert_eq!(machine.state(), WorkflowState::Submit);
        assert_eq!(effects.len(), 1);
        assert!(machine.context().address_error.is_empty());
        assert!(machine.context().amount_error.is_empty());
    }

    #[tokio::test]
    async fn test_partial_pass_does_not_advance() {
        let mut machine = connected().await;
        fill(&mut machine, VALID_ADDRESS, 0.0);
        user(&mut machine, UserEvent::Submit);

        fill(&mut machine, "bad", 1.0);
        user(&mut machine, UserEvent::Submit);
        assert!(machine.matches("validate.address.error"));
        assert!(machine.matches("validate.amount.success"));
        // amount.success has no entry action; the old message stays until validate completes
        assert_eq!(machine.context().amount_error, INVALID_AMOUNT_ERROR);
    }

    #[tokio::test]
    async fn test_successful_submission_resets_inputs() {
        let mut machine = connected().await;
        fill(&mut machine, VALID_ADDRESS, 50.0);
        let id = invoked(&user(&mut machine, UserEvent::Submit), InvocationKind::SubmitTransaction);

        let effects = machine
            .send(done(id, InvocationOutput::TransactionId("0xtx".to_string())))
            .unwrap();
        let id = invoked(&effects, InvocationKind::WaitForTxReceipt);
        assert_eq!(machine.state(), WorkflowState::WaitForTxReceipt);
        assert_eq!(machine.context().transaction_id.as_deref(), Some("0xtx"));
        assert!(machine.context().to_address.is_empty());
        assert_eq!(machine.context().amount, 0.0);
        assert_eq!(machine.context().balance, 100.0);

        let receipt = TransferReceipt {
            transaction_id: "0xtx".to_string(),
            block_number: Some(1),
        };
        let effects = machine.send(done(id, InvocationOutput::Receipt(receipt))).unwrap();
        assert_eq!(machine.state(), WorkflowState::Done);
        assert!(matches!(
            effects.as_slice(),
            [Effect::ArmTimer { after, .. }] if *after == DONE_RESET
        ));
    }

    #[tokio::test]
    async fn test_failed_submission_returns_to_input_with_inputs_kept() {
        let mut machine = connected().await;
        fill(&mut machine, VALID_ADDRESS, 50.0);
        let id = invoked(&user(&mut machine, UserEvent::Submit), InvocationKind::SubmitTransaction);

        machine.send(failed(id, InvocationKind::SubmitTransaction)).unwrap();
        assert_eq!(machine.state(), WorkflowState::Input);
        assert_eq!(machine.context().wallet_error, SEND_TRANSACTION_ERROR);
        assert_eq!(machine.context().to_address, VALID_ADDRESS);
        assert_eq!(machine.context().amount, 50.0);
        assert!(machine.context().transaction_id.is_none());
    }

    #[tokio::test]
    async fn test_receipt_failure_is_unhandled() {
        let mut machine = connected().await;
        fill(&mut machine, VALID_ADDRESS, 50.0);
        let id = invoked(&user(&mut machine, UserEvent::Submit), InvocationKind::SubmitTransaction);
        let effects = machine
            .send(done(id, InvocationOutput::TransactionId("0xtx".to_string())))
            .unwrap();
        let id = invoked(&effects, InvocationKind::WaitForTxReceipt);

        let result = machine.send(failed(id, InvocationKind::WaitForTxReceipt));
        assert!(matches!(result, Err(Error::UnhandledFailure { .. })));
        assert!(matches!(machine.status(), WorkflowStatus::Faulted { .. }));
    }

    #[tokio::test]
    async fn test_events_ignored_while_invoking() {
        let mut machine = connected().await;
        fill(&mut machine, VALID_ADDRESS, 50.0);
        user(&mut machine, UserEvent::Submit);

        assert!(user(&mut machine, UserEvent::InputToAddress("0xother".to_string())).is_empty());
        assert!(user(&mut machine, UserEvent::Submit).is_empty());
        assert_eq!(machine.state(), WorkflowState::Submit);
        assert_eq!(machine.context().to_address, VALID_ADDRESS);
    }

    async fn in_done() -> (TransferMachine, u64) {
        let mut machine = connected().await;
        fill(&mut machine, VALID_ADDRESS, 50.0);
        let id = invoked(&user(&mut machine, UserEvent::Submit), InvocationKind::SubmitTransaction);
        let effects = machine
            .send(done(id, InvocationOutput::TransactionId("0xtx".to_string())))
            .unwrap();
        let id = invoked(&effects, InvocationKind::WaitForTxReceipt);
        let receipt = TransferReceipt {
            transaction_id: "0xtx".to_string(),
            block_number: None,
        };
        let effects = machine.send(done(id, InvocationOutput::Receipt(receipt))).unwrap();
        let timer = match effects.as_slice() {
            [Effect::ArmTimer { id, .. }] => *id,
            other => panic!("expected timer, got {:?}", other),
        };
        (machine, timer)
    }

    #[tokio::test]
    async fn test_done_timer_returns_to_input() {
        let (mut machine, timer) = in_done().await;
        let effects = machine.send(MachineEvent::After { id: timer }).unwrap();
        assert!(effects.is_empty());
        assert_eq!(machine.state(), WorkflowState::Input);
    }

    #[tokio::test]
    async fn test_event_in_done_cancels_timer() {
        let (mut machine, timer) = in_done().await;

        let effects = user(&mut machine, UserEvent::InputAmount(3.0));
        assert!(matches!(
            effects.as_slice(),
            [Effect::CancelTimer { id }] if *id == timer
        ));
        assert_eq!(machine.state(), WorkflowState::Input);
        assert_eq!(machine.context().amount, 3.0);

        // The old timer firing later changes nothing
        machine.send(MachineEvent::After { id: timer }).unwrap();
        assert_eq!(machine.state(), WorkflowState::Input);
    }

    #[tokio::test]
    async fn test_stale_completion_is_discarded() {
        let mut machine = TransferMachine::default();
        let id = invoked(&machine.start().unwrap(), InvocationKind::CreateWalletClient);

        let effects = machine
            .send(done(id + 100, InvocationOutput::WalletClient(handle().await)))
            .unwrap();
        assert!(effects.is_empty());
        assert_eq!(machine.state(), WorkflowState::INITIAL);
    }

    #[tokio::test]
    async fn test_start_is_idempotent() {
        let mut machine = TransferMachine::default();
        assert_eq!(machine.start().unwrap().len(), 1);
        assert!(machine.start().unwrap().is_empty());
    }
}
