//! Workflow events and gateway invocations

use std::fmt;

use crate::wallet::{TransferReceipt, TransferRequest, WalletHandle};

/// Events the presentation layer may send
#[derive(Debug, Clone, PartialEq)]
pub enum UserEvent {
    /// `input.toAddress`
    InputToAddress(String),
    /// `input.amount`
    InputAmount(f64),
    /// `submit`
    Submit,
}

impl UserEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::InputToAddress(_) => "input.toAddress",
            Self::InputAmount(_) => "input.amount",
            Self::Submit => "submit",
        }
    }
}

/// Which gateway operation an invoking state runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationKind {
    CreateWalletClient,
    GetAddress,
    GetDecimals,
    GetBalance,
    SubmitTransaction,
    WaitForTxReceipt,
}

impl InvocationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreateWalletClient => "createWalletClient",
            Self::GetAddress => "getAddress",
            Self::GetDecimals => "getDecimals",
            Self::GetBalance => "getBalance",
            Self::SubmitTransaction => "submitTransaction",
            Self::WaitForTxReceipt => "waitForTxReceipt",
        }
    }
}

impl fmt::Display for InvocationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A gateway call together with the context it was issued with
#[derive(Debug, Clone)]
pub enum Invocation {
    CreateWalletClient,
    GetAddress {
        client: WalletHandle,
    },
    GetDecimals {
        client: WalletHandle,
    },
    GetBalance {
        client: WalletHandle,
        address: String,
        decimals: u32,
    },
    SubmitTransaction {
        client: WalletHandle,
        request: TransferRequest,
    },
    WaitForTxReceipt {
        client: WalletHandle,
        transaction_id: String,
    },
}

impl Invocation {
    pub fn kind(&self) -> InvocationKind {
        match self {
            Self::CreateWalletClient => InvocationKind::CreateWalletClient,
            Self::GetAddress { .. } => InvocationKind::GetAddress,
            Self::GetDecimals { .. } => InvocationKind::GetDecimals,
            Self::GetBalance { .. } => InvocationKind::GetBalance,
            Self::SubmitTransaction { .. } => InvocationKind::SubmitTransaction,
            Self::WaitForTxReceipt { .. } => InvocationKind::WaitForTxReceipt,
        }
    }
}

/// Successful result of an invocation
#[derive(Debug, Clone)]
pub enum InvocationOutput {
    WalletClient(WalletHandle),
    Address(String),
    Decimals(u32),
    Balance(f64),
    TransactionId(String),
    Receipt(TransferReceipt),
}

/// Everything the dispatcher consumes
#[derive(Debug, Clone)]
pub enum MachineEvent {
    User(UserEvent),
    /// Invocation `id` resolved
    Done { id: u64, output: InvocationOutput },
    /// Invocation `id` rejected
    Failed {
        id: u64,
        kind: InvocationKind,
        error: String,
    },
    /// Timer `id` expired
    After { id: u64 },
}

impl From<UserEvent> for MachineEvent {
    fn from(event: UserEvent) -> Self {
        Self::User(event)
    }
}
