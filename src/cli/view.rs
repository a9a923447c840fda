//! Snapshot to terminal mapping
//!
//! Everything the `send` form shows is derived from a [`Snapshot`] here, so
//! the commands only deal with prompting and printing.

use std::fmt;

use crate::machine::{AddressCheck, AmountCheck, Snapshot, WorkflowState, WorkflowStatus};

/// Line shown above the form
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusLine {
    Loading(&'static str),
    WalletError(String),
    Balance(String),
}

impl StatusLine {
    pub fn is_error(&self) -> bool {
        matches!(self, Self::WalletError(_))
    }
}

impl fmt::Display for StatusLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Loading(text) => f.write_str(text),
            Self::WalletError(text) => f.write_str(text),
            Self::Balance(text) => f.write_str(text),
        }
    }
}

pub fn status_line(snapshot: &Snapshot, symbol: &str) -> StatusLine {
    if snapshot.matches("wallet.getAddress") {
        StatusLine::Loading("Loading Address...")
    } else if snapshot.matches("wallet.getDecimals") {
        StatusLine::Loading("Loading Wallet Settings...")
    } else if snapshot.matches("wallet.getBalance") {
        StatusLine::Loading("Loading Balance...")
    } else if snapshot.matches("wallet.error") {
        StatusLine::WalletError(snapshot.context.wallet_error.clone())
    } else {
        StatusLine::Balance(format!(
            "Available Balance: {} {}",
            snapshot.context.balance, symbol
        ))
    }
}

/// One input of the form
#[derive(Debug, Clone, PartialEq)]
pub struct Field<'a> {
    pub label: &'a str,
    /// Field is flagged as invalid
    pub error: bool,
    /// Text shown under the field
    pub helper: &'a str,
}

pub fn address_field(snapshot: &Snapshot) -> Field<'_> {
    Field {
        label: "Send To",
        error: snapshot.matches("validate.address.error"),
        helper: &snapshot.context.address_error,
    }
}

pub fn amount_field<'a>(snapshot: &'a Snapshot, symbol: &'a str) -> Field<'a> {
    Field {
        label: symbol,
        error: snapshot.matches("validate.amount.error"),
        helper: &snapshot.context.amount_error,
    }
}

/// Colour of the send button
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonTone {
    Success,
    Info,
    Primary,
}

impl fmt::Display for ButtonTone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => f.write_str("success"),
            Self::Info => f.write_str("info"),
            Self::Primary => f.write_str("primary"),
        }
    }
}

pub fn button_tone(snapshot: &Snapshot) -> ButtonTone {
    if snapshot.matches("done") {
        ButtonTone::Success
    } else if snapshot.matches("waitForTxReceipt") {
        ButtonTone::Info
    } else {
        ButtonTone::Primary
    }
}

pub fn button_disabled(snapshot: &Snapshot) -> bool {
    snapshot.matches("wallet.error") || snapshot.matches("submit")
}

/// Both validation regions settled and at least one rejected
pub fn is_rejected(state: &WorkflowState) -> bool {
    match state {
        WorkflowState::Validate { address, amount } => {
            let settled = matches!(address, AddressCheck::Success | AddressCheck::Error)
                && matches!(amount, AmountCheck::Success | AmountCheck::Error);
            settled && (*address == AddressCheck::Error || *amount == AmountCheck::Error)
        }
        _ => false,
    }
}

/// Progress message for the submission states
pub fn progress(snapshot: &Snapshot) -> Option<String> {
    let transaction_id = snapshot.context.transaction_id.as_deref().unwrap_or_default();
    match snapshot.state {
        WorkflowState::Submit => Some("Sending Tokens...".to_string()),
        WorkflowState::WaitForTxReceipt => {
            Some(format!("Waiting for receipt of {}...", transaction_id))
        }
        WorkflowState::Done => Some(format!("Tokens sent: {}", transaction_id)),
        _ => None,
    }
}

/// Fallback screen for a faulted workflow
pub fn fault(snapshot: &Snapshot) -> Option<String> {
    match &snapshot.status {
        WorkflowStatus::Faulted { message, .. } => {
            Some(format!("Something went wrong :(\n{}", message))
        }
        _ => None,
    }
}
