//! Token transfer workflow
//!
//! A hierarchical state machine that connects a wallet, collects a
//! recipient and amount, validates both in parallel, submits an ERC-20
//! transfer and waits for its receipt.
//!
//! [`TransferMachine`] is the pure dispatcher; [`Workflow`] runs it on a
//! tokio task against a [`WalletGateway`](crate::wallet::WalletGateway).

pub mod context;
pub mod event;
pub mod guards;
pub mod runtime;
pub mod snapshot;
pub mod state;
pub mod transition;

pub use context::WorkflowContext;
pub use event::{InvocationKind, UserEvent};
pub use runtime::{Workflow, WorkflowHandle};
pub use snapshot::{Snapshot, Transition, WorkflowStatus};
pub use state::{AddressCheck, AmountCheck, WalletFailure, WalletStep, WorkflowState};
pub use transition::{Effect, TransferMachine};
