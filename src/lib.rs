//! Send Token
//!
//! ERC-20 transfer workflow: wallet setup, input validation, submission and
//! receipt tracking, driven by a state machine.

pub mod cli;
pub mod config;
pub mod error;
pub mod machine;
pub mod wallet;

// Re-export commonly used types
pub use config::Config;
pub use error::{Error, Result};
pub use machine::{Snapshot, UserEvent, Workflow, WorkflowHandle, WorkflowState};
