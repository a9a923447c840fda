//! CLI command implementations

use anyhow::{anyhow, Context, Result};
use dialoguer::{Confirm, Input};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{info, warn};

use crate::cli::view::{self, StatusLine};
use crate::config::Config;
use crate::machine::{Snapshot, Transition, UserEvent, Workflow, WorkflowHandle, WorkflowState};
use crate::wallet::{EvmGateway, SimulatedGateway, WalletGateway};

/// Simulated wallet used by `--dry-run`
const DRY_RUN_DECIMALS: u32 = 6;
const DRY_RUN_BALANCE: f64 = 100.0;
const DRY_RUN_LATENCY: Duration = Duration::from_millis(400);

/// How a submitted transfer ended
#[derive(Debug)]
enum Outcome {
    /// Validation rejected the input
    Rejected(Snapshot),
    /// The wallet refused the transaction
    SubmitFailed(Snapshot),
    /// Receipt received
    Sent(Snapshot),
}

fn gateway(config: &Config, dry_run: bool) -> Result<Arc<dyn WalletGateway>> {
    if dry_run {
        warn!("Running in DRY-RUN mode - transfers are simulated");
        let gateway = SimulatedGateway::new(DRY_RUN_DECIMALS, DRY_RUN_BALANCE)
            .context("Failed to create simulated wallet")?
            .with_latency(DRY_RUN_LATENCY);
        return Ok(Arc::new(gateway));
    }

    let gateway = EvmGateway::from_config(config).context("Invalid gateway configuration")?;
    Ok(Arc::new(gateway))
}

fn start(config: &Config, dry_run: bool) -> Result<(WorkflowHandle, broadcast::Receiver<Transition>)> {
    let workflow = Workflow::new(gateway(config, dry_run)?, &config.workflow);
    let transitions = workflow.transitions();
    info!("Starting transfer workflow {}", workflow.id());
    Ok((workflow.start(), transitions))
}

/// Turn a faulted or closed workflow into an error, printing the fallback
fn closed(handle: &WorkflowHandle) -> anyhow::Error {
    let snapshot = handle.snapshot();
    match view::fault(&snapshot) {
        Some(text) => {
            println!("\n{}", text);
            anyhow!("Workflow faulted in {}", snapshot.state)
        }
        None => anyhow!("Workflow stopped in {}", snapshot.state),
    }
}

/// Print wallet setup progress until the form is usable
async fn connect(handle: &WorkflowHandle, symbol: &str) -> Result<Snapshot> {
    let mut snapshots = handle.subscribe();
    let mut last: Option<StatusLine> = None;

    loop {
        let snapshot = snapshots.borrow_and_update().clone();
        if snapshot.is_faulted() {
            return Err(closed(handle));
        }

        let line = view::status_line(&snapshot, symbol);
        if last.as_ref() != Some(&line) && !snapshot.matches("wallet.createWalletClient") {
            println!("{}", line);
        }
        if line.is_error() {
            return Err(anyhow!("{}", line));
        }
        last = Some(line);
        if snapshot.matches("input") {
            return Ok(snapshot);
        }

        if snapshots.changed().await.is_err() {
            return Err(closed(handle));
        }
    }
}

/// Dispatch one transfer and follow it to its outcome
async fn transfer_once(
    handle: &WorkflowHandle,
    transitions: &mut broadcast::Receiver<Transition>,
    to: &str,
    amount: f64,
) -> Result<Outcome> {
    let mut snapshots = handle.subscribe();

    let current = handle.snapshot();
    if view::button_disabled(&current) {
        return Err(anyhow!("Cannot send tokens in {}", current.state));
    }

    for event in [
        UserEvent::InputToAddress(to.to_string()),
        UserEvent::InputAmount(amount),
        UserEvent::Submit,
    ] {
        if handle.send(event).await.is_err() {
            return Err(closed(handle));
        }
    }

    loop {
        tokio::select! {
            received = transitions.recv() => {
                let transition = match received {
                    Ok(transition) => transition,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Missed {} workflow transitions", skipped);
                        continue;
                    }
                    Err(RecvError::Closed) => return Err(closed(handle)),
                };

                let snapshot = handle.snapshot();
                if view::is_rejected(&transition.to) {
                    return Ok(Outcome::Rejected(snapshot));
                }
                match (transition.from, transition.to) {
                    (WorkflowState::Submit, WorkflowState::Input) => {
                        return Ok(Outcome::SubmitFailed(snapshot));
                    }
                    (_, WorkflowState::Done) => return Ok(Outcome::Sent(snapshot)),
                    (_, WorkflowState::Submit | WorkflowState::WaitForTxReceipt) => {
                        print_progress(&snapshot);
                    }
                    _ => {}
                }
            }
            changed = snapshots.changed() => {
                if changed.is_err() || handle.snapshot().is_faulted() {
                    return Err(closed(handle));
                }
            }
        }
    }
}

fn print_progress(snapshot: &Snapshot) {
    if let Some(line) = view::progress(snapshot) {
        println!("[{}] {}", view::button_tone(snapshot), line);
    }
}

fn print_field_errors(snapshot: &Snapshot, symbol: &str) {
    for field in [view::address_field(snapshot), view::amount_field(snapshot, symbol)] {
        if field.error {
            println!("  {}: {}", field.label, field.helper);
        }
    }
}

/// Stop the workflow and surface whichever failure came first
async fn finish(handle: WorkflowHandle, result: Result<()>) -> Result<()> {
    handle.shutdown();
    let joined = handle.join().await;
    result?;
    joined?;
    Ok(())
}

async fn prompt(label: String, initial: String) -> Result<String> {
    let text = tokio::task::spawn_blocking(move || {
        Input::<String>::new()
            .with_prompt(label)
            .with_initial_text(initial)
            .allow_empty(true)
            .interact_text()
    })
    .await??;
    Ok(text)
}

async fn confirm(label: &'static str) -> Result<bool> {
    let answer = tokio::task::spawn_blocking(move || {
        Confirm::new().with_prompt(label).default(true).interact()
    })
    .await??;
    Ok(answer)
}

/// Unparseable input becomes NaN and fails the amount check
fn parse_amount(text: &str) -> f64 {
    text.trim().parse::<f64>().unwrap_or(f64::NAN)
}

/// Interactive send form
pub async fn send(config: &Config, dry_run: bool) -> Result<()> {
    let (handle, mut transitions) = start(config, dry_run)?;
    let result = send_form(&handle, &mut transitions, &config.token.symbol).await;
    finish(handle, result).await
}

async fn send_form(
    handle: &WorkflowHandle,
    transitions: &mut broadcast::Receiver<Transition>,
    symbol: &str,
) -> Result<()> {
    let mut snapshot = connect(handle, symbol).await?;

    loop {
        let initial_amount = if snapshot.context.amount > 0.0 {
            snapshot.context.amount.to_string()
        } else {
            String::new()
        };
        let to = prompt("Send To".to_string(), snapshot.context.to_address.clone()).await?;
        let amount = prompt(format!("Amount ({})", symbol), initial_amount).await?;

        match transfer_once(handle, transitions, to.trim(), parse_amount(&amount)).await? {
            Outcome::Rejected(rejected) => {
                print_field_errors(&rejected, symbol);
                snapshot = rejected;
            }
            Outcome::SubmitFailed(failed) => {
                println!("{}", failed.context.wallet_error);
                snapshot = failed;
            }
            Outcome::Sent(sent) => {
                print_progress(&sent);
                if !confirm("Send another transfer?").await? {
                    return Ok(());
                }
                snapshot = handle
                    .wait_for(|s| s.matches("input"))
                    .await
                    .map_err(|_| closed(handle))?;
                println!("{}", view::status_line(&snapshot, symbol));
            }
        }
    }
}

/// Send a single transfer without prompting
pub async fn transfer(config: &Config, to: &str, amount: f64, dry_run: bool, json: bool) -> Result<()> {
    let (handle, mut transitions) = start(config, dry_run)?;
    let result = transfer_form(&handle, &mut transitions, &config.token.symbol, to, amount, json).await;
    finish(handle, result).await
}

async fn transfer_form(
    handle: &WorkflowHandle,
    transitions: &mut broadcast::Receiver<Transition>,
    symbol: &str,
    to: &str,
    amount: f64,
    json: bool,
) -> Result<()> {
    connect(handle, symbol).await?;

    let sent = match transfer_once(handle, transitions, to, amount).await? {
        Outcome::Rejected(rejected) => {
            print_field_errors(&rejected, symbol);
            return Err(anyhow!("Transfer rejected"));
        }
        Outcome::SubmitFailed(failed) => return Err(anyhow!("{}", failed.context.wallet_error)),
        Outcome::Sent(sent) => sent,
    };

    let transaction_id = sent.context.transaction_id.unwrap_or_default();
    if json {
        let output = serde_json::json!({
            "from": sent.context.address,
            "to": to,
            "amount": amount,
            "symbol": symbol,
            "transaction_id": transaction_id,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("\n=== TRANSFER SENT ===");
        println!("Amount: {} {}", amount, symbol);
        println!("To: {}", to);
        println!("Transaction: {}", transaction_id);
    }

    Ok(())
}

/// Run wallet setup and print the balance line
pub async fn balance(config: &Config, dry_run: bool) -> Result<()> {
    let (handle, _) = start(config, dry_run)?;
    let result = connect(&handle, &config.token.symbol).await.map(|snapshot| {
        info!("Connected account {}", snapshot.context.address);
    });
    finish(handle, result).await
}

/// Show current configuration (secrets masked)
pub fn show_config(config: &Config) -> Result<()> {
    println!("{}", config.masked_display());
    Ok(())
}
