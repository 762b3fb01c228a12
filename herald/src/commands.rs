//! Command implementations behind the `herald` binary

use std::{
    io::{self, Write},
    path::Path,
    process::ExitCode,
    sync::Arc,
};

use anyhow::Context as _;
use herald_common::{Draft, Message, RunState, normalize};
use herald_dispatch::{
    Controller, DispatchError, DispatchEvent, DispatchSettings, ReadinessPolicy, RunConfig,
    RunReport, Transport, TransportError,
    transport::{DryRunTransport, FallbackTransport},
};
use herald_ledger::{DraftStore, Ledger};
use tokio::fs;
use tracing::warn;

use crate::{
    cli::{Cli, Commands, DraftAction, MessageArgs, RecipientArgs, SendArgs},
    config::{Herald, TransportConfig},
    console,
    import::import_file,
};

/// Message and raw recipient text a command will work on
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Inputs {
    pub message: String,
    pub recipients: String,
}

/// Everything needed to drive one run from the terminal
#[derive(Debug, Clone)]
pub struct Request {
    pub recipients: String,
    pub message: Message,
    pub config: RunConfig,
    /// Only the first valid recipient is sent to
    pub single: bool,
    /// Ask the operator before closing a session held after a readiness
    /// failure
    pub interactive: bool,
    pub verbose: bool,
}

/// Run the parsed command line against `config`
///
/// # Errors
/// Configuration, input, ledger and dispatch errors are returned to the
/// binary, which prints them and exits non-zero
pub async fn execute(cli: Cli, config: Herald) -> anyhow::Result<ExitCode> {
    let verbose = cli.verbose;

    match cli.command {
        Commands::Send(args) => send(&config, &args, false, verbose).await,
        Commands::Test(args) => send(&config, &args, true, verbose).await,
        Commands::Validate(args) => validate(&args).await,
        Commands::Draft { action } => match action {
            DraftAction::Save {
                message,
                recipients,
            } => draft_save(&config.drafts, &message, &recipients).await,
            DraftAction::Show => draft_show(&config.drafts).await,
        },
        Commands::History { limit } => {
            let ledger = config.ledger.into_ledger().await?;
            history(ledger.as_ref(), limit).await
        }
        Commands::Log { limit, run } => {
            let ledger = config.ledger.into_ledger().await?;
            outcome_log(ledger.as_ref(), limit, run.as_deref()).await
        }
    }
}

async fn read_message(args: &MessageArgs) -> anyhow::Result<Option<String>> {
    if let Some(path) = &args.message_file {
        let text = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read message from {}", path.display()))?;
        return Ok(Some(text.trim_end().to_string()));
    }

    Ok(args.message.clone())
}

/// Raw recipient text and, for imports that carry one, a message
async fn read_recipients(
    args: &RecipientArgs,
) -> anyhow::Result<(Option<String>, Option<String>)> {
    if let Some(path) = &args.import {
        let imported = import_file(path).await?;
        return Ok((Some(imported.raw()), imported.message));
    }

    Ok((args.recipients.clone(), None))
}

/// Resolve the inputs of a command.
///
/// Flags win over an imported file's message, and `draft` only fills in what
/// is still missing.
///
/// # Errors
/// If a file cannot be read or imported, or nothing names any recipients
pub async fn gather(
    message: &MessageArgs,
    recipients: &RecipientArgs,
    draft: Option<Draft>,
) -> anyhow::Result<Inputs> {
    let (raw, imported_message) = read_recipients(recipients).await?;
    let text = read_message(message).await?.or(imported_message);

    let (draft_message, draft_recipients) = match draft {
        Some(draft) => (Some(draft.message), Some(draft.recipients)),
        None => (None, None),
    };

    let Some(recipients) = raw.or(draft_recipients) else {
        anyhow::bail!("No recipients given, use --recipients or --import");
    };

    Ok(Inputs {
        message: text.or(draft_message).unwrap_or_default(),
        recipients,
    })
}

/// Configured run defaults with command line overrides applied
#[must_use]
pub fn run_config(base: RunConfig, args: &SendArgs) -> RunConfig {
    RunConfig {
        delay_between_sends_secs: args.delay.unwrap_or(base.delay_between_sends_secs),
        max_attempts: args.max_attempts.unwrap_or(base.max_attempts),
    }
}

/// `true` if the operator answered yes
fn confirm(question: &str) -> anyhow::Result<bool> {
    print!("{question} [y/N] ");
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;

    Ok(matches!(input.trim().to_lowercase().as_str(), "y" | "yes"))
}

async fn send(
    config: &Herald,
    args: &SendArgs,
    single: bool,
    verbose: bool,
) -> anyhow::Result<ExitCode> {
    let draft = if args.from_draft {
        let draft = config.drafts.load().await?;
        if draft.is_none() {
            println!("No saved draft to restore");
        }
        draft
    } else {
        None
    };

    let inputs = gather(&args.message, &args.recipients, draft).await?;

    if !args.from_draft
        && let Err(e) = config
            .drafts
            .save(&Draft::new(&inputs.message, &inputs.recipients))
            .await
    {
        warn!("Failed to save draft: {e}");
    }

    let batch = normalize(&inputs.recipients);
    for line in console::batch_report(&batch) {
        println!("{line}");
    }
    if batch.valid.is_empty() {
        return Err(DispatchError::NoValidRecipients.into());
    }

    let message = Message::from(inputs.message);
    if message.is_blank() {
        return Err(DispatchError::EmptyMessage.into());
    }
    println!("Message: {}", message.preview(60));

    if !args.yes {
        let question = if single {
            format!("Send a test message to {}?", batch.valid[0])
        } else {
            format!("Send to {} recipients?", batch.valid.len())
        };
        if !confirm(&question)? {
            println!("Cancelled.");
            return Ok(ExitCode::SUCCESS);
        }
    }

    let request = Request {
        recipients: inputs.recipients,
        message,
        config: run_config(config.run, args),
        single,
        interactive: !args.yes,
        verbose,
    };
    let ledger = config.ledger.clone().into_ledger().await?;
    let settings = config.dispatch.clone();

    let transport = if args.dry_run {
        TransportConfig::default()
    } else {
        config.transport.clone()
    };

    let report = match (&transport, transport.helper()) {
        (
            TransportConfig::Command {
                fallback_to_default_profile: true,
                ..
            },
            Some(helper),
        ) => {
            let fallback = FallbackTransport::new(helper.clone(), helper);
            dispatch(Arc::new(fallback), settings, ledger, request).await?
        }
        (_, Some(helper)) => dispatch(Arc::new(helper), settings, ledger, request).await?,
        (TransportConfig::DryRun { latency_millis }, None) => {
            let dry_run = DryRunTransport {
                latency_millis: *latency_millis,
            };
            dispatch(Arc::new(dry_run), settings, ledger, request).await?
        }
        (TransportConfig::Command { .. }, None) => {
            anyhow::bail!("Command transport is missing its helper program")
        }
    };

    Ok(exit_code(report.as_ref()))
}

/// Exit status for the report of a run; only a completed run succeeds
#[must_use]
pub fn exit_code(report: Option<&RunReport>) -> ExitCode {
    match report {
        Some(report) if report.state == RunState::Completed => ExitCode::SUCCESS,
        _ => ExitCode::FAILURE,
    }
}

/// Start a run on `transport` and print its events until it ends.
///
/// The first Ctrl+C asks the run to stop after the message in flight; a
/// second one gives up waiting and returns `None`.
///
/// # Errors
/// If the run is refused, or the Ctrl+C handler cannot be installed
pub async fn dispatch<T: Transport>(
    transport: Arc<T>,
    settings: DispatchSettings,
    ledger: Arc<dyn Ledger>,
    request: Request,
) -> anyhow::Result<Option<RunReport>> {
    let hold = settings.readiness == ReadinessPolicy::HoldForOperator;
    let (controller, mut events) = Controller::new(settings, transport, ledger);

    let ticket = if request.single {
        controller.start_single(&request.recipients, &request.message, request.config)?
    } else {
        controller.start(&request.recipients, &request.message, request.config)?
    };

    let mut stopping = false;
    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                if let Some(line) = console::render_event(&event, request.verbose) {
                    println!("{line}");
                }
                if matches!(event, DispatchEvent::Terminal { .. }) {
                    break;
                }
            }
            signal = tokio::signal::ctrl_c() => {
                signal.context("Failed to listen for Ctrl+C")?;
                if stopping {
                    eprintln!("Interrupted, run {} left unfinished", ticket.run_id);
                    return Ok(None);
                }
                stopping = controller.cancel();
                if stopping {
                    eprintln!("Stopping after the current message, press Ctrl+C again to quit");
                }
            }
        }
    }

    let report = controller.wait().await;

    let held = report
        .as_ref()
        .is_some_and(|r| matches!(r.error, Some(TransportError::ChannelNotReady(_))));
    if hold && held && request.interactive {
        print!("Messaging session left open, press Enter to close it ");
        io::stdout().flush()?;
        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
    }

    controller.shutdown().await;
    Ok(report)
}

/// Print the batch report; exit status 1 when any entry is invalid
///
/// # Errors
/// If the recipients cannot be read or imported
pub async fn validate(args: &RecipientArgs) -> anyhow::Result<ExitCode> {
    let (raw, _) = read_recipients(args).await?;
    let Some(raw) = raw else {
        anyhow::bail!("No recipients given, use --recipients or --import");
    };

    let batch = normalize(&raw);
    for line in console::batch_report(&batch) {
        println!("{line}");
    }

    if batch.valid.is_empty() || !batch.is_clean() {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

async fn draft_save(
    drafts: &impl DraftStore,
    message: &MessageArgs,
    recipients: &RecipientArgs,
) -> anyhow::Result<ExitCode> {
    let (raw, imported_message) = read_recipients(recipients).await?;
    let text = read_message(message).await?.or(imported_message);

    let draft = Draft::new(text.unwrap_or_default(), raw.unwrap_or_default());
    if draft.is_empty() {
        anyhow::bail!("Nothing to save, give a message or recipients");
    }

    drafts.save(&draft).await?;
    println!("Draft saved");
    Ok(ExitCode::SUCCESS)
}

async fn draft_show(drafts: &impl DraftStore) -> anyhow::Result<ExitCode> {
    match drafts.load().await? {
        Some(draft) => {
            println!("Saved: {}", draft.saved_at.format("%Y-%m-%d %H:%M:%S"));
            println!("Recipients: {}", draft.recipients);
            println!("Message:\n{}", draft.message);
        }
        None => println!("No saved draft"),
    }
    Ok(ExitCode::SUCCESS)
}

/// Print the most recent `limit` run summaries, oldest first
///
/// # Errors
/// If the ledger cannot be read
pub async fn history(ledger: &dyn Ledger, limit: usize) -> anyhow::Result<ExitCode> {
    let summaries = ledger.summaries().await?;
    if summaries.is_empty() {
        println!("No runs recorded");
        return Ok(ExitCode::SUCCESS);
    }

    let skip = summaries.len().saturating_sub(limit);
    for summary in &summaries[skip..] {
        println!("{} {summary}", summary.run_id);
    }
    Ok(ExitCode::SUCCESS)
}

/// Print the most recent `limit` outcome rows, optionally of one run
///
/// # Errors
/// If the ledger cannot be read
pub async fn outcome_log(
    ledger: &dyn Ledger,
    limit: usize,
    run: Option<&str>,
) -> anyhow::Result<ExitCode> {
    let rows: Vec<_> = ledger
        .outcomes()
        .await?
        .into_iter()
        .filter(|row| run.is_none_or(|id| row.run_id.to_string() == id))
        .collect();

    if rows.is_empty() {
        println!("No outcomes recorded");
        return Ok(ExitCode::SUCCESS);
    }

    let skip = rows.len().saturating_sub(limit);
    for row in &rows[skip..] {
        println!("{}", console::render_outcome(row));
    }
    Ok(ExitCode::SUCCESS)
}

/// Short description of where the configuration came from
#[must_use]
pub fn config_origin(path: Option<&Path>) -> String {
    path.map_or_else(
        || "built-in defaults".to_string(),
        |path| path.display().to_string(),
    )
}
