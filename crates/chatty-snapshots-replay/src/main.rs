mod transcript;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chatty_snapshots::repositories::StoreOperation;
use chatty_snapshots::services::init_tracing;
use chatty_snapshots::{
    ActionOutcome, ControllerHooks, ErrorStore, InMemoryMessageStore, MessageActionController,
    MessageStore, SettingsJsonRepository, SettingsRepository, SharedSnapshotManager,
    SnapshotManager, SnapshotSettings, SnapshotView,
};
use clap::Parser;
use serde::Serialize;
use tracing::{debug, info};

use transcript::ReplayStep;

#[derive(Parser)]
#[command(name = "chatty-snapshots-replay")]
#[command(about = "Replay a recorded message transcript through the snapshot engine")]
struct Args {
    /// Transcript file: JSON array of sync/prev/next/delete steps
    transcript: PathBuf,

    /// Print one JSON object per step instead of text lines
    #[arg(long)]
    json: bool,

    /// Tracing directive, overrides the settings file (RUST_LOG still wins)
    #[arg(long)]
    log_filter: Option<String>,

    /// Settings file; defaults to the user's chatty config
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Character id the transcript belongs to
    #[arg(long, default_value = "replay")]
    character: String,

    /// Make every regeneration request fail
    #[arg(long)]
    fail_regenerate: bool,
}

#[derive(Serialize)]
struct StepReport {
    step: usize,
    action: String,
    outcome: Option<String>,
    views: Vec<SnapshotView>,
}

async fn load_settings(args: &Args) -> Result<SnapshotSettings> {
    let repo = match &args.settings {
        Some(path) => SettingsJsonRepository::with_path(path),
        None => SettingsJsonRepository::new()?,
    };
    let mut settings = repo.load().await.context("Failed to load settings")?;
    if let Some(filter) = &args.log_filter {
        settings.log_filter = filter.clone();
    }
    Ok(settings)
}

fn collect_views(manager: &SharedSnapshotManager, store: &InMemoryMessageStore) -> Vec<SnapshotView> {
    let manager = manager.lock();
    store
        .active_history()
        .iter()
        .filter_map(|message| manager.view(message))
        .collect()
}

async fn run_step(
    step: &ReplayStep,
    character: &str,
    store: &InMemoryMessageStore,
    controller: &MessageActionController,
) -> Option<ActionOutcome> {
    match step {
        ReplayStep::Sync(messages) => {
            store.set_history(character, messages.clone());
            controller.manager().lock().sync_from_messages(messages);
            None
        }
        ReplayStep::Prev(id) => Some(controller.handle_snapshot_prev(id).await),
        ReplayStep::Next(id) => Some(controller.handle_snapshot_next(id).await),
        ReplayStep::Delete(id) => Some(controller.handle_delete(id).await),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let settings = load_settings(&args).await?;
    let collected = init_tracing(&settings).context("Failed to initialize tracing")?;
    let errors = Arc::new(ErrorStore::new(settings.error_store_capacity));

    let steps = transcript::load(&args.transcript)?;
    info!(steps = steps.len(), character = %args.character, "Replaying transcript");

    let store = InMemoryMessageStore::new().with_character(&args.character, Vec::new());
    if args.fail_regenerate {
        store.fail(StoreOperation::QueueAction, true);
    }
    let store_handle: Arc<dyn MessageStore> = Arc::new(store.clone());
    let manager = SnapshotManager::shared(store_handle.clone());

    let hooks = ControllerHooks::new().with_error_store(errors.clone());
    let controller = MessageActionController::new(manager.clone(), store_handle, hooks, settings);

    for (index, step) in steps.iter().enumerate() {
        let outcome = run_step(step, &args.character, &store, &controller).await;
        let views = collect_views(&manager, &store);
        debug!(step = index, tracked = views.len(), "Step applied");

        if args.json {
            let report = StepReport {
                step: index,
                action: step.label(),
                outcome: outcome.map(|o| format!("{:?}", o)),
                views,
            };
            println!("{}", serde_json::to_string(&report)?);
        } else {
            let outcome = outcome.map(|o| format!(" -> {:?}", o)).unwrap_or_default();
            println!("#{} {}{}", index, step.label(), outcome);
            for view in views {
                println!(
                    "    {} {}/{}{} {:?}",
                    view.message_id,
                    view.position,
                    view.total,
                    if view.pending { " (pending)" } else { "" },
                    view.text
                );
            }
        }
    }

    errors.drain_from(&collected);
    let queued = store.queued_actions().len();
    info!(
        queued,
        errors = errors.error_count(),
        warnings = errors.warning_count(),
        "Replay finished"
    );
    if !args.json {
        println!(
            "queued regenerations: {}, errors: {}, warnings: {}",
            queued,
            errors.error_count(),
            errors.warning_count()
        );
    }

    Ok(())
}
