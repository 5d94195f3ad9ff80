//! Continuous polling: run the entry runtime and print every update.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio_stream::{StreamExt, StreamMap};

use hwinstant_core::{
    ConfigEntry, CoordinatorUpdate, Entities, EntryState, Runtime, RuntimeEvent, SensorReading,
    build_entities,
};

use crate::cli::{GlobalOpts, OutputFormat, WatchArgs};
use crate::config::Context;
use crate::error::CliError;
use crate::output;

/// Sensors shown per line unless `--all` is given. Sub-meter readings
/// are always shown.
const HEADLINE_KEYS: &[&str] = &[
    "active_power_w",
    "total_power_import_kwh",
    "total_power_export_kwh",
];

pub async fn handle(ctx: &mut Context, args: WatchArgs, global: &GlobalOpts) -> Result<(), CliError> {
    if ctx.entries.is_empty() {
        return Err(CliError::NoEntries);
    }
    let selected: Vec<Arc<ConfigEntry>> = if args.entries.is_empty() {
        ctx.entries.snapshot().iter().cloned().collect()
    } else {
        args.entries
            .iter()
            .map(|ident| ctx.resolve_entry(ident))
            .collect::<Result<_, _>>()?
    };

    let runtime = Runtime::new(ctx.factory(), Arc::clone(&ctx.entries), ctx.options.clone());
    let mut events = runtime.events();
    runtime.start().await;

    let mut first_error = None;
    for entry in &selected {
        if let Err(e) = runtime.setup_entry(&entry.entry_id).await {
            first_error.get_or_insert(e);
        }
    }
    let all_failed = selected
        .iter()
        .all(|e| runtime.entry_state(&e.entry_id) == EntryState::SetupError);
    if all_failed {
        runtime.shutdown().await;
        return match first_error {
            Some(e) => Err(e.into()),
            None => Err(CliError::NoEntries),
        };
    }

    let format = global.output();
    let mut streams = StreamMap::new();
    let mut entities: HashMap<String, Entities> = HashMap::new();

    let sig = tokio::signal::ctrl_c();
    tokio::pin!(sig);
    loop {
        tokio::select! {
            biased;
            _ = &mut sig => {
                tracing::info!("interrupted");
                break;
            }
            event = events.recv() => match event {
                Ok(RuntimeEvent::Loaded { entry_id }) => {
                    if let Some(coordinator) = runtime.coordinator(&entry_id) {
                        entities.remove(&entry_id);
                        streams.insert(entry_id, coordinator.updates());
                    }
                }
                Ok(RuntimeEvent::Unloaded { entry_id }) => {
                    streams.remove(&entry_id);
                }
                Ok(RuntimeEvent::SetupFailed { entry_id, reason, retrying }) => {
                    let title = title_of(ctx, &entry_id);
                    let suffix = if retrying { ", retrying" } else { "" };
                    output::print_status(&format!("{title}: {reason}{suffix}"), global.quiet);
                }
                Err(RecvError::Lagged(n)) => tracing::warn!(skipped = n, "runtime events lagged"),
                Err(RecvError::Closed) => break,
            },
            Some((entry_id, update)) = streams.next() => {
                let Some(entry) = ctx.entries.get(&entry_id) else { continue };
                if !entities.contains_key(&entry_id) {
                    if let Some(data) = update.data.as_deref() {
                        entities.insert(entry_id.clone(), build_entities(&entry, data));
                    }
                }
                let Some(entry_entities) = entities.get(&entry_id) else { continue };
                let line = render_update(&format, &entry, entry_entities, &update, args.all);
                output::print_output(&line, global.quiet);
            }
        }
    }

    runtime.shutdown().await;
    Ok(())
}

fn title_of(ctx: &Context, entry_id: &str) -> String {
    ctx.entries
        .get(entry_id)
        .map_or_else(|| entry_id.to_owned(), |e| e.title.clone())
}

/// Readings printed for one update.
fn selected_readings(entities: &Entities, update: &CoordinatorUpdate, all: bool) -> Vec<SensorReading> {
    let external: Vec<String> = entities.external.iter().map(|s| s.key()).collect();
    entities
        .readings(update)
        .into_iter()
        .filter(|r| {
            if all {
                r.enabled_by_default && r.value.is_some()
            } else {
                HEADLINE_KEYS.contains(&r.key.as_str()) || external.contains(&r.key)
            }
        })
        .collect()
}

fn render_update(
    format: &OutputFormat,
    entry: &ConfigEntry,
    entities: &Entities,
    update: &CoordinatorUpdate,
    all: bool,
) -> String {
    let time = chrono::Local::now();
    let readings = selected_readings(entities, update, all);

    match format {
        OutputFormat::Json | OutputFormat::JsonCompact | OutputFormat::Yaml => {
            let value = serde_json::json!({
                "time": time.to_rfc3339(),
                "entry_id": entry.entry_id,
                "title": entry.title,
                "available": update.last_update_success,
                "error": update.last_error.as_ref().map(ToString::to_string),
                "readings": readings,
            });
            output::render_json_compact(&value)
        }
        OutputFormat::Table | OutputFormat::Plain => {
            let mut line = format!("{}  {}", time.format("%H:%M:%S"), entry.title);
            if !update.last_update_success {
                let reason = update
                    .last_error
                    .as_ref()
                    .map_or_else(|| "unavailable".to_owned(), ToString::to_string);
                let _ = write!(line, "  unavailable ({reason})");
                return line;
            }
            for r in &readings {
                let value = r.value.as_ref().map_or_else(|| "-".to_owned(), ToString::to_string);
                let _ = write!(line, "  {}={value}", r.key);
                if let Some(unit) = &r.unit {
                    let _ = write!(line, " {unit}");
                }
            }
            line
        }
    }
}
