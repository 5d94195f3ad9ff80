//! Entry command handlers.

use tabled::Tabled;

use hwinstant_core::ConfigEntry;

use crate::cli::{EntriesArgs, EntriesCommand, GlobalOpts};
use crate::config::Context;
use crate::error::CliError;
use crate::output;

use super::util;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct EntryRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Title")]
    title: String,
    #[tabled(rename = "Address")]
    address: String,
    #[tabled(rename = "Unique ID")]
    unique_id: String,
    #[tabled(rename = "Source")]
    source: String,
}

impl From<&ConfigEntry> for EntryRow {
    fn from(e: &ConfigEntry) -> Self {
        Self {
            id: e.entry_id.clone(),
            title: e.title.clone(),
            address: e.data.ip_address.clone(),
            unique_id: e.unique_id.clone().unwrap_or_else(|| "-".into()),
            source: e.source.to_string(),
        }
    }
}

pub(crate) fn detail(e: &ConfigEntry) -> Vec<(&'static str, String)> {
    vec![
        ("ID", e.entry_id.clone()),
        ("Title", e.title.clone()),
        ("Address", e.data.ip_address.clone()),
        ("Unique ID", e.unique_id.clone().unwrap_or_else(|| "-".into())),
        ("Source", e.source.to_string()),
    ]
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(ctx: &mut Context, args: EntriesArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        EntriesCommand::List => {
            let snapshot = ctx.entries.snapshot();
            let entries: Vec<ConfigEntry> = snapshot.iter().map(|e| (**e).clone()).collect();
            let out = output::render_list(
                &global.output(),
                &entries,
                |e| EntryRow::from(e),
                |e| e.entry_id.clone(),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }

        EntriesCommand::Show { entry } => {
            let entry = ctx.resolve_entry(&entry)?;
            let out = output::render_single(&global.output(), &*entry, detail, |e| {
                e.entry_id.clone()
            });
            output::print_output(&out, global.quiet);
            Ok(())
        }

        EntriesCommand::Remove { entry } => {
            let entry = ctx.resolve_entry(&entry)?;
            let prompt = format!("Remove '{}' ({})?", entry.title, entry.data.ip_address);
            if !util::confirm(&prompt, global.yes)? {
                output::print_status("Cancelled", global.quiet);
                return Ok(());
            }
            ctx.entries.remove(&entry.entry_id);
            ctx.save()?;
            output::print_status(&format!("Removed '{}'", entry.title), global.quiet);
            Ok(())
        }
    }
}
