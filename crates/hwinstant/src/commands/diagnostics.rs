//! Redacted diagnostics dump.

use hwinstant_core::config_entry_diagnostics;

use crate::cli::{DiagnosticsArgs, GlobalOpts, OutputFormat};
use crate::config::Context;
use crate::error::CliError;
use crate::output;

use super::util;

pub async fn handle(
    ctx: &mut Context,
    args: DiagnosticsArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let entry = ctx.resolve_entry(&args.entry)?;

    // An unreachable meter still gets its entry dumped, with `data: null`.
    let data = match util::poll_once(ctx, &entry).await {
        Ok((coordinator, _)) => coordinator.data(),
        Err(e) => {
            tracing::warn!(entry_id = %entry.entry_id, error = %e, "cannot reach device");
            None
        }
    };
    let report = config_entry_diagnostics(&entry, data.as_deref());

    let out = match global.output() {
        OutputFormat::JsonCompact => output::render_json_compact(&report),
        OutputFormat::Yaml => output::render_yaml(&report),
        _ => output::render_json_pretty(&report),
    };
    output::print_output(&out, global.quiet);
    Ok(())
}
