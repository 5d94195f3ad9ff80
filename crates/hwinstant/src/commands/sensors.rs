//! One-shot sensor read.

use tabled::Tabled;

use hwinstant_core::{SensorReading, build_entities};

use crate::cli::{GlobalOpts, OutputFormat, SensorsArgs};
use crate::config::Context;
use crate::error::CliError;
use crate::output;

use super::util;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct SensorRow {
    #[tabled(rename = "Sensor")]
    key: String,
    #[tabled(rename = "Value")]
    value: String,
    #[tabled(rename = "Unit")]
    unit: String,
    #[tabled(rename = "Status")]
    status: String,
}

fn row(r: &SensorReading, color: bool) -> SensorRow {
    SensorRow {
        key: r.key.clone(),
        value: r
            .value
            .as_ref()
            .map_or_else(|| output::dimmed("-", color), ToString::to_string),
        unit: r.unit.clone().unwrap_or_default(),
        status: output::availability(r.available, color),
    }
}

/// `key=value` line for plain output; unknown values print empty.
pub(crate) fn plain_line(r: &SensorReading) -> String {
    let value = r.value.as_ref().map(ToString::to_string).unwrap_or_default();
    format!("{}={value}", r.key)
}

/// Readings a user sees by default: enabled entities only.
pub(crate) fn visible(readings: Vec<SensorReading>, all: bool) -> Vec<SensorReading> {
    if all {
        readings
    } else {
        readings.into_iter().filter(|r| r.enabled_by_default).collect()
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(ctx: &mut Context, args: SensorsArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let entry = ctx.resolve_entry(&args.entry)?;
    let (coordinator, result) = util::poll_once(ctx, &entry).await?;
    let data = result?;

    let entities = build_entities(&entry, &data);
    let readings = visible(entities.readings(&coordinator.current()), args.all);

    let color = output::should_color(&global.color());
    let format = global.output();
    let out = match format {
        OutputFormat::Plain => readings.iter().map(plain_line).collect::<Vec<_>>().join("\n"),
        _ => output::render_list(&format, &readings, |r| row(r, color), |r| r.key.clone()),
    };
    output::print_output(&out, global.quiet);
    Ok(())
}
