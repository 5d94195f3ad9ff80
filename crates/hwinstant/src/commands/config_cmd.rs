//! Config subcommand handlers.

use std::path::Path;

use clap::ValueEnum;

use crate::cli::{ColorMode, ConfigArgs, ConfigCommand, GlobalOpts, OutputFormat};
use crate::config::{Config, Defaults, save_config_to};
use crate::error::CliError;
use crate::output;

const KEYS: &str = "output, color, timeout, update_interval_ms, setup_retry_secs";

pub fn handle(
    args: ConfigArgs,
    mut cfg: Config,
    path: &Path,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        // ── Show ────────────────────────────────────────────────────
        ConfigCommand::Show => {
            let out = match global.output() {
                OutputFormat::Table | OutputFormat::Plain => {
                    toml::to_string_pretty(&cfg).map_err(|e| CliError::Internal {
                        message: format!("cannot render config: {e}"),
                    })?
                }
                OutputFormat::Json => output::render_json_pretty(&cfg),
                OutputFormat::JsonCompact => output::render_json_compact(&cfg),
                OutputFormat::Yaml => output::render_yaml(&cfg),
            };
            output::print_output(out.trim_end(), global.quiet);
            Ok(())
        }

        // ── Path ────────────────────────────────────────────────────
        ConfigCommand::Path => {
            println!("{}", path.display());
            Ok(())
        }

        // ── Set <key> <value> ───────────────────────────────────────
        ConfigCommand::Set { key, value } => {
            apply_setting(&mut cfg.defaults, &key, &value)?;
            save_config_to(&cfg, path)?;
            output::print_status(&format!("Set {key} = {value}"), global.quiet);
            Ok(())
        }
    }
}

/// Validate `value` for `key` and store it in `defaults`.
fn apply_setting(defaults: &mut Defaults, key: &str, value: &str) -> Result<(), CliError> {
    match key.replace('-', "_").as_str() {
        "output" => {
            OutputFormat::from_str(value, true).map_err(|_| CliError::Validation {
                field: "output".into(),
                reason: "must be one of table, json, json-compact, yaml, plain".into(),
            })?;
            defaults.output = value.to_lowercase();
        }
        "color" => {
            ColorMode::from_str(value, true).map_err(|_| CliError::Validation {
                field: "color".into(),
                reason: "must be one of auto, always, never".into(),
            })?;
            defaults.color = value.to_lowercase();
        }
        "timeout" => defaults.timeout = parse_positive("timeout", value)?,
        "update_interval_ms" => defaults.update_interval_ms = parse_positive(key, value)?,
        "setup_retry_secs" => defaults.setup_retry_secs = parse_positive(key, value)?,
        other => {
            return Err(CliError::Validation {
                field: other.into(),
                reason: format!("unknown config key '{other}'. Valid keys: {KEYS}"),
            });
        }
    }
    Ok(())
}

fn parse_positive(field: &str, value: &str) -> Result<u64, CliError> {
    match value.parse::<u64>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(CliError::Validation {
            field: field.into(),
            reason: "must be a positive whole number".into(),
        }),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn known_keys_are_validated_and_stored() {
        let mut defaults = Defaults::default();
        apply_setting(&mut defaults, "output", "JSON").ok();
        assert_eq!(defaults.output, "json");
        apply_setting(&mut defaults, "update-interval-ms", "500").ok();
        assert_eq!(defaults.update_interval_ms, 500);

        assert!(apply_setting(&mut defaults, "color", "sometimes").is_err());
        assert!(apply_setting(&mut defaults, "timeout", "0").is_err());
        assert_eq!(defaults.timeout, 5);
    }

    #[test]
    fn unknown_key_lists_valid_keys() {
        let err = apply_setting(&mut Defaults::default(), "controller", "x").unwrap_err();
        assert!(err.to_string().contains("controller"));
        assert!(matches!(err, CliError::Validation { reason, .. } if reason.contains("update_interval_ms")));
    }
}
