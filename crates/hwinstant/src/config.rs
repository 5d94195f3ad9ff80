//! CLI configuration: a thin wrapper around `hwinstant_config`.
//!
//! Resolves the config file from `--config`, applies global flag
//! overrides, and hands commands a [`Context`] holding the shared entry
//! registry. Commands that change entries persist them through
//! [`Context::save`].

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::ValueEnum;

use hwinstant_core::{ConfigEntries, ConfigEntry, HttpClientFactory, RuntimeOptions};

use crate::cli::{ColorMode, GlobalOpts, OutputFormat};
use crate::error::CliError;

// ── Re-exports from shared crate ────────────────────────────────────

pub use hwinstant_config::{Config, Defaults, config_path, load_config_from, save_config_to};

// ── Resolution ──────────────────────────────────────────────────────

/// Config file selected by `--config`, else the platform default.
pub fn resolve_path(global: &GlobalOpts) -> PathBuf {
    global.config.clone().unwrap_or_else(config_path)
}

/// Fill unset output and color flags from `[defaults]`.
pub fn apply_defaults(global: &mut GlobalOpts, defaults: &Defaults) {
    if global.output.is_none() {
        global.output = OutputFormat::from_str(&defaults.output, true).ok();
    }
    if global.color.is_none() {
        global.color = ColorMode::from_str(&defaults.color, true).ok();
    }
}

/// Everything a command needs: the loaded config, the entry registry built
/// from it, and runtime settings with flag overrides applied.
pub struct Context {
    pub config: Config,
    pub path: PathBuf,
    pub entries: Arc<ConfigEntries>,
    pub options: RuntimeOptions,
}

impl Context {
    pub fn new(config: Config, path: PathBuf, global: &GlobalOpts) -> Result<Self, CliError> {
        let mut options = config.defaults.runtime_options()?;
        if let Some(timeout) = global.timeout {
            options.transport.timeout = Duration::from_secs(timeout);
        }
        let entries = Arc::new(config.to_entries()?);
        Ok(Self {
            config,
            path,
            entries,
            options,
        })
    }

    pub fn factory(&self) -> HttpClientFactory {
        HttpClientFactory::new(self.options.transport.clone())
    }

    /// Write the registry's current entries back to the config file.
    pub fn save(&mut self) -> Result<(), CliError> {
        self.config.sync_entries(&self.entries);
        save_config_to(&self.config, &self.path)?;
        tracing::debug!(path = %self.path.display(), "config saved");
        Ok(())
    }

    /// Find an entry by id, unique id, IP address or title.
    pub fn resolve_entry(&self, identifier: &str) -> Result<Arc<ConfigEntry>, CliError> {
        if let Some(entry) = self.entries.get(identifier) {
            return Ok(entry);
        }
        if let Some(entry) = self.entries.get_by_unique_id(identifier) {
            return Ok(entry);
        }

        let snapshot = self.entries.snapshot();
        let matches: Vec<&Arc<ConfigEntry>> = snapshot
            .iter()
            .filter(|e| {
                e.data.ip_address == identifier || e.title.eq_ignore_ascii_case(identifier)
            })
            .collect();

        match matches.as_slice() {
            [entry] => Ok(Arc::clone(entry)),
            [] => Err(CliError::NotFound {
                resource_type: "entry".into(),
                identifier: identifier.into(),
                list_command: "entries list".into(),
            }),
            _ => Err(CliError::Ambiguous {
                identifier: identifier.into(),
            }),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use hwinstant_config::EntryConfig;
    use hwinstant_core::FlowSource;

    use super::*;

    fn global() -> GlobalOpts {
        GlobalOpts {
            config: None,
            output: None,
            color: None,
            verbose: 0,
            quiet: true,
            yes: true,
            timeout: None,
        }
    }

    fn context() -> Context {
        let mut config = Config::default();
        for (id, ip, title) in [
            ("a1", "192.168.1.50", "P1 meter"),
            ("b2", "192.168.1.51", "Garage"),
            ("c3", "192.168.1.52", "garage"),
        ] {
            config.entries.insert(
                id.into(),
                EntryConfig {
                    ip_address: ip.into(),
                    unique_id: Some(format!("homewizard_instant_HWE-P1_{id}")),
                    title: title.into(),
                    source: FlowSource::User,
                },
            );
        }
        Context::new(config, PathBuf::from("unused.toml"), &global()).unwrap()
    }

    #[test]
    fn entries_resolve_by_any_identifier() {
        let ctx = context();
        assert_eq!(ctx.resolve_entry("a1").unwrap().entry_id, "a1");
        assert_eq!(
            ctx.resolve_entry("homewizard_instant_HWE-P1_a1").unwrap().entry_id,
            "a1"
        );
        assert_eq!(ctx.resolve_entry("192.168.1.51").unwrap().entry_id, "b2");
        assert_eq!(ctx.resolve_entry("p1 METER").unwrap().entry_id, "a1");
    }

    #[test]
    fn ambiguous_and_missing_entries_fail() {
        let ctx = context();
        assert!(matches!(
            ctx.resolve_entry("garage"),
            Err(CliError::Ambiguous { .. })
        ));
        assert!(matches!(
            ctx.resolve_entry("nope"),
            Err(CliError::NotFound { .. })
        ));
    }

    #[test]
    fn timeout_flag_overrides_config() {
        let mut opts = global();
        opts.timeout = Some(2);
        let ctx = Context::new(Config::default(), PathBuf::from("x.toml"), &opts).unwrap();
        assert_eq!(ctx.options.transport.timeout, Duration::from_secs(2));
    }

    #[test]
    fn defaults_fill_unset_flags() {
        let mut opts = global();
        let defaults = Defaults {
            output: "json".into(),
            color: "never".into(),
            ..Defaults::default()
        };
        apply_defaults(&mut opts, &defaults);
        assert_eq!(opts.output(), OutputFormat::Json);
        assert_eq!(opts.color(), ColorMode::Never);

        opts.output = Some(OutputFormat::Yaml);
        apply_defaults(&mut opts, &defaults);
        assert_eq!(opts.output(), OutputFormat::Yaml);
    }
}
