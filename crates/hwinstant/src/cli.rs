//! Clap derive structures for the `hwinstant` CLI.
//!
//! Defines the command tree, global flags, and shared value enums.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// hwinstant -- poll HomeWizard P1 meters over the local API
#[derive(Debug, Parser)]
#[command(
    name = "hwinstant",
    version,
    about = "Set up and read HomeWizard P1 meters from the command line",
    long_about = "Set up and read HomeWizard Wi-Fi P1 meters over their local HTTP API (v1).\n\n\
        Entries are stored in a TOML config file. `watch` polls every loaded\n\
        entry once per second until interrupted.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Config file (defaults to the platform config directory)
    #[arg(long, env = "HWINSTANT_CONFIG_FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Output format [default: from config, else table]
    #[arg(long, short = 'o', env = "HWINSTANT_OUTPUT", global = true)]
    pub output: Option<OutputFormat>,

    /// When to use color output [default: from config, else auto]
    #[arg(long, global = true)]
    pub color: Option<ColorMode>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Skip confirmation prompts
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,

    /// HTTP request timeout in seconds (overrides config)
    #[arg(long, env = "HWINSTANT_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

impl GlobalOpts {
    pub fn output(&self) -> OutputFormat {
        self.output.clone().unwrap_or(OutputFormat::Table)
    }

    pub fn color(&self) -> ColorMode {
        self.color.clone().unwrap_or(ColorMode::Auto)
    }
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, PartialEq, Eq, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Set up the meter at an IP address
    Add(AddArgs),

    /// Set up a meter from a discovery announcement
    Discover(DiscoverArgs),

    /// Move an entry to a new IP address
    Reconfigure(ReconfigureArgs),

    /// Check that the local API is enabled again for an entry
    Reauth(ReauthArgs),

    /// Manage configured entries
    #[command(alias = "e")]
    Entries(EntriesArgs),

    /// Show the identity a meter reports
    Device(DeviceArgs),

    /// Read every sensor of an entry once
    #[command(alias = "s")]
    Sensors(SensorsArgs),

    /// Poll entries and print updates until Ctrl-C
    Watch(WatchArgs),

    /// Dump redacted diagnostics for an entry
    Diagnostics(DiagnosticsArgs),

    /// Manage CLI configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Setup ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct AddArgs {
    /// IP address or hostname of the meter
    pub ip_address: String,
}

#[derive(Debug, Args)]
pub struct DiscoverArgs {
    #[command(subcommand)]
    pub command: DiscoverCommand,
}

#[derive(Debug, Subcommand)]
pub enum DiscoverCommand {
    /// Handle a `_hwenergy._tcp` zeroconf announcement
    Zeroconf {
        /// Announced IP address
        #[arg(long)]
        ip: String,

        /// `product_name` TXT property
        #[arg(long)]
        product_name: Option<String>,

        /// `product_type` TXT property (e.g. HWE-P1)
        #[arg(long)]
        product_type: Option<String>,

        /// `serial` TXT property
        #[arg(long)]
        serial: Option<String>,

        /// `path` TXT property (e.g. /api/v1)
        #[arg(long)]
        path: Option<String>,
    },

    /// Handle a DHCP lease for a HomeWizard device
    Dhcp {
        /// Leased IP address
        #[arg(long)]
        ip: String,

        /// Hostname from the lease
        #[arg(long)]
        hostname: Option<String>,

        /// MAC address from the lease
        #[arg(long)]
        mac: Option<String>,
    },
}

#[derive(Debug, Args)]
pub struct ReconfigureArgs {
    /// Entry id, title, unique id or current IP address
    pub entry: String,

    /// New IP address or hostname
    pub ip_address: String,
}

#[derive(Debug, Args)]
pub struct ReauthArgs {
    /// Entry id, title, unique id or IP address
    pub entry: String,
}

// ── Entries ──────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct EntriesArgs {
    #[command(subcommand)]
    pub command: EntriesCommand,
}

#[derive(Debug, Subcommand)]
pub enum EntriesCommand {
    /// List configured entries
    #[command(alias = "ls")]
    List,

    /// Show one entry
    Show {
        /// Entry id, title, unique id or IP address
        entry: String,
    },

    /// Remove an entry
    #[command(alias = "rm")]
    Remove {
        /// Entry id, title, unique id or IP address
        entry: String,
    },
}

// ── Reading ──────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct DeviceArgs {
    /// Entry id, title, unique id or IP address
    #[arg(required_unless_present = "ip")]
    pub entry: Option<String>,

    /// Query an address that is not configured
    #[arg(long, conflicts_with = "entry")]
    pub ip: Option<String>,
}

#[derive(Debug, Args)]
pub struct SensorsArgs {
    /// Entry id, title, unique id or IP address
    pub entry: String,

    /// Include sensors that are disabled by default
    #[arg(long, short = 'a')]
    pub all: bool,
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Entries to watch (default: all)
    pub entries: Vec<String>,

    /// Print every sensor instead of the headline values
    #[arg(long, short = 'a')]
    pub all: bool,
}

#[derive(Debug, Args)]
pub struct DiagnosticsArgs {
    /// Entry id, title, unique id or IP address
    pub entry: String,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display current resolved configuration
    Show,

    /// Print the config file path
    Path,

    /// Set a value in [defaults]
    Set {
        /// Key (output, color, timeout, update_interval_ms, setup_retry_secs)
        key: String,

        /// Value to set
        value: String,
    },
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
