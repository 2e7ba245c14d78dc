//! Clap derive structures for the `sv241` CLI.
//!
//! Defines the complete command tree, global flags, and shared types.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use sv241_config::Defaults;
use sv241_core::{ConfigField, ConfigSection, Severity};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// sv241 -- watch and configure an SV241 power box through its proxy
#[derive(Debug, Parser)]
#[command(
    name = "sv241",
    version,
    about = "Monitor and configure an SV241 power box from the command line",
    long_about = "Talks to the SV241 proxy over its REST API and live log stream.\n\n\
        The proxy owns the serial link to the device; every device-bound\n\
        action is refused unless the proxy reports the device as connected.",
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
    /// Proxy profile to use
    #[arg(long, short = 'p', env = "SV241_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Proxy URL (overrides profile)
    #[arg(long, short = 'x', env = "SV241_PROXY", global = true)]
    pub proxy: Option<String>,

    /// Output format [default: table, or `defaults.output` from the config]
    #[arg(long, short = 'o', env = "SV241_OUTPUT", global = true)]
    pub output: Option<OutputFormat>,

    /// When to use color output [default: auto, or `defaults.color`]
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

    /// Request timeout in seconds (no timeout unless set)
    #[arg(long, env = "SV241_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

impl GlobalOpts {
    pub fn output_format(&self) -> OutputFormat {
        self.output.unwrap_or(OutputFormat::Table)
    }

    pub fn color_mode(&self) -> ColorMode {
        self.color.unwrap_or(ColorMode::Auto)
    }

    /// Fill format and color the flags left unset from the config defaults.
    /// Unknown values in the config are ignored with a warning.
    pub fn apply_defaults(&mut self, defaults: &Defaults) {
        if self.output.is_none() {
            self.output = parse_default("output", &defaults.output);
        }
        if self.color.is_none() {
            self.color = parse_default("color", &defaults.color);
        }
    }
}

fn parse_default<T: ValueEnum>(key: &str, raw: &str) -> Option<T> {
    match T::from_str(raw, true) {
        Ok(value) => Some(value),
        Err(reason) => {
            tracing::warn!(key, value = raw, %reason, "ignoring config default");
            None
        }
    }
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
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
    /// Connection state, versions, live readings and outputs
    #[command(alias = "st")]
    Status,

    /// Keep polling and print a line whenever the readings change
    Watch(WatchArgs),

    /// Follow the proxy's live log
    Logs(LogsArgs),

    /// Show or change the device and proxy configuration
    #[command(alias = "cfg")]
    Config(ConfigArgs),

    /// Switch a single output
    #[command(alias = "sw")]
    Switch(SwitchArgs),

    /// Master power for every output
    Power {
        /// Target state
        state: OnOff,
    },

    /// Send a device command
    #[command(alias = "cmd")]
    Command(CommandArgs),

    /// Create or restore a full backup
    Backup(BackupArgs),

    /// Telemetry history
    #[command(alias = "hist")]
    History(HistoryArgs),

    /// Manage CLI profiles
    Profile(ProfileArgs),
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  WATCH / LOGS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Also follow the live log while watching
    #[arg(long)]
    pub logs: bool,
}

#[derive(Debug, Args)]
pub struct LogsArgs {
    /// Hide lines below this severity
    #[arg(long, short = 'l', value_parser = parse_severity)]
    pub level: Option<Severity>,

    /// Exit after this many lines (markers included)
    #[arg(long, short = 'n')]
    pub count: Option<usize>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  CONFIG
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show the configuration, or one section of it
    Show {
        /// Section to show (sensors, dew-heaters, adjustable-voltage,
        /// power-startup, auto-dry, proxy-settings, switch-names)
        #[arg(value_parser = parse_section)]
        section: Option<ConfigSection>,
    },

    /// Edit fields of one section and save it
    Save {
        /// Section to save
        #[arg(value_parser = parse_section)]
        section: ConfigSection,

        /// Field assignment, e.g. `so.st=-0,5` or `dh.1.m=min-temp`
        #[arg(long = "set", short = 's', value_parser = parse_assignment, required = true)]
        set: Vec<Assignment>,
    },

    /// Modes each heater may take given the other heater's mode
    Heaters,
}

/// One `field=value` pair from `config save --set`.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub field: ConfigField,
    pub value: String,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  POWER
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OnOff {
    On,
    Off,
}

impl OnOff {
    pub const fn is_on(self) -> bool {
        matches!(self, Self::On)
    }
}

#[derive(Debug, Args)]
pub struct SwitchArgs {
    /// Alpaca switch id
    pub id: u32,

    /// Target state
    #[arg(required_unless_present = "value")]
    pub state: Option<OnOff>,

    /// Set a value instead (e.g. the adjustable converter voltage)
    #[arg(long, conflicts_with = "state")]
    pub value: Option<f64>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  COMMANDS / BACKUP
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct CommandArgs {
    #[command(subcommand)]
    pub command: DeviceCommandArg,
}

#[derive(Debug, Clone, Copy, Subcommand)]
pub enum DeviceCommandArg {
    /// Restart the device
    Reboot,
    /// Erase the device configuration
    FactoryReset,
    /// Heat the SHT40 to drive off condensation
    DrySensor,
}

#[derive(Debug, Args)]
pub struct BackupArgs {
    #[command(subcommand)]
    pub command: BackupCommand,
}

#[derive(Debug, Subcommand)]
pub enum BackupCommand {
    /// Download a backup of proxy settings and firmware config
    Create {
        /// Write to a file instead of stdout
        #[arg(long, short = 'f')]
        file: Option<PathBuf>,
    },

    /// Restore a backup file
    Restore {
        /// Backup JSON produced by `backup create`
        file: PathBuf,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  HISTORY
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct HistoryArgs {
    #[command(subcommand)]
    pub command: HistoryCommand,
}

#[derive(Debug, Subcommand)]
pub enum HistoryCommand {
    /// Nights with logged telemetry
    Dates,

    /// Telemetry samples of one night, or of the default window
    Show {
        /// Night to show (YYYY-MM-DD)
        date: Option<String>,
    },

    /// Download one night as CSV
    Download {
        /// Night to download (YYYY-MM-DD)
        date: String,

        /// Write to a file instead of stdout
        #[arg(long, short = 'f')]
        file: Option<PathBuf>,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  PROFILE
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct ProfileArgs {
    #[command(subcommand)]
    pub command: ProfileCommand,
}

#[derive(Debug, Subcommand)]
pub enum ProfileCommand {
    /// List configured profiles
    List,

    /// Add or replace a profile
    Add {
        /// Profile name
        name: String,

        /// Proxy URL, e.g. http://192.168.1.20:8080
        #[arg(long)]
        url: String,
    },

    /// Set the default profile
    Use {
        /// Profile name to set as default
        name: String,
    },

    /// Show the config file path
    Path,
}

// ── Value parsers ────────────────────────────────────────────────────

fn parse_section(s: &str) -> Result<ConfigSection, String> {
    s.parse().map_err(|_| {
        use strum::IntoEnumIterator;
        let known: Vec<String> = ConfigSection::iter().map(|s| s.to_string()).collect();
        format!("unknown section '{s}' (expected one of: {})", known.join(", "))
    })
}

fn parse_assignment(s: &str) -> Result<Assignment, String> {
    let (field, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected field=value, got '{s}'"))?;
    let field = field.parse::<ConfigField>().map_err(|e| e.to_string())?;
    Ok(Assignment {
        field,
        value: value.to_owned(),
    })
}

fn parse_severity(s: &str) -> Result<Severity, String> {
    match s.to_ascii_lowercase().as_str() {
        "error" => Ok(Severity::Error),
        "warn" | "warning" => Ok(Severity::Warn),
        "info" => Ok(Severity::Info),
        "debug" => Ok(Severity::Debug),
        other => Err(format!("unknown level '{other}'")),
    }
}
