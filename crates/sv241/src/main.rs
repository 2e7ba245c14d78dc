mod cli;
mod commands;
mod error;
mod output;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use sv241_config::{ConfigError, Profile};
use sv241_core::SessionConfig;

use crate::cli::{Cli, Command, GlobalOpts};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    let mut cli = Cli::parse();

    init_tracing(cli.global.verbose);
    cli.global.apply_defaults(&sv241_config::load_config_or_default().defaults);

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

/// Logs go to stderr so stdout stays clean for command output.
fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        // Profile commands only touch the local config file
        Command::Profile(args) => commands::profile::handle(args, &cli.global),

        cmd => {
            let config = build_session_config(&cli.global)?;
            tracing::debug!(command = ?cmd, proxy = %config.proxy_url, "dispatching command");
            commands::dispatch(cmd, config, &cli.global).await
        }
    }
}

/// Build a `SessionConfig` from the config file, profile, and CLI overrides.
fn build_session_config(global: &GlobalOpts) -> Result<SessionConfig, CliError> {
    let cfg = sv241_config::load_config()?;

    let mut profile = match cfg.profile(global.profile.as_deref()) {
        Ok((_, profile)) => profile.clone(),
        // A bare --proxy works without any profile, unless one was named.
        Err(ConfigError::ProfileNotFound { .. })
            if global.proxy.is_some() && global.profile.is_none() =>
        {
            Profile::default()
        }
        Err(ConfigError::ProfileNotFound { name }) if global.profile.is_some() => {
            return Err(CliError::ProfileNotFound {
                name,
                available: cfg.profiles.keys().cloned().collect::<Vec<_>>().join(", "),
            });
        }
        Err(ConfigError::ProfileNotFound { .. }) => {
            return Err(CliError::NoConfig {
                path: sv241_config::config_path().display().to_string(),
            });
        }
        Err(e) => return Err(e.into()),
    };

    if let Some(proxy) = &global.proxy {
        profile.proxy.clone_from(proxy);
    }
    if let Some(timeout) = global.timeout {
        profile.timeout = Some(timeout);
    }

    Ok(sv241_config::profile_to_session_config(&profile, &cfg.defaults)?)
}
