//! Command dispatch: bridges CLI args -> session actions -> output formatting.

pub mod config_cmd;
pub mod device;
pub mod history;
pub mod logs;
pub mod power;
pub mod profile;
pub mod status;
pub mod util;

use sv241_core::{DashboardSession, SessionConfig};

use crate::cli::{Command, GlobalOpts, WatchArgs};
use crate::error::CliError;

/// Dispatch a proxy-bound command to the appropriate handler.
///
/// One-shot commands drive the session by hand; only `watch` and `logs`
/// start its background pollers and log stream.
pub async fn dispatch(
    cmd: Command,
    mut config: SessionConfig,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    config.polling_enabled = matches!(cmd, Command::Watch(_));
    config.log_stream_enabled =
        matches!(cmd, Command::Logs(_) | Command::Watch(WatchArgs { logs: true }));

    let session = DashboardSession::new(config)?;

    let result = match cmd {
        Command::Status => status::handle(&session, global).await,
        Command::Watch(args) => status::watch(&session, &args, global).await,
        Command::Logs(args) => logs::handle(&session, &args, global).await,
        Command::Config(args) => config_cmd::handle(&session, args, global).await,
        Command::Switch(args) => power::switch(&session, &args, global).await,
        Command::Power { state } => power::master(&session, state, global).await,
        Command::Command(args) => device::command(&session, args.command, global).await,
        Command::Backup(args) => device::backup(&session, args.command, global).await,
        Command::History(args) => history::handle(&session, args.command, global).await,
        Command::Profile(_) => Err(CliError::Internal(
            "profile commands do not need a proxy session".into(),
        )),
    };

    session.shutdown().await;
    result
}
