//! Device commands and backups.

use sv241_core::{DashboardSession, DeviceCommand};

use crate::cli::{BackupCommand, DeviceCommandArg, GlobalOpts};
use crate::error::CliError;

use super::util;

impl From<DeviceCommandArg> for DeviceCommand {
    fn from(arg: DeviceCommandArg) -> Self {
        match arg {
            DeviceCommandArg::Reboot => Self::Reboot,
            DeviceCommandArg::FactoryReset => Self::FactoryReset,
            DeviceCommandArg::DrySensor => Self::DrySensor,
        }
    }
}

fn prompt_for(command: DeviceCommand) -> &'static str {
    match command {
        DeviceCommand::Reboot => "Reboot the SV241?",
        DeviceCommand::FactoryReset => {
            "Factory reset the SV241? All device settings will be erased."
        }
        DeviceCommand::DrySensor => "Run the SHT40 drying cycle now?",
    }
}

pub async fn command(
    session: &DashboardSession,
    arg: DeviceCommandArg,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let command = DeviceCommand::from(arg);
    if !util::confirm(prompt_for(command), &command.to_string(), global.yes)? {
        return Ok(());
    }

    let message = session.send_command(command).await?;
    if message.trim().is_empty() {
        util::notice(&format!("Sent {command} command"), global.quiet);
    } else {
        util::notice(message.trim(), global.quiet);
    }
    Ok(())
}

pub async fn backup(
    session: &DashboardSession,
    cmd: BackupCommand,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        BackupCommand::Create { file } => {
            let document = session.create_backup().await?;
            util::write_document(file.as_deref(), &document, global.quiet)
        }

        BackupCommand::Restore { file } => {
            let content = std::fs::read_to_string(&file)?;
            let prompt = format!(
                "Restore {}? Proxy settings and device configuration will be replaced.",
                file.display()
            );
            if !util::confirm(&prompt, "backup restore", global.yes)? {
                return Ok(());
            }

            let message = session.restore_backup(&content).await?;
            if message.trim().is_empty() {
                util::notice("Backup restored", global.quiet);
            } else {
                util::notice(message.trim(), global.quiet);
            }
            Ok(())
        }
    }
}
