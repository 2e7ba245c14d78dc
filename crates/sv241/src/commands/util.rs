//! Shared helpers for command handlers.

use std::io::IsTerminal;
use std::path::Path;

use crate::error::CliError;
use crate::output;

/// Prompt for confirmation, auto-approving if `--yes` was passed.
pub fn confirm(message: &str, action: &str, yes_flag: bool) -> Result<bool, CliError> {
    if yes_flag {
        return Ok(true);
    }
    if !std::io::stdin().is_terminal() {
        return Err(CliError::NonInteractiveRequiresYes {
            action: action.into(),
        });
    }
    dialoguer::Confirm::new()
        .with_prompt(message)
        .default(false)
        .interact()
        .map_err(|e| CliError::Io(std::io::Error::other(e)))
}

/// Write a downloaded document to `file`, or to stdout when none is given.
pub fn write_document(file: Option<&Path>, contents: &str, quiet: bool) -> Result<(), CliError> {
    match file {
        Some(path) => {
            std::fs::write(path, contents)?;
            if !quiet {
                eprintln!("Wrote {}", path.display());
            }
        }
        None => output::print_output(contents.trim_end(), false),
    }
    Ok(())
}

/// Status message on stderr unless `--quiet`.
pub fn notice(message: &str, quiet: bool) {
    if !quiet {
        eprintln!("{message}");
    }
}
