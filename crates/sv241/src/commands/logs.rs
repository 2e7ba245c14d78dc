//! Live log follower.

use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tracing::warn;

use sv241_core::{DashboardSession, LogLine, Severity};

use crate::cli::{GlobalOpts, LogsArgs, OutputFormat};
use crate::error::CliError;
use crate::output;

/// Markers always pass; messages pass when at least as severe as `level`.
fn passes(line: &LogLine, level: Option<Severity>) -> bool {
    line.is_marker() || level.is_none_or(|level| line.severity <= level)
}

pub async fn handle(
    session: &DashboardSession,
    args: &LogsArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let color = output::should_color(global.color_mode());
    // Subscribe before starting so the first marker is not missed.
    let mut lines = BroadcastStream::new(session.log().subscribe());
    session.start().await?;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut printed = 0usize;

    loop {
        let item = tokio::select! {
            biased;
            _ = &mut ctrl_c => break,
            item = lines.next() => item,
        };

        let line = match item {
            Some(Ok(line)) => line,
            Some(Err(BroadcastStreamRecvError::Lagged(skipped))) => {
                warn!(skipped, "log output fell behind, lines dropped");
                continue;
            }
            None => break,
        };
        if !passes(&line, args.level) {
            continue;
        }

        let out = match global.output_format() {
            OutputFormat::Table => output::format_log_line(&line, color),
            OutputFormat::Json | OutputFormat::JsonCompact => serde_json::to_string(&*line)?,
        };
        output::print_output(&out, global.quiet);

        printed += 1;
        if args.count.is_some_and(|limit| printed >= limit) {
            break;
        }
    }
    Ok(())
}
