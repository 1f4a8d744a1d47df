use promptsync_core::sync::StatusParams;

use crate::commands::common::{format_session_lines, format_status_lines, CommandContext};
use crate::error::CliError;

pub async fn run_status(
    context: &CommandContext,
    history: bool,
    limit: Option<usize>,
    as_json: bool,
) -> Result<(), CliError> {
    let params = StatusParams {
        history: history.then(|| "true".to_string()),
        limit: limit.map(|limit| limit.to_string()),
    };
    let report = context.client.status(&params).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    for line in format_status_lines(report.summary()) {
        println!("{line}");
    }
    if let Some(sessions) = report.history() {
        println!();
        if sessions.is_empty() {
            println!("No sync sessions recorded.");
        }
        for line in format_session_lines(sessions) {
            println!("{line}");
        }
    }
    Ok(())
}
