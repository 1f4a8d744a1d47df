use std::collections::HashSet;

use promptsync_core::models::PromptRecord;
use promptsync_core::sync::{DownloadPage, DownloadParams};
use serde::Serialize;

use crate::commands::common::{format_prompt_lines, format_timestamp, CommandContext};
use crate::error::CliError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PullOptions {
    pub full: bool,
    pub offset: Option<usize>,
    pub limit: Option<usize>,
    pub all: bool,
}

#[derive(Debug, Serialize)]
struct PullOutput {
    prompts: Vec<PromptRecord>,
    total: usize,
    #[serde(rename = "syncTimestamp")]
    sync_timestamp: chrono::DateTime<chrono::Utc>,
    watermark_saved: bool,
}

pub async fn run_pull(
    context: &CommandContext,
    options: PullOptions,
    as_json: bool,
) -> Result<(), CliError> {
    let mut state = context.load_state()?;
    let watermark = if options.full {
        None
    } else {
        state.watermark(context.api_url())
    };

    let mut params = DownloadParams {
        last_sync: watermark.map(|at| at.to_rfc3339()),
        offset: options.offset.map(|offset| offset.to_string()),
        limit: options.limit.map(|limit| limit.to_string()),
    };

    let first = context.client.download(&params).await?;
    let mut prompts = first.prompts.clone();
    let mut last = first.clone();
    if options.all {
        while last.has_more() {
            params.offset = Some((last.offset + last.prompts.len()).to_string());
            last = context.client.download(&params).await?;
            if last.prompts.is_empty() {
                break;
            }
            prompts.extend(last.prompts.iter().cloned());
        }
    }

    let watermark_saved = covers_everything(&first, &prompts);
    if watermark_saved {
        // The first page's timestamp precedes every read in this pull
        state.record_pull(context.api_url(), first.sync_timestamp);
        context.save_state(&state)?;
    }

    if as_json {
        let output = PullOutput {
            prompts,
            total: first.total,
            sync_timestamp: first.sync_timestamp,
            watermark_saved,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    let mode = if watermark.is_some() {
        format!("changes since {}", format_timestamp(watermark))
    } else {
        "full sync".to_string()
    };
    println!("Fetched {} of {} prompts ({mode})", prompts.len(), first.total);
    for line in format_prompt_lines(&prompts) {
        println!("{line}");
    }
    if !watermark_saved {
        println!("Partial pull: watermark not updated (use --all to fetch every page)");
    }
    Ok(())
}

/// A pull may advance the watermark only if it saw the whole filtered set.
///
/// Pages are offsets into a set ordered by `updated_at`. A record written
/// after the first page was served moves to the end and shifts everything
/// behind it, so one newer than `first.sync_timestamp` means a record may
/// have been skipped.
pub fn covers_everything(first: &DownloadPage, fetched: &[PromptRecord]) -> bool {
    if first.offset != 0 {
        return false;
    }
    if fetched
        .iter()
        .any(|record| record.updated_at > first.sync_timestamp)
    {
        return false;
    }
    let distinct: HashSet<_> = fetched.iter().map(|record| record.id).collect();
    distinct.len() >= first.total
}
