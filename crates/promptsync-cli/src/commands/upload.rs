use std::path::Path;

use promptsync_core::config::SyncLimits;
use promptsync_core::sync::{DesktopMutationInput, UploadRequest};
use promptsync_core::util::normalize_text_option;
use serde::Deserialize;
use uuid::Uuid;

use crate::commands::common::{format_conflict_lines, read_file, CommandContext};
use crate::error::CliError;

/// Accepted upload file shapes
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum UploadFile {
    Request(UploadRequest),
    Prompts(Vec<DesktopMutationInput>),
}

pub async fn run_upload(
    context: &CommandContext,
    file: &Path,
    session_id: Option<String>,
    as_json: bool,
) -> Result<(), CliError> {
    let request = build_upload_request(&read_file(file)?, session_id)?;

    // Field checks only; the server owns the batch size limit
    request
        .clone()
        .validate(&SyncLimits::default().with_max_batch_size(usize::MAX))
        .map_err(promptsync_core::Error::Validation)?;

    let summary = context.client.upload(&request).await?;

    let mut state = context.load_state()?;
    state.record_upload(context.api_url(), &summary.session_id);
    context.save_state(&state)?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!(
        "Session {}: {} uploaded, {} updated, {} conflicts",
        summary.session_id,
        summary.uploaded,
        summary.updated,
        summary.conflicts.len()
    );
    for line in format_conflict_lines(&summary.conflicts) {
        println!("  conflict: {line}");
    }
    Ok(())
}

/// Parse an upload file and settle the session id.
///
/// `--session-id` wins over one in the file; a UUID v7 is generated when neither is set.
pub fn build_upload_request(
    raw: &str,
    session_id: Option<String>,
) -> Result<UploadRequest, CliError> {
    let parsed = serde_json::from_str::<UploadFile>(raw).map_err(|_| {
        CliError::InvalidUploadFile(
            "expected a JSON array of prompts or an object with `prompts`".to_string(),
        )
    })?;

    let (prompts, file_session_id) = match parsed {
        UploadFile::Request(request) => (request.prompts, Some(request.sync_session_id)),
        UploadFile::Prompts(prompts) => (prompts, None),
    };

    let sync_session_id = normalize_text_option(session_id)
        .or_else(|| normalize_text_option(file_session_id))
        .unwrap_or_else(|| Uuid::now_v7().to_string());

    Ok(UploadRequest {
        prompts,
        sync_session_id,
    })
}
