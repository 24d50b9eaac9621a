//! Resumable bulk download of every activity on the account.

use crate::{BulkSummary, DownloadOutcome, FileType, GarminConnectClient, GarminError};
use std::path::{Path, PathBuf};

pub fn activity_file_path(output_dir: &Path, activity_id: &str, filetype: FileType) -> PathBuf {
    output_dir.join(format!("activity_{activity_id}.{}", filetype.extension()))
}

pub fn sidecar_path(output_dir: &Path, activity_id: &str) -> PathBuf {
    output_dir.join(format!("activity_{activity_id}.json"))
}

/// Download every activity that is not yet present in `output_dir`.
///
/// Files already on disk are skipped, so re-running after a successful pass
/// downloads nothing. With `continue_on_failure` unset the first failed or
/// unavailable download aborts the batch.
pub async fn download_all<C>(
    client: &C,
    output_dir: &Path,
    filetype: FileType,
    continue_on_failure: bool,
) -> Result<BulkSummary, GarminError>
where
    C: GarminConnectClient + ?Sized,
{
    if !tokio::fs::metadata(output_dir)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false)
    {
        return Err(GarminError::Precondition(format!(
            "directory {} doesn't exist",
            output_dir.display()
        )));
    }

    let activities = client.get_all_activities().await?;
    tracing::info!(count = activities.len(), "activities found");

    let mut summary = BulkSummary::default();
    for activity in &activities {
        let name = activity.name.as_deref().unwrap_or("");
        let sidecar = sidecar_path(output_dir, &activity.id);
        if !path_exists(&sidecar).await {
            tracing::info!(path = %sidecar.display(), "saving activity metadata");
            tokio::fs::write(&sidecar, serde_json::to_vec(&activity.raw)?).await?;
        }

        let target = activity_file_path(output_dir, &activity.id, filetype);
        if path_exists(&target).await {
            tracing::info!(id = %activity.id, name, "skipping, already downloaded");
            summary.skipped += 1;
            metrics::counter!("garmin_connect_downloads_skipped_total").increment(1);
            continue;
        }

        tracing::info!(id = %activity.id, name, path = %target.display(), "downloading");
        let failure = match client.download(&activity.id, &target, filetype).await {
            Ok(DownloadOutcome::Saved { .. }) => {
                summary.downloaded += 1;
                metrics::counter!("garmin_connect_downloads_total").increment(1);
                continue;
            }
            Ok(DownloadOutcome::Unavailable) => GarminError::FiletypeUnavailable {
                activity_id: activity.id.clone(),
                filetype,
            },
            Err(e) => e,
        };

        summary.errored += 1;
        metrics::counter!("garmin_connect_downloads_failed_total").increment(1);
        if !continue_on_failure {
            return Err(failure);
        }
        tracing::warn!(id = %activity.id, error = %failure, "failed to download activity");
    }

    tracing::info!(
        downloaded = summary.downloaded,
        skipped = summary.skipped,
        errored = summary.errored,
        "bulk download finished"
    );
    Ok(summary)
}

async fn path_exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}
