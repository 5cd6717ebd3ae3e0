//! Multipart upload endpoint
//!
//! POST /sessions/upload creates a new session from a `video` part plus the
//! optional `imu` and `meta` parts. Parts are streamed to a staging directory
//! and the session only appears once all of them are on disk.

use std::collections::HashSet;

use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    Json,
};
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::error::{ApiError, ApiResult};
use crate::store::{Artifact, StagedSession};

/// Response body for a successful upload
#[derive(Debug, Serialize, Deserialize)]
pub struct UploadAck {
    #[serde(rename = "sessionID")]
    pub session_id: String,
}

/// Map a multipart field name to the artifact it is stored as
fn artifact_for_field(name: &str) -> Option<Artifact> {
    match name {
        "video" => Some(Artifact::Video),
        "imu" => Some(Artifact::Imu),
        "meta" => Some(Artifact::Meta),
        _ => None,
    }
}

/// Create a new session from a multipart upload
///
/// POST /sessions/upload
pub async fn upload_session(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<UploadAck>> {
    let mut multipart = multipart.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let staged = state.store.stage().await?;
    if let Err(e) = receive_parts(&staged, &mut multipart).await {
        staged.discard().await;
        return Err(e);
    }

    let session_id = staged.commit().await?;
    Ok(Json(UploadAck {
        session_id: session_id.to_string(),
    }))
}

async fn receive_parts(staged: &StagedSession, multipart: &mut Multipart) -> ApiResult<()> {
    let mut seen = HashSet::new();

    while let Some(mut field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_owned();
        let Some(artifact) = artifact_for_field(&name) else {
            tracing::debug!(field = %name, "ignoring unknown upload field");
            continue;
        };
        if !seen.insert(artifact) {
            return Err(ApiError::BadRequest(format!("duplicate field `{}`", name)));
        }

        let bytes = match artifact {
            // Free-form text, stored verbatim and not validated as JSON
            Artifact::Meta => {
                let text = field.text().await?;
                staged.write_artifact(artifact, text.as_bytes()).await?
            }
            _ => {
                let mut writer = staged.create_artifact(artifact).await?;
                while let Some(chunk) = field.chunk().await? {
                    writer.write_chunk(&chunk).await?;
                }
                writer.finish().await?
            }
        };

        tracing::debug!(
            session_id = %staged.id(),
            artifact = artifact.file_name(),
            bytes,
            "stored upload part"
        );
    }

    if !seen.contains(&Artifact::Video) {
        return Err(ApiError::MissingField("video"));
    }
    Ok(())
}
