//! Filesystem-backed session store
//!
//! Each session is a directory `<root>/<session-id>` holding up to four
//! well-known artifacts. Uploads are written into `<root>/.staging/<id>` and
//! renamed into place once every part is on disk, so list and summary never
//! observe a half-written session. Nothing here deletes a committed session.

use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tokio::fs::{self, File};
use tokio::io::{AsyncWriteExt, BufWriter};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};

/// Directory under the root where in-flight uploads are assembled
pub const STAGING_DIR: &str = ".staging";

/// Longest id accepted, the usual file-name limit
const MAX_SESSION_ID_LEN: usize = 255;

/// Opaque session identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Generate a fresh random id
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Validate a client-supplied id.
    ///
    /// Any single path component is accepted as long as it does not start
    /// with `.` (which also excludes `.`, `..` and the staging area) and
    /// contains no separator or control character.
    pub fn parse(raw: &str) -> ApiResult<Self> {
        let valid = !raw.is_empty()
            && raw.len() <= MAX_SESSION_ID_LEN
            && !raw.starts_with('.')
            && !raw
                .chars()
                .any(|c| c == '/' || c == '\\' || c.is_control());

        if valid {
            Ok(Self(raw.to_string()))
        } else {
            Err(ApiError::InvalidSessionId(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The well-known files a session directory may contain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Artifact {
    /// Uploaded video, required
    Video,
    /// Optional IMU samples
    Imu,
    /// Optional free-form metadata
    Meta,
    /// Written by the external processing pipeline
    Results,
}

impl Artifact {
    pub const ALL: [Artifact; 4] = [
        Artifact::Video,
        Artifact::Imu,
        Artifact::Meta,
        Artifact::Results,
    ];

    pub fn file_name(self) -> &'static str {
        match self {
            Artifact::Video => "video.mp4",
            Artifact::Imu => "imu.json",
            Artifact::Meta => "meta.json",
            Artifact::Results => "results.json",
        }
    }
}

/// What the store knows about one session's files
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionFiles {
    /// Whether the session directory exists
    pub exists: bool,
    /// File name to size in bytes, present artifacts only
    pub files: BTreeMap<String, u64>,
}

/// Session directories rooted at a single base path
#[derive(Debug, Clone)]
pub struct SessionStore {
    root: PathBuf,
}

impl SessionStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn session_dir(&self, id: &SessionId) -> PathBuf {
        self.root.join(id.as_str())
    }

    pub fn artifact_path(&self, id: &SessionId, artifact: Artifact) -> PathBuf {
        self.session_dir(id).join(artifact.file_name())
    }

    fn staging_root(&self) -> PathBuf {
        self.root.join(STAGING_DIR)
    }

    /// Names of all committed sessions, ascending.
    ///
    /// A missing or unreadable root yields an empty list.
    pub async fn list(&self) -> Vec<String> {
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::debug!(root = %self.root.display(), error = %e, "session root not readable");
                return Vec::new();
            }
        };

        let mut ids = Vec::new();
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(root = %self.root.display(), error = %e, "error while listing sessions");
                    break;
                }
            };

            // Only names the per-session endpoints will accept back
            let Some(id) = entry
                .file_name()
                .to_str()
                .and_then(|name| SessionId::parse(name).ok())
            else {
                continue;
            };
            // Follow symlinks so a linked session directory still counts
            if matches!(fs::metadata(entry.path()).await, Ok(meta) if meta.is_dir()) {
                ids.push(id.0);
            }
        }

        ids.sort();
        ids
    }

    /// Sizes of the artifacts present in a session directory
    pub async fn summary(&self, id: &SessionId) -> SessionFiles {
        let dir = self.session_dir(id);
        let exists = matches!(fs::metadata(&dir).await, Ok(meta) if meta.is_dir());

        let mut files = BTreeMap::new();
        if exists {
            for artifact in Artifact::ALL {
                if let Ok(meta) = fs::metadata(dir.join(artifact.file_name())).await {
                    if meta.is_file() {
                        files.insert(artifact.file_name().to_string(), meta.len());
                    }
                }
            }
        }

        SessionFiles { exists, files }
    }

    /// Open `results.json` for reading, `None` while it has not been produced
    pub async fn open_results(&self, id: &SessionId) -> io::Result<Option<File>> {
        let path = self.artifact_path(id, Artifact::Results);
        match File::open(&path).await {
            Ok(file) => {
                if file.metadata().await?.is_file() {
                    Ok(Some(file))
                } else {
                    Ok(None)
                }
            }
            // `<root>/<id>` being a plain file just means no results yet
            Err(e) if matches!(e.kind(), io::ErrorKind::NotFound | io::ErrorKind::NotADirectory) => {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Allocate a new session id and an empty staging directory for it
    pub async fn stage(&self) -> io::Result<StagedSession> {
        fs::create_dir_all(&self.root).await?;

        let id = SessionId::generate();
        let staging_dir = self.staging_root().join(id.as_str());
        fs::create_dir_all(&staging_dir).await?;

        tracing::debug!(session_id = %id, "staging new session");

        Ok(StagedSession {
            final_dir: self.session_dir(&id),
            id,
            staging_dir,
            finished: false,
        })
    }

    /// Remove leftovers of uploads interrupted by a crash or restart
    pub async fn sweep_staging(&self) -> io::Result<usize> {
        let mut entries = match fs::read_dir(self.staging_root()).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e),
        };

        let mut removed = 0;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let result = if entry.file_type().await?.is_dir() {
                fs::remove_dir_all(&path).await
            } else {
                fs::remove_file(&path).await
            };
            match result {
                Ok(()) => removed += 1,
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "failed to remove stale staging entry"),
            }
        }
        Ok(removed)
    }
}

/// A session being assembled in the staging area.
///
/// Dropping it without calling [`StagedSession::commit`] removes the staging
/// directory in the background.
#[derive(Debug)]
pub struct StagedSession {
    id: SessionId,
    staging_dir: PathBuf,
    final_dir: PathBuf,
    finished: bool,
}

impl StagedSession {
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Create (or truncate) an artifact file in the staging directory
    pub async fn create_artifact(&self, artifact: Artifact) -> io::Result<ArtifactWriter> {
        let file = File::create(self.staging_dir.join(artifact.file_name())).await?;
        Ok(ArtifactWriter {
            file: BufWriter::new(file),
            written: 0,
        })
    }

    /// Write a complete artifact from memory
    pub async fn write_artifact(&self, artifact: Artifact, data: &[u8]) -> io::Result<u64> {
        let mut writer = self.create_artifact(artifact).await?;
        writer.write_chunk(data).await?;
        writer.finish().await
    }

    /// Move the staged directory to its final location
    pub async fn commit(mut self) -> io::Result<SessionId> {
        if fs::try_exists(&self.final_dir).await? {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("session directory {} already exists", self.final_dir.display()),
            ));
        }
        fs::rename(&self.staging_dir, &self.final_dir).await?;
        self.finished = true;
        tracing::info!(session_id = %self.id, "session committed");
        Ok(self.id.clone())
    }

    /// Remove the staging directory and everything written so far
    pub async fn discard(mut self) {
        self.finished = true;
        if let Err(e) = fs::remove_dir_all(&self.staging_dir).await {
            tracing::warn!(session_id = %self.id, error = %e, "failed to remove staging directory");
        }
    }
}

impl Drop for StagedSession {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let dir = std::mem::take(&mut self.staging_dir);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    let _ = fs::remove_dir_all(&dir).await;
                });
            }
            Err(_) => {
                let _ = std::fs::remove_dir_all(&dir);
            }
        }
    }
}

/// Buffered writer for one staged artifact
#[derive(Debug)]
pub struct ArtifactWriter {
    file: BufWriter<File>,
    written: u64,
}

impl ArtifactWriter {
    pub async fn write_chunk(&mut self, chunk: &[u8]) -> io::Result<()> {
        self.file.write_all(chunk).await?;
        self.written += chunk.len() as u64;
        Ok(())
    }

    /// Flush to disk and return the number of bytes written
    pub async fn finish(mut self) -> io::Result<u64> {
        self.file.flush().await?;
        self.file.get_ref().sync_all().await?;
        Ok(self.written)
    }
}
