//! Transcript Sink — the flat append-only filesystem layout named in
//! `spec.md` §6 ("Transcript layout on disk").

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use mnemo_core::Transcript;

#[async_trait]
pub trait TranscriptSink: Send + Sync {
    async fn write(&self, transcript: &Transcript) -> std::io::Result<PathBuf>;
}

/// Writes one JSON file per closed session:
/// `<session_id_prefix8>_<YYYYMMDD_HHMMSS>.json`.
pub struct FsTranscriptSink {
    dir: PathBuf,
}

impl FsTranscriptSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn file_name(transcript: &Transcript) -> String {
        let prefix: String = transcript
            .session_id
            .as_str()
            .chars()
            .take(8)
            .collect();
        let stamp = transcript.end_time.format("%Y%m%d_%H%M%S");
        format!("{prefix}_{stamp}.json")
    }
}

#[async_trait]
impl TranscriptSink for FsTranscriptSink {
    async fn write(&self, transcript: &Transcript) -> std::io::Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(Self::file_name(transcript));
        let body = serde_json::to_vec_pretty(transcript)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        tokio::fs::write(&path, body).await?;
        Ok(path)
    }
}

/// Test / embedded double that keeps transcripts in memory instead of on disk.
pub struct InMemoryTranscriptSink {
    written: tokio::sync::Mutex<Vec<Transcript>>,
}

impl InMemoryTranscriptSink {
    pub fn new() -> Self {
        Self {
            written: tokio::sync::Mutex::new(Vec::new()),
        }
    }

    pub async fn written(&self) -> Vec<Transcript> {
        self.written.lock().await.clone()
    }
}

impl Default for InMemoryTranscriptSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TranscriptSink for InMemoryTranscriptSink {
    async fn write(&self, transcript: &Transcript) -> std::io::Result<PathBuf> {
        self.written.lock().await.push(transcript.clone());
        Ok(Path::new("memory").join(FsTranscriptSink::file_name(transcript)))
    }
}
