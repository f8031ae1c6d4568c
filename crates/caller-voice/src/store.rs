//! Scratch directory for synthesized clips.

use crate::error::VoiceError;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

/// A clip written to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredClip {
    pub file_name: String,
}

/// Holds MP3 clips until Twilio has fetched them.
#[derive(Debug, Clone)]
pub struct AudioStore {
    dir: PathBuf,
}

impl AudioStore {
    /// Opens (creating if needed) the clip directory.
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self, VoiceError> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Writes `audio` under a fresh random name.
    pub async fn save(&self, audio: &[u8]) -> Result<StoredClip, VoiceError> {
        let file_name = format!("{}.mp3", uuid::Uuid::new_v4().simple());
        tokio::fs::write(self.dir.join(&file_name), audio).await?;
        Ok(StoredClip { file_name })
    }

    /// Deletes a clip. Missing files are not an error.
    pub async fn remove(&self, file_name: &str) -> Result<(), VoiceError> {
        let path = self.path_of(file_name)?;
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(VoiceError::Store(e)),
        }
    }

    /// Clips last written at least `age` ago, sorted by name.
    pub async fn clips_older_than(&self, age: Duration) -> Result<Vec<String>, VoiceError> {
        let cutoff = SystemTime::now()
            .checked_sub(age)
            .unwrap_or(SystemTime::UNIX_EPOCH);
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        let mut clips = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let Ok(file_name) = entry.file_name().into_string() else {
                continue;
            };
            if !file_name.ends_with(".mp3") || self.path_of(&file_name).is_err() {
                continue;
            }
            let metadata = entry.metadata().await?;
            if metadata.is_file() && metadata.modified()? <= cutoff {
                clips.push(file_name);
            }
        }
        clips.sort();
        Ok(clips)
    }

    /// Resolves a clip name inside the store, rejecting anything that could
    /// escape the directory.
    pub fn path_of(&self, file_name: &str) -> Result<PathBuf, VoiceError> {
        let valid = !file_name.is_empty()
            && !file_name.starts_with('.')
            && file_name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_');
        if !valid {
            return Err(VoiceError::InvalidClipName(file_name.to_string()));
        }
        Ok(self.dir.join(file_name))
    }
}
