use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use lru::LruCache;
use tempfile::TempDir;
use tracing::{debug, warn};

use super::AudioArtifact;
use crate::config::AudioConfig;
use crate::error::{Result, SignboardError};

enum StoreDir {
    Temp(TempDir),
    Fixed(PathBuf),
}

impl StoreDir {
    fn path(&self) -> &Path {
        match self {
            StoreDir::Temp(dir) => dir.path(),
            StoreDir::Fixed(path) => path,
        }
    }
}

struct StoredAudio {
    path: PathBuf,
    mime_type: String,
    extension: &'static str,
}

struct Inner {
    entries: LruCache<String, StoredAudio>,
    latest: Option<String>,
}

/// Audio handed back by [`AudioStore::take`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedAudio {
    pub id: String,
    pub bytes: Vec<u8>,
    pub mime_type: String,
    /// Suggested download name, e.g. `translation_output.mp3`.
    pub file_name: String,
}

/// Generated audio files keyed by per-request id.
///
/// Bounded LRU: evicting an entry deletes its file. Without `AUDIO_DIR` the
/// files live in a temporary directory removed when the store is dropped.
#[derive(Clone)]
pub struct AudioStore {
    dir: Arc<StoreDir>,
    inner: Arc<Mutex<Inner>>,
    delete_after_fetch: bool,
}

fn remove_audio_file(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), "Failed to remove audio file: {}", e);
        }
    }
}

impl AudioStore {
    pub fn new(config: &AudioConfig) -> Result<Self> {
        let dir = match &config.dir {
            Some(dir) => {
                std::fs::create_dir_all(dir)?;
                StoreDir::Fixed(PathBuf::from(dir))
            }
            None => StoreDir::Temp(tempfile::Builder::new().prefix("signboard-audio").tempdir()?),
        };

        let capacity = NonZeroUsize::new(config.capacity).unwrap_or(NonZeroUsize::MIN);

        Ok(Self {
            dir: Arc::new(dir),
            inner: Arc::new(Mutex::new(Inner {
                entries: LruCache::new(capacity),
                latest: None,
            })),
            delete_after_fetch: config.delete_after_fetch,
        })
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| SignboardError::Internal("Audio store lock poisoned".to_string()))
    }

    /// Write the artifact to disk and return its new id.
    pub fn put(&self, artifact: &AudioArtifact) -> Result<String> {
        let id = nanoid::nanoid!();
        let extension = artifact.extension();
        let path = self.dir.path().join(format!("{id}.{extension}"));
        std::fs::write(&path, &artifact.bytes)?;

        let evicted = {
            let mut inner = self.lock()?;
            inner.latest = Some(id.clone());
            inner.entries.push(
                id.clone(),
                StoredAudio {
                    path,
                    mime_type: artifact.mime_type.clone(),
                    extension,
                },
            )
        };

        if let Some((evicted_id, stored)) = evicted {
            debug!(id = %evicted_id, "Evicting stored audio");
            remove_audio_file(&stored.path);
        }

        debug!(id = %id, bytes = artifact.bytes.len(), "Stored audio");
        Ok(id)
    }

    /// Fetch audio by id. Returns `Ok(None)` for unknown ids.
    pub fn take(&self, id: &str) -> Result<Option<FetchedAudio>> {
        let (path, mime_type, extension) = {
            let mut inner = self.lock()?;
            let stored = if self.delete_after_fetch {
                let stored = inner.entries.pop(id);
                if stored.is_some() && inner.latest.as_deref() == Some(id) {
                    inner.latest = None;
                }
                stored
            } else {
                inner.entries.get(id).map(|s| StoredAudio {
                    path: s.path.clone(),
                    mime_type: s.mime_type.clone(),
                    extension: s.extension,
                })
            };

            match stored {
                Some(s) => (s.path, s.mime_type, s.extension),
                None => return Ok(None),
            }
        };

        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        if self.delete_after_fetch {
            remove_audio_file(&path);
        }

        Ok(Some(FetchedAudio {
            id: id.to_string(),
            bytes,
            mime_type,
            file_name: format!("translation_output.{extension}"),
        }))
    }

    /// Fetch the most recently stored audio.
    pub fn take_latest(&self) -> Result<Option<FetchedAudio>> {
        let latest = self.lock()?.latest.clone();
        match latest {
            Some(id) => self.take(&id),
            None => Ok(None),
        }
    }

    pub fn len(&self) -> usize {
        self.lock().map(|inner| inner.entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
