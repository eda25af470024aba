use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("state directory missing or not writable: {0}")]
    StateDir(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("failed to encode {filename}: {message}")]
    Encode { filename: String, message: String },
    #[error("failed to decode {path:?}: {message}")]
    Decode { path: PathBuf, message: String },
}

/// Ensure the state directory exists; create if missing.
pub fn ensure_state_dir(dir: &Path) -> Result<(), PersistError> {
    if dir.exists() {
        let meta = fs::metadata(dir).map_err(|e| PersistError::StateDir(e.to_string()))?;
        if !meta.is_dir() {
            return Err(PersistError::StateDir("path is not a directory".into()));
        }
    } else {
        fs::create_dir_all(dir).map_err(|e| PersistError::StateDir(e.to_string()))?;
    }
    // Basic writability probe: try creating a temp file.
    NamedTempFile::new_in(dir).map_err(|e| PersistError::StateDir(e.to_string()))?;
    Ok(())
}

/// Atomically write content to `{dir}/{filename}` by writing a temp file then renaming.
pub struct AtomicFileWriter {
    dir: PathBuf,
}

impl AtomicFileWriter {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn write(&self, filename: &str, content: &str) -> Result<PathBuf, PersistError> {
        let target = self.dir.join(filename);
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(content.as_bytes())?;
        tmp.flush()?;
        tmp.as_file_mut().sync_all()?;

        // Rename over the previous version; readers see either old or new content.
        tmp.persist(&target).map_err(|e| PersistError::Io(e.error))?;
        Ok(target)
    }
}

/// Directory of RON-encoded state files.
pub struct StateDir {
    dir: PathBuf,
    writer: AtomicFileWriter,
}

impl StateDir {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, PersistError> {
        let dir = dir.into();
        ensure_state_dir(&dir)?;
        Ok(Self {
            writer: AtomicFileWriter::new(dir.clone()),
            dir,
        })
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Read `filename`; `Ok(None)` when it does not exist yet.
    pub fn load<T: DeserializeOwned>(&self, filename: &str) -> Result<Option<T>, PersistError> {
        let path = self.dir.join(filename);
        let content = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        ron::from_str(&content)
            .map(Some)
            .map_err(|err| PersistError::Decode {
                path,
                message: err.to_string(),
            })
    }

    /// Read `filename`, writing `default` first if it does not exist yet.
    pub fn load_or_init<T: DeserializeOwned + Serialize>(
        &self,
        filename: &str,
        default: impl FnOnce() -> T,
    ) -> Result<T, PersistError> {
        match self.load(filename)? {
            Some(value) => Ok(value),
            None => {
                let value = default();
                self.save(filename, &value)?;
                Ok(value)
            }
        }
    }

    pub fn save<T: Serialize>(&self, filename: &str, value: &T) -> Result<PathBuf, PersistError> {
        let pretty = ron::ser::PrettyConfig::new();
        let content =
            ron::ser::to_string_pretty(value, pretty).map_err(|err| PersistError::Encode {
                filename: filename.to_string(),
                message: err.to_string(),
            })?;
        self.writer.write(filename, &content)
    }
}
