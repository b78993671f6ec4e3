use async_trait::async_trait;
use log::error;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::task::JoinHandle;

use crate::config::OutputMode;
use crate::entry::PackageEntry;

const ENTRY_EXTENSION: &str = "json";

/// Characters that are not safe in a file name on at least one platform, plus `@`.
const FORBIDDEN_FILE_CHARS: [char; 11] = ['/', '\\', '?', '%', '*', ':', '|', '"', '<', '>', '@'];

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("IO error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Serde error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("background writer has stopped")]
    WriterClosed,
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> SinkError + '_ {
    move |source| SinkError::Io {
        path: path.to_owned(),
        source,
    }
}

#[async_trait]
pub trait EntrySink: Send {
    async fn store(&mut self, entry: &PackageEntry) -> Result<(), SinkError>;
}

/// Maps a package id onto a file name. Distinct ids can collide (`@a/b` and `_a_b`);
/// the later write wins.
pub fn sanitize_file_name(id: &str) -> String {
    id.chars()
        .map(|c| {
            if FORBIDDEN_FILE_CHARS.contains(&c) {
                '_'
            } else {
                c
            }
        })
        .collect()
}

/// Appends each entry as one JSON line to a shared file.
pub struct AppendFileSink {
    path: PathBuf,
    file: Option<File>,
}

impl AppendFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        AppendFileSink {
            path: path.into(),
            file: None,
        }
    }

    async fn open(&self) -> Result<File, SinkError> {
        let parent = self.path.parent().filter(|p| !p.as_os_str().is_empty());
        if let Some(parent) = parent {
            fs::create_dir_all(parent).await.map_err(io_error(parent))?;
        }
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(io_error(&self.path))
    }
}

#[async_trait]
impl EntrySink for AppendFileSink {
    async fn store(&mut self, entry: &PackageEntry) -> Result<(), SinkError> {
        let mut line = serde_json::to_vec(entry)?;
        line.push(b'\n');

        let mut file = match self.file.take() {
            Some(file) => file,
            None => self.open().await?,
        };
        let written = match file.write_all(&line).await {
            Ok(()) => file.flush().await,
            Err(e) => Err(e),
        };
        // A handle that failed once is dropped and reopened for the next entry.
        match written {
            Ok(()) => {
                self.file = Some(file);
                Ok(())
            }
            Err(source) => Err(SinkError::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }
}

/// Writes each entry to `<dir>/<sanitized id>.json`, overwriting earlier versions.
pub struct PerEntrySink {
    dir: PathBuf,
    dir_ready: bool,
}

impl PerEntrySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        PerEntrySink {
            dir: dir.into(),
            dir_ready: false,
        }
    }

    pub fn path_for(&self, id: &str) -> PathBuf {
        let file_name = format!("{}.{}", sanitize_file_name(id), ENTRY_EXTENSION);
        self.dir.join(file_name)
    }
}

#[async_trait]
impl EntrySink for PerEntrySink {
    async fn store(&mut self, entry: &PackageEntry) -> Result<(), SinkError> {
        if !self.dir_ready {
            fs::create_dir_all(&self.dir)
                .await
                .map_err(io_error(&self.dir))?;
            self.dir_ready = true;
        }
        let path = self.path_for(&entry.id);
        let bytes = serde_json::to_vec(entry)?;
        fs::write(&path, bytes).await.map_err(io_error(&path))
    }
}

pub fn open_sink(mode: OutputMode, path: impl Into<PathBuf>) -> Box<dyn EntrySink> {
    match mode {
        OutputMode::Append => Box::new(AppendFileSink::new(path)),
        OutputMode::PerEntry => Box::new(PerEntrySink::new(path)),
    }
}

/// Hands entries to a background task that drains them into a sink, so the feed never
/// waits on the disk. Failures are logged by the task and otherwise dropped.
pub struct DetachedWriter {
    tx: UnboundedSender<PackageEntry>,
}

impl DetachedWriter {
    pub fn spawn(mut sink: Box<dyn EntrySink>) -> (DetachedWriter, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<PackageEntry>();
        let handle = tokio::spawn(async move {
            while let Some(entry) = rx.recv().await {
                if let Err(e) = sink.store(&entry).await {
                    error!("Failed to store {}: {}", entry.id, e);
                }
            }
        });
        (DetachedWriter { tx }, handle)
    }

    pub fn submit(&self, entry: PackageEntry) -> Result<(), SinkError> {
        self.tx.send(entry).map_err(|_| SinkError::WriterClosed)
    }
}
