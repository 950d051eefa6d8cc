//! Transport seam: where raw message lines enter the engine
//!
//! The broker itself is an external collaborator; the engine only needs
//! "next message, end-of-stream, or error". `ChannelTransport` embeds the
//! engine behind any producer task, `FileTailTransport` follows a growing
//! JSONL/CSV file for local runs.

use async_trait::async_trait;
use std::io::SeekFrom;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncSeekExt, BufReader};
use tokio::sync::mpsc;
use tokio::time::sleep;

#[cfg(unix)]
use std::os::unix::fs::MetadataExt;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Source of raw message lines. `Ok(None)` signals end of stream; the
/// aggregator treats any error the same way and begins draining. Retry and
/// backoff live behind this trait, never inside the engine.
#[async_trait]
pub trait Transport: Send {
    async fn next_message(&mut self) -> Result<Option<String>, TransportError>;
}

/// In-process transport over a tokio mpsc channel. Used by tests and by
/// embedders that already have their own broker consumer task.
pub struct ChannelTransport {
    rx: mpsc::Receiver<String>,
}

impl ChannelTransport {
    pub fn new(rx: mpsc::Receiver<String>) -> Self {
        Self { rx }
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn next_message(&mut self) -> Result<Option<String>, TransportError> {
        // None when every sender is dropped: clean end of stream
        Ok(self.rx.recv().await)
    }
}

/// Tails a line-oriented stream file, detecting rotation by inode change.
pub struct FileTailTransport {
    path: PathBuf,
    file: Option<BufReader<File>>,
    inode: Option<u64>,
    poll_interval: Duration,
    from_start: bool,
}

impl FileTailTransport {
    /// Follow new lines only (seeks to the current end of file).
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            file: None,
            inode: None,
            poll_interval: Duration::from_millis(100),
            from_start: false,
        }
    }

    /// Replay the file's existing content before following new lines.
    pub fn from_start(path: PathBuf) -> Self {
        Self {
            from_start: true,
            ..Self::new(path)
        }
    }

    async fn open(&mut self) -> std::io::Result<()> {
        let file = File::open(&self.path).await?;

        #[cfg(unix)]
        {
            self.inode = Some(file.metadata().await?.ino());
        }

        let mut reader = BufReader::new(file);
        if !self.from_start {
            reader.seek(SeekFrom::End(0)).await?;
        }
        self.file = Some(reader);

        log::info!("Tailing stream file: {}", self.path.display());
        Ok(())
    }

    async fn detect_rotation(&self) -> std::io::Result<bool> {
        #[cfg(unix)]
        {
            let metadata = tokio::fs::metadata(&self.path).await?;
            Ok(self.inode.map_or(false, |old| old != metadata.ino()))
        }

        #[cfg(not(unix))]
        {
            // Size shrinking below our read position is the best heuristic
            // without inodes
            if let Some(ref file) = self.file {
                let current_pos = file.get_ref().stream_position().await?;
                let metadata = tokio::fs::metadata(&self.path).await?;
                Ok(metadata.len() < current_pos)
            } else {
                Ok(false)
            }
        }
    }
}

#[async_trait]
impl Transport for FileTailTransport {
    async fn next_message(&mut self) -> Result<Option<String>, TransportError> {
        if self.file.is_none() {
            self.open().await?;
        }

        loop {
            if self.detect_rotation().await? {
                log::info!("Stream file rotated, reopening: {}", self.path.display());
                // After rotation, always pick up the new file from its start
                self.from_start = true;
                self.open().await?;
            }

            let reader = self
                .file
                .as_mut()
                .expect("file opened at entry to next_message");
            let mut line = String::new();
            match reader.read_line(&mut line).await? {
                0 => {
                    // At EOF: wait for the producer to append more
                    sleep(self.poll_interval).await;
                }
                _ => {
                    let trimmed = line.trim();
                    if !trimmed.is_empty() {
                        return Ok(Some(trimmed.to_string()));
                    }
                }
            }
        }
    }
}
