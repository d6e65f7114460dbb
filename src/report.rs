use crate::context::RunContext;
use crate::snapshot::{format_timestamp, Snapshot};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use thiserror::Error;
use tracing::{debug, info};

const MAX_STEM_ATTEMPTS: u32 = 1000;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("failed to create output directory {path}: {source}")]
    CreateDir { path: String, source: io::Error },
    #[error("failed to open {path}: {source}")]
    Open { path: String, source: io::Error },
    #[error("failed to write {path}: {source}")]
    Write { path: String, source: io::Error },
    #[error("failed to serialize snapshot: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Destination for the human-readable run log.
pub trait TranscriptSink: Send {
    fn append_text(&mut self, line: &str) -> Result<(), PersistenceError>;
}

/// Owns the two artifacts of one run: `<stem>.log`, appended while the run
/// progresses, and `<stem>.json`, written once at the end.
pub struct ReportWriter {
    dir: PathBuf,
    stem: String,
    transcript: BufWriter<File>,
}

impl ReportWriter {
    /// Creates the output directory and claims a stem no earlier run used.
    pub fn open(ctx: &RunContext) -> Result<Self, PersistenceError> {
        let dir = ctx.output_dir.clone();
        fs::create_dir_all(&dir).map_err(|source| PersistenceError::CreateDir {
            path: dir.display().to_string(),
            source,
        })?;

        let base = ctx.report_stem();
        for attempt in 0..MAX_STEM_ATTEMPTS {
            let stem = if attempt == 0 {
                base.clone()
            } else {
                format!("{base}-{attempt}")
            };
            if dir.join(format!("{stem}.json")).exists() {
                continue;
            }
            let log_path = dir.join(format!("{stem}.log"));
            match OpenOptions::new()
                .append(true)
                .create_new(true)
                .open(&log_path)
            {
                Ok(file) => {
                    info!(path = %log_path.display(), "transcript opened");
                    return Ok(Self {
                        dir,
                        stem,
                        transcript: BufWriter::new(file),
                    });
                }
                Err(err) if err.kind() == ErrorKind::AlreadyExists => continue,
                Err(source) => {
                    return Err(PersistenceError::Open {
                        path: log_path.display().to_string(),
                        source,
                    })
                }
            }
        }

        Err(PersistenceError::Open {
            path: dir.join(format!("{base}.log")).display().to_string(),
            source: io::Error::new(
                ErrorKind::AlreadyExists,
                "no free report name left for this timestamp",
            ),
        })
    }

    pub fn stem(&self) -> &str {
        &self.stem
    }

    pub fn transcript_path(&self) -> PathBuf {
        self.dir.join(format!("{}.log", self.stem))
    }

    pub fn report_path(&self) -> PathBuf {
        self.dir.join(format!("{}.json", self.stem))
    }

    /// Writes the snapshot as pretty JSON. Never overwrites an existing file.
    pub fn write_structured(&mut self, snapshot: &Snapshot) -> Result<PathBuf, PersistenceError> {
        let path = self.report_path();
        let body = serde_json::to_vec_pretty(snapshot)?;

        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|source| PersistenceError::Open {
                path: path.display().to_string(),
                source,
            })?;
        write_all_synced(&mut file, &body, &path)?;
        debug!(path = %path.display(), bytes = body.len(), "structured report written");
        Ok(path)
    }

    /// Writes the report and seals the transcript. On failure the transcript
    /// gets a final `ERROR` line and is still flushed to disk.
    pub fn finish(mut self, snapshot: &Snapshot) -> Result<PathBuf, PersistenceError> {
        let written = self.write_structured(snapshot).and_then(|path| {
            self.append_text(&format!("report written to {}", path.display()))?;
            Ok(path)
        });
        match written {
            Ok(path) => {
                self.close()?;
                Ok(path)
            }
            Err(err) => {
                let _ = self.append_text(&format!("ERROR {err}"));
                let _ = self.close();
                Err(err)
            }
        }
    }

    pub fn close(mut self) -> Result<(), PersistenceError> {
        let path = self.transcript_path();
        let wrap = |source| PersistenceError::Write {
            path: path.display().to_string(),
            source,
        };
        self.transcript.flush().map_err(wrap)?;
        self.transcript.get_ref().sync_all().map_err(wrap)
    }
}

impl TranscriptSink for ReportWriter {
    fn append_text(&mut self, line: &str) -> Result<(), PersistenceError> {
        let stamped = format!("{} {}\n", format_timestamp(SystemTime::now()), line);
        self.transcript
            .write_all(stamped.as_bytes())
            .and_then(|()| self.transcript.flush())
            .map_err(|source| PersistenceError::Write {
                path: self.transcript_path().display().to_string(),
                source,
            })
    }
}

impl Drop for ReportWriter {
    fn drop(&mut self) {
        let _ = self.transcript.flush();
    }
}

fn write_all_synced(file: &mut File, body: &[u8], path: &Path) -> Result<(), PersistenceError> {
    file.write_all(body)
        .and_then(|()| file.sync_all())
        .map_err(|source| PersistenceError::Write {
            path: path.display().to_string(),
            source,
        })
}

#[cfg(test)]
impl TranscriptSink for Vec<String> {
    fn append_text(&mut self, line: &str) -> Result<(), PersistenceError> {
        self.push(line.to_string());
        Ok(())
    }
}
