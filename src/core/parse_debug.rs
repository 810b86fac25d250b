use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

use crate::error::Result;

/// Every intermediate form of a response that could not be parsed.
#[derive(Debug, Clone, Copy)]
pub struct ParseFailure<'a> {
    pub raw: &'a str,
    pub cleaned: &'a str,
    pub extracted: Option<&'a str>,
    pub repaired: Option<&'a str>,
    pub error: &'a str,
}

/// Out-of-band destination for full parse-failure payloads.
pub trait ParseDebugSink: Send + Sync + fmt::Debug {
    fn record(&self, failure: &ParseFailure<'_>);
}

/// Emits the variants as a debug event on `planner::parser`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingDebugSink;

impl ParseDebugSink for TracingDebugSink {
    fn record(&self, failure: &ParseFailure<'_>) {
        debug!(
            target: "planner::parser",
            error = failure.error,
            raw = failure.raw,
            cleaned = failure.cleaned,
            extracted = failure.extracted.unwrap_or_default(),
            repaired = failure.repaired.unwrap_or_default(),
            "parse failure variants"
        );
    }
}

/// Writes one file per variant into a directory.
#[derive(Debug)]
pub struct FileDebugSink {
    dir: PathBuf,
    counter: AtomicU64,
}

impl FileDebugSink {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            counter: AtomicU64::new(0),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn write(&self, name: &str, content: &str) {
        let path = self.dir.join(name);
        if let Err(err) = std::fs::write(&path, content) {
            warn!(
                target: "planner::parser",
                path = %path.display(),
                error = %err,
                "could not write parse debug file"
            );
        }
    }
}

impl ParseDebugSink for FileDebugSink {
    fn record(&self, failure: &ParseFailure<'_>) {
        let stamp = chrono::Utc::now().format("%Y%m%dT%H%M%S%.3f");
        let seq = self.counter.fetch_add(1, Ordering::Relaxed);
        let prefix = format!("parse_failure_{stamp}_{seq}");

        let variants = [
            ("raw", Some(failure.raw)),
            ("cleaned", Some(failure.cleaned)),
            ("extracted", failure.extracted),
            ("repaired", failure.repaired),
            ("error", Some(failure.error)),
        ];
        for (name, content) in variants {
            if let Some(content) = content {
                self.write(&format!("{prefix}_{name}.txt"), content);
            }
        }
    }
}
