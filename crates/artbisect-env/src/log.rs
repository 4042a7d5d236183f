use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Append-only session log, created at environment construction and kept
/// open for the rest of the process. Single writer, no contention.
pub struct SessionLog {
    path: PathBuf,
    file: File,
}

impl SessionLog {
    pub(crate) fn create(scratch_dir: &Path) -> Result<Self> {
        let path = scratch_dir.join("log");
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("create session log: {}", path.display()))?;
        Ok(Self { path, file })
    }

    pub fn append(&mut self, text: &str) -> Result<()> {
        self.file
            .write_all(text.as_bytes())
            .with_context(|| format!("write session log: {}", self.path.display()))?;
        self.file.flush().ok();
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
