//! Execution environments for bisection probes.
//!
//! A probe is one run of the program under test. Probes must be reproducible,
//! so every environment owns a private scratch directory, pre-creates the
//! dalvik-cache layout inside it, and scrubs that cache immediately before
//! each command so the compiler is forced to recompile on every run.
//!
//! The scratch directory is deliberately never deleted: it holds the session
//! log and the last method/pass selection files for post-mortem inspection.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use anyhow::{Context, Result};

mod device;
mod host;
mod log;
mod process;

pub use device::{device_shell_command, DeviceTestEnv};
pub use host::HostTestEnv;
pub use log::SessionLog;
pub use process::ExecutionOutput;

/// Temporary directory path on the device side.
pub const DEVICE_TMP_PATH: &str = "/data/local/tmp";

/// Architectures with their own dalvik-cache subdirectory.
pub const DALVIK_CACHE_ARCHS: [&str; 4] = ["arm", "arm64", "x86", "x86_64"];

/// Wall-clock limit applied to every spawned command.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Immutable environment configuration, resolved once at startup.
#[derive(Clone, Debug)]
pub struct EnvConfig {
    /// Classpath with the test class, as given on the command line.
    pub classpath: String,
    /// Whether to set up in 64-bit mode.
    pub x64: bool,
    /// Host build tree (`ANDROID_HOST_OUT`). Required by the host variant.
    pub android_root: Option<PathBuf>,
    /// Wall-clock timeout for each probe.
    pub timeout: Duration,
}

/// Capability set shared by the host and device environments.
///
/// `run_command` returns `Err` only on transport or spawn failures, which are
/// fatal for the whole session. A probe that exits non-zero or times out is a
/// normal [`ExecutionOutput`], not an error.
pub trait TestEnv {
    /// Creates a file in the scratch area and returns an environment-relative
    /// path usable inside commands run in this environment. An arbitrary
    /// unique name is chosen when `name` is `None`.
    fn create_file(&mut self, name: Option<&str>) -> Result<String>;

    /// Overwrites (or creates) `path` with the given lines, one per line,
    /// each followed by a newline.
    fn write_lines(&mut self, path: &str, lines: &[String]) -> Result<()>;

    /// Scrubs the compiled-code cache, then runs `cmd` to completion or
    /// timeout, logging the full command and captured output.
    fn run_command(&mut self, cmd: &[String]) -> Result<ExecutionOutput>;

    /// Appends a free-form note to the session log.
    fn log_note(&mut self, note: &str) -> Result<()>;

    /// Classpath with the test class, scoped to this environment.
    fn classpath(&self) -> &str;

    /// Host-side path of the session log.
    fn logfile_path(&self) -> &Path;
}

/// Allocates a fresh scratch directory under the system temp dir.
///
/// The directory is left behind on exit so the log and selection files
/// survive for inspection.
pub(crate) fn create_scratch_dir() -> Result<PathBuf> {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let base = std::env::temp_dir();
    let pid = std::process::id();

    for _ in 0..10_000 {
        let n = COUNTER.fetch_add(1, Ordering::Relaxed);
        let path = base.join(format!("artbisect_{pid}_{n}"));
        match std::fs::create_dir(&path) {
            Ok(()) => return Ok(path),
            Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => continue,
            Err(err) => {
                return Err(err).with_context(|| format!("create scratch dir: {}", path.display()))
            }
        }
    }
    anyhow::bail!("failed to create unique scratch dir under {}", base.display())
}

pub(crate) fn unique_file_name() -> String {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("scratch_{n}")
}
