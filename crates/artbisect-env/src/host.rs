use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};

use crate::log::SessionLog;
use crate::process::{run_logged, ExecutionOutput};
use crate::{EnvConfig, TestEnv, DALVIK_CACHE_ARCHS};

/// Host execution environment.
///
/// Maintains a scratch directory under the system temp dir and runs commands
/// as direct child processes with an explicit environment map pointing the
/// runtime's data, root, and library paths at that scratch area.
pub struct HostTestEnv {
    classpath: String,
    env_path: PathBuf,
    shell_env: BTreeMap<String, String>,
    log: SessionLog,
    timeout: Duration,
}

impl HostTestEnv {
    pub fn new(config: &EnvConfig) -> Result<Self> {
        let android_root = config
            .android_root
            .as_deref()
            .context("host environment requires ANDROID_HOST_OUT")?;

        let env_path = crate::create_scratch_dir()?;
        let log = SessionLog::create(&env_path)?;
        let cache_root = env_path.join("dalvik-cache");
        fs::create_dir(&cache_root)
            .with_context(|| format!("create {}", cache_root.display()))?;
        for arch in DALVIK_CACHE_ARCHS {
            let arch_dir = cache_root.join(arch);
            fs::create_dir(&arch_dir)
                .with_context(|| format!("create {}", arch_dir.display()))?;
        }

        // Snapshot of the inherited environment with the runtime overrides
        // applied. Passed to every spawn; the tool's own environment is never
        // touched.
        let lib = if config.x64 { "lib64" } else { "lib" };
        let mut shell_env: BTreeMap<String, String> = std::env::vars().collect();
        shell_env.insert(
            "ANDROID_DATA".to_string(),
            env_path.display().to_string(),
        );
        shell_env.insert(
            "ANDROID_ROOT".to_string(),
            android_root.display().to_string(),
        );
        shell_env.insert(
            "LD_LIBRARY_PATH".to_string(),
            android_root.join(lib).display().to_string(),
        );
        let bin = android_root.join("bin").display().to_string();
        let path = match shell_env.get("PATH") {
            Some(existing) => format!("{bin}:{existing}"),
            None => bin,
        };
        shell_env.insert("PATH".to_string(), path);
        // dlopen requires load bias on the host.
        shell_env.insert("LD_USE_LOAD_BIAS".to_string(), "1".to_string());

        Ok(Self {
            classpath: config.classpath.clone(),
            env_path,
            shell_env,
            log,
            timeout: config.timeout,
        })
    }

    /// Removes every file from the architecture-specific cache directories so
    /// the next probe starts from a cold compilation cache.
    fn empty_dex_cache(&self) -> Result<()> {
        for arch in DALVIK_CACHE_ARCHS {
            let arch_dir = self.env_path.join("dalvik-cache").join(arch);
            let entries = fs::read_dir(&arch_dir)
                .with_context(|| format!("list {}", arch_dir.display()))?;
            for entry in entries {
                let path = entry
                    .with_context(|| format!("list {}", arch_dir.display()))?
                    .path();
                if path.is_file() {
                    fs::remove_file(&path)
                        .with_context(|| format!("remove {}", path.display()))?;
                }
            }
        }
        Ok(())
    }
}

impl TestEnv for HostTestEnv {
    fn create_file(&mut self, name: Option<&str>) -> Result<String> {
        let name = match name {
            Some(name) => name.to_string(),
            None => crate::unique_file_name(),
        };
        let path = self.env_path.join(&name);
        fs::File::create(&path).with_context(|| format!("create {}", path.display()))?;
        Ok(path.display().to_string())
    }

    fn write_lines(&mut self, path: &str, lines: &[String]) -> Result<()> {
        let mut text = String::new();
        for line in lines {
            text.push_str(line);
            text.push('\n');
        }
        fs::write(path, text).with_context(|| format!("write {path}"))
    }

    fn run_command(&mut self, cmd: &[String]) -> Result<ExecutionOutput> {
        self.empty_dex_cache()?;
        run_logged(cmd, Some(&self.shell_env), &mut self.log, self.timeout)
    }

    fn log_note(&mut self, note: &str) -> Result<()> {
        self.log.append(note)
    }

    fn classpath(&self) -> &str {
        &self.classpath
    }

    fn logfile_path(&self) -> &Path {
        self.log.path()
    }
}
