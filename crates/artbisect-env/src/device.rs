use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};

use crate::log::SessionLog;
use crate::process::{run_logged, ExecutionOutput};
use crate::{EnvConfig, TestEnv, DALVIK_CACHE_ARCHS, DEVICE_TMP_PATH};

/// Device execution environment.
///
/// Keeps a host-side scratch directory for staging and the session log, and
/// mirrors every file onto a matching directory on the device over `adb
/// push`. Commands run inside an `adb shell` wrapper that clears the logcat
/// ring buffer first and dumps the compiler's diagnostics to stderr
/// afterwards, so the scrape patterns see the same stream as on the host.
///
/// Any adb failure is fatal for the session; there is no retry.
pub struct DeviceTestEnv {
    classpath: String,
    host_env_path: PathBuf,
    device_env_path: String,
    log: SessionLog,
    timeout: Duration,
}

impl DeviceTestEnv {
    pub fn new(config: &EnvConfig) -> Result<Self> {
        let host_env_path = crate::create_scratch_dir()?;
        let log = SessionLog::create(&host_env_path)?;
        let dir_name = host_env_path
            .file_name()
            .context("scratch dir has no name")?
            .to_string_lossy()
            .into_owned();
        let device_env_path = format!("{DEVICE_TMP_PATH}/{dir_name}");

        let classpath_name = Path::new(&config.classpath)
            .file_name()
            .with_context(|| format!("classpath has no file name: {}", config.classpath))?
            .to_string_lossy()
            .into_owned();
        let classpath = format!("{device_env_path}/{classpath_name}");

        let mut env = Self {
            classpath,
            host_env_path,
            device_env_path,
            log,
            timeout: config.timeout,
        };
        env.adb_mkdir(&format!("{}/dalvik-cache", env.device_env_path))?;
        for arch in DALVIK_CACHE_ARCHS {
            env.adb_mkdir(&format!("{}/dalvik-cache/{arch}", env.device_env_path))?;
        }
        let device_env_path = env.device_env_path.clone();
        env.adb_push(&config.classpath, &device_env_path)?;
        Ok(env)
    }

    fn adb_push(&mut self, what: &str, where_to: &str) -> Result<()> {
        self.check_call(&[
            "adb".to_string(),
            "push".to_string(),
            what.to_string(),
            where_to.to_string(),
        ])
    }

    fn adb_mkdir(&mut self, path: &str) -> Result<()> {
        self.check_call(&[
            "adb".to_string(),
            "shell".to_string(),
            format!("mkdir \"{path}\" -p"),
        ])
    }

    /// Runs a transport command, logging its output, and fails the session on
    /// a non-zero exit.
    fn check_call(&mut self, argv: &[String]) -> Result<()> {
        let out = run_logged(argv, None, &mut self.log, self.timeout)?;
        if out.exit_status != 0 {
            anyhow::bail!(
                "transport command failed ({}): {}",
                out.exit_status,
                argv.join(" ")
            );
        }
        Ok(())
    }

    fn empty_dex_cache(&mut self) -> Result<()> {
        for arch in DALVIK_CACHE_ARCHS {
            let cache_dir = format!("{}/dalvik-cache/{arch}", self.device_env_path);
            self.check_call(&[
                "adb".to_string(),
                "shell".to_string(),
                format!("if [ `ls \"{cache_dir}\"` ]; then rm \"{cache_dir}\"/*; fi"),
            ])?;
        }
        Ok(())
    }
}

/// Builds the `adb shell` wrapper for one probe: clear the diagnostic ring
/// buffer, run the command with ANDROID_DATA pointed at the device scratch
/// dir, then dump dex2oat diagnostics to stderr.
pub fn device_shell_command(device_env_path: &str, cmd: &[String]) -> Vec<String> {
    let quoted = cmd
        .iter()
        .map(|segment| format!("\"{segment}\""))
        .collect::<Vec<_>>()
        .join(" ");
    vec![
        "adb".to_string(),
        "shell".to_string(),
        format!(
            "logcat -c && ANDROID_DATA={device_env_path} {quoted} && \
             logcat -d dex2oat:* *:S 1>&2"
        ),
    ]
}

impl TestEnv for DeviceTestEnv {
    fn create_file(&mut self, name: Option<&str>) -> Result<String> {
        let name = match name {
            Some(name) => name.to_string(),
            None => crate::unique_file_name(),
        };
        let staging = self.host_env_path.join(&name);
        fs::File::create(&staging)
            .with_context(|| format!("create {}", staging.display()))?;
        let device_path = format!("{}/{name}", self.device_env_path);
        let staging = staging.display().to_string();
        self.adb_push(&staging, &device_path)?;
        Ok(device_path)
    }

    fn write_lines(&mut self, path: &str, lines: &[String]) -> Result<()> {
        let name = Path::new(path)
            .file_name()
            .with_context(|| format!("device path has no file name: {path}"))?
            .to_string_lossy()
            .into_owned();
        let staging = self.host_env_path.join(name);
        let mut text = String::new();
        for line in lines {
            text.push_str(line);
            text.push('\n');
        }
        fs::write(&staging, text)
            .with_context(|| format!("write {}", staging.display()))?;
        let staging = staging.display().to_string();
        self.adb_push(&staging, path)
    }

    fn run_command(&mut self, cmd: &[String]) -> Result<ExecutionOutput> {
        self.empty_dex_cache()?;
        let wrapped = device_shell_command(&self.device_env_path, cmd);
        run_logged(&wrapped, None, &mut self.log, self.timeout)
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

#[cfg(test)]
mod tests {
    use super::device_shell_command;

    #[test]
    fn shell_wrapper_clears_and_dumps_diagnostics() {
        let cmd = vec!["dalvikvm32".to_string(), "Main".to_string()];
        let wrapped = device_shell_command("/data/local/tmp/artbisect_1_0", &cmd);
        assert_eq!(wrapped[0], "adb");
        assert_eq!(wrapped[1], "shell");
        let remote = &wrapped[2];
        assert!(remote.starts_with("logcat -c && "));
        assert!(remote.contains("ANDROID_DATA=/data/local/tmp/artbisect_1_0"));
        assert!(remote.contains("\"dalvikvm32\" \"Main\""));
        assert!(remote.ends_with("logcat -d dex2oat:* *:S 1>&2"));
    }
}
