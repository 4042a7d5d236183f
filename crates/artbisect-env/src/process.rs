use std::collections::BTreeMap;
use std::io::Read;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};

use crate::log::SessionLog;

/// Record of one completed (or killed) command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExecutionOutput {
    pub stdout: String,
    pub stderr: String,
    /// Exit code of the process; a timed-out probe reports a synthetic 1.
    pub exit_status: i32,
}

/// Runs `argv` to completion or timeout and appends the full transcript to
/// the session log.
///
/// When `env_overlay` is given the child sees exactly that map and nothing
/// else; the tool's own process environment is never mutated. On timeout the
/// child is killed and the result carries a synthetic non-zero exit status.
/// `Err` means the command could not be spawned or its pipes failed, which
/// callers treat as fatal.
pub(crate) fn run_logged(
    argv: &[String],
    env_overlay: Option<&BTreeMap<String, String>>,
    log: &mut SessionLog,
    timeout: Duration,
) -> Result<ExecutionOutput> {
    let (program, args) = argv
        .split_first()
        .context("empty command passed to run_command")?;

    let mut cmd = Command::new(program);
    cmd.args(args);
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());
    if let Some(overlay) = env_overlay {
        cmd.env_clear();
        cmd.envs(overlay);
    }

    let mut child = cmd
        .spawn()
        .with_context(|| format!("spawn command: {program}"))?;

    let stdout = child.stdout.take().context("take stdout")?;
    let stderr = child.stderr.take().context("take stderr")?;
    let stdout_thread = std::thread::spawn(move || -> std::io::Result<Vec<u8>> {
        read_to_end(stdout)
    });
    let stderr_thread = std::thread::spawn(move || -> std::io::Result<Vec<u8>> {
        read_to_end(stderr)
    });

    let (status, timed_out) = wait_with_wall_timeout(&mut child, timeout)?;
    let stdout_bytes = stdout_thread
        .join()
        .unwrap_or_else(|_| Ok(Vec::new()))
        .context("read child stdout")?;
    let stderr_bytes = stderr_thread
        .join()
        .unwrap_or_else(|_| Ok(Vec::new()))
        .context("read child stderr")?;

    let exit_status = if timed_out {
        1
    } else {
        status.code().unwrap_or(1)
    };
    let out = ExecutionOutput {
        stdout: String::from_utf8_lossy(&stdout_bytes).into_owned(),
        stderr: String::from_utf8_lossy(&stderr_bytes).into_owned(),
        exit_status,
    };

    let status_text = if timed_out {
        "TIMEOUT".to_string()
    } else {
        exit_status.to_string()
    };
    log.append(&format!(
        "Command:\n{}\nReturn code: {}\n{}{}\n",
        argv.join(" "),
        status_text,
        out.stderr,
        out.stdout
    ))?;

    Ok(out)
}

fn wait_with_wall_timeout(
    child: &mut std::process::Child,
    timeout: Duration,
) -> Result<(std::process::ExitStatus, bool)> {
    let start = Instant::now();
    let deadline = start.checked_add(timeout);

    loop {
        if let Some(status) = child.try_wait().context("try_wait child")? {
            return Ok((status, false));
        }
        if deadline.is_some_and(|d| Instant::now() >= d) {
            let _ = child.kill();
            let status = child.wait().context("wait child after kill")?;
            return Ok((status, true));
        }
        std::thread::sleep(Duration::from_millis(5));
    }
}

fn read_to_end<R: Read>(mut reader: R) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    reader.read_to_end(&mut buf)?;
    Ok(buf)
}
