use std::path::Path;

use anyhow::{Context, Result};

use artbisect_search::search::Outcome;

pub const REPORT_SCHEMA_VERSION: &str = "artbisect.report@0.1.0";

/// Writes the machine-readable session report next to the log.
pub fn write_report(scratch_dir: &Path, outcome: &Outcome, logfile: &Path) -> Result<()> {
    let (kind, method, pass) = match outcome {
        Outcome::NoBug => ("no-bug", None, None),
        Outcome::MethodOnly(method) => ("method-only", Some(method.as_str()), None),
        Outcome::MethodAndPass(method, pass) => {
            ("method-and-pass", Some(method.as_str()), Some(pass.as_str()))
        }
    };
    let json = serde_json::json!({
        "schema_version": REPORT_SCHEMA_VERSION,
        "outcome": kind,
        "method": method,
        "pass": pass,
        "logfile": logfile.display().to_string(),
    });
    let path = scratch_dir.join("report.json");
    let text = serde_json::to_string_pretty(&json).context("serialize report")?;
    std::fs::write(&path, text).with_context(|| format!("write {}", path.display()))
}
