pub mod chat;
pub mod validate;

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use botflow_spec::{BotSpec, IssueSeverity, SpecReport, validate_bot_spec};

/// Reads and parses a spec file, returning it with its validation report.
pub fn load_spec(path: &Path) -> Result<(BotSpec, SpecReport)> {
    let raw = fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let spec = BotSpec::from_json_str(&raw).with_context(|| format!("failed to parse {}", path.display()))?;
    let report = validate_bot_spec(&spec);
    Ok((spec, report))
}

pub fn print_report(report: &SpecReport) {
    for issue in &report.issues {
        let severity = match issue.severity {
            IssueSeverity::Error => "error",
            IssueSeverity::Warning => "warning",
        };
        eprintln!("{severity}: {} [{}] {}", issue.location, issue.code, issue.message);
    }
}

pub fn ensure_valid(path: &Path, report: &SpecReport) -> Result<()> {
    let errors = report.errors().count();
    if errors > 0 {
        bail!("{}: {errors} error(s) in spec", path.display());
    }
    Ok(())
}
