use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

const GITHUB_OUTPUT_ENV: &str = "GITHUB_OUTPUT";
const GITHUB_STEP_SUMMARY_ENV: &str = "GITHUB_STEP_SUMMARY";
const MULTILINE_DELIMITER: &str = "DISPATCH_OUTPUT_EOF";

/// Appends step outputs and job-summary markdown to the files GitHub Actions provides.
///
/// Either file may be absent (local runs); writes then become no-ops and the caller's
/// log lines are the only record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionOutputWriter {
    output_path: Option<PathBuf>,
    summary_path: Option<PathBuf>,
}

impl ActionOutputWriter {
    pub fn new(output_path: Option<PathBuf>, summary_path: Option<PathBuf>) -> Self {
        Self {
            output_path,
            summary_path,
        }
    }

    /// Build from `GITHUB_OUTPUT` / `GITHUB_STEP_SUMMARY`, ignoring blank values.
    pub fn from_env() -> Self {
        let read = |name: &str| {
            std::env::var(name)
                .ok()
                .map(|raw| raw.trim().to_string())
                .filter(|raw| !raw.is_empty())
                .map(PathBuf::from)
        };
        Self::new(read(GITHUB_OUTPUT_ENV), read(GITHUB_STEP_SUMMARY_ENV))
    }

    /// Returns true when the output was persisted, false when no output file is configured.
    pub fn set_output(&self, name: &str, value: &str) -> Result<bool> {
        let Some(path) = self.output_path.as_deref() else {
            return Ok(false);
        };
        let record = render_output_record(name, value)?;
        append_text(path, &record)?;
        Ok(true)
    }

    pub fn append_summary(&self, markdown: &str) -> Result<bool> {
        let Some(path) = self.summary_path.as_deref() else {
            return Ok(false);
        };
        let mut block = markdown.trim_end().to_string();
        block.push('\n');
        append_text(path, &block)?;
        Ok(true)
    }
}

fn render_output_record(name: &str, value: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() || name.contains('=') || name.contains('\n') {
        bail!("invalid action output name '{name}'");
    }
    if value.contains('\n') || value.contains('\r') {
        if value.contains(MULTILINE_DELIMITER) {
            bail!("action output '{name}' contains the reserved delimiter");
        }
        return Ok(format!(
            "{name}<<{MULTILINE_DELIMITER}\n{value}\n{MULTILINE_DELIMITER}\n"
        ));
    }
    Ok(format!("{name}={value}\n"))
}

fn append_text(path: &Path, content: &str) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    file.write_all(content.as_bytes())
        .with_context(|| format!("failed to append to {}", path.display()))
}
