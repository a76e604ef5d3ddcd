use crate::types::{LinkOutcome, LinkStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

const INFO_MARK: &str = "🟢";
const ERROR_MARK: &str = "🔴";
const FIELD_SEP: char = '\t';

/// One event per line, one value per field.
fn field(value: &str) -> String {
    value.replace(['\t', '\n', '\r'], " ")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum LogLevel {
    Info,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub department: Option<String>,
    pub event: String,
    pub details: Option<String>,
}

/// Append-only, one line per event, kept across runs.
///
/// Line shape, tab-separated: `<YYYY-MM-DD HH:MM:SS UTC> <mark> <event> <department|*> <details>`.
/// Department names may contain spaces, so fields are split on tabs only.
pub struct ActivityLogger {
    log_path: PathBuf,
}

impl ActivityLogger {
    /// Log file in the platform data dir.
    pub fn new() -> crate::Result<Self> {
        let dir = crate::services::store::data_dir()?;
        fs::create_dir_all(&dir)?;
        Ok(Self::at(dir.join("activity.log")))
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            log_path: path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.log_path
    }

    pub fn log(
        &self,
        level: LogLevel,
        department: Option<&str>,
        event: &str,
        details: Option<&str>,
    ) -> crate::Result<()> {
        let entry = LogEntry {
            timestamp: Utc::now(),
            level,
            department: department.map(|d| d.to_string()),
            event: event.to_string(),
            details: details.map(|d| d.to_string()),
        };

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)?;

        let level_str = match entry.level {
            LogLevel::Info => INFO_MARK,
            LogLevel::Error => ERROR_MARK,
        };

        writeln!(
            file,
            "{}{FIELD_SEP}{}{FIELD_SEP}{}{FIELD_SEP}{}{FIELD_SEP}{}",
            entry.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
            level_str,
            field(&entry.event),
            field(entry.department.as_deref().unwrap_or("*")),
            field(entry.details.as_deref().unwrap_or(""))
        )?;

        Ok(())
    }

    /// Record the result of one link.
    pub fn record(&self, outcome: &LinkOutcome) -> crate::Result<()> {
        let target = outcome.url.as_deref().unwrap_or(&outcome.link);
        match &outcome.status {
            LinkStatus::Uploaded => self.info(
                Some(&outcome.department),
                "uploaded",
                Some(&format!(
                    "{} -> {}",
                    target,
                    outcome.blob_name.as_deref().unwrap_or("?")
                )),
            ),
            LinkStatus::Failed { stage, error } => self.error(
                Some(&outcome.department),
                &format!("failed:{stage}"),
                Some(&format!("{target} {error}")),
            ),
        }
    }

    /// Matching lines, newest first.
    pub fn read_logs(
        &self,
        department_filter: Option<&str>,
        errors_only: bool,
    ) -> crate::Result<Vec<String>> {
        if !self.log_path.exists() {
            return Ok(vec![]);
        }

        let file = fs::File::open(&self.log_path)?;
        let reader = BufReader::new(file);
        let mut matching_lines = Vec::new();

        for line in reader.lines() {
            let line = line?;

            if errors_only && !line.contains(ERROR_MARK) {
                continue;
            }

            if let Some(department) = department_filter {
                // timestamp, mark, event, department, details
                if line.split(FIELD_SEP).nth(3) != Some(department) {
                    continue;
                }
            }

            matching_lines.push(line);
        }

        matching_lines.reverse();
        Ok(matching_lines)
    }

    pub fn info(
        &self,
        department: Option<&str>,
        event: &str,
        details: Option<&str>,
    ) -> crate::Result<()> {
        self.log(LogLevel::Info, department, event, details)
    }

    pub fn error(
        &self,
        department: Option<&str>,
        event: &str,
        details: Option<&str>,
    ) -> crate::Result<()> {
        self.log(LogLevel::Error, department, event, details)
    }
}
