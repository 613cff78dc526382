//! Cumulative plain-text report

use crate::error::{MetrixError, Result};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

const RULE_WIDTH: usize = 80;

/// Append-only text report; every write reopens the file in append mode so
/// earlier runs are preserved
#[derive(Debug, Clone)]
pub struct ReportLog {
    path: PathBuf,
}

impl ReportLog {
    /// Report at `dir/file_name`; `dir` is created when missing
    pub fn open(dir: &Path, file_name: &str) -> Result<Self> {
        fs::create_dir_all(dir)?;
        Ok(Self {
            path: dir.join(file_name),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append raw text
    pub fn append(&self, text: &str) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| {
                MetrixError::ReportError(format!("cannot open {}: {}", self.path.display(), e))
            })?;
        file.write_all(text.as_bytes())?;
        Ok(())
    }

    pub fn line(&self, line: &str) -> Result<()> {
        self.append(&format!("{}\n", line))
    }

    /// Banner heading framed by rules
    pub fn section(&self, title: &str) -> Result<()> {
        let rule = "*".repeat(RULE_WIDTH);
        self.append(&format!("{}\n*    {}\n{}\n", rule, title, rule))
    }

    pub fn kv(&self, key: &str, value: impl std::fmt::Display) -> Result<()> {
        self.append(&format!("{}: {}\n", key, value))
    }

    /// Current contents
    pub fn read(&self) -> Result<String> {
        Ok(fs::read_to_string(&self.path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_appends_across_handles() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("decisiontree_gridsearch");

        let first = ReportLog::open(&sub, "report.txt").unwrap();
        first.section("Run 1").unwrap();
        first.kv("Accuracy", 0.75).unwrap();

        let second = ReportLog::open(&sub, "report.txt").unwrap();
        second.line("second run").unwrap();

        let text = second.read().unwrap();
        assert!(text.starts_with(&"*".repeat(80)));
        assert!(text.contains("*    Run 1\n"));
        assert!(text.contains("Accuracy: 0.75\n"));
        assert!(text.ends_with("second run\n"));
    }
}
