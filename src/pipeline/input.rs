use std::path::{Path, PathBuf};

use crate::error::{ConvertError, IoContext, Result};
use crate::runlog::RunLog;

/// Returns `configured` when it exists, otherwise the first sibling named
/// `<stem>-*<suffix>` in lexicographic order. The substitution is logged.
pub fn resolve_input(configured: &Path, log: &RunLog) -> Result<PathBuf> {
    if configured.exists() {
        return Ok(configured.to_path_buf());
    }
    match find_fallback(configured)? {
        Some(candidate) => {
            log.line(&format!(
                "Configured input {} missing; falling back to {}",
                configured.display(),
                candidate.display()
            ));
            Ok(candidate)
        }
        None => Err(ConvertError::InputNotFound(configured.to_path_buf())),
    }
}

fn find_fallback(configured: &Path) -> Result<Option<PathBuf>> {
    let Some(stem) = configured.file_stem().and_then(|s| s.to_str()) else {
        return Ok(None);
    };
    let suffix = configured
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e))
        .unwrap_or_default();
    let prefix = format!("{}-", stem);

    let dir = match configured.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    if !dir.is_dir() {
        return Ok(None);
    }

    let mut candidates = Vec::new();
    for entry in std::fs::read_dir(&dir).io_context("listing", &dir)? {
        let entry = entry.io_context("listing", &dir)?;
        let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
            continue;
        };
        if name.len() >= prefix.len() + suffix.len()
            && name.starts_with(&prefix)
            && name.ends_with(&suffix)
        {
            candidates.push(entry.path());
        }
    }
    candidates.sort();

    Ok(candidates.into_iter().find(|p| p.is_file()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn log_lines(log: &RunLog) -> Vec<String> {
        std::fs::read_to_string(log.path())
            .unwrap_or_default()
            .lines()
            .map(String::from)
            .collect()
    }

    #[test]
    fn test_existing_input_is_kept() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("capture.bin");
        std::fs::write(&input, [1u8, 2, 3]).unwrap();
        let log = RunLog::new(dir.path().join("convert.log"));

        assert_eq!(resolve_input(&input, &log).unwrap(), input);
        assert!(log_lines(&log).is_empty());
    }

    #[test]
    fn test_falls_back_to_numbered_capture() {
        let dir = TempDir::new().unwrap();
        let fallback = dir.path().join("capture-001.bin");
        std::fs::write(&fallback, [128u8; 4]).unwrap();
        let log = RunLog::new(dir.path().join("convert.log"));

        let resolved = resolve_input(&dir.path().join("capture.bin"), &log).unwrap();
        assert_eq!(resolved, fallback);

        let lines = log_lines(&log);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("[convert] Configured input"));
        assert!(lines[0].contains("falling back to"));
    }

    #[test]
    fn test_picks_lexicographically_first_file() {
        let dir = TempDir::new().unwrap();
        for name in ["capture-b.bin", "capture-a.bin", "capture-0.dat", "other-1.bin"] {
            std::fs::write(dir.path().join(name), [0u8]).unwrap();
        }
        std::fs::create_dir(dir.path().join("capture-.bin")).unwrap();
        let log = RunLog::new(dir.path().join("convert.log"));

        let resolved = resolve_input(&dir.path().join("capture.bin"), &log).unwrap();
        assert_eq!(resolved, dir.path().join("capture-a.bin"));
    }

    #[test]
    fn test_missing_input_without_fallback() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("capture.bin.bak"), [0u8]).unwrap();
        let log = RunLog::new(dir.path().join("convert.log"));

        let err = resolve_input(&dir.path().join("capture.bin"), &log).unwrap_err();
        assert!(matches!(err, ConvertError::InputNotFound(_)));
    }
}
