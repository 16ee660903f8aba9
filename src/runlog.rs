use chrono::Utc;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

const TAG: &str = "convert";

/// Append-only plain-text event log for a conversion run.
///
/// Each event becomes one `[timestamp] [convert] message` line in the file
/// and is mirrored to the `log` facade.
pub struct RunLog {
    path: PathBuf,
}

impl RunLog {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    #[cfg(test)]
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    pub fn line(&self, message: &str) {
        let stamp = Utc::now().format("%Y-%m-%dT%H:%M:%S%.3f");
        let line = format!("[{}] [{}] {}", stamp, TAG, message);
        log::info!("{}", message);

        let appended = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut f| writeln!(f, "{}", line));
        if let Err(err) = appended {
            log::warn!("Failed to append to run log {}: {}", self.path.display(), err);
        }
    }
}
