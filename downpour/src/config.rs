//! Configuration for the download engine.

use std::path::{Path, PathBuf};
use std::time::Duration;

use ini::Ini;

use crate::error::{DownloadError, DownloadResult};
use crate::managed::DEFAULT_POLL_INTERVAL;
use crate::task::{DownloadRequest, DEFAULT_CONNECT_TIMEOUT, DEFAULT_READ_TIMEOUT};

/// Configuration for the download engine.
///
/// Timeouts are attempt-scoped: a timeout surfaces as a transport failure
/// for that attempt and is never retried automatically.
#[derive(Debug, Clone)]
pub struct DownloadConfig {
    /// Directory downloads are written to.
    pub download_dir: PathBuf,

    /// Connect timeout for one attempt.
    pub connect_timeout: Duration,

    /// Read timeout for one attempt.
    pub read_timeout: Duration,

    /// Extension forced onto derived file names that lack one.
    pub default_extension: Option<String>,

    /// Poll interval for managed-transfer reconciliation.
    pub poll_interval: Duration,

    /// Path of the completed-transfer ledger.
    pub ledger_path: PathBuf,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        let download_dir = dirs::download_dir()
            .unwrap_or_else(|| std::env::temp_dir().join("downpour"));
        let ledger_path = dirs::data_local_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("downpour")
            .join("completed.json");

        Self {
            download_dir,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_timeout: DEFAULT_READ_TIMEOUT,
            default_extension: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
            ledger_path,
        }
    }
}

impl DownloadConfig {
    /// Create a configuration with the given download directory.
    pub fn new(download_dir: impl Into<PathBuf>) -> Self {
        Self {
            download_dir: download_dir.into(),
            ..Default::default()
        }
    }

    /// Set the connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the read timeout.
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Force this extension on derived file names.
    pub fn with_default_extension(mut self, extension: impl Into<String>) -> Self {
        self.default_extension = Some(extension.into());
        self
    }

    /// Set the managed-transfer poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the ledger path.
    pub fn with_ledger_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.ledger_path = path.into();
        self
    }

    /// Load configuration from an INI file.
    ///
    /// Recognized keys, all optional:
    ///
    /// ```ini
    /// [download]
    /// dir = /home/user/Downloads
    /// connect_timeout_secs = 10
    /// read_timeout_secs = 20
    /// default_extension = apk
    ///
    /// [managed]
    /// poll_interval_ms = 100
    /// ledger = /home/user/.local/share/downpour/completed.json
    /// ```
    pub fn from_ini(path: &Path) -> DownloadResult<Self> {
        let ini = Ini::load_from_file(path)
            .map_err(|e| DownloadError::InvalidConfig(e.to_string()))?;
        let mut config = Self::default();

        if let Some(section) = ini.section(Some("download")) {
            if let Some(dir) = section.get("dir") {
                config.download_dir = PathBuf::from(dir);
            }
            if let Some(secs) = section.get("connect_timeout_secs") {
                config.connect_timeout = Duration::from_secs(parse_u64(secs, "connect_timeout_secs")?);
            }
            if let Some(secs) = section.get("read_timeout_secs") {
                config.read_timeout = Duration::from_secs(parse_u64(secs, "read_timeout_secs")?);
            }
            if let Some(ext) = section.get("default_extension") {
                config.default_extension = Some(ext.to_string());
            }
        }

        if let Some(section) = ini.section(Some("managed")) {
            if let Some(ms) = section.get("poll_interval_ms") {
                config.poll_interval = Duration::from_millis(parse_u64(ms, "poll_interval_ms")?);
            }
            if let Some(ledger) = section.get("ledger") {
                config.ledger_path = PathBuf::from(ledger);
            }
        }

        Ok(config)
    }

    /// Build a download request for a URL using this configuration.
    pub fn request_for(&self, url: impl Into<String>) -> DownloadRequest {
        let mut request = DownloadRequest::new(url, self.download_dir.clone())
            .with_connect_timeout(self.connect_timeout)
            .with_read_timeout(self.read_timeout);
        if let Some(ext) = &self.default_extension {
            request = request.with_default_extension(ext.clone());
        }
        request
    }
}

fn parse_u64(value: &str, key: &str) -> DownloadResult<u64> {
    value
        .parse::<u64>()
        .map_err(|_| DownloadError::InvalidConfig(format!("{} must be a number, got '{}'", key, value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = DownloadConfig::default();
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.read_timeout, Duration::from_secs(20));
        assert_eq!(config.poll_interval, DEFAULT_POLL_INTERVAL);
        assert!(config.default_extension.is_none());
    }

    #[test]
    fn test_builder_pattern() {
        let config = DownloadConfig::new("/srv/downloads")
            .with_connect_timeout(Duration::from_secs(5))
            .with_read_timeout(Duration::from_secs(60))
            .with_default_extension("apk")
            .with_poll_interval(Duration::from_millis(250))
            .with_ledger_path("/var/lib/downpour/completed.json");

        assert_eq!(config.download_dir, PathBuf::from("/srv/downloads"));
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert_eq!(config.read_timeout, Duration::from_secs(60));
        assert_eq!(config.default_extension.as_deref(), Some("apk"));
        assert_eq!(config.poll_interval, Duration::from_millis(250));
    }

    #[test]
    fn test_from_ini() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("downpour.ini");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "[download]").unwrap();
        writeln!(file, "dir = /srv/downloads").unwrap();
        writeln!(file, "connect_timeout_secs = 7").unwrap();
        writeln!(file, "default_extension = apk").unwrap();
        writeln!(file, "[managed]").unwrap();
        writeln!(file, "poll_interval_ms = 50").unwrap();

        let config = DownloadConfig::from_ini(&path).unwrap();
        assert_eq!(config.download_dir, PathBuf::from("/srv/downloads"));
        assert_eq!(config.connect_timeout, Duration::from_secs(7));
        // Unset keys keep their defaults.
        assert_eq!(config.read_timeout, Duration::from_secs(20));
        assert_eq!(config.default_extension.as_deref(), Some("apk"));
        assert_eq!(config.poll_interval, Duration::from_millis(50));
    }

    #[test]
    fn test_from_ini_rejects_bad_number() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("downpour.ini");
        std::fs::write(&path, "[download]\nconnect_timeout_secs = soon\n").unwrap();

        let err = DownloadConfig::from_ini(&path).unwrap_err();
        assert!(err.to_string().contains("connect_timeout_secs"));
    }

    #[test]
    fn test_request_for_carries_settings() {
        let config = DownloadConfig::new("/srv/downloads")
            .with_default_extension("apk")
            .with_read_timeout(Duration::from_secs(90));

        let request = config.request_for("http://x/y/app.apk");
        assert_eq!(request.destination, PathBuf::from("/srv/downloads"));
        assert_eq!(request.default_extension.as_deref(), Some("apk"));
        assert_eq!(request.read_timeout, Duration::from_secs(90));
    }
}
