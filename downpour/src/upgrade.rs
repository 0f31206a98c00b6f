//! Version gate for application upgrade downloads.
//!
//! Downloading an update only makes sense when the advertised version is
//! actually newer than the installed one. [`UpgradeCheck`] parses both
//! versions and answers that question; the caller then hands the package
//! URL to either download path.

use semver::Version;

use crate::error::{DownloadError, DownloadResult};

/// Compares an installed version against an advertised one.
#[derive(Debug, Clone)]
pub struct UpgradeCheck {
    current: Version,
    available: Version,
    package_url: String,
}

impl UpgradeCheck {
    /// Create a check from version strings.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::InvalidVersion`] when either string is not
    /// a valid semantic version.
    pub fn new(
        current: &str,
        available: &str,
        package_url: impl Into<String>,
    ) -> DownloadResult<Self> {
        let current = Version::parse(current)
            .map_err(|_| DownloadError::InvalidVersion(current.to_string()))?;
        let available = Version::parse(available)
            .map_err(|_| DownloadError::InvalidVersion(available.to_string()))?;

        Ok(Self {
            current,
            available,
            package_url: package_url.into(),
        })
    }

    /// Whether the advertised version is newer than the installed one.
    pub fn is_upgrade_available(&self) -> bool {
        self.available > self.current
    }

    /// The installed version.
    pub fn current_version(&self) -> &Version {
        &self.current
    }

    /// The advertised version.
    pub fn available_version(&self) -> &Version {
        &self.available
    }

    /// URL of the upgrade package.
    pub fn package_url(&self) -> &str {
        &self.package_url
    }
}
