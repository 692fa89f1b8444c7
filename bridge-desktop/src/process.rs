//! Process control for desktop builds
//!
//! Build identity comes from the crate version unless the host overrides it.
//! The tamper check compares the SHA-256 of the running executable against a
//! digest shipped alongside the build; with no digest configured every build
//! is trusted.

use bridge_traits::process::{BuildInfo, ProcessControl, TerminationReason};
use sha2::{Digest, Sha256};
use std::io;
use std::path::Path;
use tracing::{error, warn};

/// Exit code used when the process terminates itself.
pub const TERMINATION_EXIT_CODE: i32 = 1;

pub struct DesktopProcessControl {
    build: BuildInfo,
    expected_digest: Option<String>,
}

impl DesktopProcessControl {
    /// Use this crate's package version as the build identity.
    pub fn new() -> Self {
        let version = env!("CARGO_PKG_VERSION");
        Self::with_build_info(BuildInfo::new(version, version_code_from(version)))
    }

    pub fn with_build_info(build: BuildInfo) -> Self {
        Self {
            build,
            expected_digest: None,
        }
    }

    /// Require the running executable to hash to `digest` (hex, any case).
    pub fn with_expected_digest(mut self, digest: impl Into<String>) -> Self {
        self.expected_digest = Some(digest.into().to_ascii_lowercase());
        self
    }

    fn executable_matches(&self, expected: &str) -> io::Result<bool> {
        let exe = std::env::current_exe()?;
        Ok(file_digest(&exe)? == expected)
    }
}

impl Default for DesktopProcessControl {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessControl for DesktopProcessControl {
    fn build_info(&self) -> BuildInfo {
        self.build.clone()
    }

    fn is_trusted_build(&self) -> bool {
        let Some(expected) = &self.expected_digest else {
            return true;
        };

        match self.executable_matches(expected) {
            Ok(matches) => matches,
            Err(e) => {
                warn!(error = %e, "Could not hash running executable");
                false
            }
        }
    }

    fn terminate(&self, reason: TerminationReason) {
        error!(%reason, build = %self.build, "Terminating process");
        std::process::exit(TERMINATION_EXIT_CODE);
    }
}

/// Lower-case hex SHA-256 of the file at `path`.
pub fn file_digest(path: &Path) -> io::Result<String> {
    let bytes = std::fs::read(path)?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

/// Derive a monotonically increasing integer from a `major.minor.patch`
/// version string. Unparseable components count as zero.
pub fn version_code_from(version: &str) -> i64 {
    let mut parts = version
        .split(['.', '-', '+'])
        .map(|part| part.parse::<i64>().unwrap_or(0));
    let major = parts.next().unwrap_or(0);
    let minor = parts.next().unwrap_or(0);
    let patch = parts.next().unwrap_or(0);
    major * 10_000 + minor * 100 + patch
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_code() {
        assert_eq!(version_code_from("0.1.0"), 100);
        assert_eq!(version_code_from("2.10.3"), 21_003);
        assert_eq!(version_code_from("1.0.0-beta"), 10_000);
        assert_eq!(version_code_from("garbage"), 0);
    }

    #[test]
    fn test_untracked_build_is_trusted() {
        let control = DesktopProcessControl::new();
        assert!(control.is_trusted_build());
        assert_eq!(control.build_info().version_name, env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn test_digest_mismatch_is_untrusted() {
        let control = DesktopProcessControl::new().with_expected_digest("00");
        assert!(!control.is_trusted_build());
    }

    #[test]
    fn test_matching_digest_is_trusted() {
        let exe = std::env::current_exe().unwrap();
        let digest = file_digest(&exe).unwrap();
        let control = DesktopProcessControl::new().with_expected_digest(digest.to_uppercase());
        assert!(control.is_trusted_build());
    }
}
