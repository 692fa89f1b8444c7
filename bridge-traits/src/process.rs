//! Process Identity and Termination
//!
//! Gives the core access to the running build's identity, a synchronous
//! "is this installation trustworthy" predicate, and an unconditional exit.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of the running build as reported by platform metadata.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BuildInfo {
    pub version_name: String,
    pub version_code: i64,
}

impl BuildInfo {
    pub fn new(version_name: impl Into<String>, version_code: i64) -> Self {
        Self {
            version_name: version_name.into(),
            version_code,
        }
    }
}

impl fmt::Display for BuildInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.version_name, self.version_code)
    }
}

/// Why the process is being terminated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminationReason {
    /// The synchronous tamper check rejected this installation.
    UntrustedBuild,
    /// The remote manifest does not list the running build.
    RevokedBuild(BuildInfo),
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminationReason::UntrustedBuild => f.write_str("untrusted build"),
            TerminationReason::RevokedBuild(build) => write!(f, "revoked build {}", build),
        }
    }
}

/// Process-level controls provided by the host.
pub trait ProcessControl: Send + Sync {
    /// Version name/code of the running build.
    fn build_info(&self) -> BuildInfo;

    /// Signature/tamper predicate. Must be cheap and synchronous.
    fn is_trusted_build(&self) -> bool;

    /// Terminate the process immediately. No cleanup hooks are guaranteed to
    /// run.
    ///
    /// Production implementations never return. Test doubles may record the
    /// call and return, in which case callers stop all further work.
    fn terminate(&self, reason: TerminationReason);
}
