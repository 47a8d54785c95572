//! Semantic versions and version requirements.
//!
//! Wraps the `semver` crate. Artifact versions are strict
//! `MAJOR.MINOR.PATCH[-prerelease]`; build metadata is rejected because it
//! does not participate in ordering.

/// A parsed semantic version.
pub type Version = semver::Version;

/// A version requirement (range expression).
pub type VersionReq = semver::VersionReq;

/// Parse a strict artifact version like "1.2.3" or "2.0.0-rc.1".
pub fn parse_version(s: &str) -> Result<Version, semver::Error> {
    Version::parse(s)
}

/// Whether `s` is a strict artifact version (no build metadata).
pub fn is_strict_version(s: &str) -> bool {
    matches!(parse_version(s), Ok(v) if v.build.is_empty())
}

/// Parse a version requirement string like ">=1.0.0, <2.0.0" or "1.2.3" (caret).
pub fn parse_requirement(s: &str) -> Result<VersionReq, semver::Error> {
    VersionReq::parse(s)
}

/// Check if a version satisfies a requirement.
pub fn matches(version: &Version, req: &VersionReq) -> bool {
    req.matches(version)
}
