//! Preview-aware semantic versions and bump resolution
//!
//! Published versions are plain `major.minor.patch` or carry exactly one
//! pre-release label, `preview.<N>`. Anything else is rejected before a bump
//! is computed.

use crate::core::error::VersionError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Version bump requested for a changed package
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BumpKind {
    None,
    #[default]
    Preview,
    Patch,
    Minor,
    Major,
    Release,
}

impl fmt::Display for BumpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BumpKind::None => "none",
            BumpKind::Preview => "preview",
            BumpKind::Patch => "patch",
            BumpKind::Minor => "minor",
            BumpKind::Major => "major",
            BumpKind::Release => "release",
        };
        f.write_str(name)
    }
}

/// `major.minor.patch[-preview.N][+build]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewVersion {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    pub preview: Option<u64>,
    pub build: Option<String>,
}

impl PreviewVersion {
    /// Apply a bump. Build metadata does not survive a bump.
    pub fn bump(&self, kind: BumpKind) -> PreviewVersion {
        let mut next = PreviewVersion {
            build: None,
            ..self.clone()
        };

        match kind {
            BumpKind::None => return self.clone(),
            BumpKind::Release => {
                next.preview = None;
            }
            BumpKind::Patch => {
                next.patch += 1;
                next.preview = Some(1);
            }
            BumpKind::Minor => {
                next.minor += 1;
                next.patch = 0;
                next.preview = Some(1);
            }
            BumpKind::Major => {
                next.major += 1;
                next.minor = 0;
                next.patch = 0;
                next.preview = Some(1);
            }
            BumpKind::Preview => match self.preview {
                Some(n) => next.preview = Some(n + 1),
                None => {
                    next.patch += 1;
                    next.preview = Some(1);
                }
            },
        }

        next
    }
}

impl FromStr for PreviewVersion {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parsed = semver::Version::parse(s).map_err(|e| VersionError::Malformed {
            version: s.to_string(),
            reason: e.to_string(),
        })?;

        let preview = if parsed.pre.is_empty() {
            None
        } else {
            let counter = preview_counter(parsed.pre.as_str())
                .ok_or_else(|| VersionError::InvalidPrerelease { version: s.to_string() })?;
            Some(counter)
        };

        let build = if parsed.build.is_empty() {
            None
        } else {
            Some(parsed.build.as_str().to_string())
        };

        Ok(PreviewVersion {
            major: parsed.major,
            minor: parsed.minor,
            patch: parsed.patch,
            preview,
            build,
        })
    }
}

impl fmt::Display for PreviewVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if let Some(n) = self.preview {
            write!(f, "-preview.{}", n)?;
        }
        if let Some(build) = &self.build {
            write!(f, "+{}", build)?;
        }
        Ok(())
    }
}

/// Counter of a `preview.<N>` label, N positive without leading zeros
fn preview_counter(pre: &str) -> Option<u64> {
    let digits = pre.strip_prefix("preview.")?;
    if digits.is_empty() || digits.starts_with('0') || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Compute the version that follows `current` for the requested bump
///
/// `current` is validated first; `BumpKind::None` then hands it back untouched.
pub fn resolve(current: &str, bump: BumpKind) -> Result<String, VersionError> {
    let version: PreviewVersion = current.parse()?;
    if bump == BumpKind::None {
        return Ok(current.to_string());
    }
    Ok(version.bump(bump).to_string())
}

/// True only for versions whose pre-release is `preview.N` with N a positive counter
pub fn is_preview(version: &str) -> bool {
    semver::Version::parse(version).is_ok_and(|parsed| preview_counter(parsed.pre.as_str()).is_some())
}

/// Compare two registry versions by semver precedence (build metadata ignored)
pub fn cmp_precedence(a: &str, b: &str) -> Result<std::cmp::Ordering, VersionError> {
    let parse = |s: &str| {
        semver::Version::parse(s).map_err(|e| VersionError::Malformed {
            version: s.to_string(),
            reason: e.to_string(),
        })
    };
    Ok(parse(a)?.cmp_precedence(&parse(b)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cmp::Ordering;

    #[test]
    fn test_none_returns_input() {
        assert_eq!(resolve("1.2.3", BumpKind::None).unwrap(), "1.2.3");
        assert_eq!(resolve("1.2.3-preview.4", BumpKind::None).unwrap(), "1.2.3-preview.4");
        assert_eq!(resolve("1.2.3+build.7", BumpKind::None).unwrap(), "1.2.3+build.7");
    }

    #[test]
    fn test_component_bumps_start_a_preview() {
        assert_eq!(resolve("1.2.3", BumpKind::Patch).unwrap(), "1.2.4-preview.1");
        assert_eq!(resolve("1.2.3", BumpKind::Minor).unwrap(), "1.3.0-preview.1");
        assert_eq!(resolve("1.2.3", BumpKind::Major).unwrap(), "2.0.0-preview.1");
        assert_eq!(resolve("1.2.3-preview.5", BumpKind::Patch).unwrap(), "1.2.4-preview.1");
    }

    #[test]
    fn test_release_strips_preview() {
        assert_eq!(resolve("1.2.3", BumpKind::Release).unwrap(), "1.2.3");
        assert_eq!(resolve("1.2.3-preview.2", BumpKind::Release).unwrap(), "1.2.3");
    }

    #[test]
    fn test_preview_bump() {
        assert_eq!(resolve("1.2.3-preview.2", BumpKind::Preview).unwrap(), "1.2.3-preview.3");
        assert_eq!(resolve("1.2.3", BumpKind::Preview).unwrap(), "1.2.4-preview.1");
        assert_eq!(resolve("0.0.0", BumpKind::Preview).unwrap(), "0.0.1-preview.1");
    }

    #[test]
    fn test_build_metadata_dropped_on_bump() {
        assert_eq!(resolve("1.2.3+ci.9", BumpKind::Patch).unwrap(), "1.2.4-preview.1");
        assert_eq!(resolve("1.2.3-preview.1+ci.9", BumpKind::Preview).unwrap(), "1.2.3-preview.2");
    }

    #[test]
    fn test_rejects_malformed_versions() {
        for bad in [
            "testString",
            "2.5",
            "1.2.3-peview.1",
            "1.a.3",
            "1.2.3-preview.a",
            "1.2.3-preview",
            "1.2.3-preview.1a",
            "1.2.3-preview.0",
        ] {
            for bump in [BumpKind::None, BumpKind::Preview, BumpKind::Release] {
                assert!(resolve(bad, bump).is_err(), "{} should be rejected for {}", bad, bump);
            }
        }
    }

    #[test]
    fn test_accepts_valid_versions() {
        assert!("1.2.3".parse::<PreviewVersion>().is_ok());
        let preview: PreviewVersion = "1.2.3-preview.2".parse().unwrap();
        assert_eq!(preview.preview, Some(2));
    }

    #[test]
    fn test_is_preview() {
        assert!(is_preview("1.2.3-preview.1"));
        assert!(is_preview("0.1.0-preview.42"));
        assert!(!is_preview("1.2.3"));
        assert!(!is_preview("1.2.3-beta.1"));
        assert!(!is_preview("1.2.3-preview"));
        assert!(!is_preview("1.2.3-preview.1a"));
        assert!(!is_preview("1.2.3-preview2"));
        assert!(!is_preview("1.2.3-preiew.2"));
        assert!(!is_preview("1.2.3-preview.0"));
        assert!(resolve("1.2.3-preview.0", BumpKind::Patch).is_err());
        assert!(!is_preview("not a version"));
    }

    #[test]
    fn test_precedence_ignores_build_metadata() {
        assert_eq!(cmp_precedence("1.0.0+a", "1.0.0+b").unwrap(), Ordering::Equal);
        assert_eq!(cmp_precedence("1.0.0-preview.2", "1.0.0").unwrap(), Ordering::Less);
        assert_eq!(cmp_precedence("1.0.0-preview.10", "1.0.0-preview.9").unwrap(), Ordering::Greater);
        assert!(cmp_precedence("1.0", "1.0.0").is_err());
    }
}
