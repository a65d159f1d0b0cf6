use std::{
    fmt::{Display, Formatter},
    str::FromStr,
};

/// Full compiler build version, e.g. `v0.8.18+commit.87f61d96`.
#[derive(Debug, Clone, PartialOrd, Ord, PartialEq, Eq, Hash)]
pub struct CompilerVersion(semver::Version);

impl CompilerVersion {
    /// Version without build metadata, used to match against constraints.
    pub fn release(&self) -> semver::Version {
        semver::Version {
            build: semver::BuildMetadata::EMPTY,
            ..self.0.clone()
        }
    }

    pub fn commit(&self) -> Option<&str> {
        self.0.build.as_str().strip_prefix("commit.")
    }

    pub fn is_nightly(&self) -> bool {
        !self.0.pre.is_empty()
    }

    pub fn to_semver(&self) -> &semver::Version {
        &self.0
    }
}

impl Display for CompilerVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "v{}", self.0)
    }
}

impl FromStr for CompilerVersion {
    type Err = semver::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(semver::Version::from_str(s.trim().trim_start_matches('v'))?))
    }
}

impl From<semver::Version> for CompilerVersion {
    fn from(version: semver::Version) -> Self {
        Self(version)
    }
}
