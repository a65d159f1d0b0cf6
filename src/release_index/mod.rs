mod client;

pub use client::{ListError, ReleaseIndexClient};

use crate::version::CompilerVersion;
use primitive_types::H256;
use std::collections::BTreeMap;
use url::Url;

mod json {
    use crate::version::CompilerVersion;
    use primitive_types::H256;
    use serde::{Deserialize, Serialize};
    use serde_with::{serde_as, DisplayFromStr};
    use url::Url;

    #[derive(Debug, Deserialize, Serialize, PartialEq)]
    pub struct List {
        pub builds: Vec<BuildInfo>,
    }

    #[serde_as]
    #[derive(Debug, Deserialize, Serialize, PartialEq)]
    #[serde(rename_all = "camelCase")]
    pub struct BuildInfo {
        pub path: DownloadPath,
        #[serde_as(as = "DisplayFromStr")]
        pub long_version: CompilerVersion,
        pub sha256: H256,
    }

    #[derive(Debug, Deserialize, Serialize, PartialEq)]
    #[serde(untagged)]
    pub enum DownloadPath {
        Url(Url),
        Filename(String),
    }
}

/// Downloadable compiler build known to the release index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerBuild {
    pub version: CompilerVersion,
    pub url: Url,
    pub sha256: H256,
}

impl CompilerBuild {
    pub fn new(version: CompilerVersion, url: Url, sha256: H256) -> Self {
        Self {
            version,
            url,
            sha256,
        }
    }
}

/// Ordered set of published compiler releases.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReleaseIndex {
    builds: BTreeMap<semver::Version, CompilerBuild>,
}

impl ReleaseIndex {
    pub fn from_builds(builds: impl IntoIterator<Item = CompilerBuild>) -> Self {
        let builds = builds
            .into_iter()
            .map(|build| (build.version.release(), build))
            .collect();
        Self { builds }
    }

    fn from_list(list: json::List, list_url: &Url) -> Result<Self, url::ParseError> {
        let builds = list
            .builds
            .into_iter()
            .map(|info| {
                let url = match info.path {
                    json::DownloadPath::Url(url) => url,
                    // list_url ends with `.../list.json` but join() will replace it with the filename
                    json::DownloadPath::Filename(filename) => list_url.join(&filename)?,
                };
                Ok(CompilerBuild::new(info.long_version, url, info.sha256))
            })
            .collect::<Result<Vec<_>, url::ParseError>>()?;
        Ok(Self::from_builds(builds))
    }

    /// Known versions, newest first.
    pub fn versions(&self) -> impl Iterator<Item = &semver::Version> {
        self.builds.keys().rev()
    }

    /// Known builds, newest first.
    pub fn builds(&self) -> impl Iterator<Item = &CompilerBuild> {
        self.builds.values().rev()
    }

    pub fn contains(&self, version: &semver::Version) -> bool {
        self.builds.contains_key(version)
    }

    pub fn build(&self, version: &semver::Version) -> Option<&CompilerBuild> {
        self.builds.get(version)
    }

    pub fn len(&self) -> usize {
        self.builds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.builds.is_empty()
    }
}
