use super::VersionConstraint;
use crate::release_index::ReleaseIndex;
use std::str::FromStr;

/// Newest release in `index` satisfying `constraint`.
///
/// A concrete version resolves only to itself, and only to the build it
/// names when it carries build metadata. Malformed constraints resolve to
/// nothing.
pub fn resolve_version(constraint: &str, index: &ReleaseIndex) -> Option<semver::Version> {
    let constraint = match VersionConstraint::from_str(constraint) {
        Ok(constraint) => constraint,
        Err(err) => {
            tracing::debug!("{err}");
            return None;
        }
    };
    resolve_constraint(&constraint, index)
}

pub fn resolve_constraint(
    constraint: &VersionConstraint,
    index: &ReleaseIndex,
) -> Option<semver::Version> {
    index
        .builds()
        .find(|build| constraint.matches(build.version.to_semver()))
        .map(|build| build.version.release())
}
