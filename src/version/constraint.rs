use semver::{Version, VersionReq};
use std::{fmt, str::FromStr};

const OPERATOR_CHARS: &[char] = &['^', '~', '>', '<', '='];

/// Parsed `pragma solidity` constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionConstraint {
    /// A single concrete version (`0.8.18` or `=0.8.18`). Build metadata,
    /// when given, must match too.
    Exact(Version),
    /// Any of the alternatives separated by `||`.
    Range(Vec<VersionReq>),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed version constraint: {0}")]
pub struct MalformedConstraint(pub String);

impl VersionConstraint {
    pub fn matches(&self, version: &Version) -> bool {
        match self {
            VersionConstraint::Exact(exact) => {
                exact.major == version.major
                    && exact.minor == version.minor
                    && exact.patch == version.patch
                    && exact.pre == version.pre
                    && (exact.build.is_empty() || exact.build == version.build)
            }
            VersionConstraint::Range(alternatives) => {
                alternatives.iter().any(|req| req.matches(version))
            }
        }
    }
}

impl FromStr for VersionConstraint {
    type Err = MalformedConstraint;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let malformed = || MalformedConstraint(raw.to_string());

        let alternatives: Vec<Vec<String>> = raw.split("||").map(comparators).collect();
        if alternatives.iter().any(|comparators| comparators.is_empty()) {
            return Err(malformed());
        }

        if let [single] = alternatives.as_slice() {
            if let [comparator] = single.as_slice() {
                if let Some(exact) = exact_version(comparator) {
                    return Ok(VersionConstraint::Exact(exact));
                }
            }
        }

        alternatives
            .iter()
            .map(|comparators| to_requirement(comparators).ok_or_else(malformed))
            .collect::<Result<Vec<_>, _>>()
            .map(VersionConstraint::Range)
    }
}

impl fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionConstraint::Exact(version) => write!(f, "={version}"),
            VersionConstraint::Range(alternatives) => {
                let alternatives: Vec<String> =
                    alternatives.iter().map(|req| req.to_string()).collect();
                write!(f, "{}", alternatives.join(" || "))
            }
        }
    }
}

/// Splits one alternative into comparators, gluing detached operators
/// (`>= 0.8.0`) back to their versions.
fn comparators(alternative: &str) -> Vec<String> {
    let mut result: Vec<String> = Vec::new();
    let mut pending_operator: Option<String> = None;
    for token in alternative.split_whitespace() {
        if token.chars().all(|c| OPERATOR_CHARS.contains(&c)) {
            pending_operator = Some(pending_operator.unwrap_or_default() + token);
            continue;
        }
        match pending_operator.take() {
            Some(operator) => result.push(operator + token),
            None => result.push(token.to_string()),
        }
    }
    if let Some(operator) = pending_operator {
        result.push(operator);
    }
    result
}

fn split_operator(comparator: &str) -> (&str, &str) {
    let version_start = comparator
        .find(|c: char| !OPERATOR_CHARS.contains(&c))
        .unwrap_or(comparator.len());
    let (operator, version) = comparator.split_at(version_start);
    (operator, version.trim_start_matches('v'))
}

fn is_wildcard(version: &str) -> bool {
    version
        .split('.')
        .any(|part| matches!(part, "*" | "x" | "X"))
}

fn exact_version(comparator: &str) -> Option<Version> {
    match split_operator(comparator) {
        ("" | "=", version) => Version::parse(version).ok(),
        _ => None,
    }
}

fn to_requirement(comparators: &[String]) -> Option<VersionReq> {
    let comparators: Vec<String> = match comparators {
        // hyphen range: `0.4.0 - 0.5.0`
        [from, hyphen, to] if hyphen == "-" => {
            vec![format!(">={from}"), format!("<={to}")]
        }
        _ => comparators
            .iter()
            .map(|comparator| {
                let (operator, version) = split_operator(comparator);
                if version.is_empty() {
                    return None;
                }
                // a bare version means exactly that version (or that prefix)
                let operator = if operator.is_empty() && !is_wildcard(version) {
                    "="
                } else {
                    operator
                };
                Some(format!("{operator}{version}"))
            })
            .collect::<Option<_>>()?,
    };
    VersionReq::parse(&comparators.join(", ")).ok()
}
