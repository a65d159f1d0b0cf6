use crate::version::extract_import_paths;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;

/// Map from a source path to its content.
pub type SourceMap = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub content: String,
}

/// Compiler settings a verification request may control.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CompilationSettings {
    pub optimizer_enabled: bool,
    pub optimizer_runs: u32,
    pub evm_version: Option<String>,
    /// file -> library name -> address
    pub libraries: BTreeMap<String, BTreeMap<String, String>>,
}

impl Default for CompilationSettings {
    fn default() -> Self {
        Self {
            optimizer_enabled: false,
            optimizer_runs: 200,
            evm_version: None,
            libraries: BTreeMap::new(),
        }
    }
}

impl CompilationSettings {
    fn to_standard_json(&self) -> serde_json::Value {
        let mut settings = json!({
            "optimizer": {
                "enabled": self.optimizer_enabled,
                "runs": self.optimizer_runs,
            },
            "outputSelection": {
                "*": {
                    "*": ["abi", "evm.deployedBytecode", "metadata"],
                },
            },
        });
        if let Some(evm_version) = &self.evm_version {
            settings["evmVersion"] = json!(evm_version);
        }
        if !self.libraries.is_empty() {
            settings["libraries"] = json!(self.libraries);
        }
        settings
    }
}

/// Standard-JSON compiler input: language, sources and settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilationUnit {
    pub language: String,
    pub sources: BTreeMap<String, Source>,
    pub settings: serde_json::Value,
}

impl CompilationUnit {
    pub fn new(sources: SourceMap, settings: &CompilationSettings) -> Self {
        Self {
            language: "Solidity".to_string(),
            sources: sources
                .into_iter()
                .map(|(path, content)| (path, Source { content }))
                .collect(),
            settings: settings.to_standard_json(),
        }
    }

    /// Adds `extra` sources, never replacing a path the unit already has.
    pub fn merge_sources(&mut self, extra: &SourceMap) {
        for (path, content) in extra {
            self.sources
                .entry(path.clone())
                .or_insert_with(|| Source {
                    content: content.clone(),
                });
        }
    }

    /// First import that cannot be satisfied by the unit's sources.
    pub fn find_unresolved_import(&self) -> Option<(String, String)> {
        self.sources.iter().find_map(|(importer, source)| {
            extract_import_paths(&source.content)
                .into_iter()
                .find(|import| !self.resolves(importer, import))
                .map(|import| (importer.clone(), import))
        })
    }

    fn resolves(&self, importer: &str, import: &str) -> bool {
        let mut candidates = vec![import.to_string(), file_name(import).to_string()];
        if import.starts_with("./") || import.starts_with("../") {
            let base = importer.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("");
            candidates.push(normalize_path(&format!("{base}/{import}")));
        }
        candidates
            .iter()
            .any(|candidate| self.sources.contains_key(candidate))
    }
}

/// Registers every extra source under its own path and under its bare file name.
///
/// A file name alias never replaces an existing entry, so applying the
/// normalization twice gives the same map.
pub fn normalize_extra_sources(extra: &SourceMap) -> SourceMap {
    let mut normalized = extra.clone();
    for (path, content) in extra {
        normalized
            .entry(file_name(path).to_string())
            .or_insert_with(|| content.clone());
    }
    normalized
}

fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

fn normalize_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            segment => segments.push(segment),
        }
    }
    segments.join("/")
}
