use crate::consts::{
    DEFAULT_COMPILATION_TIMEOUT_SECS, DEFAULT_COMPILER_LIST, DEFAULT_INDEX_FRESHNESS_SECS,
};
use anyhow::anyhow;
use config::{Config, File};
use serde::{de::IgnoredAny, Deserialize};
use std::{num::NonZeroUsize, path::PathBuf, time::Duration};
use url::Url;

const SERVICE_NAME: &str = "CONTRACT_VERIFICATION";

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub compilers: CompilersSettings,
    pub release_index: ReleaseIndexSettings,
    pub bytecode_source: BytecodeSourceSettings,
    pub tracing: TracingSettings,

    // Is required as we deny unknown fields, but allow users provide
    // path to config through PREFIX__CONFIG env variable. If removed,
    // the setup would fail with `unknown field `config`, expected one of...`
    #[serde(rename = "config")]
    pub config_path: IgnoredAny,
}

// `IgnoredAny` does not implement PartialEq, so the comparison skips it.
impl PartialEq for Settings {
    fn eq(&self, other: &Self) -> bool {
        self.compilers == other.compilers
            && self.release_index == other.release_index
            && self.bytecode_source == other.bytecode_source
            && self.tracing == other.tracing
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompilersSettings {
    /// Where downloaded compiler builds are stored.
    pub dir: PathBuf,
    /// Number of compilations allowed to run simultaneously.
    pub max_threads: NonZeroUsize,
    /// Seconds to wait for the compiler to reply before its context is terminated.
    pub timeout: u64,
}

impl Default for CompilersSettings {
    fn default() -> Self {
        let mut dir = std::env::temp_dir();
        dir.push("solidity-compilers");
        Self {
            dir,
            max_threads: NonZeroUsize::new(8).expect("is not zero"),
            timeout: DEFAULT_COMPILATION_TIMEOUT_SECS,
        }
    }
}

impl CompilersSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReleaseIndexSettings {
    pub list_url: Url,
    /// Seconds during which a fetched release index is reused.
    pub freshness_window: u64,
}

impl Default for ReleaseIndexSettings {
    fn default() -> Self {
        Self {
            list_url: Url::try_from(DEFAULT_COMPILER_LIST).expect("valid url"),
            freshness_window: DEFAULT_INDEX_FRESHNESS_SECS,
        }
    }
}

impl ReleaseIndexSettings {
    pub fn freshness_window(&self) -> Duration {
        Duration::from_secs(self.freshness_window)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BytecodeSourceSettings {
    /// JSON-RPC node used to read deployed bytecode.
    pub rpc_url: Option<Url>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TracingSettings {
    pub enabled: bool,
    pub format: TracingFormat,
}

impl Default for TracingSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            format: Default::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TracingFormat {
    #[default]
    Default,
    Json,
}

impl Settings {
    /// Reads settings from the optional config file, then from
    /// `CONTRACT_VERIFICATION__*` environment variables.
    /// The file path may be passed explicitly or via `CONTRACT_VERIFICATION__CONFIG`.
    pub fn new(config_path: Option<PathBuf>) -> anyhow::Result<Self> {
        let config_path = config_path.or_else(|| {
            std::env::var(format!("{SERVICE_NAME}__CONFIG"))
                .ok()
                .map(PathBuf::from)
        });

        let mut builder = Config::builder();
        if let Some(config_path) = config_path {
            builder = builder.add_source(File::from(config_path));
        };
        // Use `__` so that it would be possible to address keys with underscores in names (e.g. `max_threads`)
        builder =
            builder.add_source(config::Environment::with_prefix(SERVICE_NAME).separator("__"));

        let settings: Settings = builder
            .build()?
            .try_deserialize()
            .map_err(|err| anyhow!(err))?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.compilers.timeout == 0 {
            return Err(anyhow!("compilers.timeout should be positive"));
        }
        Ok(())
    }
}
