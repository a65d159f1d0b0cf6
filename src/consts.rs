#[cfg(target_os = "linux")]
pub const DEFAULT_COMPILER_LIST: &str = "https://solc-bin.ethereum.org/linux-amd64/list.json";
#[cfg(target_os = "macos")]
pub const DEFAULT_COMPILER_LIST: &str = "https://solc-bin.ethereum.org/macosx-amd64/list.json";
#[cfg(target_os = "windows")]
pub const DEFAULT_COMPILER_LIST: &str = "https://solc-bin.ethereum.org/windows-amd64/list.json";

/// Name of the compiler executable inside its version folder.
pub const COMPILER_EXECUTABLE: &str = "solc";

pub const DEFAULT_COMPILATION_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_INDEX_FRESHNESS_SECS: u64 = 60 * 60;
