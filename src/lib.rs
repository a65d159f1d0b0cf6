pub mod bytecode;
pub mod cache;
pub mod compiler;
mod consts;
mod logging;
mod mismatch;
pub mod release_index;
mod settings;
pub mod verifier;
pub mod version;

pub use consts::DEFAULT_COMPILER_LIST;
pub use logging::init_logs;
pub use mismatch::Mismatch;
pub use settings::{
    BytecodeSourceSettings, CompilersSettings, ReleaseIndexSettings, Settings, TracingFormat,
    TracingSettings,
};
