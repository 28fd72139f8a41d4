pub mod config;
pub mod entry;
pub mod ids;
pub mod policy;
pub mod report;
pub mod scenario;
pub mod terminal;

pub use config::*;
pub use entry::*;
pub use ids::{RunId, SessionId};
pub use policy::EnvPolicy;
pub use report::*;
pub use scenario::*;
pub use terminal::*;

/// Maximum length for user-supplied regex patterns to prevent `ReDoS` attacks.
pub const MAX_REGEX_PATTERN_LEN: usize = 1000;

/// Version of the JSON report emitted by `histprobe run --json`.
pub const REPORT_VERSION: u32 = 1;
