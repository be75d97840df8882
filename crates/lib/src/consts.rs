/// Workspace configuration file, looked up at the root directory.
pub const CONFIG_FILENAME: &str = "plinth.toml";

/// Build definition file expected in every package directory.
pub const BUILD_FILENAME: &str = "BUILD.toml";

/// Per-workspace state directory holding the run lock.
pub const STATE_DIRNAME: &str = ".plinth";

/// Status returned by a build when no target qualified for any executor.
pub const NO_TARGETS_STATUS: i32 = -1;

/// Default executor connection timeout, in seconds.
pub const DEFAULT_CONNECTION_TIMEOUT_SECS: u64 = 20;
