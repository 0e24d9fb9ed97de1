// Centralized constants for herald to avoid magic numbers

/// Default timeout for a single status POST in seconds
pub const DEFAULT_DELIVERY_TIMEOUT_SECS: u64 = 10;

/// Path of the build status endpoint, relative to the configured server URL
pub const BUILD_STATUS_PATH: &str = "/api/build/status";

/// `git log` pretty format: sha, author name, author email, subject
pub const COMMIT_LOG_FORMAT: &str = "%H\t%an\t%ae\t%s";

/// Default tracing filter when RUST_LOG is not set
pub const DEFAULT_LOG_FILTER: &str = "herald=info";

/// Fractional digits in a serialized time span (100 ns ticks)
pub const TIMESPAN_TICK_DIGITS: usize = 7;
