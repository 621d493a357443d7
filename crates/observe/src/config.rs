use tracing::Level;

/// How log events are filtered and written.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// `EnvFilter` directives, e.g. `warn,pool_query=debug`.
    pub env_filter: String,
    /// Events at or above this level go to stderr, the rest to stdout.
    /// Defaults to `ERROR`.
    pub stderr_threshold: Option<Level>,
    pub use_json_format: bool,
}

impl Config {
    pub fn new(env_filter: &str, stderr_threshold: Option<Level>, use_json_format: bool) -> Self {
        Self {
            env_filter: env_filter.to_owned(),
            stderr_threshold,
            use_json_format,
        }
    }

    /// Plain text logs filtered by `env_filter`.
    pub fn with_filter(env_filter: &str) -> Self {
        Self::new(env_filter, None, false)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::with_filter("info")
    }
}
