use std::path::PathBuf;

/// Runtime configuration, read once from the environment at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Shared secret webhook callers must present. Required for `serve`.
    pub secret: Option<String>,
    pub bind_addr: String,
    /// Wall-clock bound on one background job, measured from task start.
    pub job_deadline_secs: u64,
    pub fetch_timeout_ms: u64,
    pub artifacts_dir: PathBuf,
    /// Explicit browser binary; autodetected when unset.
    pub chrome_executable: Option<String>,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            secret: std::env::var("QUIZ_SECRET").ok(),
            bind_addr: std::env::var("QUIZ_BIND").unwrap_or_else(|_| "0.0.0.0:3000".to_string()),
            job_deadline_secs: env_parse("QUIZ_DEADLINE_SECS", 170),
            fetch_timeout_ms: env_parse("QUIZ_FETCH_TIMEOUT_MS", 15_000),
            artifacts_dir: std::env::var("QUIZ_ARTIFACTS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("artifacts")),
            chrome_executable: std::env::var("QUIZ_CHROME").ok(),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
