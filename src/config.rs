//! Runtime configuration.
//!
//! Defaults live here; `Config::from_env` overlays `TOOLSMITH_*` environment
//! variables and the CLI overrides what it exposes as flags.

use std::path::PathBuf;
use std::time::Duration;

use tracing::warn;

pub const HOST_URL_ENV: &str = "TOOLSMITH_HOST_URL";
pub const DATA_DIR_ENV: &str = "TOOLSMITH_DATA_DIR";
pub const WORKERS_ENV: &str = "TOOLSMITH_WORKERS";
pub const WORKER_TIMEOUT_ENV: &str = "TOOLSMITH_WORKER_TIMEOUT_MS";
pub const RESEARCH_DEADLINE_ENV: &str = "TOOLSMITH_RESEARCH_DEADLINE_MS";
pub const HTTP_TIMEOUT_ENV: &str = "TOOLSMITH_HTTP_TIMEOUT_MS";

/// Default host serving `/api/read-url` and `/api/duckduckgo-search`.
pub const DEFAULT_HOST_URL: &str = "http://127.0.0.1:3000";

/// Directory patterns that are never indexed or listed.
pub const DEFAULT_IGNORE_PATTERNS: &[&str] = &[
    ".git",
    "node_modules",
    "target",
    "dist",
    "build",
    ".next",
    ".cache",
    "__pycache__",
    ".venv",
    "venv",
    "coverage",
];

/// File extensions the indexer treats as text.
pub const DEFAULT_TEXT_EXTENSIONS: &[&str] = &[
    "rs", "js", "jsx", "mjs", "cjs", "ts", "tsx", "py", "go", "java", "kt", "c", "h", "cpp",
    "hpp", "cc", "cs", "rb", "php", "swift", "scala", "sh", "bash", "html", "htm", "css",
    "scss", "less", "vue", "svelte", "json", "yaml", "yml", "toml", "md", "txt", "sql", "xml",
];

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub capacity: usize,
    pub ttl: Duration,
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub workers: usize,
    pub request_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct EditConfig {
    /// Line edits on files larger than this go through the streaming path.
    pub streaming_threshold: u64,
    pub read_chunk_size: usize,
    pub write_chunk_size: usize,
    /// Chunks processed between cooperative yields.
    pub yield_every_chunks: usize,
    /// Full rewrites above this size log a warning but still proceed.
    pub large_rewrite_warning: usize,
    pub undo_capacity: usize,
}

#[derive(Debug, Clone)]
pub struct ResearchConfig {
    pub max_total_urls: usize,
    pub max_depth: u32,
    pub relevance_threshold: f64,
    pub max_queries: usize,
    pub max_gaps: usize,
    pub deadline: Duration,
}

#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub host_url: String,
    pub timeout: Duration,
    pub read_url_attempts: usize,
    pub search_attempts: usize,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: Option<PathBuf>,
    pub ignore_patterns: Vec<String>,
    pub text_extensions: Vec<String>,
    pub cache: CacheConfig,
    pub workers: WorkerConfig,
    pub edit: EditConfig,
    pub research: ResearchConfig,
    pub http: HttpConfig,
    /// Default per-call budget for tool handlers.
    pub tool_timeout: Duration,
    /// Calls slower than this log a warning.
    pub slow_call_threshold: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: None,
            ignore_patterns: DEFAULT_IGNORE_PATTERNS.iter().map(|s| s.to_string()).collect(),
            text_extensions: DEFAULT_TEXT_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            cache: CacheConfig {
                capacity: 100,
                ttl: Duration::from_secs(30),
            },
            workers: WorkerConfig {
                workers: 2,
                request_timeout: Duration::from_secs(30),
            },
            edit: EditConfig {
                streaming_threshold: 500 * 1024,
                read_chunk_size: 1024 * 1024,
                write_chunk_size: 100 * 1024,
                yield_every_chunks: 4,
                large_rewrite_warning: 1024 * 1024,
                undo_capacity: 50,
            },
            research: ResearchConfig {
                max_total_urls: 10,
                max_depth: 2,
                relevance_threshold: 0.3,
                max_queries: 5,
                max_gaps: 3,
                deadline: Duration::from_millis(45_000),
            },
            http: HttpConfig {
                host_url: DEFAULT_HOST_URL.to_string(),
                timeout: Duration::from_millis(12_000),
                read_url_attempts: 3,
                search_attempts: 2,
            },
            tool_timeout: Duration::from_secs(30),
            slow_call_threshold: Duration::from_secs(5),
        }
    }
}

impl Config {
    /// Defaults overlaid with `TOOLSMITH_*` environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(url) = std::env::var(HOST_URL_ENV) {
            if !url.trim().is_empty() {
                config.http.host_url = url.trim().to_string();
            }
        }
        if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
            if !dir.trim().is_empty() {
                config.data_dir = Some(PathBuf::from(dir.trim()));
            }
        }
        if let Some(workers) = env_number(WORKERS_ENV) {
            config.workers.workers = (workers as usize).max(1);
        }
        if let Some(ms) = env_number(WORKER_TIMEOUT_ENV) {
            config.workers.request_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = env_number(RESEARCH_DEADLINE_ENV) {
            config.research.deadline = Duration::from_millis(ms);
        }
        if let Some(ms) = env_number(HTTP_TIMEOUT_ENV) {
            config.http.timeout = Duration::from_millis(ms);
        }

        config
    }

    /// Directory holding per-workspace persisted state.
    pub fn resolve_data_dir(&self) -> Option<PathBuf> {
        self.data_dir
            .clone()
            .or_else(|| dirs::home_dir().map(|home| home.join(".toolsmith")))
    }

    pub fn is_text_extension(&self, ext: &str) -> bool {
        let ext = ext.to_ascii_lowercase();
        self.text_extensions.iter().any(|e| *e == ext)
    }
}

fn env_number(name: &str) -> Option<u64> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse::<u64>() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Ignoring {}: '{}' is not a number", name, raw);
            None
        }
    }
}
