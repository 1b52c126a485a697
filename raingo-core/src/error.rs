#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("lookup request failed for digest {digest}: {source}")]
    Transport {
        digest: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("lookup returned HTTP {status} for digest {digest}")]
    HttpStatus { digest: String, status: u16 },

    #[error("could not parse lookup response for digest {digest}: {reason}")]
    Parse { digest: String, reason: String },

    #[error("unknown hash type for digest {digest} ({len} characters)")]
    UnknownAlgorithm { digest: String, len: usize },

    #[error("no plaintext found for digest {digest}")]
    LookupMiss { digest: String },

    #[error("{store} store error: {reason}")]
    Store { store: String, reason: String },

    #[error("invalid value {value:?} for {key}")]
    Config { key: &'static str, value: String },

    #[error("invalid CSS selector {selector:?}: {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("failed to create HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("pipeline task failed: {0}")]
    Task(String),
}

impl Error {
    /// Wraps a backend failure with the name of the store it came from.
    pub fn store(store: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Error::Store { store: store.into(), reason: reason.to_string() }
    }

    pub fn is_store(&self) -> bool {
        matches!(self, Error::Store { .. })
    }

    /// True for failures of the external lookup itself (unreachable, bad status, bad body).
    pub fn is_lookup(&self) -> bool {
        matches!(self, Error::Transport { .. } | Error::HttpStatus { .. } | Error::Parse { .. })
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
