use std::path::PathBuf;

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8000/api";

/// Where the client finds its services and keeps its files
#[derive(Clone, Debug, PartialEq)]
pub struct ClientConfig {
    /// API root, without a trailing slash
    pub api_base: String,
    /// Directory that downloaded reports are written to
    pub download_dir: PathBuf,
    /// File holding the token between runs; `None` keeps it in memory only
    pub token_file: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            api_base: DEFAULT_API_URL.to_string(),
            download_dir: PathBuf::from("."),
            token_file: None,
        }
    }
}

impl ClientConfig {
    /// Read `EQUIPVIS_API_URL`, `EQUIPVIS_DOWNLOAD_DIR` and `EQUIPVIS_TOKEN_FILE`
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset or blank keys keep their defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = ClientConfig::default();

        ClientConfig {
            api_base: get("EQUIPVIS_API_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.api_base),
            download_dir: get("EQUIPVIS_DOWNLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.download_dir),
            token_file: get("EQUIPVIS_TOKEN_FILE").map(PathBuf::from),
        }
    }
}
