use serde::{Deserialize, Serialize};

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub matching: MatchingConfig,
    /// Optional path to a JSON lexicon file (token_map + stopwords) for the
    /// search-key normalizer.
    pub lexicon_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

/// Ranking policy knobs for the offer matching engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchingConfig {
    /// Candidates scoring below this are dropped (callers may override per call).
    pub similarity_floor: f32,
    /// Cap on candidates examined per supplier when rebuilding alternatives.
    pub per_supplier_limit: i64,
    /// Default result size for candidate listings.
    pub candidate_limit: i64,
    /// A requirement must normalize to at least this many tokens before it
    /// is allowed to match anything.
    pub min_search_tokens: usize,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            similarity_floor: 0.20,
            per_supplier_limit: 5,
            candidate_limit: 25,
            min_search_tokens: 2,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
            },
            database: DatabaseConfig {
                url: std::env::var("DATABASE_URL")
                    .unwrap_or_else(|_| "postgres://localhost/smartproc".to_string()),
            },
            matching: MatchingConfig::default(),
            lexicon_path: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let defaults = MatchingConfig::default();
        Self {
            server: ServerConfig {
                host: std::env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
                port: std::env::var("SERVER_PORT")
                    .ok()
                    .and_then(|p| p.parse().ok())
                    .unwrap_or(8080),
            },
            database: DatabaseConfig {
                url: std::env::var("DATABASE_URL")
                    .unwrap_or_else(|_| "postgres://localhost/smartproc".to_string()),
            },
            matching: MatchingConfig {
                similarity_floor: std::env::var("SIMILARITY_FLOOR")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(defaults.similarity_floor),
                per_supplier_limit: std::env::var("PER_SUPPLIER_LIMIT")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(defaults.per_supplier_limit),
                candidate_limit: std::env::var("CANDIDATE_LIMIT")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(defaults.candidate_limit),
                min_search_tokens: std::env::var("MIN_SEARCH_TOKENS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(defaults.min_search_tokens),
            },
            lexicon_path: std::env::var("LEXICON_PATH").ok(),
        }
    }
}
