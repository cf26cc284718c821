//! Environment-based configuration.
//!
//! Every binary loads `.env` first (see `dotenvy` in the binaries) and then
//! calls [`Config::from_env`]. Options needed only by the RAG pipeline or the
//! ingestion script are validated lazily through [`Config::pinecone`] and
//! [`Config::openai`], so the BFF can run in `remote` chat mode without any
//! vector database credentials.

use std::str::FromStr;
use std::time::Duration;

use strum::{Display, EnumString};

/// Deployment flavour. `Production` turns on `Secure` cookies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum AppEnv {
    #[default]
    Local,
    Production,
}

/// Where `/api/chat` gets its answers from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum ChatBackend {
    /// Run the retrieval-augmented chain inside this process.
    #[default]
    Local,
    /// Forward the question to the external API server.
    Remote,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct PineconeConfig {
    pub api_key: String,
    /// Legacy pod environment label. Only logged.
    pub environment: Option<String>,
    pub index_name: String,
    pub namespace: String,
    /// Milliseconds to wait after creating a missing index.
    pub index_init_timeout_ms: u64,
}

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub embedding_model: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub app_env: AppEnv,
    /// Base URL of the external API server, without the `/api` suffix.
    pub api_endpoint: String,
    pub bind_addr: String,
    pub session_secret: Option<String>,
    pub chat_backend: ChatBackend,
    pub retriever_top_k: usize,
    pub upload_timeout: Duration,
    /// Ceiling on the bytes buffered for one upload request.
    pub max_upload_bytes: usize,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub pdf_path: Option<String>,
    pinecone: Option<PineconeConfig>,
    openai: Option<OpenAiConfig>,
    missing: Vec<&'static str>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app_env: AppEnv::Local,
            api_endpoint: "http://localhost:3000".to_string(),
            bind_addr: "127.0.0.1:8080".to_string(),
            session_secret: None,
            chat_backend: ChatBackend::Local,
            retriever_top_k: 4,
            upload_timeout: Duration::from_secs(60),
            max_upload_bytes: 10 * 1024 * 1024,
            chunk_size: 1000,
            chunk_overlap: 200,
            pdf_path: None,
            pinecone: None,
            openai: None,
            missing: Vec::new(),
        }
    }
}

impl Config {
    /// Reads the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when a variable is present but cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when a variable is present but cannot be parsed.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut config = Self::default();

        if let Some(env) = get("APP_ENV") {
            config.app_env = parse("APP_ENV", &env)?;
        }
        if let Some(url) = get("API_ENDPOINT") {
            config.api_endpoint = url.trim_end_matches('/').to_string();
        }
        if let Some(addr) = get("BIND_ADDR") {
            config.bind_addr = addr;
        }
        config.session_secret = get("SESSION_SECRET");
        if let Some(backend) = get("CHAT_BACKEND") {
            config.chat_backend = parse("CHAT_BACKEND", &backend)?;
        }
        if let Some(k) = get("RETRIEVER_TOP_K") {
            config.retriever_top_k = parse("RETRIEVER_TOP_K", &k)?;
        }
        if let Some(secs) = get("UPLOAD_TIMEOUT_SECS") {
            config.upload_timeout = Duration::from_secs(parse("UPLOAD_TIMEOUT_SECS", &secs)?);
        }
        if let Some(bytes) = get("MAX_UPLOAD_BYTES") {
            config.max_upload_bytes = parse("MAX_UPLOAD_BYTES", &bytes)?;
        }
        if let Some(size) = get("CHUNK_SIZE") {
            config.chunk_size = parse("CHUNK_SIZE", &size)?;
        }
        if let Some(overlap) = get("CHUNK_OVERLAP") {
            config.chunk_overlap = parse("CHUNK_OVERLAP", &overlap)?;
        }
        config.pdf_path = get("PDF_PATH");

        let index_init_timeout_ms = match get("INDEX_INIT_TIMEOUT") {
            Some(ms) => parse("INDEX_INIT_TIMEOUT", &ms)?,
            None => 240_000,
        };

        match (get("PINECONE_API_KEY"), get("PINECONE_INDEX_NAME")) {
            (Some(api_key), Some(index_name)) => {
                config.pinecone = Some(PineconeConfig {
                    api_key,
                    environment: get("PINECONE_ENVIRONMENT"),
                    index_name,
                    namespace: get("PINECONE_NAME_SPACE").unwrap_or_default(),
                    index_init_timeout_ms,
                });
            }
            (None, _) => config.missing.push("PINECONE_API_KEY"),
            (_, None) => config.missing.push("PINECONE_INDEX_NAME"),
        }

        match get("OPENAI_API_KEY") {
            Some(api_key) => {
                config.openai = Some(OpenAiConfig {
                    api_key,
                    model: get("OPENAI_MODEL").unwrap_or_else(|| "gpt-4o-mini".to_string()),
                    base_url: get("OPENAI_BASE_URL")
                        .unwrap_or_else(|| "https://api.openai.com".to_string())
                        .trim_end_matches('/')
                        .to_string(),
                    embedding_model: get("EMBEDDING_MODEL").unwrap_or_else(|| "text-embedding-ada-002".to_string()),
                });
            }
            None => config.missing.push("OPENAI_API_KEY"),
        }

        Ok(config)
    }

    /// Base URL for the external API routes (`<API_ENDPOINT>/api`).
    #[must_use]
    pub fn api_base(&self) -> String {
        format!("{}/api", self.api_endpoint)
    }

    #[must_use]
    pub fn secure_cookies(&self) -> bool {
        self.app_env == AppEnv::Production
    }

    /// Vector database settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] naming the first absent variable.
    pub fn pinecone(&self) -> Result<&PineconeConfig, ConfigError> {
        self.pinecone.as_ref().ok_or_else(|| self.first_missing("PINECONE_"))
    }

    /// Model API settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] when `OPENAI_API_KEY` is absent.
    pub fn openai(&self) -> Result<&OpenAiConfig, ConfigError> {
        self.openai.as_ref().ok_or_else(|| self.first_missing("OPENAI_"))
    }

    fn first_missing(
        &self,
        prefix: &str,
    ) -> ConfigError {
        let name = self
            .missing
            .iter()
            .find(|name| name.starts_with(prefix))
            .copied()
            .unwrap_or(if prefix == "OPENAI_" { "OPENAI_API_KEY" } else { "PINECONE_API_KEY" });
        ConfigError::Missing(name)
    }
}

fn parse<T: FromStr>(
    name: &'static str,
    value: &str,
) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::Invalid {
        name,
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.app_env, AppEnv::Local);
        assert_eq!(config.api_base(), "http://localhost:3000/api");
        assert_eq!(config.chat_backend, ChatBackend::Local);
        assert_eq!(config.retriever_top_k, 4);
        assert_eq!(config.upload_timeout, Duration::from_secs(60));
        assert_eq!(config.max_upload_bytes, 10 * 1024 * 1024);
        assert_eq!((config.chunk_size, config.chunk_overlap), (1000, 200));
        assert!(!config.secure_cookies());
    }

    #[test]
    fn test_missing_credentials_are_reported_lazily() {
        let config = config_from(&[("PINECONE_API_KEY", "pk")]).unwrap();
        assert_eq!(config.pinecone().unwrap_err(), ConfigError::Missing("PINECONE_INDEX_NAME"));
        assert_eq!(config.openai().unwrap_err(), ConfigError::Missing("OPENAI_API_KEY"));
    }

    #[test]
    fn test_full_configuration() {
        let config = config_from(&[
            ("APP_ENV", "production"),
            ("API_ENDPOINT", "https://api.example.com/"),
            ("CHAT_BACKEND", "remote"),
            ("PINECONE_API_KEY", "pk"),
            ("PINECONE_INDEX_NAME", "docs"),
            ("PINECONE_NAME_SPACE", "resume"),
            ("INDEX_INIT_TIMEOUT", "1000"),
            ("OPENAI_API_KEY", "sk"),
            ("OPENAI_MODEL", "gpt-4o"),
            ("MAX_UPLOAD_BYTES", "2048"),
            ("CHUNK_SIZE", "500"),
            ("CHUNK_OVERLAP", "50"),
        ])
        .unwrap();

        assert_eq!(config.max_upload_bytes, 2048);
        assert_eq!((config.chunk_size, config.chunk_overlap), (500, 50));

        assert!(config.secure_cookies());
        assert_eq!(config.api_base(), "https://api.example.com/api");
        assert_eq!(config.chat_backend, ChatBackend::Remote);

        let pinecone = config.pinecone().unwrap();
        assert_eq!(pinecone.index_name, "docs");
        assert_eq!(pinecone.namespace, "resume");
        assert_eq!(pinecone.index_init_timeout_ms, 1000);

        let openai = config.openai().unwrap();
        assert_eq!(openai.model, "gpt-4o");
        assert_eq!(openai.embedding_model, "text-embedding-ada-002");
    }

    #[test]
    fn test_invalid_enum_value() {
        let err = config_from(&[("APP_ENV", "staging")]).unwrap_err();
        assert_eq!(
            err,
            ConfigError::Invalid {
                name: "APP_ENV",
                value: "staging".to_string()
            }
        );
    }

    #[test]
    fn test_invalid_number() {
        assert!(config_from(&[("RETRIEVER_TOP_K", "many")]).is_err());
    }
}
