use std::time::Duration;

use config::{Config, Environment};
use reqwest::Url;
use serde::Deserialize;

use crate::error::{HarvestError, Result};

const DEFAULT_DATABASE: &str = "data/tbca.sqlite";
const DEFAULT_LIST_URL: &str = "https://www.tbca.net.br/base-dados/composicao_estatistica.php";
const DEFAULT_DETAIL_URL: &str =
    "https://www.tbca.net.br/base-dados/int_composicao_estatistica.php";
const DETAIL_CODE_PARAM: &str = "cod_produto";

/// Raw settings: built-in defaults overlaid with `TBCA_*` environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub database: Option<String>,
    pub list_url: String,
    pub detail_url: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub backoff_ms: u64,
}

impl Settings {
    pub fn load() -> Result<Self> {
        Self::from_config(Config::builder().add_source(
            Environment::with_prefix("TBCA").try_parsing(true),
        ))
    }

    fn from_config(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self> {
        builder
            .set_default("database", DEFAULT_DATABASE)
            .and_then(|b| b.set_default("list_url", DEFAULT_LIST_URL))
            .and_then(|b| b.set_default("detail_url", DEFAULT_DETAIL_URL))
            .and_then(|b| b.set_default("timeout_secs", 30_i64))
            .and_then(|b| b.set_default("max_retries", 3_i64))
            .and_then(|b| b.set_default("backoff_ms", 2000_i64))
            .and_then(|b| b.build())
            .and_then(|c| c.try_deserialize())
            .map_err(|e| HarvestError::InvalidArgument(format!("settings: {e}")))
    }

    pub fn database_config(&self) -> Result<DatabaseConfig> {
        DatabaseConfig::from_setting(self.database.as_deref())
    }

    pub fn source_config(&self) -> Result<SourceConfig> {
        SourceConfig::new(&self.list_url, &self.detail_url)
    }

    pub fn http_settings(&self) -> HttpSettings {
        HttpSettings {
            timeout: Duration::from_secs(self.timeout_secs),
            max_retries: self.max_retries,
            backoff: Duration::from_millis(self.backoff_ms),
        }
    }
}

// ── Database ──

/// Where the SQLite store lives: a file path, `:memory:`, or a `file:` URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    connection: String,
}

impl DatabaseConfig {
    /// Rejects an empty value before anything touches the disk.
    pub fn new(connection: &str) -> Result<Self> {
        if connection.is_empty() {
            return Err(empty_connection());
        }
        Ok(DatabaseConfig {
            connection: connection.to_string(),
        })
    }

    pub fn from_setting(connection: Option<&str>) -> Result<Self> {
        connection.map_or_else(|| Err(empty_connection()), Self::new)
    }

    pub fn connection(&self) -> &str {
        &self.connection
    }
}

fn empty_connection() -> HarvestError {
    HarvestError::InvalidArgument("database connection string cannot be empty".into())
}

// ── Source ──

#[derive(Debug, Clone)]
pub struct SourceConfig {
    list_url: Url,
    detail_url: Url,
}

impl SourceConfig {
    pub fn new(list_url: &str, detail_url: &str) -> Result<Self> {
        Ok(SourceConfig {
            list_url: parse_http_url(list_url)?,
            detail_url: parse_http_url(detail_url)?,
        })
    }

    pub fn list_url(&self) -> &str {
        self.list_url.as_str()
    }

    /// Detail page of one food: `<detail_url>?cod_produto=<code>`.
    pub fn detail_url_for(&self, code: &str) -> String {
        let mut url = self.detail_url.clone();
        url.query_pairs_mut().append_pair(DETAIL_CODE_PARAM, code);
        url.into()
    }
}

fn parse_http_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw)
        .map_err(|e| HarvestError::InvalidArgument(format!("source url '{raw}': {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(HarvestError::InvalidArgument(format!(
            "source url '{raw}': unsupported scheme {other}"
        ))),
    }
}

// ── HTTP ──

#[derive(Debug, Clone, Copy)]
pub struct HttpSettings {
    pub timeout: Duration,
    pub max_retries: u32,
    pub backoff: Duration,
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn database_config_rejects_empty_and_missing() {
        assert!(matches!(
            DatabaseConfig::new(""),
            Err(HarvestError::InvalidArgument(_))
        ));
        assert!(matches!(
            DatabaseConfig::from_setting(None),
            Err(HarvestError::InvalidArgument(_))
        ));
    }

    #[test]
    fn database_config_keeps_value() {
        let c = DatabaseConfig::new("data/test.sqlite").unwrap();
        assert_eq!(c.connection(), "data/test.sqlite");
    }

    #[test]
    fn defaults_without_environment() {
        let s = Settings::from_config(Config::builder()).unwrap();
        assert_eq!(s.database.as_deref(), Some(DEFAULT_DATABASE));
        assert_eq!(s.list_url, DEFAULT_LIST_URL);
        assert_eq!(s.max_retries, 3);
        assert_eq!(s.http_settings().timeout, Duration::from_secs(30));
        assert_eq!(s.http_settings().backoff, Duration::from_millis(2000));
    }

    #[test]
    fn overrides_replace_defaults() {
        let builder = Config::builder()
            .set_override("list_url", "http://localhost:8080/lista.php")
            .unwrap()
            .set_override("max_retries", 0_i64)
            .unwrap();
        let s = Settings::from_config(builder).unwrap();
        assert_eq!(s.list_url, "http://localhost:8080/lista.php");
        assert_eq!(s.max_retries, 0);
        assert_eq!(s.detail_url, DEFAULT_DETAIL_URL);
    }

    #[test]
    fn source_urls_must_be_http() {
        assert!(SourceConfig::new("not a url", DEFAULT_DETAIL_URL).is_err());
        assert!(SourceConfig::new("ftp://example.org/x", DEFAULT_DETAIL_URL).is_err());
        assert!(SourceConfig::new(DEFAULT_LIST_URL, DEFAULT_DETAIL_URL).is_ok());
    }

    #[test]
    fn detail_url_carries_code() {
        let s = SourceConfig::new(DEFAULT_LIST_URL, DEFAULT_DETAIL_URL).unwrap();
        assert_eq!(
            s.detail_url_for("BRC0001C"),
            "https://www.tbca.net.br/base-dados/int_composicao_estatistica.php?cod_produto=BRC0001C"
        );
        assert!(s.detail_url_for("A B").ends_with("cod_produto=A+B"));
    }
}
