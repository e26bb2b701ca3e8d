use std::time::Duration;

use tracing::{debug, warn};

use crate::config::HttpSettings;
use crate::error::{HarvestError, Result};

const USER_AGENT: &str = concat!("tbca_harvest/", env!("CARGO_PKG_VERSION"));
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const META_SNIFF_BYTES: usize = 1024;

/// Anything that can hand back the HTML of a page.
pub trait PageSource {
    async fn fetch(&self, url: &str) -> Result<String>;
}

/// reqwest-backed source with a per-request timeout and bounded retry.
pub struct HttpSource {
    client: reqwest::Client,
    max_retries: u32,
    backoff: Duration,
}

struct FetchFailure {
    retryable: bool,
    reason: String,
}

impl HttpSource {
    pub fn new(settings: &HttpSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(settings.timeout)
            .connect_timeout(CONNECT_TIMEOUT.min(settings.timeout))
            .build()
            .map_err(|e| HarvestError::InvalidArgument(format!("http client: {e}")))?;
        Ok(HttpSource {
            client,
            max_retries: settings.max_retries,
            backoff: settings.backoff,
        })
    }

    async fn fetch_once(&self, url: &str) -> std::result::Result<String, FetchFailure> {
        let response = self.client.get(url).send().await.map_err(|e| FetchFailure {
            retryable: e.is_timeout() || e.is_connect(),
            reason: e.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchFailure {
                retryable: is_retryable_status(status.as_u16()),
                reason: format!("HTTP {}", status),
            });
        }

        let header_charset = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(charset_label)
            .map(str::to_string);

        let body = response.bytes().await.map_err(|e| FetchFailure {
            retryable: e.is_timeout(),
            reason: e.to_string(),
        })?;

        decode_body(&body, header_charset.as_deref()).map_err(|reason| FetchFailure {
            retryable: false,
            reason,
        })
    }
}

impl PageSource for HttpSource {
    async fn fetch(&self, url: &str) -> Result<String> {
        let mut attempt = 0;
        loop {
            match self.fetch_once(url).await {
                Ok(body) => {
                    debug!(url, bytes = body.len(), "fetched page");
                    return Ok(body);
                }
                Err(f) if f.retryable && attempt < self.max_retries => {
                    let backoff = self.backoff.saturating_mul(2u32.saturating_pow(attempt));
                    warn!(
                        "Fetch of {} failed ({}) (attempt {}/{}), backing off {:.1}s",
                        url,
                        f.reason,
                        attempt + 1,
                        self.max_retries,
                        backoff.as_secs_f64()
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(f) => return Err(HarvestError::source_unavailable(url, f.reason)),
            }
        }
    }
}

/// Decode with the charset from the `Content-Type` header, else the one
/// declared in a `<meta>` tag near the top of the page, else strict UTF-8.
/// Bytes that do not fit the charset are an error, never replaced.
fn decode_body(body: &[u8], header_charset: Option<&str>) -> std::result::Result<String, String> {
    let head = &body[..body.len().min(META_SNIFF_BYTES)];
    let declared = header_charset
        .map(str::to_string)
        .or_else(|| charset_label(&String::from_utf8_lossy(head)).map(str::to_string));

    match declared {
        Some(label) => {
            let encoding = encoding_rs::Encoding::for_label(label.as_bytes())
                .ok_or_else(|| format!("unknown charset {label}"))?;
            encoding
                .decode_without_bom_handling_and_without_replacement(body)
                .map(|text| text.into_owned())
                .ok_or_else(|| format!("body is not valid {}", encoding.name()))
        }
        None => String::from_utf8(body.to_vec()).map_err(|_| "body is not valid UTF-8".to_string()),
    }
}

/// Value of the first `charset=` in `s`, quotes stripped.
fn charset_label(s: &str) -> Option<&str> {
    let lower = s.to_ascii_lowercase();
    let start = lower.find("charset=")? + "charset=".len();
    let rest = s[start..].trim_start_matches(['"', '\'', ' ']);
    let end = rest
        .find(|c: char| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ':' | '.')))
        .unwrap_or(rest.len());
    Some(&rest[..end]).filter(|l| !l.is_empty())
}

/// Rate limiting and server-side errors are worth another try; other 4xx are not.
fn is_retryable_status(status: u16) -> bool {
    status == 429 || (500..600).contains(&status)
}

// ── Tests ──
