//! HTTP implementation of [`RemoteSource`].
//!
//! List resources are paginated with an `items=<start>-<end>` `Range`
//! header covering one block. The [`RemoteSource`] trait is synchronous; this
//! implementation blocks on an internally owned Tokio runtime, following the
//! same runtime detection as the rest of the workspace's HTTP adapters.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use procura_core::ResourceKind;
//! use procura_data::{HttpRemoteConfig, HttpRemoteSource, RemoteSource};
//!
//! let config = HttpRemoteConfig::default()
//!     .with_timeout(Duration::from_secs(60))
//!     .with_user_agent("procura-mirror/1.0");
//! let source = HttpRemoteSource::with_config(config)?;
//! let first = source.fetch_block(ResourceKind::Entities, 0)?;
//! println!("fetched {} entities", first.len());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::{future::Future, io, time::Duration};

use procura_core::{ExternalId, RawRecord, ResourceKind};
use reqwest::{Client, StatusCode, header::RANGE};
use serde::{Deserialize, de::DeserializeOwned};
use thiserror::Error;
use tokio::runtime::{Handle, Runtime, RuntimeFlavor};
use url::Url;

use super::{RemoteSource, TransportError, Vocabulary, VocabularyItem};

/// Base URL of the public procurement portal's REST interface.
pub const DEFAULT_BASE_URL: &str = "http://www.base.gov.pt/base2/rest";

/// Default user agent for remote requests.
pub const DEFAULT_USER_AGENT: &str = "procura/0.1";

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Error raised when an [`HttpRemoteSource`] cannot be constructed.
#[derive(Debug, Error)]
pub enum RemoteBuildError {
    /// The configured base URL did not parse.
    #[error("invalid base URL {url:?}")]
    InvalidBaseUrl {
        /// Rejected URL text.
        url: String,
        /// Parser failure.
        #[source]
        source: url::ParseError,
    },
    /// Failed to build the HTTP client.
    #[error("failed to build HTTP client")]
    HttpClient(#[source] reqwest::Error),
    /// Failed to build the Tokio runtime.
    #[error("failed to build Tokio runtime")]
    Runtime(#[source] io::Error),
}

/// Configuration for [`HttpRemoteSource`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRemoteConfig {
    /// Base URL the resource paths are resolved against.
    pub base_url: String,
    /// Connect and request timeout.
    pub timeout: Duration,
    /// User agent sent with every request.
    pub user_agent: String,
}

impl Default for HttpRemoteConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_owned(),
        }
    }
}

impl HttpRemoteConfig {
    /// Create a configuration for the given base URL.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Set the request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the user agent string.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

/// HTTP-backed remote source.
///
/// When called from inside a multi-threaded Tokio runtime the request runs on
/// that runtime via [`tokio::task::block_in_place`]; otherwise the source's
/// own current-thread runtime drives it.
pub struct HttpRemoteSource {
    client: Client,
    base_url: Url,
    timeout: Duration,
    runtime: Runtime,
}

impl std::fmt::Debug for HttpRemoteSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpRemoteSource")
            .field("base_url", &self.base_url.as_str())
            .field("timeout", &self.timeout)
            .field("runtime", &"<tokio::runtime::Runtime>")
            .finish_non_exhaustive()
    }
}

#[derive(Deserialize)]
struct VocabularyPage {
    items: Vec<VocabularyItem>,
}

impl HttpRemoteSource {
    /// Create a source for `base_url` with default settings.
    pub fn new(base_url: impl Into<String>) -> Result<Self, RemoteBuildError> {
        Self::with_config(HttpRemoteConfig::new(base_url))
    }

    /// Create a source with explicit configuration.
    pub fn with_config(config: HttpRemoteConfig) -> Result<Self, RemoteBuildError> {
        let base_url = parse_base_url(&config.base_url)?;
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .connect_timeout(config.timeout)
            .timeout(config.timeout)
            .build()
            .map_err(RemoteBuildError::HttpClient)?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(RemoteBuildError::Runtime)?;
        Ok(Self {
            client,
            base_url,
            timeout: config.timeout,
            runtime,
        })
    }

    /// Base URL with a trailing slash, as resource paths are joined onto it.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn resource_url(&self, path: &str) -> Result<Url, TransportError> {
        self.base_url.join(path).map_err(|err| TransportError::Network {
            url: format!("{}{path}", self.base_url),
            source: io::Error::new(io::ErrorKind::InvalidInput, err),
        })
    }

    /// GET `url`, returning `None` when a ranged request is past the end.
    async fn get_bytes(
        &self,
        url: &Url,
        range: Option<String>,
    ) -> Result<Option<Vec<u8>>, TransportError> {
        let mut request = self.client.get(url.clone());
        if let Some(range) = range {
            request = request.header(RANGE, range);
        }
        let response = request
            .send()
            .await
            .map_err(|err| convert_reqwest_error(err, url.as_str()))?;
        if response.status() == StatusCode::RANGE_NOT_SATISFIABLE {
            return Ok(None);
        }
        let response = response
            .error_for_status()
            .map_err(|err| convert_reqwest_error(err, url.as_str()))?;
        let bytes = response
            .bytes()
            .await
            .map_err(|err| convert_reqwest_error(err, url.as_str()))?;
        Ok(Some(bytes.to_vec()))
    }

    fn block_on<F>(&self, future: F) -> F::Output
    where
        F: Future,
    {
        match Handle::try_current() {
            Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
                tokio::task::block_in_place(|| handle.block_on(future))
            }
            _ => self.runtime.block_on(future),
        }
    }
}

impl RemoteSource for HttpRemoteSource {
    fn fetch_block(&self, kind: ResourceKind, block: u64) -> Result<Vec<RawRecord>, TransportError> {
        let url = self.resource_url(kind.path())?;
        let Some(range) = kind.range_header(block) else {
            log::warn!("{kind} block {block} lies past the addressable item range");
            return Ok(Vec::new());
        };
        log::debug!("fetching {url} with range {range}");
        match self.block_on(self.get_bytes(&url, Some(range)))? {
            Some(mut bytes) => decode_records(&mut bytes, url.as_str()),
            None => Ok(Vec::new()),
        }
    }

    fn fetch_item(&self, kind: ResourceKind, id: ExternalId) -> Result<RawRecord, TransportError> {
        let url = self.resource_url(&format!("{}/{id}", kind.path()))?;
        log::debug!("fetching {url}");
        let mut bytes = self
            .block_on(self.get_bytes(&url, None))?
            .unwrap_or_default();
        decode(&mut bytes, url.as_str())
    }

    fn fetch_vocabulary(
        &self,
        vocabulary: &Vocabulary,
    ) -> Result<Vec<VocabularyItem>, TransportError> {
        let mut url = self.resource_url(vocabulary.path())?;
        if let Some((name, value)) = vocabulary.query() {
            url.query_pairs_mut().append_pair(name, value);
        }
        log::debug!("fetching {url}");
        let mut bytes = self
            .block_on(self.get_bytes(&url, None))?
            .unwrap_or_default();
        decode::<VocabularyPage>(&mut bytes, url.as_str()).map(|page| page.items)
    }
}

fn parse_base_url(raw: &str) -> Result<Url, RemoteBuildError> {
    let normalised = format!("{}/", raw.trim_end_matches('/'));
    Url::parse(&normalised).map_err(|source| RemoteBuildError::InvalidBaseUrl {
        url: raw.to_owned(),
        source,
    })
}

/// Decode a list response body into raw records.
///
/// An empty body is treated as an empty list.
fn decode_records(bytes: &mut [u8], url: &str) -> Result<Vec<RawRecord>, TransportError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }
    decode(bytes, url)
}

fn decode<T>(bytes: &mut [u8], url: &str) -> Result<T, TransportError>
where
    T: DeserializeOwned,
{
    simd_json::serde::from_slice(bytes).map_err(|source| TransportError::Decode {
        url: url.to_owned(),
        source,
    })
}

fn convert_reqwest_error(error: reqwest::Error, url: &str) -> TransportError {
    if let Some(status) = error.status() {
        return TransportError::Http {
            url: url.to_owned(),
            status: status.as_u16(),
            message: error.to_string(),
        };
    }

    let kind = if error.is_timeout() {
        io::ErrorKind::TimedOut
    } else {
        io::ErrorKind::Other
    };
    TransportError::Network {
        url: url.to_owned(),
        source: io::Error::new(kind, error),
    }
}
