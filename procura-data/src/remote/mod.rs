//! Remote source of procurement records.
//!
//! [`RemoteSource`] is synchronous so the ingestion loops stay plain blocking
//! code; [`HttpRemoteSource`] bridges to an async HTTP client internally.

mod http;

use std::io;

use procura_core::{ExternalId, RawRecord, ResourceKind};
use serde::Deserialize;
use thiserror::Error;

pub use http::{
    DEFAULT_BASE_URL, DEFAULT_USER_AGENT, HttpRemoteConfig, HttpRemoteSource, RemoteBuildError,
};

/// Transport-level errors encountered while talking to the remote source.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TransportError {
    /// The server returned an HTTP error status.
    #[error("request to {url} failed with status {status}: {message}")]
    Http {
        /// Fully qualified request URL.
        url: String,
        /// HTTP status code.
        status: u16,
        /// Short error description.
        message: String,
    },
    /// The request failed before a response was received.
    #[error("network error contacting {url}: {source}")]
    Network {
        /// Fully qualified request URL.
        url: String,
        /// I/O error reported by the transport.
        source: io::Error,
    },
    /// The response body was not the expected JSON shape.
    #[error("failed to decode response from {url}: {source}")]
    Decode {
        /// Fully qualified request URL.
        url: String,
        /// Decoder failure.
        source: simd_json::Error,
    },
}

/// Reference vocabularies published by the remote source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Vocabulary {
    /// Contract types.
    ContractTypes,
    /// Contracting procedure types.
    ProcedureTypes,
    /// Countries.
    Countries,
    /// Districts of the country with the given remote id.
    Districts {
        /// Remote id of the parent country.
        country: String,
    },
    /// Councils of the district with the given remote id.
    Councils {
        /// Remote id of the parent district.
        district: String,
    },
}

impl Vocabulary {
    /// Path of the vocabulary relative to the remote base URL.
    #[must_use]
    pub const fn path(&self) -> &'static str {
        match self {
            Self::ContractTypes => "lista/tipocontratos",
            Self::ProcedureTypes => "lista/tipoprocedimentos",
            Self::Countries => "lista/paises",
            Self::Districts { .. } => "lista/distritos",
            Self::Councils { .. } => "lista/concelhos",
        }
    }

    /// Query parameter scoping the vocabulary to its parent, if any.
    #[must_use]
    pub fn query(&self) -> Option<(&'static str, &str)> {
        match self {
            Self::Districts { country } => Some(("pais", country.as_str())),
            Self::Councils { district } => Some(("distrito", district.as_str())),
            _ => None,
        }
    }
}

/// One `{id, description}` entry of a reference vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "WireVocabularyItem")]
pub struct VocabularyItem {
    /// Remote identifier, normalised to text.
    pub id: String,
    /// Display name, used as the local natural key.
    pub description: String,
}

impl VocabularyItem {
    /// Build an item from its parts.
    pub fn new(id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
        }
    }

    /// Whether this is the `"0"` entry meaning "all", which is never stored.
    #[must_use]
    pub fn is_sentinel(&self) -> bool {
        self.id == "0"
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WireId {
    Text(String),
    Number(i64),
}

#[derive(Deserialize)]
struct WireVocabularyItem {
    id: WireId,
    description: String,
}

impl From<WireVocabularyItem> for VocabularyItem {
    fn from(item: WireVocabularyItem) -> Self {
        let id = match item.id {
            WireId::Text(text) => text,
            WireId::Number(number) => number.to_string(),
        };
        Self {
            id,
            description: item.description,
        }
    }
}

/// Source of list blocks, item details and reference vocabularies.
pub trait RemoteSource {
    /// Fetch block `block` of `kind`.
    ///
    /// An empty vector is the end-of-data signal, not an error.
    fn fetch_block(&self, kind: ResourceKind, block: u64) -> Result<Vec<RawRecord>, TransportError>;

    /// Fetch the detail record `id` of `kind`.
    fn fetch_item(&self, kind: ResourceKind, id: ExternalId) -> Result<RawRecord, TransportError>;

    /// Fetch every entry of `vocabulary`, including the sentinel.
    fn fetch_vocabulary(
        &self,
        vocabulary: &Vocabulary,
    ) -> Result<Vec<VocabularyItem>, TransportError>;
}

impl<S> RemoteSource for &S
where
    S: RemoteSource + ?Sized,
{
    fn fetch_block(&self, kind: ResourceKind, block: u64) -> Result<Vec<RawRecord>, TransportError> {
        (**self).fetch_block(kind, block)
    }

    fn fetch_item(&self, kind: ResourceKind, id: ExternalId) -> Result<RawRecord, TransportError> {
        (**self).fetch_item(kind, id)
    }

    fn fetch_vocabulary(
        &self,
        vocabulary: &Vocabulary,
    ) -> Result<Vec<VocabularyItem>, TransportError> {
        (**self).fetch_vocabulary(vocabulary)
    }
}
