//! Paginated resource kinds exposed by the remote source.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Nominal number of records in one block.
pub const BLOCK_SIZE: u64 = 25;

/// List resources that the remote source paginates in fixed-size blocks.
///
/// The kind selects the remote collection, the cache namespace, and the
/// record shape handed to the normalizer.
///
/// # Examples
/// ```
/// use procura_core::ResourceKind;
///
/// assert_eq!(ResourceKind::Contracts.block_range(2), Some((50, 74)));
/// assert_eq!(ResourceKind::Entities.range_header(0).as_deref(), Some("items=0-24"));
/// assert_eq!(ResourceKind::Entities.block_range(u64::MAX), None);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    /// Contracting and contracted public entities.
    Entities,
    /// Public contracts.
    Contracts,
}

impl ResourceKind {
    /// Every kind, in ingestion order.
    pub const ALL: [Self; 2] = [Self::Entities, Self::Contracts];

    /// Collection path relative to the remote base URL.
    #[must_use]
    pub const fn path(self) -> &'static str {
        match self {
            Self::Entities => "entidades",
            Self::Contracts => "contratos",
        }
    }

    /// Directory name used to namespace cached pages of this kind.
    #[must_use]
    pub const fn cache_namespace(self) -> &'static str {
        match self {
            Self::Entities => "entities",
            Self::Contracts => "contracts",
        }
    }

    /// Inclusive item range covered by `block`.
    ///
    /// `None` when the range does not fit in a `u64` item index.
    #[must_use]
    pub const fn block_range(self, block: u64) -> Option<(u64, u64)> {
        let Some(start) = block.checked_mul(BLOCK_SIZE) else {
            return None;
        };
        match start.checked_add(BLOCK_SIZE - 1) {
            Some(end) => Some((start, end)),
            None => None,
        }
    }

    /// Whether `block` maps onto a representable item range.
    #[must_use]
    pub const fn is_addressable(self, block: u64) -> bool {
        self.block_range(block).is_some()
    }

    /// Value of the `Range` header requesting `block`, if it is addressable.
    #[must_use]
    pub fn range_header(self, block: u64) -> Option<String> {
        self.block_range(block)
            .map(|(start, end)| format!("items={start}-{end}"))
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.cache_namespace())
    }
}
