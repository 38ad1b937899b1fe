//! Filesystem-backed page cache.

use std::fmt;

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::fs_utf8::Dir;
use procura_core::{Block, ExternalId, RawRecord, ResourceKind};
use serde::{Serialize, de::DeserializeOwned};

use super::{CacheError, PageCache};

const BLOCKS_DIR: &str = "blocks";
const ITEMS_DIR: &str = "items";
const ENTRY_SUFFIX: &str = ".json";

/// Page cache persisted as JSON files under a root directory.
///
/// Layout: `<root>/<kind>/blocks/<index>.json` and
/// `<root>/<kind>/items/<id>.json`. Entries are written through a temporary
/// file and renamed, so an interrupted write never leaves a truncated entry.
pub struct FsPageCache {
    root: Dir,
    path: Utf8PathBuf,
}

impl fmt::Debug for FsPageCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FsPageCache")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl FsPageCache {
    /// Open the cache rooted at `path`, creating the directory if needed.
    pub fn open(path: impl AsRef<Utf8Path>) -> Result<Self, CacheError> {
        let path = path.as_ref();
        let root = procura_fs::ensure_dir(path).map_err(|source| CacheError::Io {
            operation: "open cache directory",
            path: path.to_string(),
            source,
        })?;
        Ok(Self {
            root,
            path: path.to_path_buf(),
        })
    }

    /// Root directory of the cache.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    fn section(
        &self,
        kind: ResourceKind,
        section: &'static str,
        create: bool,
    ) -> Result<Option<Dir>, CacheError> {
        let relative = format!("{}/{section}", kind.cache_namespace());
        let opened = if create {
            procura_fs::ensure_subdir(&self.root, &relative).map(Some)
        } else {
            procura_fs::open_subdir(&self.root, &relative)
        };
        opened.map_err(|source| CacheError::Io {
            operation: "open cache section",
            path: relative,
            source,
        })
    }

    fn read_entry<T>(
        &self,
        kind: ResourceKind,
        section: &'static str,
        key: &str,
    ) -> Result<Option<T>, CacheError>
    where
        T: DeserializeOwned,
    {
        let Some(dir) = self.section(kind, section, false)? else {
            return Ok(None);
        };
        let name = format!("{key}{ENTRY_SUFFIX}");
        let stored = procura_fs::read_optional(&dir, &name).map_err(|source| CacheError::Io {
            operation: "read cache entry",
            path: entry_path(kind, section, &name),
            source,
        })?;
        let Some(contents) = stored else {
            return Ok(None);
        };
        match serde_json::from_slice(&contents) {
            Ok(value) => Ok(Some(value)),
            Err(err) => {
                log::warn!(
                    "ignoring corrupt cache entry {}: {err}",
                    entry_path(kind, section, &name)
                );
                Ok(None)
            }
        }
    }

    fn write_entry<T>(
        &self,
        kind: ResourceKind,
        section: &'static str,
        key: &str,
        value: &T,
    ) -> Result<(), CacheError>
    where
        T: Serialize + ?Sized,
    {
        let name = format!("{key}{ENTRY_SUFFIX}");
        let bytes = serde_json::to_vec(value).map_err(|source| CacheError::Encode {
            path: entry_path(kind, section, &name),
            source,
        })?;
        let Some(dir) = self.section(kind, section, true)? else {
            return Ok(());
        };
        procura_fs::write_atomically(&dir, &name, &bytes).map_err(|source| CacheError::Io {
            operation: "write cache entry",
            path: entry_path(kind, section, &name),
            source,
        })
    }
}

fn entry_path(kind: ResourceKind, section: &str, name: &str) -> String {
    format!("{}/{section}/{name}", kind.cache_namespace())
}

impl PageCache for FsPageCache {
    fn get_block(&self, kind: ResourceKind, block: u64) -> Result<Option<Block>, CacheError> {
        self.read_entry(kind, BLOCKS_DIR, &block.to_string())
    }

    fn put_block(&self, kind: ResourceKind, block: u64, records: &Block) -> Result<(), CacheError> {
        self.write_entry(kind, BLOCKS_DIR, &block.to_string(), records)
    }

    fn get_item(
        &self,
        kind: ResourceKind,
        id: ExternalId,
    ) -> Result<Option<RawRecord>, CacheError> {
        self.read_entry(kind, ITEMS_DIR, &id.to_string())
    }

    fn put_item(
        &self,
        kind: ResourceKind,
        id: ExternalId,
        record: &RawRecord,
    ) -> Result<(), CacheError> {
        self.write_entry(kind, ITEMS_DIR, &id.to_string(), record)
    }

    fn block_indices(&self, kind: ResourceKind) -> Result<Vec<u64>, CacheError> {
        let Some(dir) = self.section(kind, BLOCKS_DIR, false)? else {
            return Ok(Vec::new());
        };
        let names = procura_fs::file_names(&dir).map_err(|source| CacheError::Io {
            operation: "list cached blocks",
            path: format!("{}/{BLOCKS_DIR}", kind.cache_namespace()),
            source,
        })?;
        Ok(names
            .iter()
            .filter_map(|name| name.strip_suffix(ENTRY_SUFFIX))
            .filter_map(|stem| stem.parse().ok())
            .collect())
    }
}
