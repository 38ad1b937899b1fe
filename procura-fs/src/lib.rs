//! Capability-based filesystem helpers built on `cap-std` and `camino`.
//!
//! Paths supplied by users are resolved once into a [`fs_utf8::Dir`]; every
//! later read or write goes through that directory handle.
#![forbid(unsafe_code)]

use std::{io, path::Component};

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8};

const TEMP_SUFFIX: &str = ".partial";

/// Create `path` (and any missing ancestors) and open it as a directory.
pub fn ensure_dir(path: &Utf8Path) -> io::Result<fs_utf8::Dir> {
    let (base, relative) = base_dir_and_relative(path)?;
    if relative.as_str().is_empty() {
        return Ok(base);
    }
    base.create_dir_all(&relative)?;
    base.open_dir(&relative)
}

/// Open the sub-directory `name` of `dir`, creating it when absent.
pub fn ensure_subdir(dir: &fs_utf8::Dir, name: &str) -> io::Result<fs_utf8::Dir> {
    dir.create_dir_all(name)?;
    dir.open_dir(name)
}

/// Open the sub-directory `name` of `dir`, or `None` when it does not exist.
pub fn open_subdir(dir: &fs_utf8::Dir, name: &str) -> io::Result<Option<fs_utf8::Dir>> {
    match dir.open_dir(name) {
        Ok(subdir) => Ok(Some(subdir)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err),
    }
}

/// Ensure the parent directory for `path` exists.
pub fn ensure_parent_dir(path: &Utf8Path) -> io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_str().is_empty() => ensure_dir(parent).map(|_| ()),
        _ => Ok(()),
    }
}

/// Read the raw bytes of `name` from `dir`, returning `None` when the file is absent.
pub fn read_optional(dir: &fs_utf8::Dir, name: &str) -> io::Result<Option<Vec<u8>>> {
    match dir.read(name) {
        Ok(contents) => Ok(Some(contents)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err),
    }
}

/// Write `contents` to `name` so readers never observe a partial file.
///
/// The bytes go to a sibling temporary file that is then renamed over `name`.
pub fn write_atomically(dir: &fs_utf8::Dir, name: &str, contents: &[u8]) -> io::Result<()> {
    let temporary = format!("{name}{TEMP_SUFFIX}");
    dir.write(&temporary, contents)?;
    dir.rename(&temporary, dir, name)
}

/// Names of the regular files directly inside `dir`, skipping temporaries.
pub fn file_names(dir: &fs_utf8::Dir) -> io::Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in dir.entries()? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name()?;
        if !name.ends_with(TEMP_SUFFIX) {
            names.push(name);
        }
    }
    names.sort_unstable();
    Ok(names)
}

/// Split an absolute or relative path into an ambient base directory and a relative suffix.
pub fn base_dir_and_relative(path: &Utf8Path) -> io::Result<(fs_utf8::Dir, Utf8PathBuf)> {
    let std_path = path.as_std_path();

    let (base, relative) = match std_path.components().next() {
        // Windows drive or UNC prefix.
        Some(Component::Prefix(prefix)) => {
            let prefix_str = prefix
                .as_os_str()
                .to_str()
                .ok_or_else(|| io::Error::other("non-UTF-8 path prefix"))?;
            let base = Utf8PathBuf::from(prefix_str).join(std::path::MAIN_SEPARATOR.to_string());
            let relative = std_path
                .strip_prefix(base.as_std_path())
                .or_else(|_| std_path.strip_prefix(prefix.as_os_str()))
                .map_err(|_| io::Error::other("failed to strip prefix from path"))?;
            (base, relative)
        }
        Some(Component::RootDir) => {
            let base = Utf8PathBuf::from(std::path::MAIN_SEPARATOR.to_string());
            let relative = std_path
                .strip_prefix(base.as_std_path())
                .map_err(|_| io::Error::other("failed to strip root from absolute path"))?;
            (base, relative)
        }
        _ => (Utf8PathBuf::from("."), std_path),
    };

    let dir = fs_utf8::Dir::open_ambient_dir(&base, ambient_authority())?;
    let relative = Utf8PathBuf::from_path_buf(relative.to_path_buf())
        .map_err(|_| io::Error::other("non-UTF-8 path"))?;
    Ok((dir, relative))
}
