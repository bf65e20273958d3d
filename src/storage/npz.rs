//! NumPy `.npz` archives (zip of `.npy` members).
//!
//! Reading goes through a read-only mmap; archive order is preserved so callers can rely on
//! the order classes were written in. Writing is atomic: the archive is built next to the
//! target and renamed into place.

use std::fs::{self, File};
use std::io::{BufWriter, Cursor, Read, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::error::{StorageError, StorageResult};
use super::mmap::{MmapError, MmapFileHandle};
use super::npy::{self, NpyArray};

const MEMBER_EXTENSION: &str = ".npy";

const TEMP_SUFFIX: &str = "tmp";

/// Upper bound on the buffer reserved from a member's declared size.
const MAX_PREALLOC: u64 = 64 << 20;

/// Decodes every `.npy` member of an in-memory archive, in archive order.
pub fn read_npz(bytes: &[u8]) -> StorageResult<Vec<(String, NpyArray)>> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    let mut arrays = Vec::with_capacity(archive.len());

    for index in 0..archive.len() {
        let mut member = archive.by_index(index)?;
        if member.is_dir() {
            continue;
        }

        let member_name = member.name().to_string();
        let Some(name) = member_name.strip_suffix(MEMBER_EXTENSION) else {
            warn!(member = %member_name, "Skipping archive member without .npy extension");
            continue;
        };

        let mut payload = Vec::with_capacity(prealloc_hint(member.size()));
        member.read_to_end(&mut payload)?;

        let array = npy::decode(&payload).map_err(|source| StorageError::Npy {
            name: name.to_string(),
            source,
        })?;

        arrays.push((name.to_string(), array));
    }

    Ok(arrays)
}

/// Declared sizes come from the archive and are not trusted beyond [`MAX_PREALLOC`].
fn prealloc_hint(declared: u64) -> usize {
    usize::try_from(declared.min(MAX_PREALLOC)).unwrap_or(0)
}

/// Maps `path` and decodes it with [`read_npz`].
///
/// A zero-length file decodes to an empty list; a missing file is an [`StorageError::Io`]
/// with [`std::io::ErrorKind::NotFound`].
pub fn read_npz_file(path: &Path) -> StorageResult<Vec<(String, NpyArray)>> {
    let handle = match MmapFileHandle::open(path) {
        Ok(handle) => handle,
        Err(MmapError::EmptyFile) => {
            debug!(path = %path.display(), "Archive file is empty");
            return Ok(Vec::new());
        }
        Err(MmapError::Io(e)) => return Err(StorageError::Io(e)),
    };

    read_npz(handle.as_slice())
}

/// Writes `(name, shape, data)` members as a deflate-compressed `.npz` archive.
pub fn write_npz_file<'a, I>(path: &Path, members: I) -> StorageResult<()>
where
    I: IntoIterator<Item = (&'a str, &'a [usize], &'a [f32])>,
{
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }

    let temp_path = temp_path_for(path);

    let written = write_archive(&temp_path, members);
    if let Err(e) = written {
        let _ = fs::remove_file(&temp_path);
        return Err(e);
    }

    fs::rename(&temp_path, path)?;
    Ok(())
}

fn write_archive<'a, I>(temp_path: &Path, members: I) -> StorageResult<()>
where
    I: IntoIterator<Item = (&'a str, &'a [usize], &'a [f32])>,
{
    let file = File::create(temp_path)?;
    let mut writer = ZipWriter::new(BufWriter::new(file));

    for (name, shape, data) in members {
        let payload = npy::encode(shape, data).map_err(|source| StorageError::Npy {
            name: name.to_string(),
            source,
        })?;

        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .large_file(payload.len() as u64 >= u32::MAX as u64);

        writer.start_file(format!("{}{}", name, MEMBER_EXTENSION), options)?;
        writer.write_all(&payload)?;
    }

    let mut inner = writer.finish()?;
    inner.flush()?;
    let file = inner
        .into_inner()
        .map_err(|e| StorageError::WriteFailed(e.to_string()))?;
    file.sync_all()?;
    Ok(())
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".");
    name.push(TEMP_SUFFIX);
    path.with_file_name(name)
}
