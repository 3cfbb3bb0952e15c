//! Linear scans over gzip-compressed tar layers.
//!
//! Nothing is cached between calls: each scan opens the archive, decompresses it from the start
//! and walks entries in stream order. The file handle and decoder live only as long as the scan.
use std::cmp;
use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::Path;

use flate2::read::GzDecoder;
use tar::Archive;

use crate::errors::{Error, Result};

/// Name and size of a single tar entry, as recorded in its header.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub name: String,
    pub size: u64,
}

const MAX_PREALLOC: u64 = 128 * 1024;

fn open(archive: &Path, layer: &str) -> Result<Archive<GzDecoder<BufReader<File>>>> {
    let file = File::open(archive).map_err(|e| match e.kind() {
        ErrorKind::NotFound => Error::LayerNotFound(layer.to_string()),
        _ => Error::IOError(e),
    })?;
    Ok(Archive::new(GzDecoder::new(BufReader::new(file))))
}

fn corrupt(layer: &str) -> impl Fn(std::io::Error) -> Error + '_ {
    move |source| Error::CorruptArchive {
        layer: layer.to_string(),
        source,
    }
}

/// Return the contents of the first entry in `archive` whose name is exactly `name`.
pub fn read_file(archive: &Path, layer: &str, name: &str) -> Result<Vec<u8>> {
    let mut tar = open(archive, layer)?;

    for entry in tar.entries().map_err(corrupt(layer))? {
        let mut entry = entry.map_err(corrupt(layer))?;
        if &*entry.path_bytes() != name.as_bytes() {
            continue;
        }

        let size = entry.size();
        tracing::debug!(layer, name, size, "found entry");

        // header sizes are untrusted until the data is actually there
        let mut data = Vec::with_capacity(cmp::min(size, MAX_PREALLOC) as usize);
        entry.read_to_end(&mut data).map_err(corrupt(layer))?;
        if data.len() as u64 != size {
            return Err(corrupt(layer)(std::io::Error::new(
                ErrorKind::UnexpectedEof,
                format!("entry {name} declares {size} bytes but holds {}", data.len()),
            )));
        }
        return Ok(data);
    }

    Err(Error::EntryNotFound {
        layer: layer.to_string(),
        path: name.to_string(),
    })
}

/// Call `visit` for every entry of `archive` in stream order.
///
/// Entries seen before a failure have already been visited when the error is returned, which lets
/// callers decide whether a partial listing is still useful.
pub fn scan_entries<F>(archive: &Path, layer: &str, mut visit: F) -> Result<()>
where
    F: FnMut(ArchiveEntry),
{
    let mut tar = open(archive, layer)?;

    for entry in tar.entries().map_err(corrupt(layer))? {
        let entry = entry.map_err(corrupt(layer))?;
        visit(ArchiveEntry {
            name: String::from_utf8_lossy(&entry.path_bytes()).into_owned(),
            size: entry.size(),
        });
    }

    Ok(())
}

#[cfg(test)]
fn list_entries(archive: &Path, layer: &str) -> Result<Vec<ArchiveEntry>> {
    let mut entries = Vec::new();
    scan_entries(archive, layer, |entry| entries.push(entry))?;
    Ok(entries)
}
