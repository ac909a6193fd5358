//! Input loading for the CLI. Record files are read whole; large files are
//! memory-mapped instead of copied.
use std::fs::File;
use std::io::Read;
use std::ops::Deref;
use std::path::Path;

use anyhow::{Context, Result};
use log::debug;
use memmap2::Mmap;

/// Threshold in bytes above which we attempt to use mmap for reading.
/// Callers can override via API; this is a reasonable default.
pub const DEFAULT_MMAP_THRESHOLD_BYTES: u64 = 16 * 1024 * 1024; // 16 MiB

/// Decide whether to use mmap based on file size and threshold.
pub fn should_use_mmap(file_size_bytes: u64, threshold_bytes: u64) -> bool {
    file_size_bytes > 0 && file_size_bytes >= threshold_bytes
}

/// The bytes of one input file.
pub enum Input {
    Mapped(Mmap),
    Buffered(Vec<u8>),
}

impl Deref for Input {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            Input::Mapped(m) => &m[..],
            Input::Buffered(b) => b.as_slice(),
        }
    }
}

/// Load a file, choosing mmap or a buffered read by size.
pub fn read_input<P: AsRef<Path>>(path: P, threshold_bytes: u64) -> Result<Input> {
    let path = path.as_ref();
    let mut file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let meta = file
        .metadata()
        .with_context(|| format!("stat {}", path.display()))?;
    if meta.is_file() && should_use_mmap(meta.len(), threshold_bytes) {
        debug!("mmap {} ({} bytes)", path.display(), meta.len());
        let mmap =
            unsafe { Mmap::map(&file) }.with_context(|| format!("mmap {}", path.display()))?;
        return Ok(Input::Mapped(mmap));
    }
    let mut buf = Vec::with_capacity(meta.len() as usize);
    file.read_to_end(&mut buf)
        .with_context(|| format!("read {}", path.display()))?;
    Ok(Input::Buffered(buf))
}

/// Load several files into one blob, in argument order. A line feed is
/// inserted between files that do not end with one.
pub fn read_inputs<P: AsRef<Path>>(paths: &[P], threshold_bytes: u64) -> Result<Vec<u8>> {
    let mut blob = Vec::new();
    for p in paths {
        let input = read_input(p, threshold_bytes)?;
        if !blob.is_empty() && blob.last() != Some(&b'\n') {
            blob.push(b'\n');
        }
        blob.extend_from_slice(&input);
    }
    Ok(blob)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn threshold_selects_reader() {
        assert!(should_use_mmap(32, 32));
        assert!(!should_use_mmap(31, 32));
        assert!(!should_use_mmap(0, 0));
    }

    #[test]
    fn mapped_and_buffered_reads_agree() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("records.txt");
        std::fs::write(&path, "a:b|Plan=Pro\nc:d\n").unwrap();
        let mapped = read_input(&path, 1).unwrap();
        assert!(matches!(mapped, Input::Mapped(_)));
        let buffered = read_input(&path, u64::MAX).unwrap();
        assert!(matches!(buffered, Input::Buffered(_)));
        assert_eq!(&*mapped, &*buffered);
    }

    #[test]
    fn concatenates_files_on_line_boundaries() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.txt");
        let b = dir.path().join("b.txt");
        let empty = dir.path().join("empty.txt");
        std::fs::write(&a, "a:1").unwrap();
        std::fs::write(&b, "b:2\n").unwrap();
        std::fs::write(&empty, "").unwrap();
        let blob = read_inputs(&[&a, &empty, &b], 1).unwrap();
        assert_eq!(blob, b"a:1\nb:2\n".to_vec());
    }

    #[test]
    fn missing_file_has_context() {
        let dir = tempdir().unwrap();
        let err = read_input(dir.path().join("nope.txt"), 0)
            .err()
            .unwrap();
        assert!(err.to_string().starts_with("open "));
    }
}
