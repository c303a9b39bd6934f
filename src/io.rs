use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use anyhow::{Context, Result};
use memmap2::Mmap;

/// LDIF exports at or above this size are memory-mapped instead of read
/// through a buffered reader.
pub const DEFAULT_MMAP_THRESHOLD_BYTES: u64 = 16 * 1024 * 1024; // 16 MiB

/// Path that selects standard input instead of a file.
pub const STDIN_PATH: &str = "-";

pub type LineIter = Box<dyn Iterator<Item = io::Result<String>> + 'static>;

pub fn should_use_mmap(file_size_bytes: u64, threshold_bytes: u64) -> bool {
    file_size_bytes >= threshold_bytes
}

pub fn is_stdin<P: AsRef<Path>>(path: P) -> bool {
    path.as_ref().as_os_str() == STDIN_PATH
}

pub fn iter_lines_bufread<P: AsRef<Path>>(path: P) -> Result<LineIter> {
    let file = File::open(&path).with_context(|| format!("open {}", path.as_ref().display()))?;
    Ok(Box::new(
        BufReader::new(file).lines().map(|l| l.map(strip_cr)),
    ))
}

pub fn iter_lines_stdin() -> LineIter {
    Box::new(io::stdin().lines().map(|l| l.map(strip_cr)))
}

/// Iterate lines of a memory-mapped file, splitting on '\n' with memchr.
pub fn iter_lines_mmap<P: AsRef<Path>>(path: P) -> Result<LineIter> {
    let file = File::open(&path).with_context(|| format!("open {}", path.as_ref().display()))?;
    // SAFETY: the mapping is read-only and lives as long as the iterator.
    let mmap =
        unsafe { Mmap::map(&file) }.with_context(|| format!("mmap {}", path.as_ref().display()))?;
    Ok(Box::new(MmapLines { mmap, pos: 0 }))
}

struct MmapLines {
    mmap: Mmap,
    pos: usize,
}

impl Iterator for MmapLines {
    type Item = io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        let data: &[u8] = &self.mmap;
        if self.pos >= data.len() {
            return None;
        }
        let start = self.pos;
        let end = match memchr::memchr(b'\n', &data[start..]) {
            Some(off) => start + off,
            None => data.len(),
        };
        self.pos = end + 1;
        Some(Ok(line_from_bytes(&data[start..end])))
    }
}

fn line_from_bytes(bytes: &[u8]) -> String {
    let slice = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(slice).into_owned()
}

fn strip_cr(mut line: String) -> String {
    if line.ends_with('\r') {
        line.pop();
    }
    line
}

/// Open an LDIF source: stdin for `-`, mmap for large files, buffered
/// reading otherwise.
pub fn iter_lines_auto<P: AsRef<Path>>(path: P, threshold_bytes: u64) -> Result<LineIter> {
    if is_stdin(&path) {
        return Ok(iter_lines_stdin());
    }
    let meta =
        std::fs::metadata(&path).with_context(|| format!("stat {}", path.as_ref().display()))?;
    if meta.is_file() && should_use_mmap(meta.len(), threshold_bytes) {
        iter_lines_mmap(path)
    } else {
        iter_lines_bufread(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn collect(iter: LineIter) -> Vec<String> {
        iter.map(|l| l.unwrap()).collect()
    }

    #[test]
    fn mmap_and_bufread_agree_on_crlf_and_missing_trailing_newline() {
        let mut f = NamedTempFile::new().unwrap();
        write!(f, "dn: CN=A,DC=x\r\ncn: A\r\n\r\ncn: B").unwrap();
        let buffered = collect(iter_lines_auto(f.path(), u64::MAX).unwrap());
        let mapped = collect(iter_lines_auto(f.path(), 1).unwrap());
        assert_eq!(buffered, vec!["dn: CN=A,DC=x", "cn: A", "", "cn: B"]);
        assert_eq!(mapped, buffered);
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(iter_lines_auto("/nonexistent/ldap-inventory.ldif", 0).is_err());
    }

    #[test]
    fn dash_selects_stdin() {
        assert!(is_stdin("-"));
        assert!(!is_stdin("./-x"));
    }
}
