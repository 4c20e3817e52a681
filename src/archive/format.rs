//! siva container format.
//!
//! # Layout
//!
//! ```text
//! ┌──────────── block 0 ────────────┐┌──────────── block 1 ────────────┐
//! │ contents │ index │ footer (24B) ││ contents │ index │ footer (24B) │
//! └─────────────────────────────────┘└─────────────────────────────────┘
//! ```
//!
//! - index: `"IBA"`, version byte, then one record per entry:
//!   `name_len u32 | name | mode u32 | mod_time i64 | offset u64 | size u64 | crc32 u32 | flags u32`
//! - footer: `entry_count u32 | index_size u64 | block_size u64 | index_crc32 u32`
//! - integers are big-endian; `offset` is relative to the start of its block.
//!
//! # Invariants
//! - Blocks are only ever appended; a later block overrides earlier entries
//!   with the same name, and a record with [`FLAG_DELETED`] hides them.
//! - Size fields are untrusted; anything pointing outside the file is
//!   reported as [`ArchiveError::Truncated`].

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::archive::error::{ArchiveError, ArchiveResult};

/// Signature at the start of every index.
pub const INDEX_SIGNATURE: &[u8; 3] = b"IBA";
/// Supported index version.
pub const INDEX_VERSION: u8 = 1;
/// Size of the block footer in bytes.
pub const FOOTER_LEN: u64 = 24;
/// Entry flag marking a deletion.
pub const FLAG_DELETED: u32 = 0x1;

const INDEX_HEADER_LEN: u64 = 4;

const CRC_TABLE: [u32; 256] = crc_table();

const fn crc_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut c = i as u32;
        let mut k = 0;
        while k < 8 {
            c = if c & 1 != 0 { 0xEDB8_8320 ^ (c >> 1) } else { c >> 1 };
            k += 1;
        }
        table[i] = c;
        i += 1;
    }
    table
}

/// CRC-32 (IEEE) as used by the siva index.
pub fn crc32(data: &[u8]) -> u32 {
    let mut c = !0u32;
    for &b in data {
        c = CRC_TABLE[((c ^ b as u32) & 0xff) as usize] ^ (c >> 8);
    }
    !c
}

/// One index record, with `offset` made absolute within the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub name: String,
    pub mode: u32,
    /// modification time in nanoseconds since the unix epoch
    pub mod_time: i64,
    pub offset: u64,
    pub size: u64,
    pub crc32: u32,
    pub flags: u32,
}

impl IndexEntry {
    pub fn is_deleted(&self) -> bool {
        self.flags & FLAG_DELETED != 0
    }
}

/// Parsed block footer.
#[derive(Debug, Clone, Copy)]
struct Footer {
    entry_count: u32,
    index_size: u64,
    block_size: u64,
    crc32: u32,
}

impl Footer {
    fn decode(buf: &[u8; FOOTER_LEN as usize]) -> Self {
        let mut d = Decoder::new(buf);
        // length is fixed, the reads cannot fail
        Self {
            entry_count: d.u32().unwrap_or(0),
            index_size: d.u64().unwrap_or(0),
            block_size: d.u64().unwrap_or(0),
            crc32: d.u32().unwrap_or(0),
        }
    }
}

/// Big-endian reader over an in-memory index.
struct Decoder<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Decoder<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, n: usize) -> ArchiveResult<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.buf.len())
            .ok_or_else(|| ArchiveError::Truncated("index record".to_string()))?;
        let out = &self.buf[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    fn array<const N: usize>(&mut self) -> ArchiveResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u32(&mut self) -> ArchiveResult<u32> {
        Ok(u32::from_be_bytes(self.array()?))
    }

    fn u64(&mut self) -> ArchiveResult<u64> {
        Ok(u64::from_be_bytes(self.array()?))
    }

    fn i64(&mut self) -> ArchiveResult<i64> {
        Ok(i64::from_be_bytes(self.array()?))
    }
}

/// Reads the live entries of a siva archive.
///
/// The source is only ever read; opening an archive never modifies it.
pub struct ArchiveReader<R> {
    source: R,
    entries: Vec<IndexEntry>,
}

impl ArchiveReader<BufReader<File>> {
    /// Open an archive file read-only.
    pub fn open(path: impl AsRef<Path>) -> ArchiveResult<Self> {
        let file = File::open(path.as_ref())?;
        Self::new(BufReader::new(file))
    }
}

impl<R: Read + Seek> ArchiveReader<R> {
    /// Parse every block index of `source`.
    pub fn new(mut source: R) -> ArchiveResult<Self> {
        let len = source.seek(SeekFrom::End(0))?;
        let mut blocks = Vec::new();
        let mut end = len;

        while end > 0 {
            let (block_start, entries) = read_block(&mut source, end)?;
            blocks.push(entries);
            end = block_start;
        }

        // blocks were read newest first
        let mut seen = HashSet::new();
        let mut entries = Vec::new();
        for block in blocks {
            for entry in block.into_iter().rev() {
                if !seen.insert(entry.name.clone()) {
                    continue;
                }
                if !entry.is_deleted() {
                    entries.push(entry);
                }
            }
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(Self { source, entries })
    }

    /// Live entries sorted by name.
    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    /// Look up a live entry by name.
    pub fn entry(&self, name: &str) -> Option<&IndexEntry> {
        self.entries
            .binary_search_by(|e| e.name.as_str().cmp(name))
            .ok()
            .map(|i| &self.entries[i])
    }

    /// Read and verify the contents of an entry.
    pub fn read_entry(&mut self, entry: &IndexEntry) -> ArchiveResult<Vec<u8>> {
        let size = usize::try_from(entry.size)
            .map_err(|_| ArchiveError::Truncated(format!("entry {} too large", entry.name)))?;
        let mut buf = vec![0u8; size];
        self.source.seek(SeekFrom::Start(entry.offset))?;
        self.source.read_exact(&mut buf)?;

        let found = crc32(&buf);
        if found != entry.crc32 {
            return Err(ArchiveError::ChecksumMismatch {
                what: entry.name.clone(),
                expected: entry.crc32,
                found,
            });
        }
        Ok(buf)
    }
}

/// Read the block ending at `end`. Returns its start offset and records.
fn read_block<R: Read + Seek>(source: &mut R, end: u64) -> ArchiveResult<(u64, Vec<IndexEntry>)> {
    if end < FOOTER_LEN {
        return Err(ArchiveError::Truncated(format!(
            "{end} trailing bytes cannot hold a footer"
        )));
    }

    let mut footer_buf = [0u8; FOOTER_LEN as usize];
    source.seek(SeekFrom::Start(end - FOOTER_LEN))?;
    source.read_exact(&mut footer_buf)?;
    let footer = Footer::decode(&footer_buf);

    let index_end = end - FOOTER_LEN;
    if footer.index_size < INDEX_HEADER_LEN || footer.index_size > index_end {
        return Err(ArchiveError::Truncated(format!(
            "index size {} out of range",
            footer.index_size
        )));
    }
    let index_start = index_end - footer.index_size;
    if footer.block_size > end || footer.block_size < footer.index_size + FOOTER_LEN {
        return Err(ArchiveError::Truncated(format!(
            "block size {} out of range",
            footer.block_size
        )));
    }
    let block_start = end - footer.block_size;

    let index_len = usize::try_from(footer.index_size)
        .map_err(|_| ArchiveError::Truncated("index too large".to_string()))?;
    let mut index = vec![0u8; index_len];
    source.seek(SeekFrom::Start(index_start))?;
    source.read_exact(&mut index)?;

    let found = crc32(&index);
    if found != footer.crc32 {
        return Err(ArchiveError::ChecksumMismatch {
            what: format!("index at offset {index_start}"),
            expected: footer.crc32,
            found,
        });
    }

    let mut d = Decoder::new(&index);
    if d.take(3)? != INDEX_SIGNATURE {
        return Err(ArchiveError::InvalidSignature {
            offset: index_start,
        });
    }
    let version = d.array::<1>()?[0];
    if version != INDEX_VERSION {
        return Err(ArchiveError::UnsupportedVersion(version));
    }

    let content_len = index_start - block_start;
    // the count is untrusted; each record takes at least 40 bytes
    let capacity = (footer.entry_count as usize).min(index_len / 40);
    let mut entries = Vec::with_capacity(capacity);
    for _ in 0..footer.entry_count {
        let name_len = d.u32()? as usize;
        let name = std::str::from_utf8(d.take(name_len)?)
            .map_err(|e| ArchiveError::InvalidEntryName(e.to_string()))?
            .to_string();
        let mode = d.u32()?;
        let mod_time = d.i64()?;
        let offset = d.u64()?;
        let size = d.u64()?;
        let crc32 = d.u32()?;
        let flags = d.u32()?;

        let in_bounds = offset
            .checked_add(size)
            .is_some_and(|entry_end| entry_end <= content_len);
        if !in_bounds {
            return Err(ArchiveError::Truncated(format!(
                "entry {name} exceeds its block"
            )));
        }

        entries.push(IndexEntry {
            name,
            mode,
            mod_time,
            offset: block_start + offset,
            size,
            crc32,
            flags,
        });
    }

    Ok((block_start, entries))
}

/// Writes one siva block.
///
/// Appending a block to an existing archive is done by handing the writer a
/// file opened in append mode; offsets are relative to the block start.
pub struct ArchiveWriter<W: Write> {
    sink: W,
    written: u64,
    entries: Vec<IndexEntry>,
}

impl<W: Write> ArchiveWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            sink,
            written: 0,
            entries: Vec::new(),
        }
    }

    /// Append a file entry.
    pub fn add_file(
        &mut self,
        name: &str,
        mode: u32,
        mod_time: i64,
        contents: &[u8],
    ) -> ArchiveResult<()> {
        crate::archive::stage::entry_path(name)?;
        self.sink.write_all(contents)?;
        self.entries.push(IndexEntry {
            name: name.to_string(),
            mode,
            mod_time,
            offset: self.written,
            size: contents.len() as u64,
            crc32: crc32(contents),
            flags: 0,
        });
        self.written += contents.len() as u64;
        Ok(())
    }

    /// Record that `name` is deleted as of this block.
    pub fn delete(&mut self, name: &str, mod_time: i64) -> ArchiveResult<()> {
        crate::archive::stage::entry_path(name)?;
        self.entries.push(IndexEntry {
            name: name.to_string(),
            mode: 0,
            mod_time,
            offset: self.written,
            size: 0,
            crc32: crc32(&[]),
            flags: FLAG_DELETED,
        });
        Ok(())
    }

    /// Number of records written so far.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Write the index and footer, returning the sink.
    pub fn finish(mut self) -> ArchiveResult<W> {
        let mut index = Vec::new();
        index.extend_from_slice(INDEX_SIGNATURE);
        index.push(INDEX_VERSION);
        for entry in &self.entries {
            index.extend_from_slice(&(entry.name.len() as u32).to_be_bytes());
            index.extend_from_slice(entry.name.as_bytes());
            index.extend_from_slice(&entry.mode.to_be_bytes());
            index.extend_from_slice(&entry.mod_time.to_be_bytes());
            index.extend_from_slice(&entry.offset.to_be_bytes());
            index.extend_from_slice(&entry.size.to_be_bytes());
            index.extend_from_slice(&entry.crc32.to_be_bytes());
            index.extend_from_slice(&entry.flags.to_be_bytes());
        }

        let index_size = index.len() as u64;
        let block_size = self.written + index_size + FOOTER_LEN;
        let mut footer = Vec::with_capacity(FOOTER_LEN as usize);
        footer.extend_from_slice(&(self.entries.len() as u32).to_be_bytes());
        footer.extend_from_slice(&index_size.to_be_bytes());
        footer.extend_from_slice(&block_size.to_be_bytes());
        footer.extend_from_slice(&crc32(&index).to_be_bytes());

        self.sink.write_all(&index)?;
        self.sink.write_all(&footer)?;
        self.sink.flush()?;
        Ok(self.sink)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn block(files: &[(&str, &[u8])], deleted: &[&str]) -> Vec<u8> {
        let mut w = ArchiveWriter::new(Vec::new());
        for (name, data) in files {
            w.add_file(name, 0o644, 0, data).unwrap();
        }
        for name in deleted {
            w.delete(name, 0).unwrap();
        }
        w.finish().unwrap()
    }

    #[test]
    fn test_crc32_check_value() {
        assert_eq!(crc32(b"123456789"), 0xCBF4_3926);
        assert_eq!(crc32(b""), 0);
    }

    #[test]
    fn test_single_block() {
        let bytes = block(&[("HEAD", b"ref: refs/heads/master\n"), ("config", b"[core]\n")], &[]);
        let mut reader = ArchiveReader::new(Cursor::new(bytes)).unwrap();

        let names: Vec<_> = reader.entries().iter().map(|e| e.name.clone()).collect();
        assert_eq!(names, vec!["HEAD", "config"]);

        let head = reader.entry("HEAD").unwrap().clone();
        assert_eq!(reader.read_entry(&head).unwrap(), b"ref: refs/heads/master\n");
        assert!(reader.entry("missing").is_none());
    }

    #[test]
    fn test_later_blocks_override_and_delete() {
        let mut bytes = block(&[("a", b"one"), ("b", b"two"), ("c", b"three")], &[]);
        bytes.extend(block(&[("a", b"uno")], &["b"]));

        let mut reader = ArchiveReader::new(Cursor::new(bytes)).unwrap();
        let names: Vec<_> = reader.entries().iter().map(|e| e.name.clone()).collect();
        assert_eq!(names, vec!["a", "c"]);

        let a = reader.entry("a").unwrap().clone();
        assert_eq!(reader.read_entry(&a).unwrap(), b"uno");
        let c = reader.entry("c").unwrap().clone();
        assert_eq!(reader.read_entry(&c).unwrap(), b"three");
    }

    #[test]
    fn test_empty_source_has_no_entries() {
        let reader = ArchiveReader::new(Cursor::new(Vec::new())).unwrap();
        assert!(reader.entries().is_empty());
    }

    #[test]
    fn test_garbage_is_rejected() {
        let err = ArchiveReader::new(Cursor::new(b"definitely not an archive".to_vec()))
            .err()
            .unwrap();
        assert!(err.is_corrupt());

        let err = ArchiveReader::new(Cursor::new(b"tiny".to_vec())).err().unwrap();
        assert!(matches!(err, ArchiveError::Truncated(_)));
    }

    #[test]
    fn test_corrupted_index_checksum() {
        let mut bytes = block(&[("a", b"one")], &[]);
        // flip a byte inside the index record
        let pos = bytes.len() - FOOTER_LEN as usize - 30;
        bytes[pos] ^= 0xff;

        let err = ArchiveReader::new(Cursor::new(bytes)).err().unwrap();
        assert!(matches!(err, ArchiveError::ChecksumMismatch { .. }));
    }

    #[test]
    fn test_corrupted_contents_checksum() {
        let mut bytes = block(&[("a", b"payload")], &[]);
        bytes[0] ^= 0xff;

        let mut reader = ArchiveReader::new(Cursor::new(bytes)).unwrap();
        let a = reader.entry("a").unwrap().clone();
        assert!(matches!(
            reader.read_entry(&a),
            Err(ArchiveError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_writer_rejects_bad_names() {
        let mut w = ArchiveWriter::new(Vec::new());
        assert!(w.add_file("../escape", 0, 0, b"x").is_err());
        assert!(w.add_file("/abs", 0, 0, b"x").is_err());
        assert!(w.is_empty());
        w.add_file("objects/ab/cdef", 0o444, 7, b"x").unwrap();
        assert_eq!(w.len(), 1);
    }
}
