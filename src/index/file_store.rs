//! Reference `IndexStore` backing: a single binary file.
//!
//! Layout, all integers little-endian:
//!
//! ```text
//! magic        : 8  bytes  "FPIDX\0\0\0"
//! version      : u16
//! param_digest : 32 bytes  (SHA-256 over the Config digest fields)
//! num_hashes   : u64
//! num_postings : u64
//! postings     : num_postings x (track_id:u32, t_anchor:u32)
//! directory    : num_hashes x (hash:u64, offset:u64, count:u32)
//! footer       : dir_offset:u64, dir_crc32:u32, magic:8
//! ```
//!
//! Writes are buffered in memory (an arena keyed by track) and the whole
//! file is rewritten on `flush()`. Postings are bounded by the
//! peak-density cap, so this keeps the on-disk format always
//! internally consistent with no partial-write recovery logic needed.

use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::hasher::FpHash;
use crate::index::{IndexStats, IndexStore, OpenMode, Posting, TrackId};

const MAGIC: &[u8; 8] = b"FPIDX\0\0\0";
const VERSION: u16 = 1;
const FOOTER_LEN: u64 = 8 + 4 + 8; // dir_offset + dir_crc32 + magic
const HEADER_LEN: u64 = 8 + 2 + 32 + 8 + 8;
const POSTING_LEN: u64 = 4 + 4;
const DIR_ENTRY_LEN: u64 = 8 + 8 + 4;

pub struct FileIndexStore {
    path: PathBuf,
    digest: [u8; 32],
    committed: RwLock<HashMap<FpHash, Vec<Posting>>>,
    pending: Mutex<HashMap<TrackId, Vec<(FpHash, u32)>>>,
}

impl FileIndexStore {
    /// Open (or create, in `Append` mode) an index file at `path`.
    ///
    /// `Read` on a missing file is an I/O error; `Append` on a missing
    /// file starts an empty index. An existing file whose embedded digest
    /// does not match `config.digest()` is refused.
    pub fn open<P: AsRef<Path>>(path: P, mode: OpenMode, config: &Config) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let digest = config.digest();

        if !path.exists() {
            if mode == OpenMode::Read {
                return Err(Error::IoError(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("index file not found: {}", path.display()),
                )));
            }
            return Ok(FileIndexStore {
                path,
                digest,
                committed: RwLock::new(HashMap::new()),
                pending: Mutex::new(HashMap::new()),
            });
        }

        let committed = read_index_file(&path, &digest)?;
        Ok(FileIndexStore {
            path,
            digest,
            committed: RwLock::new(committed),
            pending: Mutex::new(HashMap::new()),
        })
    }
}

impl IndexStore for FileIndexStore {
    fn put(&mut self, hash: FpHash, track_id: TrackId, t_anchor: u32) -> Result<()> {
        self.put_bulk(track_id, &[(hash, t_anchor)])
    }

    fn put_bulk(&mut self, track_id: TrackId, entries: &[(FpHash, u32)]) -> Result<()> {
        let mut pending = self.pending.lock().unwrap();
        pending.entry(track_id).or_default().extend_from_slice(entries);
        Ok(())
    }

    fn abort_track(&mut self, track_id: TrackId) -> Result<()> {
        self.pending.lock().unwrap().remove(&track_id);
        Ok(())
    }

    fn get(&self, hash: FpHash) -> Result<Vec<Posting>> {
        Ok(self
            .committed
            .read()
            .unwrap()
            .get(&hash)
            .cloned()
            .unwrap_or_default())
    }

    fn flush(&mut self) -> Result<()> {
        let drained: Vec<(TrackId, Vec<(FpHash, u32)>)> = {
            let mut pending = self.pending.lock().unwrap();
            pending.drain().collect()
        };

        {
            let mut committed = self.committed.write().unwrap();
            for (track_id, entries) in drained {
                for (hash, t_anchor) in entries {
                    committed.entry(hash).or_default().push(Posting { track_id, t_anchor });
                }
            }
        }

        let committed = self.committed.read().unwrap();
        write_index_file(&self.path, &self.digest, &committed)
    }

    fn stats(&self) -> Result<IndexStats> {
        let committed = self.committed.read().unwrap();
        let num_hashes = committed.len() as u64;
        let num_postings = committed.values().map(|v| v.len() as u64).sum();
        let mut tracks = std::collections::HashSet::new();
        for postings in committed.values() {
            for p in postings {
                tracks.insert(p.track_id);
            }
        }
        Ok(IndexStats {
            num_hashes,
            num_postings,
            num_tracks: tracks.len() as u64,
        })
    }
}

fn write_index_file(
    path: &Path,
    digest: &[u8; 32],
    committed: &HashMap<FpHash, Vec<Posting>>,
) -> Result<()> {
    let tmp_path = path.with_extension("tmp");
    let mut file = File::create(&tmp_path)?;

    let sorted: BTreeMap<u64, &Vec<Posting>> = committed
        .iter()
        .map(|(hash, postings)| (hash.0 as u64, postings))
        .collect();

    let num_hashes = sorted.len() as u64;
    let num_postings: u64 = sorted.values().map(|v| v.len() as u64).sum();

    file.write_all(MAGIC)?;
    file.write_u16::<LittleEndian>(VERSION)?;
    file.write_all(digest)?;
    file.write_u64::<LittleEndian>(num_hashes)?;
    file.write_u64::<LittleEndian>(num_postings)?;

    let mut directory = Vec::with_capacity(sorted.len());
    let mut offset = HEADER_LEN;
    for (&hash, postings) in sorted.iter() {
        directory.push((hash, offset, postings.len() as u32));
        for posting in postings.iter() {
            file.write_u32::<LittleEndian>(posting.track_id.0)?;
            file.write_u32::<LittleEndian>(posting.t_anchor)?;
            offset += POSTING_LEN;
        }
    }

    let dir_offset = offset;
    let mut dir_bytes = Vec::with_capacity(directory.len() * DIR_ENTRY_LEN as usize);
    for (hash, off, count) in &directory {
        dir_bytes.write_u64::<LittleEndian>(*hash).unwrap();
        dir_bytes.write_u64::<LittleEndian>(*off).unwrap();
        dir_bytes.write_u32::<LittleEndian>(*count).unwrap();
    }
    file.write_all(&dir_bytes)?;

    let dir_crc = crc32fast::hash(&dir_bytes);
    file.write_u64::<LittleEndian>(dir_offset)?;
    file.write_u32::<LittleEndian>(dir_crc)?;
    file.write_all(MAGIC)?;

    file.flush()?;
    drop(file);
    fs::rename(&tmp_path, path)?;
    Ok(())
}

fn read_index_file(path: &Path, expected_digest: &[u8; 32]) -> Result<HashMap<FpHash, Vec<Posting>>> {
    let mut file = File::open(path)?;
    let file_len = file.metadata()?.len();

    if file_len < HEADER_LEN + FOOTER_LEN {
        return Err(Error::CorruptIndex("file shorter than header+footer".into()));
    }

    let mut magic = [0u8; 8];
    file.read_exact(&mut magic)?;
    if &magic != MAGIC {
        return Err(Error::CorruptIndex("bad magic".into()));
    }

    let _version = file.read_u16::<LittleEndian>()?;

    let mut digest = [0u8; 32];
    file.read_exact(&mut digest)?;
    if &digest != expected_digest {
        return Err(Error::ParamDigestMismatch);
    }

    let _num_hashes_hdr = file.read_u64::<LittleEndian>()?;
    let _num_postings_hdr = file.read_u64::<LittleEndian>()?;

    file.seek(SeekFrom::End(-(FOOTER_LEN as i64)))?;
    let dir_offset = file.read_u64::<LittleEndian>()?;
    let dir_crc = file.read_u32::<LittleEndian>()?;
    let mut trailing_magic = [0u8; 8];
    file.read_exact(&mut trailing_magic)?;
    if &trailing_magic != MAGIC {
        return Err(Error::CorruptIndex("bad trailing magic".into()));
    }

    let dir_section_len = file_len
        .checked_sub(FOOTER_LEN)
        .and_then(|v| v.checked_sub(dir_offset))
        .ok_or_else(|| Error::CorruptIndex("directory offset out of range".into()))?;
    if dir_section_len % DIR_ENTRY_LEN != 0 {
        return Err(Error::CorruptIndex("directory offset out of range".into()));
    }
    let num_entries = (dir_section_len / DIR_ENTRY_LEN) as usize;

    file.seek(SeekFrom::Start(dir_offset))?;
    let mut dir_bytes = vec![0u8; dir_section_len as usize];
    file.read_exact(&mut dir_bytes)?;

    if crc32fast::hash(&dir_bytes) != dir_crc {
        return Err(Error::CorruptIndex("directory CRC mismatch".into()));
    }

    let mut directory = Vec::with_capacity(num_entries);
    let mut cursor = &dir_bytes[..];
    for _ in 0..num_entries {
        let hash = cursor.read_u64::<LittleEndian>()?;
        let off = cursor.read_u64::<LittleEndian>()?;
        let count = cursor.read_u32::<LittleEndian>()?;
        directory.push((hash, off, count));
    }

    let mut committed = HashMap::with_capacity(directory.len());
    for (hash, off, count) in directory {
        file.seek(SeekFrom::Start(off))?;
        let mut postings = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let track_id = file.read_u32::<LittleEndian>()?;
            let t_anchor = file.read_u32::<LittleEndian>()?;
            postings.push(Posting {
                track_id: TrackId(track_id),
                t_anchor,
            });
        }
        committed.insert(FpHash(hash as u32), postings);
    }

    Ok(committed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn cfg() -> Config {
        Config::default()
    }

    #[test]
    fn round_trips_through_flush_and_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("idx.bin");
        let config = cfg();

        {
            let mut store = FileIndexStore::open(&path, OpenMode::Append, &config).unwrap();
            store
                .put_bulk(TrackId(1), &[(FpHash(42), 0), (FpHash(42), 10), (FpHash(7), 3)])
                .unwrap();
            store.flush().unwrap();
        }

        let store = FileIndexStore::open(&path, OpenMode::Read, &config).unwrap();
        let mut postings = store.get(FpHash(42)).unwrap();
        postings.sort_by_key(|p| p.t_anchor);
        assert_eq!(
            postings,
            vec![
                Posting { track_id: TrackId(1), t_anchor: 0 },
                Posting { track_id: TrackId(1), t_anchor: 10 },
            ]
        );
        assert_eq!(store.get(FpHash(7)).unwrap().len(), 1);
        assert!(store.get(FpHash(999)).unwrap().is_empty());

        let stats = store.stats().unwrap();
        assert_eq!(stats.num_hashes, 2);
        assert_eq!(stats.num_postings, 3);
        assert_eq!(stats.num_tracks, 1);
    }

    #[test]
    fn unflushed_writes_are_not_visible() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("idx.bin");
        let config = cfg();
        let mut store = FileIndexStore::open(&path, OpenMode::Append, &config).unwrap();
        store.put(FpHash(1), TrackId(1), 0).unwrap();
        assert!(store.get(FpHash(1)).unwrap().is_empty());
    }

    #[test]
    fn abort_discards_pending_track() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("idx.bin");
        let config = cfg();
        let mut store = FileIndexStore::open(&path, OpenMode::Append, &config).unwrap();
        store.put(FpHash(1), TrackId(5), 0).unwrap();
        store.abort_track(TrackId(5)).unwrap();
        store.flush().unwrap();
        assert!(store.get(FpHash(1)).unwrap().is_empty());
    }

    #[test]
    fn digest_mismatch_refuses_to_open() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("idx.bin");
        let config = cfg();
        {
            let mut store = FileIndexStore::open(&path, OpenMode::Append, &config).unwrap();
            store.put(FpHash(1), TrackId(1), 0).unwrap();
            store.flush().unwrap();
        }

        let mut other = cfg();
        other.fan_out = 999;
        let result = FileIndexStore::open(&path, OpenMode::Read, &other);
        assert!(matches!(result, Err(Error::ParamDigestMismatch)));
    }

    #[test]
    fn truncated_file_is_corrupt() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("idx.bin");
        let config = cfg();
        {
            let mut store = FileIndexStore::open(&path, OpenMode::Append, &config).unwrap();
            store.put(FpHash(1), TrackId(1), 0).unwrap();
            store.flush().unwrap();
        }

        let len = fs::metadata(&path).unwrap().len();
        let truncated = len.saturating_sub(64);
        let file = fs::OpenOptions::new().write(true).open(&path).unwrap();
        file.set_len(truncated).unwrap();
        drop(file);

        let result = FileIndexStore::open(&path, OpenMode::Read, &config);
        assert!(matches!(result, Err(Error::CorruptIndex(_))));
    }

    #[test]
    fn garbage_dir_offset_is_corrupt_not_a_panic() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("idx.bin");
        let config = cfg();
        {
            let mut store = FileIndexStore::open(&path, OpenMode::Append, &config).unwrap();
            store.put(FpHash(1), TrackId(1), 0).unwrap();
            store.flush().unwrap();
        }

        let len = fs::metadata(&path).unwrap().len();
        let mut file = fs::OpenOptions::new().write(true).open(&path).unwrap();
        // overwrite the footer's dir_offset with a value past file_len - FOOTER_LEN
        file.seek(SeekFrom::Start(len - FOOTER_LEN)).unwrap();
        file.write_u64::<LittleEndian>(len * 2).unwrap();
        drop(file);

        let result = FileIndexStore::open(&path, OpenMode::Read, &config);
        assert!(matches!(result, Err(Error::CorruptIndex(_))));
    }

    #[test]
    fn extreme_track_ids_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("idx.bin");
        let config = cfg();
        {
            let mut store = FileIndexStore::open(&path, OpenMode::Append, &config).unwrap();
            store.put(FpHash(1), TrackId(0), 0).unwrap();
            store.put(FpHash(1), TrackId(u32::MAX), 1).unwrap();
            store.flush().unwrap();
        }
        let store = FileIndexStore::open(&path, OpenMode::Read, &config).unwrap();
        let postings = store.get(FpHash(1)).unwrap();
        assert!(postings.iter().any(|p| p.track_id == TrackId(0)));
        assert!(postings.iter().any(|p| p.track_id == TrackId(u32::MAX)));
    }
}
