//! The fingerprint index: an inverted map from hash to posting lists.
//!
//! [`IndexStore`] is the capability every backing must expose: `put`/
//! `put_bulk` to append, `get` to read a posting list, `flush` to make
//! writes durable, and `stats` for introspection. [`file_store`] is the
//! reference binary-file backing; [`pg_store`] is an alternative
//! collaborator backing onto Postgres, generalized to the same posting
//! shape.

pub mod bindings;
pub mod file_store;
pub mod pg_store;
pub mod schema;

use crate::error::Result;
use crate::hasher::FpHash;

/// Opaque track identifier. Uniqueness across tracks is a caller
/// invariant, not enforced by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TrackId(pub u32);

/// One occurrence of a hash inside a specific track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Posting {
    pub track_id: TrackId,
    pub t_anchor: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IndexStats {
    pub num_hashes: u64,
    pub num_postings: u64,
    pub num_tracks: u64,
}

/// How an index handle was opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    Read,
    Append,
}

/// Capability every index backing must expose.
///
/// Concurrency: `get` may be called concurrently by multiple readers
/// without external synchronization; `put`/`put_bulk` are serialized by
/// the implementation. A reader started after `flush()` observes every
/// prior write; one started concurrently with an unflushed write may miss
/// it.
pub trait IndexStore {
    /// Append one posting for `hash`.
    fn put(&mut self, hash: FpHash, track_id: TrackId, t_anchor: u32) -> Result<()>;

    /// Batched append, the preferred path for enroll. Postings for a
    /// single `track_id` batch are preserved in the iteration order given
    /// here once flushed.
    fn put_bulk(&mut self, track_id: TrackId, entries: &[(FpHash, u32)]) -> Result<()>;

    /// Discard every posting written for `track_id` since the last
    /// `flush()`, the abort path for a cancelled enroll.
    fn abort_track(&mut self, track_id: TrackId) -> Result<()>;

    /// Read the posting list for `hash`. Empty if the hash is unknown.
    fn get(&self, hash: FpHash) -> Result<Vec<Posting>>;

    /// Make all prior `put`/`put_bulk` calls durable and visible to
    /// subsequent `get` calls.
    fn flush(&mut self) -> Result<()>;

    fn stats(&self) -> Result<IndexStats>;
}
