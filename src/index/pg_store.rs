//! Postgres-backed `IndexStore`, an alternative collaborator backing,
//! generalized onto a hash/track_id/t_anchor posting shape from tables
//! originally shaped around songs and fingerprints.
//!
//! A shared Postgres instance is not disposable the way a scratch local
//! file can be, so `PgIndexStore` persists the config digest in a one-row
//! `index_meta` table and refuses to open against a mismatch exactly like
//! the file backing.

use std::collections::HashMap;
use std::env;

use diesel::prelude::*;
use dotenvy::dotenv;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::hasher::FpHash;
use crate::index::bindings::{IndexMetaRow, NewIndexMetaRow, NewPostingRow, PostingRow};
use crate::index::{IndexStats, IndexStore, OpenMode, Posting, TrackId};

const BATCH_SIZE: usize = 15_000;
const META_ROW_ID: i32 = 1;

pub struct PgIndexStore {
    conn: PgConnection,
    pending: HashMap<TrackId, Vec<(FpHash, u32)>>,
}

impl PgIndexStore {
    /// Connect using `DATABASE_URL` (loaded via `.env` through `dotenvy`),
    /// then validate or seed the stored parameter digest for `mode`.
    pub fn open(mode: OpenMode, config: &Config) -> Result<Self> {
        dotenv().ok();
        let db_url = env::var("DATABASE_URL")
            .map_err(|_| Error::IoError(std::io::Error::other("DATABASE_URL must be set")))?;

        let mut conn = PgConnection::establish(&db_url)
            .map_err(|e| Error::IoError(std::io::Error::other(e.to_string())))?;

        let digest = config.digest();
        use crate::index::schema::index_meta::dsl::*;

        let existing: Option<IndexMetaRow> = index_meta
            .filter(id.eq(META_ROW_ID))
            .first(&mut conn)
            .optional()
            .map_err(|e| Error::IoError(std::io::Error::other(e.to_string())))?;

        match existing {
            Some(row) if row.param_digest == digest.to_vec() => {}
            Some(_) => return Err(Error::ParamDigestMismatch),
            None if mode == OpenMode::Append => {
                diesel::insert_into(index_meta)
                    .values(&NewIndexMetaRow {
                        id: META_ROW_ID,
                        param_digest: digest.to_vec(),
                    })
                    .execute(&mut conn)
                    .map_err(|e| Error::IoError(std::io::Error::other(e.to_string())))?;
            }
            None => return Err(Error::CorruptIndex("index_meta row missing".into())),
        }

        Ok(PgIndexStore {
            conn,
            pending: HashMap::new(),
        })
    }
}

impl IndexStore for PgIndexStore {
    fn put(&mut self, hash: FpHash, track_id: TrackId, t_anchor: u32) -> Result<()> {
        self.put_bulk(track_id, &[(hash, t_anchor)])
    }

    fn put_bulk(&mut self, track_id: TrackId, entries: &[(FpHash, u32)]) -> Result<()> {
        self.pending.entry(track_id).or_default().extend_from_slice(entries);
        Ok(())
    }

    fn abort_track(&mut self, track_id: TrackId) -> Result<()> {
        self.pending.remove(&track_id);
        Ok(())
    }

    fn get(&self, hash: FpHash) -> Result<Vec<Posting>> {
        use crate::index::schema::postings::dsl;

        // short-lived connection: get() takes &self, diesel needs &mut
        let db_url = env::var("DATABASE_URL")
            .map_err(|_| Error::IoError(std::io::Error::other("DATABASE_URL must be set")))?;
        let mut conn = PgConnection::establish(&db_url)
            .map_err(|e| Error::IoError(std::io::Error::other(e.to_string())))?;

        let rows: Vec<PostingRow> = dsl::postings
            .filter(dsl::hash.eq(hash.0 as i64))
            .select(PostingRow::as_select())
            .load(&mut conn)
            .map_err(|e| Error::IoError(std::io::Error::other(e.to_string())))?;

        Ok(rows
            .into_iter()
            .map(|r| Posting {
                track_id: TrackId(r.track_id as u32),
                t_anchor: r.t_anchor as u32,
            })
            .collect())
    }

    fn flush(&mut self) -> Result<()> {
        use crate::index::schema::postings::dsl::postings;

        let drained: Vec<(TrackId, Vec<(FpHash, u32)>)> = self.pending.drain().collect();

        self.conn
            .transaction::<_, diesel::result::Error, _>(|conn| {
                for (track_id, entries) in &drained {
                    let rows: Vec<NewPostingRow> = entries
                        .iter()
                        .map(|(hash, t_anchor)| NewPostingRow {
                            hash: hash.0 as i64,
                            track_id: track_id.0 as i32,
                            t_anchor: *t_anchor as i32,
                        })
                        .collect();

                    for batch in rows.chunks(BATCH_SIZE) {
                        diesel::insert_into(postings).values(batch).execute(conn)?;
                    }
                }
                Ok(())
            })
            .map_err(|e| Error::IoError(std::io::Error::other(e.to_string())))
    }

    fn stats(&self) -> Result<IndexStats> {
        use crate::index::schema::postings::dsl::*;
        use diesel::dsl::count_star;

        let db_url = env::var("DATABASE_URL")
            .map_err(|_| Error::IoError(std::io::Error::other("DATABASE_URL must be set")))?;
        let mut conn = PgConnection::establish(&db_url)
            .map_err(|e| Error::IoError(std::io::Error::other(e.to_string())))?;

        let num_postings: i64 = postings
            .select(count_star())
            .first(&mut conn)
            .map_err(|e| Error::IoError(std::io::Error::other(e.to_string())))?;
        let num_hashes: i64 = postings
            .select(hash)
            .distinct()
            .count()
            .get_result(&mut conn)
            .map_err(|e| Error::IoError(std::io::Error::other(e.to_string())))?;
        let num_tracks: i64 = postings
            .select(track_id)
            .distinct()
            .count()
            .get_result(&mut conn)
            .map_err(|e| Error::IoError(std::io::Error::other(e.to_string())))?;

        Ok(IndexStats {
            num_hashes: num_hashes as u64,
            num_postings: num_postings as u64,
            num_tracks: num_tracks as u64,
        })
    }
}
