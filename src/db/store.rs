use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::EngineError;
use crate::models::{FingerprintHash, HashHit, SongRecord};

/// Persistent inverted index: songs plus hash -> (song, time) postings,
/// embedded in a single SQLite file.
///
/// One connection guarded by a mutex; enrollment takes a transaction so
/// readers see either a song's full posting set or none of it.
pub struct IndexStore {
    conn: Mutex<Connection>,
}

/// Aggregate catalog counters for the stats surface.
#[derive(Debug, Clone, Copy)]
pub struct CatalogCounts {
    pub total_songs: i64,
    pub total_fingerprints: i64,
    pub avg_fingerprints_per_song: f64,
}

impl IndexStore {
    /// Opens (creating if needed) the database at `path` and ensures the
    /// schema exists.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, EngineError> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA foreign_keys = ON;")?;
        create_schema(&conn)?;
        Ok(IndexStore { conn: Mutex::new(conn) })
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("index store mutex poisoned")
    }

    /// Upserts a song by filename (preserving its id on re-enrollment) and
    /// replaces its postings with `hashes`, all in one transaction.
    pub fn enroll(
        &self,
        filename: &str,
        title: &str,
        artist: &str,
        duration: f64,
        hashes: &[FingerprintHash],
    ) -> Result<i64, EngineError> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO songs (filename, title, artist, duration) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(filename) DO UPDATE SET
                 title = excluded.title,
                 artist = excluded.artist,
                 duration = excluded.duration",
            params![filename, title, artist, duration],
        )?;
        let song_id: i64 = tx.query_row(
            "SELECT id FROM songs WHERE filename = ?1",
            params![filename],
            |row| row.get(0),
        )?;

        tx.execute("DELETE FROM fingerprints WHERE song_id = ?1", params![song_id])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO fingerprints (song_id, hash, time_offset) VALUES (?1, ?2, ?3)",
            )?;
            for hash in hashes {
                stmt.execute(params![song_id, hash.token, hash.time_offset])?;
            }
        }

        tx.commit()?;
        Ok(song_id)
    }

    /// Probes the index with every query hash and returns the postings
    /// joined with their song metadata, each tagged with the query anchor
    /// time it was probed with.
    pub fn lookup(&self, hashes: &[FingerprintHash]) -> Result<Vec<HashHit>, EngineError> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT f.time_offset, s.id, s.filename, s.title, s.artist, s.duration, s.created_at
             FROM fingerprints f
             JOIN songs s ON s.id = f.song_id
             WHERE f.hash = ?1",
        )?;

        let mut hits = Vec::new();
        for hash in hashes {
            let rows = stmt.query_map(params![hash.token], |row| {
                Ok(HashHit {
                    query_time: hash.time_offset,
                    stored_time: row.get(0)?,
                    song: SongRecord {
                        id: row.get(1)?,
                        filename: row.get(2)?,
                        title: row.get(3)?,
                        artist: row.get(4)?,
                        duration: row.get(5)?,
                        created_at: row.get(6)?,
                    },
                })
            })?;
            for row in rows {
                hits.push(row?);
            }
        }
        Ok(hits)
    }

    /// Returns every song record, id ascending.
    pub fn list_songs(&self) -> Result<Vec<SongRecord>, EngineError> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT id, filename, title, artist, duration, created_at FROM songs ORDER BY id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(SongRecord {
                id: row.get(0)?,
                filename: row.get(1)?,
                title: row.get(2)?,
                artist: row.get(3)?,
                duration: row.get(4)?,
                created_at: row.get(5)?,
            })
        })?;
        let mut songs = Vec::new();
        for row in rows {
            songs.push(row?);
        }
        Ok(songs)
    }

    /// Catalog counters: song count, posting count, and the mean posting
    /// count over enrolled songs.
    pub fn counts(&self) -> Result<CatalogCounts, EngineError> {
        let conn = self.lock();
        let total_songs: i64 = conn.query_row("SELECT COUNT(*) FROM songs", [], |row| row.get(0))?;
        let total_fingerprints: i64 =
            conn.query_row("SELECT COUNT(*) FROM fingerprints", [], |row| row.get(0))?;
        let avg: Option<f64> = conn
            .query_row(
                "SELECT AVG(n) FROM (SELECT COUNT(*) AS n FROM fingerprints GROUP BY song_id)",
                [],
                |row| row.get(0),
            )
            .optional()?
            .flatten();
        Ok(CatalogCounts {
            total_songs,
            total_fingerprints,
            avg_fingerprints_per_song: avg.unwrap_or(0.0),
        })
    }

    /// Drops and recreates the catalog.
    pub fn reset(&self) -> Result<(), EngineError> {
        let conn = self.lock();
        conn.execute_batch(
            "DROP TABLE IF EXISTS fingerprints;
             DROP TABLE IF EXISTS songs;",
        )?;
        create_schema(&conn)?;
        Ok(())
    }
}

/// Idempotent schema creation.
fn create_schema(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS songs (
             id INTEGER PRIMARY KEY AUTOINCREMENT,
             filename TEXT UNIQUE NOT NULL,
             title TEXT,
             artist TEXT,
             duration REAL,
             created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
         );
         CREATE TABLE IF NOT EXISTS fingerprints (
             id INTEGER PRIMARY KEY AUTOINCREMENT,
             song_id INTEGER NOT NULL,
             hash TEXT NOT NULL,
             time_offset REAL NOT NULL,
             FOREIGN KEY (song_id) REFERENCES songs (id)
         );
         CREATE INDEX IF NOT EXISTS idx_fingerprints_hash ON fingerprints (hash);",
    )
}
