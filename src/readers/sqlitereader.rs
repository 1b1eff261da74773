// src/readers/sqlitereader.rs

//! Implements a [`SqliteReader`], a generic "query → event" extraction
//! framework for artifacts stored in an embedded SQLite database.
//!
//! SQLite requires random-access local storage, so the input stream is
//! first fully copied to a scratch file ([`NamedTempFile`]) which is
//! guaranteed to be deleted on every exit path. The scratch file is
//! opened read-only and its tables listed; a stream that is not a
//! SQLite database, or lacks one of the configured required tables, is
//! rejected with [`ParseError::FormatMismatch`] and the scratch file
//! released immediately.
//!
//! Extraction runs each configured `(query, callback)` pair in order,
//! streaming rows one at a time. The lazy pull contract is implemented
//! with a worker thread feeding a bounded channel of capacity 1: the
//! worker blocks until the consumer pulls, and a consumer that stops
//! pulling (drops the [`SqliteEventIter`]) unblocks and terminates the
//! worker, which releases the database handle and scratch file
//! together.
//!
//! [`SqliteReader`]: self::SqliteReader
//! [`NamedTempFile`]: https://docs.rs/tempfile/latest/tempfile/struct.NamedTempFile.html
//! [`ParseError::FormatMismatch`]: crate::common::ParseError

use std::collections::HashSet;
use std::io::{Read, Write};
use std::thread;
use std::thread::JoinHandle;

use ::crossbeam_channel::{bounded, Receiver, Sender};
use ::rusqlite::{params, Connection, OpenFlags, Row};
#[allow(unused_imports)]
use ::si_trace_print::{defn, defo, defx, defñ};
use ::tempfile::{Builder, NamedTempFile};

use crate::common::{FPath, Offset, ParseError, ResultS3};
use crate::data::datetime::FixedOffset;
use crate::data::event::Event;
use crate::de_wrn;
use crate::readers::{EventReader, ResultNextEvent, Summary};

/// Column names adopted as an event's `offset` when a callback leaves
/// it unset.
const ID_COLUMN_NAMES: [&str; 3] = ["id", "rowid", "_id"];

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// query configuration
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Ambient context passed to every row callback: the open connection
/// (for secondary, self-referential lookups) and the per-run timezone.
pub struct QueryContext<'c> {
    conn: &'c Connection,
    pub tz_offset: FixedOffset,
}

impl<'c> QueryContext<'c> {
    pub fn new(
        conn: &'c Connection,
        tz_offset: FixedOffset,
    ) -> QueryContext<'c> {
        QueryContext { conn, tz_offset }
    }

    /// The open database, for secondary queries issued from within a
    /// callback.
    pub fn conn(&self) -> &Connection {
        self.conn
    }

    /// Resolve a parent/child chain, e.g. a filesystem path stored as a
    /// relations table. `query` must take one `?1` parameter (a row id)
    /// and select `(segment, parent_id)`; a `NULL` or non-positive
    /// parent, or a missing row, terminates the chain. Segments are
    /// returned root-first.
    ///
    /// The walk keeps an explicit visited set; a cyclic relation graph
    /// in the source data yields [`ParseError::RecordMalformed`] instead
    /// of recursing forever.
    ///
    /// [`ParseError::RecordMalformed`]: crate::common::ParseError
    pub fn walk_chain(
        &self,
        query: &str,
        row_id: i64,
    ) -> std::result::Result<Vec<String>, ParseError> {
        defn!("({:?}, {})", query, row_id);
        let mut visited: HashSet<i64> = HashSet::new();
        let mut segments: Vec<String> = Vec::new();
        let mut id: i64 = row_id;
        loop {
            if !visited.insert(id) {
                defx!("cycle at id {}", id);
                return Err(ParseError::RecordMalformed {
                    offset: row_id.max(0) as Offset,
                    reason: format!("cycle in relation chain at id {}", id),
                });
            }
            let found: std::result::Result<(String, Option<i64>), ::rusqlite::Error> =
                self.conn.query_row(query, params![id], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, Option<i64>>(1)?))
                });
            match found {
                Ok((segment, parent)) => {
                    segments.push(segment);
                    match parent {
                        Some(parent) if parent > 0 => id = parent,
                        _ => break,
                    }
                }
                Err(::rusqlite::Error::QueryReturnedNoRows) => break,
                Err(err) => return Err(ParseError::from(err)),
            }
        }
        segments.reverse();
        defx!("{} segments", segments.len());

        Ok(segments)
    }
}

/// Turns one result row into zero or more events; one implementation
/// per configured query.
pub trait SqliteRowCallback: Send {
    fn on_row(
        &mut self,
        row: &Row,
        ctx: &QueryContext,
    ) -> std::result::Result<Vec<Event>, ParseError>;
}

/// One `(query text, row callback)` pair.
pub struct SqliteQuery {
    pub sql: String,
    pub callback: Box<dyn SqliteRowCallback>,
}

impl SqliteQuery {
    pub fn new(
        sql: &str,
        callback: Box<dyn SqliteRowCallback>,
    ) -> SqliteQuery {
        SqliteQuery {
            sql: sql.to_string(),
            callback,
        }
    }
}

/// Configuration of one artifact format: the tables that must be
/// present, and the queries to run.
pub struct SqliteConfig {
    pub required_tables: Vec<String>,
    pub queries: Vec<SqliteQuery>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// SqliteReader
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// List the table names of an open database, lowercased.
fn list_tables(conn: &Connection) -> std::result::Result<HashSet<String>, ::rusqlite::Error> {
    let mut stmt = conn.prepare("SELECT name FROM sqlite_master WHERE type = 'table'")?;
    let mut tables: HashSet<String> = HashSet::new();
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(0)?;
        tables.insert(name.to_ascii_lowercase());
    }

    Ok(tables)
}

/// Embedded-database record-extraction framework. See the
/// [module documentation].
///
/// [module documentation]: self
pub struct SqliteReader {
    path: FPath,
    // declared before `ntf`; the connection must close before the
    // scratch file is removed
    conn: Connection,
    ntf: NamedTempFile,
    config: SqliteConfig,
    tz_offset: FixedOffset,
}

impl std::fmt::Debug for SqliteReader {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter,
    ) -> std::fmt::Result {
        f.debug_struct("SqliteReader")
            .field("path", &self.path)
            .field("scratch", &self.ntf.path())
            .field("queries", &self.config.queries.len())
            .finish()
    }
}

impl SqliteReader {
    /// Copy the input stream to a scratch file, open it, and check the
    /// required tables. Returns [`ParseError::FormatMismatch`] when the
    /// stream is not a SQLite database or a required table is missing;
    /// the scratch file is deleted on every error path.
    ///
    /// [`ParseError::FormatMismatch`]: crate::common::ParseError
    pub fn open(
        input: &mut dyn Read,
        path: FPath,
        config: SqliteConfig,
        tz_offset: FixedOffset,
    ) -> std::result::Result<SqliteReader, ParseError> {
        defn!("({:?})", path);
        let mut ntf: NamedTempFile = Builder::new()
            .prefix("chronosift-")
            .suffix(".sqlite")
            .tempfile()?;
        let copied: u64 = std::io::copy(input, ntf.as_file_mut())?;
        ntf.as_file_mut().flush()?;
        defo!("copied {} bytes to scratch file {:?}", copied, ntf.path());
        let conn: Connection = Connection::open_with_flags(
            ntf.path(),
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        let tables: HashSet<String> = match list_tables(&conn) {
            Ok(tables) => tables,
            Err(err) => {
                // SQLITE_NOTADB and friends; not this format
                defx!("not a database: {}", err);
                return Err(ParseError::FormatMismatch {
                    path,
                    format: "sqlite database",
                    reason: err.to_string(),
                });
            }
        };
        for required in config.required_tables.iter() {
            if !tables.contains(required.to_ascii_lowercase().as_str()) {
                defx!("missing table {:?}", required);
                return Err(ParseError::FormatMismatch {
                    path,
                    format: "sqlite database",
                    reason: format!("required table {:?} not present", required),
                });
            }
        }
        defx!("verified; {} tables", tables.len());

        Ok(SqliteReader {
            path,
            conn,
            ntf,
            config,
            tz_offset,
        })
    }

    /// Path of the scratch copy.
    #[cfg(test)]
    pub fn scratch_fpath(&self) -> FPath {
        self.ntf.path().to_string_lossy().into_owned()
    }

    /// Begin extraction. The returned iterator pulls events lazily; the
    /// worker thread suspends between pulls on the bounded channel.
    pub fn events(self) -> SqliteEventIter {
        defñ!("({:?})", self.path);
        let path: FPath = self.path.clone();
        let (tx, rx) = bounded::<std::result::Result<Event, ParseError>>(1);
        let handle: JoinHandle<()> = thread::spawn(move || self.run(tx));

        SqliteEventIter {
            path,
            rx: Some(rx),
            handle: Some(handle),
            done: false,
            summary: Summary::default(),
        }
    }

    /// Worker: run every configured query, post-process and send each
    /// event. Returning from this function drops the connection and
    /// then the scratch file, whether extraction completed, a query
    /// failed, or the consumer hung up.
    fn run(
        mut self,
        tx: Sender<std::result::Result<Event, ParseError>>,
    ) {
        defn!("({:?})", self.path);
        let ctx = QueryContext::new(&self.conn, self.tz_offset);
        for query in self.config.queries.iter_mut() {
            let mut stmt = match self.conn.prepare(query.sql.as_str()) {
                Ok(stmt) => stmt,
                Err(err) => {
                    let _ = tx.send(Err(ParseError::from(err)));
                    defx!("prepare failed");
                    return;
                }
            };
            let column_names: Vec<String> = stmt
                .column_names()
                .iter()
                .map(|name| name.to_string())
                .collect();
            let id_index: Option<usize> = column_names.iter().position(|name| {
                ID_COLUMN_NAMES.contains(&name.to_ascii_lowercase().as_str())
            });
            let mut rows = match stmt.query([]) {
                Ok(rows) => rows,
                Err(err) => {
                    let _ = tx.send(Err(ParseError::from(err)));
                    defx!("query failed");
                    return;
                }
            };
            // rows are streamed one at a time, never materialized in bulk
            loop {
                let row: &Row = match rows.next() {
                    Ok(Some(row)) => row,
                    Ok(None) => break,
                    Err(err) => {
                        let _ = tx.send(Err(ParseError::from(err)));
                        defx!("row fetch failed");
                        return;
                    }
                };
                let events: Vec<Event> = match query.callback.on_row(row, &ctx) {
                    Ok(events) => events,
                    Err(err) => {
                        de_wrn!("{:?}: dropping row: {}", self.path, err);
                        continue;
                    }
                };
                for mut event in events {
                    if event.offset() == 0 {
                        if let Some(index) = id_index {
                            if let Ok(id) = row.get::<usize, i64>(index) {
                                if id > 0 {
                                    event.set_offset(id as Offset);
                                }
                            }
                        }
                    }
                    event.set_query(query.sql.as_str());
                    if tx.send(Ok(event)).is_err() {
                        // consumer stopped pulling
                        defx!("consumer hung up");
                        return;
                    }
                }
            }
        }
        defx!("all queries done");
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// SqliteEventIter
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The pull side of a running [`SqliteReader`] extraction.
///
/// Dropping this before exhaustion terminates the worker and releases
/// the database handle and scratch file deterministically.
pub struct SqliteEventIter {
    path: FPath,
    rx: Option<Receiver<std::result::Result<Event, ParseError>>>,
    handle: Option<JoinHandle<()>>,
    done: bool,
    summary: Summary,
}

impl SqliteEventIter {
    /// Disconnect the channel, then wait for the worker to release the
    /// database handle and scratch file.
    fn finish(&mut self) {
        self.done = true;
        self.rx = None;
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl EventReader for SqliteEventIter {
    fn next_event(&mut self) -> ResultNextEvent {
        if self.done {
            return ResultS3::Done;
        }
        let received = match self.rx.as_ref() {
            Some(rx) => rx.recv(),
            None => {
                self.done = true;
                return ResultS3::Done;
            }
        };
        match received {
            Ok(Ok(event)) => {
                self.summary.count_events += 1;
                ResultS3::Found(event)
            }
            Ok(Err(err)) => {
                self.finish();
                ResultS3::Err(err)
            }
            Err(_) => {
                // worker finished and dropped its sender
                self.finish();
                ResultS3::Done
            }
        }
    }

    fn path(&self) -> &FPath {
        &self.path
    }

    fn summary(&self) -> Summary {
        self.summary
    }
}

impl Iterator for SqliteEventIter {
    type Item = std::result::Result<Event, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_event() {
            ResultS3::Found(event) => Some(Ok(event)),
            ResultS3::Done => None,
            ResultS3::Err(err) => Some(Err(err)),
        }
    }
}

impl Drop for SqliteEventIter {
    fn drop(&mut self) {
        self.finish();
    }
}
