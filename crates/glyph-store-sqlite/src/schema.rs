//! SQL schema for the Glyph SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

-- Strictly append-only: no UPDATE or DELETE is ever issued against this
-- table. `seq` gives insertion order; newest-first is ORDER BY seq DESC.
CREATE TABLE IF NOT EXISTS predictions (
    seq         INTEGER PRIMARY KEY AUTOINCREMENT,
    time        TEXT    NOT NULL,   -- RFC 3339 UTC; server-assigned
    user_id     TEXT    NOT NULL,
    filename    TEXT,               -- NULL for canvas input
    pred        INTEGER NOT NULL,
    confidence  REAL,               -- NULL only in imported legacy rows
    model       TEXT                -- NULL = legacy single backend
);

CREATE INDEX IF NOT EXISTS predictions_user_idx ON predictions(user_id, seq);

PRAGMA user_version = 1;
";
