//! Database schema and migrations for Courier.
//!
//! This module contains all database migrations that will be applied
//! sequentially when the database is first opened or upgraded.

/// Database migrations.
///
/// Each migration is a SQL script that will be executed in order.
/// The schema_version table tracks which migrations have been applied.
pub const MIGRATIONS: &[&str] = &[
    // v1: Subscription table - one row per known email address
    r#"
-- Subscriptions track an address's opt-out token and blocked status.
-- The primary key doubles as the unsubscribe token surfaced to templates.
CREATE TABLE subscription (
    id          TEXT PRIMARY KEY,
    email       TEXT NOT NULL UNIQUE,
    blocked     INTEGER NOT NULL DEFAULT 0,
    created_at  TEXT NOT NULL DEFAULT (datetime('now'))
);
"#,
    // v2: Mail queue table - durable tasks with delivery bookkeeping
    r#"
-- Queued mail tasks. Exactly one body column group is populated per row,
-- recorded in body_kind ('markdown', 'html' or 'text').
-- claimed_until is a delivery lease: NULL means unclaimed, a timestamp in
-- the past means the claiming process died and the item is claimable again.
CREATE TABLE mailqueue (
    id             TEXT PRIMARY KEY,
    to_addrs       TEXT NOT NULL,
    cc_addrs       TEXT NOT NULL DEFAULT '',
    bcc_addrs      TEXT NOT NULL DEFAULT '',
    from_addr      TEXT NOT NULL,
    subject        TEXT NOT NULL,
    body_kind      TEXT NOT NULL,
    body           TEXT NOT NULL,
    attempts       INTEGER NOT NULL DEFAULT 0,
    claimed_until  TEXT,
    next_eligible  TEXT NOT NULL,
    created_at     TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX idx_mailqueue_eligible ON mailqueue(next_eligible, claimed_until);
"#,
];
