//! `SQLite` schema for the inventory store.
//!
//! - `devices` keeps one row per device; the property bag is JSON text and
//!   `parent_uid` is a soft reference (no foreign key) so an externally
//!   deleted parent never blocks updates of its children
//! - `discovery_snapshots` keeps the raw collector payload verbatim next to
//!   the snapshot status
//! - `store_meta` mirrors the applied schema version

/// Migration v1: resource tables plus store metadata.
pub const MIGRATION_V1_SQL: &str = r"
CREATE TABLE IF NOT EXISTS devices (
    uid TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    device_type TEXT NOT NULL DEFAULT '',
    manufacturer TEXT NOT NULL DEFAULT '',
    part_number TEXT NOT NULL DEFAULT '',
    serial_number TEXT NOT NULL DEFAULT '',
    parent_uid TEXT,
    parent_serial_number TEXT NOT NULL DEFAULT '',
    properties_json TEXT NOT NULL DEFAULT '{}',
    status_phase TEXT NOT NULL DEFAULT '',
    status_message TEXT NOT NULL DEFAULT '',
    status_ready INTEGER NOT NULL DEFAULT 0 CHECK (status_ready IN (0, 1)),
    created_at_us INTEGER NOT NULL,
    updated_at_us INTEGER NOT NULL,
    CHECK (parent_uid IS NULL OR parent_uid <> uid)
);

CREATE TABLE IF NOT EXISTS discovery_snapshots (
    uid TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    raw_data TEXT NOT NULL,
    phase TEXT NOT NULL DEFAULT 'Pending'
        CHECK (phase IN ('Pending', 'Processing', 'Completed', 'Error')),
    message TEXT NOT NULL DEFAULT '',
    ready INTEGER NOT NULL DEFAULT 0 CHECK (ready IN (0, 1)),
    created_at_us INTEGER NOT NULL,
    updated_at_us INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS store_meta (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    schema_version INTEGER NOT NULL
);

INSERT OR IGNORE INTO store_meta (id, schema_version) VALUES (1, 1);
";

/// Migration v2: lookup indexes for serial and parent resolution.
pub const MIGRATION_V2_SQL: &str = r"
CREATE INDEX IF NOT EXISTS idx_devices_serial
    ON devices(serial_number);

CREATE INDEX IF NOT EXISTS idx_devices_parent
    ON devices(parent_uid);

CREATE INDEX IF NOT EXISTS idx_snapshots_phase_created
    ON discovery_snapshots(phase, created_at_us);
";

/// Indexes every fully migrated database must carry.
pub const REQUIRED_INDEXES: &[&str] = &[
    "idx_devices_serial",
    "idx_devices_parent",
    "idx_snapshots_phase_created",
];
