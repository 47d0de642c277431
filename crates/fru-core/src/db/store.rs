//! [`Store`] implementation over the `SQLite` inventory database.
//!
//! Every write is a single statement, so each create/update is atomic on its
//! own. Nothing here spans a whole reconciliation run.

use std::path::Path;

use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::model::device::{Device, DeviceSpec, DeviceStatus, Properties};
use crate::model::snapshot::{DiscoverySnapshot, SnapshotPhase, SnapshotSpec, SnapshotStatus};
use crate::model::{API_VERSION, Metadata, ResourceKind, SCHEMA_VERSION};
use crate::store::{Store, StoreError, attach_children};

const DEVICE_COLUMNS: &str = "uid, name, device_type, manufacturer, part_number, serial_number, \
     parent_uid, parent_serial_number, properties_json, status_phase, status_message, \
     status_ready, created_at_us, updated_at_us";

const SNAPSHOT_COLUMNS: &str =
    "uid, name, raw_data, phase, message, ready, created_at_us, updated_at_us";

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (or create) the database at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self {
            conn: super::open_inventory(path)?,
        })
    }

    /// Fresh in-memory store with the full schema.
    ///
    /// # Errors
    ///
    /// Returns an error if the schema cannot be applied.
    pub fn in_memory() -> Result<Self> {
        Ok(Self {
            conn: super::open_in_memory()?,
        })
    }

    #[must_use]
    pub const fn from_connection(conn: Connection) -> Self {
        Self { conn }
    }

    #[must_use]
    pub const fn connection(&self) -> &Connection {
        &self.conn
    }

    fn children_of(&self, uid: &str) -> Result<Vec<String>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT uid FROM devices WHERE parent_uid = ?1 ORDER BY uid")?;
        let rows = stmt.query_map(params![uid], |row| row.get::<_, String>(0))?;
        let mut children = Vec::new();
        for row in rows {
            children.push(row?);
        }
        Ok(children)
    }
}

// ---------------------------------------------------------------------------
// Row decoding
// ---------------------------------------------------------------------------

struct DeviceRow {
    uid: String,
    name: String,
    device_type: String,
    manufacturer: String,
    part_number: String,
    serial_number: String,
    parent_uid: Option<String>,
    parent_serial_number: String,
    properties_json: String,
    status_phase: String,
    status_message: String,
    status_ready: bool,
    created_at_us: i64,
    updated_at_us: i64,
}

fn read_device_row(row: &Row<'_>) -> rusqlite::Result<DeviceRow> {
    Ok(DeviceRow {
        uid: row.get(0)?,
        name: row.get(1)?,
        device_type: row.get(2)?,
        manufacturer: row.get(3)?,
        part_number: row.get(4)?,
        serial_number: row.get(5)?,
        parent_uid: row.get(6)?,
        parent_serial_number: row.get(7)?,
        properties_json: row.get(8)?,
        status_phase: row.get(9)?,
        status_message: row.get(10)?,
        status_ready: row.get(11)?,
        created_at_us: row.get(12)?,
        updated_at_us: row.get(13)?,
    })
}

fn corrupt(kind: ResourceKind, uid: &str, reason: impl ToString) -> StoreError {
    StoreError::Corrupt {
        kind,
        uid: uid.to_string(),
        reason: reason.to_string(),
    }
}

fn timestamp(kind: ResourceKind, uid: &str, micros: i64) -> Result<DateTime<Utc>, StoreError> {
    DateTime::<Utc>::from_timestamp_micros(micros)
        .ok_or_else(|| corrupt(kind, uid, format!("timestamp {micros} out of range")))
}

impl DeviceRow {
    fn into_device(self) -> Result<Device, StoreError> {
        let kind = ResourceKind::Device;
        let properties: Properties = serde_json::from_str(&self.properties_json)
            .map_err(|e| corrupt(kind, &self.uid, format!("properties_json: {e}")))?;
        let created_at = timestamp(kind, &self.uid, self.created_at_us)?;
        let updated_at = timestamp(kind, &self.uid, self.updated_at_us)?;

        Ok(Device {
            api_version: API_VERSION.to_string(),
            kind,
            schema_version: SCHEMA_VERSION.to_string(),
            metadata: Metadata {
                uid: self.uid,
                name: self.name,
                created_at,
                updated_at,
            },
            spec: DeviceSpec {
                device_type: self.device_type,
                manufacturer: self.manufacturer,
                part_number: self.part_number,
                serial_number: self.serial_number,
                parent_id: self.parent_uid,
                parent_serial_number: self.parent_serial_number,
                properties,
            },
            status: DeviceStatus {
                phase: self.status_phase,
                message: self.status_message,
                ready: self.status_ready,
                children_device_ids: Vec::new(),
            },
        })
    }
}

struct SnapshotRow {
    uid: String,
    name: String,
    raw_data: String,
    phase: String,
    message: String,
    ready: bool,
    created_at_us: i64,
    updated_at_us: i64,
}

fn read_snapshot_row(row: &Row<'_>) -> rusqlite::Result<SnapshotRow> {
    Ok(SnapshotRow {
        uid: row.get(0)?,
        name: row.get(1)?,
        raw_data: row.get(2)?,
        phase: row.get(3)?,
        message: row.get(4)?,
        ready: row.get(5)?,
        created_at_us: row.get(6)?,
        updated_at_us: row.get(7)?,
    })
}

impl SnapshotRow {
    fn into_snapshot(self) -> Result<DiscoverySnapshot, StoreError> {
        let kind = ResourceKind::DiscoverySnapshot;
        let raw_data = serde_json::from_str(&self.raw_data)
            .map_err(|e| corrupt(kind, &self.uid, format!("raw_data: {e}")))?;
        let phase: SnapshotPhase = self
            .phase
            .parse()
            .map_err(|e| corrupt(kind, &self.uid, e))?;
        let created_at = timestamp(kind, &self.uid, self.created_at_us)?;
        let updated_at = timestamp(kind, &self.uid, self.updated_at_us)?;

        Ok(DiscoverySnapshot {
            api_version: API_VERSION.to_string(),
            kind,
            schema_version: SCHEMA_VERSION.to_string(),
            metadata: Metadata {
                uid: self.uid,
                name: self.name,
                created_at,
                updated_at,
            },
            spec: SnapshotSpec { raw_data },
            status: SnapshotStatus {
                phase,
                message: self.message,
                ready: self.ready,
            },
        })
    }
}

fn encode_properties(device: &Device) -> Result<String, StoreError> {
    serde_json::to_string(&device.spec.properties)
        .map_err(|e| corrupt(ResourceKind::Device, device.uid(), e))
}

fn is_primary_key_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
    )
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

impl Store for SqliteStore {
    fn get_device(&self, uid: &str) -> Result<Device, StoreError> {
        let sql = format!("SELECT {DEVICE_COLUMNS} FROM devices WHERE uid = ?1");
        let row = self
            .conn
            .query_row(&sql, params![uid], read_device_row)
            .optional()?
            .ok_or_else(|| StoreError::NotFound {
                kind: ResourceKind::Device,
                uid: uid.to_string(),
            })?;

        let mut device = row.into_device()?;
        device.status.children_device_ids = self.children_of(uid)?;
        Ok(device)
    }

    fn list_devices(&self) -> Result<Vec<Device>, StoreError> {
        let sql = format!("SELECT {DEVICE_COLUMNS} FROM devices ORDER BY created_at_us, uid");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], read_device_row)?;

        let mut devices = Vec::new();
        for row in rows {
            devices.push(row?.into_device()?);
        }
        attach_children(&mut devices);
        Ok(devices)
    }

    fn create_device(&self, device: &Device) -> Result<(), StoreError> {
        let properties = encode_properties(device)?;
        let sql = format!(
            "INSERT INTO devices ({DEVICE_COLUMNS}) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)"
        );
        let result = self.conn.execute(
            &sql,
            params![
                device.uid(),
                device.name(),
                device.spec.device_type,
                device.spec.manufacturer,
                device.spec.part_number,
                device.spec.serial_number,
                device.spec.parent_id,
                device.spec.parent_serial_number,
                properties,
                device.status.phase,
                device.status.message,
                device.status.ready,
                device.metadata.created_at.timestamp_micros(),
                device.metadata.updated_at.timestamp_micros(),
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_primary_key_violation(&e) => Err(StoreError::Conflict {
                kind: ResourceKind::Device,
                uid: device.uid().to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    fn update_device(&self, device: &Device) -> Result<(), StoreError> {
        let properties = encode_properties(device)?;
        let changed = self.conn.execute(
            "UPDATE devices SET
                name = ?2,
                device_type = ?3,
                manufacturer = ?4,
                part_number = ?5,
                serial_number = ?6,
                parent_uid = ?7,
                parent_serial_number = ?8,
                properties_json = ?9,
                status_phase = ?10,
                status_message = ?11,
                status_ready = ?12,
                updated_at_us = ?13
             WHERE uid = ?1",
            params![
                device.uid(),
                device.name(),
                device.spec.device_type,
                device.spec.manufacturer,
                device.spec.part_number,
                device.spec.serial_number,
                device.spec.parent_id,
                device.spec.parent_serial_number,
                properties,
                device.status.phase,
                device.status.message,
                device.status.ready,
                device.metadata.updated_at.timestamp_micros(),
            ],
        )?;

        if changed == 0 {
            return Err(StoreError::NotFound {
                kind: ResourceKind::Device,
                uid: device.uid().to_string(),
            });
        }
        Ok(())
    }

    fn get_snapshot(&self, uid: &str) -> Result<DiscoverySnapshot, StoreError> {
        let sql = format!("SELECT {SNAPSHOT_COLUMNS} FROM discovery_snapshots WHERE uid = ?1");
        self.conn
            .query_row(&sql, params![uid], read_snapshot_row)
            .optional()?
            .ok_or_else(|| StoreError::NotFound {
                kind: ResourceKind::DiscoverySnapshot,
                uid: uid.to_string(),
            })?
            .into_snapshot()
    }

    fn list_snapshots(&self) -> Result<Vec<DiscoverySnapshot>, StoreError> {
        let sql = format!(
            "SELECT {SNAPSHOT_COLUMNS} FROM discovery_snapshots ORDER BY created_at_us, uid"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], read_snapshot_row)?;

        let mut snapshots = Vec::new();
        for row in rows {
            snapshots.push(row?.into_snapshot()?);
        }
        Ok(snapshots)
    }

    fn create_snapshot(&self, snapshot: &DiscoverySnapshot) -> Result<(), StoreError> {
        let raw_data = serde_json::to_string(&snapshot.spec.raw_data)
            .map_err(|e| corrupt(ResourceKind::DiscoverySnapshot, snapshot.uid(), e))?;
        let sql = format!(
            "INSERT INTO discovery_snapshots ({SNAPSHOT_COLUMNS}) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"
        );
        let result = self.conn.execute(
            &sql,
            params![
                snapshot.uid(),
                snapshot.name(),
                raw_data,
                snapshot.status.phase.as_str(),
                snapshot.status.message,
                snapshot.status.ready,
                snapshot.metadata.created_at.timestamp_micros(),
                snapshot.metadata.updated_at.timestamp_micros(),
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_primary_key_violation(&e) => Err(StoreError::Conflict {
                kind: ResourceKind::DiscoverySnapshot,
                uid: snapshot.uid().to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    fn update_snapshot(&self, snapshot: &DiscoverySnapshot) -> Result<(), StoreError> {
        let raw_data = serde_json::to_string(&snapshot.spec.raw_data)
            .map_err(|e| corrupt(ResourceKind::DiscoverySnapshot, snapshot.uid(), e))?;
        let changed = self.conn.execute(
            "UPDATE discovery_snapshots SET
                name = ?2,
                raw_data = ?3,
                phase = ?4,
                message = ?5,
                ready = ?6,
                updated_at_us = ?7
             WHERE uid = ?1",
            params![
                snapshot.uid(),
                snapshot.name(),
                raw_data,
                snapshot.status.phase.as_str(),
                snapshot.status.message,
                snapshot.status.ready,
                snapshot.metadata.updated_at.timestamp_micros(),
            ],
        )?;

        if changed == 0 {
            return Err(StoreError::NotFound {
                kind: ResourceKind::DiscoverySnapshot,
                uid: snapshot.uid().to_string(),
            });
        }
        Ok(())
    }
}
