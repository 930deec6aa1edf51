//! Database schema definitions

pub const CREATE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS security_events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    created_at BIGINT NOT NULL,
    updated_at BIGINT NOT NULL,
    kind TEXT NOT NULL,
    client_ip TEXT NOT NULL,
    timestamp BIGINT NOT NULL,      -- start of the minute bucket, unix millis
    attacks INTEGER NOT NULL DEFAULT 1,
    details TEXT NOT NULL DEFAULT ''
)
"#;

// One row per client, kind and minute bucket. Upserts resolve conflicts on it.
pub const CREATE_INDEX_BUCKET: &str =
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_security_events_bucket ON security_events(client_ip, kind, timestamp)";

// For most-recently-active listings
pub const CREATE_INDEX_UPDATED_AT: &str =
    "CREATE INDEX IF NOT EXISTS idx_security_events_updated_at ON security_events(updated_at DESC)";

pub const CREATE_INDEX_KIND_UPDATED_AT: &str =
    "CREATE INDEX IF NOT EXISTS idx_security_events_kind_updated_at ON security_events(kind, updated_at DESC)";
