use crate::localize;
use crate::schema::lecturas;
use chrono::DateTime;
use chrono::Utc;
use diesel::prelude::*;
use serde_json::{Map, Value};

/// Name of the server-assigned field carrying the ingestion instant.
pub const TIMESTAMP_FIELD: &str = "timestamp";

/// One sensor sample as submitted: field name to JSON value, in submission order.
pub type Reading = Map<String, Value>;

#[derive(Queryable, Selectable, Debug)]
#[diesel(table_name = lecturas)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Lectura {
    pub id: i32,
    pub timestamp: DateTime<Utc>,
    pub contents: Value,
}

#[derive(Insertable)]
#[diesel(table_name = lecturas)]
pub struct NewLectura<'a> {
    pub timestamp: DateTime<Utc>,
    pub contents: &'a Value,
}

/// A persisted reading with its identifier already dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredReading {
    pub timestamp: DateTime<Utc>,
    pub fields: Reading,
}

impl StoredReading {
    pub fn new(reading: &Reading, timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            fields: without_timestamp(reading),
        }
    }

    /// Shape returned by the listing endpoint: timestamp as an RFC 3339 UTC string.
    pub fn into_document(self) -> Reading {
        let rendered = localize::to_api_time(self.timestamp);
        with_timestamp(self.fields, rendered)
    }

    /// Shape written to spreadsheets: timestamp localized for display.
    pub fn into_export_row(self) -> Reading {
        let rendered = localize::to_display_time(self.timestamp);
        with_timestamp(self.fields, rendered)
    }
}

impl From<Lectura> for StoredReading {
    fn from(row: Lectura) -> Self {
        // This service only writes objects, but `lecturas` is a plain table that
        // other writers (manual SQL, imports) may fill; keep their value visible.
        let fields = match row.contents {
            Value::Object(map) => map,
            other => {
                let mut map = Map::new();
                map.insert("contents".to_string(), other);
                map
            }
        };
        Self {
            timestamp: row.timestamp,
            fields,
        }
    }
}

/// Copies a reading, dropping any client-supplied timestamp while keeping field order.
pub fn without_timestamp(reading: &Reading) -> Reading {
    reading
        .iter()
        .filter(|(key, _)| key.as_str() != TIMESTAMP_FIELD)
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

fn with_timestamp(mut fields: Reading, rendered: String) -> Reading {
    fields.insert(TIMESTAMP_FIELD.to_string(), Value::String(rendered));
    fields
}
