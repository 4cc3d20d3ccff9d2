use std::sync::Arc;

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::r2d2::PoolError;
use serde_json::Value;
use thiserror::Error;

use crate::db::{self, DbPool};
use crate::models::{Lectura, NewLectura, Reading, StoredReading, without_timestamp};
use crate::schema::lecturas;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("connection pool error: {0}")]
    Pool(#[from] PoolError),

    #[error("query failed: {0}")]
    Query(#[from] diesel::result::Error),

    #[error("storage task failed: {0}")]
    Task(String),
}

/// Access to the `lecturas` collection. Results never carry the row identifier.
pub trait ReadingStore: Send + Sync {
    fn insert(&self, reading: &Reading, at: DateTime<Utc>) -> Result<(), StoreError>;

    fn find_all(&self) -> Result<Vec<StoredReading>, StoreError>;

    /// Readings with `start <= timestamp <= end`.
    fn find_in_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<StoredReading>, StoreError>;
}

pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Builds the pool and makes sure the table exists.
    pub fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = db::establish_pool(database_url)?;
        let mut conn = pool.get()?;
        db::ensure_schema(&mut conn)?;
        Ok(Self::new(pool))
    }
}

impl ReadingStore for PgStore {
    fn insert(&self, reading: &Reading, at: DateTime<Utc>) -> Result<(), StoreError> {
        let contents = Value::Object(without_timestamp(reading));
        let new_entry = NewLectura {
            timestamp: at,
            contents: &contents,
        };

        let mut conn = self.pool.get()?;
        diesel::insert_into(lecturas::table)
            .values(&new_entry)
            .execute(&mut conn)?;
        Ok(())
    }

    fn find_all(&self) -> Result<Vec<StoredReading>, StoreError> {
        let mut conn = self.pool.get()?;
        let rows = lecturas::table
            .select(Lectura::as_select())
            .order(lecturas::id.asc())
            .load(&mut conn)?;
        Ok(rows.into_iter().map(StoredReading::from).collect())
    }

    fn find_in_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<StoredReading>, StoreError> {
        let mut conn = self.pool.get()?;
        let rows = lecturas::table
            .filter(lecturas::timestamp.ge(start))
            .filter(lecturas::timestamp.le(end))
            .select(Lectura::as_select())
            .order(lecturas::id.asc())
            .load(&mut conn)?;
        Ok(rows.into_iter().map(StoredReading::from).collect())
    }
}

/// Runs a store call on the blocking pool so diesel never stalls the async workers.
pub async fn run_blocking<T, F>(store: Arc<dyn ReadingStore>, call: F) -> Result<T, StoreError>
where
    T: Send + 'static,
    F: FnOnce(&dyn ReadingStore) -> Result<T, StoreError> + Send + 'static,
{
    rocket::tokio::task::spawn_blocking(move || call(store.as_ref()))
        .await
        .map_err(|err| StoreError::Task(err.to_string()))?
}


#[cfg(test)]
mod tests {
    use super::memory::MemoryStore;
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[rocket::async_test]
    async fn run_blocking_returns_store_results() {
        let store = Arc::new(MemoryStore::default());
        let reading = json!({"t1": 1}).as_object().cloned().unwrap();
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

        let shared: Arc<dyn ReadingStore> = store.clone();
        run_blocking(shared.clone(), move |s| s.insert(&reading, at))
            .await
            .unwrap();
        let rows = run_blocking(shared, |s| s.find_all()).await.unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].timestamp, at);
        assert_eq!(store.len(), 1);
    }

    #[test]
    #[ignore = "needs a Postgres DATABASE_URL"]
    fn postgres_range_query_includes_both_bounds() {
        dotenvy::dotenv().ok();
        let Ok(database_url) = std::env::var("DATABASE_URL") else {
            return;
        };
        let store = PgStore::connect(&database_url).unwrap();

        // Rows from earlier runs share the table; tag this run's rows.
        let run = Utc::now().timestamp_micros();
        let start = Utc.with_ymd_and_hms(1999, 1, 1, 0, 0, 0).unwrap();
        let end = start + chrono::Duration::days(1);
        let offsets = [(1, -1), (2, 0), (3, 3_600), (4, 86_400), (5, 86_401)];
        for (n, seconds) in offsets {
            let reading = json!({"run": run, "n": n, "timestamp": "ignored"})
                .as_object()
                .cloned()
                .unwrap();
            store
                .insert(&reading, start + chrono::Duration::seconds(seconds))
                .unwrap();
        }

        let rows: Vec<StoredReading> = store
            .find_in_range(start, end)
            .unwrap()
            .into_iter()
            .filter(|row| row.fields.get("run") == Some(&json!(run)))
            .collect();

        let ns: Vec<i64> = rows.iter().map(|row| row.fields["n"].as_i64().unwrap()).collect();
        assert_eq!(ns, [2, 3, 4]);
        assert_eq!(rows[0].timestamp, start);
        assert_eq!(rows[2].timestamp, end);

        let keys: Vec<&str> = rows[0].fields.keys().map(String::as_str).collect();
        assert_eq!(keys, ["run", "n"]);

        let all: Vec<i64> = store
            .find_all()
            .unwrap()
            .into_iter()
            .filter(|row| row.fields.get("run") == Some(&json!(run)))
            .map(|row| row.fields["n"].as_i64().unwrap())
            .collect();
        assert_eq!(all, [1, 2, 3, 4, 5]);
    }
}
