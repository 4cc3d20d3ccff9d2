use diesel::r2d2::{ConnectionManager, Pool, PoolError};
use diesel::{PgConnection, prelude::*, sql_query};

pub type DbPool = Pool<ConnectionManager<PgConnection>>;

pub fn establish_pool(database_url: &str) -> Result<DbPool, PoolError> {
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    Pool::builder().build(manager)
}

// Creates the readings table and its timestamp index when they are missing.
// `contents` is plain JSON rather than JSONB so the submitted key order survives.
pub fn ensure_schema(connection: &mut PgConnection) -> Result<(), diesel::result::Error> {
    sql_query(
        "CREATE TABLE IF NOT EXISTS lecturas (\
            id SERIAL PRIMARY KEY, \
            \"timestamp\" TIMESTAMPTZ NOT NULL, \
            contents JSON NOT NULL)",
    )
    .execute(connection)?;

    sql_query("CREATE INDEX IF NOT EXISTS lecturas_timestamp_idx ON lecturas (\"timestamp\")")
        .execute(connection)?;

    Ok(())
}
