use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool, PoolError};
use diesel::sql_types::Integer;

pub type PgPool = Pool<ConnectionManager<PgConnection>>;

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("failed to build connection pool: {0}")]
    Pool(#[from] PoolError),
    #[error("database test query failed: {0}")]
    Probe(#[from] diesel::result::Error),
}

/// Builds the pool and runs `SELECT 1` so a bad `DATABASE_URL` fails at
/// startup instead of on the first request.
pub fn establish_pool(database_url: &str, max_size: u32) -> Result<PgPool, DbError> {
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    let pool = Pool::builder().max_size(max_size).build(manager).map_err(|e| {
        log::error!("Failed to establish database connection: {}", e);
        e
    })?;

    let mut conn = pool.get()?;
    let probe: i32 = diesel::select(diesel::dsl::sql::<Integer>("1")).get_result(&mut conn)?;
    log::info!("Database test query result: {}", probe);
    Ok(pool)
}
