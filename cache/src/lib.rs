pub mod ids;
pub mod table;
pub mod structs;
pub mod load;
pub mod handle;
pub mod error;

pub use ids::*;
pub use structs::*;
pub use load::load_cache;
pub use handle::CacheHandle;
pub use error::LoadError;

#[cfg(test)]
pub(crate) mod testutil {
    use rusqlite::Connection;

    pub const SNAPSHOT: &str = include_str!("../testdata/snapshot.sql");

    pub fn snapshot_connection() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SNAPSHOT).unwrap();
        conn
    }
}
