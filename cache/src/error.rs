use std::path::PathBuf;

/// Failure of a whole load pass. No partially built cache is ever returned.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("unable to open snapshot {path:?}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },
    #[error("unable to load table '{table}': {source}")]
    Table {
        table: &'static str,
        #[source]
        source: rusqlite::Error,
    },
    #[error("snapshot has no 'dbchange' row")]
    MissingDbChange,
}
