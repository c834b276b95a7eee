use clap::Parser;
use std::path::PathBuf;

/// Answers package update and vulnerability queries from an exported snapshot.
///
/// Requests are read from stdin, one JSON envelope per line; `refresh-cache` reloads the snapshot.
#[derive(Debug, Clone, Parser)]
#[command(name = "webapp", version)]
pub struct Config {
    /// Snapshot the cache is loaded from
    #[arg(long, env = "DUMP_PATH", default_value = "/data/vmaas.db")]
    pub dump: PathBuf,

    /// Log filter, in env_logger syntax
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Start without a cache, until the first `refresh-cache`
    #[arg(long)]
    pub no_preload: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags() {
        let config =
            Config::try_parse_from(&["webapp", "--dump", "/tmp/x.db", "--log-level", "debug", "--no-preload"])
                .unwrap();
        assert_eq!(config.dump, PathBuf::from("/tmp/x.db"));
        assert_eq!(config.log_level, "debug");
        assert!(config.no_preload);
    }
}
