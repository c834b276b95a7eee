use crate::calc::Calculate;
use crate::error::Result;
use cache::{Cache, DbChange};

/// Freshness of the published snapshot.
#[derive(Debug, Clone, Copy, Default)]
pub struct DbChangeRequest;

impl Calculate for DbChangeRequest {
    type Response = DbChange;

    fn calculate(&self, cache: &Cache) -> Result<DbChange> {
        Ok(cache.dbchange.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::snapshot_cache;

    #[test]
    fn test_dbchange() {
        let cache = snapshot_cache();
        let body = json::to_value(DbChangeRequest.calculate(&cache).unwrap()).unwrap();
        assert_eq!(body["exported"], "2020-06-04T12:00:00.123456Z");
        assert_eq!(body["repository_changes"], "2020-06-03T00:00:00Z");
        assert_eq!(body.as_object().unwrap().len(), 5);
    }
}
