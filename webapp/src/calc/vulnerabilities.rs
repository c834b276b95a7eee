use crate::calc::updates::{resolve, Options, UpdatesRequest};
use crate::calc::Calculate;
use crate::error::Result;
use cache::Cache;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

/// Same shape as an updates request.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct VulnerabilitiesRequest(pub UpdatesRequest);

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VulnerabilitiesResponse {
    pub cve_list: Vec<String>,
}

impl Calculate for VulnerabilitiesRequest {
    type Response = VulnerabilitiesResponse;

    fn validate(&self) -> Result<()> {
        self.0.validate()
    }

    fn calculate(&self, cache: &Cache) -> Result<VulnerabilitiesResponse> {
        let options = Options {
            include_text: false,
            security_only: true,
        };
        let updates = resolve(cache, &self.0, options);

        let cve_list = updates
            .update_list
            .values()
            .filter_map(|entry| entry.available_updates.as_ref())
            .flatten()
            .map(|update| update.erratum.as_str())
            .unique()
            .filter_map(|erratum| cache.errata.get(erratum))
            .flat_map(|erratum| erratum.cves.iter())
            .filter_map(|id| cache.cve_names.get(id))
            .cloned()
            .sorted()
            .dedup()
            .collect();
        Ok(VulnerabilitiesResponse { cve_list })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::snapshot_cache;

    fn request(packages: &[&str]) -> VulnerabilitiesRequest {
        VulnerabilitiesRequest(UpdatesRequest {
            package_list: Some(packages.iter().map(|p| p.to_string()).collect()),
            ..UpdatesRequest::default()
        })
    }

    #[test]
    fn test_cves_of_security_updates() {
        let cache = snapshot_cache();
        let resp = request(&[
            "kernel-1.0-1.el7.x86_64",
            "kernel-2.0-1.el7.x86_64",
            "bash-1.0-1.el7.x86_64",
            "tzdata-2020a-1.el7.noarch",
            "postgresql-10.5-1.module+el8.x86_64",
            "garbage",
        ])
        .calculate(&cache)
        .unwrap();
        assert_eq!(resp.cve_list, vec!["CVE-2020-0001", "CVE-2020-0002"]);
    }

    #[test]
    fn test_nothing_vulnerable() {
        let cache = snapshot_cache();
        let resp = request(&["kernel-3.0-1.el7.x86_64"]).calculate(&cache).unwrap();
        assert!(resp.cve_list.is_empty());
        assert_eq!(json::to_string(&resp).unwrap(), r#"{"cve_list":[]}"#);
    }

    #[test]
    fn test_request_is_transparent() {
        let req: VulnerabilitiesRequest =
            json::from_str(r#"{"package_list": ["kernel-1.0-1.el7.x86_64"]}"#).unwrap();
        assert!(req.validate().is_ok());
        let req: VulnerabilitiesRequest = json::from_str("{}").unwrap();
        assert!(req.validate().is_err());
    }
}
