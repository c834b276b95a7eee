use crate::calc::*;
use crate::error::Result;
use cache::Cache;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const RED_HAT_SOURCE: &str = "Red Hat";

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CvesRequest {
    pub cve_list: Option<Vec<String>>,
    pub modified_since: Option<DateTime<Utc>>,
    pub published_since: Option<DateTime<Utc>>,
    #[serde(default)]
    pub rh_only: bool,
    #[serde(flatten)]
    pub paging: RequestPaging,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CveInfo {
    pub impact: String,
    pub synopsis: String,
    pub description: String,
    pub public_date: String,
    pub modified_date: String,
    pub redhat_url: String,
    pub secondary_url: String,
    pub cvss2_score: String,
    pub cvss2_metrics: String,
    pub cvss3_score: String,
    pub cvss3_metrics: String,
    pub cwe_list: Vec<String>,
    pub errata_list: Vec<String>,
    pub package_list: Vec<String>,
    pub source_package_list: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CvesResponse {
    #[serde(flatten)]
    pub paging: ResponsePaging,
    pub cve_list: BTreeMap<String, CveInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified_since: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_since: Option<String>,
}

impl Calculate for CvesRequest {
    type Response = CvesResponse;

    fn validate(&self) -> Result<()> {
        require_list(&self.cve_list, "cve_list")
    }

    fn calculate(&self, cache: &Cache) -> Result<CvesResponse> {
        let requested = self.cve_list.as_deref().unwrap_or_default();
        let names = expand_names(requested, cache.cves.keys())?;

        let (page, paging) = paginate(names, self.paging, |name| {
            let det = match cache.cves.get(name) {
                Some(det) => det,
                None => return false,
            };
            // Either timestamp being newer is enough
            let modified = self.modified_since.map_or(true, |since| {
                after(det.modified_date, since) || after(det.published_date, since)
            });
            let published = self
                .published_since
                .map_or(true, |since| after(det.published_date, since));
            let source = !self.rh_only || det.source == RED_HAT_SOURCE;
            modified && published && source
        });

        let mut cve_list = BTreeMap::new();
        for name in page {
            let det = match cache.cves.get(&name) {
                Some(det) => det,
                None => continue,
            };
            let (package_list, source_package_list) = split_by_type(cache, &det.pkg_ids);
            let errata_list = det
                .errata_ids
                .iter()
                .filter_map(|id| cache.errata_names.get(id))
                .cloned()
                .collect();
            let info = CveInfo {
                impact: det.impact.clone(),
                synopsis: name.clone(),
                description: det.description.clone(),
                public_date: format_date(det.published_date),
                modified_date: format_date(det.modified_date),
                redhat_url: det.redhat_url.clone().unwrap_or_default(),
                secondary_url: det.secondary_url.clone().unwrap_or_default(),
                cvss2_score: format_score(det.cvss2_score),
                cvss2_metrics: det.cvss2_metrics.clone().unwrap_or_default(),
                cvss3_score: format_score(det.cvss3_score),
                cvss3_metrics: det.cvss3_metrics.clone().unwrap_or_default(),
                cwe_list: det.cwes.clone(),
                errata_list,
                package_list,
                source_package_list,
            };
            cve_list.insert(name, info);
        }

        Ok(CvesResponse {
            paging,
            cve_list,
            modified_since: self.modified_since.map(|d| d.to_rfc3339()),
            published_since: self.published_since.map(|d| d.to_rfc3339()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::testutil::snapshot_cache;

    fn request(list: &[&str]) -> CvesRequest {
        CvesRequest {
            cve_list: Some(list.iter().map(|c| c.to_string()).collect()),
            ..CvesRequest::default()
        }
    }

    fn date(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    fn names(resp: &CvesResponse) -> Vec<&str> {
        resp.cve_list.keys().map(String::as_str).collect()
    }

    #[test]
    fn test_regex_expansion() {
        let cache = snapshot_cache();
        let resp = request(&["CVE-2020-.*"]).calculate(&cache).unwrap();
        assert_eq!(names(&resp), vec!["CVE-2020-0001", "CVE-2020-0002", "CVE-2020-1234"]);
        assert_eq!(
            resp.paging,
            ResponsePaging {
                page: 1,
                page_size: 3,
                pages: 1
            }
        );
    }

    #[test]
    fn test_single_literal_matches_like_a_regex() {
        let cache = snapshot_cache();
        let single = request(&["CVE-2019-1000"]).calculate(&cache).unwrap();
        let literal = request(&["CVE-2019-1000", "CVE-2019-1000"])
            .calculate(&cache)
            .unwrap();
        assert_eq!(single, literal);
        assert_eq!(names(&single), vec!["CVE-2019-1000"]);
    }

    #[test]
    fn test_unknown_names_are_dropped() {
        let cache = snapshot_cache();
        let resp = request(&["CVE-2020-1234", "CVE-9999-0000"])
            .calculate(&cache)
            .unwrap();
        assert_eq!(names(&resp), vec!["CVE-2020-1234"]);
        assert_eq!(resp.paging.pages, 1);
    }

    #[test]
    fn test_filters() {
        let cache = snapshot_cache();

        let mut req = request(&["CVE-.*"]);
        req.rh_only = true;
        assert_eq!(
            names(&req.calculate(&cache).unwrap()),
            vec!["CVE-2020-0001", "CVE-2020-0002"]
        );

        let mut req = request(&["CVE-2020-.*"]);
        req.published_since = Some(date("2020-01-01T12:00:00Z"));
        assert_eq!(
            names(&req.calculate(&cache).unwrap()),
            vec!["CVE-2020-0002", "CVE-2020-1234"]
        );

        // Published or modified after the bound
        let mut req = request(&["CVE-.*"]);
        req.modified_since = Some(date("2020-01-10T00:00:00Z"));
        let resp = req.calculate(&cache).unwrap();
        assert_eq!(
            names(&resp),
            vec!["CVE-2019-1000", "CVE-2020-0001", "CVE-2020-1234"]
        );
        assert_eq!(resp.modified_since.as_deref(), Some("2020-01-10T00:00:00+00:00"));
        assert_eq!(resp.published_since, None);
    }

    #[test]
    fn test_output() {
        let cache = snapshot_cache();
        let resp = request(&["CVE-2020-0001"]).calculate(&cache).unwrap();
        let info = &resp.cve_list["CVE-2020-0001"];
        assert_eq!(info.synopsis, "CVE-2020-0001");
        assert_eq!(info.impact, "Important");
        assert_eq!(info.cvss3_score, "7.500");
        assert_eq!(info.cvss2_score, "");
        assert_eq!(info.public_date, "2020-01-01T00:00:00+00:00");
        assert_eq!(info.cwe_list, vec!["CWE-20", "CWE-79"]);
        assert_eq!(info.errata_list, vec!["RHSA-2020:0001"]);
        assert_eq!(
            info.package_list,
            vec!["kernel-2.0-1.el7.x86_64", "kernel-2.0-1.el7.i686"]
        );
        assert_eq!(info.source_package_list, vec!["kernel-2.0-1.el7.src"]);

        let body = json::to_value(&resp).unwrap();
        assert_eq!(body["page"], 1);
        assert_eq!(body["pages"], 1);
        assert!(body.get("modified_since").is_none());
    }

    #[test]
    fn test_paging() {
        let cache = snapshot_cache();
        let mut req = request(&["CVE-.*"]);
        req.paging = RequestPaging {
            page: 2,
            page_size: 3,
        };
        let resp = req.calculate(&cache).unwrap();
        assert_eq!(names(&resp), vec!["CVE-2020-1234"]);
        assert_eq!(
            resp.paging,
            ResponsePaging {
                page: 2,
                page_size: 1,
                pages: 2
            }
        );
    }

    #[test]
    fn test_validate_and_bad_regex() {
        assert!(matches!(
            CvesRequest::default().validate(),
            Err(Error::MissingField("cve_list"))
        ));
        assert!(matches!(request(&[]).validate(), Err(Error::EmptyList("cve_list"))));

        let cache = snapshot_cache();
        assert!(matches!(request(&["CVE-("]).calculate(&cache), Err(Error::Regex(_))));
    }

    #[test]
    fn test_request_wire_format() {
        let req: CvesRequest = json::from_str(
            r#"{"cve_list": ["CVE-.*"], "modified_since": "2020-01-10T00:00:00+00:00", "page": 2, "page_size": 10}"#,
        )
        .unwrap();
        assert_eq!(req.paging, RequestPaging { page: 2, page_size: 10 });
        assert_eq!(req.modified_since, Some(date("2020-01-10T00:00:00Z")));
        assert!(!req.rh_only);
    }
}
