use crate::calc::*;
use crate::error::Result;
use cache::Cache;
use chrono::{DateTime, Utc};
use rpmrepo::Module;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ErrataRequest {
    pub errata_list: Option<Vec<String>>,
    pub modified_since: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub paging: RequestPaging,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErratumInfo {
    pub severity: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    pub reference_list: Vec<String>,
    pub updated: String,
    pub issued: String,
    pub description: Option<String>,
    pub summary: Option<String>,
    pub solution: Option<String>,
    pub url: String,
    pub synopsis: String,
    pub cve_list: Vec<String>,
    pub bugzilla_list: Vec<String>,
    pub package_list: Vec<String>,
    pub source_package_list: Vec<String>,
    pub modules_list: Vec<Module>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrataResponse {
    #[serde(flatten)]
    pub paging: ResponsePaging,
    pub errata_list: BTreeMap<String, ErratumInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified_since: Option<String>,
}

impl Calculate for ErrataRequest {
    type Response = ErrataResponse;

    fn validate(&self) -> Result<()> {
        require_list(&self.errata_list, "errata_list")
    }

    fn calculate(&self, cache: &Cache) -> Result<ErrataResponse> {
        let requested = self.errata_list.as_deref().unwrap_or_default();
        let names = expand_names(requested, cache.errata.keys())?;

        let (page, paging) = paginate(names, self.paging, |name| {
            cache.errata.get(name).map_or(false, |det| {
                self.modified_since.map_or(true, |since| {
                    after(det.updated, since) || after(det.issued, since)
                })
            })
        });

        let mut errata_list = BTreeMap::new();
        for name in page {
            let det = match cache.errata.get(&name) {
                Some(det) => det,
                None => continue,
            };
            let (package_list, source_package_list) = split_by_type(cache, &det.pkg_ids);
            let cve_list = det
                .cves
                .iter()
                .filter_map(|id| cache.cve_names.get(id))
                .cloned()
                .collect();
            let info = ErratumInfo {
                severity: det.severity.clone(),
                kind: det.kind.clone(),
                reference_list: det.refs.clone(),
                updated: format_date(det.updated),
                issued: format_date(det.issued),
                description: det.description.clone(),
                summary: det.summary.clone(),
                solution: det.solution.clone(),
                url: det.url.clone(),
                synopsis: det.synopsis.clone(),
                cve_list,
                bugzilla_list: det.bugzillas.clone(),
                package_list,
                source_package_list,
                modules_list: det.modules.clone(),
            };
            errata_list.insert(name, info);
        }

        Ok(ErrataResponse {
            paging,
            errata_list,
            modified_since: self.modified_since.map(|d| d.to_rfc3339()),
        })
    }
}
