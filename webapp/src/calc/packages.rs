use crate::calc::{require_list, Calculate};
use crate::error::Result;
use cache::Cache;
use log::debug;
use rpmrepo::Nevra;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PackagesRequest {
    pub package_list: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PackageRepo {
    pub label: String,
    pub name: String,
    pub basearch: String,
    pub releasever: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PackageInfo {
    pub summary: String,
    pub description: String,
    /// Empty for source packages and packages without a known source
    pub source_package: String,
    /// Binaries built from this package, when it is a source package
    pub package_list: Vec<String>,
    pub repositories: Vec<PackageRepo>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PackagesResponse {
    pub package_list: BTreeMap<String, PackageInfo>,
}

impl Calculate for PackagesRequest {
    type Response = PackagesResponse;

    fn validate(&self) -> Result<()> {
        require_list(&self.package_list, "package_list")
    }

    fn calculate(&self, cache: &Cache) -> Result<PackagesResponse> {
        let mut package_list = BTreeMap::new();
        for input in self.package_list.iter().flatten() {
            let nevra = match Nevra::parse(input) {
                Ok(nevra) => nevra,
                Err(e) => {
                    debug!("Skipping {}", e);
                    continue;
                }
            };
            let (pkg_id, det) = match cache
                .resolve(&nevra)
                .and_then(|id| cache.packages.get(&id).map(|det| (id, det)))
            {
                Some(found) => found,
                None => continue,
            };

            let source_package = det
                .src_pkg_id
                .and_then(|src| cache.format_pkg_id(src))
                .unwrap_or_default();
            let binaries = cache
                .src_binaries
                .get(&pkg_id)
                .into_iter()
                .flatten()
                .filter_map(|id| cache.format_pkg_id(*id))
                .collect();
            let repositories = cache
                .repo_ids(pkg_id)
                .iter()
                .filter_map(|id| cache.repos.get(id))
                .map(|repo| PackageRepo {
                    label: repo.label.clone(),
                    name: repo.name.clone(),
                    basearch: repo.basearch.clone().unwrap_or_default(),
                    releasever: repo.releasever.clone().unwrap_or_default(),
                })
                .collect();

            package_list.insert(
                input.clone(),
                PackageInfo {
                    summary: cache.string(det.summary_id).to_string(),
                    description: cache.string(det.description_id).to_string(),
                    source_package,
                    package_list: binaries,
                    repositories,
                },
            );
        }
        Ok(PackagesResponse { package_list })
    }
}
