use crate::calc::*;
use crate::error::Result;
use cache::Cache;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ReposRequest {
    pub repository_list: Option<Vec<String>>,
    pub modified_since: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub paging: RequestPaging,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RepoInfo {
    pub label: String,
    pub name: String,
    pub url: String,
    pub basearch: String,
    pub releasever: String,
    pub product: String,
    pub revision: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReposResponse {
    #[serde(flatten)]
    pub paging: ResponsePaging,
    /// One label may cover several repositories
    pub repository_list: BTreeMap<String, Vec<RepoInfo>>,
}

impl Calculate for ReposRequest {
    type Response = ReposResponse;

    fn validate(&self) -> Result<()> {
        require_list(&self.repository_list, "repository_list")
    }

    fn calculate(&self, cache: &Cache) -> Result<ReposResponse> {
        let requested = self.repository_list.as_deref().unwrap_or_default();
        let labels = expand_names(requested, cache.repo_label_ids.keys())?;

        let (page, paging) = paginate(labels, self.paging, |label| {
            let ids = cache.repo_label_ids.get(label).into_iter().flatten();
            ids.filter_map(|id| cache.repos.get(id)).any(|repo| {
                self.modified_since
                    .map_or(true, |since| after(repo.revision, since))
            })
        });

        let mut repository_list = BTreeMap::new();
        for label in page {
            let repos = cache
                .repo_label_ids
                .get(&label)
                .into_iter()
                .flatten()
                .filter_map(|id| cache.repos.get(id))
                .map(|repo| RepoInfo {
                    label: repo.label.clone(),
                    name: repo.name.clone(),
                    url: repo.url.clone(),
                    basearch: repo.basearch.clone().unwrap_or_default(),
                    releasever: repo.releasever.clone().unwrap_or_default(),
                    product: repo.product.clone(),
                    revision: format_date(repo.revision),
                })
                .collect();
            repository_list.insert(label, repos);
        }

        Ok(ReposResponse {
            paging,
            repository_list,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::snapshot_cache;

    fn request(list: &[&str]) -> ReposRequest {
        ReposRequest {
            repository_list: Some(list.iter().map(|c| c.to_string()).collect()),
            ..ReposRequest::default()
        }
    }

    #[test]
    fn test_label_covers_several_repos() {
        let cache = snapshot_cache();
        let resp = request(&["rhel-7-server-rpms"]).calculate(&cache).unwrap();
        let repos = &resp.repository_list["rhel-7-server-rpms"];
        let arches: Vec<_> = repos.iter().map(|r| r.basearch.as_str()).collect();
        assert_eq!(arches, vec!["x86_64", "i686"]);
        assert_eq!(repos[0].revision, "2020-01-01T00:00:00+00:00");
        assert_eq!(repos[0].product, "Red Hat Enterprise Linux Server");
    }

    #[test]
    fn test_regex_and_modified_since() {
        let cache = snapshot_cache();
        let resp = request(&["rhel-.*"]).calculate(&cache).unwrap();
        let labels: Vec<_> = resp.repository_list.keys().cloned().collect();
        assert_eq!(
            labels,
            vec![
                "rhel-7-server-rpms",
                "rhel-8-for-x86_64-appstream-rpms",
                "rhel-8-for-x86_64-baseos-rpms"
            ]
        );

        let mut req = request(&[".*"]);
        req.modified_since = Some("2020-05-01T00:00:00Z".parse().unwrap());
        let resp = req.calculate(&cache).unwrap();
        let labels: Vec<_> = resp.repository_list.keys().cloned().collect();
        // Repositories without a revision never pass the filter
        assert_eq!(
            labels,
            vec!["rhel-8-for-x86_64-appstream-rpms", "rhel-8-for-x86_64-baseos-rpms"]
        );
    }

    #[test]
    fn test_missing_metadata_is_empty() {
        let cache = snapshot_cache();
        let resp = request(&["legacy-rpms"]).calculate(&cache).unwrap();
        let legacy = &resp.repository_list["legacy-rpms"][0];
        assert_eq!(legacy.basearch, "");
        assert_eq!(legacy.releasever, "");
        assert_eq!(legacy.revision, "");
    }
}
