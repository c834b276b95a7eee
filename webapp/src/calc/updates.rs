//! Resolution of available updates for installed packages.
//!
//! The snapshot delivers the packages of every name in ascending version order, so "newer"
//! means "at a later position" and no version comparison happens here.
use crate::calc::Calculate;
use crate::error::{Error, Result};
use cache::{ArchId, Cache, ErrataId, PkgId, RepoDetail, RepoId, StreamId};
use log::{debug, warn};
use rayon::prelude::*;
use rpmrepo::{ModuleStream, Nevra};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct UpdatesRequest {
    pub package_list: Option<Vec<String>>,
    pub repository_list: Option<Vec<String>>,
    pub modules_list: Option<Vec<ModuleStream>>,
    pub releasever: Option<String>,
    pub basearch: Option<String>,
    /// Honoured by the current API version only
    #[serde(default)]
    pub security_only: bool,
}

impl UpdatesRequest {
    pub fn validate(&self) -> Result<()> {
        if self.package_list.is_none() {
            return Err(Error::MissingField("package_list"));
        }
        for module in self.modules_list.iter().flatten() {
            if module.module.is_empty() {
                return Err(Error::InvalidModule("module_name"));
            }
            if module.stream.is_empty() {
                return Err(Error::InvalidModule("module_stream"));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Options {
    /// Attach summary and description of the installed package
    pub include_text: bool,
    /// Only consider security errata
    pub security_only: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct Update {
    pub package: String,
    pub erratum: String,
    pub repository: String,
    pub basearch: String,
    pub releasever: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PackageUpdates {
    /// Missing when the package could not be resolved at all
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available_updates: Option<Vec<Update>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UpdatesResponse {
    pub update_list: BTreeMap<String, PackageUpdates>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository_list: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modules_list: Option<Vec<ModuleStream>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub releasever: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub basearch: Option<String>,
}

/// Revisions of the updates endpoint, differing in the engine options only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdatesApi {
    V1,
    V2,
    V3,
}

impl UpdatesApi {
    pub fn from_version(version: u8) -> Result<Self> {
        match version {
            1 => Ok(UpdatesApi::V1),
            2 => Ok(UpdatesApi::V2),
            3 => Ok(UpdatesApi::V3),
            other => Err(Error::UnsupportedVersion(other)),
        }
    }

    pub fn options(self, request: &UpdatesRequest) -> Options {
        match self {
            UpdatesApi::V1 => Options {
                include_text: true,
                security_only: true,
            },
            UpdatesApi::V2 => Options {
                include_text: false,
                security_only: true,
            },
            UpdatesApi::V3 => Options {
                include_text: false,
                security_only: request.security_only,
            },
        }
    }
}

/// Updates request bound to the API revision it came through.
#[derive(Debug, Clone)]
pub struct Updates {
    pub api: UpdatesApi,
    pub request: UpdatesRequest,
}

impl Calculate for Updates {
    type Response = UpdatesResponse;

    fn validate(&self) -> Result<()> {
        self.request.validate()
    }

    fn calculate(&self, cache: &Cache) -> Result<UpdatesResponse> {
        Ok(resolve(cache, &self.request, self.api.options(&self.request)))
    }
}

/// Repository matches a requested releasever/basearch. Repositories without the value are
/// matched by a substring of their URL.
fn repo_matches(value: Option<&str>, url: &str, wanted: Option<&str>) -> bool {
    match (wanted, value) {
        (None, _) => true,
        (Some(wanted), Some(value)) => value == wanted,
        (Some(wanted), None) => url.contains(wanted),
    }
}

fn available_repos(cache: &Cache, req: &UpdatesRequest) -> HashSet<RepoId> {
    let mut repos: HashSet<RepoId> = match &req.repository_list {
        Some(labels) if !labels.is_empty() => labels
            .iter()
            .filter_map(|label| cache.repo_label_ids.get(label))
            .flatten()
            .copied()
            .collect(),
        _ => cache.repos.keys().copied().collect(),
    };
    repos.retain(|id| {
        cache.repos.get(id).map_or(false, |repo| {
            repo_matches(repo.releasever.as_deref(), &repo.url, req.releasever.as_deref())
                && repo_matches(repo.basearch.as_deref(), &repo.url, req.basearch.as_deref())
        })
    });
    repos
}

fn module_stream_ids(cache: &Cache, modules: &[ModuleStream]) -> HashSet<StreamId> {
    modules
        .iter()
        .filter_map(|m| cache.module_streams.get(m))
        .flatten()
        .copied()
        .collect()
}

/// Product and release boundary of the installed package, derived from its repositories.
struct Scope<'a> {
    products: HashSet<i64>,
    releasevers: HashSet<&'a str>,
}

impl<'a> Scope<'a> {
    fn of(cache: &'a Cache, pkg: PkgId) -> Self {
        let repos = cache.repo_ids(pkg).iter().filter_map(|id| cache.repos.get(id));
        let mut scope = Scope {
            products: HashSet::new(),
            releasevers: HashSet::new(),
        };
        for repo in repos {
            scope.products.insert(repo.product_id);
            scope.releasevers.insert(repo.releasever.as_deref().unwrap_or(""));
        }
        scope
    }

    fn contains(&self, repo: &RepoDetail) -> bool {
        self.products.contains(&repo.product_id)
            && self
                .releasevers
                .contains(repo.releasever.as_deref().unwrap_or(""))
    }
}

struct Installed<'a> {
    pkg: PkgId,
    arch_id: ArchId,
    ordered: &'a [PkgId],
    next: usize,
}

struct Context<'a> {
    cache: &'a Cache,
    repos: HashSet<RepoId>,
    /// Set when the request carries a module list
    streams: Option<HashSet<StreamId>>,
    options: Options,
}

impl<'a> Context<'a> {
    /// A module-tied pair passes only when every stream it needs is enabled. Pairs not tied
    /// to any module always pass.
    fn module_allowed(&self, pkg: PkgId, erratum: ErrataId) -> bool {
        let enabled = match &self.streams {
            Some(enabled) => enabled,
            None => return true,
        };
        match self.cache.pkg_errata_streams.get(&(pkg, erratum)) {
            Some(required) => required.iter().all(|s| enabled.contains(s)),
            None => true,
        }
    }

    /// Repositories shipping `pkg` through `erratum`, restricted to the available ones and
    /// to the installed package's scope.
    fn update_repos(&self, pkg: PkgId, erratum: ErrataId, scope: &Scope<'_>) -> Vec<&'a RepoDetail> {
        let cache = self.cache;
        let errata_repos: HashSet<RepoId> = cache
            .errata_repos
            .get(&erratum)
            .into_iter()
            .flatten()
            .filter(|id| self.repos.contains(id))
            .copied()
            .collect();

        cache
            .repo_ids(pkg)
            .iter()
            .filter(|id| errata_repos.contains(id))
            .filter_map(|id| cache.repos.get(id))
            .filter(|repo| scope.contains(repo))
            .collect()
    }

    /// Installed package, the ordered packages of its name and the position after its last
    /// index entry.
    fn locate(&self, nevra: &Nevra) -> Option<Installed<'a>> {
        let cache = self.cache;
        let ids = cache.nevra_ids(nevra)?;
        let ordered = cache.updates.get(&ids.name_id)?;
        let positions = cache.updates_index.get(&ids.name_id)?.get(&ids.evr_id)?;

        let pkg = positions
            .iter()
            .filter_map(|&pos| ordered.get(pos))
            .filter(|pkg| {
                cache
                    .packages
                    .get(pkg)
                    .map_or(false, |detail| detail.arch_id == ids.arch_id)
            })
            .last()?;
        Some(Installed {
            pkg: *pkg,
            arch_id: ids.arch_id,
            ordered,
            next: positions.last()? + 1,
        })
    }

    fn package_updates(&self, input: &str) -> PackageUpdates {
        let nevra = match Nevra::parse(input) {
            Ok(nevra) => nevra,
            Err(e) => {
                debug!("Skipping {}", e);
                return PackageUpdates::default();
            }
        };
        let Installed {
            pkg: installed,
            arch_id,
            ordered,
            next,
        } = match self.locate(&nevra) {
            Some(found) => found,
            None => return PackageUpdates::default(),
        };

        let cache = self.cache;
        let mut entry = PackageUpdates {
            available_updates: Some(vec![]),
            ..PackageUpdates::default()
        };
        if self.options.include_text {
            if let Some(detail) = cache.packages.get(&installed) {
                let text = |id| Some(cache.string(id).to_string()).filter(|s| !s.is_empty());
                entry.summary = text(detail.summary_id);
                entry.description = text(detail.description_id);
            }
        }

        if ordered.last() == Some(&installed) {
            return entry;
        }

        let scope = Scope::of(cache, installed);
        let mut updates = vec![];
        for &candidate in ordered.get(next..).unwrap_or_default() {
            let errata = match cache.pkg_errata.get(&candidate) {
                Some(errata) => errata,
                None => continue,
            };
            let detail = match cache.packages.get(&candidate) {
                Some(detail) => detail,
                None => continue,
            };
            if !cache.arch_compatible(arch_id, detail.arch_id) {
                continue;
            }
            let package = cache.format_package(detail);

            for &errata_id in errata {
                let (name, erratum) = match cache
                    .errata_names
                    .get(&errata_id)
                    .and_then(|name| cache.errata.get(name).map(|e| (name, e)))
                {
                    Some(found) => found,
                    None => {
                        warn!("Erratum {} of package {} has no detail", errata_id, candidate);
                        continue;
                    }
                };
                if self.options.security_only && !erratum.is_security() {
                    continue;
                }
                if !self.module_allowed(candidate, errata_id) {
                    continue;
                }
                for repo in self.update_repos(candidate, errata_id, &scope) {
                    updates.push(Update {
                        package: package.clone(),
                        erratum: name.clone(),
                        repository: repo.label.clone(),
                        basearch: repo.basearch.clone().unwrap_or_default(),
                        releasever: repo.releasever.clone().unwrap_or_default(),
                    });
                }
            }
        }

        updates.sort();
        entry.available_updates = Some(updates);
        entry
    }
}

/// Finds the available updates of every requested package. Packages which cannot be parsed
/// or are unknown are reported without `available_updates`; they never fail the request.
pub fn resolve(cache: &Cache, req: &UpdatesRequest, options: Options) -> UpdatesResponse {
    let ctx = Context {
        cache,
        repos: available_repos(cache, req),
        streams: req
            .modules_list
            .as_ref()
            .map(|modules| module_stream_ids(cache, modules)),
        options,
    };

    let packages = req.package_list.as_deref().unwrap_or_default();
    let update_list = packages
        .par_iter()
        .map(|input| (input.clone(), ctx.package_updates(input)))
        .collect();

    UpdatesResponse {
        update_list,
        repository_list: req.repository_list.clone().filter(|l| !l.is_empty()),
        modules_list: req.modules_list.clone(),
        releasever: req.releasever.clone(),
        basearch: req.basearch.clone(),
    }
}
