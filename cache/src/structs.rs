use crate::ids::*;
use chrono::{DateTime, Utc};
use rpmrepo::{format_nevra, Evr, Module, ModuleStream, Nevra};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// Surrogate ids of one concrete package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NevraIds {
    pub name_id: NameId,
    pub evr_id: EvrId,
    pub arch_id: ArchId,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PackageDetail {
    pub name_id: NameId,
    pub evr_id: EvrId,
    pub arch_id: ArchId,
    pub summary_id: StringId,
    pub description_id: StringId,
    pub src_pkg_id: Option<PkgId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RepoDetail {
    pub label: String,
    pub name: String,
    pub url: String,
    pub basearch: Option<String>,
    pub releasever: Option<String>,
    pub product: String,
    pub product_id: i64,
    pub revision: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ErrataDetail {
    pub id: ErrataId,
    pub synopsis: String,
    pub summary: Option<String>,
    /// `security`, `bugfix`, `enhancement`, ...
    pub kind: String,
    pub severity: Option<String>,
    pub description: Option<String>,
    pub solution: Option<String>,
    pub issued: Option<DateTime<Utc>>,
    pub updated: Option<DateTime<Utc>>,
    pub url: String,

    pub cves: Vec<CveId>,
    pub pkg_ids: Vec<PkgId>,
    pub module_pkg_ids: Vec<PkgId>,
    pub bugzillas: Vec<String>,
    pub refs: Vec<String>,
    pub modules: Vec<Module>,
}

impl ErrataDetail {
    /// Security advisories are the ones typed so, or fixing at least one CVE.
    pub fn is_security(&self) -> bool {
        self.kind == "security" || !self.cves.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CveDetail {
    pub id: CveId,
    pub redhat_url: Option<String>,
    pub secondary_url: Option<String>,
    pub cvss3_score: Option<f64>,
    pub cvss3_metrics: Option<String>,
    pub impact: String,
    pub published_date: Option<DateTime<Utc>>,
    pub modified_date: Option<DateTime<Utc>>,
    pub iava: Option<String>,
    pub description: String,
    pub cvss2_score: Option<f64>,
    pub cvss2_metrics: Option<String>,
    pub source: String,

    /// Sorted
    pub cwes: Vec<String>,
    pub pkg_ids: Vec<PkgId>,
    pub errata_ids: Vec<ErrataId>,
}

/// Freshness timestamps of the snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DbChange {
    pub errata_changes: DateTime<Utc>,
    pub cve_changes: DateTime<Utc>,
    pub repository_changes: DateTime<Utc>,
    pub last_change: DateTime<Utc>,
    pub exported: DateTime<Utc>,
}

/// One generation of the snapshot, indexed for lookups.
///
/// Built once by the loader and never mutated afterwards; a refresh replaces the whole value.
#[derive(Debug)]
pub struct Cache {
    pub name_ids: HashMap<String, NameId>,
    pub names: HashMap<NameId, String>,

    /// name -> packages, in ascending version order as delivered by the snapshot
    pub updates: HashMap<NameId, Vec<PkgId>>,
    /// name -> evr -> positions into `updates[name]`
    pub updates_index: HashMap<NameId, HashMap<EvrId, Vec<usize>>>,

    pub evr_ids: HashMap<Evr, EvrId>,
    pub evrs: HashMap<EvrId, Evr>,

    pub arch_ids: HashMap<String, ArchId>,
    pub arches: HashMap<ArchId, String>,
    /// installed arch -> arches allowed to update it
    pub arch_compat: HashMap<ArchId, HashSet<ArchId>>,

    pub packages: HashMap<PkgId, PackageDetail>,
    pub nevra_pkg_ids: HashMap<NevraIds, PkgId>,
    pub src_binaries: HashMap<PkgId, Vec<PkgId>>,

    pub repos: HashMap<RepoId, RepoDetail>,
    pub repo_label_ids: HashMap<String, Vec<RepoId>>,
    pub pkg_repos: HashMap<PkgId, Vec<RepoId>>,

    pub errata: HashMap<String, ErrataDetail>,
    pub errata_names: HashMap<ErrataId, String>,
    pub pkg_errata: HashMap<PkgId, Vec<ErrataId>>,
    pub errata_repos: HashMap<ErrataId, Vec<RepoId>>,

    pub cves: HashMap<String, CveDetail>,
    pub cve_names: HashMap<CveId, String>,

    /// Module stream builds a package/erratum pair is tied to
    pub pkg_errata_streams: HashMap<(PkgId, ErrataId), Vec<StreamId>>,
    pub module_streams: HashMap<ModuleStream, Vec<StreamId>>,

    pub strings: HashMap<StringId, String>,
    pub dbchange: DbChange,

    /// Rows of `updates`/`updates_index` which break the positional ordering contract
    pub ordering_violations: usize,
}

impl Cache {
    /// Interned text, empty when the id is unknown or its value is null.
    pub fn string(&self, id: StringId) -> &str {
        self.strings.get(&id).map_or("", String::as_str)
    }

    pub fn format_package(&self, pkg: &PackageDetail) -> String {
        let fallback = Evr::default();
        let name = self.names.get(&pkg.name_id).map_or("", String::as_str);
        let evr = self.evrs.get(&pkg.evr_id).unwrap_or(&fallback);
        let arch = self.arches.get(&pkg.arch_id).map_or("", String::as_str);
        format_nevra(name, evr, arch)
    }

    pub fn format_pkg_id(&self, id: PkgId) -> Option<String> {
        self.packages.get(&id).map(|pkg| self.format_package(pkg))
    }

    pub fn is_source(&self, pkg: &PackageDetail) -> bool {
        self.arches
            .get(&pkg.arch_id)
            .map_or(false, |arch| arch == "src")
    }

    /// Whether a package of arch `installed` may be updated by one of arch `candidate`.
    pub fn arch_compatible(&self, installed: ArchId, candidate: ArchId) -> bool {
        self.arch_compat
            .get(&installed)
            .map_or(false, |targets| targets.contains(&candidate))
    }

    pub fn nevra_ids(&self, nevra: &Nevra) -> Option<NevraIds> {
        Some(NevraIds {
            name_id: *self.name_ids.get(&nevra.name)?,
            evr_id: *self.evr_ids.get(&nevra.evr())?,
            arch_id: *self.arch_ids.get(&nevra.arch)?,
        })
    }

    /// Package id of an exact name, evr and arch, if the snapshot knows it.
    pub fn resolve(&self, nevra: &Nevra) -> Option<PkgId> {
        self.nevra_ids(nevra)
            .and_then(|ids| self.nevra_pkg_ids.get(&ids).copied())
    }

    pub fn repo_ids(&self, pkg: PkgId) -> &[RepoId] {
        self.pkg_repos.get(&pkg).map(Vec::as_slice).unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::snapshot_connection;

    fn cache() -> Cache {
        Cache::from_connection(&snapshot_connection()).unwrap()
    }

    #[test]
    fn test_resolve_and_format() {
        let cache = cache();
        let nevra = Nevra::parse("openssl-1:1.0-1.el8.x86_64").unwrap();
        let id = cache.resolve(&nevra).unwrap();
        assert_eq!(id, PkgId(301));
        assert_eq!(cache.format_pkg_id(id).unwrap(), "openssl-1:1.0-1.el8.x86_64");
        assert!(cache.resolve(&Nevra::parse("openssl-1.0-1.el8.x86_64").unwrap()).is_none());
        assert!(cache.format_pkg_id(PkgId(999)).is_none());
    }

    #[test]
    fn test_source_detection() {
        let cache = cache();
        assert!(cache.is_source(&cache.packages[&PkgId(303)]));
        assert!(!cache.is_source(&cache.packages[&PkgId(301)]));
    }

    #[test]
    fn test_arch_compat_is_directional() {
        let cache = cache();
        let x86_64 = cache.arch_ids["x86_64"];
        let i686 = cache.arch_ids["i686"];
        assert!(cache.arch_compatible(x86_64, i686));
        assert!(!cache.arch_compatible(i686, x86_64));
    }

    #[test]
    fn test_missing_strings_are_empty() {
        let cache = cache();
        assert_eq!(cache.string(StringId(1)), "The Linux kernel");
        assert_eq!(cache.string(StringId(99)), "");
        assert_eq!(cache.string(StringId(0)), "");
    }

    #[test]
    fn test_security_classification() {
        let cache = cache();
        assert!(cache.errata["RHSA-2020:2000"].is_security());
        assert!(!cache.errata["RHBA-2020:0002"].is_security());

        let mut bugfix_with_cve = cache.errata["RHBA-2020:0002"].clone();
        bugfix_with_cve.cves.push(CveId(1));
        assert!(bugfix_with_cve.is_security());
    }

    #[test]
    fn test_dbchange_wire_form() {
        let cache = cache();
        assert_eq!(
            serde_json::to_value(&cache.dbchange).unwrap(),
            serde_json::json!({
                "errata_changes": "2020-06-01T00:00:00Z",
                "cve_changes": "2020-06-02T00:00:00Z",
                "repository_changes": "2020-06-03T00:00:00Z",
                "last_change": "2020-06-03T00:00:00Z",
                "exported": "2020-06-04T12:00:00.123456Z"
            })
        );
    }
}
