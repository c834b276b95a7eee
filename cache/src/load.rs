use crate::error::LoadError;
use crate::ids::*;
use crate::structs::*;
use crate::table::*;
use log::{info, warn};
use rpmrepo::{Evr, Module, ModuleStream};
use rusqlite::{Connection, OpenFlags};
use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use std::path::Path;
use std::time::Instant;

/// Opens the snapshot read-only and builds a complete [`Cache`] out of it.
pub fn load_cache(path: impl AsRef<Path>) -> Result<Cache, LoadError> {
    let path = path.as_ref();
    info!("Loading cache from {:?}", path);
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .map_err(|source| LoadError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    Cache::from_connection(&conn)
}

/// Collects a join table into `key -> [value]`, keeping the row order of the table.
fn adjacency<T, K, V>(
    conn: &Connection,
    pair: impl Fn(T) -> (K, V),
) -> Result<HashMap<K, Vec<V>>, LoadError>
where
    T: Table,
    K: Eq + Hash,
{
    let mut map: HashMap<K, Vec<V>> = HashMap::new();
    scan::<T>(conn, |row| {
        let (k, v) = pair(row);
        map.entry(k).or_default().push(v);
    })?;
    Ok(map)
}

struct Packages {
    details: HashMap<PkgId, PackageDetail>,
    by_nevra: HashMap<NevraIds, PkgId>,
    src_binaries: HashMap<PkgId, Vec<PkgId>>,
}

fn load_packages(conn: &Connection) -> Result<Packages, LoadError> {
    let mut packages = Packages {
        details: HashMap::new(),
        by_nevra: HashMap::new(),
        src_binaries: HashMap::new(),
    };
    scan::<PackageDetailRow>(conn, |r| {
        let nevra = NevraIds {
            name_id: r.name_id,
            evr_id: r.evr_id,
            arch_id: r.arch_id,
        };
        if let Some(src) = r.source_package_id {
            packages.src_binaries.entry(src).or_default().push(r.id);
        }
        packages.by_nevra.insert(nevra, r.id);
        packages.details.insert(
            r.id,
            PackageDetail {
                name_id: r.name_id,
                evr_id: r.evr_id,
                arch_id: r.arch_id,
                summary_id: r.summary_id,
                description_id: r.description_id,
                src_pkg_id: r.source_package_id,
            },
        );
    })?;
    Ok(packages)
}

/// Reads the per-name version ordering. Positions must be the dense sequence `0..n` for each
/// name, anything else is counted as a violation.
fn load_updates(conn: &Connection) -> Result<(HashMap<NameId, Vec<PkgId>>, usize), LoadError> {
    let mut updates: HashMap<NameId, Vec<PkgId>> = HashMap::new();
    let mut violations = 0;
    scan::<UpdatesRow>(conn, |r| {
        let list = updates.entry(r.name_id).or_default();
        if r.package_order != list.len() as i64 {
            warn!(
                "Package {} of name {} has order {}, expected {}",
                r.package_id,
                r.name_id,
                r.package_order,
                list.len()
            );
            violations += 1;
        }
        list.push(r.package_id);
    })?;
    Ok((updates, violations))
}

type UpdatesIndex = HashMap<NameId, HashMap<EvrId, Vec<usize>>>;

fn load_updates_index(conn: &Connection) -> Result<(UpdatesIndex, usize), LoadError> {
    let mut index: UpdatesIndex = HashMap::new();
    let mut violations = 0;
    scan::<UpdatesIndexRow>(conn, |r| {
        if r.package_order < 0 {
            warn!("Negative position {} for name {}", r.package_order, r.name_id);
            violations += 1;
            return;
        }
        index
            .entry(r.name_id)
            .or_default()
            .entry(r.evr_id)
            .or_default()
            .push(r.package_order as usize);
    })?;
    Ok((index, violations))
}

/// Every indexed position has to point at a package carrying the indexed evr.
fn verify_index(
    updates: &HashMap<NameId, Vec<PkgId>>,
    index: &UpdatesIndex,
    packages: &HashMap<PkgId, PackageDetail>,
) -> usize {
    let mut violations = 0;
    for (name_id, evrs) in index {
        for (evr_id, positions) in evrs {
            for &pos in positions {
                let found = updates
                    .get(name_id)
                    .and_then(|list| list.get(pos))
                    .and_then(|pkg| packages.get(pkg));
                match found {
                    Some(pkg) if pkg.evr_id == *evr_id => {}
                    _ => {
                        warn!(
                            "Position {} of name {} does not hold evr {}",
                            pos, name_id, evr_id
                        );
                        violations += 1;
                    }
                }
            }
        }
    }
    violations
}

fn load_repos(
    conn: &Connection,
) -> Result<(HashMap<RepoId, RepoDetail>, HashMap<String, Vec<RepoId>>), LoadError> {
    let mut repos = HashMap::new();
    let mut labels: HashMap<String, Vec<RepoId>> = HashMap::new();
    scan::<RepoDetailRow>(conn, |r| {
        labels.entry(r.label.clone()).or_default().push(r.id);
        repos.insert(
            r.id,
            RepoDetail {
                label: r.label,
                name: r.name,
                url: r.url,
                basearch: r.basearch,
                releasever: r.releasever,
                product: r.product,
                product_id: r.product_id,
                revision: r.revision,
            },
        );
    })?;
    Ok((repos, labels))
}

struct Errata {
    details: HashMap<String, ErrataDetail>,
    names: HashMap<ErrataId, String>,
    by_pkg: HashMap<PkgId, Vec<ErrataId>>,
    repos: HashMap<ErrataId, Vec<RepoId>>,
    by_cve: HashMap<CveId, Vec<ErrataId>>,
    pkg_streams: HashMap<(PkgId, ErrataId), Vec<StreamId>>,
}

fn load_errata(conn: &Connection) -> Result<Errata, LoadError> {
    let mut by_pkg: HashMap<PkgId, Vec<ErrataId>> = HashMap::new();
    let mut pkgs: HashMap<ErrataId, Vec<PkgId>> = HashMap::new();
    scan::<PkgErrataRow>(conn, |r| {
        by_pkg.entry(r.pkg_id).or_default().push(r.errata_id);
        pkgs.entry(r.errata_id).or_default().push(r.pkg_id);
    })?;

    let repos = adjacency(conn, |r: ErrataRepoRow| (r.errata_id, r.repo_id))?;

    let mut cves: HashMap<ErrataId, Vec<CveId>> = HashMap::new();
    let mut by_cve: HashMap<CveId, Vec<ErrataId>> = HashMap::new();
    scan::<ErrataCveRow>(conn, |r| {
        cves.entry(r.errata_id).or_default().push(r.cve_id);
        by_cve.entry(r.cve_id).or_default().push(r.errata_id);
    })?;

    let mut bugzillas = adjacency(conn, |r: ErrataBugzillaRow| (r.errata_id, r.bugzilla))?;
    let mut refs = adjacency(conn, |r: ErrataRefRow| (r.errata_id, r.reference))?;
    let mut modules = adjacency(conn, |r: ErrataModuleRow| {
        let module = Module {
            name: r.module_name,
            stream: r.module_stream,
            version: r.module_version,
            context: r.module_context,
        };
        (r.errata_id, module)
    })?;

    let mut pkg_streams: HashMap<(PkgId, ErrataId), Vec<StreamId>> = HashMap::new();
    let mut module_pkgs: HashMap<ErrataId, Vec<PkgId>> = HashMap::new();
    scan::<ErrataModulePkgRow>(conn, |r| {
        pkg_streams
            .entry((r.pkg_id, r.errata_id))
            .or_default()
            .push(r.module_stream_id);
        let list = module_pkgs.entry(r.errata_id).or_default();
        if list.last() != Some(&r.pkg_id) {
            list.push(r.pkg_id);
        }
    })?;

    let mut details = HashMap::new();
    let mut names = HashMap::new();
    scan::<ErrataDetailRow>(conn, |r| {
        let id = r.id;
        names.insert(id, r.name.clone());
        details.insert(
            r.name,
            ErrataDetail {
                id,
                synopsis: r.synopsis,
                summary: r.summary,
                kind: r.kind,
                severity: r.severity,
                description: r.description,
                solution: r.solution,
                issued: r.issued,
                updated: r.updated,
                url: r.url,
                cves: cves.remove(&id).unwrap_or_default(),
                pkg_ids: pkgs.remove(&id).unwrap_or_default(),
                module_pkg_ids: module_pkgs.remove(&id).unwrap_or_default(),
                bugzillas: bugzillas.remove(&id).unwrap_or_default(),
                refs: refs.remove(&id).unwrap_or_default(),
                modules: modules.remove(&id).unwrap_or_default(),
            },
        );
    })?;

    Ok(Errata {
        details,
        names,
        by_pkg,
        repos,
        by_cve,
        pkg_streams,
    })
}

fn load_cves(
    conn: &Connection,
    mut errata: HashMap<CveId, Vec<ErrataId>>,
) -> Result<(HashMap<String, CveDetail>, HashMap<CveId, String>), LoadError> {
    let mut cwes = adjacency(conn, |r: CveCweRow| (r.cve_id, r.cwe))?;
    let mut pkgs = adjacency(conn, |r: CvePkgRow| (r.cve_id, r.pkg_id))?;

    let mut details = HashMap::new();
    let mut names = HashMap::new();
    scan::<CveDetailRow>(conn, |r| {
        let id = r.id;
        let mut cwe_list = cwes.remove(&id).unwrap_or_default();
        cwe_list.sort();
        names.insert(id, r.name.clone());
        details.insert(
            r.name,
            CveDetail {
                id,
                redhat_url: r.redhat_url,
                secondary_url: r.secondary_url,
                cvss3_score: r.cvss3_score,
                cvss3_metrics: r.cvss3_metrics,
                impact: r.impact.unwrap_or_default(),
                published_date: r.published_date,
                modified_date: r.modified_date,
                iava: r.iava,
                description: r.description.unwrap_or_default(),
                cvss2_score: r.cvss2_score,
                cvss2_metrics: r.cvss2_metrics,
                source: r.source.unwrap_or_default(),
                cwes: cwe_list,
                pkg_ids: pkgs.remove(&id).unwrap_or_default(),
                errata_ids: errata.remove(&id).unwrap_or_default(),
            },
        );
    })?;
    Ok((details, names))
}

fn load_dbchange(conn: &Connection) -> Result<DbChange, LoadError> {
    let mut first = None;
    scan::<DbChangeRow>(conn, |r| {
        if first.is_none() {
            first = Some(r);
        }
    })?;
    let r = first.ok_or(LoadError::MissingDbChange)?;
    Ok(DbChange {
        errata_changes: r.errata_changes,
        cve_changes: r.cve_changes,
        repository_changes: r.repository_changes,
        last_change: r.last_change,
        exported: r.exported,
    })
}

impl Cache {
    /// Builds a generation from an open snapshot connection. Any table failing to decode
    /// fails the whole build.
    pub fn from_connection(conn: &Connection) -> Result<Self, LoadError> {
        let started = Instant::now();

        let mut names = HashMap::new();
        let mut name_ids = HashMap::new();
        scan::<PackageNameRow>(conn, |r| {
            name_ids.insert(r.packagename.clone(), r.id);
            names.insert(r.id, r.packagename);
        })?;

        let mut evrs = HashMap::new();
        let mut evr_ids = HashMap::new();
        scan::<EvrRow>(conn, |r| {
            let evr = Evr::new(r.epoch, r.version, r.release);
            evr_ids.insert(evr.clone(), r.id);
            evrs.insert(r.id, evr);
        })?;

        let mut arches = HashMap::new();
        let mut arch_ids = HashMap::new();
        scan::<ArchRow>(conn, |r| {
            arch_ids.insert(r.arch.clone(), r.id);
            arches.insert(r.id, r.arch);
        })?;

        let mut arch_compat: HashMap<ArchId, HashSet<ArchId>> = HashMap::new();
        scan::<ArchCompatRow>(conn, |r| {
            arch_compat
                .entry(r.from_arch_id)
                .or_default()
                .insert(r.to_arch_id);
        })?;

        let mut strings = HashMap::new();
        scan::<StringRow>(conn, |r| {
            if let Some(s) = r.string {
                strings.insert(r.id, s);
            }
        })?;

        let packages = load_packages(conn)?;
        let (updates, update_violations) = load_updates(conn)?;
        let (updates_index, index_violations) = load_updates_index(conn)?;
        let ordering_violations = update_violations
            + index_violations
            + verify_index(&updates, &updates_index, &packages.details);
        if ordering_violations > 0 {
            warn!(
                "Snapshot breaks the update ordering contract in {} places, update resolution may be wrong",
                ordering_violations
            );
        }

        let (repos, repo_label_ids) = load_repos(conn)?;
        let pkg_repos = adjacency(conn, |r: PkgRepoRow| (r.pkg_id, r.repo_id))?;

        let errata = load_errata(conn)?;
        let (cves, cve_names) = load_cves(conn, errata.by_cve)?;

        let mut module_streams: HashMap<ModuleStream, Vec<StreamId>> = HashMap::new();
        scan::<ModuleStreamRow>(conn, |r| {
            module_streams
                .entry(ModuleStream::new(r.module, r.stream))
                .or_default()
                .push(r.stream_id);
        })?;

        let dbchange = load_dbchange(conn)?;

        let cache = Cache {
            name_ids,
            names,
            updates,
            updates_index,
            evr_ids,
            evrs,
            arch_ids,
            arches,
            arch_compat,
            packages: packages.details,
            nevra_pkg_ids: packages.by_nevra,
            src_binaries: packages.src_binaries,
            repos,
            repo_label_ids,
            pkg_repos,
            errata: errata.details,
            errata_names: errata.names,
            pkg_errata: errata.by_pkg,
            errata_repos: errata.repos,
            cves,
            cve_names,
            pkg_errata_streams: errata.pkg_streams,
            module_streams,
            strings,
            dbchange,
            ordering_violations,
        };

        info!(
            "Cache loaded: {} packages, {} errata, {} CVEs, {} repositories, exported {} ({:.3} s)",
            cache.packages.len(),
            cache.errata.len(),
            cache.cves.len(),
            cache.repos.len(),
            cache.dbchange.exported,
            started.elapsed().as_secs_f64()
        );
        Ok(cache)
    }
}
