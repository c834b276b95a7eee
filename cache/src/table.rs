//! Typed row decoders, one struct per snapshot table.
use crate::error::LoadError;
use crate::ids::*;
use chrono::{DateTime, Utc};
use log::info;
use rusqlite::{Connection, Row};
use std::time::Instant;

/// Row shape of one snapshot table.
pub trait Table: Sized {
    /// Name of the table in the snapshot
    const NAME: &'static str;
    /// Columns selected, by name. Extra columns of the table are ignored.
    const COLUMNS: &'static [&'static str];
    /// Ordering clause the rows are delivered in
    const ORDER_BY: &'static str;

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;

    fn select() -> String {
        let columns = Self::COLUMNS
            .iter()
            .map(|c| format!("\"{}\"", c))
            .collect::<Vec<_>>()
            .join(", ");
        format!("SELECT {} FROM \"{}\" ORDER BY {}", columns, Self::NAME, Self::ORDER_BY)
    }
}

macro_rules! column {
    ($field:ident) => {
        stringify!($field)
    };
    ($field:ident $col:literal) => {
        $col
    };
}

macro_rules! table {
    ($(#[$meta:meta])* $row:ident = $name:literal order $order:literal {
        $($field:ident $(as $col:literal)? : $ty:ty),+ $(,)?
    }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq)]
        pub struct $row {
            $(pub $field: $ty),+
        }

        impl Table for $row {
            const NAME: &'static str = $name;
            const COLUMNS: &'static [&'static str] = &[$(column!($field $($col)?)),+];
            const ORDER_BY: &'static str = $order;

            fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
                Ok($row {
                    $($field: row.get(column!($field $($col)?))?),+
                })
            }
        }
    };
}

/// Streams every row of `T` into `f`. The first decode error aborts the scan.
pub fn scan<T: Table>(conn: &Connection, mut f: impl FnMut(T)) -> Result<usize, LoadError> {
    let started = Instant::now();
    let wrap = |source: rusqlite::Error| LoadError::Table {
        table: T::NAME,
        source,
    };

    let mut stmt = conn.prepare(&T::select()).map_err(wrap)?;
    let mut rows = stmt.query([]).map_err(wrap)?;
    let mut count = 0;
    while let Some(row) = rows.next().map_err(wrap)? {
        f(T::from_row(row).map_err(wrap)?);
        count += 1;
    }

    info!(
        "'{}' info loaded ({:.3} s)",
        T::NAME,
        started.elapsed().as_secs_f64()
    );
    Ok(count)
}

table!(PackageNameRow = "packagename" order "id" {
    id: NameId,
    packagename: String,
});

table!(EvrRow = "evr" order "id" {
    id: EvrId,
    epoch: i64,
    version: String,
    release: String,
});

table!(ArchRow = "arch" order "id" {
    id: ArchId,
    arch: String,
});

table!(
    /// Directed edge: a package of `from_arch_id` may be updated by one of `to_arch_id`
    ArchCompatRow = "arch_compat" order "from_arch_id, to_arch_id" {
        from_arch_id: ArchId,
        to_arch_id: ArchId,
    }
);

table!(StringRow = "string" order "id" {
    id: StringId,
    string: Option<String>,
});

table!(PackageDetailRow = "package_detail" order "id" {
    id: PkgId,
    name_id: NameId,
    evr_id: EvrId,
    arch_id: ArchId,
    summary_id: StringId,
    description_id: StringId,
    source_package_id: Option<PkgId>,
});

table!(
    /// Position of a package within the version ordering of its name
    UpdatesRow = "updates" order "name_id, package_order" {
        name_id: NameId,
        package_id: PkgId,
        package_order: i64,
    }
);

table!(UpdatesIndexRow = "updates_index" order "name_id, package_order" {
    name_id: NameId,
    evr_id: EvrId,
    package_order: i64,
});

table!(RepoDetailRow = "repo_detail" order "id" {
    id: RepoId,
    label: String,
    name: String,
    url: String,
    basearch: Option<String>,
    releasever: Option<String>,
    product: String,
    product_id: i64,
    revision: Option<DateTime<Utc>>,
});

table!(PkgRepoRow = "pkg_repo" order "pkg_id, repo_id" {
    pkg_id: PkgId,
    repo_id: RepoId,
});

table!(PkgErrataRow = "pkg_errata" order "pkg_id, errata_id" {
    pkg_id: PkgId,
    errata_id: ErrataId,
});

table!(ErrataRepoRow = "errata_repo" order "errata_id, repo_id" {
    errata_id: ErrataId,
    repo_id: RepoId,
});

table!(ErrataCveRow = "errata_cve" order "errata_id, cve_id" {
    errata_id: ErrataId,
    cve_id: CveId,
});

table!(ErrataBugzillaRow = "errata_bugzilla" order "errata_id, bugzilla" {
    errata_id: ErrataId,
    bugzilla: String,
});

table!(ErrataRefRow = "errata_refs" order "errata_id, ref" {
    errata_id: ErrataId,
    reference as "ref": String,
});

table!(ErrataModuleRow = "errata_module" order "errata_id, module_name, module_stream" {
    errata_id: ErrataId,
    module_name: String,
    module_stream: String,
    module_version: String,
    module_context: String,
});

table!(ErrataModulePkgRow = "errata_modulepkg" order "pkg_id, errata_id, module_stream_id" {
    errata_id: ErrataId,
    module_stream_id: StreamId,
    pkg_id: PkgId,
});

table!(ErrataDetailRow = "errata_detail" order "id" {
    id: ErrataId,
    name: String,
    synopsis: String,
    summary: Option<String>,
    kind as "type": String,
    severity: Option<String>,
    description: Option<String>,
    solution: Option<String>,
    issued: Option<DateTime<Utc>>,
    updated: Option<DateTime<Utc>>,
    url: String,
});

table!(CveDetailRow = "cve_detail" order "id" {
    id: CveId,
    name: String,
    redhat_url: Option<String>,
    secondary_url: Option<String>,
    cvss3_score: Option<f64>,
    cvss3_metrics: Option<String>,
    impact: Option<String>,
    published_date: Option<DateTime<Utc>>,
    modified_date: Option<DateTime<Utc>>,
    iava: Option<String>,
    description: Option<String>,
    cvss2_score: Option<f64>,
    cvss2_metrics: Option<String>,
    source: Option<String>,
});

table!(CveCweRow = "cve_cwe" order "cve_id, cwe" {
    cve_id: CveId,
    cwe: String,
});

table!(CvePkgRow = "cve_pkg" order "cve_id, pkg_id" {
    cve_id: CveId,
    pkg_id: PkgId,
});

table!(ModuleStreamRow = "module_stream" order "module, stream, stream_id" {
    stream_id: StreamId,
    module: String,
    stream: String,
});

table!(DbChangeRow = "dbchange" order "exported DESC" {
    errata_changes: DateTime<Utc>,
    cve_changes: DateTime<Utc>,
    repository_changes: DateTime<Utc>,
    last_change: DateTime<Utc>,
    exported: DateTime<Utc>,
});

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::snapshot_connection;

    #[test]
    fn test_select_quotes_columns() {
        assert_eq!(
            ErrataRefRow::select(),
            r#"SELECT "errata_id", "ref" FROM "errata_refs" ORDER BY errata_id, ref"#
        );
    }

    #[test]
    fn test_scan_decodes_rows_in_order() {
        let conn = snapshot_connection();
        let mut rows = vec![];
        let count = scan::<UpdatesRow>(&conn, |r| rows.push(r)).unwrap();
        assert_eq!(count, 14);
        let kernel: Vec<_> = rows
            .iter()
            .filter(|r| r.name_id == NameId(1))
            .map(|r| r.package_id.0)
            .collect();
        assert_eq!(kernel, vec![101, 104, 102, 106, 105, 103]);
    }

    #[test]
    fn test_scan_aliased_and_nullable_columns() {
        let conn = snapshot_connection();
        let mut errata = vec![];
        scan::<ErrataDetailRow>(&conn, |r| errata.push(r)).unwrap();
        assert_eq!(errata[0].kind, "security");
        assert_eq!(errata[1].severity, None);
        assert_eq!(
            errata[0].issued.map(|d| d.to_rfc3339()),
            Some("2020-01-10T00:00:00+00:00".to_string())
        );
    }

    #[test]
    fn test_scan_accepts_mixed_timestamp_formats() {
        let conn = snapshot_connection();
        let mut rows = vec![];
        scan::<DbChangeRow>(&conn, |r| rows.push(r)).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].repository_changes.to_rfc3339(), "2020-06-03T00:00:00+00:00");
        assert_eq!(rows[0].last_change, rows[0].repository_changes);
    }

    #[test]
    fn test_scan_reports_type_mismatch() {
        let conn = snapshot_connection();
        conn.execute("insert into evr values (50, 'one', '1', '1')", [])
            .unwrap();
        let err = scan::<EvrRow>(&conn, |_| {}).unwrap_err();
        match err {
            LoadError::Table { table, .. } => assert_eq!(table, "evr"),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_scan_reports_missing_table() {
        let conn = snapshot_connection();
        conn.execute_batch("drop table errata_repo").unwrap();
        let err = scan::<ErrataRepoRow>(&conn, |_| {}).unwrap_err();
        assert!(err.to_string().contains("errata_repo"));
    }
}
