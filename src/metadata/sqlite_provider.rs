//! SqliteCatalog implementation.
//!
//! Reads an SQLite database through `rusqlite`, opened read-only. Catalog
//! metadata comes from `sqlite_master` and the `pragma_table_info` /
//! `pragma_foreign_key_list` table-valued functions, always with bound
//! parameters. Data queries need table/column identifiers in the SQL text;
//! those are checked against the catalog index built at open time and then
//! quoted, so nothing outside the introspected catalog ever reaches a query.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, OpenFlags};
use tracing::{debug, warn};

use super::error::{CatalogError, CatalogResult};
use super::provider::{CatalogProvider, ColumnPair, RowSet};
use super::types::{ColumnInfo, ForeignKeyInfo, PrimaryKeyInfo, TableMetadata};
use super::value::{CellValue, TypeHint};

/// Per-table introspection outcome, recorded once at open time.
type TableEntry = Result<TableMetadata, String>;

/// Catalog snapshot used to validate identifiers.
#[derive(Debug, Default)]
struct CatalogIndex {
    tables: BTreeMap<String, TableEntry>,
}

impl CatalogIndex {
    fn build(conn: &Connection) -> CatalogResult<Self> {
        let mut stmt = conn.prepare(
            "SELECT name FROM sqlite_master \
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%' \
             ORDER BY name",
        )?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        let mut tables = BTreeMap::new();
        for name in names {
            let entry = read_table(conn, &name).map_err(|e| e.to_string());
            tables.insert(name, entry);
        }
        Ok(Self { tables })
    }

    fn table(&self, table: &str) -> CatalogResult<&TableMetadata> {
        match self.tables.get(table) {
            Some(Ok(meta)) => Ok(meta),
            Some(Err(message)) => Err(CatalogError::table_unreadable(table, message.clone())),
            None => Err(CatalogError::UnknownIdentifier(table.to_string())),
        }
    }

    fn column(&self, table: &str, column: &str) -> CatalogResult<&ColumnInfo> {
        self.table(table)?
            .column(column)
            .ok_or_else(|| CatalogError::UnknownIdentifier(format!("{table}.{column}")))
    }
}

fn read_table(conn: &Connection, table: &str) -> CatalogResult<TableMetadata> {
    let mut stmt = conn.prepare(
        "SELECT name, type, \"notnull\", dflt_value, pk \
         FROM pragma_table_info(?1) ORDER BY cid",
    )?;
    let rows = stmt
        .query_map(params![table], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                row.get::<_, i64>(2)?,
                row.get::<_, Option<String>>(3)?,
                row.get::<_, i64>(4)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    if rows.is_empty() {
        return Err(CatalogError::table_unreadable(table, "no columns reported"));
    }

    let mut key_columns: Vec<(i64, String)> = Vec::new();
    let columns = rows
        .into_iter()
        .map(|(name, declared, notnull, default, pk)| {
            if pk > 0 {
                key_columns.push((pk, name.clone()));
            }
            let data_type = declared.trim().to_lowercase();
            ColumnInfo {
                max_length: parse_max_length(&data_type),
                name,
                data_type,
                nullable: notnull == 0 && pk == 0,
                pk: pk > 0,
                default,
            }
        })
        .collect();

    key_columns.sort();
    let primary_key = if key_columns.is_empty() {
        None
    } else {
        Some(PrimaryKeyInfo {
            columns: key_columns.into_iter().map(|(_, name)| name).collect(),
        })
    };

    Ok(TableMetadata {
        name: table.to_string(),
        columns,
        primary_key,
    })
}

/// Parse the `N` in `varchar(N)`; multi-argument sizes like `decimal(10,2)` have none.
fn parse_max_length(data_type: &str) -> Option<u32> {
    let open = data_type.find('(')?;
    let close = data_type[open..].find(')')? + open;
    data_type[open + 1..close].trim().parse().ok()
}

/// Quote an identifier for SQLite.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn collect_rows(
    stmt: &mut rusqlite::Statement<'_>,
    params: impl rusqlite::Params,
    hints: &[TypeHint],
) -> CatalogResult<Vec<Vec<CellValue>>> {
    let mut rows = stmt.query(params)?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        let mut values = Vec::with_capacity(hints.len());
        for (i, hint) in hints.iter().enumerate() {
            values.push(CellValue::from_sqlite(row.get_ref(i)?, *hint));
        }
        out.push(values);
    }
    Ok(out)
}

/// Read-only SQLite catalog.
///
/// The connection is shared behind a mutex, so concurrent callers are
/// serialized onto it. Dropping the catalog closes the connection.
#[derive(Debug)]
pub struct SqliteCatalog {
    conn: Arc<Mutex<Connection>>,
    index: Arc<CatalogIndex>,
    path: Option<PathBuf>,
}

impl SqliteCatalog {
    /// Open a database file read-only and index its catalog.
    pub async fn open(path: impl AsRef<Path>) -> CatalogResult<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            return Err(CatalogError::ConnectionFailed(format!(
                "database file not found: {}",
                path.display()
            )));
        }

        let open_path = path.clone();
        let (conn, index) = tokio::task::spawn_blocking(move || {
            let conn = Connection::open_with_flags(
                &open_path,
                OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_URI,
            )
            .map_err(|e| CatalogError::ConnectionFailed(e.to_string()))?;
            let index = CatalogIndex::build(&conn)
                .map_err(|e| CatalogError::ConnectionFailed(e.to_string()))?;
            Ok::<_, CatalogError>((conn, index))
        })
        .await??;

        debug!(path = %path.display(), tables = index.tables.len(), "opened sqlite catalog");

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            index: Arc::new(index),
            path: Some(path),
        })
    }

    /// Wrap an existing connection (e.g. an in-memory database).
    pub fn from_connection(conn: Connection) -> CatalogResult<Self> {
        let index = CatalogIndex::build(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            index: Arc::new(index),
            path: None,
        })
    }

    /// Path of the database file, if opened from one.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Run a blocking closure against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> CatalogResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection, &CatalogIndex) -> CatalogResult<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        let index = Arc::clone(&self.index);
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock().map_err(|_| CatalogError::Poisoned)?;
            f(&guard, &index)
        })
        .await?
    }
}

/// Quoted select list and type hints for a table's columns.
fn select_list(meta: &TableMetadata) -> (String, Vec<TypeHint>) {
    let list = meta
        .columns
        .iter()
        .map(|c| quote_ident(&c.name))
        .collect::<Vec<_>>()
        .join(", ");
    let hints = meta.columns.iter().map(ColumnInfo::type_hint).collect();
    (list, hints)
}

#[async_trait]
impl CatalogProvider for SqliteCatalog {
    async fn list_tables(&self) -> CatalogResult<Vec<String>> {
        Ok(self.index.tables.keys().cloned().collect())
    }

    async fn get_table(&self, table: &str) -> CatalogResult<TableMetadata> {
        self.index.table(table).cloned()
    }

    async fn get_foreign_keys(&self) -> CatalogResult<Vec<ForeignKeyInfo>> {
        self.with_conn(|conn, index| {
            let mut stmt = conn.prepare(
                "SELECT id, seq, \"table\", \"from\", \"to\" \
                 FROM pragma_foreign_key_list(?1) ORDER BY id, seq",
            )?;

            let mut fks = Vec::new();
            for (table, entry) in &index.tables {
                if entry.is_err() {
                    continue;
                }
                let rows = stmt
                    .query_map(params![table], |row| {
                        Ok((
                            row.get::<_, i64>(0)?,
                            row.get::<_, i64>(1)?,
                            row.get::<_, String>(2)?,
                            row.get::<_, String>(3)?,
                            row.get::<_, Option<String>>(4)?,
                        ))
                    })?
                    .collect::<Result<Vec<_>, _>>()?;

                for (id, seq, to_table, from_column, to_column) in rows {
                    // A missing target column references the target's primary key.
                    let to_column = match to_column {
                        Some(c) => c,
                        None => {
                            let target_pk = index.table(&to_table).ok().and_then(|t| {
                                t.primary_key
                                    .as_ref()
                                    .and_then(|pk| pk.columns.get(seq as usize).cloned())
                            });
                            match target_pk {
                                Some(c) => c,
                                None => {
                                    warn!(
                                        table = %table,
                                        target = %to_table,
                                        "foreign key target has no resolvable key column; skipping"
                                    );
                                    continue;
                                }
                            }
                        }
                    };
                    fks.push(ForeignKeyInfo {
                        from_table: table.clone(),
                        from_column,
                        to_table,
                        to_column,
                        constraint_name: format!("fk_{table}_{id}"),
                        csv_file: None,
                    });
                }
            }

            fks.sort_by(|a, b| {
                (&a.from_table, &a.from_column).cmp(&(&b.from_table, &b.from_column))
            });
            Ok(fks)
        })
        .await
    }

    async fn sample_rows(&self, table: &str, limit: usize) -> CatalogResult<RowSet> {
        let table = table.to_string();
        self.with_conn(move |conn, index| {
            let meta = index.table(&table)?;
            let (list, hints) = select_list(meta);
            let sql = format!(
                "SELECT {list} FROM {} ORDER BY RANDOM() LIMIT ?1",
                quote_ident(&meta.name)
            );
            let mut stmt = conn
                .prepare(&sql)
                .map_err(|e| CatalogError::table_unreadable(&table, e.to_string()))?;
            let rows = collect_rows(&mut stmt, params![limit as i64], &hints)?;
            Ok(RowSet {
                columns: meta.column_names(),
                rows,
            })
        })
        .await
    }

    async fn scan_rows(&self, table: &str) -> CatalogResult<RowSet> {
        let table = table.to_string();
        self.with_conn(move |conn, index| {
            let meta = index.table(&table)?;
            let (list, hints) = select_list(meta);
            let sql = format!("SELECT {list} FROM {}", quote_ident(&meta.name));
            let mut stmt = conn
                .prepare(&sql)
                .map_err(|e| CatalogError::table_unreadable(&table, e.to_string()))?;
            let rows = collect_rows(&mut stmt, params![], &hints)?;
            Ok(RowSet {
                columns: meta.column_names(),
                rows,
            })
        })
        .await
    }

    async fn distinct_values(
        &self,
        table: &str,
        column: &str,
        cap: usize,
    ) -> CatalogResult<HashSet<String>> {
        let table = table.to_string();
        let column = column.to_string();
        self.with_conn(move |conn, index| {
            let hint = index.column(&table, &column)?.type_hint();
            let col = quote_ident(&column);
            let sql = format!(
                "SELECT DISTINCT {col} FROM {} WHERE {col} IS NOT NULL LIMIT ?1",
                quote_ident(&table)
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = collect_rows(&mut stmt, params![cap as i64], &[hint])?;
            Ok(rows
                .into_iter()
                .filter_map(|mut r| r.pop())
                .map(|v| v.to_field())
                .collect())
        })
        .await
    }

    async fn correspondence_rows(&self, pair: &ColumnPair) -> CatalogResult<RowSet> {
        let pair = pair.clone();
        self.with_conn(move |conn, index| {
            let from_hint = index.column(&pair.from_table, &pair.from_column)?.type_hint();
            let to_hint = index.column(&pair.to_table, &pair.to_column)?.type_hint();
            let fc = quote_ident(&pair.from_column);
            let tc = quote_ident(&pair.to_column);
            let sql = format!(
                "SELECT t1.{fc}, t2.{tc} FROM {} t1 \
                 LEFT JOIN {} t2 ON t1.{fc} = t2.{tc} \
                 WHERE t1.{fc} IS NOT NULL ORDER BY t1.{fc}",
                quote_ident(&pair.from_table),
                quote_ident(&pair.to_table),
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = collect_rows(&mut stmt, params![], &[from_hint, to_hint])?;
            Ok(RowSet {
                columns: pair.header().to_vec(),
                rows,
            })
        })
        .await
    }
}
