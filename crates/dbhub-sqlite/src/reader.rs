use std::path::Path;

use rusqlite::types::ValueRef;
use rusqlite::{params_from_iter, Connection, OpenFlags, ToSql};
use tracing::debug;

use crate::error::ReaderError;
use crate::identifier::Identifier;
use crate::projection::Projection;
use crate::result::{Cell, ResultSet};

/// Read-only handle on one SQLite file
pub struct SqliteReader {
    conn: Connection,
}

impl SqliteReader {
    /// Open `path` read-only and confirm it is a SQLite database
    pub fn open(path: &Path) -> Result<Self, ReaderError> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| ReaderError::InvalidDatabase(e.to_string()))?;

        // Opening is lazy; the first read is what detects a non-database file
        conn.query_row("SELECT count(*) FROM sqlite_master", [], |row| {
            row.get::<_, i64>(0)
        })
        .map_err(|e| ReaderError::InvalidDatabase(e.to_string()))?;

        Ok(Self { conn })
    }

    /// User tables in engine order. A file without tables is unusable.
    pub fn list_tables(&self) -> Result<Vec<String>, ReaderError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT name FROM sqlite_master \
                 WHERE type = 'table' AND name NOT LIKE 'sqlite\\_%' ESCAPE '\\'",
            )
            .map_err(|e| ReaderError::InvalidDatabase(e.to_string()))?;

        let tables = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .and_then(|rows| rows.collect::<Result<Vec<_>, _>>())
            .map_err(|e| ReaderError::InvalidDatabase(e.to_string()))?;

        if tables.is_empty() {
            return Err(ReaderError::NoTables);
        }
        Ok(tables)
    }

    /// Resolve the requested table, or the first table when none was asked for
    pub fn validate_table(&self, requested: Option<&str>) -> Result<Identifier, ReaderError> {
        let tables = self.list_tables()?;
        match requested {
            None => Identifier::whitelist(&tables[0], &tables),
            Some(name) => Identifier::whitelist(name, &tables)
                .map_err(|_| ReaderError::TableNotFound(name.to_string())),
        }
    }

    /// Column names as reported by the table description
    pub fn columns(&self, table: &Identifier) -> Result<Vec<String>, ReaderError> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM pragma_table_info(?1)")?;
        let columns = stmt
            .query_map([table.as_str()], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(columns)
    }

    /// Read at most `limit` rows from `table`.
    ///
    /// Every column named in `projection` is whitelisted against
    /// [`Self::columns`] before any query text is built. `total_rows` is
    /// left at zero; see [`Self::count_rows`].
    pub fn read_rows(
        &self,
        table: &Identifier,
        limit: u32,
        projection: Option<&Projection>,
    ) -> Result<ResultSet, ReaderError> {
        let mut select = "*".to_string();
        let mut conditions: Vec<String> = Vec::new();
        let mut params: Vec<Box<dyn ToSql>> = Vec::new();

        if let Some(projection) = projection {
            let known = self.columns(table)?;

            let columns = projection
                .columns
                .iter()
                .map(|c| Identifier::whitelist(c, &known))
                .collect::<Result<Vec<_>, _>>()?;
            let filter_column = projection
                .filter
                .as_ref()
                .map(|f| Identifier::whitelist(&f.column, &known))
                .transpose()?;

            if !columns.is_empty() {
                select = columns
                    .iter()
                    .map(Identifier::quoted)
                    .collect::<Vec<_>>()
                    .join(", ");
            }
            for column in &columns {
                if projection.skip_nulls {
                    conditions.push(format!("{} IS NOT NULL", column.quoted()));
                }
                if projection.skip_binary {
                    conditions.push(format!("typeof({}) != 'blob'", column.quoted()));
                }
            }
            if let (Some(filter), Some(column)) = (projection.filter.as_ref(), filter_column) {
                conditions.push(format!("{} {} ?", column.quoted(), filter.op.as_sql()));
                params.push(Box::new(filter.value.clone()));
            }
        }

        let mut sql = format!("SELECT {} FROM {}", select, table.quoted());
        if !conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }
        sql.push_str(" LIMIT ?");
        params.push(Box::new(i64::from(limit)));
        debug!("Reading rows: {}", sql);

        let mut stmt = self.conn.prepare(&sql)?;
        let col_names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

        let mut records = Vec::new();
        let mut rows = stmt.query(params_from_iter(params.iter().map(|p| p.as_ref())))?;
        while let Some(row) = rows.next()? {
            let mut record = Vec::with_capacity(col_names.len());
            for (i, name) in col_names.iter().enumerate() {
                let cell = match row.get_ref(i)? {
                    ValueRef::Null => Cell::null(name),
                    ValueRef::Integer(v) => Cell::integer(name, v),
                    ValueRef::Real(v) => Cell::float(name, v),
                    ValueRef::Text(bytes) => {
                        Cell::text(name, String::from_utf8_lossy(bytes).into_owned())
                    }
                    ValueRef::Blob(_) => Cell::binary(name),
                };
                record.push(cell);
            }
            records.push(record);
        }

        Ok(ResultSet {
            col_count: col_names.len(),
            row_count: records.len(),
            total_rows: 0,
            tablename: table.as_str().to_string(),
            col_names,
            records,
        })
    }

    /// Unbounded row count for `table`
    pub fn count_rows(&self, table: &Identifier) -> Result<i64, ReaderError> {
        let sql = format!("SELECT count(*) FROM {}", table.quoted());
        Ok(self.conn.query_row(&sql, [], |row| row.get(0))?)
    }

    /// Validate the table, read a page of it and attach the total row count
    pub fn read_table(
        &self,
        requested: Option<&str>,
        limit: u32,
        projection: Option<&Projection>,
    ) -> Result<ResultSet, ReaderError> {
        let table = self.validate_table(requested)?;
        let mut result = self.read_rows(&table, limit, projection)?;
        result.total_rows = self.count_rows(&table)?;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projection::{Filter, FilterOp};
    use crate::result::{CellType, BINARY_MARKER, NULL_MARKER};
    use tempfile::TempDir;

    fn build(sql: &str) -> (TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(sql).unwrap();
        drop(conn);
        (dir, path)
    }

    fn sample() -> (TempDir, std::path::PathBuf) {
        build(
            "CREATE TABLE t (a INT, b TEXT);
             INSERT INTO t VALUES (1, 'one'), (2, 'two'), (3, 'three');
             CREATE TABLE mixed (v);
             INSERT INTO mixed VALUES (1), (1.5), ('text'), (x'00ff'), (NULL), ('NULL');",
        )
    }

    #[test]
    fn test_list_tables_in_engine_order() {
        let (_dir, path) = sample();
        let reader = SqliteReader::open(&path).unwrap();
        assert_eq!(reader.list_tables().unwrap(), vec!["t", "mixed"]);
    }

    #[test]
    fn test_no_tables_is_an_error() {
        let (_dir, path) = build("CREATE TABLE x (a); DROP TABLE x;");
        let reader = SqliteReader::open(&path).unwrap();
        assert!(matches!(reader.list_tables(), Err(ReaderError::NoTables)));
        assert!(matches!(
            reader.validate_table(None),
            Err(ReaderError::NoTables)
        ));
    }

    #[test]
    fn test_non_database_file_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("junk.db");
        std::fs::write(&path, "not a database ".repeat(100)).unwrap();
        assert!(matches!(
            SqliteReader::open(&path),
            Err(ReaderError::InvalidDatabase(_))
        ));
    }

    #[test]
    fn test_default_table_is_first() {
        let (_dir, path) = sample();
        let reader = SqliteReader::open(&path).unwrap();
        assert_eq!(reader.validate_table(None).unwrap().as_str(), "t");
    }

    #[test]
    fn test_missing_table_is_not_found() {
        let (_dir, path) = sample();
        let reader = SqliteReader::open(&path).unwrap();
        assert!(matches!(
            reader.validate_table(Some("nope")),
            Err(ReaderError::TableNotFound(_))
        ));
    }

    #[test]
    fn test_read_table_counts_and_limits() {
        let (_dir, path) = sample();
        let reader = SqliteReader::open(&path).unwrap();

        let all = reader.read_table(Some("t"), 10, None).unwrap();
        assert_eq!(all.col_names, vec!["a", "b"]);
        assert_eq!(all.col_count, 2);
        assert_eq!(all.row_count, 3);
        assert_eq!(all.total_rows, 3);
        assert_eq!(all.tablename, "t");

        let page = reader.read_table(Some("t"), 2, None).unwrap();
        assert_eq!(page.row_count, 2);
        assert_eq!(page.records.len(), 2);
        assert_eq!(page.total_rows, 3);
    }

    #[test]
    fn test_cells_are_typed_per_row() {
        let (_dir, path) = sample();
        let reader = SqliteReader::open(&path).unwrap();
        let result = reader.read_table(Some("mixed"), 10, None).unwrap();

        let cells: Vec<(CellType, &str)> = result
            .records
            .iter()
            .map(|row| (row[0].cell_type, row[0].value.as_str()))
            .collect();
        assert_eq!(
            cells,
            vec![
                (CellType::Integer, "1"),
                (CellType::Float, "1.5000"),
                (CellType::Text, "text"),
                (CellType::Binary, BINARY_MARKER),
                (CellType::Null, NULL_MARKER),
                (CellType::Text, "NULL"),
            ]
        );
    }

    #[test]
    fn test_projection_restricts_columns() {
        let (_dir, path) = sample();
        let reader = SqliteReader::open(&path).unwrap();
        let projection = Projection::columns(["b"]);
        let result = reader.read_table(Some("t"), 10, Some(&projection)).unwrap();
        assert_eq!(result.col_names, vec!["b"]);
        assert_eq!(result.records[0][0].value, "one");
    }

    #[test]
    fn test_filter_value_is_bound() {
        let (_dir, path) = sample();
        let reader = SqliteReader::open(&path).unwrap();

        let projection = Projection::columns(["a", "b"]).with_filter(Filter {
            column: "a".into(),
            op: FilterOp::GtEq,
            value: "2".into(),
        });
        let result = reader.read_table(Some("t"), 10, Some(&projection)).unwrap();
        assert_eq!(result.row_count, 2);

        let hostile = Projection::columns(["a"]).with_filter(Filter {
            column: "b".into(),
            op: FilterOp::Eq,
            value: "x' OR '1'='1".into(),
        });
        let result = reader.read_table(Some("t"), 10, Some(&hostile)).unwrap();
        assert_eq!(result.row_count, 0);
    }

    #[test]
    fn test_like_filter() {
        let (_dir, path) = sample();
        let reader = SqliteReader::open(&path).unwrap();
        let projection = Projection::columns(Vec::<String>::new()).with_filter(Filter {
            column: "b".into(),
            op: FilterOp::Like,
            value: "t%".into(),
        });
        let result = reader.read_table(Some("t"), 10, Some(&projection)).unwrap();
        assert_eq!(result.col_names, vec!["a", "b"]);
        assert_eq!(result.row_count, 2);
    }

    #[test]
    fn test_plottable_projection_skips_null_and_blob_rows() {
        let (_dir, path) = build(
            "CREATE TABLE s (x, y);
             INSERT INTO s VALUES (1, 10), (2, NULL), (3, x'01'), (NULL, 4), (5, 50);",
        );
        let reader = SqliteReader::open(&path).unwrap();
        let projection = Projection::columns(["x", "y"]).plottable();

        let result = reader.read_table(None, 10, Some(&projection)).unwrap();
        let xs: Vec<&str> = result.records.iter().map(|r| r[0].value.as_str()).collect();
        assert_eq!(xs, vec!["1", "5"]);
        assert_eq!(result.total_rows, 5);

        // The limit applies to the rows that survive the filter
        let limited = reader.read_table(None, 1, Some(&projection)).unwrap();
        assert_eq!(limited.row_count, 1);
    }

    #[test]
    fn test_unknown_projected_column_is_rejected() {
        let (_dir, path) = sample();
        let reader = SqliteReader::open(&path).unwrap();
        let projection = Projection::columns(["a", "missing"]);
        assert!(matches!(
            reader.read_table(Some("t"), 10, Some(&projection)),
            Err(ReaderError::InvalidIdentifier(_))
        ));
    }

    #[test]
    fn test_names_needing_quotes_are_readable() {
        let (_dir, path) = build(
            "CREATE TABLE \"my table\" (\"the \"\"col\"\"\" INT, \"select\" TEXT);
             INSERT INTO \"my table\" VALUES (7, 'k');",
        );
        let reader = SqliteReader::open(&path).unwrap();
        let projection = Projection::columns(["the \"col\"", "select"]);
        let result = reader
            .read_table(Some("my table"), 10, Some(&projection))
            .unwrap();
        assert_eq!(result.col_names, vec!["the \"col\"", "select"]);
        assert_eq!(result.records[0][0].value, "7");
        assert_eq!(result.records[0][1].value, "k");
    }
}
