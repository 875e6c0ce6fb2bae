//! Schema inspection and schema negotiation.
//!
//! The parser's output schema drifts independently of the store schema.
//! Loading therefore never requires an exact match: [`negotiate`] reads
//! both sides as ordered column lists and keeps only the columns they
//! share (in target order), applying the per-table transforms from
//! [`crate::registry`]. SQL is rendered from the resulting mappings with
//! every identifier passed through [`quote_ident`]; values are always bound
//! as statement parameters.

use std::fmt;

use duckdb::Connection;

use crate::DbError;
use crate::registry::TableTransform;

/// Integer types a column may be cast to when the registry asks for the
/// target's declared width.
const INTEGER_TYPES: &[&str] = &[
    "TINYINT",
    "UTINYINT",
    "SMALLINT",
    "USMALLINT",
    "INTEGER",
    "UINTEGER",
    "BIGINT",
    "UBIGINT",
    "HUGEINT",
];

/// Quotes an identifier for `DuckDB`, doubling embedded quotes.
#[must_use]
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Renders a SQL string literal, doubling embedded single quotes.
///
/// Only used where `DuckDB` does not accept a bound parameter (table
/// function arguments inside `CREATE TABLE AS`).
#[must_use]
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// SQL predicate selecting rows of one partition; expects the year key as
/// its single bound parameter.
#[must_use]
pub fn partition_filter(game_id_column: &str) -> String {
    format!(
        "substring(CAST({} AS VARCHAR), 4, 4) = ?",
        quote_ident(game_id_column)
    )
}

/// A `schema.table` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QualifiedTable {
    /// Schema name.
    pub schema: String,
    /// Table name.
    pub table: String,
}

impl QualifiedTable {
    /// Creates a qualified table reference.
    #[must_use]
    pub fn new(schema: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
        }
    }

    /// The quoted `"schema"."table"` form for use in SQL.
    #[must_use]
    pub fn quoted(&self) -> String {
        format!("{}.{}", quote_ident(&self.schema), quote_ident(&self.table))
    }
}

impl fmt::Display for QualifiedTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.table)
    }
}

/// One column as reported by `DESCRIBE`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    /// Column name.
    pub name: String,
    /// Declared type, as `DuckDB` prints it (e.g. `UTINYINT`).
    pub data_type: String,
}

impl ColumnInfo {
    /// Creates a column description.
    #[must_use]
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
        }
    }
}

/// Finds a column by name, ignoring ASCII case as `DuckDB` does.
#[must_use]
pub fn find_column<'a>(columns: &'a [ColumnInfo], name: &str) -> Option<&'a ColumnInfo> {
    columns.iter().find(|c| c.name.eq_ignore_ascii_case(name))
}

/// Returns whether `columns` contains `name`.
#[must_use]
pub fn has_column(columns: &[ColumnInfo], name: &str) -> bool {
    find_column(columns, name).is_some()
}

/// Describes the columns of any relation, given its already-quoted name.
///
/// # Errors
///
/// Returns [`DbError`] if the relation does not exist or the query fails.
pub fn describe_relation(conn: &Connection, quoted_relation: &str) -> Result<Vec<ColumnInfo>, DbError> {
    let mut stmt = conn.prepare(&format!("DESCRIBE SELECT * FROM {quoted_relation}"))?;
    let rows = stmt.query_map([], |row| {
        Ok(ColumnInfo {
            name: row.get(0)?,
            data_type: row.get(1)?,
        })
    })?;

    let mut columns = Vec::new();
    for row in rows {
        columns.push(row?);
    }
    Ok(columns)
}

/// Returns whether a base table exists.
///
/// # Errors
///
/// Returns [`DbError`] if the catalog query fails.
pub fn table_exists(conn: &Connection, table: &QualifiedTable) -> Result<bool, DbError> {
    let count: i64 = conn
        .prepare(
            "SELECT COUNT(*) FROM information_schema.tables
             WHERE table_schema = ? AND table_name = ?",
        )?
        .query_row([table.schema.as_str(), table.table.as_str()], |row| {
            row.get(0)
        })?;
    Ok(count > 0)
}

/// Describes a table's columns in declaration order, or `None` if the
/// table does not exist.
///
/// # Errors
///
/// Returns [`DbError`] if the catalog or describe query fails.
pub fn describe_table(
    conn: &Connection,
    table: &QualifiedTable,
) -> Result<Option<Vec<ColumnInfo>>, DbError> {
    if !table_exists(conn, table)? {
        return Ok(None);
    }
    describe_relation(conn, &table.quoted()).map(Some)
}

/// Lists the base tables of `schema`, sorted by name.
///
/// # Errors
///
/// Returns [`DbError`] if the catalog query fails.
pub fn list_tables(conn: &Connection, schema: &str) -> Result<Vec<String>, DbError> {
    let mut stmt = conn.prepare(
        "SELECT table_name FROM information_schema.tables
         WHERE table_schema = ? AND table_type = 'BASE TABLE'
         ORDER BY table_name",
    )?;
    let rows = stmt.query_map([schema], |row| row.get::<_, String>(0))?;

    let mut tables = Vec::new();
    for row in rows {
        tables.push(row?);
    }
    Ok(tables)
}

/// How a target column is fed from the source relation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceExpr {
    /// Copy the source column as-is (the store applies implicit casts).
    Column(String),
    /// Collapse a ternary side indicator to `top`/`bottom`.
    Side(String),
    /// Cast the source column to the target's declared integer type.
    Cast {
        /// Source column.
        column: String,
        /// Target type name.
        data_type: String,
    },
}

impl SourceExpr {
    /// The source column this expression reads.
    #[must_use]
    pub fn column(&self) -> &str {
        match self {
            Self::Column(column) | Self::Side(column) | Self::Cast { column, .. } => column,
        }
    }

    /// Renders the select expression.
    #[must_use]
    pub fn to_sql(&self) -> String {
        match self {
            Self::Column(column) => quote_ident(column),
            Self::Side(column) => format!(
                "CASE WHEN {} = 'bottom' THEN 'bottom' ELSE 'top' END",
                quote_ident(column)
            ),
            Self::Cast { column, data_type } => {
                format!("CAST({} AS {data_type})", quote_ident(column))
            }
        }
    }
}

/// A target column and the expression that feeds it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMapping {
    /// Target column name.
    pub target: String,
    /// Source expression.
    pub source: SourceExpr,
}

fn integer_type(data_type: &str) -> Option<&'static str> {
    INTEGER_TYPES
        .iter()
        .copied()
        .find(|t| t.eq_ignore_ascii_case(data_type.trim()))
}

/// Negotiates the columns to insert from `source` into `target`.
///
/// The result follows the target's column order. Target columns with no
/// source counterpart are left to their defaults; source columns the target
/// does not know are dropped. Side columns and integer casts are applied as
/// the `transform` prescribes.
#[must_use]
pub fn negotiate(
    target: &[ColumnInfo],
    source: &[ColumnInfo],
    transform: &TableTransform,
) -> Vec<ColumnMapping> {
    let mut mappings = Vec::new();

    for column in target {
        if let Some(side) = transform
            .side_columns
            .iter()
            .find(|s| s.target.eq_ignore_ascii_case(&column.name))
        {
            let source_column = find_column(source, side.source)
                .or_else(|| find_column(source, &column.name));
            if let Some(source_column) = source_column {
                mappings.push(ColumnMapping {
                    target: column.name.clone(),
                    source: SourceExpr::Side(source_column.name.clone()),
                });
            }
            continue;
        }

        let Some(source_column) = find_column(source, &column.name) else {
            continue;
        };

        let cast = transform
            .cast_to_target
            .iter()
            .any(|c| c.eq_ignore_ascii_case(&column.name))
            .then(|| integer_type(&column.data_type))
            .flatten();

        let expr = match cast {
            Some(data_type) => SourceExpr::Cast {
                column: source_column.name.clone(),
                data_type: data_type.to_string(),
            },
            None => SourceExpr::Column(source_column.name.clone()),
        };

        mappings.push(ColumnMapping {
            target: column.name.clone(),
            source: expr,
        });
    }

    mappings
}

/// Renders `INSERT INTO target (...) SELECT ... FROM source WHERE <partition>`.
///
/// The statement takes the partition key as its single parameter.
#[must_use]
pub fn render_insert(
    target: &QualifiedTable,
    quoted_source: &str,
    mappings: &[ColumnMapping],
    distinct: bool,
) -> String {
    let columns = mappings
        .iter()
        .map(|m| quote_ident(&m.target))
        .collect::<Vec<_>>()
        .join(", ");
    let exprs = mappings
        .iter()
        .map(|m| m.source.to_sql())
        .collect::<Vec<_>>()
        .join(", ");
    let distinct = if distinct { "DISTINCT " } else { "" };

    format!(
        "INSERT INTO {} ({columns}) SELECT {distinct}{exprs} FROM {quoted_source} WHERE {}",
        target.quoted(),
        partition_filter(crate::GAME_ID_COLUMN),
    )
}
