//! PostgreSQL catalog introspection.
//!
//! Reads tables, columns, primary keys and foreign keys of one schema from
//! `information_schema` inside a read-only, time-boxed transaction. Before
//! reading, a gate checks whether the connected role can `SELECT` from any
//! non-catalog table; such a role is refused unless enforcement is turned off,
//! in which case the result carries a [`CatalogWarning`].

use serde::Serialize;
use sqlx::{Connection, PgConnection};

use crate::{
    error::{AppResult, database_error, forbidden_error, input_error},
    schema::{ColumnDef, ForeignKey, TableDef, Tables, normalize_tables}
};

/// Code reported when the role can read user data
pub const ROLE_NOT_CATALOG_ONLY: &str = "ROLE_NOT_CATALOG_ONLY";

pub const DEFAULT_MAX_TABLES: u32 = 200;
pub const MAX_TABLES_LIMIT: u32 = 2000;

const GATE_SQL: &str = "SELECT EXISTS (
    SELECT 1
    FROM information_schema.tables t
    WHERE t.table_schema NOT IN ('pg_catalog', 'information_schema', 'pg_toast')
      AND has_table_privilege(
        current_user,
        quote_ident(t.table_schema) || '.' || quote_ident(t.table_name),
        'SELECT'
      )
)";

const TABLES_SQL: &str = "SELECT table_name::text
    FROM information_schema.tables
    WHERE table_schema = $1
      AND table_type = 'BASE TABLE'
    ORDER BY table_name
    LIMIT $2";

const COLUMNS_SQL: &str = "SELECT table_name::text, column_name::text, data_type::text, is_nullable::text
    FROM information_schema.columns
    WHERE table_schema = $1
      AND table_name = ANY($2)
    ORDER BY table_name, ordinal_position";

const PRIMARY_KEYS_SQL: &str = "SELECT tc.table_name::text, kcu.column_name::text
    FROM information_schema.table_constraints AS tc
    JOIN information_schema.key_column_usage AS kcu
      ON tc.constraint_name = kcu.constraint_name
     AND tc.table_schema = kcu.table_schema
    WHERE tc.constraint_type = 'PRIMARY KEY'
      AND tc.table_schema = $1
      AND tc.table_name = ANY($2)
    ORDER BY tc.table_name, kcu.ordinal_position";

const FOREIGN_KEYS_SQL: &str = "SELECT tc.table_name::text, kcu.column_name::text,
           ccu.table_name::text, ccu.column_name::text
    FROM information_schema.table_constraints AS tc
    JOIN information_schema.key_column_usage AS kcu
      ON tc.constraint_name = kcu.constraint_name
     AND tc.table_schema = kcu.table_schema
    JOIN information_schema.constraint_column_usage AS ccu
      ON ccu.constraint_name = tc.constraint_name
     AND ccu.table_schema = tc.table_schema
    WHERE tc.constraint_type = 'FOREIGN KEY'
      AND tc.table_schema = $1
      AND tc.table_name = ANY($2)
    ORDER BY tc.table_name, kcu.ordinal_position";

/// Introspection settings
#[derive(Debug, Clone)]
pub struct IntrospectOptions {
    pub schema:                 String,
    pub max_tables:             u32,
    pub enforce_catalog_only:   bool,
    pub statement_timeout_secs: u64
}

impl Default for IntrospectOptions {
    fn default() -> Self {
        Self {
            schema:                 String::from("public"),
            max_tables:             DEFAULT_MAX_TABLES,
            enforce_catalog_only:   true,
            statement_timeout_secs: 5
        }
    }
}

impl IntrospectOptions {
    /// Table cap clamped to `1..=2000`
    pub fn table_limit(&self) -> u32 {
        self.max_tables.clamp(1, MAX_TABLES_LIMIT)
    }
}

/// Notice attached when the gate is bypassed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogWarning {
    pub code:   String,
    pub reason: String
}

/// Introspection output; its `tables` is a loadable schema payload
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Introspection {
    pub dialect:      String,
    pub schema:       String,
    pub count_tables: usize,
    pub tables:       Tables,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning:      Option<CatalogWarning>
}

/// `information_schema.columns` row: table, column, type, `YES`/`NO`
pub type ColumnRow = (String, String, String, String);
/// Primary key row: table, column
pub type KeyRow = (String, String);
/// Foreign key row: table, column, referenced table, referenced column
pub type ForeignKeyRow = (String, String, String, String);

/// Connect to `db_url` and introspect one schema
///
/// # Errors
///
/// Returns an input error for an empty URL, a forbidden error when the gate
/// refuses the role, and a database error for connection or query failures
pub async fn introspect(db_url: &str, options: &IntrospectOptions) -> AppResult<Introspection> {
    let db_url = db_url.trim();
    if db_url.is_empty() {
        return Err(input_error("A database URL is required"));
    }
    let schema = match options.schema.trim() {
        "" => "public",
        name => name
    };
    let mut conn = PgConnection::connect(db_url)
        .await
        .map_err(database_error)?;
    let mut tx = conn.begin().await.map_err(database_error)?;
    sqlx::query("SET TRANSACTION READ ONLY")
        .execute(&mut *tx)
        .await
        .map_err(database_error)?;
    sqlx::query(&format!(
        "SET LOCAL statement_timeout = '{}s'",
        options.statement_timeout_secs
    ))
    .execute(&mut *tx)
    .await
    .map_err(database_error)?;
    sqlx::query("SET LOCAL search_path = pg_catalog, information_schema")
        .execute(&mut *tx)
        .await
        .map_err(database_error)?;

    let (has_select,): (bool,) = sqlx::query_as(GATE_SQL)
        .fetch_one(&mut *tx)
        .await
        .map_err(database_error)?;
    let warning = gate(has_select, options.enforce_catalog_only)?;

    let table_names: Vec<String> = sqlx::query_as::<_, (String,)>(TABLES_SQL)
        .bind(schema)
        .bind(i64::from(options.table_limit()))
        .fetch_all(&mut *tx)
        .await
        .map_err(database_error)?
        .into_iter()
        .map(|(name,)| name)
        .collect();
    tracing::info!(schema, tables = table_names.len(), "read catalog tables");

    let (columns, primary_keys, foreign_keys) = if table_names.is_empty() {
        (Vec::new(), Vec::new(), Vec::new())
    } else {
        let columns: Vec<ColumnRow> = sqlx::query_as(COLUMNS_SQL)
            .bind(schema)
            .bind(table_names.as_slice())
            .fetch_all(&mut *tx)
            .await
            .map_err(database_error)?;
        let primary_keys: Vec<KeyRow> = sqlx::query_as(PRIMARY_KEYS_SQL)
            .bind(schema)
            .bind(table_names.as_slice())
            .fetch_all(&mut *tx)
            .await
            .map_err(database_error)?;
        let foreign_keys: Vec<ForeignKeyRow> = sqlx::query_as(FOREIGN_KEYS_SQL)
            .bind(schema)
            .bind(table_names.as_slice())
            .fetch_all(&mut *tx)
            .await
            .map_err(database_error)?;
        (columns, primary_keys, foreign_keys)
    };
    tx.commit().await.map_err(database_error)?;
    if let Err(e) = conn.close().await {
        tracing::debug!(error = %e, "closing catalog connection failed");
    }

    let tables = assemble_tables(&table_names, &columns, &primary_keys, &foreign_keys);
    Ok(Introspection {
        dialect: String::from("postgres"),
        schema: schema.to_string(),
        count_tables: tables.len(),
        tables,
        warning
    })
}

/// Apply the catalog-only gate
///
/// # Errors
///
/// Returns a forbidden error when the role can read data and enforcement is on
pub fn gate(has_select: bool, enforce: bool) -> AppResult<Option<CatalogWarning>> {
    if !has_select {
        return Ok(None);
    }
    if enforce {
        tracing::warn!("refusing role with SELECT on user tables");
        return Err(forbidden_error(format!(
            "{}: the connected role can read user data; use a role without SELECT on user tables (catalog-only)",
            ROLE_NOT_CATALOG_ONLY
        )));
    }
    tracing::warn!("role can read user data, continuing in a read-only session");
    Ok(Some(CatalogWarning {
        code:   ROLE_NOT_CATALOG_ONLY.to_string(),
        reason: String::from(
            "Compromise mode: the role has access to data, but the session is READ ONLY."
        )
    }))
}

/// Build tables from catalog rows.
///
/// Rows for tables outside `table_names` are ignored; every listed table is
/// present even without columns.
///
/// ```
/// use schema_guard::introspect::assemble_tables;
///
/// let names = vec!["users".to_string()];
/// let columns = vec![(
///     "users".to_string(),
///     "id".to_string(),
///     "integer".to_string(),
///     "NO".to_string()
/// )];
/// let pks = vec![("users".to_string(), "id".to_string())];
///
/// let tables = assemble_tables(&names, &columns, &pks, &[]);
/// assert_eq!(tables["users"].primary_key, ["id"]);
/// assert_eq!(tables["users"].columns[0].nullable, Some(false));
/// ```
pub fn assemble_tables(
    table_names: &[String],
    columns: &[ColumnRow],
    primary_keys: &[KeyRow],
    foreign_keys: &[ForeignKeyRow]
) -> Tables {
    let mut tables: Tables = table_names
        .iter()
        .map(|name| (name.clone(), TableDef::default()))
        .collect();
    for (table, column, data_type, is_nullable) in columns {
        if let Some(def) = tables.get_mut(table) {
            def.columns.push(ColumnDef::typed(
                column.clone(),
                data_type.clone(),
                is_nullable.eq_ignore_ascii_case("YES")
            ));
        }
    }
    for (table, column) in primary_keys {
        if let Some(def) = tables.get_mut(table) {
            def.primary_key.push(column.clone());
        }
    }
    for (table, column, ref_table, ref_column) in foreign_keys {
        if let Some(def) = tables.get_mut(table) {
            def.foreign_keys.push(ForeignKey {
                column:     column.clone(),
                ref_table:  ref_table.clone(),
                ref_column: ref_column.clone()
            });
        }
    }
    normalize_tables(tables)
}
