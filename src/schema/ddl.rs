//! Schema import from SQL DDL.
//!
//! Parses `CREATE TABLE` statements with `sqlparser` into [`Tables`]. Nullability,
//! primary keys and foreign keys come from the column options and table
//! constraints of the parsed AST.
//!
//! # Example
//!
//! ```
//! use schema_guard::schema::{SqlDialect, parse_ddl};
//!
//! let sql = r#"
//!     CREATE TABLE users (
//!         id INT PRIMARY KEY,
//!         email VARCHAR(255) NOT NULL
//!     );
//!     CREATE TABLE orders (
//!         id INT,
//!         user_id INT REFERENCES users(id),
//!         PRIMARY KEY (id)
//!     );
//! "#;
//!
//! let tables = parse_ddl(sql, SqlDialect::Generic).unwrap();
//! assert_eq!(tables["users"].columns.len(), 2);
//! assert_eq!(tables["users"].primary_key, ["id"]);
//! assert_eq!(tables["orders"].primary_key, ["id"]);
//! assert_eq!(tables["orders"].foreign_keys[0].ref_table, "users");
//! ```

use sqlparser::{
    ast::{
        ColumnOption, Expr, ForeignKeyConstraint, Ident, IndexColumn, ObjectName, ObjectNamePart,
        Statement, TableConstraint
    },
    dialect::{
        ClickHouseDialect, Dialect, GenericDialect, MySqlDialect, PostgreSqlDialect, SQLiteDialect
    },
    parser::Parser
};

use super::types::{ColumnDef, ForeignKey, TableDef, Tables};
use crate::error::{AppResult, schema_parse_error};

/// SQL dialect for parsing DDL
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[non_exhaustive]
pub enum SqlDialect {
    #[default]
    Generic,
    MySQL,
    PostgreSQL,
    SQLite,
    ClickHouse
}

impl SqlDialect {
    /// Map a free-form dialect name (`"postgres"`, `"mysql"`, ...) to a dialect
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Self::PostgreSQL,
            "mysql" | "mariadb" => Self::MySQL,
            "sqlite" | "sqlite3" => Self::SQLite,
            "clickhouse" => Self::ClickHouse,
            _ => Self::Generic
        }
    }

    /// Convert to sqlparser dialect for parsing
    pub fn into_parser_dialect(self) -> Box<dyn Dialect> {
        match self {
            Self::Generic => Box::new(GenericDialect {}),
            Self::MySQL => Box::new(MySqlDialect {}),
            Self::PostgreSQL => Box::new(PostgreSqlDialect {}),
            Self::SQLite => Box::new(SQLiteDialect {}),
            Self::ClickHouse => Box::new(ClickHouseDialect {})
        }
    }
}

/// Parse `CREATE TABLE` statements into tables; other statements are ignored
///
/// # Errors
///
/// Returns a schema parse error if the DDL cannot be parsed
pub fn parse_ddl(sql: &str, dialect: SqlDialect) -> AppResult<Tables> {
    let parser_dialect = dialect.into_parser_dialect();
    let statements = Parser::parse_sql(parser_dialect.as_ref(), sql)
        .map_err(|e| schema_parse_error(e.to_string()))?;
    let mut tables = Tables::new();
    for stmt in statements {
        if let Statement::CreateTable(create) = stmt {
            let Some(table_name) = object_name(&create.name) else {
                continue;
            };
            let mut table = TableDef::default();
            for column in &create.columns {
                let mut nullable = true;
                for opt in &column.options {
                    match &opt.option {
                        ColumnOption::NotNull => nullable = false,
                        ColumnOption::PrimaryKey(_) => {
                            nullable = false;
                            table.primary_key.push(ident_name(&column.name));
                        }
                        ColumnOption::ForeignKey(fk) => {
                            push_foreign_keys(&mut table, std::slice::from_ref(&column.name), fk)
                        }
                        _ => {}
                    }
                }
                table.columns.push(ColumnDef::typed(
                    column.name.value.clone(),
                    column.data_type.to_string(),
                    nullable
                ));
            }
            for constraint in &create.constraints {
                match constraint {
                    TableConstraint::PrimaryKey(pk) => {
                        table
                            .primary_key
                            .extend(pk.columns.iter().filter_map(index_column_name));
                    }
                    TableConstraint::ForeignKey(fk) => {
                        push_foreign_keys(&mut table, &fk.columns, fk)
                    }
                    _ => {}
                }
            }
            tables.insert(table_name, table);
        }
    }
    Ok(tables)
}

/// Pair local columns with referred columns; a column-level key has none of
/// its own and uses the column it is declared on
fn push_foreign_keys(table: &mut TableDef, local: &[Ident], fk: &ForeignKeyConstraint) {
    let Some(ref_table) = object_name(&fk.foreign_table) else {
        return;
    };
    let local = if fk.columns.is_empty() { local } else { &fk.columns };
    for (column, ref_column) in local.iter().zip(&fk.referred_columns) {
        table.foreign_keys.push(ForeignKey {
            column:     ident_name(column),
            ref_table:  ref_table.clone(),
            ref_column: ident_name(ref_column)
        });
    }
}

/// Last part of a possibly qualified name: `public."Orders"` -> `orders`
fn object_name(name: &ObjectName) -> Option<String> {
    name.0
        .last()
        .and_then(ObjectNamePart::as_ident)
        .map(ident_name)
}

/// Plain column of a key column list; expressions are skipped
fn index_column_name(column: &IndexColumn) -> Option<String> {
    match &column.column.expr {
        Expr::Identifier(ident) => Some(ident_name(ident)),
        Expr::CompoundIdentifier(parts) => parts.last().map(ident_name),
        _ => None
    }
}

fn ident_name(ident: &Ident) -> String {
    ident.value.to_lowercase()
}
