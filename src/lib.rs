//! # Schema Guard Library
//!
//! Safety and schema validation for generated SQL.
//!
//! - [`sql`] - tokenizer, destructive-keyword classifier, alias and reference
//!   extractor
//! - [`validate`] - schema-aware reference validation
//! - [`schema`] - schema snapshots, fingerprints, diffs, DDL and file import
//! - [`guard`] - block / warn / wrap policy over classification and validation
//! - [`snapshots`] and [`store`] - owner-scoped snapshot versioning
//! - [`identity`] - owner id from bearer tokens
//! - [`introspect`] - PostgreSQL catalog introspection
//! - [`prompt`] and [`llm`] - SQL generation with a language model
//! - [`config`], [`output`], [`cli`], [`app`] - command-line surface
//!
//! The core (`sql`, `validate`, `schema`) is pure and synchronous; it performs
//! no I/O and can be called concurrently.

pub mod app;
pub mod cli;
pub mod config;
pub mod error;
pub mod guard;
pub mod identity;
pub mod introspect;
pub mod llm;
pub mod output;
pub mod prompt;
pub mod schema;
pub mod snapshots;
pub mod sql;
pub mod store;
pub mod validate;
