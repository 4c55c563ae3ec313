//! Provision and tear down throwaway databases for integration tests.
//!
//! A [`Fixture`] holds one connection to a PostgreSQL-compatible managed
//! service. It creates databases from ordered DDL statements, drops them
//! (tolerating missing ones), and hands out read-only [`BatchClient`]s scoped
//! to a [`DatabaseId`].

pub mod admin;
pub mod batch;
pub mod config;
pub mod database_id;
pub mod ddl;
pub mod fixture;
pub mod redact;
pub mod scratch;
mod session;
pub mod sql;

pub use admin::{is_not_found, sql_state, DatabaseAdmin, DropOutcome};
pub use batch::BatchClient;
pub use config::{Config, FixtureConfig, Overrides};
pub use database_id::DatabaseId;
pub use fixture::Fixture;
pub use scratch::ScratchDatabase;
