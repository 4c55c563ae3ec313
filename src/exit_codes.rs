//! Exit code policy for the dbfixture CLI.
//!
//! - `0` = success (`exists`: the database exists)
//! - `1` = `exists`: the database does not exist
//! - `10` = general operational failure (service error, bad DDL, ...)
//! - `11` = could not connect to the service
//! - `12` = configuration error

pub const SUCCESS: i32 = 0;

/// `exists` answered "no"
pub const NOT_FOUND: i32 = 1;

pub const OPERATIONAL_FAILURE: i32 = 10;

pub const CONNECTION_FAILURE: i32 = 11;

pub const CONFIG_ERROR: i32 = 12;
