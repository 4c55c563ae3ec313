//! Identifier of a logical database within the service.

use anyhow::{bail, Result};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// `(project, instance, database)` triple. A plain value with no lifecycle.
///
/// Renders as `projects/{project}/instances/{instance}/databases/{database}`.
/// Everything after `databases/` is the database name, so names containing
/// `/` parse back unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct DatabaseId {
    pub project: String,
    pub instance: String,
    pub database: String,
}

impl DatabaseId {
    pub fn new(
        project: impl Into<String>,
        instance: impl Into<String>,
        database: impl Into<String>,
    ) -> Self {
        Self {
            project: project.into(),
            instance: instance.into(),
            database: database.into(),
        }
    }

    /// Resource name of the owning instance.
    pub fn instance_name(&self) -> String {
        format!("projects/{}/instances/{}", self.project, self.instance)
    }
}

impl fmt::Display for DatabaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/databases/{}", self.instance_name(), self.database)
    }
}

impl FromStr for DatabaseId {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.splitn(6, '/').collect();
        match parts.as_slice() {
            ["projects", project, "instances", instance, "databases", database]
                if !project.is_empty() && !instance.is_empty() && !database.is_empty() =>
            {
                Ok(Self::new(*project, *instance, *database))
            }
            _ => bail!(
                "Invalid database name '{}': expected projects/<project>/instances/<instance>/databases/<database>",
                s
            ),
        }
    }
}
