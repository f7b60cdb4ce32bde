//! Advisory environment checks.
//!
//! BM25 search needs PostgreSQL 17 or newer with `pg_textsearch` installed.
//! None of these helpers gate query execution; they let callers find out
//! ahead of time why a search would fail.

use std::fmt;

use serde::Serialize;
use tracing::warn;

use crate::error::{StorageResult, pg_error};
use crate::migrations::PG_TEXTSEARCH_EXTENSION;

/// Oldest PostgreSQL major version `pg_textsearch` supports.
pub const MIN_POSTGRESQL_VERSION: u32 = 17;

/// Extracts the major version from a `server_version_num` value (e.g. `170002`).
pub fn parse_server_version_num(value: &str) -> Option<u32> {
    value.trim().parse::<u32>().ok().map(|num| num / 10000)
}

/// Whether `major` is new enough for `pg_textsearch`.
pub fn is_supported_version(major: u32) -> bool {
    major >= MIN_POSTGRESQL_VERSION
}

/// Returns the server's major version.
pub async fn get_postgresql_version(client: &deadpool_postgres::Client) -> StorageResult<Option<u32>> {
    let row = client
        .query_one("SHOW server_version_num", &[])
        .await
        .map_err(|e| pg_error("Failed to read server_version_num", e))?;
    let value: String = row.get(0);
    Ok(parse_server_version_num(&value))
}

/// Whether `pg_textsearch` is enabled in the current database.
pub async fn is_pg_textsearch_available(client: &deadpool_postgres::Client) -> StorageResult<bool> {
    let row = client
        .query_one(
            "SELECT EXISTS (SELECT 1 FROM pg_extension WHERE extname = $1)",
            &[&PG_TEXTSEARCH_EXTENSION],
        )
        .await
        .map_err(|e| pg_error("Failed to query pg_extension", e))?;
    Ok(row.get(0))
}

/// Whether `pg_textsearch` is installed on the server and could be enabled.
pub async fn is_pg_textsearch_installable(client: &deadpool_postgres::Client) -> StorageResult<bool> {
    let row = client
        .query_one(
            "SELECT EXISTS (SELECT 1 FROM pg_available_extensions WHERE name = $1)",
            &[&PG_TEXTSEARCH_EXTENSION],
        )
        .await
        .map_err(|e| pg_error("Failed to query pg_available_extensions", e))?;
    Ok(row.get(0))
}

/// Severity of a [`CheckMessage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckLevel {
    /// Search will fail until fixed.
    Error,
    /// Search may work but something is off.
    Warning,
}

impl fmt::Display for CheckLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckLevel::Error => write!(f, "ERROR"),
            CheckLevel::Warning => write!(f, "WARNING"),
        }
    }
}

/// A single finding from [`ReadinessReport::messages`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckMessage {
    /// Severity.
    pub level: CheckLevel,
    /// Stable identifier, e.g. `pgts.E001`.
    pub id: &'static str,
    /// What is wrong.
    pub msg: String,
    /// How to fix it.
    pub hint: Option<String>,
}

impl fmt::Display for CheckMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: ({}) {}", self.level, self.id, self.msg)?;
        if let Some(hint) = &self.hint {
            write!(f, "\n\tHINT: {}", hint)?;
        }
        Ok(())
    }
}

/// What the server reported about BM25 prerequisites.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReadinessReport {
    /// Server major version, if it could be parsed.
    pub server_version: Option<u32>,
    /// `pg_textsearch` is enabled in this database.
    pub extension_enabled: bool,
    /// `pg_textsearch` is installed on the server.
    pub extension_installable: bool,
}

impl ReadinessReport {
    /// Queries the server for every prerequisite.
    pub async fn collect(client: &deadpool_postgres::Client) -> StorageResult<Self> {
        let report = Self {
            server_version: get_postgresql_version(client).await?,
            extension_enabled: is_pg_textsearch_available(client).await?,
            extension_installable: is_pg_textsearch_installable(client).await?,
        };
        for message in report.messages() {
            warn!(id = message.id, "{}", message.msg);
        }
        Ok(report)
    }

    /// Whether the server version is supported.
    pub fn version_supported(&self) -> bool {
        self.server_version.is_some_and(is_supported_version)
    }

    /// Whether BM25 queries can run.
    pub fn is_ready(&self) -> bool {
        self.version_supported() && self.extension_enabled
    }

    /// Findings explaining why the server is not ready.
    pub fn messages(&self) -> Vec<CheckMessage> {
        let mut messages = Vec::new();

        match self.server_version {
            Some(major) if !is_supported_version(major) => messages.push(CheckMessage {
                level: CheckLevel::Error,
                id: "pgts.E001",
                msg: format!(
                    "PostgreSQL {} found, pg_textsearch requires {}+",
                    major, MIN_POSTGRESQL_VERSION
                ),
                hint: Some(format!("Upgrade to PostgreSQL {} or newer.", MIN_POSTGRESQL_VERSION)),
            }),
            None => messages.push(CheckMessage {
                level: CheckLevel::Warning,
                id: "pgts.W001",
                msg: "Could not determine the PostgreSQL server version".to_string(),
                hint: None,
            }),
            Some(_) => {}
        }

        if !self.extension_enabled {
            let hint = if self.extension_installable {
                "Apply a migration with Operation::create_pg_textsearch_extension().".to_string()
            } else {
                "Install pg_textsearch on the server, then enable it with CREATE EXTENSION."
                    .to_string()
            };
            messages.push(CheckMessage {
                level: CheckLevel::Error,
                id: "pgts.E002",
                msg: "The pg_textsearch extension is not enabled in this database".to_string(),
                hint: Some(hint),
            });
        }

        messages
    }
}
