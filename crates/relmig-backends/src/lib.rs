//! Database connections for the relmig executor.
//!
//! - [`sqlite::SqliteConnection`]: blocking SQLite through `rusqlite`
//! - [`sqlx_sqlite::AsyncSqliteConnection`]: async SQLite through `sqlx`
//! - `postgres::PostgresConnection`: async PostgreSQL through `sqlx`
//!   (requires the `postgres` feature)
//!
//! Both `sqlx` connections are [`SqlxConnection`] over a database-specific
//! [`SqlxSession`].

pub mod sqlite;
pub mod sqlx_backend;
pub mod sqlx_sqlite;

#[cfg(feature = "postgres")]
pub mod postgres;

pub use sqlite::{SqliteConnection, SqliteTransaction};
pub use sqlx_backend::{SqlxConnection, SqlxSession, SqlxTransaction};
pub use sqlx_sqlite::{AsyncSqliteConnection, AsyncSqliteTransaction};

#[cfg(feature = "postgres")]
pub use postgres::{PostgresConnection, PostgresTransaction};

use std::path::PathBuf;

use thiserror::Error;

/// Errors resolving a database URL.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BackendError {
    #[error("unsupported database URL scheme: {0}")]
    UnsupportedScheme(String),

    #[error("database URL has no scheme: {0}")]
    MissingScheme(String),

    #[error("{0} support is not compiled in; rebuild with --features {1}")]
    FeatureDisabled(&'static str, &'static str),
}

/// Database a URL points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseUrl {
    /// An SQLite file. `:memory:` is kept verbatim.
    Sqlite(PathBuf),
    /// A PostgreSQL connection URL.
    Postgres(String),
}

impl DatabaseUrl {
    /// Classify `url` by its scheme.
    ///
    /// Accepts `sqlite:path`, `sqlite://path`, `postgres://...` and
    /// `postgresql://...`.
    pub fn parse(url: &str) -> Result<Self, BackendError> {
        let (scheme, rest) = url
            .split_once(':')
            .ok_or_else(|| BackendError::MissingScheme(url.to_string()))?;

        match scheme.to_ascii_lowercase().as_str() {
            "sqlite" => {
                let path = rest.strip_prefix("//").unwrap_or(rest);
                let path = path.split('?').next().unwrap_or(path);
                Ok(Self::Sqlite(PathBuf::from(path)))
            }
            "postgres" | "postgresql" => {
                if cfg!(feature = "postgres") {
                    Ok(Self::Postgres(url.to_string()))
                } else {
                    Err(BackendError::FeatureDisabled("PostgreSQL", "postgres"))
                }
            }
            other => Err(BackendError::UnsupportedScheme(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sqlite_urls() {
        assert_eq!(
            DatabaseUrl::parse("sqlite://data/app.db").unwrap(),
            DatabaseUrl::Sqlite(PathBuf::from("data/app.db"))
        );
        assert_eq!(
            DatabaseUrl::parse("sqlite:app.db?mode=rwc").unwrap(),
            DatabaseUrl::Sqlite(PathBuf::from("app.db"))
        );
        assert_eq!(
            DatabaseUrl::parse("SQLITE:///tmp/x.db").unwrap(),
            DatabaseUrl::Sqlite(PathBuf::from("/tmp/x.db"))
        );
    }

    #[test]
    fn test_parse_rejects_unknown_scheme() {
        assert_eq!(
            DatabaseUrl::parse("mysql://localhost/db"),
            Err(BackendError::UnsupportedScheme("mysql".into()))
        );
        assert!(matches!(
            DatabaseUrl::parse("just-a-path.db"),
            Err(BackendError::MissingScheme(_))
        ));
    }

    #[cfg(not(feature = "postgres"))]
    #[test]
    fn test_postgres_requires_feature() {
        assert_eq!(
            DatabaseUrl::parse("postgres://localhost/db"),
            Err(BackendError::FeatureDisabled("PostgreSQL", "postgres"))
        );
    }

    #[cfg(feature = "postgres")]
    #[test]
    fn test_parse_postgres_url() {
        assert_eq!(
            DatabaseUrl::parse("postgresql://u@localhost/db").unwrap(),
            DatabaseUrl::Postgres("postgresql://u@localhost/db".into())
        );
    }
}
