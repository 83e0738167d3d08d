//! Application settings loaded via OrthoConfig.
//!
//! Values come from CLI flags, `BAAS_*` environment variables and an optional
//! configuration file, in that order of precedence.

use std::net::{AddrParseError, SocketAddr};

use ortho_config::OrthoConfig;
use serde::Deserialize;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 10;

/// Runtime configuration for the backend server.
#[derive(Debug, Clone, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "BAAS")]
pub struct AppSettings {
    /// PostgreSQL connection string. Without it the server runs on the
    /// in-memory backend.
    pub database_url: Option<String>,
    /// Socket address to listen on.
    pub bind_addr: Option<String>,
    /// Upper bound on pooled database connections.
    pub db_max_connections: Option<u32>,
    /// Apply pending schema migrations before serving.
    #[ortho_config(default = true)]
    pub run_migrations: bool,
    /// Reference of a tenant seeded into the in-memory backend.
    pub demo_project: Option<String>,
    /// API key for the seeded tenant.
    pub demo_api_key: Option<String>,
}

impl AppSettings {
    /// Configured database URL, ignoring blank values.
    pub fn database_url(&self) -> Option<&str> {
        self.database_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }

    /// Parsed listen address, falling back to `0.0.0.0:8080`.
    ///
    /// # Errors
    /// Returns [`AddrParseError`] when the configured value is not a socket
    /// address.
    pub fn bind_addr(&self) -> Result<SocketAddr, AddrParseError> {
        self.bind_addr
            .as_deref()
            .unwrap_or(DEFAULT_BIND_ADDR)
            .parse()
    }

    /// Demo tenant reference and key, when both are set.
    pub fn demo_credentials(&self) -> Option<(&str, &str)> {
        let project = self.demo_project.as_deref().filter(|value| !value.is_empty())?;
        let key = self.demo_api_key.as_deref().filter(|value| !value.is_empty())?;
        Some((project, key))
    }

    /// Pool size, falling back to 10.
    pub fn db_max_connections(&self) -> u32 {
        self.db_max_connections
            .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS)
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for settings parsing.

    use super::*;
    use std::ffi::OsString;

    use env_lock::lock_env;
    use rstest::rstest;

    const VARS: [&str; 6] = [
        "BAAS_DATABASE_URL",
        "BAAS_BIND_ADDR",
        "BAAS_DB_MAX_CONNECTIONS",
        "BAAS_RUN_MIGRATIONS",
        "BAAS_DEMO_PROJECT",
        "BAAS_DEMO_API_KEY",
    ];

    fn load_from_empty_args() -> AppSettings {
        AppSettings::load_from_iter([OsString::from("baas-backend")])
            .expect("config should load")
    }

    #[rstest]
    fn default_values_are_used_when_missing() {
        let _guard = lock_env(VARS.map(|name| (name, None::<String>)));

        let settings = load_from_empty_args();
        assert_eq!(settings.database_url(), None);
        assert_eq!(
            settings.bind_addr().expect("default address"),
            SocketAddr::from(([0, 0, 0, 0], 8080))
        );
        assert_eq!(settings.db_max_connections(), 10);
        assert!(settings.run_migrations);
        assert_eq!(settings.demo_credentials(), None);
    }

    #[rstest]
    fn environment_overrides_are_respected() {
        let _guard = lock_env([
            (
                "BAAS_DATABASE_URL",
                Some("postgres://baas@localhost/baas".to_owned()),
            ),
            ("BAAS_BIND_ADDR", Some("127.0.0.1:9000".to_owned())),
            ("BAAS_DB_MAX_CONNECTIONS", Some("4".to_owned())),
            ("BAAS_RUN_MIGRATIONS", Some("false".to_owned())),
            ("BAAS_DEMO_PROJECT", Some("demo".to_owned())),
            ("BAAS_DEMO_API_KEY", Some("pk_demo".to_owned())),
        ]);

        let settings = load_from_empty_args();
        assert_eq!(
            settings.database_url(),
            Some("postgres://baas@localhost/baas")
        );
        assert_eq!(
            settings.bind_addr().expect("configured address"),
            SocketAddr::from(([127, 0, 0, 1], 9000))
        );
        assert_eq!(settings.db_max_connections(), 4);
        assert!(!settings.run_migrations);
        assert_eq!(settings.demo_credentials(), Some(("demo", "pk_demo")));
    }

    #[rstest]
    #[case("")]
    #[case("   ")]
    fn blank_database_urls_select_the_memory_backend(#[case] url: &str) {
        let _guard = lock_env(VARS.map(|name| {
            let value = (name == "BAAS_DATABASE_URL").then(|| url.to_owned());
            (name, value)
        }));

        assert_eq!(load_from_empty_args().database_url(), None);
    }

    #[rstest]
    fn malformed_bind_addresses_are_reported() {
        let _guard = lock_env(VARS.map(|name| {
            let value = (name == "BAAS_BIND_ADDR").then(|| "localhost".to_owned());
            (name, value)
        }));

        assert!(load_from_empty_args().bind_addr().is_err());
    }
}
