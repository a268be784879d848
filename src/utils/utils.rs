use std::env;

/// Default on-disk database file; override with the DB_FILE env var.
pub const DEFAULT_DB_FILE: &str = "fingerprints.db";

/// Returns the value of the environment variable `key`, or the fallback
/// (empty string if no fallback is provided).
pub fn get_env(key: &str, fallback: Option<&str>) -> String {
    env::var(key).unwrap_or_else(|_| fallback.unwrap_or("").to_string())
}

/// Resolves the database path from the environment.
pub fn db_file() -> String {
    get_env("DB_FILE", Some(DEFAULT_DB_FILE))
}
