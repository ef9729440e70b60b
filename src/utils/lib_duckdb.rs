use duckdb::{AccessMode, Config, Params};
use log::{debug, error};
use regex::Regex;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("invalid table name '{0}', use letters, digits and '_' only")]
    InvalidTableName(String),
}

pub trait WithLogging {
    /// Execute one statement, logging it first.  If the statement fails, the
    /// error is logged together with the sql and returned to the caller.
    /// DuckDB runs it in autocommit mode so nothing of it is left behind.
    fn execute_logged<P: Params>(&self, sql: &str, params: P) -> Result<usize, duckdb::Error>;
}

impl WithLogging for duckdb::Connection {
    fn execute_logged<P: Params>(&self, sql: &str, params: P) -> Result<usize, duckdb::Error> {
        debug!("{}", sql.trim());
        match self.execute(sql, params) {
            Ok(n) => Ok(n),
            Err(e) => {
                error!("Failed to execute {}: {}", sql.trim(), e);
                Err(e)
            }
        }
    }
}

/// Open a DuckDB connection.  The file is created if it doesn't exist
/// and the access mode is `ReadWrite`.
pub fn open(duckdb_path: &str, access_mode: AccessMode) -> Result<duckdb::Connection, duckdb::Error> {
    let config = Config::default().access_mode(access_mode)?;
    duckdb::Connection::open_with_flags(duckdb_path, config)
}

/// Table names go straight into the sql text, so only accept plain identifiers.
pub fn validate_table_name(name: &str) -> Result<&str, ConfigError> {
    let re = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid regex");
    if re.is_match(name) {
        Ok(name)
    } else {
        Err(ConfigError::InvalidTableName(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use duckdb::{params, Connection};

    use super::*;

    #[test]
    fn table_names() {
        assert_eq!(validate_table_name("bikeshare_baltimore"), Ok("bikeshare_baltimore"));
        assert_eq!(validate_table_name("_t1"), Ok("_t1"));
        for name in ["", "1abc", "drop table x;", "a-b", "a.b", "name'"] {
            assert_eq!(
                validate_table_name(name),
                Err(ConfigError::InvalidTableName(name.to_string()))
            );
        }
    }

    #[test]
    fn execute_logged_returns_errors() -> Result<(), Box<dyn Error>> {
        let _ = env_logger::builder()
            .filter_level(log::LevelFilter::Debug)
            .is_test(true)
            .try_init();
        let conn = Connection::open_in_memory()?;
        conn.execute_logged("CREATE TABLE t (x INT);", [])?;
        let n = conn.execute_logged("INSERT INTO t VALUES (?);", params![1])?;
        assert_eq!(n, 1);
        assert!(conn.execute_logged("INSERT INTO missing VALUES (1);", []).is_err());
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM t;", [], |row| row.get(0))?;
        assert_eq!(count, 1);
        Ok(())
    }
}
