use std::env;

use crate::{
    db::bikeshare::stations_archive::StationsArchive,
    utils::lib_duckdb::{validate_table_name, ConfigError},
};

pub struct ProdDb {}

impl ProdDb {
    /// Paths come from the environment (see `.env/<env>.env`):
    /// `BIKESHARE_DUCKDB_PATH` and `BIKESHARE_WWW_DIR`.
    pub fn bikeshare_stations(table: &str, base_url: &str) -> Result<StationsArchive, ConfigError> {
        let table = validate_table_name(table)?;
        Ok(StationsArchive {
            base_url: base_url.to_string(),
            table: table.to_string(),
            duckdb_path: env::var("BIKESHARE_DUCKDB_PATH")
                .unwrap_or_else(|_| "bikeshare.duckdb".to_string()),
            www_dir: env::var("BIKESHARE_WWW_DIR").unwrap_or_else(|_| "/var/www/html".to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::utils::lib_duckdb::ConfigError;

    use super::ProdDb;

    #[test]
    fn bikeshare_stations() {
        let archive =
            ProdDb::bikeshare_stations("bikeshare_baltimore", "http://www.bmorebikeshare.com")
                .unwrap();
        assert_eq!(archive.table, "bikeshare_baltimore");
        assert!(archive.output_dir().ends_with("/bikeshare_baltimore"));

        let res = ProdDb::bikeshare_stations("x; DROP TABLE y", "http://localhost");
        assert!(matches!(res, Err(ConfigError::InvalidTableName(_))));
    }
}
