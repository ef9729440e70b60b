// Station occupancy for a bikeshare network.
// The feed is a json array with one object per station, updated live.

use std::error::Error;

use duckdb::{params, Connection};
use jiff::{tz::TimeZone, Timestamp, Zoned};
use log::info;

use crate::snapshot::{Observation, StationSnapshot, Totals};
use crate::utils::lib_duckdb::WithLogging;

pub struct StationsArchive {
    /// Form of http://www.url.com
    pub base_url: String,
    pub table: String,
    pub duckdb_path: String,
    /// The web root, charts go into `www_dir/table/`
    pub www_dir: String,
}

/// What a scrape wrote to the archive.
#[derive(Debug)]
pub struct ScrapeSummary {
    pub stations: Vec<StationSnapshot>,
    pub totals: Totals,
    pub at: Timestamp,
}

/// Parse the body of the `/stations/stations` response.
pub fn parse_stations(body: &str) -> Result<Vec<StationSnapshot>, serde_json::Error> {
    serde_json::from_str(body)
}

/// Charts are shown in the local time of the network.
pub fn local_timezone() -> Result<TimeZone, jiff::Error> {
    TimeZone::get("America/New_York")
}

impl StationsArchive {
    pub fn stations_url(&self) -> String {
        format!("{}/stations/stations", self.base_url.trim_end_matches('/'))
    }

    /// Directory where the dashboard for this table is written.
    pub fn output_dir(&self) -> String {
        self.www_dir.to_owned() + "/" + &self.table
    }

    /// Get the current state of all stations.  The body is decoded with the
    /// charset from the response headers.
    pub fn download_stations(&self) -> Result<Vec<StationSnapshot>, Box<dyn Error>> {
        let url = self.stations_url();
        info!("downloading {}", url);
        let resp = reqwest::blocking::get(&url)?.error_for_status()?;
        let body = resp.text()?;
        let stations = parse_stations(&body)?;
        info!("got {} stations", stations.len());
        Ok(stations)
    }

    pub fn create_table(&self, conn: &Connection) -> Result<(), duckdb::Error> {
        info!("creating table {} ...", self.table);
        let sql = format!(
            r#"
CREATE TABLE IF NOT EXISTS {} (
    eventdatetime DATETIME,
    max_extra_bikes INT,
    stocking_full INT,
    name VARCHAR(60),
    primary_locked_cycle_count INT,
    stocking_low INT,
    total_locked_cycle_count INT,
    free_dockes INT,
    free_spaces INT
);
        "#,
            self.table
        );
        conn.execute_logged(&sql, [])?;
        Ok(())
    }

    /// Insert one row.  The timestamp is stored in UTC.
    pub fn save_snapshot(
        &self,
        conn: &Connection,
        snapshot: &StationSnapshot,
        at: Timestamp,
    ) -> Result<(), duckdb::Error> {
        let sql = format!(
            r#"
INSERT INTO {} (eventdatetime, max_extra_bikes, stocking_full, name,
    primary_locked_cycle_count, stocking_low, total_locked_cycle_count,
    free_dockes, free_spaces)
VALUES (make_timestamp(?::BIGINT), ?, ?, ?, ?, ?, ?, ?, ?);
        "#,
            self.table
        );
        conn.execute_logged(
            &sql,
            params![
                at.as_microsecond(),
                snapshot.max_extra_bikes,
                snapshot.stocking_full,
                snapshot.name,
                snapshot.primary_locked_cycle_count,
                snapshot.stocking_low,
                snapshot.total_locked_cycle_count,
                snapshot.free_dockes,
                snapshot.free_spaces,
            ],
        )?;
        Ok(())
    }

    /// Write the sums as one more station called `Totals`.
    pub fn save_totals(
        &self,
        conn: &Connection,
        totals: &Totals,
        at: Timestamp,
    ) -> Result<(), duckdb::Error> {
        self.save_snapshot(conn, &totals.to_snapshot(), at)
    }

    /// Download the current values and append them to the table, followed
    /// by the totals row.  Rows are inserted one at a time, if one of them
    /// fails the ones before it stay in the table.
    pub fn populate_current_values(&self, conn: &Connection) -> Result<ScrapeSummary, Box<dyn Error>> {
        let stations = self.download_stations()?;
        let summary = self.save_stations(conn, stations, Timestamp::now())?;
        Ok(summary)
    }

    /// Persist one scrape, all rows share the same timestamp.
    pub fn save_stations(
        &self,
        conn: &Connection,
        stations: Vec<StationSnapshot>,
        at: Timestamp,
    ) -> Result<ScrapeSummary, duckdb::Error> {
        let mut totals = Totals::new();
        for station in &stations {
            totals = totals.accumulate(station);
            self.save_snapshot(conn, station, at)?;
        }
        self.save_totals(conn, &totals, at)?;
        info!(
            "inserted {} rows into {} at {}",
            stations.len() + 1,
            self.table,
            at
        );
        Ok(ScrapeSummary {
            stations,
            totals,
            at,
        })
    }

    /// All station names in the table, sorted ascending.  Includes `Totals`.
    pub fn get_station_names(&self, conn: &Connection) -> Result<Vec<String>, duckdb::Error> {
        let query = format!("SELECT DISTINCT name FROM {} ORDER BY name ASC;", self.table);
        let mut stmt = conn.prepare(&query)?;
        let res_iter = stmt.query_map([], |row| row.get::<usize, String>(0))?;
        let res: Vec<String> = res_iter.collect::<Result<_, _>>()?;
        Ok(res)
    }

    /// The total locked cycle count of one station, ordered by time.
    pub fn get_history(
        &self,
        conn: &Connection,
        name: &str,
    ) -> Result<Vec<Observation>, Box<dyn Error>> {
        let query = format!(
            r#"
SELECT epoch_us(eventdatetime), total_locked_cycle_count
FROM {}
WHERE name = ?
ORDER BY eventdatetime;
    "#,
            self.table
        );
        let mut stmt = conn.prepare(&query)?;
        let rows = stmt.query_map(params![name], |row| {
            Ok((row.get::<usize, i64>(0)?, row.get::<usize, u32>(1)?))
        })?;
        let tz = local_timezone()?;
        let mut res: Vec<Observation> = Vec::new();
        for row in rows {
            let (micros, count) = row?;
            res.push(Observation {
                zoned: Zoned::new(Timestamp::from_microsecond(micros)?, tz.clone()),
                total_locked_cycle_count: count,
            });
        }
        Ok(res)
    }

    /// All rows of one station with their UTC timestamp, ordered by time.
    pub fn get_snapshots(
        &self,
        conn: &Connection,
        name: &str,
    ) -> Result<Vec<(Timestamp, StationSnapshot)>, Box<dyn Error>> {
        let query = format!(
            r#"
SELECT epoch_us(eventdatetime), max_extra_bikes, stocking_full, name,
    primary_locked_cycle_count, stocking_low, total_locked_cycle_count,
    free_dockes, free_spaces
FROM {}
WHERE name = ?
ORDER BY eventdatetime;
    "#,
            self.table
        );
        let mut stmt = conn.prepare(&query)?;
        let rows = stmt.query_map(params![name], |row| {
            Ok((
                row.get::<usize, i64>(0)?,
                StationSnapshot {
                    max_extra_bikes: row.get(1)?,
                    stocking_full: row.get(2)?,
                    name: row.get(3)?,
                    primary_locked_cycle_count: row.get(4)?,
                    stocking_low: row.get(5)?,
                    total_locked_cycle_count: row.get(6)?,
                    free_dockes: row.get(7)?,
                    free_spaces: row.get(8)?,
                },
            ))
        })?;
        let mut res = Vec::new();
        for row in rows {
            let (micros, snapshot) = row?;
            res.push((Timestamp::from_microsecond(micros)?, snapshot));
        }
        Ok(res)
    }
}
