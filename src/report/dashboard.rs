use std::{
    error::Error,
    fs, io,
    path::PathBuf,
};

use build_html::{Container, ContainerType, Html, HtmlContainer};
use duckdb::Connection;
use itertools::Itertools;
use log::{error, info};
use plotly::{
    color::Rgb,
    common::{Font, Mode, Title},
    Layout, Plot, Scatter,
};
use thiserror::Error;

use crate::{
    db::bikeshare::stations_archive::StationsArchive,
    report::thumbnail,
    snapshot::{safe_filename, Observation, TOTALS_NAME},
};

/// Failure to produce the page or the image of one station.  These don't
/// stop the report, the other stations are still processed.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("station name '{0}' has no characters usable in a file name")]
    EmptyFileName(String),
    #[error("failed to write {path}: {source}")]
    Io { path: String, source: io::Error },
    #[error("failed to render image {path}: {message}")]
    Image { path: String, message: String },
}

#[derive(Debug, Default)]
pub struct ReportSummary {
    pub stations: Vec<String>,
    pub pages: usize,
    pub images: usize,
    pub failures: Vec<(String, RenderError)>,
}

pub struct Dashboard {
    pub out_dir: PathBuf,
    /// Shown in the page header as `<network>.bike.share`
    pub network: String,
}

/// Tables are named `bikeshare_<network>`, the first 10 characters are
/// dropped whatever they are, e.g. `bikeshare_baltimore` -> `baltimore`.
pub fn network_name(table: &str) -> String {
    table.chars().skip(10).collect()
}

/// Line chart of the total locked cycle count of a station, in local time.
pub fn station_chart(name: &str, history: &[Observation]) -> Plot {
    let x: Vec<String> = history
        .iter()
        .map(|e| e.zoned.strftime("%Y-%m-%d %H:%M:%S").to_string())
        .collect();
    let y: Vec<u32> = history.iter().map(|e| e.total_locked_cycle_count).collect();
    let trace = Scatter::new(x, y).mode(Mode::Lines).name(name);

    let layout = Layout::new().title(Title::with_text(name)).font(
        Font::new()
            .family("Courier New, monospace")
            .size(18)
            .color(Rgb::new(0, 0, 0)),
    );
    let mut plot = Plot::new();
    plot.add_trace(trace);
    plot.set_layout(layout);
    plot
}

impl Dashboard {
    pub fn new(archive: &StationsArchive) -> Dashboard {
        Dashboard {
            out_dir: PathBuf::from(archive.output_dir()),
            network: network_name(&archive.table),
        }
    }

    fn path(&self, file_stem: &str, extension: &str) -> PathBuf {
        self.out_dir.join(format!("{}.{}", file_stem, extension))
    }

    /// Write `<file_stem>.html` with the interactive chart.
    pub fn write_station_page(
        &self,
        name: &str,
        file_stem: &str,
        history: &[Observation],
    ) -> Result<PathBuf, RenderError> {
        let path = self.path(file_stem, "html");
        let html = station_chart(name, history).to_html();
        fs::write(&path, html).map_err(|source| RenderError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Ok(path)
    }

    /// Write `<file_stem>.png`, a static version of the chart.
    pub fn write_station_image(
        &self,
        file_stem: &str,
        history: &[Observation],
    ) -> Result<PathBuf, RenderError> {
        let path = self.path(file_stem, "png");
        thumbnail::write_png(&path, history).map_err(|e| RenderError::Image {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Ok(path)
    }

    /// The landing page.  `names` are the station names as stored, the
    /// `Totals` entry always comes first.
    pub fn index_html(&self, names: &[String]) -> String {
        let stations: Vec<String> = names
            .iter()
            .map(|e| safe_filename(e))
            .filter(|e| !e.is_empty() && e != TOTALS_NAME)
            .unique()
            .collect();

        let mut menu = Container::new(ContainerType::UnorderedList)
            .with_link(format!("#{}", TOTALS_NAME), TOTALS_NAME);
        for station in &stations {
            menu.add_link(format!("#{}", station), station);
        }

        let graphs = stations
            .iter()
            .map(|e| {
                format!(
                    "  <a name=\"{0}\"><h1>{0}</h1></a>\n  <p><a href=\"{0}.html\"><img src=\"{0}.png\"></a></p>",
                    e
                )
            })
            .join("\n");

        format!(
            r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<style>
.flex-container {{
    display: -webkit-flex;
    display: flex;
    -webkit-flex-flow: row wrap;
    flex-flow: row wrap;
    text-align: center;
}}

.flex-container > * {{
    padding: 15px;
    -webkit-flex: 1 100%;
    flex: 1 100%;
}}

.article {{
    text-align: left;
}}

header {{background: black;color:white;}}
footer {{background: #aaa;color:white;}}
.nav {{background:#eee;}}

.nav ul {{
    list-style-type: none;
    padding: 0;
}}
.nav ul a {{
    text-decoration: none;
}}

@media all and (min-width: 768px) {{
    .nav {{text-align:left;-webkit-flex: 1 auto;flex:1 auto;-webkit-order:1;order:1;}}
    .article {{-webkit-flex:5 0px;flex:5 0px;-webkit-order:2;order:2;}}
    footer {{-webkit-order:3;order:3;}}
}}
</style>
</head>
<body>

<div class="flex-container">
<header>
  <h1>{network}.bike.share</h1>
</header>

<nav class="nav">
{menu}
</nav>

<article class="article">
  <h1>{totals}</h1>
  <p><a href="{totals}.html"><img src="{totals}.png"></a></p>
{graphs}
</article>

<footer>Station occupancy, updated every few minutes</footer>
</div>

</body>
</html>"#,
            network = self.network,
            menu = menu.to_html_string(),
            totals = TOTALS_NAME,
            graphs = graphs,
        )
    }

    pub fn write_index(&self, names: &[String]) -> Result<PathBuf, io::Error> {
        let path = self.out_dir.join("index.html");
        fs::write(&path, self.index_html(names))?;
        info!("wrote {}", path.display());
        Ok(path)
    }

    /// Make a chart page (and optionally an image) for every station in the
    /// table, then the index page.  Database errors abort the report, a
    /// failure to render one station is logged and recorded in the summary.
    pub fn generate(
        &self,
        archive: &StationsArchive,
        conn: &Connection,
        with_images: bool,
    ) -> Result<ReportSummary, Box<dyn Error>> {
        fs::create_dir_all(&self.out_dir)?;
        let names = archive.get_station_names(conn)?;

        let mut summary = ReportSummary::default();
        for name in &names {
            info!("Generating {}", name);
            let history = archive.get_history(conn, name)?;
            let file_stem = safe_filename(name);
            if file_stem.is_empty() {
                let e = RenderError::EmptyFileName(name.clone());
                error!("{}", e);
                summary.failures.push((name.clone(), e));
                continue;
            }

            match self.write_station_page(name, &file_stem, &history) {
                Ok(_) => summary.pages += 1,
                Err(e) => {
                    error!("{}", e);
                    summary.failures.push((name.clone(), e));
                }
            }
            if with_images {
                match self.write_station_image(&file_stem, &history) {
                    Ok(_) => summary.images += 1,
                    Err(e) => {
                        error!("{}", e);
                        summary.failures.push((name.clone(), e));
                    }
                }
            }
        }

        self.write_index(&names)?;
        summary.stations = names;
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use std::{error::Error, path::Path};

    use duckdb::Connection;
    use jiff::{Timestamp, ToSpan};
    use serde_json::Value;

    use crate::db::bikeshare::stations_archive::{parse_stations, StationsArchive};

    use super::*;

    const PIER_A: &str = r#"[{"max_extra_bikes":2,"stocking_full":0,"name":"Pier A","primary_locked_cycle_count":5,"stocking_low":1,"total_locked_cycle_count":6,"free_dockes":3,"free_spaces":4}]"#;

    fn setup(www_dir: &Path) -> Result<(StationsArchive, Connection), Box<dyn Error>> {
        let _ = env_logger::builder()
            .filter_level(log::LevelFilter::Info)
            .is_test(true)
            .try_init();
        let archive = StationsArchive {
            base_url: "http://localhost".to_string(),
            table: "bikeshare_baltimore".to_string(),
            duckdb_path: ":memory:".to_string(),
            www_dir: www_dir.display().to_string(),
        };
        let conn = Connection::open_in_memory()?;
        archive.create_table(&conn)?;
        Ok((archive, conn))
    }

    #[test]
    fn network_names() {
        assert_eq!(network_name("bikeshare_baltimore"), "baltimore");
        assert_eq!(network_name("bikeshareXchicago"), "chicago");
        assert_eq!(network_name("capital_bikeshare"), "keshare");
        assert_eq!(network_name("citibikes"), "");
    }

    #[test]
    fn chart_points_in_order() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let (archive, conn) = setup(dir.path())?;
        let t1: Timestamp = "2024-01-15T17:00:00Z".parse()?;
        let t2 = t1 + 10.minutes();
        let mut second = parse_stations(PIER_A)?;
        second[0].total_locked_cycle_count = 8;
        archive.save_stations(&conn, parse_stations(PIER_A)?, t1)?;
        archive.save_stations(&conn, second, t2)?;

        let history = archive.get_history(&conn, "Pier A")?;
        let plot = station_chart("Pier A", &history);
        let v: Value = serde_json::from_str(&plot.to_json())?;
        let trace = &v["data"][0];
        assert_eq!(
            trace["x"],
            serde_json::json!(["2024-01-15 12:00:00", "2024-01-15 12:10:00"])
        );
        assert_eq!(trace["y"], serde_json::json!([6, 8]));
        assert_eq!(v["layout"]["title"]["text"], "Pier A");
        Ok(())
    }

    #[test]
    fn index_page() -> Result<(), Box<dyn Error>> {
        let dashboard = Dashboard {
            out_dir: PathBuf::from("/tmp"),
            network: "baltimore".to_string(),
        };
        let names = vec![
            "5th & Main!".to_string(),
            "Pier A".to_string(),
            "Totals".to_string(),
            "???".to_string(),
        ];
        let html = dashboard.index_html(&names);
        assert!(html.contains("<h1>baltimore.bike.share</h1>"));
        assert!(html.contains("href=\"#Totals\""));
        assert!(html.contains("href=\"#Pier A\""));
        assert!(html.contains("href=\"#5th  Main\""));
        assert!(html.contains("<a name=\"Pier A\"><h1>Pier A</h1></a>"));
        assert!(html.contains("<a href=\"5th  Main.html\"><img src=\"5th  Main.png\"></a>"));
        assert!(html.contains("<a href=\"Totals.html\"><img src=\"Totals.png\"></a>"));
        // Totals is only linked once in the menu and has no station section
        assert_eq!(html.matches("href=\"#Totals\"").count(), 1);
        assert!(!html.contains("<a name=\"Totals\">"));
        // the menu lists Totals first
        let totals = html.find("href=\"#Totals\"").unwrap();
        let pier = html.find("href=\"#Pier A\"").unwrap();
        assert!(totals < pier);
        Ok(())
    }

    #[test]
    fn generate_dashboard() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let (archive, conn) = setup(dir.path())?;
        let t1: Timestamp = "2024-01-15T17:00:00Z".parse()?;
        archive.save_stations(&conn, parse_stations(PIER_A)?, t1)?;
        archive.save_stations(&conn, parse_stations(PIER_A)?, t1 + 10.minutes())?;

        let dashboard = Dashboard::new(&archive);
        let summary = dashboard.generate(&archive, &conn, true)?;
        assert_eq!(summary.stations, vec!["Pier A".to_string(), "Totals".to_string()]);
        assert_eq!(summary.pages, 2);
        assert_eq!(summary.images, 2);
        assert!(summary.failures.is_empty());

        let out = dir.path().join("bikeshare_baltimore");
        for file in ["Pier A.html", "Pier A.png", "Totals.html", "Totals.png", "index.html"] {
            assert!(out.join(file).exists(), "missing {}", file);
        }
        let page = fs::read_to_string(out.join("Pier A.html"))?;
        assert!(page.contains("Pier A"));
        Ok(())
    }

    #[test]
    fn station_failures_dont_stop_the_report() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let (archive, conn) = setup(dir.path())?;
        let body = r#"[
            {"name":"!!!","max_extra_bikes":0,"stocking_full":0,"primary_locked_cycle_count":0,"stocking_low":0,"total_locked_cycle_count":1,"free_dockes":0,"free_spaces":0},
            {"name":"Pier A","max_extra_bikes":0,"stocking_full":0,"primary_locked_cycle_count":0,"stocking_low":0,"total_locked_cycle_count":2,"free_dockes":0,"free_spaces":0}
        ]"#;
        archive.save_stations(&conn, parse_stations(body)?, Timestamp::now())?;

        let dashboard = Dashboard::new(&archive);
        // a directory where the image should go makes the png step fail
        fs::create_dir_all(dashboard.out_dir.join("Pier A.png"))?;

        let summary = dashboard.generate(&archive, &conn, true)?;
        assert_eq!(summary.stations.len(), 3);
        assert_eq!(summary.pages, 2);
        assert_eq!(summary.images, 1);
        assert_eq!(summary.failures.len(), 2);
        assert!(matches!(summary.failures[0].1, RenderError::EmptyFileName(_)));
        assert_eq!(summary.failures[1].0, "Pier A");
        assert!(matches!(summary.failures[1].1, RenderError::Image { .. }));
        assert!(dashboard.out_dir.join("Totals.png").exists());
        assert!(dashboard.out_dir.join("index.html").exists());
        Ok(())
    }

    #[test]
    fn pages_without_images() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let (archive, conn) = setup(dir.path())?;
        archive.save_stations(&conn, parse_stations(PIER_A)?, Timestamp::now())?;
        let dashboard = Dashboard::new(&archive);
        let summary = dashboard.generate(&archive, &conn, false)?;
        assert_eq!(summary.pages, 2);
        assert_eq!(summary.images, 0);
        assert!(!dashboard.out_dir.join("Pier A.png").exists());
        Ok(())
    }
}
