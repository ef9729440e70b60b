use std::{error::Error, path::Path};

use bikeshare::{
    db::{bikeshare::stations_archive::ScrapeSummary, prod_db::ProdDb},
    report::dashboard::Dashboard,
    snapshot::{Field, StationSnapshot, TOTALS_NAME},
    utils::lib_duckdb,
};
use clap::Parser;
use duckdb::AccessMode;
use log::{info, warn};
use tabled::{builder::Builder, settings::Style};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Table holding the data of one bikeshare network, e.g. bikeshare_baltimore
    #[arg(long)]
    table: String,

    /// Creates the database table
    #[arg(long)]
    create_table: bool,

    /// Generates the graphs based on the data from the database
    #[arg(long)]
    generate_graphs: bool,

    /// Generates the thumbnails as well
    #[arg(long)]
    generate_images: bool,

    /// Scrapes the data from the bike share site.  This is the default if no
    /// options are given
    #[arg(long)]
    scrape_data: bool,

    /// Base url to query.  Form of http://www.url.com
    #[arg(long, default_value = "http://www.bmorebikeshare.com")]
    base_url: String,

    /// Environment name, e.g., test, prod
    #[arg(short, long, default_value = "prod")]
    env: String,
}

#[derive(Debug, PartialEq)]
struct Actions {
    create_table: bool,
    scrape: bool,
    report: bool,
    images: bool,
}

impl Args {
    /// Scraping runs whenever neither the table creation nor the graphs are asked for.
    fn actions(&self) -> Actions {
        Actions {
            create_table: self.create_table,
            scrape: self.scrape_data || !(self.create_table || self.generate_graphs),
            report: self.generate_graphs || self.generate_images,
            images: self.generate_images,
        }
    }
}

fn row(station: &StationSnapshot) -> Vec<String> {
    let mut xs = vec![station.name.clone()];
    xs.extend(Field::ALL.iter().map(|f| f.value(station).to_string()));
    xs
}

/// Make an ASCII table with the values of one scrape
fn ascii_table(summary: &ScrapeSummary) -> tabled::Table {
    let mut builder = Builder::new();
    let mut header = vec!["name".to_string()];
    header.extend(Field::ALL.iter().map(|f| f.to_string()));
    builder.push_record(header);
    for station in &summary.stations {
        builder.push_record(row(station));
    }
    builder.push_record(row(&summary.totals.to_snapshot()));
    let mut table = builder.build();
    table.with(Style::sharp());
    table
}

/// Run this job every 15 min to scrape, and every hour with --generate-graphs
fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .init();

    if let Err(e) = dotenvy::from_path(Path::new(format!(".env/{}.env", args.env).as_str())) {
        warn!("No .env/{}.env file loaded: {}", args.env, e);
    }

    let archive = ProdDb::bikeshare_stations(&args.table, &args.base_url)?;
    let conn = lib_duckdb::open(&archive.duckdb_path, AccessMode::ReadWrite)?;
    let actions = args.actions();

    if actions.create_table {
        archive.create_table(&conn)?;
    }
    if actions.scrape {
        let summary = archive.populate_current_values(&conn)?;
        println!("{}", ascii_table(&summary));
        info!(
            "saved {} stations and {} for {}",
            summary.stations.len(),
            TOTALS_NAME,
            summary.at
        );
    }
    if actions.report {
        let dashboard = Dashboard::new(&archive);
        let summary = dashboard.generate(&archive, &conn, actions.images)?;
        info!(
            "{} stations, {} pages, {} images, {} failures",
            summary.stations.len(),
            summary.pages,
            summary.images,
            summary.failures.len()
        );
    }

    Ok(())
}
