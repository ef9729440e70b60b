pub mod db;
pub mod report;
pub mod snapshot;
pub mod utils;
