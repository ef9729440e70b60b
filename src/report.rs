pub mod dashboard;
pub mod thumbnail;
