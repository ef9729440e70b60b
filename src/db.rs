pub mod bikeshare;
pub mod prod_db;
