pub mod stations_archive;
