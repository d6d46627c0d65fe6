pub mod args;
pub mod bank_api;
pub mod cli;
pub mod config;
pub mod firefly_api;
pub mod importer;
pub mod terminal;
pub mod transaction;
pub mod watermark;
