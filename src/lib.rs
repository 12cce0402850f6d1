pub mod config;
pub mod db;
pub mod logging;
pub mod migrate;
pub mod model;
pub mod pipeline;
pub mod report;
pub mod runner;
pub mod store;
pub mod transform;
