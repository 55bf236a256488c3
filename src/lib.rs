pub mod aging;
pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod maintenance;
pub mod marketing;
pub mod models;
pub mod rollup;
pub mod settings;
pub mod views;
