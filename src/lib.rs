pub mod alert;
pub mod config;
pub mod monitor;
pub mod output;
pub mod sources;
pub mod state;
