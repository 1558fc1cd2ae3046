pub mod config;
pub mod directory;
pub mod health;
pub mod migrate;
