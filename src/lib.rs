pub mod auth;
pub mod clock;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod handlers;
pub mod paths;
pub mod services;
pub mod state;
pub mod storage;
pub mod validation;

#[cfg(test)]
pub mod testing;
