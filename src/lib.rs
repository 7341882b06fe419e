//! Live shift sessions for on-shift drivers.
//!
//! Tracks which drivers are on shift, which live connection currently
//! belongs to each of them and where they were last seen, and republishes
//! truck and position state to those connections as drivers reconnect and
//! move.

pub mod channel;
pub mod collaborators;
pub mod config;
pub mod db;
pub mod error;
pub mod kafka;
pub mod models;
pub mod processor;
pub mod services;
pub mod state;
pub mod store;

#[cfg(test)]
mod testing;
