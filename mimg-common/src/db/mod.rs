//! Database layer: schema initialization, row models, and queries

pub mod init;
pub mod keys;
pub mod models;
pub mod referrals;
pub mod users;

pub use init::{create_schema, init_database};
