pub mod app_config;
pub mod database;
pub mod directory;
pub mod ledger;

pub use database::DbClient;
pub use ledger::{PgLedgerTx, PgStore};
