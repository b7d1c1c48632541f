pub mod audit;
pub mod bidding;
pub mod database;
pub mod error;
pub mod handlers;
pub mod ledger;
pub mod notify;
pub mod orders;
pub mod sweeper;
