pub mod config;
pub mod error;
pub mod html;
pub mod inference;
pub mod ledger;
pub mod report;
pub mod routes;
pub mod session;
pub mod storage;
pub mod upload;
