pub mod history_ledger;

pub use history_ledger::{HistoryLedger, LedgerError};
