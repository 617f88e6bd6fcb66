//! Paper trading ledger

mod ledger;

pub use ledger::PaperLedger;
