pub mod event;
pub mod ledger;

pub use event::{HealthEvent, SourceId};
pub use ledger::{HealthLedger, LedgerOutcome};
