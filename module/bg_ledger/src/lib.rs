pub mod consumer;
pub mod ledger;
pub mod tag_tracker;

pub use consumer::LedgerConsumer;
pub use ledger::{ IncomingEvent, LedgerStore };
pub use tag_tracker::TagUsageTracker;
