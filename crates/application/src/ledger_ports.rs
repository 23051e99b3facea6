mod keys;
mod reader;
mod submitter;

pub use keys::{GeneratedKey, KeyGenerator};
pub use reader::LedgerReader;
pub use submitter::{Receipt, TransactionSubmitter};
