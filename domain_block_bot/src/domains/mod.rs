/// Types shared for this endeavor.
pub mod types;

/// Asking the reputation service about domains.
pub mod checker;

/// Where the domain list and alert state live.
pub mod database;

pub use checker::{BlockChecker, CheckErrorPolicy, ReputationChecker};
pub use database::{DomainStore, ReplaceOutcome, Storage, StorageBackend};
pub use types::{Domain, Verdict};
