pub mod chain;
pub mod config;
pub mod ledger;
pub mod models;
pub mod observability;
pub mod queue;
pub mod scheduler;
pub mod storage;
pub mod upstream;
pub mod worker;
