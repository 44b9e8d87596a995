pub mod fetcher;
pub mod ledger;
pub mod processor;
pub mod resolver;
pub mod stats;
pub mod updater;
