pub mod auth;
pub mod bridge;
pub mod config;
pub mod exit_code;
pub mod fixture;
pub mod output;
pub mod registry;
pub mod runner;
pub mod sequencer;
pub mod steps;
pub mod transport;

pub use config::HarnessConfig;
pub use runner::run;
pub use sequencer::Verdict;
