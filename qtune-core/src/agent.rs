//! Tabular Q-learning agent.
mod base;
mod config;
mod q_table;
pub use base::QAgent;
pub use config::QAgentConfig;
pub use q_table::QTable;
