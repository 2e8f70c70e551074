// Layers
pub mod chain; // Chain access: blocks, nonces, new heads
pub mod relay; // Bundle simulation, submission and resolution
pub mod strategy; // Which transactions to rescue
pub mod execution; // Gas, building, signing, scheduling, supervision

// Common configuration, types and utilities
pub mod config;
pub mod errors;
pub mod types;
pub mod utils;

// Re-export key components from each layer
pub use chain::{BlockInfo, BlockTag, ChainClient, EthereumClient, MockChain};
pub use config::RescueConfig;
pub use errors::BundleError;
pub use execution::{
    BundleBuilder, BundlePipeline, Cycle, GasPricer, Identities, OuterSupervisor, RetryPolicy, SchedulerState,
    SimulationGate, SubmissionScheduler,
};
pub use relay::{FlashbotsRelay, MockRelay, Relay, SubmissionHandle};
pub use strategy::{RescueStrategy, StaticStrategy, Strategy, StrategyConfig, StrategyFile};
pub use types::{
    Bundle, BundleEntry, CycleOutcome, GasPlan, SignedBundle, SignerRole, SimulationResult, SubmissionResolution,
    UnsignedTransaction,
};
