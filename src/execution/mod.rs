/// Execution Layer
///
/// Turns strategy output into an included bundle:
/// - gas planning and bundle assembly
/// - signing with the sponsor and executor keys
/// - simulation gating and per-head resubmission
/// - whole-cycle restarts after recoverable failures

pub mod builder;
pub mod gas;
pub mod pipeline;
pub mod scheduler;
pub mod signer;
pub mod simulation;
pub mod supervisor;


pub use builder::BundleBuilder;
pub use gas::GasPricer;
pub use pipeline::{BundlePipeline, Cycle};
pub use scheduler::{SchedulerState, SubmissionScheduler};
pub use signer::{Identities, StartingNonces, sign_bundle, sign_with_nonces};
pub use simulation::SimulationGate;
pub use supervisor::{OuterSupervisor, RetryPolicy};
