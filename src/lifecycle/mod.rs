//! Process lifecycle.
//!
//! ```text
//! SIGTERM/SIGINT (signals.rs)
//!     → ShutdownCoordinator::trigger (shutdown.rs)
//!         → listener drain, bounded by the grace window
//!         → tracked background tasks (tasks.rs), awaited without a bound
//!     → both finished → exit
//! ```

pub mod shutdown;
pub mod signals;
pub mod tasks;

pub use shutdown::{Phase, ShutdownCoordinator, ShutdownError};
pub use tasks::BackgroundTasks;
