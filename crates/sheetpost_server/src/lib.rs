//! Daily publish scheduling.
//!
//! [`Scheduler`] runs one bootstrap execution of a [`PublishTask`] at start,
//! then polls the [`Clock`] and launches the task once per day at a target
//! time of day. At most one execution is in flight at any moment; triggers
//! that arrive while one is running are dropped.
//!
//! Shutdown is cooperative and bounded. The polling wait wakes immediately,
//! the in-flight execution gets a caller-supplied grace period, registered
//! cleanup callbacks run in registration order and finally the task releases
//! its own resources. Repeated shutdown calls are no-ops.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod clock;
mod config;
mod scheduler;
mod signal;
mod task;

pub use clock::{Clock, SimulatedClock, SystemClock};
pub use config::{ScheduleConfig, TargetTime};
pub use scheduler::{Scheduler, SchedulerState, SchedulerStatus};
pub use signal::wait_for_termination;
pub use task::{PublishReport, PublishTask};
