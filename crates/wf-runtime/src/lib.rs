// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]
//! Scheduler, executor, and engine facade for the workflow engine (§4.G,
//! §4.H, §4.I), plus the cancellation and observability helpers a host
//! embedding the engine shares across runs.
//!
//! [`Engine`] is the crate's front door: build one over a populated
//! [`wf_adapter::AdapterRegistry`], then call [`Engine::execute`] or
//! [`Engine::replay`]. [`Scheduler`] and [`Executor`] are exposed for hosts
//! that want to drive a run's pieces directly (a custom CLI progress
//! reporter, for instance); most callers only need the facade.

pub mod cancel;
pub mod engine;
pub mod executor;
pub mod observe;
pub mod scheduler;

pub use cancel::{CancellableRun, CancellationReason, CancellationToken};
pub use engine::{replay, Engine, ReplayReport, StepVerification};
pub use executor::Executor;
pub use observe::{ObservabilitySummary, RuntimeObserver, Span, SpanStatus, TraceCollector};
pub use scheduler::{Scheduler, SchedulerOutcome};
