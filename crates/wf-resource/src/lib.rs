// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]
//! Resource policy enforcement for concurrently dispatched steps (§5, §7).
//!
//! A [`ResourcePool`] tracks how much of each pool-wide limit — RAM, GPU
//! slots, qubits, gas — is currently reserved by in-flight steps, using
//! atomic counters so concurrently dispatched steps can reserve and
//! release without a lock on the scheduler's hot path. `timeout_ms` is not
//! a pool resource: the executor reads it directly per step (§4.H).
//!
//! A dimension with no configured limit is treated as unconstrained —
//! requesting any amount of it always succeeds.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering::SeqCst};
use std::sync::Arc;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use wf_core::ResourceRequirements;
use wf_error::{ErrorInfo, ErrorKind};

/// Pool-wide caps. `None` in any field means that dimension is unconstrained.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ResourceLimits {
    /// Maximum RAM, in megabytes, reserved across all in-flight steps.
    pub max_ram_mb: Option<u64>,
    /// Maximum number of steps that may concurrently hold `gpu: true`.
    pub max_gpu_slots: Option<u64>,
    /// Maximum qubits reserved across all in-flight steps.
    pub max_qubits: Option<u64>,
    /// Maximum gas reserved across all in-flight steps.
    pub max_gas_limit: Option<u64>,
}

/// Why a reservation was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResourceError {
    /// A single dimension's request would exceed its configured limit.
    #[error("{dimension} request of {requested} exceeds remaining capacity {available} (limit {limit})")]
    LimitExceeded {
        /// Which dimension was over-requested.
        dimension: &'static str,
        /// Amount requested by this step.
        requested: u64,
        /// Amount still available in the pool.
        available: u64,
        /// The configured limit for this dimension.
        limit: u64,
    },
}

impl From<ResourceError> for ErrorInfo {
    fn from(err: ResourceError) -> Self {
        ErrorInfo::new(ErrorKind::ResourceUnavailable, err.to_string())
    }
}

#[derive(Debug, Default)]
struct Counters {
    ram_mb: AtomicU64,
    gpu_slots: AtomicU64,
    qubits: AtomicU64,
    gas_limit: AtomicU64,
}

/// A thread-safe, run-scoped pool of resource capacity.
///
/// Cheaply cloneable — clones share the same counters, so one pool can be
/// handed to every concurrently dispatched step.
#[derive(Debug, Clone)]
pub struct ResourcePool {
    limits: ResourceLimits,
    counters: Arc<Counters>,
}

impl ResourcePool {
    /// Create a pool enforcing the given limits.
    #[must_use]
    pub fn new(limits: ResourceLimits) -> Self {
        Self {
            limits,
            counters: Arc::new(Counters::default()),
        }
    }

    /// Create a pool with no limits at all — every reservation succeeds.
    #[must_use]
    pub fn unconstrained() -> Self {
        Self::new(ResourceLimits::default())
    }

    /// Attempt to reserve the resources named by `requirements`.
    ///
    /// On success returns a [`ResourceGuard`] that releases its share back
    /// to the pool when dropped. Reservation is all-or-nothing: if any
    /// requested dimension would exceed its limit, nothing is reserved.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::LimitExceeded`] for the first dimension
    /// (in declaration order: ram, gpu, qubits, gas) that doesn't fit.
    pub fn try_reserve(
        &self,
        requirements: Option<&ResourceRequirements>,
    ) -> Result<ResourceGuard, ResourceError> {
        let Some(req) = requirements else {
            return Ok(ResourceGuard::empty(self.clone()));
        };

        let ram = req.ram_mb.unwrap_or(0);
        let gpu = u64::from(req.gpu.unwrap_or(false));
        let qubits = req.qubits.unwrap_or(0);
        let gas = req.gas_limit.unwrap_or(0);

        reserve_dimension("ram_mb", ram, self.limits.max_ram_mb, &self.counters.ram_mb)?;
        if let Err(e) = reserve_dimension("gpu", gpu, self.limits.max_gpu_slots, &self.counters.gpu_slots) {
            self.counters.ram_mb.fetch_sub(ram, SeqCst);
            return Err(e);
        }
        if let Err(e) = reserve_dimension("qubits", qubits, self.limits.max_qubits, &self.counters.qubits) {
            self.counters.ram_mb.fetch_sub(ram, SeqCst);
            self.counters.gpu_slots.fetch_sub(gpu, SeqCst);
            return Err(e);
        }
        if let Err(e) = reserve_dimension(
            "gas_limit",
            gas,
            self.limits.max_gas_limit,
            &self.counters.gas_limit,
        ) {
            self.counters.ram_mb.fetch_sub(ram, SeqCst);
            self.counters.gpu_slots.fetch_sub(gpu, SeqCst);
            self.counters.qubits.fetch_sub(qubits, SeqCst);
            return Err(e);
        }

        Ok(ResourceGuard {
            pool: self.clone(),
            ram,
            gpu,
            qubits,
            gas,
        })
    }

    /// Currently reserved totals, for diagnostics.
    #[must_use]
    pub fn in_use(&self) -> ResourceUsage {
        ResourceUsage {
            ram_mb: self.counters.ram_mb.load(SeqCst),
            gpu_slots: self.counters.gpu_slots.load(SeqCst),
            qubits: self.counters.qubits.load(SeqCst),
            gas_limit: self.counters.gas_limit.load(SeqCst),
        }
    }
}

/// Point-in-time snapshot of reserved capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceUsage {
    /// RAM currently reserved, in megabytes.
    pub ram_mb: u64,
    /// GPU slots currently held.
    pub gpu_slots: u64,
    /// Qubits currently reserved.
    pub qubits: u64,
    /// Gas currently reserved.
    pub gas_limit: u64,
}

fn reserve_dimension(
    dimension: &'static str,
    requested: u64,
    limit: Option<u64>,
    counter: &AtomicU64,
) -> Result<(), ResourceError> {
    if requested == 0 {
        return Ok(());
    }
    let Some(limit) = limit else {
        counter.fetch_add(requested, SeqCst);
        return Ok(());
    };
    let mut current = counter.load(SeqCst);
    loop {
        let available = limit.saturating_sub(current);
        if requested > available {
            return Err(ResourceError::LimitExceeded {
                dimension,
                requested,
                available,
                limit,
            });
        }
        match counter.compare_exchange_weak(current, current + requested, SeqCst, SeqCst) {
            Ok(_) => return Ok(()),
            Err(observed) => current = observed,
        }
    }
}

/// RAII handle on a reservation. Releasing happens exactly once, on drop.
pub struct ResourceGuard {
    pool: ResourcePool,
    ram: u64,
    gpu: u64,
    qubits: u64,
    gas: u64,
}

impl ResourceGuard {
    fn empty(pool: ResourcePool) -> Self {
        Self {
            pool,
            ram: 0,
            gpu: 0,
            qubits: 0,
            gas: 0,
        }
    }
}

impl fmt::Debug for ResourceGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceGuard")
            .field("ram", &self.ram)
            .field("gpu", &self.gpu)
            .field("qubits", &self.qubits)
            .field("gas", &self.gas)
            .finish()
    }
}

impl Drop for ResourceGuard {
    fn drop(&mut self) {
        self.pool.counters.ram_mb.fetch_sub(self.ram, SeqCst);
        self.pool.counters.gpu_slots.fetch_sub(self.gpu, SeqCst);
        self.pool.counters.qubits.fetch_sub(self.qubits, SeqCst);
        self.pool.counters.gas_limit.fetch_sub(self.gas, SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unconstrained_pool_accepts_anything() {
        let pool = ResourcePool::unconstrained();
        let req = ResourceRequirements {
            ram_mb: Some(u64::MAX / 2),
            gpu: Some(true),
            qubits: Some(1000),
            gas_limit: Some(1000),
            timeout_ms: None,
        };
        pool.try_reserve(Some(&req)).unwrap();
    }

    #[test]
    fn no_requirements_is_always_ok() {
        let pool = ResourcePool::new(ResourceLimits {
            max_ram_mb: Some(1),
            ..Default::default()
        });
        pool.try_reserve(None).unwrap();
    }

    #[test]
    fn reservation_within_limit_succeeds_and_tracks_usage() {
        let pool = ResourcePool::new(ResourceLimits {
            max_ram_mb: Some(1024),
            ..Default::default()
        });
        let req = ResourceRequirements {
            ram_mb: Some(512),
            ..Default::default()
        };
        let guard = pool.try_reserve(Some(&req)).unwrap();
        assert_eq!(pool.in_use().ram_mb, 512);
        drop(guard);
        assert_eq!(pool.in_use().ram_mb, 0);
    }

    #[test]
    fn reservation_exceeding_limit_fails() {
        let pool = ResourcePool::new(ResourceLimits {
            max_ram_mb: Some(100),
            ..Default::default()
        });
        let req = ResourceRequirements {
            ram_mb: Some(200),
            ..Default::default()
        };
        let err = pool.try_reserve(Some(&req)).unwrap_err();
        assert!(matches!(
            err,
            ResourceError::LimitExceeded { dimension: "ram_mb", .. }
        ));
    }

    #[test]
    fn second_concurrent_reservation_can_exceed_remaining_capacity() {
        let pool = ResourcePool::new(ResourceLimits {
            max_gpu_slots: Some(1),
            ..Default::default()
        });
        let req = ResourceRequirements {
            gpu: Some(true),
            ..Default::default()
        };
        let _first = pool.try_reserve(Some(&req)).unwrap();
        let err = pool.try_reserve(Some(&req)).unwrap_err();
        assert!(matches!(
            err,
            ResourceError::LimitExceeded { dimension: "gpu", .. }
        ));
    }

    #[test]
    fn failed_reservation_rolls_back_partial_dimensions() {
        let pool = ResourcePool::new(ResourceLimits {
            max_ram_mb: Some(1000),
            max_gpu_slots: Some(0),
            ..Default::default()
        });
        let req = ResourceRequirements {
            ram_mb: Some(500),
            gpu: Some(true),
            ..Default::default()
        };
        let err = pool.try_reserve(Some(&req));
        assert!(err.is_err());
        // The ram_mb dimension fit but gpu did not; the whole reservation
        // must be all-or-nothing.
        assert_eq!(pool.in_use().ram_mb, 0);
    }

    #[test]
    fn resource_error_converts_to_resource_unavailable() {
        let err = ResourceError::LimitExceeded {
            dimension: "qubits",
            requested: 5,
            available: 2,
            limit: 2,
        };
        let info: ErrorInfo = err.into();
        assert_eq!(info.kind, ErrorKind::ResourceUnavailable);
    }

    #[test]
    fn release_after_drop_allows_next_reservation() {
        let pool = ResourcePool::new(ResourceLimits {
            max_qubits: Some(4),
            ..Default::default()
        });
        let req = ResourceRequirements {
            qubits: Some(4),
            ..Default::default()
        };
        {
            let _guard = pool.try_reserve(Some(&req)).unwrap();
            assert!(pool.try_reserve(Some(&req)).is_err());
        }
        pool.try_reserve(Some(&req)).unwrap();
    }
}
