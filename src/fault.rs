use std::time::Duration;

use parking_lot::RwLock;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::{FaultConfig, PerformanceMode};

/// Product endpoint families. Each one maps to a fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RouteFamily {
    Products,
    SlowProducts,
    CpuIntensive,
}

impl RouteFamily {
    pub const ALL: [RouteFamily; 3] = [Self::Products, Self::SlowProducts, Self::CpuIntensive];

    pub fn prefix(self) -> &'static str {
        match self {
            Self::Products => "/api/products",
            Self::SlowProducts => "/api/slowproducts",
            Self::CpuIntensive => "/api/cpuintensive",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Fault {
    None,
    #[serde(rename_all = "camelCase")]
    Slow { delay_ms: u64 },
    #[serde(rename_all = "camelCase")]
    CpuIntensive { iterations: u64 },
}

/// Scripted slowness for the product endpoints.
///
/// `/api/products` follows the switchable performance mode, the other two
/// families are always faulty.
pub struct FaultInjector {
    mode: RwLock<PerformanceMode>,
    slow_delay_ms: u64,
    cpu_iterations: u64,
}

impl FaultInjector {
    pub fn new(config: &FaultConfig) -> Self {
        Self {
            mode: RwLock::new(config.performance_mode),
            slow_delay_ms: config.slow_delay_ms,
            cpu_iterations: config.cpu_iterations,
        }
    }

    pub fn mode(&self) -> PerformanceMode {
        *self.mode.read()
    }

    /// Switch mode, returning the previous one.
    pub fn set_mode(&self, mode: PerformanceMode) -> PerformanceMode {
        let previous = std::mem::replace(&mut *self.mode.write(), mode);
        if previous != mode {
            info!(?previous, current = ?mode, "performance mode switched");
        }
        previous
    }

    pub fn slow_delay_ms(&self) -> u64 {
        self.slow_delay_ms
    }

    pub fn cpu_iterations(&self) -> u64 {
        self.cpu_iterations
    }

    pub fn fault_for(&self, family: RouteFamily) -> Fault {
        let slow = Fault::Slow { delay_ms: self.slow_delay_ms };
        match family {
            RouteFamily::Products => match self.mode() {
                PerformanceMode::Healthy => Fault::None,
                PerformanceMode::Degraded => slow,
            },
            RouteFamily::SlowProducts => slow,
            RouteFamily::CpuIntensive => Fault::CpuIntensive { iterations: self.cpu_iterations },
        }
    }

    /// Apply the fault for `family` and report which one ran.
    pub async fn inject(&self, family: RouteFamily) -> Fault {
        let fault = self.fault_for(family);
        match fault {
            Fault::None => {}
            Fault::Slow { delay_ms } => {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
            Fault::CpuIntensive { iterations } => {
                if let Err(e) = tokio::task::spawn_blocking(move || burn_cpu(iterations)).await {
                    warn!(error = %e, "cpu fault task failed");
                }
            }
        }
        fault
    }
}

/// Busy loop whose result the optimizer cannot discard.
fn burn_cpu(iterations: u64) -> u64 {
    let mut acc: u64 = 0x9e37_79b9_7f4a_7c15;
    for i in 0..iterations {
        acc = acc.rotate_left(5) ^ i.wrapping_mul(0x0100_0000_01b3);
    }
    std::hint::black_box(acc)
}
