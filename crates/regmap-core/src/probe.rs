//! Reads every register of a map through a [`DevicePort`].

use tracing::{debug, info, warn};

use crate::device::DevicePort;
use crate::model::{format_address, NodeId, ReadState, RegisterMap};
use crate::{ProbeError, ProbeFailure};

/// Outcome of a probe run in which every read succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeSummary {
    /// Registers read, all of which now hold a value.
    pub attempted: usize,
}

/// Probes `map`, resetting previous results first.
///
/// Registers are read once each, depth-first in declared order, using their
/// configured bar, address and size. A failed read marks that register
/// [`ReadState::Failed`] and the walk carries on.
///
/// # Errors
///
/// Returns a [`ProbeError`] listing every failed read once all registers were
/// attempted. Successful reads are kept in `map` either way.
pub fn probe<D>(device: &mut D, map: &mut RegisterMap) -> Result<ProbeSummary, ProbeError>
where
    D: DevicePort + ?Sized,
{
    map.clear_values();

    let order = map.registers_in_order();
    let mut failures = Vec::new();
    for &id in &order {
        let register = map.register(id);
        let (bar, address, size) = (register.bar(), register.address(), register.size());

        match device.read_register(bar, address, size.bytes()) {
            Ok(value) => {
                debug!(
                    register = register.name(),
                    bar,
                    address = %format_address(address),
                    value = %format_address(value),
                    "register read"
                );
                map.set_state(id, ReadState::Resolved(value & size.mask()));
            }
            Err(error) => {
                let path = map.path(NodeId::Register(id));
                warn!(
                    register = %path,
                    bar,
                    address = %format_address(address),
                    %error,
                    "register read failed"
                );
                map.set_state(id, ReadState::Failed(error.to_string()));
                failures.push(ProbeFailure {
                    path,
                    bar,
                    address,
                    error,
                });
            }
        }
    }

    let attempted = order.len();
    info!(attempted, failed = failures.len(), "probe finished");

    if failures.is_empty() {
        Ok(ProbeSummary { attempted })
    } else {
        Err(ProbeError {
            attempted,
            failures,
        })
    }
}
