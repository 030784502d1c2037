//! Errors reported by the bus registry and the binding protocol.

use crate::driver::DriverError;
use core::fmt::{self, Display};

/// Errors returned by bus, driver and device registration.
///
/// Structural errors ([BusError::DuplicateName], [BusError::NotFound],
/// [BusError::AllocationFailed], [BusError::Busy]) leave the registry exactly as it was.
/// [BusError::Deferred] is not a failure: the device stays registered and unbound, and the
/// attach may be retried later.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusError {
    /// A bus, driver or device with the same name is already registered.
    DuplicateName,
    /// No bus, driver or device with the given name or identity is registered.
    NotFound,
    /// The power domain asked for the attach to be retried later.
    Deferred,
    /// The driver's `probe` callback failed; the power domain has been rolled back.
    ProbeFailed(DriverError),
    /// The driver's `remove` callback failed; cleanup has completed anyway.
    RemoveFailed(DriverError),
    /// Registry bookkeeping could not be allocated; nothing was registered.
    AllocationFailed,
    /// The device is in the middle of an attach or detach, or the bus still has entries.
    Busy,
}

impl BusError {
    /// Whether repeating the same request later may succeed without any other change.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Deferred | Self::Busy)
    }
}

impl Display for BusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateName => f.write_str("name already registered"),
            Self::NotFound => f.write_str("not registered"),
            Self::Deferred => f.write_str("attach deferred"),
            Self::ProbeFailed(err) => write!(f, "probe failed: {}", err),
            Self::RemoveFailed(err) => write!(f, "remove failed: {}", err),
            Self::AllocationFailed => f.write_str("allocation failed"),
            Self::Busy => f.write_str("resource busy"),
        }
    }
}
