//! Power-domain collaborator.
//!
//! The binding coordinator attaches a device's power domain before `probe` and detaches it after
//! `remove` (or after a failed `probe`). Devices without a domain skip both steps.
use crate::slave::Slave;
use core::fmt::{self, Debug, Display};

/// A power-management domain a device can be attached to.
pub trait PowerDomain: Send + Sync + Debug {
    /// Attach `dev` to the domain, powering the domain on first when `power_on` is set.
    ///
    /// Return [PmError::Deferred] when the domain is not ready yet and the whole attach should be
    /// retried later.
    fn attach(&self, dev: &Slave, power_on: bool) -> Result<(), PmError>;

    /// Detach `dev` from the domain, powering the domain off when `power_off` is set and no other
    /// device holds it.
    fn detach(&self, dev: &Slave, power_off: bool) -> Result<(), PmError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PmError {
    /// The domain is not available yet; retry the attach later.
    Deferred,
    /// The domain operation failed.
    Failed { info: &'static str },
}

impl Display for PmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Deferred => f.write_str("deferred"),
            Self::Failed { info } => write!(f, "failed: {}", info),
        }
    }
}
