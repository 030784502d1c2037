//! Driver capability interface.
//!
//! A driver is anything implementing [Driver]: a name plus the `probe`/`remove` pair the binding
//! coordinator calls around a device's bound lifetime. The bus only ever sees drivers as
//! `Handle<dyn Driver>`, so driver modules are free to keep per-device state behind their own
//! locks.
use crate::slave::Slave;
use core::fmt::{self, Debug, Display};

/// Trait implemented by drivers.
///
/// Guarantees and expectations:
/// - [Driver::get_name] is the driver's identity on a bus and must not change while registered.
/// - [Driver::probe] is called with no registry lock held and may block. It is called at most
///   once per attach attempt; a failed probe is never followed by [Driver::remove].
/// - [Driver::remove] is called exactly once for every successful probe, when the device or the
///   driver is unregistered. Its error is reported but never stops the unbinding.
pub trait Driver: Send + Sync + Debug {
    fn get_name(&self) -> &str;
    fn probe(&self, dev: &Slave) -> Result<(), DriverError>;
    fn remove(&self, dev: &Slave) -> Result<(), DriverError>;
}

/// Errors that may be returned by [Driver::probe] and [Driver::remove].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverError {
    /// The device does not exist or is not handled by this driver.
    NoDevice,
    /// Talking to the hardware failed.
    Io,
    /// The device description (node properties, power setup) is unusable.
    InvalidConfig,
    /// The driver holds the device and cannot let go yet.
    Busy,
    /// Custom driver-specific information.
    Customized { info: &'static str },
}

impl Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoDevice => f.write_str("no such device"),
            Self::Io => f.write_str("I/O error"),
            Self::InvalidConfig => f.write_str("invalid device configuration"),
            Self::Busy => f.write_str("device busy"),
            Self::Customized { info } => f.write_str(info),
        }
    }
}
