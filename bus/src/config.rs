//! Compile-time constants and per-bus runtime configuration.

use crate::matcher::MatchPolicy;

/// Name used as the prefix of module-level log lines.
pub const DRIVER_NAME: &str = "spislavecore";

/// Name of the bus created by [crate::init].
pub const BUS_NAME: &str = "spislave";

/// Power the domain on when attaching a device before probe.
pub const PM_POWER_ON: bool = true;

/// Power the domain off when detaching a device after remove or a failed probe.
pub const PM_POWER_OFF: bool = true;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusConfig {
    /// Bus identity; unique within a [crate::bus::BusSet].
    pub name: &'static str,
    /// How the default device-tree matcher decides a match.
    pub policy: MatchPolicy,
    /// Try to bind unbound devices whenever a driver registers.
    ///
    /// Off by default: a new driver only sees devices registered after it.
    pub autoprobe_on_driver: bool,
}

impl BusConfig {
    pub const fn new(name: &'static str) -> BusConfig {
        BusConfig {
            name,
            policy: MatchPolicy::Permissive,
            autoprobe_on_driver: false,
        }
    }
}

impl Default for BusConfig {
    fn default() -> Self {
        Self::new(BUS_NAME)
    }
}
