//! SPI slave bus core.
//!
//! A small driver model: drivers ([driver::Driver]) and devices ([slave::Slave]) register on a
//! named [bus::Bus]; registering a device matches it against the registered drivers and binds it
//! to the first one that probes successfully. Binding and unbinding are wrapped in power-domain
//! attach and detach ([pm::PowerDomain]), and [devres] ties a device registration to the
//! lifetime of an owning scope.
//!
//! Buses are plain values, so independent registries can coexist. [init] additionally publishes
//! the `spislave` bus in the process-wide [BUSES] set, which the module-level helpers below
//! operate on.
#![cfg_attr(not(test), no_std)]
extern crate alloc;

pub mod logging;

mod binding;
pub mod bus;
pub mod config;
pub mod devres;
pub mod driver;
pub mod drivers;
pub mod error;
pub mod handle;
pub mod io;
pub mod matcher;
pub mod pm;
pub mod slave;

mod module;
pub use module::*;
