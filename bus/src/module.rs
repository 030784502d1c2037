//! Module lifecycle and the helpers acting on the system `spislave` bus.
//!
//! Every helper looks the bus up in [BUSES], so calling one before [init] or after [exit]
//! fails with [BusError::NotFound].
use crate::{
    bus::{Bus, BusSet},
    config::{BUS_NAME, BusConfig, DRIVER_NAME},
    devres::{DevresScope, devm_register_slave},
    driver::Driver,
    error::BusError,
    handle::Handle,
    slave::SlaveHandle,
};
use lazy_static::lazy_static;
use log::info;

/// Buses known to the system.
pub static BUSES: BusSet = BusSet::new();

lazy_static! {
    /// The bus published by [init].
    pub static ref SPISLAVE_BUS: Handle<Bus> = Handle::from(Bus::new(BusConfig::default()));
}

/// Publish the `spislave` bus.
pub fn init() -> Result<(), BusError> {
    info!("{}: init", DRIVER_NAME);
    BUSES.register_bus(SPISLAVE_BUS.clone())
}

/// Withdraw the `spislave` bus. Fails with [BusError::Busy] while anything is registered on it.
pub fn exit() -> Result<(), BusError> {
    BUSES.unregister_bus(BUS_NAME)?;
    info!("{}: exit", DRIVER_NAME);
    Ok(())
}

fn system_bus() -> Result<Handle<Bus>, BusError> {
    BUSES.get(BUS_NAME)
}

pub fn register_driver(driver: Handle<dyn Driver>) -> Result<(), BusError> {
    system_bus()?.register_driver(driver)
}

pub fn unregister_driver(name: &str) -> Result<(), BusError> {
    system_bus()?.unregister_driver(name)
}

pub fn register_slave(dev: SlaveHandle) -> Result<(), BusError> {
    system_bus()?.register_slave(dev)
}

pub fn unregister_slave(name: &str) -> Result<(), BusError> {
    system_bus()?.unregister_slave(name)
}

/// Register `dev` on the `spislave` bus, unregistering it when `scope` is torn down.
pub fn devm_register_device(scope: &DevresScope, dev: SlaveHandle) -> Result<(), BusError> {
    devm_register_slave(scope, &system_bus()?, dev)
}
