//! Binding coordinator: the attach and detach sequences run between a device and a driver.
//!
//! Attach: power-domain attach → `probe` → (on failure) power-domain detach.
//! Detach: `remove` → power-domain detach, unconditionally.
//!
//! Both sequences run without any registry lock held; the device's own binding lock is taken
//! only to move between states, never across a callback.
use crate::{
    config::{DRIVER_NAME, PM_POWER_OFF, PM_POWER_ON},
    debug_ex,
    driver::Driver,
    error::BusError,
    handle::Handle,
    pm::PmError,
    slave::Slave,
};
use log::warn;

/// Bind `dev` to `driver`.
///
/// On [BusError::Deferred] or [BusError::ProbeFailed] the device is left unbound. A power
/// domain that fails with anything but [PmError::Deferred] does not stop the probe.
pub(crate) fn attach(dev: &Slave, driver: &Handle<dyn Driver>) -> Result<(), BusError> {
    dev.begin_attach()?;
    if let Some(domain) = dev.power_domain() {
        match domain.attach(dev, PM_POWER_ON) {
            Ok(()) => {}
            Err(PmError::Deferred) => {
                debug_ex!("{}: power domain of '{}' deferred the probe", DRIVER_NAME, dev.name());
                dev.finish_attach(None);
                return Err(BusError::Deferred);
            }
            Err(err) => warn!(
                "{}: power domain attach of '{}' {}, probing anyway",
                DRIVER_NAME,
                dev.name(),
                err
            ),
        }
    }
    if let Err(err) = driver.probe(dev) {
        debug_ex!(
            "{}: driver '{}' failed to probe '{}': {}",
            DRIVER_NAME,
            driver.get_name(),
            dev.name(),
            err
        );
        pm_detach(dev);
        dev.finish_attach(None);
        return Err(BusError::ProbeFailed(err));
    }
    dev.finish_attach(Some(driver.clone()));
    debug_ex!("{}: '{}' bound to '{}'", DRIVER_NAME, dev.name(), driver.get_name());
    Ok(())
}

/// Unbind `dev` from its driver. A device that is not bound is left alone.
///
/// The power domain is detached and the device ends up unbound even when `remove` fails; the
/// `remove` error is then returned as [BusError::RemoveFailed].
pub(crate) fn detach(dev: &Slave) -> Result<(), BusError> {
    let Some(driver) = dev.begin_detach()? else {
        return Ok(());
    };
    let res = driver.remove(dev).map_err(BusError::RemoveFailed);
    if let Err(err) = &res {
        warn!(
            "{}: driver '{}' on '{}': {}",
            DRIVER_NAME,
            driver.get_name(),
            dev.name(),
            err
        );
    }
    pm_detach(dev);
    dev.finish_detach();
    debug_ex!("{}: '{}' unbound from '{}'", DRIVER_NAME, dev.name(), driver.get_name());
    res
}

/// Best-effort power-domain detach; failures are logged only.
fn pm_detach(dev: &Slave) {
    if let Some(domain) = dev.power_domain() {
        if let Err(err) = domain.detach(dev, PM_POWER_OFF) {
            warn!(
                "{}: power domain detach of '{}' {}",
                DRIVER_NAME,
                dev.name(),
                err
            );
        }
    }
}
