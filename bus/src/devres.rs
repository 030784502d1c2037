//! Scoped device registration.
//!
//! - [ScopedSlave] owns one device registration and unregisters it exactly once: on
//!   [ScopedSlave::release], or when dropped (scope end, early return or unwinding).
//! - [DevresScope] is an owning context collecting such resources; tearing the scope down
//!   releases them in reverse order of acquisition.
use crate::{
    bus::Bus,
    config::DRIVER_NAME,
    debug_ex,
    error::BusError,
    handle::Handle,
    slave::SlaveHandle,
};
use alloc::{boxed::Box, vec, vec::Vec};
use core::sync::atomic::{AtomicBool, Ordering};
use log::warn;
use spin::Mutex;

/// A resource whose release is tied to a [DevresScope]. Release happens on drop.
pub trait Devres: Send {
    /// Short description used in log lines.
    fn describe(&self) -> &str;
}

#[derive(Debug)]
pub struct ScopedSlave {
    bus: Handle<Bus>,
    dev: SlaveHandle,
    released: AtomicBool,
}

impl ScopedSlave {
    /// Register `dev` on `bus` and wrap the registration.
    ///
    /// Registration is transactional: if it does not fully succeed, including a deferred or
    /// failed probe, the device is taken off the bus again and no handle is created.
    pub fn register(bus: &Handle<Bus>, dev: SlaveHandle) -> Result<ScopedSlave, BusError> {
        match bus.register_slave(dev.clone()) {
            Ok(()) => Ok(ScopedSlave {
                bus: bus.clone(),
                dev,
                released: AtomicBool::new(false),
            }),
            Err(err @ (BusError::Deferred | BusError::ProbeFailed(_))) => {
                // the device is registered but unbound: drop it without running a detach
                if let Err(rollback) = bus.unregister(&dev) {
                    warn!(
                        "{}: rollback of '{}' failed: {}",
                        DRIVER_NAME,
                        dev.name(),
                        rollback
                    );
                }
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    pub fn slave(&self) -> &SlaveHandle {
        &self.dev
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    /// Unregister the device now. Later calls, and the drop, do nothing.
    ///
    /// The registry entry is gone once this returns, even if the device is still being unbound
    /// by a concurrent unregistration. A device already unregistered through the bus counts as
    /// released.
    pub fn release(&self) -> Result<(), BusError> {
        if self.released.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        match self.bus.unregister(&self.dev) {
            Err(BusError::NotFound) => Ok(()),
            res => res,
        }
    }
}

impl Drop for ScopedSlave {
    fn drop(&mut self) {
        if let Err(err) = self.release() {
            warn!(
                "{}: releasing '{}' failed: {}",
                DRIVER_NAME,
                self.dev.name(),
                err
            );
        }
    }
}

impl Devres for ScopedSlave {
    fn describe(&self) -> &str {
        self.dev.name()
    }
}

struct Resources {
    items: Vec<Box<dyn Devres>>,
    /// Slots promised to outstanding [DevresSlot]s. `items` always has spare capacity for them.
    reserved: usize,
}

/// Owning context for [Devres] resources.
pub struct DevresScope {
    name: Box<str>,
    resources: Mutex<Resources>,
}

impl DevresScope {
    pub fn new(name: &str) -> DevresScope {
        DevresScope {
            name: Box::from(name),
            resources: Mutex::new(Resources {
                items: vec![],
                reserved: 0,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.resources.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Set aside room for one resource. Filling the returned slot cannot fail, whatever else is
    /// added to the scope in the meantime; dropping it gives the room back.
    pub fn reserve(&self) -> Result<DevresSlot<'_>, BusError> {
        let mut guard = self.resources.lock();
        let wanted = guard.reserved + 1;
        guard
            .items
            .try_reserve(wanted)
            .map_err(|_| BusError::AllocationFailed)?;
        guard.reserved = wanted;
        Ok(DevresSlot { scope: self })
    }

    /// Add a resource without a prior reservation.
    pub fn add(&self, res: Box<dyn Devres>) -> Result<(), BusError> {
        self.reserve()?.fill(res);
        Ok(())
    }

    /// Release every resource, most recently added first.
    pub fn release_all(&self) {
        loop {
            // pop under the lock, drop outside it: releasing may call back into the scope
            let Some(res) = self.resources.lock().items.pop() else {
                break;
            };
            debug_ex!("{}: devres '{}' released from '{}'", DRIVER_NAME, res.describe(), self.name);
            drop(res);
        }
    }
}

impl Drop for DevresScope {
    fn drop(&mut self) {
        self.release_all();
    }
}

/// Room for exactly one resource in a [DevresScope], obtained from [DevresScope::reserve].
pub struct DevresSlot<'a> {
    scope: &'a DevresScope,
}

impl DevresSlot<'_> {
    pub fn fill(self, res: Box<dyn Devres>) {
        let scope = self.scope;
        core::mem::forget(self);
        debug_ex!("{}: devres '{}' added to '{}'", DRIVER_NAME, res.describe(), scope.name);
        let mut guard = scope.resources.lock();
        guard.reserved -= 1;
        // capacity was set aside by `reserve`
        guard.items.push(res);
    }
}

impl Drop for DevresSlot<'_> {
    fn drop(&mut self) {
        self.scope.resources.lock().reserved -= 1;
    }
}

/// Register `dev` on `bus` with its lifetime tied to `scope`.
///
/// The scope slot is reserved before the device is registered, so either both the registration
/// and the scope entry exist afterwards, or neither does.
pub fn devm_register_slave(
    scope: &DevresScope,
    bus: &Handle<Bus>,
    dev: SlaveHandle,
) -> Result<(), BusError> {
    let slot = match scope.reserve() {
        Ok(slot) => slot,
        Err(err) => {
            warn!("{}: devres alloc error", DRIVER_NAME);
            return Err(err);
        }
    };
    debug_ex!("{}: devres alloc ok", DRIVER_NAME);
    let guard = ScopedSlave::register(bus, dev)?;
    slot.fill(Box::new(guard));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Tag(&'static str);
    impl Devres for Tag {
        fn describe(&self) -> &str {
            self.0
        }
    }

    fn spare(scope: &DevresScope) -> (usize, usize) {
        let guard = scope.resources.lock();
        (guard.items.capacity() - guard.items.len(), guard.reserved)
    }

    #[test]
    fn reserved_room_survives_unreserved_adds() {
        let scope = DevresScope::new("owner");
        let slot = scope.reserve().unwrap();
        for name in ["a", "b", "c", "d", "e"] {
            scope.add(Box::new(Tag(name))).unwrap();
            let (room, reserved) = spare(&scope);
            assert_eq!(reserved, 1);
            assert!(room >= reserved);
        }
        let before = scope.resources.lock().items.as_ptr();
        slot.fill(Box::new(Tag("reserved")));
        // filling a slot never moves the buffer
        assert_eq!(scope.resources.lock().items.as_ptr(), before);
        assert_eq!(scope.len(), 6);
        assert_eq!(spare(&scope).1, 0);
    }

    #[test]
    fn dropped_slot_gives_room_back() {
        let scope = DevresScope::new("owner");
        let first = scope.reserve().unwrap();
        let second = scope.reserve().unwrap();
        assert_eq!(spare(&scope).1, 2);
        drop(first);
        assert_eq!(spare(&scope).1, 1);
        second.fill(Box::new(Tag("x")));
        assert_eq!(spare(&scope).1, 0);
        assert_eq!(scope.len(), 1);
    }
}
