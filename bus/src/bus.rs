//! Bus registry: the drivers and devices registered on one named bus.
//!
//! Responsibilities:
//! - Keep registered drivers and devices in registration order, with names unique per bus.
//! - Run the match predicate for a newly registered device against every driver and hand the
//!   candidates to the binding coordinator.
//! - Unbind devices before they, or the driver they are bound to, leave the bus.
//!
//! Concurrency notes:
//! - All registry mutation happens under one [Mutex] per bus. The match predicate runs under
//!   it; node claiming is atomic on its own.
//! - The lock is always released before `probe`, `remove` or a power-domain callback runs, so a
//!   slow driver never blocks unrelated registrations.
//! - Because of that, a driver or device may leave the bus while a probe involving it is in
//!   flight. After every successful probe the binding is checked against the registry under the
//!   lock; a binding whose driver or device is gone is undone on the spot. Once that check has
//!   passed, the bound device is visible to any later unregistration.
use crate::{
    binding,
    config::BusConfig,
    debug_ex,
    driver::Driver,
    error::BusError,
    handle::Handle,
    matcher::of_match,
    slave::{BindState, Slave, SlaveHandle},
};
use alloc::{boxed::Box, collections::btree_map::BTreeMap, string::String, vec, vec::Vec};
use core::fmt::{self, Debug};
use log::{info, warn};
use spin::{Mutex, RwLock};

/// Match predicate deciding whether a device may be bound to a driver.
pub type MatchFn = dyn Fn(&Slave, &dyn Driver) -> bool + Send + Sync;

#[derive(Debug)]
struct BusInner {
    drivers: Vec<Handle<dyn Driver>>,
    slaves: Vec<SlaveHandle>,
}

impl BusInner {
    fn driver_index(&self, name: &str) -> Option<usize> {
        self.drivers.iter().position(|x| x.get_name() == name)
    }
    fn slave_index(&self, name: &str) -> Option<usize> {
        self.slaves.iter().position(|x| x.name() == name)
    }
}

pub struct Bus {
    config: BusConfig,
    match_fn: Box<MatchFn>,
    inner: Mutex<BusInner>,
}

impl Bus {
    /// Create a bus using the device-tree matcher with the policy from `config`.
    pub fn new(config: BusConfig) -> Bus {
        let policy = config.policy;
        Self::with_match(config, move |dev: &Slave, drv: &dyn Driver| {
            of_match(dev, drv, policy)
        })
    }

    /// Create a bus with a custom match predicate.
    pub fn with_match<F>(config: BusConfig, match_fn: F) -> Bus
    where
        F: Fn(&Slave, &dyn Driver) -> bool + Send + Sync + 'static,
    {
        Bus {
            config,
            match_fn: Box::new(match_fn),
            inner: Mutex::new(BusInner {
                drivers: vec![],
                slaves: vec![],
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        self.config.name
    }
    pub fn config(&self) -> &BusConfig {
        &self.config
    }

    /// Register a driver.
    ///
    /// The driver only sees devices registered afterwards, unless
    /// [BusConfig::autoprobe_on_driver] is set, in which case unbound devices are retried.
    pub fn register_driver(&self, driver: Handle<dyn Driver>) -> Result<(), BusError> {
        {
            let mut guard = self.inner.lock();
            if guard.driver_index(driver.get_name()).is_some() {
                return Err(BusError::DuplicateName);
            }
            guard
                .drivers
                .try_reserve(1)
                .map_err(|_| BusError::AllocationFailed)?;
            guard.drivers.push(driver.clone());
        }
        debug_ex!("{}: registered driver '{}'", self.name(), driver.get_name());
        if self.config.autoprobe_on_driver {
            self.reprobe();
        }
        Ok(())
    }

    /// Unregister a driver, unbinding every device bound to it first.
    ///
    /// The driver is gone from the bus even when a `remove` callback fails; the first such
    /// failure is returned.
    pub fn unregister_driver(&self, name: &str) -> Result<(), BusError> {
        let (driver, bound) = {
            let mut guard = self.inner.lock();
            let index = guard.driver_index(name).ok_or(BusError::NotFound)?;
            let driver = guard.drivers.remove(index);
            let bound: Vec<SlaveHandle> = guard
                .slaves
                .iter()
                .filter(|x| x.is_bound_to(&driver))
                .cloned()
                .collect();
            (driver, bound)
        };
        let mut res = Ok(());
        for dev in bound {
            match binding::detach(&dev) {
                // another unregistration is already unbinding it
                Ok(()) | Err(BusError::Busy) => {}
                Err(err) => res = res.and(Err(err)),
            }
        }
        debug_ex!("{}: unregistered driver '{}'", self.name(), driver.get_name());
        res
    }

    /// Register a device and try to bind it.
    ///
    /// Drivers whose match predicate holds are tried in registration order until one binds.
    /// The device stays registered whatever the binding outcome:
    /// - no candidate driver: `Ok(())`, device unbound;
    /// - [BusError::Deferred]: the power domain asked for a retry, see [Bus::probe_slave];
    /// - [BusError::ProbeFailed]: every candidate failed, the last error is returned.
    pub fn register_slave(&self, dev: SlaveHandle) -> Result<(), BusError> {
        let candidates = {
            let mut guard = self.inner.lock();
            if guard.slave_index(dev.name()).is_some() {
                return Err(BusError::DuplicateName);
            }
            guard
                .slaves
                .try_reserve(1)
                .map_err(|_| BusError::AllocationFailed)?;
            guard.slaves.push(dev.clone());
            self.candidates(&guard, &dev)
        };
        debug_ex!("{}: registered device '{}'", self.name(), dev.name());
        self.bind(&dev, candidates).map(|_| ())
    }

    /// Unregister the device called `name`, unbinding it first.
    pub fn unregister_slave(&self, name: &str) -> Result<(), BusError> {
        self.remove_slave(|x| x.name() == name)
    }

    /// Unregister exactly this device; a different device with the same name is left alone.
    pub fn unregister(&self, dev: &SlaveHandle) -> Result<(), BusError> {
        self.remove_slave(|x| SlaveHandle::ptr_eq(x, dev))
    }

    /// The registry entry always goes away. A device caught in the middle of a transition is
    /// unbound by whoever runs that transition: an attach notices the device left the bus and
    /// undoes itself, a running detach simply completes.
    fn remove_slave(&self, pred: impl Fn(&SlaveHandle) -> bool) -> Result<(), BusError> {
        let dev = {
            let mut guard = self.inner.lock();
            let index = guard
                .slaves
                .iter()
                .position(pred)
                .ok_or(BusError::NotFound)?;
            guard.slaves.remove(index)
        };
        let res = match binding::detach(&dev) {
            Err(BusError::Busy) => Ok(()),
            res => res,
        };
        debug_ex!("{}: unregistered device '{}'", self.name(), dev.name());
        res
    }

    /// Retry binding a registered, unbound device, e.g. after [BusError::Deferred].
    ///
    /// A device that is already bound is left as it is.
    pub fn probe_slave(&self, name: &str) -> Result<(), BusError> {
        let dev = self.find_slave(name).ok_or(BusError::NotFound)?;
        self.rebind(&dev).map(|_| ())
    }

    /// Retry binding every unbound device. Return how many this call bound.
    pub fn reprobe(&self) -> usize {
        let unbound: Vec<SlaveHandle> = self
            .inner
            .lock()
            .slaves
            .iter()
            .filter(|x| x.state() == BindState::Unbound)
            .cloned()
            .collect();
        let mut count = 0;
        for dev in unbound {
            match self.rebind(&dev) {
                Ok(true) => count += 1,
                Ok(false) => {}
                Err(err) => {
                    debug_ex!("{}: reprobe of '{}': {}", self.name(), dev.name(), err);
                }
            }
        }
        count
    }

    /// Bind `dev` if it is still registered and unbound. Return whether this call bound it.
    fn rebind(&self, dev: &SlaveHandle) -> Result<bool, BusError> {
        let candidates = {
            let guard = self.inner.lock();
            if !guard.slaves.iter().any(|x| SlaveHandle::ptr_eq(x, dev)) {
                return Err(BusError::NotFound);
            }
            match dev.state() {
                BindState::Bound => return Ok(false),
                BindState::Attaching | BindState::Detaching => return Err(BusError::Busy),
                BindState::Unbound => {}
            }
            self.candidates(&guard, dev)
        };
        self.bind(dev, candidates)
    }

    pub fn find_slave(&self, name: &str) -> Option<SlaveHandle> {
        let guard = self.inner.lock();
        guard.slave_index(name).map(|x| guard.slaves[x].clone())
    }
    pub fn find_driver(&self, name: &str) -> Option<Handle<dyn Driver>> {
        let guard = self.inner.lock();
        guard.driver_index(name).map(|x| guard.drivers[x].clone())
    }
    pub fn slave_names(&self) -> Vec<String> {
        self.inner.lock().slaves.iter().map(|x| x.name().into()).collect()
    }
    pub fn driver_names(&self) -> Vec<String> {
        self.inner
            .lock()
            .drivers
            .iter()
            .map(|x| x.get_name().into())
            .collect()
    }
    pub fn is_empty(&self) -> bool {
        let guard = self.inner.lock();
        guard.drivers.is_empty() && guard.slaves.is_empty()
    }

    fn candidates(&self, inner: &BusInner, dev: &Slave) -> Vec<Handle<dyn Driver>> {
        inner
            .drivers
            .iter()
            .filter(|drv| (self.match_fn)(dev, &***drv))
            .cloned()
            .collect()
    }

    /// Try `candidates` in order. Return whether `dev` ended up bound by this call.
    fn bind(
        &self,
        dev: &SlaveHandle,
        candidates: Vec<Handle<dyn Driver>>,
    ) -> Result<bool, BusError> {
        let mut res = Ok(false);
        for driver in candidates {
            match binding::attach(dev, &driver) {
                Ok(()) => {}
                Err(err @ BusError::ProbeFailed(_)) => {
                    res = Err(err);
                    continue;
                }
                Err(err) => return Err(err),
            }
            let (dev_listed, driver_listed) = {
                let guard = self.inner.lock();
                (
                    guard.slaves.iter().any(|x| SlaveHandle::ptr_eq(x, dev)),
                    guard.drivers.iter().any(|x| Handle::ptr_eq(x, &driver)),
                )
            };
            if dev_listed && driver_listed {
                return Ok(true);
            }
            debug_ex!(
                "{}: '{}' or '{}' left the bus during probe, unbinding",
                self.name(),
                dev.name(),
                driver.get_name()
            );
            match binding::detach(dev) {
                Ok(()) | Err(BusError::Busy) => {}
                Err(err) => warn!("{}: undoing bind of '{}': {}", self.name(), dev.name(), err),
            }
            if !dev_listed {
                return Ok(false);
            }
        }
        res
    }
}

impl Drop for Bus {
    fn drop(&mut self) {
        let slaves = core::mem::take(&mut self.inner.get_mut().slaves);
        if !slaves.is_empty() {
            warn!(
                "{}: torn down with {} device(s) still registered",
                self.name(),
                slaves.len()
            );
        }
        for dev in slaves.iter().rev() {
            // errors were already logged by the detach itself
            let _ = binding::detach(dev);
        }
    }
}

impl Debug for Bus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bus")
            .field("config", &self.config)
            .field("inner", &self.inner)
            .finish()
    }
}

/// The set of buses known to the system, keyed by bus name.
pub struct BusSet {
    buses: RwLock<BTreeMap<&'static str, Handle<Bus>>>,
}

impl BusSet {
    pub const fn new() -> BusSet {
        BusSet {
            buses: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn register_bus(&self, bus: Handle<Bus>) -> Result<(), BusError> {
        let mut guard = self.buses.write();
        if guard.contains_key(bus.name()) {
            return Err(BusError::DuplicateName);
        }
        info!("registered bus '{}'", bus.name());
        guard.insert(bus.name(), bus);
        Ok(())
    }

    /// Remove a bus from the set. A bus that still has drivers or devices is kept and
    /// [BusError::Busy] is returned.
    pub fn unregister_bus(&self, name: &str) -> Result<Handle<Bus>, BusError> {
        let mut guard = self.buses.write();
        let bus = guard.get(name).ok_or(BusError::NotFound)?;
        if !bus.is_empty() {
            return Err(BusError::Busy);
        }
        let bus = guard.remove(name).ok_or(BusError::NotFound)?;
        info!("unregistered bus '{}'", name);
        Ok(bus)
    }

    pub fn get(&self, name: &str) -> Result<Handle<Bus>, BusError> {
        self.buses.read().get(name).cloned().ok_or(BusError::NotFound)
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.buses.read().keys().copied().collect()
    }
}

impl Default for BusSet {
    fn default() -> Self {
        Self::new()
    }
}
