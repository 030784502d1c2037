//! Devices ("slaves") living on a bus and their binding state.
use crate::{driver::Driver, error::BusError, handle::Handle, pm::PowerDomain};
use alloc::{boxed::Box, string::String, vec, vec::Vec};
use dt::node::NodeRef;
use spin::Mutex;

/// Binding state of a device.
///
/// State machine: `Unbound → Attaching → Bound → Detaching → Unbound`
/// (also `Attaching → Unbound` when the power domain defers or probe fails).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindState {
    Unbound,
    Attaching,
    Bound,
    Detaching,
}

#[derive(Debug)]
struct Binding {
    state: BindState,
    /// Set only while [BindState::Bound] or [BindState::Detaching].
    driver: Option<Handle<dyn Driver>>,
}

#[derive(Debug)]
pub struct Slave {
    name: Box<str>,
    of_node: Option<NodeRef>,
    pm_domain: Option<Handle<dyn PowerDomain>>,
    binding: Mutex<Binding>,
    claimed: Mutex<Vec<NodeRef>>,
}

pub type SlaveHandle = Handle<Slave>;

impl Slave {
    pub fn new(name: &str) -> Slave {
        Slave {
            name: Box::from(name),
            of_node: None,
            pm_domain: None,
            binding: Mutex::new(Binding {
                state: BindState::Unbound,
                driver: None,
            }),
            claimed: Mutex::new(vec![]),
        }
    }

    /// Describe the device with a device-tree node whose children the matcher may claim.
    pub fn with_of_node(mut self, node: NodeRef) -> Slave {
        self.of_node = Some(node);
        self
    }

    pub fn with_power_domain(mut self, domain: Handle<dyn PowerDomain>) -> Slave {
        self.pm_domain = Some(domain);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn of_node(&self) -> Option<&NodeRef> {
        self.of_node.as_ref()
    }
    pub fn power_domain(&self) -> Option<&Handle<dyn PowerDomain>> {
        self.pm_domain.as_ref()
    }
    pub fn state(&self) -> BindState {
        self.binding.lock().state
    }
    pub fn is_bound(&self) -> bool {
        self.state() == BindState::Bound
    }
    /// The driver the device is bound to, if any.
    pub fn driver(&self) -> Option<Handle<dyn Driver>> {
        self.binding.lock().driver.clone()
    }
    pub fn driver_name(&self) -> Option<String> {
        self.binding.lock().driver.as_ref().map(|x| x.get_name().into())
    }
    pub fn is_bound_to(&self, driver: &Handle<dyn Driver>) -> bool {
        let guard = self.binding.lock();
        guard.state == BindState::Bound
            && guard
                .driver
                .as_ref()
                .is_some_and(|x| Handle::ptr_eq(x, driver))
    }
    /// Child nodes the matcher claimed on behalf of this device, in claim order.
    pub fn claimed_nodes(&self) -> Vec<NodeRef> {
        self.claimed.lock().clone()
    }

    pub(crate) fn record_claim(&self, node: NodeRef) {
        self.claimed.lock().push(node);
    }

    /// `Unbound → Attaching`.
    pub(crate) fn begin_attach(&self) -> Result<(), BusError> {
        let mut guard = self.binding.lock();
        if guard.state != BindState::Unbound {
            return Err(BusError::Busy);
        }
        guard.state = BindState::Attaching;
        Ok(())
    }

    /// `Attaching → Bound` with `driver`, or `Attaching → Unbound` when `driver` is `None`.
    pub(crate) fn finish_attach(&self, driver: Option<Handle<dyn Driver>>) {
        let mut guard = self.binding.lock();
        debug_assert_eq!(guard.state, BindState::Attaching);
        guard.state = if driver.is_some() {
            BindState::Bound
        } else {
            BindState::Unbound
        };
        guard.driver = driver;
    }

    /// `Bound → Detaching`, yielding the driver to call `remove` on.
    ///
    /// Return `Ok(None)` for an unbound device and [BusError::Busy] while another transition
    /// is in flight.
    pub(crate) fn begin_detach(&self) -> Result<Option<Handle<dyn Driver>>, BusError> {
        let mut guard = self.binding.lock();
        match guard.state {
            BindState::Unbound => Ok(None),
            BindState::Attaching | BindState::Detaching => Err(BusError::Busy),
            BindState::Bound => {
                guard.state = BindState::Detaching;
                Ok(guard.driver.clone())
            }
        }
    }

    /// `Detaching → Unbound`, dropping the binding.
    pub(crate) fn finish_detach(&self) {
        let mut guard = self.binding.lock();
        debug_assert_eq!(guard.state, BindState::Detaching);
        guard.state = BindState::Unbound;
        guard.driver = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::DriverError;
    use alloc::sync::Arc;

    #[derive(Debug)]
    struct Nop;
    impl Driver for Nop {
        fn get_name(&self) -> &str {
            "nop"
        }
        fn probe(&self, _dev: &Slave) -> Result<(), DriverError> {
            Ok(())
        }
        fn remove(&self, _dev: &Slave) -> Result<(), DriverError> {
            Ok(())
        }
    }

    #[test]
    fn walks_the_state_machine() {
        let slave = Slave::new("spi0");
        let drv: Handle<dyn Driver> = Handle::from_arc(Arc::new(Nop));
        assert_eq!(slave.state(), BindState::Unbound);
        assert!(matches!(slave.begin_detach(), Ok(None)));

        slave.begin_attach().unwrap();
        assert_eq!(slave.state(), BindState::Attaching);
        assert_eq!(slave.begin_attach(), Err(BusError::Busy));
        assert_eq!(slave.begin_detach().unwrap_err(), BusError::Busy);
        slave.finish_attach(Some(drv.clone()));
        assert!(slave.is_bound_to(&drv));
        assert_eq!(slave.begin_attach(), Err(BusError::Busy));

        let bound = slave.begin_detach().unwrap().unwrap();
        assert!(Handle::ptr_eq(&bound, &drv));
        assert_eq!(slave.state(), BindState::Detaching);
        assert!(!slave.is_bound_to(&drv));
        slave.finish_detach();
        assert_eq!(slave.state(), BindState::Unbound);
        assert!(slave.driver().is_none());
    }

    #[test]
    fn failed_attach_returns_to_unbound() {
        let slave = Slave::new("dev1");
        slave.begin_attach().unwrap();
        slave.finish_attach(None);
        assert_eq!(slave.state(), BindState::Unbound);
        assert!(slave.driver().is_none());
    }
}
