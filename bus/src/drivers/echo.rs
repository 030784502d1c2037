//! Loopback driver: every byte written to a bound device can be read back from it.
use crate::{
    debug_ex,
    driver::{Driver, DriverError},
    handle::Handle,
    io::{RX_BUF_SIZE, SlaveIo},
    slave::Slave,
};
use alloc::{boxed::Box, collections::btree_map::BTreeMap, collections::vec_deque::VecDeque};
use core::sync::atomic::{AtomicBool, Ordering};
use spin::{Mutex, RwLock};

#[derive(Debug)]
struct Loopback {
    data: Mutex<VecDeque<u8>>,
    online: AtomicBool,
}

/// An open byte stream on one device bound to an [EchoDriver].
///
/// The stream stops working once the device is unbound.
#[derive(Debug, Clone)]
pub struct EchoPort {
    inner: Handle<Loopback>,
}

impl SlaveIo for EchoPort {
    fn read(&self, buf: &mut [u8]) -> Result<usize, DriverError> {
        if !self.inner.online.load(Ordering::Acquire) {
            return Err(DriverError::NoDevice);
        }
        let mut data = self.inner.data.lock();
        let count = buf.len().min(data.len());
        for (slot, byte) in buf.iter_mut().zip(data.drain(..count)) {
            *slot = byte;
        }
        Ok(count)
    }

    /// Accept as many bytes as fit in the device's [RX_BUF_SIZE] buffer.
    fn write(&self, buf: &[u8]) -> Result<usize, DriverError> {
        if !self.inner.online.load(Ordering::Acquire) {
            return Err(DriverError::NoDevice);
        }
        let mut data = self.inner.data.lock();
        let count = buf.len().min(RX_BUF_SIZE - data.len());
        data.extend(&buf[..count]);
        Ok(count)
    }
}

#[derive(Debug)]
pub struct EchoDriver {
    name: Box<str>,
    ports: RwLock<BTreeMap<Box<str>, Handle<Loopback>>>,
}

impl EchoDriver {
    pub fn new(name: &str) -> EchoDriver {
        EchoDriver {
            name: Box::from(name),
            ports: RwLock::new(BTreeMap::new()),
        }
    }

    /// Open the byte stream of the bound device called `dev_name`.
    pub fn open(&self, dev_name: &str) -> Result<EchoPort, DriverError> {
        let guard = self.ports.read();
        let inner = guard.get(dev_name).ok_or(DriverError::NoDevice)?;
        Ok(EchoPort {
            inner: inner.clone(),
        })
    }
}

impl Driver for EchoDriver {
    fn get_name(&self) -> &str {
        &self.name
    }

    fn probe(&self, dev: &Slave) -> Result<(), DriverError> {
        let mut guard = self.ports.write();
        if guard.contains_key(dev.name()) {
            return Err(DriverError::Busy);
        }
        guard.insert(
            Box::from(dev.name()),
            Handle::from(Loopback {
                data: Mutex::new(VecDeque::with_capacity(RX_BUF_SIZE)),
                online: AtomicBool::new(true),
            }),
        );
        debug_ex!("{}: loopback ready on '{}'", self.name, dev.name());
        Ok(())
    }

    fn remove(&self, dev: &Slave) -> Result<(), DriverError> {
        let port = self
            .ports
            .write()
            .remove(dev.name())
            .ok_or(DriverError::NoDevice)?;
        port.online.store(false, Ordering::Release);
        Ok(())
    }
}
