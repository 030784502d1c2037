#![allow(dead_code)]

use spin::Mutex;
use spislave::{
    driver::{Driver, DriverError},
    handle::Handle,
    pm::{PmError, PowerDomain},
    slave::Slave,
};
use std::sync::{
    Arc, Barrier,
    atomic::{AtomicUsize, Ordering},
};

/// Ordered record of every callback the bus made.
#[derive(Debug, Default, Clone)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn push(&self, entry: String) {
        self.0.lock().push(entry);
    }
    pub fn entries(&self) -> Vec<String> {
        self.0.lock().clone()
    }
    pub fn count(&self, entry: &str) -> usize {
        self.0.lock().iter().filter(|x| x.as_str() == entry).count()
    }
    pub fn clear(&self) {
        self.0.lock().clear();
    }
}

#[derive(Debug)]
pub struct ScriptedDriver {
    name: &'static str,
    journal: Journal,
    pub probe_result: Mutex<Result<(), DriverError>>,
    pub remove_result: Mutex<Result<(), DriverError>>,
}

impl ScriptedDriver {
    pub fn new(name: &'static str, journal: &Journal) -> Arc<ScriptedDriver> {
        Arc::new(ScriptedDriver {
            name,
            journal: journal.clone(),
            probe_result: Mutex::new(Ok(())),
            remove_result: Mutex::new(Ok(())),
        })
    }
    pub fn failing_probe(name: &'static str, journal: &Journal, err: DriverError) -> Arc<ScriptedDriver> {
        let drv = Self::new(name, journal);
        *drv.probe_result.lock() = Err(err);
        drv
    }
}

impl Driver for ScriptedDriver {
    fn get_name(&self) -> &str {
        self.name
    }
    fn probe(&self, dev: &Slave) -> Result<(), DriverError> {
        self.journal.push(format!("{} probe {}", self.name, dev.name()));
        *self.probe_result.lock()
    }
    fn remove(&self, dev: &Slave) -> Result<(), DriverError> {
        self.journal.push(format!("{} remove {}", self.name, dev.name()));
        *self.remove_result.lock()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    Probe,
    Remove,
}

/// Driver that holds one callback for one device at [GatedDriver::gate].
///
/// The callback waits on the barrier twice: the first rendezvous tells the test it is running,
/// the second lets it finish.
#[derive(Debug)]
pub struct GatedDriver {
    name: &'static str,
    journal: Journal,
    gated: (Gate, &'static str),
    pub gate: Barrier,
}

impl GatedDriver {
    pub fn new(name: &'static str, journal: &Journal, at: Gate, dev: &'static str) -> Arc<GatedDriver> {
        Arc::new(GatedDriver {
            name,
            journal: journal.clone(),
            gated: (at, dev),
            gate: Barrier::new(2),
        })
    }

    fn pass(&self, at: Gate, dev: &Slave) {
        if self.gated.0 == at && self.gated.1 == dev.name() {
            self.gate.wait();
            self.gate.wait();
        }
    }
}

impl Driver for GatedDriver {
    fn get_name(&self) -> &str {
        self.name
    }
    fn probe(&self, dev: &Slave) -> Result<(), DriverError> {
        self.journal.push(format!("{} probe {}", self.name, dev.name()));
        self.pass(Gate::Probe, dev);
        Ok(())
    }
    fn remove(&self, dev: &Slave) -> Result<(), DriverError> {
        self.journal.push(format!("{} remove {}", self.name, dev.name()));
        self.pass(Gate::Remove, dev);
        Ok(())
    }
}

/// Power domain that records calls and answers attach from a script.
#[derive(Debug)]
pub struct RecordingDomain {
    journal: Journal,
    pub attach_result: Mutex<Result<(), PmError>>,
    pub attached: AtomicUsize,
}

impl RecordingDomain {
    pub fn new(journal: &Journal) -> Arc<RecordingDomain> {
        Arc::new(RecordingDomain {
            journal: journal.clone(),
            attach_result: Mutex::new(Ok(())),
            attached: AtomicUsize::new(0),
        })
    }
}

impl PowerDomain for RecordingDomain {
    fn attach(&self, dev: &Slave, power_on: bool) -> Result<(), PmError> {
        self.journal
            .push(format!("pm attach {} on={}", dev.name(), power_on));
        let res = *self.attach_result.lock();
        if res.is_ok() {
            self.attached.fetch_add(1, Ordering::AcqRel);
        }
        res
    }
    fn detach(&self, dev: &Slave, power_off: bool) -> Result<(), PmError> {
        self.journal
            .push(format!("pm detach {} off={}", dev.name(), power_off));
        self.attached.fetch_sub(1, Ordering::AcqRel);
        Ok(())
    }
}

pub fn driver(drv: Arc<ScriptedDriver>) -> Handle<dyn Driver> {
    Handle::from_arc(drv)
}

pub fn gated(drv: &Arc<GatedDriver>) -> Handle<dyn Driver> {
    Handle::from_arc(drv.clone())
}

pub fn domain(pd: &Arc<RecordingDomain>) -> Handle<dyn PowerDomain> {
    Handle::from_arc(pd.clone())
}
