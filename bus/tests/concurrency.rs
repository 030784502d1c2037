mod common;

use common::{Gate, GatedDriver, Journal, RecordingDomain, domain, gated};
use spislave::{
    bus::Bus,
    config::BusConfig,
    devres::ScopedSlave,
    handle::Handle,
    slave::{BindState, Slave},
};
use std::{sync::atomic::Ordering, thread};

fn race_bus() -> Handle<Bus> {
    Handle::from(Bus::new(BusConfig::new("race")))
}

#[test]
fn driver_leaving_during_probe_unbinds_device() {
    let journal = Journal::default();
    let pd = RecordingDomain::new(&journal);
    let bus = race_bus();
    let slow = GatedDriver::new("slow", &journal, Gate::Probe, "spi0");
    bus.register_driver(gated(&slow)).unwrap();
    let dev = Handle::from(Slave::new("spi0").with_power_domain(domain(&pd)));

    thread::scope(|s| {
        let worker = s.spawn(|| bus.register_slave(dev.clone()));
        slow.gate.wait();
        assert_eq!(dev.state(), BindState::Attaching);
        assert_eq!(bus.unregister_driver("slow"), Ok(()));
        slow.gate.wait();
        assert_eq!(worker.join().unwrap(), Ok(()));
    });

    assert_eq!(dev.state(), BindState::Unbound);
    assert!(dev.driver_name().is_none());
    assert_eq!(
        journal.entries(),
        vec![
            "pm attach spi0 on=true",
            "slow probe spi0",
            "slow remove spi0",
            "pm detach spi0 off=true"
        ]
    );
    assert_eq!(pd.attached.load(Ordering::Acquire), 0);
    assert!(bus.driver_names().is_empty());
    assert_eq!(bus.slave_names(), vec!["spi0"]);
}

#[test]
fn device_leaving_during_probe_is_unbound() {
    let journal = Journal::default();
    let pd = RecordingDomain::new(&journal);
    let bus = race_bus();
    let slow = GatedDriver::new("slow", &journal, Gate::Probe, "spi0");
    bus.register_driver(gated(&slow)).unwrap();
    let dev = Handle::from(Slave::new("spi0").with_power_domain(domain(&pd)));

    thread::scope(|s| {
        let worker = s.spawn(|| bus.register_slave(dev.clone()));
        slow.gate.wait();
        assert_eq!(bus.unregister_slave("spi0"), Ok(()));
        assert!(bus.find_slave("spi0").is_none());
        slow.gate.wait();
        assert_eq!(worker.join().unwrap(), Ok(()));
    });

    assert_eq!(dev.state(), BindState::Unbound);
    assert_eq!(journal.count("slow remove spi0"), 1);
    assert_eq!(journal.count("pm detach spi0 off=true"), 1);
    assert_eq!(pd.attached.load(Ordering::Acquire), 0);
}

#[test]
fn scope_end_during_driver_unbind_still_unregisters() {
    let journal = Journal::default();
    let bus = race_bus();
    let slow = GatedDriver::new("slow", &journal, Gate::Remove, "dev2");
    bus.register_driver(gated(&slow)).unwrap();
    let guard = ScopedSlave::register(&bus, Handle::from(Slave::new("dev2"))).unwrap();
    let dev = guard.slave().clone();

    thread::scope(|s| {
        let worker = s.spawn(|| bus.unregister_driver("slow"));
        slow.gate.wait();
        assert_eq!(dev.state(), BindState::Detaching);
        drop(guard);
        assert!(bus.slave_names().is_empty());
        slow.gate.wait();
        assert_eq!(worker.join().unwrap(), Ok(()));
    });

    assert_eq!(dev.state(), BindState::Unbound);
    assert_eq!(journal.count("slow remove dev2"), 1);
}

#[test]
fn reprobe_counts_only_its_own_binds() {
    let journal = Journal::default();
    let bus = race_bus();
    let a = Handle::from(Slave::new("a"));
    let b = Handle::from(Slave::new("b"));
    bus.register_slave(a.clone()).unwrap();
    bus.register_slave(b.clone()).unwrap();
    let slow = GatedDriver::new("slow", &journal, Gate::Probe, "a");
    bus.register_driver(gated(&slow)).unwrap();

    thread::scope(|s| {
        let worker = s.spawn(|| bus.reprobe());
        slow.gate.wait();
        // bind `b` behind the back of the running reprobe
        bus.probe_slave("b").unwrap();
        slow.gate.wait();
        assert_eq!(worker.join().unwrap(), 1);
    });

    assert!(a.is_bound());
    assert!(b.is_bound());
    assert_eq!(journal.count("slow probe b"), 1);
    assert_eq!(bus.reprobe(), 0);
}
