//! Device-tree matcher: the default match predicate of a bus.
//!
//! Matching a device walks the available children of its device-tree node and claims each one
//! by atomically setting [NodeFlags::POPULATED]. A child that is already populated is skipped,
//! so a node is claimed at most once no matter how often, or for which device, matching runs.
use crate::{config::DRIVER_NAME, debug_ex, driver::Driver, slave::Slave};
use dt::node::NodeFlags;

/// How the default matcher turns claimed children into a match decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchPolicy {
    /// Every device matches every driver; child claiming is a side effect only.
    #[default]
    Permissive,
    /// A device matches only once at least one child node has been claimed for it.
    RequireClaim,
}

/// Claim every available, not yet populated child of the device's node.
///
/// Return the number of children newly claimed by this call.
pub fn claim_children(dev: &Slave) -> usize {
    let Some(node) = dev.of_node() else {
        return 0;
    };
    let mut count = 0;
    for child in node.available_children() {
        if child.test_and_set_flag(NodeFlags::POPULATED) {
            continue;
        }
        debug_ex!("{}: child node is found: {}", DRIVER_NAME, child.full_path());
        dev.record_claim(child);
        count += 1;
    }
    count
}

/// Match predicate used by buses created without a custom one.
pub fn of_match(dev: &Slave, _drv: &dyn Driver, policy: MatchPolicy) -> bool {
    debug_ex!("{}: device match '{}'", DRIVER_NAME, dev.name());
    claim_children(dev);
    match policy {
        MatchPolicy::Permissive => true,
        MatchPolicy::RequireClaim => !dev.claimed_nodes().is_empty(),
    }
}
