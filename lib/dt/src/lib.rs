//! In-memory device tree used to describe the hardware children a bus device exposes.
//!
//! Nodes are stored flat inside a [node::DeviceTree] and refer to each other by index.
//! Every node carries a runtime flag word ([node::NodeFlags]) that can be updated atomically
//! through a shared reference, which is what bus matchers use to claim child nodes.
#![cfg_attr(not(test), no_std)]
extern crate alloc;

pub mod node;
pub mod prop;
