use crate::prop::Property;
use alloc::{boxed::Box, string::String, sync::Arc, vec, vec::Vec};
use bitflags::bitflags;
use core::{
    fmt,
    ops::Deref,
    sync::atomic::{AtomicU32, Ordering},
};

bitflags! {
    /// Runtime state of a node, updated through shared references.
    pub struct NodeFlags: u32 {
        /// A device has been created for this node; it must not be matched again.
        const POPULATED = 0b0001;
    }
}

pub struct DeviceTree {
    pub root_id: usize,
    pub container: Vec<Node>,
}

pub struct Node {
    pub node_id: usize,
    pub parent_id: usize,
    pub full_name: Box<str>,
    pub children: Vec<usize>,
    pub props: Vec<Property>,
    flags: AtomicU32,
}

impl Node {
    fn new(node_id: usize, parent_id: usize, full_name: &str, props: Vec<Property>) -> Node {
        Node {
            node_id,
            parent_id,
            full_name: Box::from(full_name),
            children: vec![],
            props,
            flags: AtomicU32::new(0),
        }
    }

    pub fn get_property(&self, name: impl AsRef<str>) -> Option<&Property> {
        let name = name.as_ref();
        self.props.iter().find(|prop| prop.name.as_ref() == name)
    }

    /// Whether the node describes usable hardware.
    ///
    /// A node without a `status` property is available; otherwise only `"okay"` and the legacy
    /// `"ok"` count. A malformed `status` makes the node unavailable.
    pub fn is_available(&self) -> bool {
        match self.get_property("status") {
            None => true,
            Some(prop) => matches!(prop.value_as_str(), Ok("okay") | Ok("ok")),
        }
    }

    pub fn flags(&self) -> NodeFlags {
        NodeFlags::from_bits_truncate(self.flags.load(Ordering::Acquire))
    }

    pub fn test_flag(&self, flag: NodeFlags) -> bool {
        self.flags().contains(flag)
    }

    /// Atomically set `flag` and report whether it was already set.
    ///
    /// Exactly one of any number of concurrent callers observes `false`.
    pub fn test_and_set_flag(&self, flag: NodeFlags) -> bool {
        let prev = self.flags.fetch_or(flag.bits(), Ordering::AcqRel);
        prev & flag.bits() == flag.bits()
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("node_id", &self.node_id)
            .field("full_name", &self.full_name)
            .field("flags", &self.flags())
            .finish()
    }
}

impl DeviceTree {
    /// Create a tree holding only the root node `/`. The root is its own parent.
    pub fn new() -> DeviceTree {
        DeviceTree {
            root_id: 0,
            container: vec![Node::new(0, 0, "", vec![])],
        }
    }

    /// Append a node below `parent_id` and return the new node's id.
    ///
    /// Return `None` if `parent_id` does not exist.
    pub fn add_node(
        &mut self,
        parent_id: usize,
        full_name: &str,
        props: Vec<Property>,
    ) -> Option<usize> {
        if parent_id >= self.container.len() {
            return None;
        }
        let id = self.container.len();
        self.container.push(Node::new(id, parent_id, full_name, props));
        self.container[parent_id].children.push(id);
        Some(id)
    }

    pub fn node(&self, node_id: usize) -> Option<&Node> {
        self.container.get(node_id)
    }
    pub fn is_root(&self, node: &Node) -> bool {
        self.get_parent(node).node_id == node.node_id
    }
    fn full_path(&self, node: &Node) -> String {
        if self.is_root(node) {
            String::from("")
        } else {
            self.full_path(self.get_parent(node)) + "/" + node.full_name.as_ref()
        }
    }
    pub fn get_full_path(&self, node: &Node) -> Box<str> {
        if self.is_root(node) {
            return Box::from("/");
        }
        self.full_path(node).into_boxed_str()
    }
    pub fn get_parent(&self, node: &Node) -> &Node {
        &self.container[node.parent_id]
    }
}

impl Default for DeviceTree {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared reference to one node of a tree; keeps the whole tree alive.
///
/// Node identity is the pair (tree, node id) and stays stable for the lifetime of the tree.
#[derive(Clone)]
pub struct NodeRef {
    tree: Arc<DeviceTree>,
    node_id: usize,
}

impl NodeRef {
    /// Return `None` if `node_id` is not part of `tree`.
    pub fn new(tree: Arc<DeviceTree>, node_id: usize) -> Option<NodeRef> {
        tree.node(node_id)?;
        Some(NodeRef { tree, node_id })
    }
    pub fn node_id(&self) -> usize {
        self.node_id
    }
    pub fn full_path(&self) -> Box<str> {
        self.tree.get_full_path(self)
    }
    pub fn children(&self) -> impl Iterator<Item = NodeRef> + '_ {
        self.children.iter().map(|id| NodeRef {
            tree: self.tree.clone(),
            node_id: *id,
        })
    }
    pub fn available_children(&self) -> impl Iterator<Item = NodeRef> + '_ {
        self.children().filter(|x| x.is_available())
    }
}

impl Deref for NodeRef {
    type Target = Node;

    fn deref(&self) -> &Node {
        &self.tree.container[self.node_id]
    }
}

impl PartialEq for NodeRef {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.tree, &other.tree) && self.node_id == other.node_id
    }
}
impl Eq for NodeRef {}

impl fmt::Debug for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeRef({})", self.full_path())
    }
}
