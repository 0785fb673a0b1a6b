mod ports_tree;

pub use ports_tree::{PortsProvider, PortsTree};
