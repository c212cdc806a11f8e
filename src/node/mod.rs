//! Local Node Record and Store
//!
//! The [`LocalNode`] value describes this node's addresses, allocation
//! prefixes and encryption identity. A [`NodeStore`] holds the one current
//! value and applies copy-on-write updates to it.

mod address;
mod local;
mod store;

pub use address::{AddressKind, IpFamily, NodeAddress};
pub use local::LocalNode;
pub use store::{NodeStore, NodeWatch, StoreError};
