//! Logical handle to one worker in the cluster.

use std::fmt;

/// A logical handle (address or identifier) to one worker in the cluster.
///
/// Partitions are immutable, comparable, and cheap enough to clone, so they
/// serve as map keys throughout the compiler. The core never connects to the
/// address itself; the transport collaborator does.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Partition {
    addr: String,
}

impl Partition {
    /// Create a partition handle from a worker address or identifier.
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into() }
    }

    /// The worker address or identifier this handle names.
    pub fn addr(&self) -> &str {
        &self.addr
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.addr)
    }
}
