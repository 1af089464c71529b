//! Type tags and the per-stream serialization capability.
//!
//! Operator payloads move through the compiler type-erased: a [`Batch`] is a
//! boxed `Vec<T>` for some element type `T` known only where the operator
//! closure was built. This module provides:
//!
//! - [`TypeTag`]: a lightweight runtime type identifier used for assertions
//!   and error messages across node boundaries.
//! - [`StreamSchema`]: the opaque encode/decode capability attached to every
//!   stream whose records may cross a process boundary. The compiler never
//!   inspects the encoded bytes; it only hands the capability to the
//!   transport collaborator.
//!
//! Wire encoding goes through `postcard`, bound to the concrete `T` at the
//! point the schema is created.

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::any::{Any, TypeId, type_name};
use std::sync::Arc;

/// A type-erased batch of records carried on one channel.
pub type Batch = Box<dyn Any + Send + Sync>;

/// A lightweight runtime type tag for debugging and assertions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TypeTag {
    /// Stable Rust type identifier.
    pub id: TypeId,
    /// Human-readable type name (best-effort).
    pub name: &'static str,
}

impl TypeTag {
    /// Construct a tag for `T`.
    pub fn of<T: 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }
}

/// The serialization capability for one record type.
///
/// Created where the element type is statically known and carried on source
/// and shuffle nodes, whose output channels are the ones that cross
/// partitions in a deployed cluster. All operations return `None` when the
/// dynamic payload is not a `Vec<T>` of the schema's element type.
#[derive(Clone)]
pub struct StreamSchema {
    tag: TypeTag,
    clone_batch: Arc<dyn Fn(&dyn Any) -> Option<Batch> + Send + Sync>,
    encode: Arc<dyn Fn(&dyn Any) -> Option<Vec<u8>> + Send + Sync>,
    decode: Arc<dyn Fn(&[u8]) -> Option<Batch> + Send + Sync>,
}

impl StreamSchema {
    /// Build the schema capability for element type `T`.
    pub fn of<T>() -> Self
    where
        T: 'static + Send + Sync + Clone + Serialize + DeserializeOwned,
    {
        Self {
            tag: TypeTag::of::<T>(),
            clone_batch: Arc::new(|data| {
                data.downcast_ref::<Vec<T>>()
                    .map(|v| Box::new(v.clone()) as Batch)
            }),
            encode: Arc::new(|data| {
                let v = data.downcast_ref::<Vec<T>>()?;
                postcard::to_allocvec(v).ok()
            }),
            decode: Arc::new(|bytes| {
                postcard::from_bytes::<Vec<T>>(bytes)
                    .ok()
                    .map(|v| Box::new(v) as Batch)
            }),
        }
    }

    /// The element type this schema was built for.
    pub fn type_tag(&self) -> TypeTag {
        self.tag
    }

    /// Clone a borrowed payload into an owned [`Batch`].
    pub fn clone_batch(&self, data: &dyn Any) -> Option<Batch> {
        (self.clone_batch)(data)
    }

    /// Encode a payload to wire bytes.
    pub fn encode(&self, data: &dyn Any) -> Option<Vec<u8>> {
        (self.encode)(data)
    }

    /// Decode wire bytes back into a [`Batch`].
    pub fn decode(&self, bytes: &[u8]) -> Option<Batch> {
        (self.decode)(bytes)
    }
}

impl std::fmt::Debug for StreamSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamSchema")
            .field("type", &self.tag.name)
            .finish()
    }
}
