//! Typed handles over graph node ids. Cheap to copy, frame-scoped: a handle
//! is only meaningful against the graph that issued it.

use crate::graph::{NodeId, INVALID_ID};

macro_rules! define_handle {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(NodeId);

        impl $name {
            pub const INVALID: Self = Self(INVALID_ID);

            pub const fn new(id: NodeId) -> Self {
                Self(id)
            }

            pub const fn id(self) -> NodeId {
                self.0
            }

            pub const fn is_valid(self) -> bool {
                self.0 != INVALID_ID
            }
        }
    };
}

define_handle!(
    /// Handle to a texture resource node.
    TextureHandle
);
define_handle!(
    /// Handle to a buffer resource node.
    BufferHandle
);
define_handle!(RenderPassHandle);
define_handle!(ComputePassHandle);
define_handle!(RayTracingPassHandle);
define_handle!(PresentPassHandle);
define_handle!(CopyPassHandle);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_handle_is_the_sentinel() {
        assert_eq!(TextureHandle::INVALID.id(), u32::MAX);
        assert!(!TextureHandle::INVALID.is_valid());
        assert!(BufferHandle::new(0).is_valid());
    }
}
