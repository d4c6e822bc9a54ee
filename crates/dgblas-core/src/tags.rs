//! Capability tags
//!
//! Zero-sized markers that classify containers and operators. Every container
//! and operator type names exactly one tag through an associated type; the
//! operation traits in the dispatch crates are implemented per container type,
//! so a combination nobody implemented simply does not compile.
//!
//! The container tags form a small lattice:
//!
//! ```text
//! SerialTag < SharedMemoryTag        (HostResident)
//! DeviceTag, BlockTag                (LocalTag, not host resident)
//! LocalTag < DistributedTag
//! ```

use std::fmt::Debug;

/// Marker for the data layout / execution model of a container
pub trait ContainerTag: Copy + Default + Debug + Send + Sync + 'static {
    /// Human readable name used in diagnostics
    const NAME: &'static str;
}

/// Marker for the storage format of an operator
pub trait MatrixTag: Copy + Default + Debug + Send + Sync + 'static {
    /// Human readable name used in diagnostics
    const NAME: &'static str;
}

/// Tags whose data lives entirely in one execution unit
pub trait LocalTag: ContainerTag {}

/// Tags whose data lives in ordinary host memory
pub trait HostResident: LocalTag {}

macro_rules! container_tag {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
        pub struct $name;

        impl ContainerTag for $name {
            const NAME: &'static str = $label;
        }
    };
}

macro_rules! matrix_tag {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
        pub struct $name;

        impl MatrixTag for $name {
            const NAME: &'static str = $label;
        }
    };
}

container_tag!(
    /// Single-threaded host container
    SerialTag,
    "serial"
);
container_tag!(
    /// Host container processed by a pool of worker threads
    SharedMemoryTag,
    "shared-memory"
);
container_tag!(
    /// Container resident in accelerator memory
    DeviceTag,
    "device"
);
container_tag!(
    /// Recursive vector-of-vectors container
    BlockTag,
    "block"
);
container_tag!(
    /// Container partitioned across a process group
    DistributedTag,
    "distributed"
);

impl LocalTag for SerialTag {}
impl LocalTag for SharedMemoryTag {}
impl LocalTag for DeviceTag {}
impl LocalTag for BlockTag {}

impl HostResident for SerialTag {}
impl HostResident for SharedMemoryTag {}

matrix_tag!(
    /// Small dense operator
    DenseTag,
    "dense"
);
matrix_tag!(
    /// Row-indexed general sparse operator
    SparseTag,
    "sparse"
);
matrix_tag!(
    /// Constant-coefficient stencil operator
    StencilTag,
    "stencil"
);
matrix_tag!(
    /// Diagonal operator (weights, preconditioners)
    DiagonalTag,
    "diagonal"
);
matrix_tag!(
    /// Sparse operator whose rows are spread over a process group
    DistributedMatrixTag,
    "distributed"
);

/// Name of a container tag, usable in generic code
pub fn container_tag_name<T: ContainerTag>() -> &'static str {
    T::NAME
}

/// Name of a matrix tag, usable in generic code
pub fn matrix_tag_name<T: MatrixTag>() -> &'static str {
    T::NAME
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_local<T: LocalTag>() {}
    fn assert_host<T: HostResident>() {}

    #[test]
    fn test_tags_are_zero_sized() {
        assert_eq!(std::mem::size_of::<SerialTag>(), 0);
        assert_eq!(std::mem::size_of::<DistributedTag>(), 0);
        assert_eq!(std::mem::size_of::<SparseTag>(), 0);
    }

    #[test]
    fn test_tag_lattice() {
        assert_local::<SerialTag>();
        assert_local::<SharedMemoryTag>();
        assert_local::<DeviceTag>();
        assert_local::<BlockTag>();
        assert_host::<SerialTag>();
        assert_host::<SharedMemoryTag>();
    }

    #[test]
    fn test_tag_names() {
        assert_eq!(container_tag_name::<SerialTag>(), "serial");
        assert_eq!(container_tag_name::<DistributedTag>(), "distributed");
        assert_eq!(matrix_tag_name::<StencilTag>(), "stencil");
        assert_eq!(matrix_tag_name::<DiagonalTag>(), "diagonal");
    }
}
