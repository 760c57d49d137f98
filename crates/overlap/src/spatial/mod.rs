//! Spatial indexing.

pub mod index;

pub use index::{point_envelope, BufferNode, SegmentNode};
