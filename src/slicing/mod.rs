//! # Slicing Engine
//!
//! Cuts a triangulated surface with one or more parallel planes and returns
//! the cross-section as 2-point line segments with interpolated colors.
//!
//! A plane through a roughly uniform cloud of `N` points meets on the order
//! of `N^(2/3)` of them, which is why slices of bulky datasets are a small
//! fraction of the full surface. That is a performance expectation only;
//! nothing here relies on it.
//!
//! ## Usage
//!
//! ```rust
//! use geoslice::geometry::extract_surface;
//! use geoslice::mesh::primitives;
//! use geoslice::performance::Budget;
//! use geoslice::slicing::{slice_surface, SliceAxis, SliceSet};
//!
//! let cube = primitives::unit_cube_tetra().unwrap();
//! let surface = extract_surface(&cube, &mut Budget::unlimited()).unwrap();
//! let planes = SliceSet::from_axis(SliceAxis::X, 0.5, 0.0, 1).unwrap();
//! let (slice, _report) = slice_surface(&surface, &planes, 1e-9, &mut Budget::unlimited()).unwrap();
//! assert!(slice.segment_count() > 0);
//! ```

pub mod engine;
pub mod plane;

pub use engine::{plane_residual, slice_surface, SliceGeometry, SliceReport};
pub use plane::{SliceAxis, SlicePlane, SliceSet};
