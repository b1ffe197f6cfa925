//! Rigorous coupled-wave analysis of one-dimensional lamellar gratings.
//!
//! A [`Stack`] of [`Layer`]s, each a [`Slab`] cross-section extruded to a
//! thickness, is lit by the plane wave described in an
//! [`IlluminationContext`]. [`Stack::calc`] returns a [`SolvedStack`] whose
//! [`DiffractionEfficiencyTable`] lists the power carried by every retained
//! reflected and transmitted order.

pub mod config;
pub mod domain;
pub mod efficiency;
pub mod factorization;
pub mod illumination;
pub mod material;
pub mod modes;
pub mod numerics;
pub mod propagator;
pub mod slab;
pub mod smatrix;
pub mod stack;

pub use config::{load_solver_config, SolverConfig, SolverConfigError};
pub use domain::{
    DiffractionRegime, GeometryResult, RcwaError, RcwaErrorCategory, RcwaResult, Side,
    SolveResult,
};
pub use efficiency::{DiffractionEfficiencyTable, FieldAmplitudes, OrderEfficiency};
pub use illumination::{IlluminationContext, IlluminationContextBuilder};
pub use material::{LayerFragment, Material, Permittivity};
pub use modes::{LayerModes, ModeKind, ModeSummary};
pub use numerics::{EigenDecomposition, EigenError, EigenOptions, EigenSolver, QrEigenSolver};
pub use propagator::{Propagator, PropagatorState};
pub use slab::{FourierSeries, Slab, SlabBuilder, SlabHarmonics, TensorComponent};
pub use smatrix::ScatteringMatrix;
pub use stack::{Layer, Solver, SolvedStack, Stack, StackBuilder};
