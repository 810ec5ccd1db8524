//! Dendroclimatology pipeline: ring-width alignment, quality screening,
//! spline detrending, climate indices, ecological metrics, biomass
//! reconstruction and the feature tables that feed growth models.

pub mod common;
pub mod domain;
pub mod io;
pub mod modules;
pub mod numerics;
pub mod pipeline;
