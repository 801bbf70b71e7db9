//! CLI command implementations.

pub(crate) mod splice;

pub(crate) use splice::SpliceArgs;
