//! Time-driven scene animation.

pub mod flight;
