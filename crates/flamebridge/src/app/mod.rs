//! Application layer: the bridge loop and its lifecycle

pub mod bridge;
pub mod run;

#[cfg(test)]
mod test_support;

pub use bridge::{Bridge, TickOutcome};
pub use run::run;
