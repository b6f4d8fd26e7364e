//! Trust synthesis and explanation.
//!
//! Fuses the reliability signals of an uncertainty report into a bounded
//! 0-100 trust score with a three-valued decision label, and renders the
//! decision as a natural-language explanation in a configurable tone.

pub mod engine;
pub mod explain;

pub use engine::{TrustEngine, TrustWeights};
pub use explain::{Explainer, Tone};
