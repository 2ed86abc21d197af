//! Hardware-aware model recommendation core
//!
//! Given a detected hardware profile and a user preference profile, this
//! crate selects an optimal subset of generative models (image / video /
//! audio / 3D) from a declarative catalog and produces a ranked,
//! explainable installation plan.
//!
//! ## Main Components
//!
//! - `hardware`: platform probes and the normalized `HardwareProfile`
//! - `catalog`: the declarative model catalog and its indexed queries
//! - `profile`: the user preference profile
//! - `recommend`: the three-layer pipeline (constraint → content → TOPSIS),
//!   resolution cascade, space fitter and explainer
//! - `error`: error taxonomy and cooperative cancellation

pub mod catalog;
pub mod error;
pub mod hardware;
pub mod profile;
pub mod recommend;
pub mod utils;

#[cfg(test)]
pub(crate) mod testutil;

pub use catalog::Catalog;
pub use error::{CancelToken, CoreError};
pub use hardware::HardwareProfile;
pub use profile::UserProfile;
pub use recommend::{recommend, recommend_with_cancel, RecommendationResult};
