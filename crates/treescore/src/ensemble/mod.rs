//! Ensemble vote combination.
//!
//! A [`MultiVote`] holds one [`Vote`] per ensemble member, in member order,
//! and combines them with a [`CombineMethod`].

mod boosting;
mod multivote;

pub use boosting::{BoostingWeight, InitialOffset};
pub use multivote::{CombineError, CombineMethod, MultiVote, Vote};
