#![warn(
    clippy::all,
    clippy::imprecise_flops,
    clippy::suboptimal_flops,
    clippy::unseparated_literal_suffix,
    clippy::unreadable_literal,
    clippy::option_option,
    clippy::implicit_clone
)]
//! Statistical building blocks of the Mallows model: distances between
//! rankings, their partition functions, resampling schemes, and the
//! leap-and-shift proposal.
pub mod distance;
pub mod leap_shift;
pub mod mh;
pub mod partition;
pub mod resample;

pub use distance::Metric;
pub use leap_shift::{leap_and_shift, LeapShift};
pub use partition::{
    CardinalityTable, PartitionFunction, PartitionFunctionError,
};
pub use resample::{counts_to_indices, ResampleError, Resampler};

use serde::Serialize;
use std::fmt::{Debug, Display};

pub use mallows_consts::rv;

/// Returned when a string does not name a known strategy
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ParseError<T: Serialize + Debug + Clone + PartialEq + Eq>(pub T);

impl<T> Display for ParseError<T>
where
    T: Serialize + Debug + Clone + PartialEq + Eq,
{
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

impl<T> std::error::Error for ParseError<T> where
    T: Serialize + Debug + Clone + PartialEq + Eq
{
}
