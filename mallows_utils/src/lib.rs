#![warn(
    clippy::all,
    clippy::imprecise_flops,
    clippy::suboptimal_flops,
    clippy::unseparated_literal_suffix,
    clippy::unreadable_literal,
    clippy::option_option,
    clippy::implicit_clone
)]
//! Miscellaneous utilities shared by the mallows_smc crates
mod misc;
mod perm;
mod random;

pub use misc::*;
pub use perm::{identity, inverse, is_permutation};
pub use random::{ln_pflip, pflip};
