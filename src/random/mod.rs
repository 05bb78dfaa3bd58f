//! Explicitly owned random number streams.
//!
//! Every scenario owns one [`RandomStreams`] value. Within it, each named stream (declared with
//! [`define_rng!`]) gets its own generator seeded from the scenario's base seed and the stream
//! name, so drawing more arrivals never shifts the numbers seen by the random policy or the
//! bootstrap. Nothing here is process-wide, which keeps scenarios reproducible when they run on
//! different worker threads.

mod macros;
mod streams;

pub use macros::define_rng;
pub use streams::RandomStreams;

use crate::rand::{RngCore, SeedableRng};

pub trait RngId: Copy + Clone + 'static {
    type RngType: SeedableRng + RngCore + Send;
    fn get_name() -> &'static str;
}
