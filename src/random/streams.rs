use std::any::{Any, TypeId};
use std::collections::HashMap;

use log::trace;

use crate::hashing::hash_str;
use crate::rand::distr::uniform::{SampleRange, SampleUniform};
use crate::rand::distr::Distribution;
use crate::rand::{Rng, SeedableRng};
use crate::random::RngId;

/// A set of independent random number generators keyed by [`RngId`]. Generators are created
/// lazily the first time a stream is used.
pub struct RandomStreams {
    base_seed: u64,
    rngs: HashMap<TypeId, Box<dyn Any + Send>>,
}

impl RandomStreams {
    #[must_use]
    pub fn new(base_seed: u64) -> Self {
        trace!("initializing random streams (seed={base_seed})");
        RandomStreams {
            base_seed,
            rngs: HashMap::new(),
        }
    }

    #[must_use]
    pub fn base_seed(&self) -> u64 {
        self.base_seed
    }

    /// Gets a mutable reference to the random number generator associated with the given
    /// [`RngId`], creating it from the base seed if it has not been used before.
    fn get_rng<R: RngId>(&mut self) -> &mut R::RngType {
        let base_seed = self.base_seed;
        self.rngs
            .entry(TypeId::of::<R>())
            .or_insert_with(|| {
                trace!(
                    "creating new RNG (seed={}) for stream {}",
                    base_seed,
                    R::get_name()
                );
                let seed_offset = hash_str(R::get_name());
                Box::new(R::RngType::seed_from_u64(base_seed.wrapping_add(seed_offset)))
            })
            .downcast_mut::<R::RngType>()
            .expect("RNG stored under the wrong type id")
    }

    /// Gets a random sample from the generator associated with the given [`RngId`] by applying
    /// the specified sampler function.
    pub fn sample<R: RngId, T>(
        &mut self,
        _rng_type: R,
        sampler: impl FnOnce(&mut R::RngType) -> T,
    ) -> T {
        sampler(self.get_rng::<R>())
    }

    /// Gets a random sample from the specified distribution.
    pub fn sample_distr<R: RngId, T>(
        &mut self,
        _rng_type: R,
        distribution: impl Distribution<T>,
    ) -> T {
        distribution.sample(self.get_rng::<R>())
    }

    /// Gets a random sample within the range provided by `range`.
    pub fn sample_range<R: RngId, S, T>(&mut self, rng_id: R, range: S) -> T
    where
        S: SampleRange<T>,
        T: SampleUniform,
    {
        self.sample(rng_id, |rng| rng.random_range(range))
    }

    /// Gets a random boolean value which is true with probability `p`.
    pub fn sample_bool<R: RngId>(&mut self, rng_id: R, p: f64) -> bool {
        self.sample(rng_id, |rng| rng.random_bool(p))
    }

    /// Gets a uniform draw from `[0, 1)`.
    pub fn sample_unit<R: RngId>(&mut self, rng_id: R) -> f64 {
        self.sample(rng_id, |rng| rng.random::<f64>())
    }
}
