//! Collision-free identifier allocation.
//!
//! # Responsibility
//! - Draw uniformly random 64-bit identifiers for one entity category.
//! - Retry until the candidate is absent from that category's key set.
//!
//! # Invariants
//! - Allocated identifiers never collide with a key the caller reports as
//!   taken.
//! - Categories are independent namespaces; the allocator only sees the
//!   key set it is asked about.

use crate::model::EntityKind;
use log::error;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Retry cap hit without finding a free identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocationExhausted {
    pub category: EntityKind,
    pub attempts: u32,
}

impl Display for AllocationExhausted {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "no free {} identifier after {} attempts",
            self.category, self.attempts
        )
    }
}

impl Error for AllocationExhausted {}

/// Random identifier source shared by every store in one `Kasten`.
#[derive(Debug)]
pub struct IdAllocator {
    rng: StdRng,
    max_attempts: u32,
}

impl IdAllocator {
    /// Creates an allocator seeded from OS entropy.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            rng: StdRng::from_entropy(),
            max_attempts: max_attempts.max(1),
        }
    }

    /// Creates a deterministic allocator, for reproducible tests.
    pub fn seeded(seed: u64, max_attempts: u32) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            max_attempts: max_attempts.max(1),
        }
    }

    /// Allocates one identifier for `category`, skipping any value for which
    /// `is_taken` returns `true`.
    pub fn allocate(
        &mut self,
        category: EntityKind,
        is_taken: impl Fn(u64) -> bool,
    ) -> Result<u64, AllocationExhausted> {
        for _ in 0..self.max_attempts {
            let candidate: u64 = self.rng.gen();
            if !is_taken(candidate) {
                return Ok(candidate);
            }
        }

        error!(
            "event=id_allocate module=ids status=error category={} attempts={} error_code=allocation_exhausted",
            category, self.max_attempts
        );
        Err(AllocationExhausted {
            category,
            attempts: self.max_attempts,
        })
    }
}
