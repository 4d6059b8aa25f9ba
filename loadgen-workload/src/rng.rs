//! Deterministic, seedable random streams for virtual users.
//!
//! Every virtual user owns one [`Sfc32`] generator. Its four seed words are derived from the
//! global run seed and the user's numeric identity, see [`UserSeed`]. Two runs with the same
//! global seed therefore produce identical per-user sequences, regardless of how the tokio
//! scheduler interleaves the users.
//!
//! ```
//! use loadgen_workload::rng::Sfc32;
//!
//! let mut first = Sfc32::for_user(42, 7);
//! let mut second = Sfc32::for_user(42, 7);
//! assert_eq!(first.next_f64(), second.next_f64());
//! ```

use rand::rand_core::impls;
use rand::{RngCore, SeedableRng};

/// Odd multiplier used to spread user identities over the 32-bit seed space.
///
/// Because it is odd, `user_id * SEED_MULTIPLIER` is a bijection modulo `2^32`.
const SEED_MULTIPLIER: u32 = 2_654_435_761;

/// Outputs discarded after seeding so that similar seed words diverge.
const WARMUP_ROUNDS: usize = 12;

/// Scale mapping a `u32` onto `[0, 1)`.
const U32_SCALE: f64 = 4_294_967_296.0;

/// The SFC32 "small fast counting" generator.
///
/// State is four 32-bit words, one of which is a counter that guarantees a minimum period of
/// `2^32`. The generator is a pure function of its state and has no global side effects.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Sfc32 {
    a: u32,
    b: u32,
    c: u32,
    d: u32,
}

impl Sfc32 {
    /// Creates a generator from four raw seed words.
    pub fn new(a: u32, b: u32, c: u32, d: u32) -> Self {
        let mut rng = Self { a, b, c, d };
        for _ in 0..WARMUP_ROUNDS {
            rng.step();
        }
        rng
    }

    /// Creates the generator owned by virtual user `user_id` under the global `seed`.
    pub fn for_user(seed: u64, user_id: u32) -> Self {
        let [a, b, c, d] = UserSeed::derive(seed, user_id);
        Self::new(a, b, c, d)
    }

    /// Creates the generator used for run-wide initialization, such as subset sampling.
    ///
    /// This is the stream of identity `0`. Virtual users are numbered from `1`.
    pub fn for_run(seed: u64) -> Self {
        Self::for_user(seed, 0)
    }

    /// Returns the next raw 32-bit output.
    pub fn next_u32(&mut self) -> u32 {
        self.step()
    }

    /// Returns the next value in `[0, 1)`.
    pub fn next_f64(&mut self) -> f64 {
        f64::from(self.step()) / U32_SCALE
    }

    fn step(&mut self) -> u32 {
        let t = self.a.wrapping_add(self.b).wrapping_add(self.d);
        self.d = self.d.wrapping_add(1);
        self.a = self.b ^ (self.b >> 9);
        self.b = self.c.wrapping_add(self.c << 3);
        self.c = self.c.rotate_left(21).wrapping_add(t);
        t
    }
}

impl RngCore for Sfc32 {
    fn next_u32(&mut self) -> u32 {
        self.step()
    }

    fn next_u64(&mut self) -> u64 {
        impls::next_u64_via_u32(self)
    }

    fn fill_bytes(&mut self, dst: &mut [u8]) {
        impls::fill_bytes_via_next(self, dst)
    }
}

impl SeedableRng for Sfc32 {
    type Seed = [u8; 16];

    fn from_seed(seed: Self::Seed) -> Self {
        let [a, b, c, d] = words(seed);
        Self::new(a, b, c, d)
    }
}

/// Maps the next `u32` of any generator onto `[0, 1)`.
///
/// For [`Sfc32`] this is identical to [`Sfc32::next_f64`].
pub fn unit_f64<R: RngCore + ?Sized>(rng: &mut R) -> f64 {
    f64::from(rng.next_u32()) / U32_SCALE
}

/// Derivation of per-user seed words from a single global seed.
#[derive(Debug)]
pub struct UserSeed;

impl UserSeed {
    /// Derives the four seed words of virtual user `user_id`.
    ///
    /// Four offsets are expanded from `seed`, then each word is
    /// `user_id * SEED_MULTIPLIER + offset (mod 2^32)`. Distinct identities never share a word.
    pub fn derive(seed: u64, user_id: u32) -> [u32; 4] {
        let SeedOffsets(offsets) = SeedOffsets::seed_from_u64(seed);
        offsets.map(|offset| user_id.wrapping_mul(SEED_MULTIPLIER).wrapping_add(offset))
    }
}

/// Carrier for the portable PCG32 seed expansion of [`SeedableRng::seed_from_u64`].
struct SeedOffsets([u32; 4]);

impl SeedableRng for SeedOffsets {
    type Seed = [u8; 16];

    fn from_seed(seed: Self::Seed) -> Self {
        Self(words(seed))
    }
}

fn words(seed: [u8; 16]) -> [u32; 4] {
    let mut words = [0u32; 4];
    for (word, chunk) in words.iter_mut().zip(seed.chunks_exact(4)) {
        *word = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
    }
    words
}
