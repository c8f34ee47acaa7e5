use std::{collections::VecDeque, fmt, str::FromStr};

use rand::{
    Rng,
    distr::{Distribution, StandardUniform},
    seq::SliceRandom,
};
use rand_pcg::Pcg32;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::PieceKind;

/// 128-bit seed of every random choice a game makes.
///
/// Serialized as a 32-character hex string. Two queues built from the same
/// seed produce the same pieces.
///
/// ```
/// use neotris_engine::{PieceQueue, PieceSeed};
///
/// let mut a = PieceQueue::with_seed(PieceSeed::from(7_u64));
/// let mut b = PieceQueue::with_seed(PieceSeed::from(7_u64));
/// for _ in 0..14 {
///     assert_eq!(a.pop_next(), b.pop_next());
/// }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PieceSeed([u8; 16]);

impl PieceSeed {
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Independent generator for one consumer of the seed.
    pub(crate) fn rng(self, stream: u64) -> Pcg32 {
        let [state, increment] = [&self.0[..8], &self.0[8..]].map(|half| {
            let mut bytes = [0; 8];
            bytes.copy_from_slice(half);
            u64::from_be_bytes(bytes)
        });
        Pcg32::new(state, increment ^ stream)
    }
}

impl From<u64> for PieceSeed {
    fn from(seed: u64) -> Self {
        Self(u128::from(seed).to_be_bytes())
    }
}

impl fmt::Display for PieceSeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", u128::from_be_bytes(self.0))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
#[display("invalid seed {input:?}: expected 32 hex characters")]
pub struct ParseSeedError {
    pub input: String,
}

impl FromStr for PieceSeed {
    type Err = ParseSeedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let error = || ParseSeedError {
            input: s.to_owned(),
        };
        if s.len() != 32 || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(error());
        }
        let num = u128::from_str_radix(s, 16).map_err(|_| error())?;
        Ok(Self(num.to_be_bytes()))
    }
}

impl Serialize for PieceSeed {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PieceSeed {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let hex = String::deserialize(deserializer)?;
        hex.parse().map_err(serde::de::Error::custom)
    }
}

impl Distribution<PieceSeed> for StandardUniform {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> PieceSeed {
        let mut seed = [0; 16];
        rng.fill(&mut seed);
        PieceSeed(seed)
    }
}

/// Upcoming pieces drawn from shuffled bags, plus the hold slot.
///
/// Every bag is one shuffled permutation of the seven kinds, appended whole,
/// so any seven pieces starting at a bag boundary contain each kind once.
/// At least [`Self::MIN_LOOKAHEAD`] pieces stay queued for the preview.
///
/// Hold is usable once per spawned piece: [`hold`](Self::hold) disables it
/// until [`enable_hold`](Self::enable_hold) is called on the next lock.
#[derive(Debug, Clone)]
pub struct PieceQueue {
    seed: PieceSeed,
    rng: Pcg32,
    queue: VecDeque<PieceKind>,
    bags: u64,
    held: Option<PieceKind>,
    hold_available: bool,
}

impl Default for PieceQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl PieceQueue {
    pub const MIN_LOOKAHEAD: usize = PieceKind::LEN;

    /// Creates a queue with a random seed.
    #[must_use]
    pub fn new() -> Self {
        Self::with_seed(rand::rng().random())
    }

    #[must_use]
    pub fn with_seed(seed: PieceSeed) -> Self {
        let mut queue = Self {
            seed,
            rng: seed.rng(0),
            queue: VecDeque::with_capacity(PieceKind::LEN * 2),
            bags: 0,
            held: None,
            hold_available: true,
        };
        queue.refill();
        queue
    }

    #[must_use]
    pub fn seed(&self) -> PieceSeed {
        self.seed
    }

    /// Number of bags shuffled so far.
    #[must_use]
    pub fn bags(&self) -> u64 {
        self.bags
    }

    fn refill(&mut self) {
        while self.queue.len() <= Self::MIN_LOOKAHEAD {
            let mut bag = PieceKind::ALL;
            bag.shuffle(&mut self.rng);
            self.queue.extend(bag);
            self.bags += 1;
        }
    }

    /// Takes the next piece, topping the queue up with fresh bags.
    pub fn pop_next(&mut self) -> PieceKind {
        loop {
            if let Some(kind) = self.queue.pop_front() {
                self.refill();
                return kind;
            }
            self.refill();
        }
    }

    /// The next `count` pieces, nearest first.
    #[must_use]
    pub fn preview(&self, count: usize) -> Vec<PieceKind> {
        self.queue.iter().copied().take(count).collect()
    }

    pub fn next_pieces(&self) -> impl Iterator<Item = PieceKind> + '_ {
        self.queue.iter().copied()
    }

    #[must_use]
    pub fn held_piece(&self) -> Option<PieceKind> {
        self.held
    }

    #[must_use]
    pub fn hold_available(&self) -> bool {
        self.hold_available
    }

    /// Piece [`hold`](Self::hold) would hand out right now.
    #[must_use]
    pub fn peek_hold_result(&self) -> Option<PieceKind> {
        self.held.or_else(|| self.queue.front().copied())
    }

    /// Stores `current` and returns the piece to play instead: the held
    /// piece, or the next one from the queue when the slot was empty.
    ///
    /// Returns `None` when hold was already used for this piece.
    pub fn hold(&mut self, current: PieceKind) -> Option<PieceKind> {
        if !self.hold_available {
            log::warn!("hold already used for this piece");
            return None;
        }
        self.hold_available = false;
        let next = match self.held.replace(current) {
            Some(held) => held,
            None => self.pop_next(),
        };
        Some(next)
    }

    pub fn enable_hold(&mut self) {
        self.hold_available = true;
    }

    /// Restarts from `seed` with an empty hold slot.
    pub fn reset(&mut self, seed: PieceSeed) {
        *self = Self::with_seed(seed);
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_every_bag_is_a_permutation() {
        let mut queue = PieceQueue::with_seed(PieceSeed::from(42_u64));
        for _ in 0..20 {
            let bag: HashSet<PieceKind> = (0..7).map(|_| queue.pop_next()).collect();
            assert_eq!(bag.len(), 7);
        }
    }

    #[test]
    fn test_lookahead_is_kept() {
        let mut queue = PieceQueue::with_seed(PieceSeed::from(1_u64));
        for _ in 0..30 {
            queue.pop_next();
            assert!(queue.next_pieces().count() > PieceQueue::MIN_LOOKAHEAD);
            assert_eq!(queue.preview(5).len(), 5);
        }
    }

    #[test]
    fn test_same_seed_same_sequence() {
        let mut a = PieceQueue::with_seed(PieceSeed::from(0x1234_u64));
        let mut b = PieceQueue::with_seed(PieceSeed::from(0x1234_u64));
        let mut c = PieceQueue::with_seed(PieceSeed::from(0x1235_u64));
        let seq_a: Vec<_> = (0..21).map(|_| a.pop_next()).collect();
        let seq_b: Vec<_> = (0..21).map(|_| b.pop_next()).collect();
        let seq_c: Vec<_> = (0..21).map(|_| c.pop_next()).collect();
        assert_eq!(seq_a, seq_b);
        assert_ne!(seq_a, seq_c);
    }

    #[test]
    fn test_hold_once_per_piece() {
        let mut queue = PieceQueue::with_seed(PieceSeed::from(3_u64));
        let next = queue.preview(1)[0];
        assert_eq!(queue.peek_hold_result(), Some(next));

        assert_eq!(queue.hold(PieceKind::T), Some(next));
        assert_eq!(queue.held_piece(), Some(PieceKind::T));
        assert_eq!(queue.hold(next), None);
        assert_eq!(queue.held_piece(), Some(PieceKind::T));

        queue.enable_hold();
        assert_eq!(queue.hold(PieceKind::S), Some(PieceKind::T));
        assert_eq!(queue.held_piece(), Some(PieceKind::S));
    }

    #[test]
    fn test_reset_restores_sequence() {
        let seed = PieceSeed::from(9_u64);
        let mut queue = PieceQueue::with_seed(seed);
        let first: Vec<_> = (0..10).map(|_| queue.pop_next()).collect();
        queue.hold(PieceKind::I);
        queue.reset(seed);
        assert_eq!(queue.held_piece(), None);
        assert!(queue.hold_available());
        let again: Vec<_> = (0..10).map(|_| queue.pop_next()).collect();
        assert_eq!(first, again);
    }

    mod seed_serialization {
        use super::*;

        #[test]
        fn test_known_value() {
            let seed = PieceSeed::from_bytes([
                0x01, 0x23, 0x45, 0x67, 0x89, 0xAB, 0xCD, 0xEF, 0xFE, 0xDC, 0xBA, 0x98, 0x76, 0x54,
                0x32, 0x10,
            ]);
            let json = serde_json::to_string(&seed).unwrap();
            assert_eq!(json, "\"0123456789abcdeffedcba9876543210\"");
            let back: PieceSeed = serde_json::from_str(&json).unwrap();
            assert_eq!(back, seed);
        }

        #[test]
        fn test_from_u64_is_low_bytes() {
            assert_eq!(
                PieceSeed::from(0xff_u64).to_string(),
                "000000000000000000000000000000ff"
            );
        }

        #[test]
        fn test_uppercase_accepted() {
            let seed: PieceSeed = serde_json::from_str("\"0123456789ABCDEFFEDCBA9876543210\"").unwrap();
            assert_eq!(seed.to_string(), "0123456789abcdeffedcba9876543210");
        }

        #[test]
        fn test_rejects_bad_input() {
            for json in [
                "\"\"",
                "\"0123456789abcdef0123456789abcde\"",
                "\"0123456789abcdef0123456789abcdef0\"",
                "\"ghijklmnopqrstuvwxyzghijklmnopqr\"",
                "\"+123456789abcdef0123456789abcdef\"",
            ] {
                let err = serde_json::from_str::<PieceSeed>(json).unwrap_err();
                assert!(err.to_string().contains("invalid seed"), "{json}");
            }
        }

        #[test]
        fn test_random_seed_round_trip() {
            let seed: PieceSeed = rand::rng().random();
            let json = serde_json::to_string(&seed).unwrap();
            let back: PieceSeed = serde_json::from_str(&json).unwrap();
            let mut a = PieceQueue::with_seed(seed);
            let mut b = PieceQueue::with_seed(back);
            for _ in 0..14 {
                assert_eq!(a.pop_next(), b.pop_next());
            }
        }
    }
}
