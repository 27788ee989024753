use fastbrief_core::{
    Descriptor, GrayMatrix, Point, DESCRIPTOR_WORD_BITS, PATCH_RADIUS, VALID_PATTERN_BITS,
};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BriefError {
    InvalidPatternBits(usize),
    CornerOutOfMargin { point: Point, width: usize, height: usize },
}

impl std::fmt::Display for BriefError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BriefError::InvalidPatternBits(bits) => {
                write!(f, "Invalid pattern length: {} (must be 128, 256 or 512)", bits)
            }
            BriefError::CornerOutOfMargin { point, width, height } => {
                write!(
                    f,
                    "Corner ({}, {}) within {} px of the border of a {}x{} matrix",
                    point.x, point.y, PATCH_RADIUS, width, height
                )
            }
        }
    }
}

impl std::error::Error for BriefError {}

pub type BriefResult<T> = Result<T, BriefError>;

/// One pattern entry: compare intensity at `corner + a` against `corner + b`.
pub type OffsetPair = ((i32, i32), (i32, i32));

/// Immutable set of random point-pair offsets shared by every descriptor of a
/// matching session.
///
/// Descriptors are only comparable when computed under the same pattern, so a
/// pattern is generated once per session and passed explicitly to every
/// `describe` call. It holds no generator state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamplingPattern {
    pairs: Vec<OffsetPair>,
}

impl SamplingPattern {
    /// Draws `bits` offset pairs, each coordinate uniform over [-15, 15].
    pub fn generate<R: Rng>(bits: usize, rng: &mut R) -> BriefResult<Self> {
        if !VALID_PATTERN_BITS.contains(&bits) {
            return Err(BriefError::InvalidPatternBits(bits));
        }
        let r = PATCH_RADIUS as i32;
        let pairs = (0..bits)
            .map(|_| {
                (
                    (rng.gen_range(-r..=r), rng.gen_range(-r..=r)),
                    (rng.gen_range(-r..=r), rng.gen_range(-r..=r)),
                )
            })
            .collect();
        Ok(Self { pairs })
    }

    /// Reproducible pattern from a fixed seed; equal seeds yield identical
    /// patterns across processes.
    pub fn from_seed(bits: usize, seed: u64) -> BriefResult<Self> {
        Self::generate(bits, &mut SmallRng::seed_from_u64(seed))
    }

    pub fn bit_len(&self) -> usize {
        self.pairs.len()
    }

    pub fn word_len(&self) -> usize {
        self.pairs.len() / DESCRIPTOR_WORD_BITS
    }

    pub fn pairs(&self) -> &[OffsetPair] {
        &self.pairs
    }

    /// Computes one descriptor per corner, in input order.
    ///
    /// Every corner must keep the full ±15 sampling window inside the matrix.
    /// The detector margin guarantees that for its own output; corners from
    /// other sources are checked here before any sampling happens.
    pub fn describe(&self, img: &GrayMatrix, corners: &[Point]) -> BriefResult<Vec<Descriptor>> {
        let (w, h) = (img.width(), img.height());
        for &c in corners {
            if c.x < PATCH_RADIUS || c.y < PATCH_RADIUS || c.x + PATCH_RADIUS >= w || c.y + PATCH_RADIUS >= h {
                return Err(BriefError::CornerOutOfMargin { point: c, width: w, height: h });
            }
        }

        Ok(corners.par_iter().map(|c| self.descriptor_at(img, c)).collect())
    }

    fn descriptor_at(&self, img: &GrayMatrix, c: &Point) -> Descriptor {
        let (cx, cy) = (c.x as i32, c.y as i32);
        let mut words = Vec::with_capacity(self.word_len());
        let mut acc = 0u32;

        for (j, &((ax, ay), (bx, by))) in self.pairs.iter().enumerate() {
            let ia = img.get((cx + ax) as usize, (cy + ay) as usize);
            let ib = img.get((cx + bx) as usize, (cy + by) as usize);
            if ia < ib {
                acc |= 1 << (j % DESCRIPTOR_WORD_BITS);
            }
            // Word boundary: bits is a multiple of 32, so the last word is
            // always flushed here.
            if (j + 1) % DESCRIPTOR_WORD_BITS == 0 {
                words.push(acc);
                acc = 0;
            }
        }
        words
    }
}
