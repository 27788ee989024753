use fastbrief_core::{Descriptor, MatchRecord, Point, DESCRIPTOR_WORD_BITS};
use rayon::prelude::*;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchError {
    SetLengthMismatch { corners: usize, descriptors: usize },
    DescriptorWidthMismatch { expected: usize, actual: usize },
    EmptyDescriptors,
}

impl std::fmt::Display for MatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchError::SetLengthMismatch { corners, descriptors } => {
                write!(f, "Corner/descriptor count mismatch: {} corners, {} descriptors", corners, descriptors)
            }
            MatchError::DescriptorWidthMismatch { expected, actual } => {
                write!(f, "Descriptor width mismatch: expected {} words, got {}", expected, actual)
            }
            MatchError::EmptyDescriptors => {
                write!(f, "Descriptors must contain at least one word")
            }
        }
    }
}

impl std::error::Error for MatchError {}

pub type MatchResult<T> = Result<T, MatchError>;

/// Number of differing bits between two equal-width binary codes.
#[inline]
pub fn hamming_distance(a: &[u32], b: &[u32]) -> u32 {
    a.iter().zip(b).map(|(x, y)| (x ^ y).count_ones()).sum()
}

fn validate_sets(
    corners1: &[Point],
    desc1: &[Descriptor],
    corners2: &[Point],
    desc2: &[Descriptor],
) -> MatchResult<()> {
    if corners1.len() != desc1.len() {
        return Err(MatchError::SetLengthMismatch { corners: corners1.len(), descriptors: desc1.len() });
    }
    if corners2.len() != desc2.len() {
        return Err(MatchError::SetLengthMismatch { corners: corners2.len(), descriptors: desc2.len() });
    }

    if let Some(first) = desc1.first().or_else(|| desc2.first()) {
        let width = first.len();
        if width == 0 {
            return Err(MatchError::EmptyDescriptors);
        }
        for d in desc1.iter().chain(desc2) {
            if d.len() != width {
                return Err(MatchError::DescriptorWidthMismatch { expected: width, actual: d.len() });
            }
        }
    }
    Ok(())
}

/// Best match in set 2 for every element of set 1, one record per element, in
/// input order. No distance cutoff is applied here.
///
/// The inner Hamming sum stops as soon as it reaches the best distance so far
/// (distance only grows word by word), and the scan over set 2 stops outright
/// once a zero-distance match is found. Rows of the search are independent and
/// run across the thread pool.
///
/// Either set being empty yields an empty result.
pub fn match_one_way(
    corners1: &[Point],
    desc1: &[Descriptor],
    corners2: &[Point],
    desc2: &[Descriptor],
) -> MatchResult<Vec<MatchRecord>> {
    validate_sets(corners1, desc1, corners2, desc2)?;
    if corners1.is_empty() || corners2.is_empty() {
        return Ok(Vec::new());
    }

    let bits = (desc1[0].len() * DESCRIPTOR_WORD_BITS) as f32;

    let records = (0..corners1.len())
        .into_par_iter()
        .map(|i| {
            let da = &desc1[i];
            let mut min = u32::MAX;
            let mut min_j = 0usize;

            for (j, db) in desc2.iter().enumerate() {
                let mut dist = 0u32;
                for (wa, wb) in da.iter().zip(db) {
                    dist += (wa ^ wb).count_ones();
                    if dist >= min {
                        break;
                    }
                }
                if dist < min {
                    min = dist;
                    min_j = j;
                }
                if min == 0 {
                    break;
                }
            }

            MatchRecord {
                index1: i,
                index2: min_j,
                keypoint1: corners1[i],
                keypoint2: corners2[min_j],
                confidence: 1.0 - min as f32 / bits,
            }
        })
        .collect();

    Ok(records)
}

/// Mutual nearest-neighbor matching: keeps a one-way match only when set 2's
/// best answer points straight back at the originating element of set 1.
/// Output preserves set 1 order; non-mutual matches are dropped.
pub fn reciprocal_match(
    corners1: &[Point],
    desc1: &[Descriptor],
    corners2: &[Point],
    desc2: &[Descriptor],
) -> MatchResult<Vec<MatchRecord>> {
    if corners1.is_empty() || corners2.is_empty() {
        return Ok(Vec::new());
    }

    let m1 = match_one_way(corners1, desc1, corners2, desc2)?;
    let m2 = match_one_way(corners2, desc2, corners1, desc1)?;

    Ok(m1.into_iter().filter(|r| m2[r.index2].index2 == r.index1).collect())
}
