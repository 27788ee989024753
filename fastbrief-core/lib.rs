//! Shared types for the fastbrief matching pipeline: the intensity matrix,
//! point/descriptor/match records, and the pipeline configuration.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Border margin in pixels. Corner candidates stay this far from every edge,
/// which also keeps the full ±15 descriptor sampling window in bounds.
pub const PATCH_RADIUS: usize = 15;

/// Smallest matrix side that leaves at least one candidate column/row inside
/// the margin.
pub const MIN_MATRIX_DIM: usize = 2 * PATCH_RADIUS + 1;

/// Descriptor words are packed 32 comparisons at a time.
pub const DESCRIPTOR_WORD_BITS: usize = 32;

/// Admissible sampling-pattern lengths. All are multiples of 32, so a
/// descriptor never ends in a partial word.
pub const VALID_PATTERN_BITS: [usize; 3] = [128, 256, 512];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatrixError {
    EmptyMatrix,
    RaggedRow { row: usize, expected: usize, actual: usize },
    LengthMismatch { expected: usize, actual: usize },
}

impl std::fmt::Display for MatrixError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatrixError::EmptyMatrix => {
                write!(f, "Matrix must have non-zero width and height")
            }
            MatrixError::RaggedRow { row, expected, actual } => {
                write!(f, "Row {} has length {} (expected {})", row, actual, expected)
            }
            MatrixError::LengthMismatch { expected, actual } => {
                write!(f, "Matrix data length mismatch: expected {}, got {}", expected, actual)
            }
        }
    }
}

impl std::error::Error for MatrixError {}

/// Row-major 8-bit grayscale intensity matrix.
///
/// Stored as one contiguous buffer with explicit dimensions; construction
/// validates shape so downstream stages never index out of bounds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrayMatrix {
    data: Vec<u8>,
    width: usize,
    height: usize,
}

impl GrayMatrix {
    /// Wraps an existing row-major buffer.
    pub fn from_raw(width: usize, height: usize, data: Vec<u8>) -> Result<Self, MatrixError> {
        if width == 0 || height == 0 {
            return Err(MatrixError::EmptyMatrix);
        }
        let expected = width * height;
        if data.len() != expected {
            return Err(MatrixError::LengthMismatch { expected, actual: data.len() });
        }
        Ok(Self { data, width, height })
    }

    /// Flattens a row-of-rows matrix, rejecting ragged input.
    pub fn from_rows(rows: &[Vec<u8>]) -> Result<Self, MatrixError> {
        let height = rows.len();
        let width = rows.first().map_or(0, |r| r.len());
        if width == 0 || height == 0 {
            return Err(MatrixError::EmptyMatrix);
        }
        let mut data = Vec::with_capacity(width * height);
        for (i, row) in rows.iter().enumerate() {
            if row.len() != width {
                return Err(MatrixError::RaggedRow { row: i, expected: width, actual: row.len() });
            }
            data.extend_from_slice(row);
        }
        Ok(Self { data, width, height })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Intensity at (x, y). Panics on out-of-range coordinates; the detector
    /// margin rules those out for every pipeline access.
    #[inline]
    pub fn get(&self, x: usize, y: usize) -> u8 {
        self.data[y * self.width + x]
    }

    pub fn as_raw(&self) -> &[u8] {
        &self.data
    }
}

/// Integer pixel coordinates, (0, 0) top-left.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Point {
    pub x: usize,
    pub y: usize,
}

/// Binary descriptor: bit j of the code is bit `j % 32` of word `j / 32`.
pub type Descriptor = Vec<u32>;

/// One nearest-neighbor correspondence between two corner lists.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MatchRecord {
    pub index1: usize,
    pub index2: usize,
    pub keypoint1: Point,
    pub keypoint2: Point,
    pub confidence: f32,
}

/// Full configuration surface of the pipeline. Components re-validate the
/// parameters they consume at construction time.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MatchConfig {
    /// Intensity-difference sensitivity of the corner test.
    pub threshold: u8,
    /// Minimum run of consecutive brighter/darker circle pixels (1..=16).
    pub arc_span: usize,
    /// Sampling-pattern length: 128, 256 or 512 comparisons.
    pub pattern_bits: usize,
    /// Seed for the pattern generator; equal seeds give comparable
    /// descriptors across processes.
    pub pattern_seed: u64,
    pub n_threads: usize,
    /// Confidence cutoff applied by the visualization collaborator.
    pub min_confidence: f32,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            threshold: 40,
            arc_span: 12,
            pattern_bits: 256,
            pattern_seed: 0x5EED_BA5E_D00D,
            n_threads: num_cpus::get().max(1),
            min_confidence: 0.93,
        }
    }
}

#[cfg(feature = "serde")]
impl MatchConfig {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(toml_str)
    }

    pub fn save_json<P: AsRef<std::path::Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn load_json<P: AsRef<std::path::Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        Ok(Self::from_json(&std::fs::read_to_string(path)?)?)
    }

    pub fn save_toml<P: AsRef<std::path::Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        std::fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    pub fn load_toml<P: AsRef<std::path::Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        Ok(Self::from_toml(&std::fs::read_to_string(path)?)?)
    }
}

/// Initialize the global Rayon thread pool with the specified number of threads.
pub fn init_thread_pool(n_threads: usize) -> Result<(), rayon::ThreadPoolBuildError> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(n_threads)
        .build_global()
}
