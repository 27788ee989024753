use fastbrief_brief::{BriefError, SamplingPattern};
use fastbrief_core::init_thread_pool;
use fastbrief_fast::{DetectError, FastDetector};
use fastbrief_match::{reciprocal_match, MatchError};

pub use fastbrief_core::{Descriptor, GrayMatrix, MatchConfig, MatchRecord, MatrixError, Point};

#[derive(Debug)]
pub enum PipelineError {
    Detect(DetectError),
    Brief(BriefError),
    Match(MatchError),
}

impl std::fmt::Display for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineError::Detect(e) => write!(f, "Detection error: {}", e),
            PipelineError::Brief(e) => write!(f, "Descriptor error: {}", e),
            PipelineError::Match(e) => write!(f, "Matching error: {}", e),
        }
    }
}

impl std::error::Error for PipelineError {}

impl From<DetectError> for PipelineError {
    fn from(err: DetectError) -> Self {
        PipelineError::Detect(err)
    }
}

impl From<BriefError> for PipelineError {
    fn from(err: BriefError) -> Self {
        PipelineError::Brief(err)
    }
}

impl From<MatchError> for PipelineError {
    fn from(err: MatchError) -> Self {
        PipelineError::Match(err)
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;

/// One matching session: corner detector plus the sampling pattern shared by
/// every descriptor the session produces.
///
/// Descriptors computed by different pipelines (different seeds) are not
/// comparable; keep one pipeline per pair of images being matched.
pub struct FeaturePipeline {
    config: MatchConfig,
    detector: FastDetector,
    pattern: SamplingPattern,
}

impl FeaturePipeline {
    pub fn new(config: MatchConfig) -> PipelineResult<Self> {
        // The global pool can only be built once per process; later sessions
        // keep whatever pool already exists.
        init_thread_pool(config.n_threads).ok();

        let detector = FastDetector::new(config.threshold, config.arc_span)?;
        let pattern = SamplingPattern::from_seed(config.pattern_bits, config.pattern_seed)?;
        Ok(Self { config, detector, pattern })
    }

    pub fn detect(&self, img: &GrayMatrix) -> PipelineResult<Vec<Point>> {
        Ok(self.detector.detect(img)?)
    }

    pub fn describe(&self, img: &GrayMatrix, corners: &[Point]) -> PipelineResult<Vec<Descriptor>> {
        Ok(self.pattern.describe(img, corners)?)
    }

    pub fn detect_and_describe(&self, img: &GrayMatrix) -> PipelineResult<(Vec<Point>, Vec<Descriptor>)> {
        let corners = self.detect(img)?;
        let descriptors = self.describe(img, &corners)?;
        Ok((corners, descriptors))
    }

    /// Reciprocal (mutual nearest-neighbor) matching of two described sets.
    pub fn match_pair(
        &self,
        corners1: &[Point],
        desc1: &[Descriptor],
        corners2: &[Point],
        desc2: &[Descriptor],
    ) -> PipelineResult<Vec<MatchRecord>> {
        Ok(reciprocal_match(corners1, desc1, corners2, desc2)?)
    }

    /// Full run over an image pair: detect, describe, and cross-check both
    /// matrices as-is. Callers that pre-filter the descriptor input (e.g.
    /// blurring copies of the matrices) drive the stages individually.
    pub fn match_images(&self, img1: &GrayMatrix, img2: &GrayMatrix) -> PipelineResult<Vec<MatchRecord>> {
        let (corners1, desc1) = self.detect_and_describe(img1)?;
        let (corners2, desc2) = self.detect_and_describe(img2)?;
        self.match_pair(&corners1, &desc1, &corners2, &desc2)
    }

    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    pub fn pattern(&self) -> &SamplingPattern {
        &self.pattern
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> MatchConfig {
        MatchConfig {
            threshold: 30,
            arc_span: 9,
            n_threads: 1,
            ..MatchConfig::default()
        }
    }

    /// 64x64 scene with bright blocks that the detector finds corners on.
    fn test_scene() -> GrayMatrix {
        let mut data = vec![50u8; 64 * 64];
        for (bx, by) in [(20usize, 20usize), (40, 24), (26, 42)] {
            for dy in 0..5 {
                for dx in 0..5 {
                    data[(by + dy) * 64 + bx + dx] = 200;
                }
            }
        }
        GrayMatrix::from_raw(64, 64, data).unwrap()
    }

    #[test]
    fn rejects_invalid_configuration() {
        let result = FeaturePipeline::new(MatchConfig { arc_span: 0, ..test_config() });
        assert!(matches!(result, Err(PipelineError::Detect(DetectError::InvalidArcSpan(0)))));

        let result = FeaturePipeline::new(MatchConfig { pattern_bits: 100, ..test_config() });
        assert!(matches!(result, Err(PipelineError::Brief(BriefError::InvalidPatternBits(100)))));
    }

    #[test]
    fn matching_an_image_with_itself_is_identity() {
        let pipeline = FeaturePipeline::new(test_config()).unwrap();
        let img = test_scene();

        let (corners, descriptors) = pipeline.detect_and_describe(&img).unwrap();
        assert!(!corners.is_empty());
        assert_eq!(corners.len(), descriptors.len());

        let matches = pipeline
            .match_pair(&corners, &descriptors, &corners, &descriptors)
            .unwrap();
        // Corners with duplicate descriptors lose the cross-check to the
        // first duplicate, so the retained set may be smaller than the input.
        assert!(!matches.is_empty());
        assert!(matches.len() <= corners.len());
        for m in matches {
            assert_eq!(m.index1, m.index2);
            assert_eq!(m.keypoint1, m.keypoint2);
            assert_eq!(m.confidence, 1.0);
        }
    }

    #[test]
    fn match_images_runs_end_to_end() {
        let pipeline = FeaturePipeline::new(test_config()).unwrap();
        let img = test_scene();
        let matches = pipeline.match_images(&img, &img).unwrap();
        assert!(!matches.is_empty());
    }

    #[test]
    fn sessions_with_equal_seeds_produce_comparable_descriptors() {
        let a = FeaturePipeline::new(test_config()).unwrap();
        let b = FeaturePipeline::new(test_config()).unwrap();
        assert_eq!(a.pattern(), b.pattern());

        let img = test_scene();
        let (corners, desc_a) = a.detect_and_describe(&img).unwrap();
        let desc_b = b.describe(&img, &corners).unwrap();
        assert_eq!(desc_a, desc_b);
    }
}
