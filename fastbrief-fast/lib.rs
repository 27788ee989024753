use fastbrief_core::{GrayMatrix, Point, MIN_MATRIX_DIM, PATCH_RADIUS};
use rayon::prelude::*;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetectError {
    ImageTooSmall { width: usize, height: usize, min_size: usize },
    InvalidArcSpan(usize),
}

impl std::fmt::Display for DetectError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DetectError::ImageTooSmall { width, height, min_size } => {
                write!(f, "Image {}x{} too small (minimum {}x{})", width, height, min_size, min_size)
            }
            DetectError::InvalidArcSpan(n) => {
                write!(f, "Invalid arc span: {} (must be 1-16)", n)
            }
        }
    }
}

impl std::error::Error for DetectError {}

pub type DetectResult<T> = Result<T, DetectError>;

/// Bresenham circle of radius 3, indexed clockwise from the pixel straight
/// above the candidate:
/// ```text
///       15 00 01
///    14          02
/// 13                03
/// 12       p       04
/// 11                05
///    10          06
///       09 08 07
/// ```
const CIRCLE: [(i32, i32); 16] = [
    (0, -3),
    (1, -3),
    (2, -2),
    (3, -1),
    (3, 0),
    (3, 1),
    (2, 2),
    (1, 3),
    (0, 3),
    (-1, 3),
    (-2, 2),
    (-3, 1),
    (-3, 0),
    (-3, -1),
    (-2, -2),
    (-1, -3),
];

/// Columns skipped after a reported corner; the scan resumes 4 columns to the
/// right. Same-row suppression only, a cheap stand-in for full NMS.
const COLUMN_SKIP: usize = 3;

/// Segment-test corner detector.
///
/// A pixel is a corner when at least `arc_span` consecutive circle pixels are
/// all brighter or all darker than the candidate by more than `threshold`.
pub struct FastDetector {
    threshold: u8,
    arc_span: usize,
}

impl FastDetector {
    pub fn new(threshold: u8, arc_span: usize) -> DetectResult<Self> {
        if arc_span == 0 || arc_span > CIRCLE.len() {
            return Err(DetectError::InvalidArcSpan(arc_span));
        }
        Ok(Self { threshold, arc_span })
    }

    /// Scans the matrix row-major and returns corners in scan order.
    ///
    /// Rows are partitioned across the thread pool; each row is walked
    /// serially left to right so the column-skip heuristic behaves exactly
    /// like a single-threaded scan.
    pub fn detect(&self, img: &GrayMatrix) -> DetectResult<Vec<Point>> {
        let (w, h) = (img.width(), img.height());
        if w < MIN_MATRIX_DIM || h < MIN_MATRIX_DIM {
            return Err(DetectError::ImageTooSmall { width: w, height: h, min_size: MIN_MATRIX_DIM });
        }

        let corners = (PATCH_RADIUS..h - PATCH_RADIUS)
            .into_par_iter()
            .flat_map_iter(|y| {
                let mut row = Vec::new();
                let mut x = PATCH_RADIUS;
                while x < w - PATCH_RADIUS {
                    if self.is_corner(img, x, y) {
                        row.push(Point { x, y });
                        x += COLUMN_SKIP;
                    }
                    x += 1;
                }
                row
            })
            .collect();

        Ok(corners)
    }

    fn circle_pixels(img: &GrayMatrix, x: usize, y: usize) -> [u8; 16] {
        let mut pixels = [0u8; 16];
        for (i, &(dx, dy)) in CIRCLE.iter().enumerate() {
            pixels[i] = img.get((x as i32 + dx) as usize, (y as i32 + dy) as usize);
        }
        pixels
    }

    fn is_corner(&self, img: &GrayMatrix, x: usize, y: usize) -> bool {
        let p = img.get(x, y);
        let circle = Self::circle_pixels(img, x, y);
        if self.is_excluded(p, &circle) {
            return false;
        }

        // Two passes around the circle so a run crossing index 15 -> 0 is
        // still seen as consecutive.
        let mut brighter = 0;
        let mut darker = 0;
        for i in 0..2 * CIRCLE.len() {
            let q = circle[i % CIRCLE.len()];
            if self.is_brighter(p, q) {
                brighter += 1;
                darker = 0;
            } else if self.is_darker(p, q) {
                darker += 1;
                brighter = 0;
            } else {
                brighter = 0;
                darker = 0;
            }

            if brighter == self.arc_span || darker == self.arc_span {
                return true;
            }
        }
        false
    }

    /// Cardinal pre-check: unless at least 3 of the top/right/bottom/left
    /// circle pixels differ from the candidate in the same direction, no arc
    /// of 9+ can exist and the candidate is dropped without a full scan.
    fn is_excluded(&self, p: u8, circle: &[u8; 16]) -> bool {
        let cardinals = [circle[0], circle[4], circle[8], circle[12]];

        let brighter = cardinals.iter().filter(|&&q| self.is_brighter(p, q)).count();
        if brighter >= 3 {
            return false;
        }

        let darker = cardinals.iter().filter(|&&q| self.is_darker(p, q)).count();
        darker < 3
    }

    /// True when the circle pixel exceeds the candidate by more than the
    /// threshold.
    #[inline]
    fn is_brighter(&self, p: u8, q: u8) -> bool {
        q as i16 - p as i16 > self.threshold as i16
    }

    /// True when the candidate exceeds the circle pixel by more than the
    /// threshold.
    #[inline]
    fn is_darker(&self, p: u8, q: u8) -> bool {
        p as i16 - q as i16 > self.threshold as i16
    }

    pub fn threshold(&self) -> u8 {
        self.threshold
    }

    pub fn arc_span(&self) -> usize {
        self.arc_span
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn uniform_matrix(width: usize, height: usize, value: u8) -> GrayMatrix {
        GrayMatrix::from_raw(width, height, vec![value; width * height]).unwrap()
    }

    /// 40x40 background-50 matrix with a 5x5 block of 200 at rows/cols 20-24.
    fn block_matrix() -> GrayMatrix {
        let mut data = vec![50u8; 40 * 40];
        for y in 20..=24 {
            for x in 20..=24 {
                data[y * 40 + x] = 200;
            }
        }
        GrayMatrix::from_raw(40, 40, data).unwrap()
    }

    #[test]
    fn rejects_invalid_arc_span() {
        assert!(matches!(FastDetector::new(30, 0), Err(DetectError::InvalidArcSpan(0))));
        assert!(matches!(FastDetector::new(30, 17), Err(DetectError::InvalidArcSpan(17))));
        assert!(FastDetector::new(30, 1).is_ok());
        assert!(FastDetector::new(30, 16).is_ok());
    }

    #[test]
    fn rejects_undersized_matrix() {
        let detector = FastDetector::new(30, 9).unwrap();
        let img = uniform_matrix(30, 40, 128);
        assert!(matches!(
            detector.detect(&img),
            Err(DetectError::ImageTooSmall { width: 30, height: 40, min_size: 31 })
        ));
    }

    #[test]
    fn uniform_matrix_has_no_corners() {
        let detector = FastDetector::new(30, 9).unwrap();
        let img = uniform_matrix(40, 40, 128);
        assert_eq!(detector.detect(&img).unwrap(), vec![]);
    }

    #[test]
    fn detects_block_corners_near_boundary() {
        let detector = FastDetector::new(30, 9).unwrap();
        let corners = detector.detect(&block_matrix()).unwrap();

        assert!(!corners.is_empty());
        for c in &corners {
            // Every corner sits within 2 px of the block boundary (the block
            // spans rows/cols 20..=24).
            let boundary_dist = [
                c.x as i32 - 20,
                c.x as i32 - 24,
                c.y as i32 - 20,
                c.y as i32 - 24,
            ]
            .into_iter()
            .map(i32::abs)
            .min()
            .unwrap();
            assert!(boundary_dist <= 2, "corner {:?} too far from block boundary", c);
        }
    }

    #[test]
    fn corners_are_reported_in_scan_order() {
        let detector = FastDetector::new(30, 9).unwrap();
        let corners = detector.detect(&block_matrix()).unwrap();
        for pair in corners.windows(2) {
            let row_major = (pair[0].y, pair[0].x) < (pair[1].y, pair[1].x);
            assert!(row_major, "{:?} not in scan order", pair);
        }
    }

    #[test]
    fn detects_run_spanning_wraparound() {
        // Background 100, center candidate at (15, 15) in a minimum-size
        // matrix. Brighten circle indices 12..=15 and 0..=4: a 9-long run
        // only visible when the scan wraps past index 15.
        let mut data = vec![100u8; 31 * 31];
        for idx in [12, 13, 14, 15, 0, 1, 2, 3, 4] {
            let (dx, dy) = CIRCLE[idx];
            let (x, y) = ((15 + dx) as usize, (15 + dy) as usize);
            data[y * 31 + x] = 200;
        }
        let img = GrayMatrix::from_raw(31, 31, data).unwrap();

        let detector = FastDetector::new(30, 9).unwrap();
        assert_eq!(detector.detect(&img).unwrap(), vec![Point { x: 15, y: 15 }]);

        // The same arc is too short for a span of 10.
        let detector = FastDetector::new(30, 10).unwrap();
        assert_eq!(detector.detect(&img).unwrap(), vec![]);
    }

    #[test]
    fn cardinal_precheck_drops_weak_candidates() {
        // Only two cardinals (top, right) differ: excluded before the full
        // scan regardless of arc content.
        let mut data = vec![100u8; 31 * 31];
        for idx in [0, 4] {
            let (dx, dy) = CIRCLE[idx];
            data[(15 + dy) as usize * 31 + (15 + dx) as usize] = 200;
        }
        let img = GrayMatrix::from_raw(31, 31, data).unwrap();
        let detector = FastDetector::new(30, 1).unwrap();
        assert_eq!(detector.detect(&img).unwrap(), vec![]);
    }

    #[test]
    fn zero_threshold_is_accepted() {
        let detector = FastDetector::new(0, 9).unwrap();
        let img = uniform_matrix(40, 40, 128);
        // Uniform image: no pixel differs at all, so still no corners.
        assert_eq!(detector.detect(&img).unwrap(), vec![]);
    }

    proptest! {
        #[test]
        fn brighter_and_darker_are_mutually_exclusive(p: u8, q: u8, t: u8) {
            let detector = FastDetector::new(t, 9).unwrap();
            prop_assert!(!(detector.is_brighter(p, q) && detector.is_darker(p, q)));
        }

        #[test]
        fn corners_respect_margin_and_row_spacing(
            (w, h, data) in (31usize..44, 31usize..44)
                .prop_flat_map(|(w, h)| {
                    (Just(w), Just(h), prop::collection::vec(any::<u8>(), w * h))
                }),
            threshold in 0u8..60,
        ) {
            let img = GrayMatrix::from_raw(w, h, data).unwrap();
            let detector = FastDetector::new(threshold, 9).unwrap();
            let corners = detector.detect(&img).unwrap();

            for c in &corners {
                prop_assert!(c.x >= PATCH_RADIUS && c.x < w - PATCH_RADIUS);
                prop_assert!(c.y >= PATCH_RADIUS && c.y < h - PATCH_RADIUS);
            }
            // Column skip: two corners on one row are at least 4 columns apart.
            for pair in corners.windows(2) {
                if pair[0].y == pair[1].y {
                    prop_assert!(pair[1].x >= pair[0].x + COLUMN_SKIP + 1);
                }
            }
        }

        #[test]
        fn detection_is_deterministic(
            (w, h, data) in (31usize..40, 31usize..40)
                .prop_flat_map(|(w, h)| {
                    (Just(w), Just(h), prop::collection::vec(any::<u8>(), w * h))
                }),
        ) {
            let img = GrayMatrix::from_raw(w, h, data).unwrap();
            let detector = FastDetector::new(20, 9).unwrap();
            prop_assert_eq!(detector.detect(&img).unwrap(), detector.detect(&img).unwrap());
        }
    }
}
