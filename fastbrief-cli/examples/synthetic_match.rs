//! Runs the full pipeline on two synthetic scenes, no image files needed:
//!
//! ```sh
//! cargo run -p fastbrief-cli --example synthetic_match
//! ```

use fastbrief_cli::{FeaturePipeline, GrayMatrix, MatchConfig};

/// 96x96 scene: dark background with bright blocks, shifted horizontally.
fn scene(shift: usize) -> GrayMatrix {
    let (w, h) = (96usize, 96usize);
    let mut data = vec![40u8; w * h];
    for (bx, by) in [(24usize, 24usize), (60, 30), (36, 64)] {
        for dy in 0..5 {
            for dx in 0..5 {
                let (x, y) = (bx + shift + dx, by + dy);
                if x < w && y < h {
                    data[y * w + x] = 220;
                }
            }
        }
    }
    GrayMatrix::from_raw(w, h, data).expect("dimensions match the buffer")
}

fn main() {
    let config = MatchConfig {
        threshold: 30,
        arc_span: 9,
        ..MatchConfig::default()
    };
    let min_confidence = config.min_confidence;
    let pipeline = FeaturePipeline::new(config).expect("valid configuration");

    let img1 = scene(0);
    let img2 = scene(3);

    let (corners1, desc1) = pipeline.detect_and_describe(&img1).expect("pipeline run");
    let (corners2, desc2) = pipeline.detect_and_describe(&img2).expect("pipeline run");
    println!("Corners: {} / {}", corners1.len(), corners2.len());

    let matches = pipeline
        .match_pair(&corners1, &desc1, &corners2, &desc2)
        .expect("matching");
    println!("Reciprocal matches: {}", matches.len());

    for m in &matches {
        let marker = if m.confidence > min_confidence { "*" } else { " " };
        println!(
            "{} ({:3}, {:3}) -> ({:3}, {:3})  confidence {:.3}",
            marker, m.keypoint1.x, m.keypoint1.y, m.keypoint2.x, m.keypoint2.y, m.confidence
        );
    }
}
