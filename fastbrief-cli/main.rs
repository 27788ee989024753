use fastbrief_cli::{FeaturePipeline, GrayMatrix, MatchConfig, MatchRecord};
use image::{DynamicImage, GrayImage, ImageReader, Rgba, RgbaImage};
use imageproc::drawing::draw_line_segment_mut;
use imageproc::filter::gaussian_blur_f32;
use std::time::Instant;

/// Sigma used to smooth the matrices the descriptors sample; corners are
/// detected on the sharp matrices.
const DESCRIPTOR_BLUR_SIGMA: f32 = 2.0;

/// Vertical gap between the two images in the overlay.
const OVERLAY_GAP: u32 = 5;

fn main() {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 3 {
        eprintln!("Usage: {} <image1> <image2> [output.png]", args[0]);
        std::process::exit(1);
    }
    let out_path = args.get(3).map(String::as_str).unwrap_or("result.png");

    let img1 = load_luma(&args[1]);
    let img2 = load_luma(&args[2]);

    let config = MatchConfig::default();
    let pipeline = FeaturePipeline::new(config.clone()).expect("Default configuration is valid");

    let t0 = Instant::now();

    let corners1 = pipeline.detect(&gray_matrix(&img1)).expect("Detection failed");
    let corners2 = pipeline.detect(&gray_matrix(&img2)).expect("Detection failed");
    println!("Corners: {} / {}", corners1.len(), corners2.len());

    let blurred1 = gray_matrix(&gaussian_blur_f32(&img1, DESCRIPTOR_BLUR_SIGMA));
    let blurred2 = gray_matrix(&gaussian_blur_f32(&img2, DESCRIPTOR_BLUR_SIGMA));
    let desc1 = pipeline.describe(&blurred1, &corners1).expect("Description failed");
    let desc2 = pipeline.describe(&blurred2, &corners2).expect("Description failed");

    let matches = pipeline
        .match_pair(&corners1, &desc1, &corners2, &desc2)
        .expect("Matching failed");

    println!("Matches: {} (in {:.2?})", matches.len(), t0.elapsed());

    let json = serde_json::to_string_pretty(&matches).expect("Serialization failed");
    std::fs::write("matches.json", json).expect("Failed to write matches.json");

    let overlay = draw_matches(&img1, &img2, &matches, config.min_confidence);
    overlay.save(out_path).expect("Failed to save output image");

    let drawn = matches.iter().filter(|m| m.confidence > config.min_confidence).count();
    println!("Saved {} with {} lines above confidence {}", out_path, drawn, config.min_confidence);
}

fn load_luma(path: &str) -> GrayImage {
    ImageReader::open(path)
        .expect("Image not found")
        .decode()
        .expect("Decode failed")
        .to_luma8()
}

fn gray_matrix(img: &GrayImage) -> GrayMatrix {
    GrayMatrix::from_raw(img.width() as usize, img.height() as usize, img.as_raw().clone())
        .expect("Luma8 buffer matches its dimensions")
}

/// Stacks both images vertically (narrower one centered) and draws a line per
/// match above the confidence cutoff.
fn draw_matches(img1: &GrayImage, img2: &GrayImage, matches: &[MatchRecord], min_confidence: f32) -> RgbaImage {
    let (w1, h1) = img1.dimensions();
    let (w2, h2) = img2.dimensions();
    let width = w1.max(w2);
    let dx1 = (width - w1) / 2;
    let dx2 = (width - w2) / 2;

    let mut canvas = RgbaImage::from_pixel(width, h1 + h2 + OVERLAY_GAP, Rgba([0, 0, 0, 255]));
    let rgba1 = DynamicImage::ImageLuma8(img1.clone()).into_rgba8();
    let rgba2 = DynamicImage::ImageLuma8(img2.clone()).into_rgba8();
    image::imageops::overlay(&mut canvas, &rgba1, dx1 as i64, 0);
    image::imageops::overlay(&mut canvas, &rgba2, dx2 as i64, (h1 + OVERLAY_GAP) as i64);

    for m in matches.iter().filter(|m| m.confidence > min_confidence) {
        draw_line_segment_mut(
            &mut canvas,
            ((m.keypoint1.x as u32 + dx1) as f32, m.keypoint1.y as f32),
            ((m.keypoint2.x as u32 + dx2) as f32, (m.keypoint2.y as u32 + h1 + OVERLAY_GAP) as f32),
            Rgba([255, 0, 0, 255]),
        );
    }
    canvas
}
