//! X-junction candidates from the `chess-corners` ChESS detector.

use chess_corners::{find_chess_corners_image, ChessConfig, CornerDescriptor};
use image::GrayImage;
use nalgebra::Point2;

/// A corner candidate.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Peak {
    pub position: Point2<f32>,
    pub strength: f32,
}

impl From<&CornerDescriptor> for Peak {
    fn from(c: &CornerDescriptor) -> Self {
        Self {
            position: Point2::new(c.x, c.y),
            strength: c.response,
        }
    }
}

/// Single-scale detector configuration.
pub(crate) fn chess_config(threshold_rel: f32, nms_radius: u32) -> ChessConfig {
    let mut cfg = ChessConfig::single_scale();
    cfg.params.threshold_rel = threshold_rel;
    cfg.params.nms_radius = nms_radius;
    cfg
}

/// Stretch intensities to the full `0..=255` range.
pub(crate) fn stretch_contrast(gray: &GrayImage) -> GrayImage {
    let (lo, hi) = gray
        .as_raw()
        .iter()
        .fold((u8::MAX, u8::MIN), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    if hi <= lo {
        return gray.clone();
    }
    let scale = 255.0 / (hi - lo) as f32;
    let mut out = gray.clone();
    for v in out.iter_mut() {
        *v = ((*v - lo) as f32 * scale).round() as u8;
    }
    out
}

/// Corner candidates, strongest first.
pub(crate) fn find_peaks(gray: &GrayImage, cfg: &ChessConfig) -> Vec<Peak> {
    if gray.width() == 0 || gray.height() == 0 {
        return Vec::new();
    }
    let mut peaks: Vec<Peak> = find_chess_corners_image(gray, cfg)
        .iter()
        .map(Peak::from)
        .filter(|p| p.position.x.is_finite() && p.position.y.is_finite())
        .collect();
    peaks.sort_by(|a, b| b.strength.total_cmp(&a.strength));
    peaks
}
