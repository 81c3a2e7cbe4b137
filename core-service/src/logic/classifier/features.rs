//! Feature Extraction
//!
//! Numeric measurements shared by the classifiers and the calibrator.
//! Pure functions, no state.

use crate::logic::signal::VideoFrame;

// ============================================================================
// VIDEO FEATURES
// ============================================================================

/// Rec. 601 luma of one pixel, 0.0 - 1.0
#[inline]
fn luma(r: u8, g: u8, b: u8) -> f32 {
    (0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32) / 255.0
}

/// Mean brightness of the frame, 0.0 - 1.0
pub fn mean_brightness(frame: &VideoFrame) -> f32 {
    let n = frame.pixel_count();
    if n == 0 {
        return 0.0;
    }
    let sum: f32 = frame.rgb.chunks_exact(3).map(|p| luma(p[0], p[1], p[2])).sum();
    sum / n as f32
}

/// Classic RGB skin-tone rule (Kovac et al.)
#[inline]
pub fn is_skin(r: u8, g: u8, b: u8) -> bool {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    r > 95
        && g > 40
        && b > 20
        && (max - min) > 15
        && (r as i16 - g as i16).abs() > 15
        && r > g
        && r > b
}

/// Skin layout of a frame
#[derive(Debug, Clone, PartialEq)]
pub struct SkinMap {
    /// Skin pixels / all pixels
    pub ratio: f32,
    /// Per-column skin density (skin pixels / height)
    pub column_density: Vec<f32>,
}

pub fn skin_map(frame: &VideoFrame) -> SkinMap {
    let width = frame.width as usize;
    let height = frame.height as usize;
    let mut columns = vec![0u32; width];
    let mut total = 0u32;

    for (idx, p) in frame.rgb.chunks_exact(3).enumerate() {
        if is_skin(p[0], p[1], p[2]) {
            columns[idx % width] += 1;
            total += 1;
        }
    }

    let pixels = (width * height).max(1) as f32;
    SkinMap {
        ratio: total as f32 / pixels,
        column_density: columns
            .into_iter()
            .map(|c| c as f32 / height.max(1) as f32)
            .collect(),
    }
}

/// Contiguous run of skin-dense columns, in column indices [start, end)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub start: usize,
    pub end: usize,
}

impl Segment {
    pub fn width(&self) -> usize {
        self.end - self.start
    }

    pub fn center(&self) -> f32 {
        (self.start + self.end) as f32 / 2.0
    }
}

/// Split the column profile into separated skin segments
pub fn skin_segments(map: &SkinMap, min_density: f32, min_width: usize) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut start: Option<usize> = None;

    for (col, density) in map.column_density.iter().enumerate() {
        match (start, *density >= min_density) {
            (None, true) => start = Some(col),
            (Some(s), false) => {
                segments.push(Segment { start: s, end: col });
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        segments.push(Segment {
            start: s,
            end: map.column_density.len(),
        });
    }

    segments.retain(|s| s.width() >= min_width.max(1));
    segments
}

// ============================================================================
// AUDIO FEATURES
// ============================================================================

pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f32 = samples.iter().map(|s| s * s).sum();
    (sum_sq / samples.len() as f32).sqrt()
}

/// Hann-windowed magnitude spectrum (bins 0..n/2) of the first
/// `max_samples` samples. Plain DFT - buffers are small.
pub fn magnitude_spectrum(samples: &[f32], max_samples: usize) -> Vec<f32> {
    let n = samples.len().min(max_samples);
    if n < 2 {
        return Vec::new();
    }
    let input: Vec<f32> = samples[..n]
        .iter()
        .enumerate()
        .map(|(t, x)| {
            let w = 0.5 - 0.5 * (2.0 * std::f32::consts::PI * t as f32 / (n - 1) as f32).cos();
            x * w
        })
        .collect();
    let bins = n / 2;
    let mut out = Vec::with_capacity(bins);

    for k in 0..bins {
        let mut re = 0.0f32;
        let mut im = 0.0f32;
        let w = -2.0 * std::f32::consts::PI * k as f32 / n as f32;
        for (t, x) in input.iter().enumerate() {
            let angle = w * t as f32;
            re += x * angle.cos();
            im += x * angle.sin();
        }
        out.push((re * re + im * im).sqrt());
    }
    out
}

/// Frequency (Hz) of spectrum bin `k` for an `n`-sample window
#[inline]
fn bin_hz(k: usize, bins: usize, sample_rate: u32) -> f32 {
    k as f32 * sample_rate as f32 / (2 * bins) as f32
}

/// Magnitude-weighted mean frequency
pub fn spectral_centroid(spectrum: &[f32], sample_rate: u32) -> f32 {
    let total: f32 = spectrum.iter().sum();
    if total <= f32::EPSILON {
        return 0.0;
    }
    let weighted: f32 = spectrum
        .iter()
        .enumerate()
        .map(|(k, m)| bin_hz(k, spectrum.len(), sample_rate) * m)
        .sum();
    weighted / total
}

/// Frequency below which `fraction` of the spectral energy lies
pub fn spectral_rolloff(spectrum: &[f32], sample_rate: u32, fraction: f32) -> f32 {
    let total: f32 = spectrum.iter().map(|m| m * m).sum();
    if total <= f32::EPSILON {
        return 0.0;
    }
    let target = total * fraction;
    let mut acc = 0.0f32;
    for (k, m) in spectrum.iter().enumerate() {
        acc += m * m;
        if acc >= target {
            return bin_hz(k, spectrum.len(), sample_rate);
        }
    }
    bin_hz(spectrum.len().saturating_sub(1), spectrum.len(), sample_rate)
}
