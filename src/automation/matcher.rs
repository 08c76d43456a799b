//! Template matching
//!
//! Scores placements of the template on the screenshot with zero-mean
//! normalized cross-correlation (1.0 is a perfect match, insensitive to
//! uniform brightness changes). Placements at or above the confidence
//! threshold are grouped: a hit closer than [`CLUSTER_DISTANCE`] pixels on
//! both axes to an earlier hit belongs to the same match.
//!
//! Large templates are searched coarse to fine. Both images are shrunk by a
//! power of two and softened slightly, so a match that falls between coarse
//! cells still scores well. Every coarse placement is scored and only the
//! neighbourhoods of the best ones are scored at full resolution.

use image::{imageops, GrayImage};

use crate::common::{Error, Result};

/// Hits closer than this (in both x and y) are the same match
pub const CLUSTER_DISTANCE: u32 = 4;

/// Largest shrink factor for the coarse pass
const MAX_FACTOR: u32 = 8;

/// A template is only shrunk while both its sides stay at least this long
const MIN_COARSE_SIDE: u32 = 8;

/// Gaussian sigma applied to shrunk images, in coarse pixels
const COARSE_BLUR: f32 = 0.5;

/// Coarse placements within this much of the confidence are refined
const COARSE_MARGIN: f64 = 0.3;

/// The best few coarse placements are refined whatever their score
const MIN_CANDIDATES: usize = 8;

/// Upper bound on refined coarse placements
const MAX_CANDIDATES: usize = 64;

const EPSILON: f64 = 1e-9;

/// Best placement of one match, in screenshot pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hit {
    pub x: u32,
    pub y: u32,
    pub score: f32,
}

/// Result of matching one template against one screenshot
#[derive(Debug, Clone, PartialEq)]
pub enum Matches {
    None,
    One(Hit),
    /// Number of distinct places the template matched
    Many(usize),
}

/// Search `screen` for `template`
///
/// `name` only labels errors.
pub fn find(name: &str, screen: &GrayImage, template: &GrayImage, confidence: f32) -> Result<Matches> {
    let (sw, sh) = screen.dimensions();
    let (tw, th) = template.dimensions();

    if tw == 0 || th == 0 {
        return Err(Error::Config(format!("Template '{}' is empty", name)));
    }
    if tw > sw || th > sh {
        return Err(Error::TemplateTooLarge {
            name: name.to_string(),
            template_size: format!("{}x{}", tw, th),
            screen_size: format!("{}x{}", sw, sh),
        });
    }

    let threshold = f64::from(confidence);
    let full = Correlation::new(screen, template);
    let (max_x, max_y) = (sw - tw, sh - th);
    let mut clusters: Vec<(Hit, Hit)> = Vec::new();

    let mut consider = |x: u32, y: u32| {
        let score = full.score(x, y);
        if score >= threshold {
            add_to_clusters(
                &mut clusters,
                Hit {
                    x,
                    y,
                    score: score as f32,
                },
            );
        }
    };

    match Coarse::new(screen, template, full.is_flat()) {
        None => {
            for y in 0..=max_y {
                for x in 0..=max_x {
                    consider(x, y);
                }
            }
        }
        Some(coarse) => {
            let factor = coarse.factor;
            let candidates = coarse.candidates(threshold - COARSE_MARGIN);
            tracing::trace!(template = name, factor, candidates = candidates.len(), "Coarse pass");

            // A coarse cell covers `factor` full placements; look one cell
            // further on each side for misaligned matches
            for (cx, cy) in candidates {
                let x0 = (cx * factor).saturating_sub(factor);
                let y0 = (cy * factor).saturating_sub(factor);
                let x1 = (cx * factor + 2 * factor - 1).min(max_x);
                let y1 = (cy * factor + 2 * factor - 1).min(max_y);
                for y in y0.min(max_y)..=y1 {
                    for x in x0.min(max_x)..=x1 {
                        consider(x, y);
                    }
                }
            }
        }
    }

    Ok(match clusters.len() {
        0 => Matches::None,
        1 => Matches::One(clusters[0].1),
        count => Matches::Many(count),
    })
}

/// Clusters are (seed, best) pairs; distance is measured from the seed
fn add_to_clusters(clusters: &mut Vec<(Hit, Hit)>, hit: Hit) {
    let near = clusters.iter_mut().find(|(seed, _)| {
        seed.x.abs_diff(hit.x) < CLUSTER_DISTANCE && seed.y.abs_diff(hit.y) < CLUSTER_DISTANCE
    });
    match near {
        Some((_, best)) => {
            // Refined neighbourhoods overlap, so a hit can come round twice
            if hit.score > best.score {
                *best = hit;
            }
        }
        None => clusters.push((hit, hit)),
    }
}

/// Shrink factor for a template of this size, 1 meaning no coarse pass
fn shrink_factor(width: u32, height: u32) -> u32 {
    let mut factor = 1;
    while factor < MAX_FACTOR
        && width / (factor * 2) >= MIN_COARSE_SIDE
        && height / (factor * 2) >= MIN_COARSE_SIDE
    {
        factor *= 2;
    }
    factor
}

/// `image` averaged down by `factor`, dropping the partial cells at the
/// right and bottom edges
fn shrink(image: &GrayImage, factor: u32) -> GrayImage {
    let (w, h) = (image.width() / factor, image.height() / factor);
    let whole = imageops::crop_imm(image, 0, 0, w * factor, h * factor);
    imageops::blur(&imageops::thumbnail(&*whole, w, h), COARSE_BLUR)
}

/// Shrunk screen and template
struct Coarse {
    factor: u32,
    screen: GrayImage,
    template: GrayImage,
}

impl Coarse {
    /// `None` when the template is too small (or too plain) to shrink
    fn new(screen: &GrayImage, template: &GrayImage, flat: bool) -> Option<Self> {
        if flat {
            return None;
        }

        let mut factor = shrink_factor(template.width(), template.height());
        while factor > 1 {
            let small = shrink(template, factor);
            // Fine detail can average out; try a smaller factor
            if !Correlation::new(&small, &small).is_flat() {
                return Some(Self {
                    factor,
                    screen: shrink(screen, factor),
                    template: small,
                });
            }
            factor /= 2;
        }
        None
    }

    /// Coarse placements worth refining, best first
    fn candidates(&self, threshold: f64) -> Vec<(u32, u32)> {
        let (sw, sh) = self.screen.dimensions();
        let (tw, th) = self.template.dimensions();
        if tw > sw || th > sh {
            return Vec::new();
        }

        let correlation = Correlation::new(&self.screen, &self.template);
        let mut scored = Vec::new();
        for y in 0..=(sh - th) {
            for x in 0..=(sw - tw) {
                scored.push((correlation.score(x, y), x, y));
            }
        }
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));

        let mut picked: Vec<(u32, u32)> = Vec::new();
        for (score, x, y) in scored {
            if picked.len() >= MAX_CANDIDATES || (picked.len() >= MIN_CANDIDATES && score < threshold) {
                break;
            }
            // Neighbouring cells are refined together
            if picked.iter().any(|&(px, py)| px.abs_diff(x) <= 1 && py.abs_diff(y) <= 1) {
                continue;
            }
            picked.push((x, y));
        }
        picked
    }
}

/// Template statistics plus screen sums, for scoring single placements
struct Correlation<'a> {
    pixels: &'a [u8],
    stride: usize,
    table: SumTable,
    /// Template pixels minus the template mean, row-major
    centered: Vec<f64>,
    template_mean: f64,
    /// Sum of squares of `centered`
    template_ss: f64,
    n: f64,
    width: u32,
    height: u32,
}

impl<'a> Correlation<'a> {
    fn new(screen: &'a GrayImage, template: &GrayImage) -> Self {
        let (width, height) = template.dimensions();
        let n = f64::from(width) * f64::from(height);

        let template_mean = template.as_raw().iter().map(|&p| f64::from(p)).sum::<f64>() / n;
        let centered: Vec<f64> = template
            .as_raw()
            .iter()
            .map(|&p| f64::from(p) - template_mean)
            .collect();
        let template_ss = centered.iter().map(|v| v * v).sum();

        Self {
            pixels: screen.as_raw(),
            stride: screen.width() as usize,
            table: SumTable::new(screen),
            centered,
            template_mean,
            template_ss,
            n,
            width,
            height,
        }
    }

    fn is_flat(&self) -> bool {
        self.template_ss <= EPSILON
    }

    /// Correlation of the template placed with its top-left corner at (`x`, `y`)
    fn score(&self, x: u32, y: u32) -> f64 {
        let (sum, sum_sq) = self.table.window(x, y, self.width, self.height);
        let window_ss = (sum_sq - sum * sum / self.n).max(0.0);

        if self.is_flat() {
            // Flat template: only a flat window of the same shade matches
            return if window_ss <= EPSILON && (sum / self.n - self.template_mean).abs() < 1.0 {
                1.0
            } else {
                0.0
            };
        }
        if window_ss <= EPSILON {
            return 0.0;
        }

        let tw = self.width as usize;
        let mut num = 0.0;
        for j in 0..self.height as usize {
            let row = (y as usize + j) * self.stride + x as usize;
            let screen_row = &self.pixels[row..row + tw];
            let template_row = &self.centered[j * tw..(j + 1) * tw];
            num += screen_row
                .iter()
                .zip(template_row)
                .map(|(&p, &t)| f64::from(p) * t)
                .sum::<f64>();
        }
        num / (self.template_ss * window_ss).sqrt()
    }
}

/// Summed-area tables of pixel values and squared pixel values
struct SumTable {
    width: usize,
    sums: Vec<f64>,
    squares: Vec<f64>,
}

impl SumTable {
    fn new(image: &GrayImage) -> Self {
        let (w, h) = image.dimensions();
        let width = w as usize + 1;
        let height = h as usize + 1;
        let mut sums = vec![0.0; width * height];
        let mut squares = vec![0.0; width * height];

        for (y, row) in image.as_raw().chunks_exact(w.max(1) as usize).enumerate().take(h as usize) {
            let mut row_sum = 0.0;
            let mut row_sq = 0.0;
            for (x, &p) in row.iter().enumerate() {
                let v = f64::from(p);
                row_sum += v;
                row_sq += v * v;
                let idx = (y + 1) * width + (x + 1);
                sums[idx] = sums[idx - width] + row_sum;
                squares[idx] = squares[idx - width] + row_sq;
            }
        }

        Self {
            width,
            sums,
            squares,
        }
    }

    /// (sum, sum of squares) of the `w` x `h` window at (`x`, `y`)
    fn window(&self, x: u32, y: u32, w: u32, h: u32) -> (f64, f64) {
        let (x0, y0) = (x as usize, y as usize);
        let (x1, y1) = (x0 + w as usize, y0 + h as usize);
        let at = |table: &[f64], x: usize, y: usize| table[y * self.width + x];
        let rect = |table: &[f64]| at(table, x1, y1) - at(table, x0, y1) - at(table, x1, y0) + at(table, x0, y0);
        (rect(&self.sums), rect(&self.squares))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{imageops, Luma};

    fn noise(width: u32, height: u32, seed: u32) -> GrayImage {
        let mut state = seed;
        GrayImage::from_fn(width, height, |_, _| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            Luma([(state >> 24) as u8])
        })
    }

    #[test]
    fn test_finds_template_at_exact_offset() {
        let screen = noise(80, 60, 0x9E37_79B9);
        let template = imageops::crop_imm(&screen, 23, 17, 12, 10).to_image();

        match find("button", &screen, &template, 0.8).unwrap() {
            Matches::One(hit) => {
                assert_eq!((hit.x, hit.y), (23, 17));
                assert!(hit.score > 0.999, "score {}", hit.score);
            }
            other => panic!("Expected one match, got {other:?}"),
        }
    }

    #[test]
    fn test_brightness_shift_still_matches() {
        let screen = noise(64, 48, 7);
        let mut template = imageops::crop_imm(&screen, 5, 30, 12, 10).to_image();
        for p in template.pixels_mut() {
            p.0[0] = p.0[0] / 2 + 40;
        }

        assert!(matches!(
            find("dimmed", &screen, &template, 0.8).unwrap(),
            Matches::One(Hit { x: 5, y: 30, .. })
        ));
    }

    #[test]
    fn test_absent_template_is_none() {
        let screen = noise(80, 60, 12345);
        let template = noise(12, 10, 777);
        assert_eq!(find("other", &screen, &template, 0.8).unwrap(), Matches::None);
    }

    #[test]
    fn test_duplicated_template_is_ambiguous() {
        let mut screen = noise(100, 60, 42);
        let template = noise(12, 10, 4242);
        imageops::replace(&mut screen, &template, 10, 10);
        imageops::replace(&mut screen, &template, 60, 40);

        assert_eq!(find("twice", &screen, &template, 0.8).unwrap(), Matches::Many(2));
    }

    #[test]
    fn test_flat_template_matches_flat_block_only() {
        let mut screen = noise(50, 50, 99);
        let block = GrayImage::from_pixel(6, 6, Luma([10]));
        imageops::replace(&mut screen, &block, 20, 20);

        assert!(matches!(
            find("flat", &screen, &block, 0.8).unwrap(),
            Matches::One(Hit { x: 20, y: 20, .. })
        ));

        let lighter = GrayImage::from_pixel(6, 6, Luma([200]));
        assert_eq!(find("flat", &screen, &lighter, 0.8).unwrap(), Matches::None);
    }

    #[test]
    fn test_template_larger_than_screen() {
        let screen = noise(10, 10, 1);
        let template = noise(11, 4, 2);
        let err = find("huge", &screen, &template, 0.8).unwrap_err();
        assert!(matches!(err, Error::TemplateTooLarge { .. }));
        assert!(err.to_string().contains("11x4"));
    }

    #[test]
    fn test_full_hd_lookup_is_fast() {
        let screen = noise(1920, 1080, 0x2545_F491);
        let template = imageops::crop_imm(&screen, 900, 500, 120, 40).to_image();

        let started = std::time::Instant::now();
        let found = find("btn", &screen, &template, 0.8).unwrap();
        let elapsed = started.elapsed();

        match found {
            Matches::One(hit) => assert_eq!((hit.x, hit.y), (900, 500)),
            other => panic!("Expected one match, got {other:?}"),
        }
        // Several lookups fit into the default wait, even unoptimized
        assert!(elapsed < std::time::Duration::from_secs(5), "lookup took {elapsed:?}");
    }

    #[test]
    fn test_coarse_pass_finds_misaligned_match() {
        let screen = imageops::blur(&noise(400, 300, 31337), 1.0);
        let template = imageops::crop_imm(&screen, 201, 121, 48, 32).to_image();
        assert_eq!(shrink_factor(48, 32), 4);

        match find("icon", &screen, &template, 0.8).unwrap() {
            Matches::One(hit) => {
                assert_eq!((hit.x, hit.y), (201, 121));
                assert!(hit.score > 0.999, "score {}", hit.score);
            }
            other => panic!("Expected one match, got {other:?}"),
        }
    }

    #[test]
    fn test_coarse_pass_reports_duplicates() {
        let mut screen = imageops::blur(&noise(320, 200, 5), 1.0);
        let template = imageops::blur(&noise(40, 24, 6), 1.0);
        imageops::replace(&mut screen, &template, 31, 21);
        imageops::replace(&mut screen, &template, 249, 151);

        assert_eq!(find("twice", &screen, &template, 0.8).unwrap(), Matches::Many(2));
    }

    #[test]
    fn test_shrink_factor_keeps_coarse_template_usable() {
        assert_eq!(shrink_factor(12, 10), 1);
        assert_eq!(shrink_factor(16, 12), 1);
        assert_eq!(shrink_factor(16, 16), 2);
        assert_eq!(shrink_factor(40, 24), 2);
        assert_eq!(shrink_factor(120, 40), 4);
        assert_eq!(shrink_factor(400, 300), MAX_FACTOR);
    }

    #[test]
    fn test_nearby_hits_cluster() {
        let mut clusters = Vec::new();
        add_to_clusters(&mut clusters, Hit { x: 10, y: 10, score: 0.85 });
        add_to_clusters(&mut clusters, Hit { x: 12, y: 11, score: 0.95 });
        add_to_clusters(&mut clusters, Hit { x: 14, y: 10, score: 0.90 });

        assert_eq!(clusters.len(), 2);
        assert_eq!((clusters[0].1.x, clusters[0].1.y), (12, 11));
    }
}
