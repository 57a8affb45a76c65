//! Color normalizer — rewrites wide-gamut color values on a realized tree into sRGB.
//!
//! Resolution goes through a real raster surface: the converted color is painted onto a
//! 1×1 tiny-skia pixmap and read back, so the stored value is exactly what the
//! rasterizer itself would produce for that fill. The probe surface is created lazily,
//! once per thread.

use std::cell::RefCell;

use serde::{Deserialize, Serialize};
use tiny_skia::{Color, Pixmap};
use tracing::debug;

use crate::render::style::{BackgroundImage, ComputedStyle, CssColor, Rgba};
use crate::render::tree::VisualTree;

thread_local! {
    static PROBE: RefCell<Option<Pixmap>> = const { RefCell::new(None) };
}

/// How wide-gamut colors reach the rasterizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorStrategy {
    /// Rewrite the realized tree to sRGB before capture.
    #[default]
    Normalize,
    /// Skip normalization; the rasterizer resolves wide-gamut values itself.
    Native,
}

impl ColorStrategy {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "normalize" => Some(ColorStrategy::Normalize),
            "native" => Some(ColorStrategy::Native),
            _ => None,
        }
    }
}

/// Counts of what one normalization pass changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NormalizeReport {
    pub nodes_visited: usize,
    pub colors_rewritten: usize,
    pub gradients_rewritten: usize,
    pub backgrounds_dropped: usize,
}

impl NormalizeReport {
    pub fn changed(&self) -> bool {
        self.colors_rewritten + self.gradients_rewritten + self.backgrounds_dropped > 0
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Conversion
// ────────────────────────────────────────────────────────────────────────────

fn oklch_to_oklab(l: f32, c: f32, h: f32) -> (f32, f32, f32) {
    let h = h.to_radians();
    (l, c * h.cos(), c * h.sin())
}

/// OKLab to gamma-encoded sRGB, clipped to the sRGB gamut.
fn oklab_to_srgb(l: f32, a: f32, b: f32) -> [f32; 3] {
    let l_ = l + 0.396_337_78 * a + 0.215_803_76 * b;
    let m_ = l - 0.105_561_346 * a - 0.063_854_17 * b;
    let s_ = l - 0.089_484_18 * a - 1.291_485_5 * b;

    let (l3, m3, s3) = (l_ * l_ * l_, m_ * m_ * m_, s_ * s_ * s_);

    let linear = [
        4.076_741_7 * l3 - 3.307_711_6 * m3 + 0.230_969_94 * s3,
        -1.268_438 * l3 + 2.609_757_4 * m3 - 0.341_319_38 * s3,
        -0.004_196_086_3 * l3 - 0.703_418_6 * m3 + 1.707_614_7 * s3,
    ];
    linear.map(|v| gamma_encode(v.clamp(0.0, 1.0)))
}

fn gamma_encode(v: f32) -> f32 {
    if v <= 0.003_130_8 {
        12.92 * v
    } else {
        1.055 * v.powf(1.0 / 2.4) - 0.055
    }
}

fn quantize(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Paints `rgba` on the probe surface and reads the pixel back.
fn probe(rgb: [f32; 3], alpha: f32) -> Rgba {
    let fallback = Rgba {
        r: quantize(rgb[0]),
        g: quantize(rgb[1]),
        b: quantize(rgb[2]),
        a: quantize(alpha),
    };
    let Some(color) = Color::from_rgba(rgb[0], rgb[1], rgb[2], alpha.clamp(0.0, 1.0)) else {
        return fallback;
    };
    PROBE.with(|cell| {
        let mut slot = cell.borrow_mut();
        if slot.is_none() {
            *slot = Pixmap::new(1, 1);
        }
        let Some(pixmap) = slot.as_mut() else {
            return fallback;
        };
        pixmap.fill(color);
        match pixmap.pixel(0, 0) {
            Some(pixel) => {
                let c = pixel.demultiply();
                Rgba {
                    r: c.red(),
                    g: c.green(),
                    b: c.blue(),
                    a: c.alpha(),
                }
            }
            None => fallback,
        }
    })
}

/// Resolves any supported color syntax to 8-bit sRGB.
pub fn resolve(color: &CssColor) -> Rgba {
    match *color {
        CssColor::Srgb(rgba) => rgba,
        CssColor::Oklch { l, c, h, alpha } => {
            let (l, a, b) = oklch_to_oklab(l, c, h);
            probe(oklab_to_srgb(l, a, b), alpha)
        }
        CssColor::Oklab { l, a, b, alpha } => probe(oklab_to_srgb(l, a, b), alpha),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tree walk
// ────────────────────────────────────────────────────────────────────────────

/// Returns the normalized version of `style`, or `None` when nothing needs rewriting.
fn normalize_style(style: &ComputedStyle, report: &mut NormalizeReport) -> Option<ComputedStyle> {
    if !style.has_wide_gamut() {
        return None;
    }
    let mut next = style.clone();
    for (property, slot) in next.color_slots_mut() {
        if slot.is_wide_gamut() {
            let resolved = CssColor::Srgb(resolve(slot));
            debug!(property, from = %slot, to = %resolved, "Rewrote color");
            *slot = resolved;
            report.colors_rewritten += 1;
        }
    }
    next.background_image = match std::mem::take(&mut next.background_image) {
        BackgroundImage::LinearGradient { stops } if stops.iter().any(CssColor::is_wide_gamut) => {
            report.gradients_rewritten += 1;
            BackgroundImage::LinearGradient {
                stops: stops.iter().map(|s| CssColor::Srgb(resolve(s))).collect(),
            }
        }
        BackgroundImage::Raw { value } if BackgroundImage::raw_has_wide_gamut(&value) => {
            debug!(value = %value, "Dropped background-image with wide-gamut color");
            report.backgrounds_dropped += 1;
            BackgroundImage::None
        }
        other => other,
    };
    Some(next)
}

/// Rewrites every wide-gamut color on every node of `tree`.
///
/// Visits each node exactly once and only writes styles that change, so a second pass
/// over the same tree leaves it (and its layout epoch) untouched.
pub fn normalize_tree(tree: &mut VisualTree) -> NormalizeReport {
    let mut report = NormalizeReport::default();
    for id in tree.descendants(tree.root()) {
        report.nodes_visited += 1;
        if let Some(style) = normalize_style(&tree.node(id).style, &mut report) {
            *tree.style_mut(id) = style;
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::resume::ResumeData;
    use crate::render::layout::{palette, render_preview, LayoutConfig};
    use crate::render::tree::{NodeKind, Rect, Tag};

    fn close(a: Rgba, b: Rgba) -> bool {
        let d = |x: u8, y: u8| (x as i16 - y as i16).abs() <= 2;
        d(a.r, b.r) && d(a.g, b.g) && d(a.b, b.b) && a.a == b.a
    }

    #[test]
    fn test_parse_strategy() {
        assert_eq!(ColorStrategy::parse(" Native "), Some(ColorStrategy::Native));
        assert_eq!(ColorStrategy::parse("normalize"), Some(ColorStrategy::Normalize));
        assert_eq!(ColorStrategy::parse("p3"), None);
    }

    #[test]
    fn test_resolve_extremes() {
        assert_eq!(resolve(&CssColor::oklch(1.0, 0.0, 0.0)), Rgba::WHITE);
        assert_eq!(resolve(&CssColor::oklch(0.0, 0.0, 0.0)), Rgba::BLACK);
    }

    #[test]
    fn test_resolve_known_values() {
        // oklch(0.628 0.2577 29.23) is sRGB red
        let red = resolve(&CssColor::oklch(0.628, 0.2577, 29.23));
        assert!(close(red, Rgba::opaque(255, 0, 0)), "got {red:?}");
        // gray-300 of the preview palette
        let gray = resolve(&palette::GRAY_300);
        assert!(close(gray, Rgba::opaque(209, 213, 220)), "got {gray:?}");
    }

    #[test]
    fn test_resolve_keeps_alpha() {
        let c = resolve(&CssColor::Oklab {
            l: 1.0,
            a: 0.0,
            b: 0.0,
            alpha: 0.0,
        });
        assert_eq!(c.a, 0);
    }

    #[test]
    fn test_normalizes_every_node() {
        let mut tree = render_preview(&crate::render::layout::tests::sample_resume(), &LayoutConfig::default());
        let report = normalize_tree(&mut tree);
        assert_eq!(report.nodes_visited, tree.len());
        assert!(report.colors_rewritten > 0);
        for id in tree.descendants(tree.root()) {
            assert!(!tree.node(id).style.has_wide_gamut(), "node {id:?} still wide-gamut");
        }
    }

    #[test]
    fn test_normalization_is_idempotent() {
        let mut tree = render_preview(&crate::render::layout::tests::sample_resume(), &LayoutConfig::default());
        normalize_tree(&mut tree);
        let after_first = tree.clone();
        let epoch = tree.epoch();
        let second = normalize_tree(&mut tree);
        assert!(!second.changed());
        assert_eq!(tree.epoch(), epoch, "second pass must not mutate");
        assert_eq!(tree, after_first);
    }

    #[test]
    fn test_background_images() {
        let mut tree = render_preview(&ResumeData::default(), &LayoutConfig::default());
        let root = tree.root();
        let element = NodeKind::Element {
            tag: Tag::Block,
            href: None,
        };
        let gradient = tree.push(root, element.clone(), ComputedStyle::default(), Rect::default());
        tree.style_mut(gradient).background_image = BackgroundImage::LinearGradient {
            stops: vec![palette::BLUE_600, CssColor::rgb(255, 255, 255)],
        };
        let raw = tree.push(root, element.clone(), ComputedStyle::default(), Rect::default());
        tree.style_mut(raw).background_image = BackgroundImage::Raw {
            value: "radial-gradient(oklch(0.9 0.1 20), transparent)".into(),
        };
        let url = tree.push(root, element, ComputedStyle::default(), Rect::default());
        tree.style_mut(url).background_image = BackgroundImage::Raw {
            value: "url(avatar.png)".into(),
        };

        let report = normalize_tree(&mut tree);
        assert_eq!(report.gradients_rewritten, 1);
        assert_eq!(report.backgrounds_dropped, 1);
        assert_eq!(tree.node(raw).style.background_image, BackgroundImage::None);
        assert!(matches!(
            tree.node(url).style.background_image,
            BackgroundImage::Raw { .. }
        ));
        match &tree.node(gradient).style.background_image {
            BackgroundImage::LinearGradient { stops } => {
                assert!(stops.iter().all(|s| !s.is_wide_gamut()))
            }
            other => panic!("gradient lost: {other:?}"),
        }
    }
}
