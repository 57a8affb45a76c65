//! Rasterizer adapter — paints a realized visual tree into an opaque RGB bitmap.
//!
//! The output is the tree's content box multiplied by a device scale clamped to `[2, 3]`.
//! Painting always starts from an opaque white backdrop. Rasterization is CPU-bound and
//! is run on a blocking worker by the export orchestrator.

use thiserror::Error;
use tiny_skia::{
    Color, FillRule, GradientStop, LinearGradient, Paint, Pixmap, Point, Rect as SkRect, SpreadMode,
    Transform,
};
use tracing::debug;

use crate::render::color::{self, ColorStrategy};
use crate::render::font_metrics::{get_metrics, FontFamily, TextMeasure};
use crate::render::glyphs::{self, FontBook};
use crate::render::host::RealizedTree;
use crate::render::style::{BackgroundImage, ComputedStyle, CssColor};
use crate::render::tree::{Node, NodeKind, Rect};

pub const MIN_DEVICE_SCALE: f32 = 2.0;
pub const MAX_DEVICE_SCALE: f32 = 3.0;

/// Clamps an ambient device-pixel ratio into the deterministic print range.
pub fn resolve_device_scale(ambient: f32) -> f32 {
    if ambient.is_finite() {
        ambient.clamp(MIN_DEVICE_SCALE, MAX_DEVICE_SCALE)
    } else {
        MIN_DEVICE_SCALE
    }
}

#[derive(Debug, Error)]
pub enum RasterError {
    #[error("target has zero size ({width}x{height})")]
    ZeroSize { width: f32, height: f32 },

    #[error("unsupported color {value} in {property}")]
    UnsupportedColor { property: &'static str, value: String },

    #[error("cannot allocate a {width}x{height} surface")]
    Surface { width: u32, height: u32 },

    #[error("raster worker stopped: {0}")]
    Interrupted(String),

    #[error("layout changed between capture passes (bitmap epoch {bitmap}, extraction epoch {extraction})")]
    LayoutMoved { bitmap: u64, extraction: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterOptions {
    /// Device pixels per CSS px, already clamped.
    pub scale: f32,
    pub color_strategy: ColorStrategy,
    pub font: FontFamily,
}

/// Opaque 8-bit RGB pixels, row-major, no padding.
#[derive(Debug, Clone, PartialEq)]
pub struct Bitmap {
    pub width: u32,
    pub height: u32,
    pub rgb: Vec<u8>,
    /// Layout epoch of the tree this was captured from.
    pub epoch: u64,
}

impl Bitmap {
    #[cfg(test)]
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = ((y * self.width + x) * 3) as usize;
        Some([self.rgb[i], self.rgb[i + 1], self.rgb[i + 2]])
    }
}

pub trait Rasterizer: Send + Sync {
    fn rasterize(&self, target: &RealizedTree, opts: &RasterOptions) -> Result<Bitmap, RasterError>;
}

// ────────────────────────────────────────────────────────────────────────────
// tiny-skia implementation
// ────────────────────────────────────────────────────────────────────────────

pub struct TinySkiaRasterizer {
    fonts: &'static FontBook,
}

impl TinySkiaRasterizer {
    pub fn new() -> Self {
        TinySkiaRasterizer {
            fonts: FontBook::system(),
        }
    }

    pub fn with_fonts(fonts: &'static FontBook) -> Self {
        TinySkiaRasterizer { fonts }
    }
}

impl Default for TinySkiaRasterizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Rasterizer for TinySkiaRasterizer {
    fn rasterize(&self, target: &RealizedTree, opts: &RasterOptions) -> Result<Bitmap, RasterError> {
        let (width, height) = target.measured_size();
        if !(width > 0.0 && height > 0.0) {
            return Err(RasterError::ZeroSize { width, height });
        }
        let px_width = (width * opts.scale).ceil() as u32;
        let px_height = (height * opts.scale).ceil() as u32;
        let mut pixmap = Pixmap::new(px_width, px_height).ok_or(RasterError::Surface {
            width: px_width,
            height: px_height,
        })?;
        pixmap.fill(Color::WHITE);

        let painter = Painter {
            opts,
            fonts: self.fonts,
            transform: Transform::from_scale(opts.scale, opts.scale),
        };
        let tree = &target.tree;
        for id in tree.descendants(tree.root()) {
            painter.paint_node(&mut pixmap, tree.node(id))?;
        }

        let rgb = pixmap
            .pixels()
            .iter()
            .flat_map(|p| {
                let c = p.demultiply();
                [c.red(), c.green(), c.blue()]
            })
            .collect();
        debug!(
            id = %target.id,
            origin = ?target.origin,
            width = px_width,
            height = px_height,
            scale = opts.scale,
            "Rasterized visual tree"
        );
        Ok(Bitmap {
            width: px_width,
            height: px_height,
            rgb,
            epoch: target.epoch(),
        })
    }
}

struct Painter<'a> {
    opts: &'a RasterOptions,
    fonts: &'static FontBook,
    transform: Transform,
}

impl Painter<'_> {
    /// Resolves a color for painting. `None` means nothing to paint.
    fn color(&self, property: &'static str, value: &CssColor) -> Result<Option<Color>, RasterError> {
        if value.is_wide_gamut() && self.opts.color_strategy == ColorStrategy::Normalize {
            return Err(RasterError::UnsupportedColor {
                property,
                value: value.to_string(),
            });
        }
        if value.is_transparent() {
            return Ok(None);
        }
        let c = color::resolve(value);
        Ok(Some(Color::from_rgba8(c.r, c.g, c.b, c.a)))
    }

    fn check_style(&self, style: &ComputedStyle) -> Result<(), RasterError> {
        if self.opts.color_strategy == ColorStrategy::Native {
            return Ok(());
        }
        for (property, value) in style.color_slots() {
            self.color(property, value)?;
        }
        if let BackgroundImage::Raw { value } = &style.background_image {
            if BackgroundImage::raw_has_wide_gamut(value) {
                return Err(RasterError::UnsupportedColor {
                    property: "background-image",
                    value: value.clone(),
                });
            }
        }
        Ok(())
    }

    fn fill(&self, pixmap: &mut Pixmap, rect: Rect, color: Color) {
        if let Some(r) = SkRect::from_xywh(rect.x, rect.y, rect.width, rect.height) {
            let mut paint = Paint::default();
            paint.set_color(color);
            pixmap.fill_rect(r, &paint, self.transform, None);
        }
    }

    fn paint_node(&self, pixmap: &mut Pixmap, node: &Node) -> Result<(), RasterError> {
        let style = &node.style;
        self.check_style(style)?;
        match &node.kind {
            NodeKind::Element { .. } => self.paint_box(pixmap, node.rect, style),
            NodeKind::Text { text } => {
                if let Some(color) = self.color("color", &style.color)? {
                    self.paint_text(pixmap, node.rect, style, text, color);
                }
                Ok(())
            }
        }
    }

    fn paint_box(&self, pixmap: &mut Pixmap, rect: Rect, style: &ComputedStyle) -> Result<(), RasterError> {
        if rect.is_empty() {
            return Ok(());
        }
        if let Some(bg) = self.color("background-color", &style.background_color)? {
            self.fill(pixmap, rect, bg);
        }
        if let BackgroundImage::LinearGradient { stops } = &style.background_image {
            self.paint_gradient(pixmap, rect, stops)?;
        }

        let b = style.border_width;
        let edges = [
            ("border-top-color", &style.border_top_color, Rect::new(rect.x, rect.y, rect.width, b.top)),
            (
                "border-right-color",
                &style.border_right_color,
                Rect::new(rect.right() - b.right, rect.y, b.right, rect.height),
            ),
            (
                "border-bottom-color",
                &style.border_bottom_color,
                Rect::new(rect.x, rect.bottom() - b.bottom, rect.width, b.bottom),
            ),
            ("border-left-color", &style.border_left_color, Rect::new(rect.x, rect.y, b.left, rect.height)),
        ];
        for (property, color, edge) in edges {
            if edge.is_empty() {
                continue;
            }
            if let Some(c) = self.color(property, color)? {
                self.fill(pixmap, edge, c);
            }
        }
        Ok(())
    }

    fn paint_gradient(&self, pixmap: &mut Pixmap, rect: Rect, stops: &[CssColor]) -> Result<(), RasterError> {
        if stops.is_empty() {
            return Ok(());
        }
        let last = (stops.len() - 1).max(1) as f32;
        let mut gradient_stops = Vec::with_capacity(stops.len());
        for (i, stop) in stops.iter().enumerate() {
            let color = self.color("background-image", stop)?.unwrap_or(Color::TRANSPARENT);
            gradient_stops.push(GradientStop::new(i as f32 / last, color));
        }
        let shader = LinearGradient::new(
            Point::from_xy(rect.x, rect.y),
            Point::from_xy(rect.x, rect.bottom()),
            gradient_stops,
            SpreadMode::Pad,
            Transform::identity(),
        );
        if let (Some(shader), Some(r)) = (shader, SkRect::from_xywh(rect.x, rect.y, rect.width, rect.height)) {
            let paint = Paint {
                shader,
                ..Paint::default()
            };
            pixmap.fill_rect(r, &paint, self.transform, None);
        }
        Ok(())
    }

    fn paint_text(&self, pixmap: &mut Pixmap, rect: Rect, style: &ComputedStyle, text: &str, color: Color) {
        let Some(face) = self
            .fonts
            .face(self.opts.font, style.is_bold(), style.italic)
            .and_then(|loaded| loaded.parse())
        else {
            return;
        };
        let metrics = get_metrics(self.opts.font);
        let measure = TextMeasure {
            font_size: style.font_size,
            bold: style.is_bold(),
            letter_spacing: style.letter_spacing,
        };
        let baseline = glyphs::baseline(&face, rect.y, style.line_height, style.font_size);

        let mut paint = Paint::default();
        paint.set_color(color);
        paint.anti_alias = true;

        let mut x = rect.x;
        for ch in text.chars() {
            if !ch.is_whitespace() {
                if let Some(path) = glyphs::glyph_path(&face, ch, x, baseline, style.font_size) {
                    pixmap.fill_path(&path, &paint, FillRule::Winding, self.transform, None);
                }
            }
            x += metrics.advance_px(ch, &measure);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::render::host::Placement;
    use crate::render::layout::{render_preview, LayoutConfig};
    use crate::render::style::Rgba;
    use crate::render::tree::{Tag, VisualTree};

    fn realized(tree: VisualTree, placement: Placement) -> RealizedTree {
        RealizedTree {
            id: "test".into(),
            tree: Arc::new(tree),
            origin: (0.0, 0.0),
            placement,
        }
    }

    fn options(strategy: ColorStrategy) -> RasterOptions {
        RasterOptions {
            scale: 2.0,
            color_strategy: strategy,
            font: FontFamily::Sans,
        }
    }

    fn blank_page(width: f32, height: f32) -> VisualTree {
        let mut tree = VisualTree::new(ComputedStyle::default(), width);
        tree.rect_mut(tree.root()).height = height;
        tree
    }

    fn rasterizer() -> TinySkiaRasterizer {
        static EMPTY: std::sync::OnceLock<FontBook> = std::sync::OnceLock::new();
        TinySkiaRasterizer::with_fonts(EMPTY.get_or_init(FontBook::empty))
    }

    #[test]
    fn test_device_scale_clamped() {
        assert_eq!(resolve_device_scale(1.0), 2.0);
        assert_eq!(resolve_device_scale(2.5), 2.5);
        assert_eq!(resolve_device_scale(4.0), 3.0);
        assert_eq!(resolve_device_scale(f32::NAN), 2.0);
    }

    #[test]
    fn test_zero_size_rejected() {
        let err = rasterizer()
            .rasterize(&realized(blank_page(100.0, 0.0), Placement::Visible), &options(ColorStrategy::Normalize))
            .unwrap_err();
        assert!(matches!(err, RasterError::ZeroSize { .. }));

        let err = rasterizer()
            .rasterize(&realized(blank_page(100.0, 50.0), Placement::Hidden), &options(ColorStrategy::Normalize))
            .unwrap_err();
        assert!(matches!(err, RasterError::ZeroSize { .. }), "hidden tree measures zero");
    }

    #[test]
    fn test_scaled_dimensions_and_white_backdrop() {
        let bitmap = rasterizer()
            .rasterize(&realized(blank_page(100.5, 40.0), Placement::Visible), &options(ColorStrategy::Normalize))
            .unwrap();
        assert_eq!((bitmap.width, bitmap.height), (201, 80));
        assert_eq!(bitmap.rgb.len(), 201 * 80 * 3);
        assert!(bitmap.rgb.iter().all(|&v| v == 255), "transparent tree must paint white");
    }

    #[test]
    fn test_paints_backgrounds_and_borders() {
        let mut tree = blank_page(100.0, 100.0);
        let root = tree.root();
        let mut style = ComputedStyle {
            background_color: CssColor::rgb(255, 0, 0),
            ..ComputedStyle::default()
        };
        style.border_bottom_color = CssColor::rgb(0, 0, 255);
        style.border_width.bottom = 2.0;
        tree.push(
            root,
            NodeKind::Element {
                tag: Tag::Block,
                href: None,
            },
            style,
            Rect::new(10.0, 10.0, 20.0, 20.0),
        );
        let bitmap = rasterizer()
            .rasterize(&realized(tree, Placement::Visible), &options(ColorStrategy::Normalize))
            .unwrap();
        assert_eq!(bitmap.pixel(30, 30), Some([255, 0, 0]));
        assert_eq!(bitmap.pixel(30, 58), Some([0, 0, 255]), "bottom border at 2x");
        assert_eq!(bitmap.pixel(5, 5), Some([255, 255, 255]));
    }

    #[test]
    fn test_wide_gamut_rejected_without_normalization() {
        let tree = render_preview(&crate::render::layout::tests::sample_resume(), &LayoutConfig::default());
        let err = rasterizer()
            .rasterize(&realized(tree, Placement::Visible), &options(ColorStrategy::Normalize))
            .unwrap_err();
        assert!(matches!(err, RasterError::UnsupportedColor { .. }), "got {err:?}");
    }

    #[test]
    fn test_native_strategy_resolves_wide_gamut() {
        let mut tree = blank_page(10.0, 10.0);
        tree.style_mut(tree.root()).background_color = CssColor::oklch(0.628, 0.2577, 29.23);
        let bitmap = rasterizer()
            .rasterize(&realized(tree, Placement::Visible), &options(ColorStrategy::Native))
            .unwrap();
        let [r, g, b] = bitmap.pixel(0, 0).unwrap();
        let red = Rgba::opaque(255, 0, 0);
        assert!(r >= red.r - 2 && g <= 2 && b <= 2, "got {r},{g},{b}");
    }

    #[test]
    fn test_bitmap_records_epoch() {
        let tree = blank_page(10.0, 10.0);
        let epoch = tree.epoch();
        let bitmap = rasterizer()
            .rasterize(&realized(tree, Placement::Visible), &options(ColorStrategy::Normalize))
            .unwrap();
        assert_eq!(bitmap.epoch, epoch);
    }
}
