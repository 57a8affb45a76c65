//! Resolved style values carried by every visual-tree node.
//!
//! Styles are stored fully resolved: no inheritance, no symbolic references. Colors are
//! the one exception: they may still be in a wide-gamut space until the color normalizer
//! (or a wide-gamut-capable rasterizer) deals with them.

use std::fmt;

use serde::{Deserialize, Serialize};

/// 8-bit sRGB color with straight alpha.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const WHITE: Rgba = Rgba::opaque(255, 255, 255);
    pub const BLACK: Rgba = Rgba::opaque(0, 0, 0);
    pub const TRANSPARENT: Rgba = Rgba {
        r: 0,
        g: 0,
        b: 0,
        a: 0,
    };

    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Rgba { r, g, b, a: 255 }
    }

    pub fn is_transparent(&self) -> bool {
        self.a == 0
    }
}

/// A CSS color value in one of the syntaxes the preview styling can produce.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "space", rename_all = "snake_case")]
pub enum CssColor {
    Srgb(Rgba),
    /// Lightness 0–1, chroma, hue in degrees.
    Oklch { l: f32, c: f32, h: f32, alpha: f32 },
    Oklab { l: f32, a: f32, b: f32, alpha: f32 },
}

impl CssColor {
    pub const TRANSPARENT: CssColor = CssColor::Srgb(Rgba::TRANSPARENT);

    #[cfg(test)]
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        CssColor::Srgb(Rgba::opaque(r, g, b))
    }

    pub const fn oklch(l: f32, c: f32, h: f32) -> Self {
        CssColor::Oklch {
            l,
            c,
            h,
            alpha: 1.0,
        }
    }

    /// True for syntaxes a plain sRGB rasterizer cannot consume.
    pub fn is_wide_gamut(&self) -> bool {
        !matches!(self, CssColor::Srgb(_))
    }

    pub fn is_transparent(&self) -> bool {
        match self {
            CssColor::Srgb(rgba) => rgba.is_transparent(),
            CssColor::Oklch { alpha, .. } | CssColor::Oklab { alpha, .. } => *alpha <= 0.0,
        }
    }
}

impl fmt::Display for CssColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CssColor::Srgb(c) if c.a == 255 => write!(f, "rgb({}, {}, {})", c.r, c.g, c.b),
            CssColor::Srgb(c) => write!(
                f,
                "rgba({}, {}, {}, {:.3})",
                c.r,
                c.g,
                c.b,
                c.a as f32 / 255.0
            ),
            CssColor::Oklch { l, c, h, alpha } => {
                write!(f, "oklch({:.1}% {c} {h} / {alpha})", l * 100.0)
            }
            CssColor::Oklab { l, a, b, alpha } => {
                write!(f, "oklab({:.1}% {a} {b} / {alpha})", l * 100.0)
            }
        }
    }
}

/// `background-image` as computed on a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackgroundImage {
    #[default]
    None,
    /// Top-to-bottom linear gradient with evenly spaced stops.
    LinearGradient { stops: Vec<CssColor> },
    /// An expression kept verbatim (urls, layered or exotic gradients).
    Raw { value: String },
}

impl BackgroundImage {
    /// Whether a verbatim expression embeds a wide-gamut color function.
    pub fn raw_has_wide_gamut(value: &str) -> bool {
        let lower = value.to_ascii_lowercase();
        lower.contains("oklch(") || lower.contains("oklab(")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Edges {
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
    pub left: f32,
}

impl Edges {
    pub const fn bottom(width: f32) -> Self {
        Edges {
            top: 0.0,
            right: 0.0,
            bottom: width,
            left: 0.0,
        }
    }
}

/// Fully resolved style of a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComputedStyle {
    pub color: CssColor,
    pub background_color: CssColor,
    pub border_top_color: CssColor,
    pub border_right_color: CssColor,
    pub border_bottom_color: CssColor,
    pub border_left_color: CssColor,
    pub outline_color: CssColor,
    pub caret_color: CssColor,
    pub column_rule_color: CssColor,
    pub background_image: BackgroundImage,
    pub border_width: Edges,
    pub font_size: f32,
    /// Absolute line height in px.
    pub line_height: f32,
    pub font_weight: u16,
    pub italic: bool,
    pub letter_spacing: f32,
}

impl Default for ComputedStyle {
    fn default() -> Self {
        ComputedStyle {
            color: CssColor::Srgb(Rgba::BLACK),
            background_color: CssColor::TRANSPARENT,
            border_top_color: CssColor::TRANSPARENT,
            border_right_color: CssColor::TRANSPARENT,
            border_bottom_color: CssColor::TRANSPARENT,
            border_left_color: CssColor::TRANSPARENT,
            outline_color: CssColor::TRANSPARENT,
            caret_color: CssColor::TRANSPARENT,
            column_rule_color: CssColor::TRANSPARENT,
            background_image: BackgroundImage::None,
            border_width: Edges::default(),
            font_size: 16.0,
            line_height: 24.0,
            font_weight: 400,
            italic: false,
            letter_spacing: 0.0,
        }
    }
}

impl ComputedStyle {
    pub fn is_bold(&self) -> bool {
        self.font_weight >= 600
    }

    /// Every color-bearing property, by CSS name.
    pub fn color_slots(&self) -> [(&'static str, &CssColor); 9] {
        [
            ("color", &self.color),
            ("background-color", &self.background_color),
            ("border-top-color", &self.border_top_color),
            ("border-right-color", &self.border_right_color),
            ("border-bottom-color", &self.border_bottom_color),
            ("border-left-color", &self.border_left_color),
            ("outline-color", &self.outline_color),
            ("caret-color", &self.caret_color),
            ("column-rule-color", &self.column_rule_color),
        ]
    }

    pub fn color_slots_mut(&mut self) -> [(&'static str, &mut CssColor); 9] {
        [
            ("color", &mut self.color),
            ("background-color", &mut self.background_color),
            ("border-top-color", &mut self.border_top_color),
            ("border-right-color", &mut self.border_right_color),
            ("border-bottom-color", &mut self.border_bottom_color),
            ("border-left-color", &mut self.border_left_color),
            ("outline-color", &mut self.outline_color),
            ("caret-color", &mut self.caret_color),
            ("column-rule-color", &mut self.column_rule_color),
        ]
    }

    pub fn has_wide_gamut(&self) -> bool {
        self.color_slots().iter().any(|(_, c)| c.is_wide_gamut())
            || match &self.background_image {
                BackgroundImage::LinearGradient { stops } => stops.iter().any(|c| c.is_wide_gamut()),
                BackgroundImage::Raw { value } => BackgroundImage::raw_has_wide_gamut(value),
                BackgroundImage::None => false,
            }
    }
}
