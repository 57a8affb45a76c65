//! System font faces for glyph outlines.
//!
//! Faces are discovered once per process through fontdb and parsed on demand with
//! ttf-parser. Only outlines come from the face: horizontal advances always come from
//! the metric table, so painted text lines up with the measured layout.

use std::collections::HashMap;
use std::sync::OnceLock;

use tiny_skia::{Path, PathBuilder};
use tracing::{info, warn};

use crate::render::font_metrics::FontFamily;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct FaceKey {
    family: FontFamily,
    bold: bool,
    italic: bool,
}

/// Raw font bytes plus the face index inside a collection.
pub struct LoadedFace {
    data: Vec<u8>,
    index: u32,
}

impl LoadedFace {
    pub fn parse(&self) -> Option<ttf_parser::Face<'_>> {
        ttf_parser::Face::parse(&self.data, self.index).ok()
    }
}

pub struct FontBook {
    faces: HashMap<FaceKey, LoadedFace>,
}

static SYSTEM_BOOK: OnceLock<FontBook> = OnceLock::new();

impl FontBook {
    /// The process-wide book built from the system font directories.
    pub fn system() -> &'static FontBook {
        SYSTEM_BOOK.get_or_init(|| {
            let mut db = fontdb::Database::new();
            db.load_system_fonts();
            info!(faces = db.len(), "Loaded system font database");
            FontBook::from_database(&db)
        })
    }

    #[cfg(test)]
    /// A book with no faces; text renders as nothing.
    pub fn empty() -> Self {
        FontBook {
            faces: HashMap::new(),
        }
    }

    pub fn from_database(db: &fontdb::Database) -> Self {
        let mut faces = HashMap::new();
        for family in [FontFamily::Sans, FontFamily::Serif] {
            for bold in [false, true] {
                for italic in [false, true] {
                    let key = FaceKey {
                        family,
                        bold,
                        italic,
                    };
                    match load_face(db, key) {
                        Some(face) => {
                            faces.insert(key, face);
                        }
                        None => warn!(
                            ?family,
                            bold, italic, "No system face found; text in this style will not be painted"
                        ),
                    }
                }
            }
        }
        FontBook { faces }
    }

    /// The face for a style, falling back to the upright face of the same weight.
    pub fn face(&self, family: FontFamily, bold: bool, italic: bool) -> Option<&LoadedFace> {
        self.faces
            .get(&FaceKey {
                family,
                bold,
                italic,
            })
            .or_else(|| {
                self.faces.get(&FaceKey {
                    family,
                    bold,
                    italic: false,
                })
            })
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }
}

fn load_face(db: &fontdb::Database, key: FaceKey) -> Option<LoadedFace> {
    let families: &[fontdb::Family<'_>] = match key.family {
        FontFamily::Sans => &[fontdb::Family::Name("Inter"), fontdb::Family::SansSerif],
        FontFamily::Serif => &[fontdb::Family::Name("EB Garamond"), fontdb::Family::Serif],
    };
    let query = fontdb::Query {
        families,
        weight: if key.bold {
            fontdb::Weight::BOLD
        } else {
            fontdb::Weight::NORMAL
        },
        stretch: fontdb::Stretch::Normal,
        style: if key.italic {
            fontdb::Style::Italic
        } else {
            fontdb::Style::Normal
        },
    };
    let id = db.query(&query)?;
    db.with_face_data(id, |data, index| LoadedFace {
        data: data.to_vec(),
        index,
    })
}

// ────────────────────────────────────────────────────────────────────────────
// Outlines
// ────────────────────────────────────────────────────────────────────────────

/// Converts font-unit outline commands into a CSS-px path at a pen position.
struct PathSink {
    builder: PathBuilder,
    x: f32,
    baseline: f32,
    scale: f32,
}

impl PathSink {
    fn map(&self, x: f32, y: f32) -> (f32, f32) {
        (self.x + x * self.scale, self.baseline - y * self.scale)
    }
}

impl ttf_parser::OutlineBuilder for PathSink {
    fn move_to(&mut self, x: f32, y: f32) {
        let (x, y) = self.map(x, y);
        self.builder.move_to(x, y);
    }

    fn line_to(&mut self, x: f32, y: f32) {
        let (x, y) = self.map(x, y);
        self.builder.line_to(x, y);
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        let (x1, y1) = self.map(x1, y1);
        let (x, y) = self.map(x, y);
        self.builder.quad_to(x1, y1, x, y);
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        let (x1, y1) = self.map(x1, y1);
        let (x2, y2) = self.map(x2, y2);
        let (x, y) = self.map(x, y);
        self.builder.cubic_to(x1, y1, x2, y2, x, y);
    }

    fn close(&mut self) {
        self.builder.close();
    }
}

/// Baseline of a line box with the face's own ascent/descent centered in it.
pub fn baseline(face: &ttf_parser::Face<'_>, top: f32, line_height: f32, font_size: f32) -> f32 {
    let scale = font_size / f32::from(face.units_per_em());
    let ascent = f32::from(face.ascender()) * scale;
    let descent = f32::from(face.descender()) * scale;
    top + (line_height - (ascent - descent)) / 2.0 + ascent
}

/// Outline of `ch` with its origin at `(x, baseline)`, in CSS px.
pub fn glyph_path(face: &ttf_parser::Face<'_>, ch: char, x: f32, baseline: f32, font_size: f32) -> Option<Path> {
    let glyph = face.glyph_index(ch)?;
    let mut sink = PathSink {
        builder: PathBuilder::new(),
        x,
        baseline,
        scale: font_size / f32::from(face.units_per_em()),
    };
    face.outline_glyph(glyph, &mut sink)?;
    sink.builder.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_database_yields_empty_book() {
        let book = FontBook::from_database(&fontdb::Database::new());
        assert!(book.is_empty());
        assert!(book.face(FontFamily::Sans, false, false).is_none());
    }

    #[test]
    fn test_system_outline_when_available() {
        let book = FontBook::system();
        let Some(face) = book.face(FontFamily::Sans, false, false).and_then(LoadedFace::parse) else {
            // no system fonts in this environment
            return;
        };
        let base = baseline(&face, 0.0, 15.0, 10.0);
        assert!(base > 0.0 && base < 15.0, "baseline {base} outside line box");
        if let Some(path) = glyph_path(&face, 'H', 0.0, base, 10.0) {
            let bounds = path.bounds();
            assert!(bounds.bottom() <= base + 0.5, "'H' sits on the baseline");
            assert!(bounds.height() > 3.0);
        }
    }
}
