//! PDF composer — places a captured bitmap on A4 pages with link and text overlays.
//!
//! # Page plan
//! The bitmap is scaled to the full page width. When the scaled height fits one page it
//! is centered vertically; otherwise page `k` shows the image shifted up by `k` page
//! heights. In `Slice` mode each page embeds only the rows it shows; in `Tile` mode the
//! full image is embedded once and re-placed on every page, relying on page clipping.
//!
//! # Overlays
//! Link boxes go through the same CSS-px → pt ratio as the image and become URI link
//! annotations on every page they intersect. The optional text layer writes the
//! reading-order lines in 1pt white Helvetica, bottom-up, so image-only pages stay
//! searchable.

use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;
use pdf_writer::types::{ActionType, AnnotationType};
use pdf_writer::{Content, Filter, Finish, Name, Pdf, Rect, Ref, Str, TextStr};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::render::extract::{LinkAnnotation, TextLine};
use crate::render::raster::Bitmap;

/// ISO A4 portrait, in PDF points.
pub const A4_WIDTH_PT: f32 = 595.28;
pub const A4_HEIGHT_PT: f32 = 841.89;

const TEXT_LAYER_SIZE: f32 = 1.0;
const TEXT_LAYER_LEADING: f32 = 1.2;
/// Relative slack when comparing the scaled image height with the page height.
const PAGE_FIT_EPSILON: f32 = 1e-4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaginationMode {
    /// One image slice per page.
    #[default]
    Slice,
    /// The whole image on every page at a decreasing offset.
    Tile,
}

impl PaginationMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "slice" => Some(PaginationMode::Slice),
            "tile" => Some(PaginationMode::Tile),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ComposeError {
    #[error("bitmap has no pixels")]
    EmptyImage,

    #[error("bitmap data is {actual} bytes, expected {expected}")]
    BitmapMismatch { expected: usize, actual: usize },

    #[error("invalid content size {width}x{height}")]
    InvalidGeometry { width: f32, height: f32 },

    #[error("image compression failed: {0}")]
    Encode(#[from] std::io::Error),

    #[error("compose worker stopped: {0}")]
    Interrupted(String),
}

// ────────────────────────────────────────────────────────────────────────────
// Page plan
// ────────────────────────────────────────────────────────────────────────────

/// Top edge of the image on each page, in pt measured downward from the page top.
///
/// Always returns at least one page. Consecutive offsets differ by exactly `page_height`.
pub fn plan_pages(image_height: f32, page_height: f32) -> Vec<f32> {
    if image_height <= page_height * (1.0 + PAGE_FIT_EPSILON) {
        let top = ((page_height - image_height) / 2.0).max(0.0);
        return vec![top];
    }
    let count = ((image_height / page_height) - PAGE_FIT_EPSILON).ceil().max(1.0) as usize;
    (0..count).map(|k| -(k as f32) * page_height).collect()
}

/// Page plan for a bitmap whose rows are `pt_per_px` points tall.
///
/// Drops pages whose row range rounds to nothing, so a bitmap that overshoots the
/// last page by less than half a device pixel never yields an empty slice.
pub fn plan_bitmap_pages(bitmap_height: u32, pt_per_px: f32, page_height: f32) -> Vec<f32> {
    let mut offsets = plan_pages(bitmap_height as f32 * pt_per_px, page_height);
    if offsets.len() > 1 {
        let px_per_pt = 1.0 / pt_per_px;
        offsets.retain(|offset| {
            let (start, end) = slice_rows(bitmap_height, px_per_pt, *offset, page_height);
            end > start
        });
    }
    offsets
}

/// Maps CSS px of the captured tree onto the page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageMapping {
    pub ratio_x: f32,
    pub ratio_y: f32,
    pub page_height: f32,
}

/// A link annotation placed on one page, in PDF user space (origin bottom-left).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlacedLink {
    pub page: usize,
    pub href: String,
    /// `[x1, y1, x2, y2]`
    pub rect: [f32; 4],
}

/// Places every link on each page its box intersects, clipped to that page.
pub fn place_links(links: &[LinkAnnotation], mapping: PageMapping, offsets: &[f32]) -> Vec<PlacedLink> {
    let mut placed = Vec::new();
    for (page, offset) in offsets.iter().enumerate() {
        for link in links {
            let top = link.y * mapping.ratio_y + offset;
            let bottom = top + link.height * mapping.ratio_y;
            if bottom <= 0.0 || top >= mapping.page_height {
                continue;
            }
            let (top, bottom) = (top.max(0.0), bottom.min(mapping.page_height));
            placed.push(PlacedLink {
                page,
                href: link.href.clone(),
                rect: [
                    link.x * mapping.ratio_x,
                    mapping.page_height - bottom,
                    (link.x + link.width) * mapping.ratio_x,
                    mapping.page_height - top,
                ],
            });
        }
    }
    placed
}

/// Splits reading-order lines across pages by where each line lands.
fn lines_per_page<'a>(lines: &'a [TextLine], mapping: PageMapping, offsets: &[f32]) -> Vec<Vec<&'a str>> {
    let mut pages = vec![Vec::new(); offsets.len()];
    for line in lines {
        let page = offsets
            .iter()
            .position(|offset| {
                let y = line.y * mapping.ratio_y + offset;
                (0.0..mapping.page_height).contains(&y)
            })
            .unwrap_or(offsets.len() - 1);
        pages[page].push(line.text.as_str());
    }
    pages
}

/// Encodes text for a WinAnsi standard font. Unmappable characters become `?`.
fn win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c {
            ' '..='~' => c as u8,
            '\u{a0}'..='\u{ff}' => c as u32 as u8,
            '€' => 0x80,
            '…' => 0x85,
            '‘' => 0x91,
            '’' => 0x92,
            '“' => 0x93,
            '”' => 0x94,
            '•' => 0x95,
            '–' => 0x96,
            '—' => 0x97,
            _ => b'?',
        })
        .collect()
}

// ────────────────────────────────────────────────────────────────────────────
// Composition
// ────────────────────────────────────────────────────────────────────────────

pub struct ComposeInput<'a> {
    pub bitmap: &'a Bitmap,
    /// CSS px size of the captured tree.
    pub content_size: (f32, f32),
    pub links: &'a [LinkAnnotation],
    /// Reading-order text; `None` disables the text layer.
    pub lines: Option<&'a [TextLine]>,
    pub pagination: PaginationMode,
    pub title: &'a str,
}

#[derive(Debug, Clone)]
pub struct ComposedPdf {
    pub bytes: Vec<u8>,
    pub pages: usize,
    pub links: Vec<PlacedLink>,
    pub text_lines: usize,
}

fn deflate(data: &[u8]) -> Result<Vec<u8>, ComposeError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

/// Rows `[start, end)` of the bitmap shown on the page at `offset`.
fn slice_rows(rows: u32, px_per_pt: f32, offset: f32, page_height: f32) -> (u32, u32) {
    let start = ((-offset).max(0.0) * px_per_pt).round() as u32;
    let end = (((-offset) + page_height) * px_per_pt).round() as u32;
    (start.min(rows), end.min(rows))
}

struct PageImage {
    id: Ref,
    /// Top edge in pt from the page top, and height in pt.
    top: f32,
    height: f32,
}

pub fn compose(input: &ComposeInput<'_>) -> Result<ComposedPdf, ComposeError> {
    let bitmap = input.bitmap;
    if bitmap.width == 0 || bitmap.height == 0 {
        return Err(ComposeError::EmptyImage);
    }
    let expected = bitmap.width as usize * bitmap.height as usize * 3;
    if bitmap.rgb.len() != expected {
        return Err(ComposeError::BitmapMismatch {
            expected,
            actual: bitmap.rgb.len(),
        });
    }
    let (css_width, css_height) = input.content_size;
    if !(css_width > 0.0 && css_height > 0.0 && css_width.is_finite() && css_height.is_finite()) {
        return Err(ComposeError::InvalidGeometry {
            width: css_width,
            height: css_height,
        });
    }

    let pt_per_px = A4_WIDTH_PT / bitmap.width as f32;
    let image_height = bitmap.height as f32 * pt_per_px;
    let offsets = plan_bitmap_pages(bitmap.height, pt_per_px, A4_HEIGHT_PT);
    let mapping = PageMapping {
        ratio_x: A4_WIDTH_PT / css_width,
        ratio_y: image_height / css_height,
        page_height: A4_HEIGHT_PT,
    };

    let mut alloc = Ref::new(1);
    let catalog_id = alloc.bump();
    let page_tree_id = alloc.bump();
    let info_id = alloc.bump();
    let font_id = alloc.bump();
    let font_name = Name(b"F1");
    let image_name = Name(b"Im1");

    let mut pdf = Pdf::new();
    pdf.catalog(catalog_id).pages(page_tree_id);
    pdf.document_info(info_id)
        .title(TextStr(input.title))
        .producer(TextStr(concat!("folio ", env!("CARGO_PKG_VERSION"))));
    pdf.type1_font(font_id)
        .base_font(Name(b"Helvetica"))
        .encoding_predefined(Name(b"WinAnsiEncoding"));

    // Image XObjects, one per page in slice mode, one shared in tile mode.
    let mut images = Vec::with_capacity(offsets.len());
    match input.pagination {
        PaginationMode::Tile => {
            let id = alloc.bump();
            write_image(&mut pdf, id, bitmap.width, bitmap.height, &bitmap.rgb)?;
            for offset in &offsets {
                images.push(PageImage {
                    id,
                    top: *offset,
                    height: image_height,
                });
            }
        }
        PaginationMode::Slice => {
            let px_per_pt = 1.0 / pt_per_px;
            let row_bytes = bitmap.width as usize * 3;
            for offset in &offsets {
                let (start, end) = if offsets.len() == 1 {
                    (0, bitmap.height)
                } else {
                    slice_rows(bitmap.height, px_per_pt, *offset, A4_HEIGHT_PT)
                };
                if end <= start {
                    return Err(ComposeError::EmptyImage);
                }
                let id = alloc.bump();
                let data = &bitmap.rgb[start as usize * row_bytes..end as usize * row_bytes];
                write_image(&mut pdf, id, bitmap.width, end - start, data)?;
                images.push(PageImage {
                    id,
                    top: offset + start as f32 * pt_per_px,
                    height: (end - start) as f32 * pt_per_px,
                });
            }
        }
    }

    let placed = place_links(input.links, mapping, &offsets);
    let text_pages = input
        .lines
        .map(|lines| lines_per_page(lines, mapping, &offsets))
        .unwrap_or_else(|| vec![Vec::new(); offsets.len()]);
    let capacity = ((A4_HEIGHT_PT - TEXT_LAYER_LEADING) / TEXT_LAYER_LEADING).floor() as usize;

    let mut page_ids = Vec::with_capacity(offsets.len());
    let mut text_lines = 0;
    for (index, image) in images.iter().enumerate() {
        let page_id = alloc.bump();
        let content_id = alloc.bump();
        page_ids.push(page_id);

        let mut content = Content::new();
        content.save_state();
        content.transform([
            A4_WIDTH_PT,
            0.0,
            0.0,
            image.height,
            0.0,
            A4_HEIGHT_PT - (image.top + image.height),
        ]);
        content.x_object(image_name);
        content.restore_state();

        let page_lines = &text_pages[index];
        if !page_lines.is_empty() {
            content.begin_text();
            content.set_font(font_name, TEXT_LAYER_SIZE);
            content.set_fill_rgb(1.0, 1.0, 1.0);
            // first line lowest, each following line one leading further up
            let mut y = TEXT_LAYER_LEADING;
            content.next_line(1.0, y);
            for (i, line) in page_lines.iter().take(capacity).enumerate() {
                if i > 0 {
                    content.next_line(0.0, TEXT_LAYER_LEADING);
                    y += TEXT_LAYER_LEADING;
                }
                content.show(Str(&win_ansi(line)));
                text_lines += 1;
            }
            content.end_text();
            debug!(page = index, lines = page_lines.len().min(capacity), top = y, "Wrote text layer");
        }
        pdf.stream(content_id, &content.finish());

        let annotation_ids: Vec<Ref> = placed
            .iter()
            .filter(|link| link.page == index)
            .map(|link| {
                let id = alloc.bump();
                let mut annotation = pdf.annotation(id);
                annotation.subtype(AnnotationType::Link);
                annotation.rect(Rect::new(link.rect[0], link.rect[1], link.rect[2], link.rect[3]));
                annotation.border_style().width(0.0);
                annotation
                    .action()
                    .action_type(ActionType::Uri)
                    .uri(Str(link.href.as_bytes()));
                annotation.finish();
                id
            })
            .collect();

        let mut page = pdf.page(page_id);
        page.media_box(Rect::new(0.0, 0.0, A4_WIDTH_PT, A4_HEIGHT_PT));
        page.parent(page_tree_id);
        page.contents(content_id);
        if !annotation_ids.is_empty() {
            page.annotations(annotation_ids);
        }
        let mut resources = page.resources();
        resources.x_objects().pair(image_name, image.id);
        resources.fonts().pair(font_name, font_id);
        resources.finish();
        page.finish();
    }

    let page_count = page_ids.len();
    pdf.pages(page_tree_id).kids(page_ids).count(page_count as i32);

    let bytes = pdf.finish();
    debug!(
        pages = page_count,
        links = placed.len(),
        text_lines,
        bytes = bytes.len(),
        mode = ?input.pagination,
        "Composed PDF"
    );
    Ok(ComposedPdf {
        bytes,
        pages: page_count,
        links: placed,
        text_lines,
    })
}

fn write_image(pdf: &mut Pdf, id: Ref, width: u32, height: u32, rgb: &[u8]) -> Result<(), ComposeError> {
    let encoded = deflate(rgb)?;
    let mut image = pdf.image_xobject(id, &encoded);
    image.filter(Filter::FlateDecode);
    image.width(width as i32);
    image.height(height as i32);
    image.color_space().device_rgb();
    image.bits_per_component(8);
    image.finish();
    Ok(())
}
