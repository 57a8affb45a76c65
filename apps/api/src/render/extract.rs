//! Link and text extraction from a realized tree.
//!
//! Runs on the same `RealizedTree` snapshot the rasterizer captures, so hit-regions and
//! bitmap pixels come from one layout moment. Coordinates are CSS px relative to the
//! tree's own root box, never to the document the tree is mounted in.

use serde::Serialize;

use crate::render::host::RealizedTree;
use crate::render::tree::{NodeId, NodeKind, Tag, VisualTree};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkAnnotation {
    pub href: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// One logical line of reading-order text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextLine {
    pub text: String,
    pub y: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Extraction {
    pub links: Vec<LinkAnnotation>,
    pub lines: Vec<TextLine>,
    /// Layout epoch of the snapshot this was read from.
    pub epoch: u64,
}

/// Targets that navigate nowhere: fragments, blank pages, scripts and bare schemes.
pub fn is_placeholder_href(href: &str) -> bool {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return true;
    }
    let lower = href.to_ascii_lowercase();
    if lower == "about:blank" || lower.starts_with("javascript:") {
        return true;
    }
    match lower.split_once(':') {
        Some((_, rest)) => rest.trim_start_matches('/').trim().is_empty(),
        None => false,
    }
}

pub fn extract(target: &RealizedTree) -> Extraction {
    let tree = &target.tree;
    Extraction {
        links: collect_links(tree),
        lines: collect_lines(tree),
        epoch: target.epoch(),
    }
}

fn collect_links(tree: &VisualTree) -> Vec<LinkAnnotation> {
    let root = tree.node(tree.root()).rect;
    tree.descendants(tree.root())
        .into_iter()
        .filter_map(|id| {
            let node = tree.node(id);
            if node.tag() != Some(Tag::Anchor) {
                return None;
            }
            let href = node.href().filter(|h| !is_placeholder_href(h))?;
            let rect = tree.absolute_rect(id);
            if rect.is_empty() {
                return None;
            }
            let rect = rect.translate(-root.x, -root.y);
            Some(LinkAnnotation {
                href: href.trim().to_string(),
                x: rect.x,
                y: rect.y,
                width: rect.width,
                height: rect.height,
            })
        })
        .collect()
}

fn is_inline(tree: &VisualTree, id: NodeId) -> bool {
    match &tree.node(id).kind {
        NodeKind::Text { .. } => true,
        NodeKind::Element { tag, .. } => matches!(tag, Tag::Span | Tag::Anchor | Tag::Marker),
    }
}

/// Text under `id` with list markers left out.
fn inline_text(tree: &VisualTree, id: NodeId, out: &mut Vec<String>) {
    let node = tree.node(id);
    match &node.kind {
        NodeKind::Text { text } => out.push(text.clone()),
        NodeKind::Element { tag: Tag::Marker, .. } => {}
        NodeKind::Element { .. } => {
            for child in &node.children {
                inline_text(tree, *child, out);
            }
        }
    }
}

fn collect_lines(tree: &VisualTree) -> Vec<TextLine> {
    let root_y = tree.node(tree.root()).rect.y;
    let mut lines = Vec::new();
    let mut stack = vec![tree.root()];
    while let Some(id) = stack.pop() {
        let node = tree.node(id);
        if node.text().is_some() {
            continue;
        }
        let inline_only = !node.children.is_empty() && node.children.iter().all(|c| is_inline(tree, *c));
        if inline_only {
            let mut parts = Vec::new();
            inline_text(tree, id, &mut parts);
            let text = parts.join(" ");
            if !text.trim().is_empty() {
                lines.push(TextLine {
                    text,
                    y: node.rect.y - root_y,
                });
            }
        } else {
            stack.extend(node.children.iter().rev().copied());
        }
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::render::host::Placement;
    use crate::render::layout::{render_preview, LayoutConfig};
    use crate::render::style::ComputedStyle;
    use crate::render::tree::Rect;

    fn realize(tree: VisualTree) -> RealizedTree {
        RealizedTree {
            id: "t".into(),
            tree: Arc::new(tree),
            origin: (-10000.0, -10000.0),
            placement: Placement::OffScreen,
        }
    }

    fn anchor(tree: &mut VisualTree, href: &str, rect: Rect) {
        let root = tree.root();
        let a = tree.push(
            root,
            NodeKind::Element {
                tag: Tag::Anchor,
                href: Some(href.into()),
            },
            ComputedStyle::default(),
            rect,
        );
        tree.push(a, NodeKind::Text { text: href.into() }, ComputedStyle::default(), rect);
    }

    #[test]
    fn test_placeholder_hrefs() {
        for placeholder in ["", " ", "#", "#top", "about:blank", "javascript:void(0)", "mailto:", "https://", "tel:"] {
            assert!(is_placeholder_href(placeholder), "{placeholder:?} should be a placeholder");
        }
        for real in ["https://example.com", "mailto:a@b.co", "tel:+15550100", "linkedin.com/in/x"] {
            assert!(!is_placeholder_href(real), "{real:?} should be navigable");
        }
    }

    #[test]
    fn test_links_skip_placeholders_and_zero_area() {
        let mut tree = VisualTree::new(ComputedStyle::default(), 200.0);
        anchor(&mut tree, "https://a.dev", Rect::new(10.0, 20.0, 30.0, 12.0));
        anchor(&mut tree, "#", Rect::new(10.0, 40.0, 30.0, 12.0));
        anchor(&mut tree, "https://hidden.dev", Rect::new(10.0, 60.0, 0.0, 12.0));

        let extraction = extract(&realize(tree));
        assert_eq!(
            extraction.links,
            vec![LinkAnnotation {
                href: "https://a.dev".into(),
                x: 10.0,
                y: 20.0,
                width: 30.0,
                height: 12.0,
            }],
            "coordinates are relative to the tree, not the off-screen mount point"
        );
    }

    #[test]
    fn test_resume_links_and_lines() {
        let tree = render_preview(&crate::render::layout::tests::sample_resume(), &LayoutConfig::default());
        let extraction = extract(&realize(tree));

        let hrefs: Vec<&str> = extraction.links.iter().map(|l| l.href.as_str()).collect();
        assert_eq!(
            hrefs,
            vec!["mailto:ved@example.com", "https://linkedin.com/in/vedgupta", "https://cncf.io/cka"]
        );
        assert!(extraction.links.iter().all(|l| l.width > 0.0 && l.height > 0.0));

        let texts: Vec<&str> = extraction.lines.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(texts[0], "Ved Gupta");
        assert_eq!(texts[1], "Software Engineer");
        assert_eq!(
            texts[2],
            "+91 98765 43210 ved@example.com linkedin.com/in/vedgupta Bengaluru",
            "a row of inline items reads as one line"
        );
        assert!(texts.contains(&"English Fluent"));
        assert!(texts.contains(&"Led migration to Rust services"), "list markers are not text");
        assert!(!texts.iter().any(|t| t.contains('•') && t.starts_with('•')));
    }

    #[test]
    fn test_extraction_records_epoch() {
        let tree = render_preview(&crate::models::resume::ResumeData::default(), &LayoutConfig::default());
        let epoch = tree.epoch();
        assert_eq!(extract(&realize(tree)).epoch, epoch);
    }
}
