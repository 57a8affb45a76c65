//! Layout renderer — maps a résumé document to a measured visual tree.
//!
//! # Geometry
//! - Fixed A4 width (210mm at 96 CSS px/in), unconstrained height.
//! - 48px page padding, full-width header, then a 1fr / 2fr two-column grid with a 20px gap.
//! - Left column: education, languages, skills, certifications.
//! - Right column: summary, experience, projects.
//!
//! Pure function of its inputs: no I/O, no shared state. Sections whose entries are all
//! blank are omitted entirely, and blank responsibilities/skills are dropped.

use serde::{Deserialize, Serialize};

use crate::models::resume::{
    Certification, Education, Experience, Language, PersonalInfo, Project, ResumeData,
};
use crate::render::font_metrics::{get_metrics, FontFamily, FontMetricTable, TextMeasure};
use crate::render::style::{ComputedStyle, CssColor, Edges, Rgba};
use crate::render::tree::{NodeId, NodeKind, Rect, Tag, VisualTree};

/// ISO A4 width in CSS px.
pub const A4_WIDTH_PX: f32 = 210.0 * 96.0 / 25.4;

const PAGE_PADDING: f32 = 48.0;
const GRID_GAP: f32 = 20.0;
const SECTION_GAP: f32 = 18.0;
const CONTACT_GAP: f32 = 12.0;
const LIST_INDENT: f32 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LayoutConfig {
    pub font: FontFamily,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        LayoutConfig {
            font: FontFamily::Sans,
        }
    }
}

/// Preview palette. Expressed in OKLCH, exactly as the preview stylesheet computes it.
pub mod palette {
    use crate::render::style::CssColor;

    pub const GRAY_900: CssColor = CssColor::oklch(0.21, 0.034, 264.665);
    pub const GRAY_800: CssColor = CssColor::oklch(0.278, 0.033, 256.848);
    pub const GRAY_700: CssColor = CssColor::oklch(0.373, 0.034, 259.733);
    pub const GRAY_600: CssColor = CssColor::oklch(0.446, 0.03, 256.802);
    pub const GRAY_300: CssColor = CssColor::oklch(0.872, 0.01, 258.338);
    pub const BLUE_600: CssColor = CssColor::oklch(0.546, 0.245, 262.881);
}

use palette::*;

// ────────────────────────────────────────────────────────────────────────────
// Public entry point
// ────────────────────────────────────────────────────────────────────────────

/// Renders `data` into a fresh visual tree.
pub fn render_preview(data: &ResumeData, config: &LayoutConfig) -> VisualTree {
    let root_style = ComputedStyle {
        color: GRAY_800,
        background_color: CssColor::Srgb(Rgba::WHITE),
        ..ComputedStyle::default()
    };
    let mut flow = Flow {
        tree: VisualTree::new(root_style, A4_WIDTH_PX),
        metrics: get_metrics(config.font),
    };
    let root = flow.tree.root();

    let content_x = PAGE_PADDING;
    let content_width = A4_WIDTH_PX - 2.0 * PAGE_PADDING;

    let header_height = flow.header(root, data, content_x, PAGE_PADDING, content_width);
    // header mb-1, then the grid row gap
    let columns_y = PAGE_PADDING + header_height + 4.0 + GRID_GAP;

    let left_width = (content_width - GRID_GAP) / 3.0;
    let right_x = content_x + left_width + GRID_GAP;
    let right_width = content_width - left_width - GRID_GAP;

    let left = flow.left_column(root, data, content_x, columns_y, left_width);
    let right = flow.right_column(root, data, right_x, columns_y, right_width);

    flow.tree.rect_mut(root).height = columns_y + left.max(right) + PAGE_PADDING;
    flow.tree
}

// ────────────────────────────────────────────────────────────────────────────
// Style helpers
// ────────────────────────────────────────────────────────────────────────────

fn text_style(size: f32, leading: f32, weight: u16, color: CssColor) -> ComputedStyle {
    ComputedStyle {
        color,
        font_size: size,
        line_height: size * leading,
        font_weight: weight,
        ..ComputedStyle::default()
    }
}

fn heading_style() -> ComputedStyle {
    ComputedStyle {
        letter_spacing: 1.1,
        ..text_style(11.0, 1.5, 700, GRAY_900)
    }
}

fn date_range(start: &str, end: &str) -> String {
    match (start.trim(), end.trim()) {
        ("", "") => String::new(),
        (s, "") => s.to_string(),
        ("", e) => e.to_string(),
        (s, e) => format!("{s} - {e}"),
    }
}

fn join_present(parts: &[&str], separator: &str) -> String {
    parts
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(separator)
}

fn element(tag: Tag) -> NodeKind {
    NodeKind::Element { tag, href: None }
}

// ────────────────────────────────────────────────────────────────────────────
// Flow builder
// ────────────────────────────────────────────────────────────────────────────

struct Flow {
    tree: VisualTree,
    metrics: &'static FontMetricTable,
}

impl Flow {
    fn measure(style: &ComputedStyle) -> TextMeasure {
        TextMeasure {
            font_size: style.font_size,
            bold: style.is_bold(),
            letter_spacing: style.letter_spacing,
        }
    }

    fn wrap(&self, text: &str, style: &ComputedStyle, width: f32) -> Vec<String> {
        self.metrics.wrap_lines(text, &Self::measure(style), width)
    }

    /// Pushes one text node per printed line under `el`; returns the block height.
    fn push_lines(&mut self, el: NodeId, lines: Vec<String>, style: &ComputedStyle, x: f32, y: f32) -> f32 {
        let m = Self::measure(style);
        let lh = style.line_height;
        let count = lines.len();
        for (i, line) in lines.into_iter().enumerate() {
            let w = self.metrics.width_px(&line, &m);
            let rect = Rect::new(x, y + i as f32 * lh, w, lh);
            self.tree.push(el, NodeKind::Text { text: line }, style.clone(), rect);
        }
        count as f32 * lh
    }

    /// A wrapped text block. Blank text produces no node and zero height.
    ///
    /// Anchors get a box hugging their text; other blocks span `width`.
    #[allow(clippy::too_many_arguments)]
    fn paragraph(
        &mut self,
        parent: NodeId,
        tag: Tag,
        href: Option<String>,
        text: &str,
        style: ComputedStyle,
        x: f32,
        y: f32,
        width: f32,
    ) -> f32 {
        let lines = self.wrap(text, &style, width);
        if lines.is_empty() {
            return 0.0;
        }
        let m = Self::measure(&style);
        let box_width = if tag == Tag::Anchor {
            lines
                .iter()
                .map(|l| self.metrics.width_px(l, &m))
                .fold(0.0_f32, f32::max)
        } else {
            width
        };
        let height = lines.len() as f32 * style.line_height;
        let el = self.tree.push(
            parent,
            NodeKind::Element { tag, href },
            style.clone(),
            Rect::new(x, y, box_width, height),
        );
        self.push_lines(el, lines, &style, x, y)
    }

    fn block(&mut self, parent: NodeId, text: &str, style: ComputedStyle, x: f32, y: f32, width: f32) -> f32 {
        self.paragraph(parent, Tag::Block, None, text, style, x, y, width)
    }

    /// Opens a section with its heading and lets `body` fill it. Returns the section height.
    fn section<F>(&mut self, column: NodeId, title: &str, x: f32, y: f32, width: f32, body: F) -> f32
    where
        F: FnOnce(&mut Flow, NodeId, f32) -> f32,
    {
        let section = self.tree.push(
            column,
            element(Tag::Section),
            ComputedStyle::default(),
            Rect::new(x, y, width, 0.0),
        );
        let heading = self.paragraph(
            section,
            Tag::Heading,
            None,
            &title.to_uppercase(),
            heading_style(),
            x,
            y,
            width,
        );
        let end = body(self, section, y + heading + 8.0);
        let height = end - y;
        self.tree.rect_mut(section).height = height;
        height
    }

    // ── header ──────────────────────────────────────────────────────────────

    fn header(&mut self, root: NodeId, data: &ResumeData, x: f32, y: f32, width: f32) -> f32 {
        let info = &data.personal_info;
        let mut style = ComputedStyle::default();
        style.border_bottom_color = GRAY_300;
        style.border_width = Edges::bottom(1.0);
        let header = self
            .tree
            .push(root, element(Tag::Header), style, Rect::new(x, y, width, 0.0));

        let mut cursor = y;
        let name_style = ComputedStyle {
            letter_spacing: 0.6,
            ..text_style(24.0, 32.0 / 24.0, 700, GRAY_900)
        };
        let name_h = self.paragraph(header, Tag::Heading, None, &info.name, name_style, x, cursor, width);
        if name_h > 0.0 {
            cursor += name_h + 2.0;
        }
        let title_h = self.block(header, &info.title, text_style(14.0, 20.0 / 14.0, 400, GRAY_600), x, cursor, width);
        if title_h > 0.0 {
            cursor += title_h + 8.0;
        }
        cursor += self.contact_row(header, info, x, cursor, width);

        // pb-1 plus the 1px bottom border
        let height = cursor + 4.0 + 1.0 - y;
        self.tree.rect_mut(header).height = height;
        height
    }

    /// Phone, email, profile link and location on a wrapping flex row.
    fn contact_row(&mut self, header: NodeId, info: &PersonalInfo, x: f32, y: f32, width: f32) -> f32 {
        let style = text_style(9.0, 1.5, 400, GRAY_700);
        let link_style = ComputedStyle {
            color: BLUE_600,
            ..style.clone()
        };
        let email = info.email.trim();
        let linkedin = info.linkedin.trim();
        let items: Vec<(Tag, Option<String>, &str, &ComputedStyle)> = vec![
            (Tag::Span, None, info.phone.trim(), &style),
            (Tag::Anchor, Some(format!("mailto:{email}")), email, &link_style),
            (Tag::Anchor, Some(format!("https://{linkedin}")), linkedin, &link_style),
            (Tag::Span, None, info.location.trim(), &style),
        ];
        let items: Vec<_> = items.into_iter().filter(|(_, _, text, _)| !text.is_empty()).collect();
        if items.is_empty() {
            return 0.0;
        }

        let row = self
            .tree
            .push(header, element(Tag::Row), style.clone(), Rect::new(x, y, width, 0.0));
        let lh = style.line_height;
        let mut cx = x;
        let mut cy = y;
        for (tag, href, text, item_style) in items {
            let w = self.metrics.width_px(text, &Self::measure(item_style));
            if cx > x && cx + w > x + width {
                cx = x;
                cy += lh;
            }
            let rect = Rect::new(cx, cy, w, lh);
            let el = self
                .tree
                .push(row, NodeKind::Element { tag, href }, item_style.clone(), rect);
            self.tree.push(
                el,
                NodeKind::Text {
                    text: text.to_string(),
                },
                item_style.clone(),
                rect,
            );
            cx += w + CONTACT_GAP;
        }
        let height = cy + lh - y;
        self.tree.rect_mut(row).height = height;
        height
    }

    // ── left column ─────────────────────────────────────────────────────────

    fn left_column(&mut self, root: NodeId, data: &ResumeData, x: f32, y: f32, width: f32) -> f32 {
        let column = self
            .tree
            .push(root, element(Tag::Column), ComputedStyle::default(), Rect::new(x, y, width, 0.0));
        let mut stack = Stack::new(y);

        let education: Vec<&Education> = data.education.iter().filter(|e| !e.is_blank()).collect();
        if !education.is_empty() {
            let h = self.section(column, "Education", x, stack.next_y(), width, |f, s, mut cy| {
                for edu in &education {
                    cy += f.paragraph(s, Tag::Block, None, &edu.degree, text_style(11.0, 1.25, 600, GRAY_900), x, cy, width);
                    let inst = f.block(s, &edu.institution, text_style(10.0, 1.5, 400, BLUE_600), x, cy, width);
                    cy += inst + if inst > 0.0 { 2.0 } else { 0.0 };
                    let meta = join_present(&[date_range(&edu.start_date, &edu.end_date).as_str(), edu.location.as_str()], " ");
                    cy += f.block(s, &meta, text_style(9.0, 1.5, 400, GRAY_600), x, cy, width);
                    cy += 12.0;
                }
                cy
            });
            stack.place(h);
        }

        let languages: Vec<&Language> = data.languages.iter().filter(|l| !l.is_blank()).collect();
        if !languages.is_empty() {
            let h = self.section(column, "Languages", x, stack.next_y(), width, |f, s, mut cy| {
                for lang in &languages {
                    cy += f.language_row(s, lang, x, cy, width) + 6.0;
                }
                cy
            });
            stack.place(h);
        }

        let skills = data.visible_skills();
        if !skills.is_empty() {
            let joined = skills.join(", ");
            let h = self.section(column, "Skills", x, stack.next_y(), width, |f, s, cy| {
                cy + f.block(s, &joined, text_style(9.0, 1.625, 400, GRAY_700), x, cy, width)
            });
            stack.place(h);
        }

        let certifications: Vec<&Certification> =
            data.certifications.iter().filter(|c| !c.is_blank()).collect();
        if !certifications.is_empty() {
            let h = self.section(column, "Certifications", x, stack.next_y(), width, |f, s, mut cy| {
                for cert in &certifications {
                    cy += f.certification(s, cert, x, cy, width) + 10.0;
                }
                cy
            });
            stack.place(h);
        }

        let height = stack.cursor - y;
        self.tree.rect_mut(column).height = height;
        height
    }

    fn language_row(&mut self, section: NodeId, lang: &Language, x: f32, y: f32, width: f32) -> f32 {
        let name_style = text_style(10.0, 1.5, 600, GRAY_900);
        let level_style = text_style(10.0, 1.5, 400, GRAY_600);
        let lh = name_style.line_height;
        let row = self
            .tree
            .push(section, element(Tag::Row), level_style.clone(), Rect::new(x, y, width, lh));

        let name = lang.name.trim();
        if !name.is_empty() {
            let w = self.metrics.width_px(name, &Self::measure(&name_style));
            self.inline_span(row, name, &name_style, Rect::new(x, y, w, lh));
        }
        let level = lang.level.trim();
        if !level.is_empty() {
            let w = self.metrics.width_px(level, &Self::measure(&level_style));
            self.inline_span(row, level, &level_style, Rect::new(x + width - w, y, w, lh));
        }
        lh
    }

    fn inline_span(&mut self, parent: NodeId, text: &str, style: &ComputedStyle, rect: Rect) {
        let span = self.tree.push(parent, element(Tag::Span), style.clone(), rect);
        self.tree.push(
            span,
            NodeKind::Text {
                text: text.to_string(),
            },
            style.clone(),
            rect,
        );
    }

    fn certification(&mut self, section: NodeId, cert: &Certification, x: f32, y: f32, width: f32) -> f32 {
        let mut cy = y;
        let title_style = text_style(10.0, 1.25, 600, GRAY_900);
        let link = cert
            .link
            .as_deref()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string);
        cy += match link {
            Some(href) => {
                let style = ComputedStyle {
                    color: BLUE_600,
                    ..title_style
                };
                self.paragraph(section, Tag::Anchor, Some(href), &cert.title, style, x, cy, width)
            }
            None => self.block(section, &cert.title, title_style, x, cy, width),
        };
        let meta = join_present(&[cert.issuer.as_str(), cert.date.as_str()], " • ");
        cy += self.block(section, &meta, text_style(9.0, 1.5, 400, GRAY_600), x, cy, width);
        if let Some(skills) = cert.skills.as_deref() {
            let skills = join_present(&skills.split(',').collect::<Vec<_>>(), ", ");
            if !skills.is_empty() {
                cy += self.block(section, &format!("Skills: {skills}"), text_style(9.0, 1.5, 400, GRAY_600), x, cy, width);
            }
        }
        cy - y
    }

    // ── right column ────────────────────────────────────────────────────────

    fn right_column(&mut self, root: NodeId, data: &ResumeData, x: f32, y: f32, width: f32) -> f32 {
        let column = self
            .tree
            .push(root, element(Tag::Column), ComputedStyle::default(), Rect::new(x, y, width, 0.0));
        let mut stack = Stack::new(y);

        let summary = data.summary.trim();
        if !summary.is_empty() {
            let h = self.section(column, "Summary", x, stack.next_y(), width, |f, s, cy| {
                cy + f.block(s, summary, text_style(10.0, 1.625, 400, GRAY_700), x, cy, width)
            });
            stack.place(h);
        }

        let experience: Vec<&Experience> = data.experience.iter().filter(|e| !e.is_blank()).collect();
        if !experience.is_empty() {
            let h = self.section(column, "Experience", x, stack.next_y(), width, |f, s, mut cy| {
                for exp in &experience {
                    cy += f.experience(s, exp, x, cy, width) + 16.0;
                }
                cy
            });
            stack.place(h);
        }

        let projects: Vec<&Project> = data.projects.iter().filter(|p| !p.is_blank()).collect();
        if !projects.is_empty() {
            let h = self.section(column, "Projects", x, stack.next_y(), width, |f, s, mut cy| {
                for project in &projects {
                    cy += f.project(s, project, x, cy, width) + 12.0;
                }
                cy
            });
            stack.place(h);
        }

        let height = stack.cursor - y;
        self.tree.rect_mut(column).height = height;
        height
    }

    fn experience(&mut self, section: NodeId, exp: &Experience, x: f32, y: f32, width: f32) -> f32 {
        let entry = self
            .tree
            .push(section, element(Tag::Block), ComputedStyle::default(), Rect::new(x, y, width, 0.0));
        let mut cy = y;
        cy += self.block(entry, &exp.title, text_style(12.0, 1.5, 600, GRAY_900), x, cy, width);
        cy += self.block(entry, &exp.company, text_style(11.0, 1.5, 500, BLUE_600), x, cy, width);
        let meta = join_present(&[date_range(&exp.start_date, &exp.end_date).as_str(), exp.location.as_str()], " • ");
        cy += self.block(entry, &meta, text_style(9.0, 1.5, 400, GRAY_600), x, cy, width);
        cy += 2.0;

        let description_style = ComputedStyle {
            italic: true,
            ..text_style(9.0, 1.5, 400, GRAY_600)
        };
        let description = self.block(entry, &exp.description, description_style, x, cy, width);
        if description > 0.0 {
            cy += description + 6.0;
        }

        let responsibilities: Vec<&str> = exp.visible_responsibilities().collect();
        if !responsibilities.is_empty() {
            let list = self
                .tree
                .push(entry, element(Tag::List), ComputedStyle::default(), Rect::new(x, cy, width, 0.0));
            let list_top = cy;
            let style = text_style(10.0, 1.375, 400, GRAY_700);
            let marker_style = ComputedStyle {
                color: BLUE_600,
                ..style.clone()
            };
            for resp in responsibilities {
                let lines = self.wrap(resp, &style, width - LIST_INDENT);
                let h = lines.len() as f32 * style.line_height;
                let item = self
                    .tree
                    .push(list, element(Tag::ListItem), style.clone(), Rect::new(x, cy, width, h));
                let bullet_w = self.metrics.width_px("•", &Self::measure(&marker_style));
                let marker_rect = Rect::new(x, cy, bullet_w, style.line_height);
                let marker = self
                    .tree
                    .push(item, element(Tag::Marker), marker_style.clone(), marker_rect);
                self.tree.push(
                    marker,
                    NodeKind::Text { text: "•".into() },
                    marker_style.clone(),
                    marker_rect,
                );
                cy += self.push_lines(item, lines, &style, x + LIST_INDENT, cy) + 2.0;
            }
            self.tree.rect_mut(list).height = cy - list_top;
        }

        self.tree.rect_mut(entry).height = cy - y;
        cy - y
    }

    fn project(&mut self, section: NodeId, project: &Project, x: f32, y: f32, width: f32) -> f32 {
        let mut cy = y;
        cy += self.block(section, &project.title, text_style(11.0, 1.5, 600, GRAY_900), x, cy, width);
        let dates = date_range(
            project.start_date.as_deref().unwrap_or(""),
            project.end_date.as_deref().unwrap_or(""),
        );
        let dates_h = self.block(section, &dates, text_style(9.0, 1.5, 400, GRAY_600), x, cy, width);
        if dates_h > 0.0 {
            cy += dates_h + 2.0;
        }
        let description = self.block(section, &project.description, text_style(10.0, 1.375, 400, GRAY_700), x, cy, width);
        if description > 0.0 {
            cy += description + 2.0;
        }
        cy += self.block(section, &project.technologies, text_style(9.0, 1.5, 400, BLUE_600), x, cy, width);
        cy - y
    }
}

/// Vertical stack of sections separated by a fixed gap.
struct Stack {
    cursor: f32,
    first: bool,
}

impl Stack {
    fn new(top: f32) -> Self {
        Stack {
            cursor: top,
            first: true,
        }
    }

    fn next_y(&self) -> f32 {
        if self.first {
            self.cursor
        } else {
            self.cursor + SECTION_GAP
        }
    }

    fn place(&mut self, height: f32) {
        self.cursor = self.next_y() + height;
        self.first = false;
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn sample_resume() -> ResumeData {
        ResumeData {
            personal_info: PersonalInfo {
                name: "Ved Gupta".into(),
                title: "Software Engineer".into(),
                phone: "+91 98765 43210".into(),
                email: "ved@example.com".into(),
                linkedin: "linkedin.com/in/vedgupta".into(),
                location: "Bengaluru".into(),
            },
            summary: "Backend engineer focused on reliable distributed systems.".into(),
            experience: vec![
                Experience {
                    title: "Senior Engineer".into(),
                    company: "Acme".into(),
                    location: "Remote".into(),
                    start_date: "2021".into(),
                    end_date: "Present".into(),
                    description: "Platform team".into(),
                    responsibilities: vec![
                        "Cut p99 latency by 40% with a caching tier".into(),
                        "  ".into(),
                        "Led migration to Rust services".into(),
                    ],
                },
                Experience {
                    title: "Engineer".into(),
                    company: "Globex".into(),
                    start_date: "2018".into(),
                    end_date: "2021".into(),
                    ..Default::default()
                },
            ],
            education: vec![Education {
                degree: "B.Tech Computer Science".into(),
                institution: "IIT".into(),
                location: "Delhi".into(),
                start_date: "2014".into(),
                end_date: "2018".into(),
            }],
            skills: vec!["Rust".into(), "".into(), "PostgreSQL".into()],
            certifications: vec![Certification {
                title: "CKA".into(),
                issuer: "CNCF".into(),
                date: "2022".into(),
                link: Some("https://cncf.io/cka".into()),
                skills: Some("kubernetes, ops".into()),
            }],
            projects: vec![Project {
                title: "folio".into(),
                start_date: Some("2023".into()),
                end_date: None,
                description: "Résumé builder".into(),
                technologies: "Rust, axum".into(),
            }],
            languages: vec![
                Language {
                    name: "English".into(),
                    level: "Fluent".into(),
                },
                Language {
                    name: "Hindi".into(),
                    level: "Native".into(),
                },
            ],
        }
    }

    fn headings(tree: &VisualTree) -> Vec<String> {
        tree.descendants(tree.root())
            .into_iter()
            .filter(|id| tree.node(*id).tag() == Some(Tag::Heading))
            .map(|id| tree.text_content(id))
            .collect()
    }

    fn texts(tree: &VisualTree) -> Vec<String> {
        tree.descendants(tree.root())
            .into_iter()
            .filter_map(|id| tree.node(id).text().map(str::to_string))
            .collect()
    }

    #[test]
    fn test_render_is_deterministic() {
        let data = sample_resume();
        let a = render_preview(&data, &LayoutConfig::default());
        let b = render_preview(&data, &LayoutConfig::default());
        assert_eq!(a.len(), b.len());
        assert_eq!(texts(&a), texts(&b));
        assert_eq!(a, b, "identical input must give an identical tree");
    }

    #[test]
    fn test_fixed_a4_width_and_positive_height() {
        let tree = render_preview(&sample_resume(), &LayoutConfig::default());
        let (w, h) = tree.size();
        assert!((w - 793.7).abs() < 0.1, "width should be A4 in px, got {w}");
        assert!(h > 300.0);
    }

    #[test]
    fn test_section_order_left_then_right() {
        let tree = render_preview(&sample_resume(), &LayoutConfig::default());
        let found = headings(&tree);
        assert_eq!(
            found,
            vec![
                "Ved Gupta",
                "EDUCATION",
                "LANGUAGES",
                "SKILLS",
                "CERTIFICATIONS",
                "SUMMARY",
                "EXPERIENCE",
                "PROJECTS"
            ]
        );
    }

    #[test]
    fn test_empty_sections_are_omitted() {
        let mut data = sample_resume();
        data.skills = vec!["   ".into(), "".into()];
        data.languages.clear();
        data.projects = vec![Project::default()];
        data.summary = "  ".into();
        let tree = render_preview(&data, &LayoutConfig::default());
        let found = headings(&tree);
        for absent in ["SKILLS", "LANGUAGES", "PROJECTS", "SUMMARY"] {
            assert!(!found.iter().any(|h| h == absent), "{absent} should be omitted");
        }
        assert!(found.iter().any(|h| h == "EXPERIENCE"));
    }

    #[test]
    fn test_entry_order_preserved() {
        let tree = render_preview(&sample_resume(), &LayoutConfig::default());
        let all = texts(&tree).join("\n");
        let senior = all.find("Senior Engineer").unwrap();
        let globex = all.find("Globex").unwrap();
        assert!(senior < globex, "experience order must follow input order");
        let english = all.find("English").unwrap();
        let hindi = all.find("Hindi").unwrap();
        assert!(english < hindi);
    }

    #[test]
    fn test_every_list_section_keeps_input_order() {
        let mut data = sample_resume();
        data.education = vec![
            Education {
                degree: "M.Sc Zoology".into(),
                institution: "Zenith Institute".into(),
                ..Default::default()
            },
            Education {
                degree: "B.Sc Astronomy".into(),
                institution: "Apex University".into(),
                ..Default::default()
            },
        ];
        data.certifications = vec![
            Certification {
                title: "Terraform Associate".into(),
                issuer: "HashiCorp".into(),
                ..Default::default()
            },
            Certification {
                title: "AWS Solutions Architect".into(),
                issuer: "Amazon".into(),
                ..Default::default()
            },
        ];
        data.projects = vec![
            Project {
                title: "Project Zephyr".into(),
                description: "Stream processor".into(),
                ..Default::default()
            },
            Project {
                title: "Project Aurora".into(),
                description: "Static site generator".into(),
                ..Default::default()
            },
        ];
        let tree = render_preview(&data, &LayoutConfig::default());
        let all = texts(&tree).join("\n");

        for (first, second) in [
            ("Senior Engineer", "Globex"),
            ("Zenith Institute", "Apex University"),
            ("Terraform Associate", "AWS Solutions Architect"),
            ("Project Zephyr", "Project Aurora"),
            ("English", "Hindi"),
        ] {
            let a = all.find(first).unwrap_or_else(|| panic!("{first} not rendered"));
            let b = all.find(second).unwrap_or_else(|| panic!("{second} not rendered"));
            assert!(a < b, "{first} must render before {second}");
        }
    }

    #[test]
    fn test_blank_responsibilities_and_skills_dropped() {
        let tree = render_preview(&sample_resume(), &LayoutConfig::default());
        let items = tree
            .descendants(tree.root())
            .into_iter()
            .filter(|id| tree.node(*id).tag() == Some(Tag::ListItem))
            .count();
        assert_eq!(items, 2, "the blank responsibility must not render");
        let all = texts(&tree);
        assert!(all.iter().any(|t| t == "Rust, PostgreSQL"));
    }

    #[test]
    fn test_anchors_carry_targets() {
        let tree = render_preview(&sample_resume(), &LayoutConfig::default());
        let hrefs: Vec<&str> = tree
            .descendants(tree.root())
            .into_iter()
            .filter_map(|id| tree.node(id).href())
            .collect();
        assert_eq!(
            hrefs,
            vec![
                "mailto:ved@example.com",
                "https://linkedin.com/in/vedgupta",
                "https://cncf.io/cka"
            ]
        );
    }

    #[test]
    fn test_children_stay_inside_page_width() {
        let tree = render_preview(&sample_resume(), &LayoutConfig::default());
        for id in tree.descendants(tree.root()) {
            let rect = tree.node(id).rect;
            assert!(rect.x >= 0.0 && rect.right() <= A4_WIDTH_PX + 0.01, "node {id:?} overflows: {rect:?}");
        }
    }

    #[test]
    fn test_theme_uses_wide_gamut_colors() {
        let tree = render_preview(&sample_resume(), &LayoutConfig::default());
        assert!(tree
            .descendants(tree.root())
            .into_iter()
            .any(|id| tree.node(id).style.has_wide_gamut()));
    }
}
