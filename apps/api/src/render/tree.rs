//! The visual tree: an arena of styled, measured nodes produced by the layout renderer.
//!
//! Geometry is in CSS px relative to the tree's own root (the root sits at `(0, 0)`).
//! Every mutation bumps `epoch`, which lets capture passes prove they read the same
//! layout moment.

use serde::{Deserialize, Serialize};

use crate::render::style::ComputedStyle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Rect {
            x,
            y,
            width,
            height,
        }
    }

    pub fn is_empty(&self) -> bool {
        !(self.width > 0.0 && self.height > 0.0)
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn translate(&self, dx: f32, dy: f32) -> Rect {
        Rect {
            x: self.x + dx,
            y: self.y + dy,
            ..*self
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tag {
    Root,
    Header,
    Column,
    Section,
    Heading,
    Block,
    Row,
    Span,
    Anchor,
    List,
    ListItem,
    Marker,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeKind {
    Element { tag: Tag, href: Option<String> },
    /// One printed line of text.
    Text { text: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub kind: NodeKind,
    pub style: ComputedStyle,
    pub rect: Rect,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

impl Node {
    pub fn tag(&self) -> Option<Tag> {
        match &self.kind {
            NodeKind::Element { tag, .. } => Some(*tag),
            NodeKind::Text { .. } => None,
        }
    }

    pub fn text(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Text { text } => Some(text),
            NodeKind::Element { .. } => None,
        }
    }

    pub fn href(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Element { href, .. } => href.as_deref(),
            NodeKind::Text { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualTree {
    nodes: Vec<Node>,
    epoch: u64,
}

impl VisualTree {
    /// Creates a tree holding only a root element of the given width.
    pub fn new(style: ComputedStyle, width: f32) -> Self {
        VisualTree {
            nodes: vec![Node {
                kind: NodeKind::Element {
                    tag: Tag::Root,
                    href: None,
                },
                style,
                rect: Rect::new(0.0, 0.0, width, 0.0),
                parent: None,
                children: Vec::new(),
            }],
            epoch: 0,
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    /// Size of the root box.
    pub fn size(&self) -> (f32, f32) {
        let rect = self.nodes[0].rect;
        (rect.width, rect.height)
    }

    /// Appends a child node under `parent` and returns its id.
    pub fn push(&mut self, parent: NodeId, kind: NodeKind, style: ComputedStyle, rect: Rect) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            kind,
            style,
            rect,
            parent: Some(parent),
            children: Vec::new(),
        });
        self.nodes[parent.0].children.push(id);
        self.epoch += 1;
        id
    }

    pub fn rect_mut(&mut self, id: NodeId) -> &mut Rect {
        self.epoch += 1;
        &mut self.nodes[id.0].rect
    }

    pub fn style_mut(&mut self, id: NodeId) -> &mut ComputedStyle {
        self.epoch += 1;
        &mut self.nodes[id.0].style
    }

    /// All nodes under (and including) `id` in document order. Each node appears once.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.nodes[next.0].children.iter().rev().copied());
        }
        out
    }

    #[cfg(test)]
    /// Text of every text node under `id`, in document order, joined by spaces.
    pub fn text_content(&self, id: NodeId) -> String {
        self.descendants(id)
            .into_iter()
            .filter_map(|n| self.nodes[n.0].text())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Box of `id` relative to the tree root.
    pub fn absolute_rect(&self, id: NodeId) -> Rect {
        self.nodes[id.0].rect
    }
}
