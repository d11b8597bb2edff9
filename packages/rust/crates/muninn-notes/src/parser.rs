//! Markdown parsing into owned, identified document trees.

use comrak::nodes::{AstNode, NodeValue};
use comrak::{Arena, Options, parse_document};

use crate::models::{DocumentTree, Node, NodeKind, Point, Position};

/// Text -> tree seam. Implementations must be deterministic for equal input.
pub trait DocumentParser: Send + Sync {
    /// Parse one document.
    ///
    /// # Errors
    ///
    /// Returns a human-readable reason when the text cannot be parsed.
    fn parse(&self, text: &str) -> Result<DocumentTree, String>;
}

/// CommonMark + GFM parser backed by `comrak`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkdownParser;

impl MarkdownParser {
    fn options() -> Options<'static> {
        let mut options = Options::default();
        options.extension.strikethrough = true;
        options.extension.table = true;
        options.extension.autolink = true;
        options.extension.tasklist = true;
        options.extension.footnotes = true;
        options
    }
}

impl DocumentParser for MarkdownParser {
    fn parse(&self, text: &str) -> Result<DocumentTree, String> {
        let arena = Arena::new();
        let root = parse_document(&arena, text, &Self::options());
        let mut tree = convert(root);
        assign_ids(&mut tree);
        Ok(DocumentTree::new(tree))
    }
}

fn non_empty(raw: &str) -> Option<String> {
    if raw.is_empty() {
        None
    } else {
        Some(raw.to_string())
    }
}

fn convert<'a>(node: &'a AstNode<'a>) -> Node {
    let mut out = convert_value(node);
    out.children = node.children().map(convert).collect();
    out
}

fn convert_value<'a>(node: &'a AstNode<'a>) -> Node {
    let ast = node.data();
    let mut out = match &ast.value {
        NodeValue::Document => Node::new(NodeKind::Root),
        NodeValue::Paragraph => Node::new(NodeKind::Paragraph),
        NodeValue::Heading(heading) => {
            let mut out = Node::new(NodeKind::Heading);
            out.depth = Some(heading.level);
            out
        }
        NodeValue::Text(text) => Node::new(NodeKind::Text).with_value(text.to_string()),
        NodeValue::SoftBreak => Node::new(NodeKind::Text).with_value("\n"),
        NodeValue::LineBreak => Node::new(NodeKind::Break),
        NodeValue::Emph => Node::new(NodeKind::Emphasis),
        NodeValue::Strong => Node::new(NodeKind::Strong),
        NodeValue::Strikethrough => Node::new(NodeKind::Delete),
        NodeValue::Code(code) => {
            Node::new(NodeKind::InlineCode).with_value(code.literal.to_string())
        }
        NodeValue::CodeBlock(block) => {
            let mut out = Node::new(NodeKind::Code).with_value(block.literal.to_string());
            out.lang = non_empty(block.info.trim());
            out
        }
        NodeValue::HtmlBlock(block) => {
            Node::new(NodeKind::Html).with_value(block.literal.to_string())
        }
        NodeValue::HtmlInline(raw) => Node::new(NodeKind::Html).with_value(raw.to_string()),
        NodeValue::Link(link) => {
            let mut out = Node::new(NodeKind::Link).with_url(link.url.to_string());
            out.title = non_empty(&link.title);
            out
        }
        NodeValue::Image(link) => {
            let mut out = Node::new(NodeKind::Image).with_url(link.url.to_string());
            out.title = non_empty(&link.title);
            out
        }
        NodeValue::List(..) => Node::new(NodeKind::List),
        NodeValue::Item(..) | NodeValue::TaskItem(..) => Node::new(NodeKind::ListItem),
        NodeValue::BlockQuote => Node::new(NodeKind::Blockquote),
        NodeValue::ThematicBreak => Node::new(NodeKind::ThematicBreak),
        NodeValue::Table(..) => Node::new(NodeKind::Table),
        NodeValue::TableRow(..) => Node::new(NodeKind::TableRow),
        NodeValue::TableCell => Node::new(NodeKind::TableCell),
        NodeValue::FootnoteDefinition(..) => Node::new(NodeKind::FootnoteDefinition),
        NodeValue::FootnoteReference(..) => Node::new(NodeKind::FootnoteReference),
        _ => Node::new(NodeKind::Unknown),
    };
    let pos = ast.sourcepos;
    if pos.start.line > 0 {
        out.position = Some(Position {
            start: Point {
                line: pos.start.line,
                column: pos.start.column,
            },
            end: Point {
                line: pos.end.line,
                column: pos.end.column,
            },
        });
    }
    out
}

/// Assign positional identifiers: root `""`, its children `"0"`, `"1"`, ...,
/// deeper nodes `parent + "-" + index`.
pub fn assign_ids(root: &mut Node) {
    root.id.clear();
    assign_child_ids(root);
}

fn assign_child_ids(parent: &mut Node) {
    let prefix = parent.id.clone();
    for (index, child) in parent.children.iter_mut().enumerate() {
        child.id = if prefix.is_empty() {
            index.to_string()
        } else {
            format!("{prefix}-{index}")
        };
        assign_child_ids(child);
    }
}
