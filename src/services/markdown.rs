use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, Options, Parser, Tag, TagEnd};
use std::collections::HashMap;

/// Parsed markdown tree: elements carry a tag name, attributes and ordered children,
/// text leaves carry literal text.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element {
        tag: String,
        attrs: HashMap<String, String>,
        children: Vec<Node>,
    },
    Text(String),
}

impl Node {
    pub fn element(tag: &str, children: Vec<Node>) -> Self {
        Node::Element {
            tag: tag.to_string(),
            attrs: HashMap::new(),
            children,
        }
    }

    pub fn text(value: &str) -> Self {
        Node::Text(value.to_string())
    }

    pub fn tag(&self) -> Option<&str> {
        match self {
            Node::Element { tag, .. } => Some(tag.as_str()),
            Node::Text(_) => None,
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        match self {
            Node::Element { attrs, .. } => attrs.get(name).map(String::as_str),
            Node::Text(_) => None,
        }
    }

    pub fn children(&self) -> &[Node] {
        match self {
            Node::Element { children, .. } => children,
            Node::Text(_) => &[],
        }
    }

    /// Element children carrying the given tag, in order
    pub fn children_with_tag<'a>(&'a self, wanted: &'a str) -> impl Iterator<Item = &'a Node> + 'a {
        self.children().iter().filter(move |c| c.tag() == Some(wanted))
    }

    /// First element child carrying the given tag
    pub fn child_with_tag(&self, wanted: &str) -> Option<&Node> {
        self.children().iter().find(|c| c.tag() == Some(wanted))
    }
}

/// Concatenate every text leaf under `node`, depth-first, left to right
pub fn flatten_text(node: &Node) -> String {
    let mut out = String::new();
    collect_text(node, &mut out);
    out
}

fn collect_text(node: &Node, out: &mut String) {
    match node {
        Node::Text(text) => out.push_str(text),
        Node::Element { children, .. } => {
            for child in children {
                collect_text(child, out);
            }
        }
    }
}

/// Parse markdown (with GFM tables) into a tree rooted at a `root` element.
///
/// Fenced code becomes `pre > code` with the language in the `lang` attribute of `code`.
/// Tables come out as `table > thead > tr > th*` plus `table > tbody > tr > td*`; a table
/// without body rows has no `tbody`.
pub fn parse(markdown: &str) -> Node {
    let mut builder = TreeBuilder::new();
    for event in Parser::new_ext(markdown, Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH) {
        builder.event(event);
    }
    builder.finish()
}

struct Frame {
    tag: String,
    attrs: HashMap<String, String>,
    children: Vec<Node>,
}

impl Frame {
    fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            attrs: HashMap::new(),
            children: Vec::new(),
        }
    }

    fn into_node(self) -> Node {
        Node::Element {
            tag: self.tag,
            attrs: self.attrs,
            children: self.children,
        }
    }
}

struct TreeBuilder {
    stack: Vec<Frame>,
}

impl TreeBuilder {
    fn new() -> Self {
        Self {
            stack: vec![Frame::new("root")],
        }
    }

    fn top_tag(&self) -> &str {
        self.stack.last().map(|f| f.tag.as_str()).unwrap_or("root")
    }

    fn in_table_head(&self) -> bool {
        self.stack.iter().any(|f| f.tag == "thead")
    }

    fn open(&mut self, frame: Frame) {
        self.stack.push(frame);
    }

    fn close(&mut self) {
        // root is never popped
        if self.stack.len() > 1 {
            if let Some(frame) = self.stack.pop() {
                self.append(frame.into_node());
            }
        }
    }

    fn append(&mut self, node: Node) {
        if let Some(parent) = self.stack.last_mut() {
            parent.children.push(node);
        }
    }

    fn text(&mut self, text: &str) {
        // merge adjacent text leaves so cell text is one leaf where possible
        if let Some(parent) = self.stack.last_mut() {
            if let Some(Node::Text(prev)) = parent.children.last_mut() {
                prev.push_str(text);
                return;
            }
        }
        self.append(Node::text(text));
    }

    fn event(&mut self, event: Event<'_>) {
        match event {
            Event::Start(tag) => self.start(tag),
            Event::End(tag) => self.end(tag),
            Event::Text(text) | Event::Html(text) | Event::InlineHtml(text) => self.text(&text),
            Event::Code(code) => self.append(Node::element("code", vec![Node::text(&code)])),
            Event::SoftBreak => self.text("\n"),
            Event::HardBreak => self.append(Node::element("br", Vec::new())),
            Event::Rule => self.append(Node::element("hr", Vec::new())),
            _ => {}
        }
    }

    fn start(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::CodeBlock(kind) => {
                self.open(Frame::new("pre"));
                let mut code = Frame::new("code");
                if let CodeBlockKind::Fenced(info) = kind {
                    // info string may carry extra words after the language
                    if let Some(lang) = info.split_whitespace().next() {
                        code.attrs.insert("lang".to_string(), lang.to_string());
                    }
                }
                self.open(code);
            }
            Tag::TableHead => {
                self.open(Frame::new("thead"));
                self.open(Frame::new("tr"));
            }
            Tag::TableRow => {
                if self.top_tag() == "table" {
                    self.open(Frame::new("tbody"));
                }
                self.open(Frame::new("tr"));
            }
            Tag::TableCell => {
                let cell = if self.in_table_head() { "th" } else { "td" };
                self.open(Frame::new(cell));
            }
            Tag::Link { dest_url, .. } => {
                let mut frame = Frame::new("a");
                frame.attrs.insert("href".to_string(), dest_url.to_string());
                self.open(frame);
            }
            other => self.open(Frame::new(tag_name(&other))),
        }
    }

    fn end(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::CodeBlock | TagEnd::TableHead => {
                self.close();
                self.close();
            }
            TagEnd::Table => {
                if self.top_tag() == "tbody" {
                    self.close();
                }
                self.close();
            }
            _ => self.close(),
        }
    }

    fn finish(mut self) -> Node {
        while self.stack.len() > 1 {
            self.close();
        }
        match self.stack.pop() {
            Some(root) => root.into_node(),
            None => Node::element("root", Vec::new()),
        }
    }
}

fn tag_name(tag: &Tag<'_>) -> &'static str {
    match tag {
        Tag::Paragraph => "p",
        Tag::Heading { level, .. } => match level {
            HeadingLevel::H1 => "h1",
            HeadingLevel::H2 => "h2",
            HeadingLevel::H3 => "h3",
            HeadingLevel::H4 => "h4",
            HeadingLevel::H5 => "h5",
            HeadingLevel::H6 => "h6",
        },
        Tag::BlockQuote(_) => "blockquote",
        Tag::List(Some(_)) => "ol",
        Tag::List(None) => "ul",
        Tag::Item => "li",
        Tag::Table(_) => "table",
        Tag::Emphasis => "em",
        Tag::Strong => "strong",
        Tag::Strikethrough => "del",
        Tag::Image { .. } => "img",
        _ => "span",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fenced_code_keeps_language_and_body() {
        let root = parse("Here you go:\n\n```SQL\nSELECT 1;\n```\n");
        let pre = root.child_with_tag("pre").expect("pre element");
        let code = pre.child_with_tag("code").expect("code element");
        assert_eq!(code.attr("lang"), Some("SQL"));
        assert_eq!(flatten_text(code), "SELECT 1;\n");
    }

    #[test]
    fn unannotated_fence_has_no_language() {
        let root = parse("```\nplain text\n```\n");
        let code = root.child_with_tag("pre").and_then(|p| p.child_with_tag("code")).unwrap();
        assert_eq!(code.attr("lang"), None);
    }

    #[test]
    fn table_is_split_into_head_and_body() {
        let root = parse("| name | amount |\n|---|---|\n| Widget | 1,234.50 |\n| Gadget | 7 |\n");
        let table = root.child_with_tag("table").expect("table element");

        let head_row = table.child_with_tag("thead").and_then(|h| h.child_with_tag("tr")).unwrap();
        let headers: Vec<String> = head_row.children_with_tag("th").map(flatten_text).collect();
        assert_eq!(headers, vec!["name", "amount"]);

        let body = table.child_with_tag("tbody").expect("tbody element");
        assert_eq!(body.children_with_tag("tr").count(), 2);
    }

    #[test]
    fn header_only_table_has_no_body() {
        let root = parse("| a | b |\n|---|---|\n");
        let table = root.child_with_tag("table").unwrap();
        assert!(table.child_with_tag("thead").is_some());
        assert!(table.child_with_tag("tbody").is_none());
    }

    #[test]
    fn flatten_walks_nested_inline_markup() {
        let node = Node::element(
            "td",
            vec![
                Node::text("a"),
                Node::element("strong", vec![Node::text("b"), Node::element("em", vec![Node::text("c")])]),
                Node::text("d"),
            ],
        );
        assert_eq!(flatten_text(&node), "abcd");
    }
}
