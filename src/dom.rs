//! Document tree.
//!
//! The engine evaluates rules against an arena-backed tree of nodes. The tree
//! is deliberately small: it models exactly what speech rules query (element
//! names, attributes, text, document order) and nothing about namespaces or
//! DTDs.
//!
//! ```text
//! Document ── nodes: Vec<NodeEntry>      (index = NodeId)
//!    │
//!    └─ NodeRef<'d> { doc, id }          (Copy handle used everywhere else)
//! ```
//!
//! Every document gets a process-unique id and a revision counter that bumps on
//! each mutation. Together with the node id they form a [`NodeIdentity`], the
//! key the engine caches speech under.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use once_cell::unsync::OnceCell;

use crate::error::XmlError;

static NEXT_DOCUMENT_ID: AtomicU64 = AtomicU64::new(1);

/// Index of a node inside its [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Document,
    Element,
    Text,
    Comment,
    ProcessingInstruction,
}

bitflags::bitflags! {
    /// Set of node kinds, used to gate lookups and node tests.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct KindMask: u8 {
        const DOCUMENT                = 1 << 0;
        const ELEMENT                 = 1 << 1;
        const TEXT                    = 1 << 2;
        const COMMENT                 = 1 << 3;
        const PROCESSING_INSTRUCTION  = 1 << 4;
    }
}

impl NodeKind {
    pub fn mask(self) -> KindMask {
        match self {
            NodeKind::Document => KindMask::DOCUMENT,
            NodeKind::Element => KindMask::ELEMENT,
            NodeKind::Text => KindMask::TEXT,
            NodeKind::Comment => KindMask::COMMENT,
            NodeKind::ProcessingInstruction => KindMask::PROCESSING_INSTRUCTION,
        }
    }
}

/// Stable identity of a node at a given document revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeIdentity {
    pub document: u64,
    pub revision: u64,
    pub node: NodeId,
}

#[derive(Debug, Clone)]
enum NodeData {
    Document,
    Element { name: String, attributes: Vec<(String, String)> },
    Text(String),
    Comment(String),
    ProcessingInstruction { target: String, data: String },
}

#[derive(Debug, Clone)]
struct NodeEntry {
    data: NodeData,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// An arena of nodes rooted at a `Document` node.
#[derive(Debug)]
pub struct Document {
    id: u64,
    revision: u64,
    nodes: Vec<NodeEntry>,
    /// Pre-order position of every node, computed on first use after a mutation.
    order: OnceCell<Vec<usize>>,
}

impl Clone for Document {
    /// Clones get a fresh document id so their identities never collide.
    fn clone(&self) -> Self {
        Document {
            id: NEXT_DOCUMENT_ID.fetch_add(1, Ordering::Relaxed),
            revision: 0,
            nodes: self.nodes.clone(),
            order: OnceCell::new(),
        }
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Create an empty document holding only its root node.
    pub fn new() -> Self {
        Document {
            id: NEXT_DOCUMENT_ID.fetch_add(1, Ordering::Relaxed),
            revision: 0,
            nodes: vec![NodeEntry { data: NodeData::Document, parent: None, children: Vec::new() }],
            order: OnceCell::new(),
        }
    }

    /// Parse a well-formed XML fragment with a single root element.
    pub fn parse(input: &str) -> Result<Document, XmlError> {
        XmlReader { input, pos: 0 }.read()
    }

    pub fn root_id(&self) -> NodeId {
        NodeId(0)
    }

    pub fn root(&self) -> NodeRef<'_> {
        NodeRef { doc: self, id: NodeId(0) }
    }

    /// The first element child of the root, if any.
    pub fn document_element(&self) -> Option<NodeRef<'_>> {
        self.root().children().find(|n| n.kind() == NodeKind::Element)
    }

    pub fn get(&self, id: NodeId) -> Option<NodeRef<'_>> {
        (id.0 < self.nodes.len()).then_some(NodeRef { doc: self, id })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn append_element(&mut self, parent: NodeId, name: impl Into<String>) -> NodeId {
        self.append(parent, NodeData::Element { name: name.into(), attributes: Vec::new() })
    }

    pub fn append_text(&mut self, parent: NodeId, text: impl Into<String>) -> NodeId {
        self.append(parent, NodeData::Text(text.into()))
    }

    pub fn append_comment(&mut self, parent: NodeId, text: impl Into<String>) -> NodeId {
        self.append(parent, NodeData::Comment(text.into()))
    }

    pub fn append_processing_instruction(
        &mut self,
        parent: NodeId,
        target: impl Into<String>,
        data: impl Into<String>,
    ) -> NodeId {
        self.append(parent, NodeData::ProcessingInstruction { target: target.into(), data: data.into() })
    }

    /// Set (or replace) an attribute on an element. Ignored for other node kinds.
    pub fn set_attribute(&mut self, id: NodeId, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        if let Some(NodeEntry { data: NodeData::Element { attributes, .. }, .. }) = self.nodes.get_mut(id.0) {
            match attributes.iter_mut().find(|(k, _)| *k == name) {
                Some(slot) => slot.1 = value,
                None => attributes.push((name, value)),
            }
            self.touch();
        }
    }

    fn append(&mut self, parent: NodeId, data: NodeData) -> NodeId {
        debug_assert!(
            matches!(self.nodes[parent.0].data, NodeData::Document | NodeData::Element { .. }),
            "only documents and elements can have children"
        );
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeEntry { data, parent: Some(parent), children: Vec::new() });
        self.nodes[parent.0].children.push(id);
        self.touch();
        id
    }

    fn touch(&mut self) {
        self.revision += 1;
        self.order.take();
    }

    fn order_of(&self, id: NodeId) -> usize {
        let order = self.order.get_or_init(|| {
            let mut order = vec![0; self.nodes.len()];
            let mut stack = vec![NodeId(0)];
            let mut next = 0;
            while let Some(id) = stack.pop() {
                order[id.0] = next;
                next += 1;
                stack.extend(self.nodes[id.0].children.iter().rev().copied());
            }
            order
        });
        order[id.0]
    }
}

/// Borrowed handle to one node of a [`Document`].
#[derive(Clone, Copy)]
pub struct NodeRef<'d> {
    doc: &'d Document,
    id: NodeId,
}

impl PartialEq for NodeRef<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.doc, other.doc) && self.id == other.id
    }
}

impl Eq for NodeRef<'_> {}

impl fmt::Debug for NodeRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.entry().data {
            NodeData::Document => write!(f, "#document"),
            NodeData::Element { name, .. } => write!(f, "<{}>#{}", name, self.id.0),
            NodeData::Text(text) => write!(f, "#text({:?})", text),
            NodeData::Comment(text) => write!(f, "#comment({:?})", text),
            NodeData::ProcessingInstruction { target, .. } => write!(f, "<?{}?>#{}", target, self.id.0),
        }
    }
}

impl<'d> NodeRef<'d> {
    fn entry(&self) -> &'d NodeEntry {
        &self.doc.nodes[self.id.0]
    }

    fn at(&self, id: NodeId) -> NodeRef<'d> {
        NodeRef { doc: self.doc, id }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn document(&self) -> &'d Document {
        self.doc
    }

    pub fn identity(&self) -> NodeIdentity {
        NodeIdentity { document: self.doc.id, revision: self.doc.revision, node: self.id }
    }

    pub fn kind(&self) -> NodeKind {
        match self.entry().data {
            NodeData::Document => NodeKind::Document,
            NodeData::Element { .. } => NodeKind::Element,
            NodeData::Text(_) => NodeKind::Text,
            NodeData::Comment(_) => NodeKind::Comment,
            NodeData::ProcessingInstruction { .. } => NodeKind::ProcessingInstruction,
        }
    }

    pub fn is_element(&self) -> bool {
        self.kind() == NodeKind::Element
    }

    /// Element name or processing-instruction target.
    pub fn name(&self) -> Option<&'d str> {
        match &self.entry().data {
            NodeData::Element { name, .. } => Some(name.as_str()),
            NodeData::ProcessingInstruction { target, .. } => Some(target.as_str()),
            _ => None,
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&'d str> {
        self.attributes().iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
    }

    pub fn attributes(&self) -> &'d [(String, String)] {
        match &self.entry().data {
            NodeData::Element { attributes, .. } => attributes,
            _ => &[],
        }
    }

    pub fn parent(&self) -> Option<NodeRef<'d>> {
        self.entry().parent.map(|id| self.at(id))
    }

    pub fn children(&self) -> impl DoubleEndedIterator<Item = NodeRef<'d>> + use<'d> {
        let doc = self.doc;
        self.entry().children.iter().map(move |&id| NodeRef { doc, id })
    }

    pub fn child_elements(&self) -> impl Iterator<Item = NodeRef<'d>> + use<'d> {
        self.children().filter(|n| n.is_element())
    }

    /// Siblings before this node, nearest first.
    pub fn preceding_siblings(&self) -> Vec<NodeRef<'d>> {
        let Some(parent) = self.parent() else {
            return Vec::new();
        };
        let siblings = &parent.entry().children;
        let pos = siblings.iter().position(|&id| id == self.id).unwrap_or(0);
        siblings[..pos].iter().rev().map(|&id| self.at(id)).collect()
    }

    /// Siblings after this node, nearest first.
    pub fn following_siblings(&self) -> Vec<NodeRef<'d>> {
        let Some(parent) = self.parent() else {
            return Vec::new();
        };
        let siblings = &parent.entry().children;
        match siblings.iter().position(|&id| id == self.id) {
            Some(pos) => siblings[pos + 1..].iter().map(|&id| self.at(id)).collect(),
            None => Vec::new(),
        }
    }

    /// Ancestors, nearest first.
    pub fn ancestors(&self) -> Vec<NodeRef<'d>> {
        let mut out = Vec::new();
        let mut current = self.parent();
        while let Some(node) = current {
            out.push(node);
            current = node.parent();
        }
        out
    }

    /// Descendants in document order, excluding `self`.
    pub fn descendants(&self) -> Vec<NodeRef<'d>> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeRef<'d>> = self.children().rev().collect();
        while let Some(node) = stack.pop() {
            out.push(node);
            stack.extend(node.children().rev());
        }
        out
    }

    /// Character data of text, comment and processing-instruction nodes.
    pub fn value(&self) -> Option<&'d str> {
        match &self.entry().data {
            NodeData::Text(text) | NodeData::Comment(text) => Some(text.as_str()),
            NodeData::ProcessingInstruction { data, .. } => Some(data.as_str()),
            _ => None,
        }
    }

    /// Concatenated text of all descendant text nodes (or the node's own data).
    pub fn text_content(&self) -> String {
        match &self.entry().data {
            NodeData::Document | NodeData::Element { .. } => self
                .descendants()
                .into_iter()
                .filter_map(|n| match &n.entry().data {
                    NodeData::Text(text) => Some(text.as_str()),
                    _ => None,
                })
                .collect(),
            _ => self.value().unwrap_or_default().to_string(),
        }
    }

    /// Pre-order position of the node within its document.
    pub fn document_order(&self) -> usize {
        self.doc.order_of(self.id)
    }
}

// --- XML reader --------------------------------------------------------------

struct XmlReader<'a> {
    input: &'a str,
    pos: usize,
}

impl XmlReader<'_> {
    fn error(&self, message: impl Into<String>) -> XmlError {
        XmlError { offset: self.pos, message: message.into() }
    }

    fn rest(&self) -> &str {
        &self.input[self.pos..]
    }

    fn read(mut self) -> Result<Document, XmlError> {
        let mut doc = Document::new();
        let mut stack = vec![doc.root_id()];

        while self.pos < self.input.len() {
            let parent = *stack.last().unwrap_or(&doc.root_id());
            if self.rest().starts_with("<!--") {
                let body = self.take_delimited("<!--", "-->")?;
                doc.append_comment(parent, body);
            } else if self.rest().starts_with("<![CDATA[") {
                let body = self.take_delimited("<![CDATA[", "]]>")?;
                if stack.len() == 1 {
                    return Err(self.error("character data outside the root element"));
                }
                doc.append_text(parent, body);
            } else if self.rest().starts_with("<!") {
                // DOCTYPE and friends carry nothing speech rules can use.
                self.take_delimited("<!", ">")?;
            } else if self.rest().starts_with("<?") {
                let body = self.take_delimited("<?", "?>")?;
                let (target, data) = body.split_once(char::is_whitespace).unwrap_or((body.as_str(), ""));
                if !target.eq_ignore_ascii_case("xml") {
                    doc.append_processing_instruction(parent, target, data.trim());
                }
            } else if self.rest().starts_with("</") {
                self.pos += 2;
                let name = self.take_name()?;
                self.skip_whitespace();
                self.expect('>')?;
                let open = doc.get(parent).and_then(|n| n.name()).unwrap_or_default();
                if stack.len() == 1 || open != name {
                    return Err(self.error(format!("unexpected closing tag `{}`", name)));
                }
                stack.pop();
            } else if self.rest().starts_with('<') {
                if stack.len() == 1 && doc.document_element().is_some() {
                    return Err(self.error("more than one root element"));
                }
                self.pos += 1;
                let name = self.take_name()?;
                let element = doc.append_element(parent, name);
                let self_closing = self.read_attributes(&mut doc, element)?;
                if !self_closing {
                    stack.push(element);
                }
            } else {
                let end = self.rest().find('<').map_or(self.input.len(), |i| self.pos + i);
                let raw = &self.input[self.pos..end];
                if !raw.trim().is_empty() {
                    if stack.len() == 1 {
                        return Err(self.error("text outside the root element"));
                    }
                    let text = decode_entities(raw).map_err(|m| self.error(m))?;
                    doc.append_text(parent, text);
                }
                self.pos = end;
            }
        }

        if stack.len() > 1 {
            return Err(self.error("unclosed element at end of input"));
        }
        if doc.document_element().is_none() {
            return Err(self.error("no root element"));
        }
        Ok(doc)
    }

    fn take_delimited(&mut self, open: &str, close: &str) -> Result<String, XmlError> {
        let start = self.pos + open.len();
        match self.input[start..].find(close) {
            Some(len) => {
                self.pos = start + len + close.len();
                Ok(self.input[start..start + len].to_string())
            }
            None => Err(self.error(format!("missing `{}`", close))),
        }
    }

    fn take_name(&mut self) -> Result<String, XmlError> {
        let len = self
            .rest()
            .find(|c: char| c.is_whitespace() || matches!(c, '/' | '>' | '=' | '<'))
            .unwrap_or(self.rest().len());
        if len == 0 {
            return Err(self.error("expected a name"));
        }
        let name = self.rest()[..len].to_string();
        self.pos += len;
        Ok(name)
    }

    fn skip_whitespace(&mut self) {
        let len = self.rest().len() - self.rest().trim_start().len();
        self.pos += len;
    }

    fn expect(&mut self, c: char) -> Result<(), XmlError> {
        if self.rest().starts_with(c) {
            self.pos += c.len_utf8();
            Ok(())
        } else {
            Err(self.error(format!("expected `{}`", c)))
        }
    }

    /// Reads attributes up to the end of a start tag; returns true for `/>`.
    fn read_attributes(&mut self, doc: &mut Document, element: NodeId) -> Result<bool, XmlError> {
        loop {
            self.skip_whitespace();
            if self.rest().starts_with("/>") {
                self.pos += 2;
                return Ok(true);
            }
            if self.rest().starts_with('>') {
                self.pos += 1;
                return Ok(false);
            }
            if self.rest().is_empty() {
                return Err(self.error("unterminated start tag"));
            }
            let name = self.take_name()?;
            self.skip_whitespace();
            self.expect('=')?;
            self.skip_whitespace();
            let quote = match self.rest().chars().next() {
                Some(q @ ('"' | '\'')) => q,
                _ => return Err(self.error("attribute value must be quoted")),
            };
            self.pos += 1;
            let len = self.rest().find(quote).ok_or_else(|| self.error("unterminated attribute value"))?;
            let value = decode_entities(&self.rest()[..len]).map_err(|m| self.error(m))?;
            self.pos += len + 1;
            doc.set_attribute(element, name, value);
        }
    }
}

fn decode_entities(raw: &str) -> Result<String, String> {
    if !raw.contains('&') {
        return Ok(raw.to_string());
    }
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp + 1..];
        let semi = tail.find(';').ok_or_else(|| format!("unterminated entity in `{}`", raw))?;
        let entity = &tail[..semi];
        let decoded = match entity {
            "lt" => '<',
            "gt" => '>',
            "amp" => '&',
            "quot" => '"',
            "apos" => '\'',
            _ => {
                let code = if let Some(hex) = entity.strip_prefix("#x").or_else(|| entity.strip_prefix("#X")) {
                    u32::from_str_radix(hex, 16).ok()
                } else if let Some(dec) = entity.strip_prefix('#') {
                    dec.parse::<u32>().ok()
                } else {
                    None
                };
                code.and_then(char::from_u32).ok_or_else(|| format!("unknown entity `&{};`", entity))?
            }
        };
        out.push(decoded);
        rest = &tail[semi + 1..];
    }
    out.push_str(rest);
    Ok(out)
}
