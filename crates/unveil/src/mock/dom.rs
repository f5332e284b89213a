//! In-memory document for driving the engine without a browser
//!
//! An arena of elements with a base style map, an `!important` inline layer,
//! and a fixed bounding rect per element. Handles are cheap to clone and
//! share the same tree, so a test can keep one while the engine owns another.
//!
//! Structural insertions and forced style writes are queued as
//! [`Mutation`] records the way a `MutationObserver` would report them;
//! [`MockDom::take_mutations`] drains the queue.

use crate::dom::{ComputedStyle, Dom, Mutation, Rect, Viewport};
use crate::result::{DomError, DomResult};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

/// Handle to an element in a [`MockDom`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MockNode(usize);

/// Element description used to populate a [`MockDom`]
#[derive(Debug, Clone, PartialEq)]
pub struct MockElement {
    tag: String,
    attributes: BTreeMap<String, String>,
    style: BTreeMap<String, String>,
    rect: Rect,
    style_fails: bool,
    geometry_fails: bool,
    attributes_fail: bool,
}

impl MockElement {
    /// Element with the given tag, static position, zero-size rect
    #[must_use]
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            attributes: BTreeMap::new(),
            style: BTreeMap::new(),
            rect: Rect::default(),
            style_fails: false,
            geometry_fails: false,
            attributes_fail: false,
        }
    }

    /// Set an attribute
    #[must_use]
    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attributes
            .insert(name.to_ascii_lowercase(), value.to_string());
        self
    }

    /// Set `class`
    #[must_use]
    pub fn class(self, class: &str) -> Self {
        self.attr("class", class)
    }

    /// Set `id`
    #[must_use]
    pub fn id(self, id: &str) -> Self {
        self.attr("id", id)
    }

    /// Set `role`
    #[must_use]
    pub fn role(self, role: &str) -> Self {
        self.attr("role", role)
    }

    /// Set a computed style property
    #[must_use]
    pub fn style(mut self, property: &str, value: &str) -> Self {
        self.style
            .insert(property.to_ascii_lowercase(), value.to_string());
        self
    }

    /// Shorthand for `position`
    #[must_use]
    pub fn position(self, position: &str) -> Self {
        self.style("position", position)
    }

    /// Shorthand for `z-index`
    #[must_use]
    pub fn z_index(self, z_index: i64) -> Self {
        self.style("z-index", &z_index.to_string())
    }

    /// Bounding rect relative to the viewport
    #[must_use]
    pub const fn rect(mut self, rect: Rect) -> Self {
        self.rect = rect;
        self
    }

    /// Make computed style reads fail (cross-origin style, host exception)
    #[must_use]
    pub const fn failing_style(mut self) -> Self {
        self.style_fails = true;
        self
    }

    /// Make bounding rect reads fail
    #[must_use]
    pub const fn failing_geometry(mut self) -> Self {
        self.geometry_fails = true;
        self
    }

    /// Make attribute reads fail. Selector matching still sees the
    /// attributes.
    #[must_use]
    pub const fn failing_attributes(mut self) -> Self {
        self.attributes_fail = true;
        self
    }
}

#[derive(Debug)]
struct Slot {
    element: MockElement,
    important: BTreeMap<String, String>,
    parent: Option<usize>,
    children: Vec<usize>,
    removals: usize,
    forced_writes: usize,
}

#[derive(Debug)]
struct Tree {
    slots: Vec<Slot>,
    viewport: Viewport,
    stylesheets: BTreeMap<String, String>,
    stylesheet_writes: usize,
    mutations: Vec<Mutation<MockNode>>,
    queries_fail: bool,
    viewport_fails: bool,
}

const ROOT: usize = 0;
const HEAD: usize = 1;
const BODY: usize = 2;

impl Tree {
    fn slot(&self, node: MockNode) -> DomResult<&Slot> {
        self.slots
            .get(node.0)
            .ok_or_else(|| DomError::Host(format!("unknown node {}", node.0)))
    }

    fn slot_mut(&mut self, node: MockNode) -> DomResult<&mut Slot> {
        self.slots
            .get_mut(node.0)
            .ok_or_else(|| DomError::Host(format!("unknown node {}", node.0)))
    }

    fn push(&mut self, element: MockElement) -> usize {
        self.slots.push(Slot {
            element,
            important: BTreeMap::new(),
            parent: None,
            children: Vec::new(),
            removals: 0,
            forced_writes: 0,
        });
        self.slots.len() - 1
    }

    fn connected(&self, index: usize) -> bool {
        let mut current = index;
        loop {
            if current == ROOT {
                return true;
            }
            match self.slots.get(current).and_then(|s| s.parent) {
                Some(parent) => current = parent,
                None => return false,
            }
        }
    }

    /// Whether `ancestor` is `index` or one of its ancestors
    fn is_inclusive_ancestor(&self, ancestor: usize, index: usize) -> bool {
        let mut current = Some(index);
        while let Some(i) = current {
            if i == ancestor {
                return true;
            }
            current = self.slots.get(i).and_then(|s| s.parent);
        }
        false
    }

    fn attach(&mut self, parent: usize, child: usize) {
        self.unlink(child);
        self.slots[child].parent = Some(parent);
        self.slots[parent].children.push(child);
        if self.connected(parent) {
            self.mutations.push(Mutation::added(MockNode(child)));
        }
    }

    fn unlink(&mut self, index: usize) {
        if let Some(parent) = self.slots[index].parent.take() {
            self.slots[parent].children.retain(|&c| c != index);
        }
    }

    fn walk(&self, from: usize, include_self: bool, limit: usize, out: &mut Vec<MockNode>) {
        let mut stack = vec![from];
        while let Some(index) = stack.pop() {
            if out.len() >= limit {
                return;
            }
            if include_self || index != from {
                out.push(MockNode(index));
            }
            stack.extend(self.slots[index].children.iter().rev());
        }
    }
}

fn effective_value(slot: &Slot, property: &str) -> Option<String> {
    slot.important
        .get(property)
        .or_else(|| slot.element.style.get(property))
        .cloned()
}

/// Shared in-memory document
#[derive(Clone)]
pub struct MockDom {
    tree: Rc<RefCell<Tree>>,
}

impl fmt::Debug for MockDom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tree = self.tree.borrow();
        f.debug_struct("MockDom")
            .field("nodes", &tree.slots.len())
            .field("viewport", &tree.viewport)
            .field("pending_mutations", &tree.mutations.len())
            .finish()
    }
}

impl MockDom {
    /// Empty `<html><head/><body/></html>` document with the given viewport
    #[must_use]
    pub fn new(width: f64, height: f64) -> Self {
        let mut tree = Tree {
            slots: Vec::new(),
            viewport: Viewport::new(width, height),
            stylesheets: BTreeMap::new(),
            stylesheet_writes: 0,
            mutations: Vec::new(),
            queries_fail: false,
            viewport_fails: false,
        };
        let full = Rect::new(0.0, 0.0, width, height);
        tree.push(MockElement::new("html").rect(full));
        tree.push(MockElement::new("head").style("display", "none"));
        tree.push(MockElement::new("body").rect(full));
        tree.slots[HEAD].parent = Some(ROOT);
        tree.slots[BODY].parent = Some(ROOT);
        tree.slots[ROOT].children = vec![HEAD, BODY];
        Self {
            tree: Rc::new(RefCell::new(tree)),
        }
    }

    /// Allocate a detached element
    pub fn create(&self, element: MockElement) -> MockNode {
        MockNode(self.tree.borrow_mut().push(element))
    }

    /// Attach `child` as the last child of `parent`, recording an insertion
    /// when `parent` is in the document
    ///
    /// # Errors
    ///
    /// Rejects unknown nodes and any append that would make `child` its own
    /// ancestor, leaving the tree unchanged.
    pub fn append(&self, parent: &MockNode, child: &MockNode) -> DomResult<()> {
        let mut tree = self.tree.borrow_mut();
        tree.slot(*parent)?;
        tree.slot(*child)?;
        if tree.is_inclusive_ancestor(child.0, parent.0) {
            return Err(DomError::mutation(format!(
                "hierarchy request: node {} cannot contain its ancestor {}",
                parent.0, child.0
            )));
        }
        tree.attach(parent.0, child.0);
        Ok(())
    }

    /// Create and append under `parent`
    pub fn append_child(&self, parent: &MockNode, element: MockElement) -> MockNode {
        let mut tree = self.tree.borrow_mut();
        let node = tree.push(element);
        tree.attach(parent.0, node);
        MockNode(node)
    }

    /// Create and append under `<body>`
    pub fn append_to_body(&self, element: MockElement) -> MockNode {
        self.append_child(&MockNode(BODY), element)
    }

    /// Detach a node the way page script would; not counted as a removal
    pub fn detach(&self, node: &MockNode) {
        self.tree.borrow_mut().unlink(node.0);
    }

    /// Set an attribute as page script would, recording the change
    pub fn set_attribute(&self, node: &MockNode, name: &str, value: &str) {
        let mut tree = self.tree.borrow_mut();
        let name = name.to_ascii_lowercase();
        tree.slots[node.0]
            .element
            .attributes
            .insert(name.clone(), value.to_string());
        tree.mutations.push(Mutation::attribute(*node, &name));
    }

    /// Change a base style property as page script would, recording a
    /// `style` attribute change
    pub fn set_style(&self, node: &MockNode, property: &str, value: &str) {
        let mut tree = self.tree.borrow_mut();
        tree.slots[node.0]
            .element
            .style
            .insert(property.to_ascii_lowercase(), value.to_string());
        tree.mutations.push(Mutation::attribute(*node, "style"));
    }

    /// Resize the viewport
    pub fn set_viewport(&self, width: f64, height: f64) {
        self.tree.borrow_mut().viewport = Viewport::new(width, height);
    }

    /// Make every selector query fail
    pub fn fail_queries(&self, fail: bool) {
        self.tree.borrow_mut().queries_fail = fail;
    }

    /// Make viewport reads fail
    pub fn fail_viewport(&self, fail: bool) {
        self.tree.borrow_mut().viewport_fails = fail;
    }

    /// Drain queued mutation records
    pub fn take_mutations(&self) -> Vec<Mutation<MockNode>> {
        std::mem::take(&mut self.tree.borrow_mut().mutations)
    }

    /// Effective value of a style property: `!important` inline layer first,
    /// then the base style
    #[must_use]
    pub fn style_value(&self, node: &MockNode, property: &str) -> Option<String> {
        let tree = self.tree.borrow();
        let slot = tree.slots.get(node.0)?;
        effective_value(slot, property)
    }

    /// Number of times the engine removed this node
    #[must_use]
    pub fn removal_count(&self, node: &MockNode) -> usize {
        self.tree.borrow().slots.get(node.0).map_or(0, |s| s.removals)
    }

    /// Number of forced style writes applied to this node
    #[must_use]
    pub fn forced_write_count(&self, node: &MockNode) -> usize {
        self.tree
            .borrow()
            .slots
            .get(node.0)
            .map_or(0, |s| s.forced_writes)
    }

    /// Contents of the stylesheet with the given marker id
    #[must_use]
    pub fn stylesheet(&self, marker: &str) -> Option<String> {
        self.tree.borrow().stylesheets.get(marker).cloned()
    }

    /// Number of injected stylesheets
    #[must_use]
    pub fn stylesheet_count(&self) -> usize {
        self.tree.borrow().stylesheets.len()
    }

    /// Number of stylesheet writes (inserts and replacements)
    #[must_use]
    pub fn stylesheet_writes(&self) -> usize {
        self.tree.borrow().stylesheet_writes
    }

    /// Snapshot of every connected node's forced styles, for comparing
    /// document states
    #[must_use]
    pub fn snapshot(&self) -> Vec<(MockNode, BTreeMap<String, String>)> {
        let tree = self.tree.borrow();
        let mut nodes = Vec::new();
        tree.walk(ROOT, true, usize::MAX, &mut nodes);
        nodes
            .into_iter()
            .map(|n| (n, tree.slots[n.0].important.clone()))
            .collect()
    }
}

// =============================================================================
// SELECTORS
// =============================================================================

/// One compound selector: optional tag plus class, id and attribute filters
#[derive(Debug, Default)]
struct Compound {
    tag: Option<String>,
    classes: Vec<String>,
    id: Option<String>,
    attributes: Vec<(String, Option<String>)>,
}

impl Compound {
    fn parse(text: &str) -> Option<Self> {
        let mut compound = Self::default();
        let mut rest = text.trim();
        if rest.is_empty() {
            return None;
        }
        let tag_end = rest.find(['.', '#', '[']).unwrap_or(rest.len());
        if tag_end > 0 {
            let tag = &rest[..tag_end];
            if !tag.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
                return None;
            }
            compound.tag = Some(tag.to_ascii_lowercase());
            rest = &rest[tag_end..];
        }
        while let Some(first) = rest.chars().next() {
            match first {
                '.' | '#' => {
                    let body = &rest[1..];
                    let end = body.find(['.', '#', '[']).unwrap_or(body.len());
                    let name = &body[..end];
                    if name.is_empty() {
                        return None;
                    }
                    if first == '.' {
                        compound.classes.push(name.to_string());
                    } else {
                        compound.id = Some(name.to_string());
                    }
                    rest = &body[end..];
                }
                '[' => {
                    let close = rest.find(']')?;
                    let inner = &rest[1..close];
                    let (name, value) = match inner.split_once('=') {
                        Some((n, v)) => (n, Some(v.trim().trim_matches(['"', '\'']).to_string())),
                        None => (inner, None),
                    };
                    compound
                        .attributes
                        .push((name.trim().to_ascii_lowercase(), value));
                    rest = &rest[close + 1..];
                }
                _ => return None,
            }
        }
        Some(compound)
    }

    fn matches(&self, element: &MockElement) -> bool {
        if let Some(tag) = &self.tag {
            if &element.tag != tag {
                return false;
            }
        }
        if let Some(id) = &self.id {
            if element.attributes.get("id") != Some(id) {
                return false;
            }
        }
        let class_list = element.attributes.get("class").map_or("", String::as_str);
        if !self
            .classes
            .iter()
            .all(|c| class_list.split_whitespace().any(|have| have == c))
        {
            return false;
        }
        self.attributes.iter().all(|(name, value)| {
            match (element.attributes.get(name), value) {
                (Some(have), Some(want)) => have == want,
                (Some(_), None) => true,
                (None, _) => false,
            }
        })
    }
}

// =============================================================================
// DOM IMPL
// =============================================================================

impl Dom for MockDom {
    type Node = MockNode;

    fn viewport(&self) -> DomResult<Viewport> {
        let tree = self.tree.borrow();
        if tree.viewport_fails {
            return Err(DomError::geometry("viewport unavailable"));
        }
        Ok(tree.viewport)
    }

    fn document_element(&self) -> Option<MockNode> {
        Some(MockNode(ROOT))
    }

    fn body(&self) -> Option<MockNode> {
        Some(MockNode(BODY))
    }

    fn tag_name(&self, node: &MockNode) -> DomResult<String> {
        Ok(self.tree.borrow().slot(*node)?.element.tag.clone())
    }

    fn attribute(&self, node: &MockNode, name: &str) -> DomResult<Option<String>> {
        let tree = self.tree.borrow();
        let element = &tree.slot(*node)?.element;
        if element.attributes_fail {
            return Err(DomError::Host(format!("getAttribute('{name}') threw")));
        }
        Ok(element.attributes.get(&name.to_ascii_lowercase()).cloned())
    }

    fn computed_style(&self, node: &MockNode) -> DomResult<ComputedStyle> {
        let tree = self.tree.borrow();
        let slot = tree.slot(*node)?;
        if !tree.connected(node.0) {
            return Err(DomError::Detached);
        }
        if slot.element.style_fails {
            return Err(DomError::style("access denied"));
        }
        let get = |property: &str, default: &str| {
            effective_value(slot, property).unwrap_or_else(|| default.to_string())
        };
        Ok(ComputedStyle::from_css(
            &get("display", "block"),
            &get("visibility", "visible"),
            &get("position", "static"),
            &get("z-index", "auto"),
        ))
    }

    fn bounding_rect(&self, node: &MockNode) -> DomResult<Rect> {
        let tree = self.tree.borrow();
        let slot = tree.slot(*node)?;
        if !tree.connected(node.0) {
            return Err(DomError::Detached);
        }
        if slot.element.geometry_fails {
            return Err(DomError::geometry("layout unavailable"));
        }
        Ok(slot.element.rect)
    }

    fn is_connected(&self, node: &MockNode) -> bool {
        self.tree.borrow().connected(node.0)
    }

    fn elements(&self, limit: usize) -> DomResult<Vec<MockNode>> {
        let mut out = Vec::new();
        self.tree.borrow().walk(ROOT, true, limit, &mut out);
        Ok(out)
    }

    fn descendants(&self, node: &MockNode, limit: usize) -> DomResult<Vec<MockNode>> {
        let tree = self.tree.borrow();
        tree.slot(*node)?;
        let mut out = Vec::new();
        tree.walk(node.0, false, limit, &mut out);
        Ok(out)
    }

    fn query_all(&self, selector: &str) -> DomResult<Vec<MockNode>> {
        let tree = self.tree.borrow();
        if tree.queries_fail {
            return Err(DomError::query(selector, "query failed"));
        }
        let compounds = selector
            .split(',')
            .map(Compound::parse)
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| DomError::query(selector, "unsupported selector"))?;
        let mut all = Vec::new();
        tree.walk(ROOT, true, usize::MAX, &mut all);
        Ok(all
            .into_iter()
            .filter(|n| {
                compounds
                    .iter()
                    .any(|c| c.matches(&tree.slots[n.0].element))
            })
            .collect())
    }

    fn set_important(&self, node: &MockNode, property: &str, value: &str) -> DomResult<()> {
        let mut tree = self.tree.borrow_mut();
        let slot = tree.slot_mut(*node)?;
        slot.important
            .insert(property.to_ascii_lowercase(), value.to_string());
        slot.forced_writes += 1;
        tree.mutations.push(Mutation::attribute(*node, "style"));
        Ok(())
    }

    fn remove(&self, node: &MockNode) -> DomResult<()> {
        let mut tree = self.tree.borrow_mut();
        tree.slot(*node)?;
        if node.0 == ROOT || !tree.connected(node.0) {
            return Err(DomError::Detached);
        }
        tree.unlink(node.0);
        tree.slots[node.0].removals += 1;
        Ok(())
    }

    fn upsert_stylesheet(&self, marker: &str, css: &str) -> DomResult<()> {
        let mut tree = self.tree.borrow_mut();
        tree.stylesheets.insert(marker.to_string(), css.to_string());
        tree.stylesheet_writes += 1;
        Ok(())
    }
}
