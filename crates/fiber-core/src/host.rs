//! The host platform capability and an in-memory reference host.

use std::fmt;

use ahash::RandomState;
use hashbrown::HashMap;

use crate::element::{event_name, EventHandler, PropValue, Props, TEXT_VALUE};

pub type HostNodeId = usize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostError {
    Missing { node: String },
    Rejected { operation: &'static str, reason: String },
}

impl fmt::Display for HostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostError::Missing { node } => write!(f, "host node {node} missing"),
            HostError::Rejected { operation, reason } => {
                write!(f, "host rejected {operation}: {reason}")
            }
        }
    }
}

impl std::error::Error for HostError {}

/// Primitive operations of the platform that owns the rendered nodes.
///
/// The core never retries a failed operation and never rolls back the
/// operations that already succeeded for the same node.
pub trait Host {
    type Handle: Clone + fmt::Debug + 'static;

    fn create_node(&mut self, kind: &str, is_text: bool) -> Result<Self::Handle, HostError>;
    fn set_property(
        &mut self,
        node: &Self::Handle,
        name: &str,
        value: &PropValue,
    ) -> Result<(), HostError>;
    fn clear_property(&mut self, node: &Self::Handle, name: &str) -> Result<(), HostError>;
    fn add_listener(
        &mut self,
        node: &Self::Handle,
        event: &str,
        handler: &EventHandler,
    ) -> Result<(), HostError>;
    fn remove_listener(
        &mut self,
        node: &Self::Handle,
        event: &str,
        handler: &EventHandler,
    ) -> Result<(), HostError>;
    fn append_child(&mut self, parent: &Self::Handle, child: &Self::Handle)
        -> Result<(), HostError>;
    fn remove_child(&mut self, parent: &Self::Handle, child: &Self::Handle)
        -> Result<(), HostError>;
}

/// Splits an attribute into its event name and handler when it is a
/// listener. Anything else, `onLine: true` included, is a plain attribute.
fn as_listener<'a>(name: &str, value: &'a PropValue) -> Option<(String, &'a EventHandler)> {
    match value {
        PropValue::Handler(handler) => event_name(name).map(|event| (event, handler)),
        _ => None,
    }
}

fn plain_value<'a>(props: &'a Props, name: &str) -> Option<&'a PropValue> {
    props
        .get(name)
        .filter(|value| as_listener(name, value).is_none())
}

/// Brings the attributes and listeners of `node` from `prev` to `next`.
///
/// Stale listeners and attributes go first so a node never carries two
/// listeners for the same attribute at once.
pub fn update_host_node<H: Host + ?Sized>(
    host: &mut H,
    node: &H::Handle,
    prev: &Props,
    next: &Props,
) -> Result<(), HostError> {
    for (name, value) in prev.attributes() {
        let Some((event, handler)) = as_listener(name, value) else {
            continue;
        };
        if next.get(name) != Some(value) {
            host.remove_listener(node, &event, handler)?;
        }
    }

    for (name, value) in prev.attributes() {
        if as_listener(name, value).is_none() && plain_value(next, name).is_none() {
            host.clear_property(node, name)?;
        }
    }

    for (name, value) in next.attributes() {
        if as_listener(name, value).is_none() && prev.get(name) != Some(value) {
            if event_name(name).is_some() {
                log::debug!("attribute {name} looks like a listener but holds no handler");
            }
            host.set_property(node, name, value)?;
        }
    }

    for (name, value) in next.attributes() {
        let Some((event, handler)) = as_listener(name, value) else {
            continue;
        };
        if prev.get(name) != Some(value) {
            host.add_listener(node, &event, handler)?;
        }
    }
    Ok(())
}

struct MemoryNode {
    kind: String,
    is_text: bool,
    attributes: HashMap<String, PropValue, RandomState>,
    listeners: HashMap<String, Vec<EventHandler>, RandomState>,
    parent: Option<HostNodeId>,
    children: Vec<HostNodeId>,
}

impl MemoryNode {
    fn new(kind: &str, is_text: bool) -> Self {
        Self {
            kind: kind.to_owned(),
            is_text,
            attributes: HashMap::default(),
            listeners: HashMap::default(),
            parent: None,
            children: Vec::new(),
        }
    }
}

/// Host that keeps its node tree in memory.
///
/// Useful headless, in tests and as a reference for real hosts.
#[derive(Default)]
pub struct MemoryHost {
    nodes: Vec<Option<MemoryNode>>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    /// Creates a detached node to render into.
    pub fn create_container(&mut self, kind: &str) -> HostNodeId {
        self.insert(MemoryNode::new(kind, false))
    }

    pub fn len(&self) -> usize {
        self.nodes.iter().filter(|node| node.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, id: HostNodeId) -> bool {
        matches!(self.nodes.get(id), Some(Some(_)))
    }

    pub fn kind(&self, id: HostNodeId) -> Option<&str> {
        self.node(id).ok().map(|node| node.kind.as_str())
    }

    pub fn attribute(&self, id: HostNodeId, name: &str) -> Option<&PropValue> {
        self.node(id).ok()?.attributes.get(name)
    }

    pub fn children(&self, id: HostNodeId) -> &[HostNodeId] {
        self.node(id)
            .map(|node| node.children.as_slice())
            .unwrap_or_default()
    }

    pub fn parent(&self, id: HostNodeId) -> Option<HostNodeId> {
        self.node(id).ok()?.parent
    }

    pub fn listener_count(&self, id: HostNodeId, event: &str) -> usize {
        self.node(id)
            .ok()
            .and_then(|node| node.listeners.get(event))
            .map_or(0, Vec::len)
    }

    /// Concatenated value of every text node below `id`, in tree order.
    pub fn text_content(&self, id: HostNodeId) -> String {
        let mut output = String::new();
        self.collect_text(id, &mut output);
        output
    }

    /// Invokes the listeners registered for `event` on `id`.
    ///
    /// Returns how many listeners ran.
    pub fn dispatch_event(&self, id: HostNodeId, event: &str) -> Result<usize, HostError> {
        let handlers: Vec<EventHandler> = self
            .node(id)?
            .listeners
            .get(event)
            .cloned()
            .unwrap_or_default();
        for handler in &handlers {
            handler.call();
        }
        Ok(handlers.len())
    }

    pub fn dump_tree(&self, root: Option<HostNodeId>) -> String {
        let mut output = String::new();
        if let Some(root_id) = root {
            self.dump_node(&mut output, root_id, 0);
        } else {
            output.push_str("(no root)\n");
        }
        output
    }

    fn dump_node(&self, output: &mut String, id: HostNodeId, depth: usize) {
        let indent = "  ".repeat(depth);
        match self.node(id) {
            Ok(node) if node.is_text => {
                let value = node
                    .attributes
                    .get(TEXT_VALUE)
                    .map(ToString::to_string)
                    .unwrap_or_default();
                output.push_str(&format!("{indent}[{id}] {value:?}\n"));
            }
            Ok(node) => {
                let mut names: Vec<&String> = node.attributes.keys().collect();
                names.sort();
                let attributes: Vec<String> = names
                    .into_iter()
                    .map(|name| format!("{name}={}", node.attributes[name]))
                    .collect();
                output.push_str(&format!(
                    "{indent}[{id}] <{}> {}\n",
                    node.kind,
                    attributes.join(" ")
                ));
                for child in &node.children {
                    self.dump_node(output, *child, depth + 1);
                }
            }
            Err(_) => output.push_str(&format!("{indent}[{id}] (missing)\n")),
        }
    }

    fn collect_text(&self, id: HostNodeId, output: &mut String) {
        let Ok(node) = self.node(id) else {
            return;
        };
        if node.is_text {
            if let Some(value) = node.attributes.get(TEXT_VALUE) {
                output.push_str(&value.to_string());
            }
            return;
        }
        for child in &node.children {
            self.collect_text(*child, output);
        }
    }

    fn insert(&mut self, node: MemoryNode) -> HostNodeId {
        let id = self.nodes.len();
        self.nodes.push(Some(node));
        id
    }

    fn node(&self, id: HostNodeId) -> Result<&MemoryNode, HostError> {
        self.nodes
            .get(id)
            .and_then(Option::as_ref)
            .ok_or_else(|| HostError::Missing {
                node: id.to_string(),
            })
    }

    fn node_mut(&mut self, id: HostNodeId) -> Result<&mut MemoryNode, HostError> {
        self.nodes
            .get_mut(id)
            .and_then(Option::as_mut)
            .ok_or_else(|| HostError::Missing {
                node: id.to_string(),
            })
    }

    fn release(&mut self, id: HostNodeId) {
        let Some(node) = self.nodes.get_mut(id).and_then(Option::take) else {
            return;
        };
        for child in node.children {
            self.release(child);
        }
    }
}

impl Host for MemoryHost {
    type Handle = HostNodeId;

    fn create_node(&mut self, kind: &str, is_text: bool) -> Result<HostNodeId, HostError> {
        Ok(self.insert(MemoryNode::new(kind, is_text)))
    }

    fn set_property(
        &mut self,
        node: &HostNodeId,
        name: &str,
        value: &PropValue,
    ) -> Result<(), HostError> {
        self.node_mut(*node)?
            .attributes
            .insert(name.to_owned(), value.clone());
        Ok(())
    }

    fn clear_property(&mut self, node: &HostNodeId, name: &str) -> Result<(), HostError> {
        self.node_mut(*node)?.attributes.remove(name);
        Ok(())
    }

    fn add_listener(
        &mut self,
        node: &HostNodeId,
        event: &str,
        handler: &EventHandler,
    ) -> Result<(), HostError> {
        self.node_mut(*node)?
            .listeners
            .entry(event.to_owned())
            .or_default()
            .push(handler.clone());
        Ok(())
    }

    fn remove_listener(
        &mut self,
        node: &HostNodeId,
        event: &str,
        handler: &EventHandler,
    ) -> Result<(), HostError> {
        let node = self.node_mut(*node)?;
        if let Some(handlers) = node.listeners.get_mut(event) {
            handlers.retain(|registered| !registered.ptr_eq(handler));
            if handlers.is_empty() {
                node.listeners.remove(event);
            }
        }
        Ok(())
    }

    fn append_child(&mut self, parent: &HostNodeId, child: &HostNodeId) -> Result<(), HostError> {
        let previous_parent = self.node(*child)?.parent;
        if let Some(previous) = previous_parent {
            if let Ok(previous) = self.node_mut(previous) {
                previous.children.retain(|existing| existing != child);
            }
        }
        self.node_mut(*parent)?.children.push(*child);
        self.node_mut(*child)?.parent = Some(*parent);
        Ok(())
    }

    fn remove_child(&mut self, parent: &HostNodeId, child: &HostNodeId) -> Result<(), HostError> {
        let parent_node = self.node_mut(*parent)?;
        let Some(index) = parent_node.children.iter().position(|id| id == child) else {
            return Err(HostError::Missing {
                node: child.to_string(),
            });
        };
        parent_node.children.remove(index);
        self.release(*child);
        Ok(())
    }
}
