//! Host-independent description trees.
//!
//! An [`Element`] is the immutable `{ kind, props }` record produced on every
//! render. Elements are cheap to clone: the props (and therefore the children)
//! live behind an `Rc` and are shared with the fibers built from them.

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

/// Host kind used when creating text nodes.
pub const TEXT_KIND: &str = "#text";

/// Name of the single attribute carried by text elements.
pub const TEXT_VALUE: &str = "value";

/// Callback installed on a host node as an event listener.
///
/// Handlers compare by identity, so two handlers built from the same closure
/// source in different renders are different handlers.
#[derive(Clone)]
pub struct EventHandler(Rc<dyn Fn()>);

impl EventHandler {
    pub fn new(handler: impl Fn() + 'static) -> Self {
        Self(Rc::new(handler))
    }

    pub fn call(&self) {
        (self.0)()
    }

    pub fn ptr_eq(&self, other: &EventHandler) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for EventHandler {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for EventHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventHandler({:p})", Rc::as_ptr(&self.0) as *const ())
    }
}

/// Value of a single element attribute.
#[derive(Clone, Debug, PartialEq)]
pub enum PropValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Handler(EventHandler),
}

impl PropValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropValue::Str(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            PropValue::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_handler(&self) -> Option<&EventHandler> {
        match self {
            PropValue::Handler(handler) => Some(handler),
            _ => None,
        }
    }
}

impl fmt::Display for PropValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropValue::Str(value) => f.write_str(value),
            PropValue::Int(value) => write!(f, "{value}"),
            PropValue::Float(value) => write!(f, "{value}"),
            PropValue::Bool(value) => write!(f, "{value}"),
            PropValue::Handler(_) => f.write_str("[handler]"),
        }
    }
}

impl From<&str> for PropValue {
    fn from(value: &str) -> Self {
        PropValue::Str(value.to_owned())
    }
}

impl From<String> for PropValue {
    fn from(value: String) -> Self {
        PropValue::Str(value)
    }
}

impl From<i64> for PropValue {
    fn from(value: i64) -> Self {
        PropValue::Int(value)
    }
}

impl From<i32> for PropValue {
    fn from(value: i32) -> Self {
        PropValue::Int(i64::from(value))
    }
}

impl From<f64> for PropValue {
    fn from(value: f64) -> Self {
        PropValue::Float(value)
    }
}

impl From<bool> for PropValue {
    fn from(value: bool) -> Self {
        PropValue::Bool(value)
    }
}

impl From<EventHandler> for PropValue {
    fn from(handler: EventHandler) -> Self {
        PropValue::Handler(handler)
    }
}

/// Returns the event name for listener-like attribute names.
///
/// `onClick` maps to `click`; a bare `on` is a plain attribute.
pub fn event_name(attribute: &str) -> Option<String> {
    let rest = attribute.strip_prefix("on")?;
    if rest.is_empty() {
        return None;
    }
    Some(rest.to_lowercase())
}

/// Attribute name under which a listener for `event` is stored.
pub fn listener_attribute(event: &str) -> String {
    let mut chars = event.chars();
    match chars.next() {
        Some(first) => format!("on{}{}", first.to_uppercase(), chars.as_str()),
        None => String::from("on"),
    }
}

/// Attributes plus ordered children of an element.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Props {
    attributes: IndexMap<String, PropValue>,
    children: Vec<Element>,
}

impl Props {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<PropValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<PropValue>) {
        self.attributes.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&PropValue> {
        self.attributes.get(name)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(PropValue::as_str)
    }

    pub fn get_int(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(PropValue::as_int)
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&str, &PropValue)> {
        self.attributes
            .iter()
            .map(|(name, value)| (name.as_str(), value))
    }

    pub fn children(&self) -> &[Element] {
        &self.children
    }

    pub fn push_child(&mut self, child: impl Into<Element>) {
        self.children.push(child.into());
    }

    pub(crate) fn from_children(children: Vec<Element>) -> Self {
        Self {
            attributes: IndexMap::new(),
            children,
        }
    }
}

/// Signature of a description function.
pub type RenderFn = fn(&Props) -> Element;

/// A description function together with a display name.
///
/// Two components are the same kind when they point at the same function.
#[derive(Clone, Copy)]
pub struct Component {
    name: &'static str,
    render: RenderFn,
}

impl Component {
    pub const fn new(name: &'static str, render: RenderFn) -> Self {
        Self { name, render }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub(crate) fn render(&self, props: &Props) -> Element {
        (self.render)(props)
    }
}

impl PartialEq for Component {
    fn eq(&self, other: &Self) -> bool {
        self.render as usize == other.render as usize
    }
}

impl Eq for Component {}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Component({})", self.name)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ElementKind {
    Host(Rc<str>),
    Text,
    Component(Component),
}

impl From<&str> for ElementKind {
    fn from(name: &str) -> Self {
        ElementKind::Host(Rc::from(name))
    }
}

impl From<Component> for ElementKind {
    fn from(component: Component) -> Self {
        ElementKind::Component(component)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Element {
    kind: ElementKind,
    props: Rc<Props>,
}

impl Element {
    pub fn host(name: &str) -> Self {
        Self::new(ElementKind::from(name), Props::default())
    }

    pub fn component(component: Component) -> Self {
        Self::new(ElementKind::Component(component), Props::default())
    }

    pub fn text(value: impl Into<PropValue>) -> Self {
        Self::new(ElementKind::Text, Props::new().with(TEXT_VALUE, value))
    }

    pub fn new(kind: ElementKind, props: Props) -> Self {
        Self {
            kind,
            props: Rc::new(props),
        }
    }

    pub fn attr(mut self, name: impl Into<String>, value: impl Into<PropValue>) -> Self {
        Rc::make_mut(&mut self.props).insert(name, value);
        self
    }

    /// Installs `handler` as the listener for `event` (`"click"` -> `onClick`).
    pub fn on(self, event: &str, handler: impl Fn() + 'static) -> Self {
        self.attr(listener_attribute(event), EventHandler::new(handler))
    }

    pub fn child(mut self, child: impl Into<Element>) -> Self {
        Rc::make_mut(&mut self.props).push_child(child);
        self
    }

    pub fn children<I>(mut self, children: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Element>,
    {
        let props = Rc::make_mut(&mut self.props);
        for child in children {
            props.push_child(child);
        }
        self
    }

    pub fn kind(&self) -> &ElementKind {
        &self.kind
    }

    pub fn props(&self) -> &Props {
        &self.props
    }

    pub(crate) fn shared_props(&self) -> Rc<Props> {
        Rc::clone(&self.props)
    }
}

impl From<&str> for Element {
    fn from(value: &str) -> Self {
        Element::text(value)
    }
}

impl From<String> for Element {
    fn from(value: String) -> Self {
        Element::text(value)
    }
}

impl From<i64> for Element {
    fn from(value: i64) -> Self {
        Element::text(value)
    }
}

impl From<i32> for Element {
    fn from(value: i32) -> Self {
        Element::text(value)
    }
}

/// Builds a description node from a kind, its attributes and its children.
///
/// Children that are not elements already (strings, numbers) become text
/// elements.
pub fn create_element<I>(kind: impl Into<ElementKind>, props: Props, children: I) -> Element
where
    I: IntoIterator,
    I::Item: Into<Element>,
{
    let mut props = props;
    for child in children {
        props.push_child(child);
    }
    Element::new(kind.into(), props)
}

/// Builds a text element carrying `value`.
pub fn text(value: impl Into<PropValue>) -> Element {
    Element::text(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn greeting(props: &Props) -> Element {
        Element::host("h1").child(format!("Hi {}", props.get_str("name").unwrap_or("")))
    }

    fn farewell(_props: &Props) -> Element {
        Element::host("h2")
    }

    #[test]
    fn create_element_normalizes_text_children() {
        let element = create_element(
            "div",
            Props::new().with("id", "foo"),
            [Element::host("a").child("bar"), Element::from("baz")],
        );

        assert_eq!(element.kind(), &ElementKind::from("div"));
        assert_eq!(element.props().get_str("id"), Some("foo"));
        let children = element.props().children();
        assert_eq!(children.len(), 2);
        assert_eq!(children[1].kind(), &ElementKind::Text);
        assert_eq!(children[1].props().get_str(TEXT_VALUE), Some("baz"));
        let nested = children[0].props().children();
        assert_eq!(nested[0].props().get_str(TEXT_VALUE), Some("bar"));
    }

    #[test]
    fn component_kinds_compare_by_function() {
        let a = Component::new("Greeting", greeting);
        let b = Component::new("Alias", greeting);
        let c = Component::new("Farewell", farewell);
        assert_eq!(ElementKind::from(a), ElementKind::from(b));
        assert_ne!(ElementKind::from(a), ElementKind::from(c));
    }

    #[test]
    fn event_names_follow_listener_prefix() {
        assert_eq!(event_name("onClick").as_deref(), Some("click"));
        assert_eq!(event_name("onMouseMove").as_deref(), Some("mousemove"));
        assert_eq!(event_name("on"), None);
        assert_eq!(event_name("title"), None);
        assert_eq!(listener_attribute("click"), "onClick");
    }

    #[test]
    fn handlers_compare_by_identity() {
        let handler = EventHandler::new(|| {});
        let same = handler.clone();
        let other = EventHandler::new(|| {});
        assert_eq!(PropValue::from(handler.clone()), PropValue::from(same));
        assert_ne!(PropValue::from(handler), PropValue::from(other));
    }
}
