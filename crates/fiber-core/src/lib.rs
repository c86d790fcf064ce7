#![doc = r"Incremental fiber reconciler: describe a UI tree, diff it against the committed one in interruptible slices, and apply the result to a host in one commit."]

pub mod commit;
pub mod element;
mod fiber;
pub mod hooks;
pub mod host;
pub mod platform;
mod reconcile;
pub mod runtime;
mod work;

pub use commit::CommitSummary;
pub use element::{
    create_element, event_name, listener_attribute, text, Component, Element, ElementKind,
    EventHandler, PropValue, Props, RenderFn, TEXT_KIND, TEXT_VALUE,
};
pub use fiber::{EffectTag, FiberId};
pub use hooks::{use_effect, use_state, Deps, EffectResult, EffectScope, Key, SetState};
pub use host::{update_host_node, Host, HostError, HostNodeId, MemoryHost};
pub use platform::{
    Deadline, DefaultScheduler, Unbounded, WorkCallback, WorkLoopOptions, WorkScheduler,
};
pub use runtime::{FiberRoot, RenderRequest, RootHandle, WorkStatus};

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    /// A slice or `render` was entered while this root was already working.
    Reentrant,
    /// The traversal walked past the root looking for a fiber with a host node.
    MissingHostParent { fiber: FiberId },
    Host(HostError),
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::Reentrant => write!(f, "root is already performing work"),
            RenderError::MissingHostParent { fiber } => {
                write!(f, "fiber {fiber} has no ancestor with a host node")
            }
            RenderError::Host(err) => write!(f, "host operation failed: {err}"),
        }
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RenderError::Host(err) => Some(err),
            _ => None,
        }
    }
}

impl From<HostError> for RenderError {
    fn from(err: HostError) -> Self {
        RenderError::Host(err)
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
