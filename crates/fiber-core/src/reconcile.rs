//! Positional diff of a fiber's new children against its previous ones.

use crate::element::Element;
use crate::fiber::{EffectTag, Fiber, FiberArena, FiberId, FiberKind};

/// Rebuilds the child chain of `parent` from `elements`.
///
/// Children are matched by position only. A position whose kind is unchanged
/// becomes an `Update` fiber that keeps the previous host node; anything else
/// becomes a `Place` fiber, and the previous fiber at that position (if any)
/// is tagged `Delete` and queued in `deletions` instead of being linked.
pub(crate) fn reconcile_children<N: Clone>(
    arena: &mut FiberArena<N>,
    deletions: &mut Vec<FiberId>,
    parent: FiberId,
    elements: &[Element],
) {
    // FUTURE(keyed): match children by key so reordering reuses fibers.
    let mut old = arena[parent].alternate.and_then(|alternate| arena[alternate].child);
    let mut elements = elements.iter();
    let mut previous_new: Option<FiberId> = None;
    arena[parent].child = None;

    loop {
        let element = elements.next();
        if element.is_none() && old.is_none() {
            break;
        }

        let new_fiber = match (element, old) {
            (Some(element), Some(old_id)) if arena[old_id].kind.matches(element.kind()) => {
                let mut fiber = Fiber::new(
                    arena[old_id].kind.clone(),
                    element.shared_props(),
                    EffectTag::Update,
                );
                fiber.host_node = arena[old_id].host_node.clone();
                fiber.alternate = Some(old_id);
                fiber.parent = Some(parent);
                Some(arena.insert(fiber))
            }
            (element, old_id) => {
                if let Some(old_id) = old_id {
                    arena[old_id].effect = EffectTag::Delete;
                    deletions.push(old_id);
                }
                element.map(|element| {
                    let mut fiber = Fiber::new(
                        FiberKind::from(element.kind()),
                        element.shared_props(),
                        EffectTag::Place,
                    );
                    fiber.parent = Some(parent);
                    arena.insert(fiber)
                })
            }
        };

        if let Some(old_id) = old {
            old = arena[old_id].sibling;
        }

        if let Some(new_id) = new_fiber {
            match previous_new {
                Some(previous) => arena[previous].sibling = Some(new_id),
                None => arena[parent].child = Some(new_id),
            }
            previous_new = Some(new_id);
        }
    }
}
