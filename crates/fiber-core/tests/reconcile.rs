use fiber_core::{Element, RenderError};
use fiber_testing::{FiberTestRule, HostOp};

fn list(items: &[&str]) -> Element {
    Element::host("ul").children(
        items
            .iter()
            .map(|item| Element::host("li").child(item.to_string())),
    )
}

fn count(ops: &[HostOp], predicate: impl Fn(&HostOp) -> bool) -> usize {
    ops.iter().filter(|op| predicate(op)).count()
}

#[test]
fn rendering_the_same_description_twice_is_a_no_op() -> Result<(), RenderError> {
    let mut rule = FiberTestRule::new();
    rule.set_content(list(&["a", "b"]))?;
    assert!(!rule.take_ops().is_empty());

    rule.rerender()?;
    assert_eq!(rule.take_ops(), vec![]);

    rule.set_content(list(&["a", "b"]))?;
    assert_eq!(rule.take_ops(), vec![]);
    Ok(())
}

#[test]
fn changed_props_update_reused_nodes() -> Result<(), RenderError> {
    let mut rule = FiberTestRule::new();
    let page = |second: i64| {
        Element::host("div")
            .child(Element::host("p").attr("title", 1).child("x"))
            .child(Element::host("p").attr("title", second).child("y"))
    };
    rule.set_content(page(2))?;
    let before = rule.children(rule.node_at(&[0]).expect("div"));
    rule.take_ops();

    rule.set_content(page(3))?;

    let after = rule.children(rule.node_at(&[0]).expect("div"));
    assert_eq!(before, after);
    assert_eq!(
        rule.take_ops(),
        vec![HostOp::SetProperty {
            node: after[1],
            name: "title".into(),
            value: "3".into(),
        }]
    );
    let summary = rule.last_commit().expect("commit");
    assert_eq!(summary.placed, 0);
    assert_eq!(summary.deleted, 0);
    Ok(())
}

#[test]
fn removed_attribute_is_cleared() -> Result<(), RenderError> {
    let mut rule = FiberTestRule::new();
    rule.set_content(Element::host("input").attr("value", "typed").attr("disabled", true))?;
    let input = rule.node_at(&[0]).expect("input");
    rule.take_ops();

    rule.set_content(Element::host("input").attr("value", "typed"))?;

    assert_eq!(
        rule.take_ops(),
        vec![HostOp::ClearProperty {
            node: input,
            name: "disabled".into(),
        }]
    );
    Ok(())
}

#[test]
fn shrinking_removes_exactly_the_trailing_nodes() -> Result<(), RenderError> {
    let mut rule = FiberTestRule::new();
    rule.set_content(list(&["a", "b", "c", "d", "e"]))?;
    let ul = rule.node_at(&[0]).expect("ul");
    let items = rule.children(ul);
    rule.take_ops();

    rule.set_content(list(&["a", "b"]))?;

    let removed: Vec<HostOp> = items[2..]
        .iter()
        .map(|child| HostOp::RemoveChild {
            parent: ul,
            child: *child,
        })
        .collect();
    assert_eq!(rule.take_ops(), removed);
    assert_eq!(rule.children(ul), items[..2].to_vec());
    assert_eq!(rule.last_commit().map(|summary| summary.deleted), Some(3));
    Ok(())
}

#[test]
fn growing_inserts_exactly_the_trailing_nodes() -> Result<(), RenderError> {
    let mut rule = FiberTestRule::new();
    rule.set_content(list(&["a", "b"]))?;
    rule.take_ops();

    rule.set_content(list(&["a", "b", "c", "d"]))?;

    let ops = rule.take_ops();
    assert_eq!(count(&ops, |op| matches!(op, HostOp::Create { .. })), 4);
    assert_eq!(count(&ops, |op| matches!(op, HostOp::AppendChild { .. })), 4);
    assert_eq!(count(&ops, |op| matches!(op, HostOp::RemoveChild { .. })), 0);
    assert_eq!(rule.text_content(), "abcd");
    Ok(())
}

#[test]
fn kind_change_replaces_the_node() -> Result<(), RenderError> {
    let mut rule = FiberTestRule::new();
    rule.set_content(Element::host("div").child(Element::host("p").child("old")))?;
    let div = rule.node_at(&[0]).expect("div");
    let p = rule.node_at(&[0, 0]).expect("p");
    rule.take_ops();

    rule.set_content(Element::host("div").child(Element::host("em").child("new")))?;

    let ops = rule.take_ops();
    assert!(ops
        .iter()
        .any(|op| matches!(op, HostOp::Create { kind, .. } if kind == "em")));
    assert!(ops.contains(&HostOp::RemoveChild { parent: div, child: p }));
    assert_eq!(rule.text_content(), "new");
    Ok(())
}

#[test]
fn replaced_middle_child_is_appended_at_the_end() -> Result<(), RenderError> {
    let mut rule = FiberTestRule::new();
    rule.set_content(
        Element::host("div")
            .child(Element::host("p").child("a"))
            .child(Element::host("p").child("b"))
            .child(Element::host("p").child("c")),
    )?;

    rule.set_content(
        Element::host("div")
            .child(Element::host("p").child("a"))
            .child(Element::host("em").child("x"))
            .child(Element::host("p").child("c")),
    )?;

    // positional matching places new nodes after their surviving siblings
    assert_eq!(rule.text_content(), "acx");
    Ok(())
}
