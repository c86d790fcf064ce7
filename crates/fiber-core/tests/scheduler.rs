use std::cell::RefCell;
use std::rc::Rc;

use fiber_core::{
    deps, use_effect, use_state, Component, DefaultScheduler, Element, FiberRoot, HostError,
    MemoryHost, Props, RenderError, SetState, WorkLoopOptions, WorkStatus,
};
use fiber_testing::{FiberTestRule, HostOp, UnitBudget};

fn wide_list(len: usize) -> Element {
    Element::host("ul").children((0..len).map(|i| Element::host("li").child(i as i64)))
}

#[test]
fn work_yields_between_units_and_commits_once() -> Result<(), RenderError> {
    let mut rule = FiberTestRule::new();
    rule.root().render(wide_list(3), rule.container())?;

    // root, ul, 3 × (li + text)
    let mut slices = 0;
    while rule.pump_slice(2)? {
        slices += 1;
        if rule.root().has_pending_work() {
            assert!(rule.children(rule.container()).is_empty());
        }
    }

    assert_eq!(slices, 4);
    assert_eq!(rule.text_content(), "012");
    let summary = rule.last_commit().expect("commit");
    assert_eq!(summary.placed, 7);
    Ok(())
}

#[test]
fn idle_root_schedules_nothing() -> Result<(), RenderError> {
    let mut rule = FiberTestRule::new();
    rule.set_content(wide_list(2))?;
    assert_eq!(rule.scheduler().pending(), 0);
    assert!(!rule.root().has_pending_work());
    assert!(!rule.pump_slice(1)?);
    Ok(())
}

#[test]
fn unit_cap_limits_a_slice_without_a_deadline() -> Result<(), RenderError> {
    let root = FiberRoot::with_options(
        MemoryHost::new(),
        Rc::new(DefaultScheduler),
        WorkLoopOptions {
            max_units_per_slice: Some(3),
            ..WorkLoopOptions::default()
        },
    );
    let container = root.host_mut().create_container("root");
    root.render(wide_list(2), container)?;

    assert_eq!(
        root.perform_work(&fiber_core::Unbounded)?,
        WorkStatus::Pending
    );
    assert!(root.host().children(container).is_empty());
    assert_eq!(
        root.perform_work(&fiber_core::Unbounded)?,
        WorkStatus::Idle
    );
    assert_eq!(root.host().text_content(container), "01");
    Ok(())
}

thread_local! {
    static TITLE_SETTER: RefCell<Option<SetState<String>>> = const { RefCell::new(None) };
}

fn titled(_props: &Props) -> Element {
    let (title, set_title) = use_state(|| String::from("first"));
    TITLE_SETTER.with(|slot| *slot.borrow_mut() = Some(set_title));
    Element::host("section")
        .child(Element::host("h2").child(title))
        .child(wide_list(4))
}

const TITLED: Component = Component::new("Titled", titled);

fn set_title(title: &str) {
    let setter = TITLE_SETTER.with(|slot| slot.borrow().clone().expect("titled rendered"));
    setter.set(title.to_owned());
}

#[test]
fn update_mid_flight_discards_partial_tree() -> Result<(), RenderError> {
    let mut rule = FiberTestRule::new();
    rule.set_content(Element::component(TITLED))?;
    let committed_fibers = rule.root().fiber_count();
    rule.take_ops();

    set_title("second");
    assert!(rule.pump_slice(3)?);
    assert!(rule.root().has_pending_work());
    assert!(rule.root().fiber_count() > committed_fibers);

    set_title("third");
    rule.pump_until_idle()?;

    assert_eq!(rule.text_content(), "third0123");
    assert_eq!(rule.root().fiber_count(), committed_fibers);
    let ops = rule.take_ops();
    assert_eq!(ops.len(), 1);
    assert!(matches!(&ops[0], HostOp::SetProperty { value, .. } if value == "third"));
    Ok(())
}

#[test]
fn new_render_request_replaces_in_flight_work() -> Result<(), RenderError> {
    let mut rule = FiberTestRule::new();
    rule.root().render(wide_list(5), rule.container())?;
    assert!(rule.pump_slice(4)?);

    rule.root().render(wide_list(1), rule.container())?;
    rule.pump_until_idle()?;

    assert_eq!(rule.text_content(), "0");
    assert_eq!(rule.last_commit().map(|summary| summary.placed), Some(3));
    Ok(())
}

#[test]
fn commit_failure_keeps_the_committed_tree() -> Result<(), RenderError> {
    let mut rule = FiberTestRule::new();
    rule.set_content(Element::host("div").attr("title", "a").child("kept"))?;
    let div = rule.node_at(&[0]).expect("div");

    rule.root().host_mut().reject_property("title");
    let err = rule
        .set_content(Element::host("div").attr("title", "b").child("lost"))
        .expect_err("title rejected");
    assert_eq!(
        err,
        RenderError::Host(HostError::Rejected {
            operation: "set_property",
            reason: "property title is rejected".into(),
        })
    );
    assert!(!rule.root().has_pending_work());

    rule.root().host_mut().accept_all();
    rule.set_content(Element::host("div").attr("title", "c").child("fresh"))?;
    assert_eq!(rule.node_at(&[0]), Some(div));
    assert_eq!(
        rule.host().memory().attribute(div, "title").map(ToString::to_string),
        Some("c".to_owned())
    );
    assert_eq!(rule.text_content(), "fresh");
    Ok(())
}

thread_local! {
    static COUNT_EVENTS: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
}

fn record(event: String) {
    COUNT_EVENTS.with(|events| events.borrow_mut().push(event));
}

fn take_events() -> Vec<String> {
    COUNT_EVENTS.with(|events| std::mem::take(&mut *events.borrow_mut()))
}

fn titled_count(_props: &Props) -> Element {
    let (count, set_count) = use_state(|| 0i64);
    use_effect(deps![count], move |scope| {
        record(format!("run {count}"));
        scope.on_cleanup(move || record(format!("clean {count}")))
    });
    Element::host("span")
        .attr("title", count)
        .on("click", move || set_count.update(|count| count + 1))
        .child(count)
}

const TITLED_COUNT: Component = Component::new("TitledCount", titled_count);

#[test]
fn failed_commit_keeps_queued_updates_and_effects() -> Result<(), RenderError> {
    let mut rule = FiberTestRule::new();
    take_events();
    rule.set_content(Element::component(TITLED_COUNT))?;
    assert_eq!(take_events(), vec!["run 0"]);
    let span = rule.node_at(&[0]).expect("span");

    rule.root().host_mut().reject_property("title");
    rule.dispatch(span, "click").expect("click");
    let err = rule.pump_until_idle().expect_err("title rejected");
    assert!(matches!(err, RenderError::Host(HostError::Rejected { .. })));
    assert!(take_events().is_empty());
    assert_eq!(rule.text_content(), "0");

    rule.root().host_mut().accept_all();
    rule.rerender()?;
    assert_eq!(rule.text_content(), "1");
    assert_eq!(rule.node_at(&[0]), Some(span));
    assert_eq!(take_events(), vec!["clean 0", "run 1"]);
    Ok(())
}

fn titled_paragraphs(title: &str, paragraphs: usize) -> Element {
    Element::host("div")
        .attr("title", title)
        .children((0..paragraphs).map(|i| Element::host("p").child(i as i64)))
}

#[test]
fn root_recovers_after_commit_fails_past_its_deletions() -> Result<(), RenderError> {
    let mut rule = FiberTestRule::new();
    rule.set_content(titled_paragraphs("a", 2))?;
    let div = rule.node_at(&[0]).expect("div");

    rule.root().host_mut().reject_property("title");
    rule.set_content(titled_paragraphs("b", 1))
        .expect_err("title rejected");
    assert_eq!(rule.children(div).len(), 1);
    // root, div, p, "0"
    assert_eq!(rule.root().fiber_count(), 4);

    rule.root().host_mut().accept_all();
    rule.set_content(titled_paragraphs("c", 1))?;
    assert_eq!(rule.text_content(), "0");
    assert_eq!(
        rule.host().memory().attribute(div, "title").map(ToString::to_string),
        Some("c".to_owned())
    );

    rule.set_content(titled_paragraphs("c", 3))?;
    assert_eq!(rule.text_content(), "012");
    Ok(())
}

fn list_with_heading(items: &[&str], title: &str) -> Element {
    Element::host("div")
        .child(
            Element::host("ul")
                .children(items.iter().map(|item| Element::host("li").child(item.to_string()))),
        )
        .child(Element::host("h2").attr("title", title))
}

#[test]
fn failed_commit_detaches_the_nodes_it_placed() -> Result<(), RenderError> {
    let mut rule = FiberTestRule::new();
    rule.set_content(list_with_heading(&["a"], "one"))?;
    let ul = rule.node_at(&[0, 0]).expect("ul");

    rule.root().host_mut().reject_property("title");
    rule.set_content(list_with_heading(&["a", "b"], "two"))
        .expect_err("title rejected");
    assert_eq!(rule.children(ul).len(), 1);
    assert_eq!(rule.text_content(), "a");

    rule.root().host_mut().accept_all();
    rule.rerender()?;
    assert_eq!(rule.children(ul).len(), 2);
    assert_eq!(rule.text_content(), "ab");
    Ok(())
}

#[test]
fn unit_budget_counts_consultations() {
    let budget = UnitBudget::new(3);
    let root = FiberRoot::new(MemoryHost::new(), Rc::new(DefaultScheduler));
    let container = root.host_mut().create_container("root");
    root.render(wide_list(4), container).expect("render");

    assert_eq!(root.perform_work(&budget), Ok(WorkStatus::Pending));
    assert_eq!(budget.consumed(), 3);
    root.flush_sync().expect("finish");
    assert_eq!(root.host().text_content(container), "0123");
}
