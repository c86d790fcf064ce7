use fiber_core::{
    deps, use_effect, use_state, Component, EffectResult, Element, FiberRoot, HostNodeId,
    MemoryHost, Props,
};
use fiber_runtime_std::StdRuntime;

const MAX_SLICES: usize = 1_000;

fn counter(_props: &Props) -> Element {
    let (count, set_count) = use_state(|| 0i64);
    let decrement = set_count.clone();

    use_effect(deps![count], move |_| {
        log::info!("count is now {count}");
        EffectResult::default()
    });

    let mut column = Element::host("div")
        .attr("class", "counter")
        .child(Element::host("h1").child(format!("Count: {count}")))
        .child(
            Element::host("button")
                .attr("id", "increment")
                .on("click", move || set_count.update(|count| count + 1))
                .child("Increment"),
        )
        .child(
            Element::host("button")
                .attr("id", "decrement")
                .on("click", move || decrement.update(|count| count - 1))
                .child("Decrement"),
        );
    if count % 2 == 0 {
        column = column.child(Element::component(EVEN_BADGE).attr("count", count));
    }
    column
}

const COUNTER: Component = Component::new("Counter", counter);

fn even_badge(props: &Props) -> Element {
    let count = props.get_int("count").unwrap_or_default();
    use_effect(deps![], |scope| {
        log::info!("even badge mounted");
        scope.on_cleanup(|| log::info!("even badge removed"))
    });
    Element::host("span").child(format!("{count} is even"))
}

const EVEN_BADGE: Component = Component::new("EvenBadge", even_badge);

fn find_by_id(host: &MemoryHost, node: HostNodeId, id: &str) -> Option<HostNodeId> {
    if host.attribute(node, "id").and_then(|value| value.as_str()) == Some(id) {
        return Some(node);
    }
    host.children(node)
        .iter()
        .find_map(|child| find_by_id(host, *child, id))
}

fn click(root: &FiberRoot<MemoryHost>, container: HostNodeId, id: &str) {
    let host = root.host();
    let Some(button) = find_by_id(&host, container, id) else {
        log::error!("no element with id {id}");
        return;
    };
    if let Err(err) = host.dispatch_event(button, "click") {
        log::error!("click on {id} failed: {err}");
    }
}

fn settle(runtime: &StdRuntime, root: &FiberRoot<MemoryHost>) {
    let slices = runtime.run_until_idle(MAX_SLICES);
    log::debug!("settled after {slices} slices");
    if let Some(err) = root.take_error() {
        log::error!("render failed: {err}");
    }
}

fn main() {
    env_logger::init();

    println!("=== Fiber Counter Example ===");
    println!("Clicks are dispatched through the in-memory host; run with");
    println!("RUST_LOG=debug to see slices, commits and effects.");
    println!();

    let runtime = StdRuntime::new();
    let mut host = MemoryHost::new();
    let container = host.create_container("body");
    let root = runtime.root(host);

    if let Err(err) = root.render(Element::component(COUNTER), container) {
        log::error!("initial render failed: {err}");
        return;
    }
    settle(&runtime, &root);
    print!("{}", root.host().dump_tree(Some(container)));

    for id in ["increment", "increment", "increment", "decrement"] {
        click(&root, container, id);
        settle(&runtime, &root);
        println!("after {id}: {}", root.host().text_content(container));
    }

    println!();
    print!("{}", root.host().dump_tree(Some(container)));
    if let Some(summary) = root.last_commit() {
        println!("last commit: {summary:?}");
    }
}
