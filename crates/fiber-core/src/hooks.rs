//! Position-keyed hook state of function components.
//!
//! While a component runs, the work loop installs a [`HookFrame`] for its
//! fiber. Every hook call claims the next position in that frame and reads
//! its counterpart at the same position in the fiber's alternate. Calling
//! hooks conditionally or in a different order between renders attributes
//! state to the wrong cell; nothing detects that.

use std::any::Any;
use std::cell::RefCell;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use ahash::AHasher;

use crate::element::Element;
use crate::runtime::RootHandle;

pub type Key = u64;

type Updater<T> = Rc<dyn Fn(&T) -> T>;
type Cleanup = Box<dyn FnOnce()>;
type CleanupSlot = Rc<RefCell<Option<Cleanup>>>;
type EffectBody = Box<dyn FnOnce(EffectScope) -> EffectResult>;

thread_local! {
    static HOOK_FRAME: RefCell<Option<HookFrame>> = const { RefCell::new(None) };
}

pub(crate) struct HookFrame {
    previous: Vec<HookSnapshot>,
    cells: Vec<HookCell>,
    root: RootHandle,
}

pub(crate) enum HookCell {
    State(Rc<dyn StateHook>),
    Effect(EffectCell),
}

/// What a render may read from the previous generation's cell at the same
/// position.
pub(crate) enum HookSnapshot {
    State(Rc<dyn StateHook>),
    Effect {
        deps: Option<Rc<[Key]>>,
        cleanup: CleanupSlot,
    },
}

impl HookCell {
    pub(crate) fn snapshot(&self) -> HookSnapshot {
        match self {
            HookCell::State(cell) => HookSnapshot::State(Rc::clone(cell)),
            HookCell::Effect(cell) => HookSnapshot::Effect {
                deps: cell.deps.clone(),
                cleanup: Rc::clone(&cell.cleanup),
            },
        }
    }
}

pub(crate) trait StateHook {
    fn as_any(self: Rc<Self>) -> Rc<dyn Any>;
    /// Drops the updates folded into this cell's value from the shared queue.
    fn commit(&self);
}

struct StateCell<T> {
    value: T,
    queue: Rc<RefCell<Vec<Updater<T>>>>,
    consumed: usize,
}

impl<T: 'static> StateHook for StateCell<T> {
    fn as_any(self: Rc<Self>) -> Rc<dyn Any> {
        self
    }

    fn commit(&self) {
        let mut queue = self.queue.borrow_mut();
        let consumed = self.consumed.min(queue.len());
        queue.drain(..consumed);
    }
}

pub(crate) struct EffectCell {
    deps: Option<Rc<[Key]>>,
    cleanup: CleanupSlot,
    status: EffectStatus,
}

enum EffectStatus {
    /// Dependencies unchanged; the committed cleanup is carried forward.
    Idle,
    Scheduled {
        body: EffectBody,
        stale: Option<CleanupSlot>,
    },
    Committed,
}

/// Dependency list of an effect.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Deps(Option<Vec<Key>>);

impl Deps {
    /// No list at all: the effect runs after every render.
    pub fn always() -> Self {
        Deps(None)
    }

    /// An empty list: the effect runs once, when its fiber is placed.
    pub fn empty() -> Self {
        Deps(Some(Vec::new()))
    }

    /// Appends `dependency` by its 64-bit hash. Lists are compared by these
    /// hashes, so two values that collide count as unchanged.
    pub fn with<K: Hash + ?Sized>(self, dependency: &K) -> Self {
        let mut keys = self.0.unwrap_or_default();
        keys.push(hash_key(dependency));
        Deps(Some(keys))
    }

    fn into_keys(self) -> Option<Rc<[Key]>> {
        self.0.map(Rc::from)
    }
}

#[macro_export]
macro_rules! deps {
    () => {
        $crate::Deps::empty()
    };
    ($($dependency:expr),+ $(,)?) => {
        $crate::Deps::empty()$(.with(&$dependency))+
    };
}

fn hash_key<K: Hash + ?Sized>(key: &K) -> Key {
    let mut hasher = AHasher::default();
    key.hash(&mut hasher);
    hasher.finish()
}

fn deps_changed(previous: Option<&[Key]>, next: Option<&[Key]>) -> bool {
    match (previous, next) {
        (Some(previous), Some(next)) => previous != next,
        _ => true,
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct EffectScope;

impl EffectScope {
    pub fn on_cleanup(&self, cleanup: impl FnOnce() + 'static) -> EffectResult {
        EffectResult::new(cleanup)
    }
}

#[derive(Default)]
pub struct EffectResult {
    cleanup: Option<Cleanup>,
}

impl EffectResult {
    pub fn new(cleanup: impl FnOnce() + 'static) -> Self {
        Self {
            cleanup: Some(Box::new(cleanup)),
        }
    }

    fn into_cleanup(self) -> Option<Cleanup> {
        self.cleanup
    }
}

/// Setter returned by [`use_state`].
///
/// Updates queue up and are folded into the value on the next render of the
/// whole tree, which every call requests.
pub struct SetState<T> {
    queue: Rc<RefCell<Vec<Updater<T>>>>,
    root: RootHandle,
}

impl<T> Clone for SetState<T> {
    fn clone(&self) -> Self {
        Self {
            queue: Rc::clone(&self.queue),
            root: self.root.clone(),
        }
    }
}

impl<T: 'static> SetState<T> {
    pub fn update(&self, updater: impl Fn(&T) -> T + 'static) {
        self.queue.borrow_mut().push(Rc::new(updater));
        self.root.request_root_render();
    }

    pub fn set(&self, value: T)
    where
        T: Clone,
    {
        self.update(move |_| value.clone());
    }

    pub fn pending_updates(&self) -> usize {
        self.queue.borrow().len()
    }
}

impl<T> PartialEq for SetState<T> {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.queue, &other.queue)
    }
}

fn with_frame<R>(f: impl FnOnce(&mut HookFrame) -> R) -> R {
    HOOK_FRAME.with(|slot| {
        let mut slot = slot.borrow_mut();
        let frame = slot
            .as_mut()
            .expect("hooks may only be called while a component is rendering");
        f(frame)
    })
}

/// Returns the current value of the state cell at this position and its
/// setter. `init` only runs the first time the position is seen.
pub fn use_state<T: Clone + 'static>(init: impl FnOnce() -> T) -> (T, SetState<T>) {
    let (previous, root) = with_frame(|frame| {
        let previous = match frame.previous.get(frame.cells.len()) {
            Some(HookSnapshot::State(cell)) => {
                Rc::clone(cell).as_any().downcast::<StateCell<T>>().ok()
            }
            _ => None,
        };
        (previous, frame.root.clone())
    });

    let (value, queue, consumed) = match previous {
        Some(cell) => {
            let pending: Vec<Updater<T>> = cell.queue.borrow().clone();
            let value = pending
                .iter()
                .fold(cell.value.clone(), |value, updater| updater(&value));
            (value, Rc::clone(&cell.queue), pending.len())
        }
        None => (init(), Rc::default(), 0),
    };

    let cell = Rc::new(StateCell {
        value: value.clone(),
        queue: Rc::clone(&queue),
        consumed,
    });
    with_frame(|frame| frame.cells.push(HookCell::State(cell)));
    (value, SetState { queue, root })
}

/// Schedules `body` to run at commit when `deps` changed since the previous
/// render of this fiber. The cleanup returned by the previous run is invoked
/// first.
pub fn use_effect<F>(deps: Deps, body: F)
where
    F: FnOnce(EffectScope) -> EffectResult + 'static,
{
    with_frame(|frame| {
        let previous = match frame.previous.get(frame.cells.len()) {
            Some(HookSnapshot::Effect {
                deps: previous_deps,
                cleanup,
            }) => Some((previous_deps.clone(), Rc::clone(cleanup))),
            _ => None,
        };
        let next = deps.into_keys();
        let changed = match &previous {
            Some((previous_deps, _)) => deps_changed(previous_deps.as_deref(), next.as_deref()),
            None => true,
        };
        let cell = match previous {
            Some((_, cleanup)) if !changed => EffectCell {
                deps: next,
                cleanup,
                status: EffectStatus::Idle,
            },
            previous => EffectCell {
                deps: next,
                cleanup: Rc::default(),
                status: EffectStatus::Scheduled {
                    body: Box::new(body),
                    stale: previous.map(|(_, cleanup)| cleanup),
                },
            },
        };
        frame.cells.push(HookCell::Effect(cell));
    });
}

/// Runs `render` with a hook frame for one component invocation and returns
/// its output together with the cells it claimed.
pub(crate) fn render_with_hooks(
    previous: Vec<HookSnapshot>,
    root: RootHandle,
    render: impl FnOnce() -> Element,
) -> (Element, Vec<HookCell>) {
    struct FrameGuard {
        outer: Option<Option<HookFrame>>,
    }

    impl FrameGuard {
        fn finish(&mut self) -> Option<HookFrame> {
            let outer = self.outer.take().flatten();
            HOOK_FRAME.with(|slot| std::mem::replace(&mut *slot.borrow_mut(), outer))
        }
    }

    impl Drop for FrameGuard {
        fn drop(&mut self) {
            if self.outer.is_some() {
                self.finish();
            }
        }
    }

    let frame = HookFrame {
        previous,
        cells: Vec::new(),
        root,
    };
    let outer = HOOK_FRAME.with(|slot| slot.borrow_mut().replace(frame));
    let mut guard = FrameGuard { outer: Some(outer) };
    let element = render();
    let cells = guard.finish().map(|frame| frame.cells).unwrap_or_default();
    (element, cells)
}

/// Counts of effect work done while committing one fiber.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct EffectRun {
    pub(crate) effects: usize,
    pub(crate) cleanups: usize,
}

fn run_cleanup(slot: &CleanupSlot) -> bool {
    let cleanup = slot.borrow_mut().take();
    match cleanup {
        Some(cleanup) => {
            cleanup();
            true
        }
        None => false,
    }
}

/// Invokes the cleanups superseded by effects scheduled in this render.
pub(crate) fn run_stale_cleanups(cells: &mut [HookCell]) -> EffectRun {
    let mut run = EffectRun::default();
    for cell in cells {
        if let HookCell::Effect(EffectCell {
            status: EffectStatus::Scheduled {
                stale: Some(stale), ..
            },
            ..
        }) = cell
        {
            if run_cleanup(stale) {
                run.cleanups += 1;
            }
        }
    }
    run
}

/// Runs the scheduled effect bodies in hook order and records their cleanups.
pub(crate) fn run_scheduled_effects(cells: &mut [HookCell]) -> EffectRun {
    let mut run = EffectRun::default();
    for cell in cells {
        let HookCell::Effect(effect) = cell else {
            continue;
        };
        if !matches!(effect.status, EffectStatus::Scheduled { .. }) {
            continue;
        }
        let EffectStatus::Scheduled { body, stale } =
            std::mem::replace(&mut effect.status, EffectStatus::Committed)
        else {
            continue;
        };
        if let Some(stale) = stale {
            if run_cleanup(&stale) {
                run.cleanups += 1;
            }
        }
        let cleanup = body(EffectScope).into_cleanup();
        *effect.cleanup.borrow_mut() = cleanup;
        run.effects += 1;
    }
    run
}

/// Invokes every committed cleanup; used when the fiber leaves the tree.
pub(crate) fn run_all_cleanups(cells: &[HookCell]) -> EffectRun {
    let mut run = EffectRun::default();
    for cell in cells {
        if let HookCell::Effect(effect) = cell {
            if run_cleanup(&effect.cleanup) {
                run.cleanups += 1;
            }
        }
    }
    run
}

/// Trims the state queues by the updates this render consumed.
pub(crate) fn commit_state(cells: &[HookCell]) {
    for cell in cells {
        if let HookCell::State(state) = cell {
            state.commit();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::RootHandle;

    fn render_once(previous: Vec<HookSnapshot>, render: impl FnOnce()) -> Vec<HookCell> {
        let (_, cells) = render_with_hooks(previous, RootHandle::detached(), || {
            render();
            Element::host("div")
        });
        cells
    }

    fn snapshots(cells: &[HookCell]) -> Vec<HookSnapshot> {
        cells.iter().map(HookCell::snapshot).collect()
    }

    #[test]
    fn deps_change_detection() {
        assert!(deps_changed(None, None));
        assert!(deps_changed(Some(&[1]), None));
        assert!(deps_changed(None, Some(&[1])));
        assert!(deps_changed(Some(&[1]), Some(&[1, 2])));
        assert!(deps_changed(Some(&[1]), Some(&[2])));
        assert!(!deps_changed(Some(&[]), Some(&[])));
        assert!(!deps_changed(Some(&[1, 2]), Some(&[1, 2])));
    }

    #[test]
    fn deps_macro_hashes_positionally() {
        assert_eq!(deps![], Deps::empty());
        assert_eq!(deps![1, "a"], Deps::empty().with(&1).with("a"));
        assert_ne!(deps![1, 2], deps![2, 1]);
        assert_eq!(deps![String::from("a")], deps!["a"]);
    }

    #[test]
    fn state_updates_fold_in_enqueue_order() {
        let setter = Rc::new(RefCell::new(None));
        let first = render_once(Vec::new(), || {
            let (value, set) = use_state(|| 1);
            assert_eq!(value, 1);
            setter.borrow_mut().replace(set);
        });

        let set = setter.borrow().clone().unwrap();
        set.update(|value| value + 1);
        set.update(|value| value * 10);

        let second = render_once(snapshots(&first), || {
            let (value, _) = use_state(|| 1);
            assert_eq!(value, 20);
        });
        commit_state(&second);
        assert_eq!(set.pending_updates(), 0);
    }

    #[test]
    fn uncommitted_render_keeps_updates_queued() {
        let setter = Rc::new(RefCell::new(None));
        let first = render_once(Vec::new(), || {
            let (_, set) = use_state(|| 0);
            setter.borrow_mut().replace(set);
        });
        let set = setter.borrow().clone().unwrap();
        set.update(|value| value + 1);

        let abandoned = render_once(snapshots(&first), || {
            let _ = use_state(|| 0);
        });
        drop(abandoned);

        let retried = render_once(snapshots(&first), || {
            let (value, _) = use_state(|| 0);
            assert_eq!(value, 1);
        });
        commit_state(&retried);
        assert_eq!(set.pending_updates(), 0);
    }

    #[test]
    fn effect_runs_previous_cleanup_before_new_body() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let effect = |round: u32, log: Rc<RefCell<Vec<String>>>| {
            move || {
                use_effect(deps![round], move |scope| {
                    log.borrow_mut().push(format!("run {round}"));
                    scope.on_cleanup(move || log.borrow_mut().push(format!("clean {round}")))
                });
            }
        };

        let mut first = render_once(Vec::new(), effect(1, Rc::clone(&log)));
        run_scheduled_effects(&mut first);

        let mut unchanged = render_once(snapshots(&first), effect(1, Rc::clone(&log)));
        assert_eq!(run_scheduled_effects(&mut unchanged), EffectRun::default());

        let mut changed = render_once(snapshots(&unchanged), effect(2, Rc::clone(&log)));
        let run = run_scheduled_effects(&mut changed);
        assert_eq!(run, EffectRun { effects: 1, cleanups: 1 });

        assert_eq!(run_all_cleanups(&changed).cleanups, 1);
        assert_eq!(*log.borrow(), vec!["run 1", "clean 1", "run 2", "clean 2"]);
    }

    #[test]
    #[should_panic(expected = "while a component is rendering")]
    fn hooks_outside_render_panic() {
        let _ = use_state(|| 0);
    }
}
