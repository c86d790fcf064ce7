//! Applies a finished work-in-progress tree to the host in one pass.

use crate::fiber::{EffectTag, FiberId};
use crate::hooks::{self, EffectRun};
use crate::host::{update_host_node, Host};
use crate::work::WorkContext;
use crate::RenderError;

/// Counts of what one commit did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CommitSummary {
    pub placed: usize,
    pub updated: usize,
    pub deleted: usize,
    pub effects_run: usize,
    pub cleanups_run: usize,
}

impl CommitSummary {
    fn record(&mut self, run: EffectRun) {
        self.effects_run += run.effects;
        self.cleanups_run += run.cleanups;
    }
}

impl<N: Clone> WorkContext<N> {
    /// Commits the work-in-progress tree and promotes it to current.
    ///
    /// Deletions go first, then the new tree in preorder. Effects and state
    /// queues are only touched once every host mutation has gone through.
    /// On a host failure the nodes this pass attached are detached again and
    /// the caller discards the work-in-progress tree; deletions already
    /// applied are dropped from the committed tree.
    pub(crate) fn commit_root<H>(&mut self, host: &mut H) -> Result<CommitSummary, RenderError>
    where
        H: Host<Handle = N> + ?Sized,
    {
        let Some(wip) = self.wip else {
            return Ok(CommitSummary::default());
        };
        let mut summary = CommitSummary::default();

        let deletions = std::mem::take(&mut self.deletions);
        for (index, &id) in deletions.iter().enumerate() {
            if let Err(err) = self.commit_deletion(id, host, &mut summary) {
                self.deletions = deletions[index..].to_vec();
                return Err(err);
            }
        }

        let mut placed = Vec::new();
        let mut cursor = self.arena[wip].child;
        while let Some(id) = cursor {
            if let Err(err) = self.commit_work(id, host, &mut summary, &mut placed) {
                undo_placements(host, placed);
                return Err(err);
            }
            cursor = self.arena.next_unit(id);
        }

        for id in self.arena.subtree(wip) {
            let fiber = &mut self.arena[id];
            summary.record(hooks::run_stale_cleanups(&mut fiber.hooks));
            summary.record(hooks::run_scheduled_effects(&mut fiber.hooks));
            hooks::commit_state(&fiber.hooks);
        }

        let previous = self.current.replace(wip);
        self.wip = None;
        if let Some(previous) = previous {
            self.arena.release_tree(previous);
        }
        for id in self.arena.subtree(wip) {
            let fiber = &mut self.arena[id];
            fiber.alternate = None;
            fiber.effect = EffectTag::None;
        }
        log::debug!(
            "committed: {} placed, {} updated, {} deleted, {} effects, {} cleanups",
            summary.placed,
            summary.updated,
            summary.deleted,
            summary.effects_run,
            summary.cleanups_run
        );
        Ok(summary)
    }

    fn commit_work<H>(
        &mut self,
        id: FiberId,
        host: &mut H,
        summary: &mut CommitSummary,
        placed: &mut Vec<(N, N)>,
    ) -> Result<(), RenderError>
    where
        H: Host<Handle = N> + ?Sized,
    {
        match self.arena[id].effect {
            EffectTag::Place => {
                if let Some(node) = self.arena[id].host_node.clone() {
                    let parent = self.arena.host_parent(id)?;
                    host.append_child(&parent, &node)?;
                    placed.push((parent, node));
                }
                summary.placed += 1;
            }
            EffectTag::Update => {
                let fiber = &self.arena[id];
                if let (Some(node), Some(alternate)) = (fiber.host_node.clone(), fiber.alternate) {
                    let prev = &self.arena[alternate].props;
                    let next = &self.arena[id].props;
                    if !std::rc::Rc::ptr_eq(prev, next) {
                        update_host_node(host, &node, prev, next)?;
                    }
                }
                summary.updated += 1;
            }
            EffectTag::None | EffectTag::Delete => {}
        }
        Ok(())
    }

    /// Runs the subtree's cleanups, removes its host node and unlinks it from
    /// the committed tree.
    fn commit_deletion<H>(
        &mut self,
        id: FiberId,
        host: &mut H,
        summary: &mut CommitSummary,
    ) -> Result<(), RenderError>
    where
        H: Host<Handle = N> + ?Sized,
    {
        for fiber in self.arena.subtree(id) {
            summary.record(hooks::run_all_cleanups(&self.arena[fiber].hooks));
        }
        let parent = self.arena.host_parent(id)?;
        if let Some(node) = self.arena.first_host_node(id) {
            host.remove_child(&parent, &node)?;
        }
        self.arena.unlink(id);
        self.arena.release_tree(id);
        summary.deleted += 1;
        Ok(())
    }
}

fn undo_placements<H: Host + ?Sized>(host: &mut H, placed: Vec<(H::Handle, H::Handle)>) {
    for (parent, node) in placed.into_iter().rev() {
        if let Err(err) = host.remove_child(&parent, &node) {
            log::warn!("could not detach node placed by a failed commit: {err}");
        }
    }
}
