//! The host-facing entry point: one editor per document.
//!
//! [`ToggleEditor`] owns the membership tagger, the configuration, and one
//! [`ToggleInstance`] per toggle root. Hosts drive it with [`Action`]s (user
//! gestures) and [`SequenceEvent`]s (mutations the host performed itself).
//!
//! ## Failure model
//!
//! Nothing here fails toward the host. A malformed request becomes
//! [`Outcome::Rejected`] with the sequence untouched, and any invariant
//! violation found after an operation is logged and healed.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::host::{BlockSequence, SequenceEvent};
use crate::navigator;
use crate::ordering::{self, Direction, DropOutcome};
use crate::tagger::MembershipTagger;
use crate::toggle::{SettingsAction, ToggleInstance, ToggleView};
use crate::visibility;
use crate::{BlockKind, Result, RootId, ToggleData, ToggleError, ToggleState};

/// A user gesture the editor can perform.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Flip a toggle open/closed.
    Toggle(RootId),
    MoveUp(RootId),
    MoveDown(RootId),
    /// Delete a toggle with its whole subtree.
    DeleteWhole(RootId),
    /// Drag the unit at `from` to just before the block at `target`.
    Drop { from: usize, target: usize },
    /// Indent a block into the toggle above it.
    Nest(usize),
    /// Outdent a member out of its toggle.
    Extract(usize),
}

impl Action {
    /// The action a settings-menu entry performs on `root`.
    pub fn from_settings(action: SettingsAction, root: RootId) -> Self {
        match action {
            SettingsAction::MoveUp => Action::MoveUp(root),
            SettingsAction::MoveDown => Action::MoveDown(root),
            SettingsAction::DeleteWhole => Action::DeleteWhole(root),
        }
    }
}

/// What became of an action or host event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// The sequence changed.
    Applied,
    /// Valid request that required no change.
    Unchanged,
    /// Invalid request; nothing was committed.
    Rejected(ToggleError),
}

impl Outcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Outcome::Applied)
    }

    fn from_result(result: Result<bool>) -> Self {
        match result {
            Ok(true) => Outcome::Applied,
            Ok(false) => Outcome::Unchanged,
            Err(e) => Outcome::Rejected(e),
        }
    }
}

/// Registry of toggles over one block sequence.
#[derive(Debug, Default)]
pub struct ToggleEditor {
    config: EngineConfig,
    tagger: MembershipTagger,
    toggles: IndexMap<RootId, ToggleInstance>,
    recheck_pending: bool,
}

impl ToggleEditor {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn tagger(&self) -> &MembershipTagger {
        &self.tagger
    }

    pub fn instance(&self, root: &RootId) -> Option<&ToggleInstance> {
        self.toggles.get(root)
    }

    /// Instances in registration order.
    pub fn instances(&self) -> impl Iterator<Item = &ToggleInstance> {
        self.toggles.values()
    }

    pub fn len(&self) -> usize {
        self.toggles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.toggles.is_empty()
    }

    pub fn recheck_pending(&self) -> bool {
        self.recheck_pending
    }

    // =========================================================================
    // Construction
    // =========================================================================

    /// Adopt every toggle root in `seq`.
    ///
    /// Existing tags are indexed first, then each root reconstructs its
    /// membership from its declared item count, in document order so outer
    /// toggles claim before nested ones. Returns the number of toggles.
    pub fn load<S: BlockSequence + ?Sized>(&mut self, seq: &mut S) -> Result<usize> {
        self.toggles.clear();
        self.tagger.rebuild(seq);

        for position in 0..seq.block_count() {
            if let Some(instance) = navigator::block(seq, position)
                .ok()
                .and_then(ToggleInstance::from_block)
            {
                self.toggles.insert(instance.root_id().clone(), instance);
            }
        }

        let roots: Vec<RootId> = self.toggles.keys().cloned().collect();
        for root in &roots {
            if let Some(instance) = self.toggles.get_mut(root) {
                instance.render(seq, &mut self.tagger, &self.config)?;
            }
        }

        self.settle(seq);
        tracing::info!("loaded {} toggles over {} blocks", self.toggles.len(), seq.block_count());
        Ok(self.toggles.len())
    }

    /// Insert a new, empty toggle after the caret (toolbox entry).
    pub fn create_toggle<S: BlockSequence + ?Sized>(&mut self, seq: &mut S, text: &str) -> Result<RootId> {
        let position = if seq.block_count() == 0 {
            0
        } else {
            seq.current_position() + 1
        };

        let instance = ToggleInstance::create(text, &self.config);
        let root = instance.root_id().clone();
        seq.insert_block(instance.root_block(), position);
        if let Some(link) = navigator::inherited_link(seq, position) {
            self.tagger.tag(seq, position, &link)?;
        }
        self.toggles.insert(root.clone(), instance);

        seq.set_caret(position);
        seq.close_toolbar();
        self.settle(seq);
        tracing::debug!(position, "created toggle {root:?}");
        Ok(root)
    }

    /// Turn the block at `position` into a toggle titled with its content
    /// (shortcut conversion). The block keeps its own membership.
    pub fn convert_block<S: BlockSequence + ?Sized>(&mut self, seq: &mut S, position: usize) -> Result<RootId> {
        let block = navigator::block(seq, position)?;
        if let Some(root) = block.root_id() {
            return Ok(root.clone());
        }

        let data = ToggleData::new(block.content.clone(), self.config.default_status);
        let root = data.fk.clone();
        if let Some(block) = seq.block_at_mut(position) {
            block.kind = BlockKind::Toggle;
            block.toggle = Some(ToggleState {
                root_id: root.clone(),
                status: data.status,
                items: 0,
            });
        }
        self.toggles.insert(root.clone(), ToggleInstance::new(data));

        seq.set_caret(position);
        self.settle(seq);
        tracing::debug!(position, "converted block into toggle {root:?}");
        Ok(root)
    }

    /// Render the host view of `root`.
    pub fn render<S: BlockSequence + ?Sized>(&mut self, seq: &mut S, root: &RootId) -> Result<ToggleView> {
        let instance = self
            .toggles
            .get_mut(root)
            .ok_or_else(|| ToggleError::RootNotFound(root.clone()))?;
        instance.render(seq, &mut self.tagger, &self.config)
    }

    // =========================================================================
    // Actions
    // =========================================================================

    /// Perform a user gesture.
    pub fn apply<S: BlockSequence + ?Sized>(&mut self, seq: &mut S, action: Action) -> Outcome {
        if self.recheck_pending {
            self.run_deferred(seq);
        }

        let outcome = Outcome::from_result(self.perform(seq, &action));
        match &outcome {
            Outcome::Applied => {
                let healed = self.settle(seq);
                if healed > 0 {
                    tracing::warn!("{action:?} left {healed} misplaced tags behind");
                }
            }
            Outcome::Unchanged => tracing::debug!("{action:?} changed nothing"),
            Outcome::Rejected(e) => tracing::warn!("{action:?} rejected: {e}"),
        }
        outcome
    }

    fn perform<S: BlockSequence + ?Sized>(&mut self, seq: &mut S, action: &Action) -> Result<bool> {
        match action {
            Action::Toggle(root) => {
                self.instance_mut(root)?.toggle(seq)?;
                Ok(true)
            }
            Action::MoveUp(root) => Ok(self.instance_mut(root)?.move_up(seq)?.is_some()),
            Action::MoveDown(root) => Ok(self.instance_mut(root)?.move_down(seq)?.is_some()),
            Action::DeleteWhole(root) => {
                let instance = self
                    .toggles
                    .get(root)
                    .ok_or_else(|| ToggleError::RootNotFound(root.clone()))?;
                let removed = instance.delete_whole(seq, &mut self.tagger)?;
                for block in &removed {
                    if let Some(nested) = block.root_id() {
                        self.toggles.shift_remove(nested);
                    }
                }
                Ok(true)
            }
            Action::Drop { from, target } => {
                let outcome = ordering::drag_drop(seq, &mut self.tagger, *from, *target)?;
                Ok(outcome != DropOutcome::Unchanged)
            }
            Action::Nest(position) => {
                Ok(ordering::nest_block(seq, &mut self.tagger, *position)?.is_some())
            }
            Action::Extract(position) => {
                ordering::extract_block(seq, &mut self.tagger, *position)?;
                Ok(true)
            }
        }
    }

    fn instance_mut(&mut self, root: &RootId) -> Result<&mut ToggleInstance> {
        self.toggles
            .get_mut(root)
            .ok_or_else(|| ToggleError::RootNotFound(root.clone()))
    }

    /// Handle a settings-menu entry after the host's own generic move
    /// may have displaced the root. `expected` is the root's position when
    /// the menu was opened.
    pub fn on_settings<S: BlockSequence + ?Sized>(
        &mut self,
        seq: &mut S,
        action: SettingsAction,
        root: &RootId,
        expected: usize,
    ) -> Outcome {
        let direction = match action {
            SettingsAction::MoveUp => Direction::Up,
            SettingsAction::MoveDown => Direction::Down,
            SettingsAction::DeleteWhole => {
                seq.close_toolbar();
                return self.apply(seq, Action::DeleteWhole(root.clone()));
            }
        };

        let result = self
            .instance_mut(root)
            .and_then(|instance| instance.on_settings_move(seq, direction, expected))
            .map(|landed| landed.is_some());
        let outcome = Outcome::from_result(result);
        if outcome.is_applied() {
            self.settle(seq);
        }
        outcome
    }

    // =========================================================================
    // Host notifications
    // =========================================================================

    /// React to a mutation the host performed itself.
    ///
    /// Inserted blocks inherit their predecessor's membership, removed roots
    /// hand their members to their own parent, and a single-block move of a
    /// root is widened to a move of its whole subtree.
    pub fn on_host_event<S: BlockSequence + ?Sized>(&mut self, seq: &mut S, event: SequenceEvent) -> Outcome {
        let result = match &event {
            SequenceEvent::Inserted { position } => self.on_inserted(seq, *position),
            SequenceEvent::Removed { block, .. } => {
                self.tagger.forget_block(block.id);
                match block.root_id() {
                    Some(root) => {
                        self.toggles.shift_remove(root);
                        self.tagger
                            .promote_orphans(seq, root, block.parent_link())
                            .map(|promoted| promoted > 0)
                    }
                    None => Ok(block.is_tagged()),
                }
            }
            SequenceEvent::Moved { from, to } => self.on_moved(seq, *from, *to),
        };

        let outcome = Outcome::from_result(result);
        if let Outcome::Rejected(e) = &outcome {
            tracing::warn!("{event:?} could not be reconciled: {e}");
        }
        if self.config.deferred_recheck {
            self.schedule_recheck();
        } else {
            self.settle(seq);
        }
        outcome
    }

    fn on_inserted<S: BlockSequence + ?Sized>(&mut self, seq: &mut S, position: usize) -> Result<bool> {
        let block = navigator::block(seq, position)?;
        if let Some(instance) = ToggleInstance::from_block(block)
            && !self.toggles.contains_key(instance.root_id())
        {
            self.toggles.insert(instance.root_id().clone(), instance);
        }

        let link = navigator::inherited_link(seq, position);
        self.tagger.retag(seq, position, link.as_ref())
    }

    fn on_moved<S: BlockSequence + ?Sized>(&mut self, seq: &mut S, from: usize, to: usize) -> Result<bool> {
        let Some(root) = navigator::block(seq, to)?.root_id().cloned() else {
            let link = navigator::inherited_link(seq, to);
            return self.tagger.retag(seq, to, link.as_ref());
        };

        ordering::restore_root(seq, &root, from)?;
        if to + 1 == from {
            return Ok(ordering::move_toggle(seq, &root, Direction::Up)?.is_some());
        }
        if to == from + 1 {
            return Ok(ordering::move_toggle(seq, &root, Direction::Down)?.is_some());
        }
        let target = if to < from { to } else { to + 1 };
        let outcome = ordering::drag_drop(seq, &mut self.tagger, from, target)?;
        Ok(outcome != DropOutcome::Unchanged)
    }

    // =========================================================================
    // Rechecks
    // =========================================================================

    /// Defer membership reconciliation to the next action or
    /// [`run_deferred`](Self::run_deferred) call.
    pub fn schedule_recheck(&mut self) {
        self.recheck_pending = true;
    }

    /// Run a pending recheck. Returns the number of healed tags.
    pub fn run_deferred<S: BlockSequence + ?Sized>(&mut self, seq: &mut S) -> usize {
        if !std::mem::take(&mut self.recheck_pending) {
            return 0;
        }
        self.settle(seq)
    }

    /// Restore every invariant after a mutation: heal misplaced tags,
    /// reconcile item counts, and recompute visibility.
    fn settle<S: BlockSequence + ?Sized>(&mut self, seq: &mut S) -> usize {
        let healed = match navigator::verify_forest(seq) {
            Ok(()) => 0,
            Err(violation) => {
                tracing::warn!("forest invariant violated: {violation}");
                self.tagger.heal(seq).unwrap_or_else(|e| {
                    tracing::warn!("heal failed: {e}");
                    0
                })
            }
        };

        self.toggles.retain(|root, _| seq.root_position(root).is_some());
        for instance in self.toggles.values_mut() {
            if let Err(e) = instance.reconcile(seq) {
                tracing::warn!("reconcile {:?} failed: {e}", instance.root_id());
            }
        }
        visibility::refresh_all(seq);
        healed
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    /// Persisted form of `root`.
    pub fn save_toggle<S: BlockSequence + ?Sized>(&self, seq: &S, root: &RootId) -> Result<ToggleData> {
        self.toggles
            .get(root)
            .ok_or_else(|| ToggleError::RootNotFound(root.clone()))?
            .save(seq)
    }
}
