//! A single toggle's runtime state and its host-facing contract.
//!
//! [`ToggleInstance`] is constructed from persisted [`ToggleData`], renders a
//! [`ToggleView`] for the host, flips between open and closed, serves the
//! settings menu, and serializes back. The root block in the sequence holds
//! the durable copy of status and declared item count; the instance keeps
//! them in sync.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::EnumString;

use crate::config::EngineConfig;
use crate::host::BlockSequence;
use crate::navigator;
use crate::ordering::{self, Direction};
use crate::tagger::MembershipTagger;
use crate::visibility;
use crate::{Block, Result, RootId, ToggleData, ToggleError, ToggleStatus};

// ============================================================================
// Settings menu
// ============================================================================

/// Entries a toggle adds to the host's block settings menu.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString)]
#[serde(rename_all = "kebab-case")]
#[strum(ascii_case_insensitive)]
pub enum SettingsAction {
    #[strum(serialize = "move-up")]
    MoveUp,
    #[strum(serialize = "move-down")]
    MoveDown,
    #[strum(serialize = "delete-toggle", serialize = "delete")]
    DeleteWhole,
}

impl SettingsAction {
    /// All entries in menu order.
    pub const ALL: [SettingsAction; 3] = [
        SettingsAction::MoveUp,
        SettingsAction::MoveDown,
        SettingsAction::DeleteWhole,
    ];

    /// Parse from string (case-insensitive).
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        <Self as FromStr>::from_str(s).ok()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SettingsAction::MoveUp => "move-up",
            SettingsAction::MoveDown => "move-down",
            SettingsAction::DeleteWhole => "delete-toggle",
        }
    }

    /// Menu label.
    pub fn label(&self) -> &'static str {
        match self {
            SettingsAction::MoveUp => "Move up",
            SettingsAction::MoveDown => "Move down",
            SettingsAction::DeleteWhole => "Delete toggle",
        }
    }
}

impl std::fmt::Display for SettingsAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Rendering
// ============================================================================

/// What the host draws for a toggle root.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ToggleView {
    pub icon: String,
    pub title: String,
    /// Shown below the title while the toggle has no members.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    pub status: ToggleStatus,
    /// The root itself sits inside a closed toggle.
    pub hidden: bool,
}

// ============================================================================
// ToggleInstance
// ============================================================================

/// Runtime record of one toggle root.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToggleInstance {
    root_id: RootId,
    status: ToggleStatus,
    text: String,
    declared_items: usize,
}

impl ToggleInstance {
    /// Construct from persisted data.
    pub fn new(data: ToggleData) -> Self {
        Self {
            root_id: data.fk,
            status: data.status,
            text: data.text,
            declared_items: data.items,
        }
    }

    /// A fresh toggle with a new root ID and the configured default status.
    pub fn create(text: impl Into<String>, config: &EngineConfig) -> Self {
        Self::new(ToggleData::new(text, config.default_status))
    }

    /// Rebuild the record from a root block already in the sequence.
    pub fn from_block(block: &Block) -> Option<Self> {
        let state = block.toggle.as_ref()?;
        Some(Self {
            root_id: state.root_id.clone(),
            status: state.status,
            text: block.content.clone(),
            declared_items: state.items,
        })
    }

    pub fn root_id(&self) -> &RootId {
        &self.root_id
    }

    pub fn status(&self) -> ToggleStatus {
        self.status
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn declared_items(&self) -> usize {
        self.declared_items
    }

    /// Current position of the root block.
    pub fn position<S: BlockSequence + ?Sized>(&self, seq: &S) -> Result<usize> {
        seq.root_position(&self.root_id)
            .ok_or_else(|| ToggleError::RootNotFound(self.root_id.clone()))
    }

    /// A root block carrying this toggle's state.
    pub fn root_block(&self) -> Block {
        Block::toggle_root(self.root_id.clone(), self.text.clone(), self.status)
            .with_items(self.declared_items)
    }

    /// Re-scan membership and produce the host view.
    ///
    /// Claims up to the declared number of following blocks, adopts the
    /// actual member count as the new declared count, and applies the
    /// effective status to the subtree.
    pub fn render<S: BlockSequence + ?Sized>(
        &mut self,
        seq: &mut S,
        tagger: &mut MembershipTagger,
        config: &EngineConfig,
    ) -> Result<ToggleView> {
        let position = self.position(seq)?;
        tagger.reconstruct(seq, position)?;
        self.reconcile(seq)?;

        let effective = visibility::effective_status(seq, &self.root_id)?;
        visibility::set_visibility(seq, &self.root_id, effective);

        let root = navigator::block(seq, position)?;
        self.text = root.content.clone();
        let title = if self.text.is_empty() {
            config.title_placeholder.clone()
        } else {
            self.text.clone()
        };

        Ok(ToggleView {
            icon: config.icon(self.status).to_string(),
            title,
            placeholder: (self.declared_items == 0).then(|| config.placeholder.clone()),
            status: self.status,
            hidden: root.hidden,
        })
    }

    /// Persisted form, with `items` set to the current direct member count.
    pub fn save<S: BlockSequence + ?Sized>(&self, seq: &S) -> Result<ToggleData> {
        let position = self.position(seq)?;
        let root = navigator::block(seq, position)?;
        Ok(ToggleData {
            text: root.content.clone(),
            status: root.toggle_status().unwrap_or(self.status),
            fk: self.root_id.clone(),
            items: navigator::direct_members(seq, &self.root_id).len(),
        })
    }

    /// Flip open/closed, persist the status onto the root block, and
    /// propagate visibility. Returns the new status.
    pub fn toggle<S: BlockSequence + ?Sized>(&mut self, seq: &mut S) -> Result<ToggleStatus> {
        let position = self.position(seq)?;
        let len = seq.block_count();
        let state = seq
            .block_at_mut(position)
            .and_then(|b| b.toggle.as_mut())
            .ok_or(ToggleError::PositionOutOfRange { position, len })?;

        state.status = state.status.flipped();
        self.status = state.status;

        let effective = visibility::effective_status(seq, &self.root_id)?;
        let touched = visibility::set_visibility(seq, &self.root_id, effective);
        tracing::debug!("{:?} is now {} ({touched} blocks updated)", self.root_id, self.status);
        Ok(self.status)
    }

    /// Align the declared count with the actual direct members and write it
    /// onto the root block. Returns the member count.
    pub fn reconcile<S: BlockSequence + ?Sized>(&mut self, seq: &mut S) -> Result<usize> {
        let position = self.position(seq)?;
        let actual = navigator::direct_members(seq, &self.root_id).len();
        if actual != self.declared_items {
            let divergence = ToggleError::DivergentItemCount {
                root: self.root_id.clone(),
                declared: self.declared_items,
                actual,
            };
            tracing::debug!("{divergence}, adopting actual");
            self.declared_items = actual;
        }
        if let Some(block) = seq.block_at_mut(position) {
            self.text = block.content.clone();
            if let Some(state) = block.toggle.as_mut() {
                state.items = actual;
                self.status = state.status;
            }
        }
        Ok(actual)
    }

    pub fn move_up<S: BlockSequence + ?Sized>(&self, seq: &mut S) -> Result<Option<usize>> {
        ordering::move_toggle(seq, &self.root_id, Direction::Up)
    }

    pub fn move_down<S: BlockSequence + ?Sized>(&self, seq: &mut S) -> Result<Option<usize>> {
        ordering::move_toggle(seq, &self.root_id, Direction::Down)
    }

    /// Handle a settings-menu move after the host may have shifted the root
    /// block alone. `expected` is where the root sat before the host acted.
    pub fn on_settings_move<S: BlockSequence + ?Sized>(
        &self,
        seq: &mut S,
        direction: Direction,
        expected: usize,
    ) -> Result<Option<usize>> {
        if ordering::restore_root(seq, &self.root_id, expected)? {
            tracing::debug!("restored displaced {:?} to {expected}", self.root_id);
        }
        seq.close_toolbar();
        ordering::move_toggle(seq, &self.root_id, direction)
    }

    /// Delete the root and its whole subtree.
    pub fn delete_whole<S: BlockSequence + ?Sized>(
        &self,
        seq: &mut S,
        tagger: &mut MembershipTagger,
    ) -> Result<Vec<Block>> {
        ordering::delete_whole_toggle(seq, tagger, &self.root_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemorySequence;

    fn rid(s: &str) -> RootId {
        RootId::parse(s).unwrap()
    }

    fn data(fk: &str, status: ToggleStatus, items: usize) -> ToggleData {
        ToggleData {
            text: fk.to_string(),
            status,
            fk: rid(fk),
            items,
        }
    }

    #[test]
    fn test_settings_action_parse() {
        assert_eq!(SettingsAction::from_str("move-up"), Some(SettingsAction::MoveUp));
        assert_eq!(SettingsAction::from_str("DELETE"), Some(SettingsAction::DeleteWhole));
        assert_eq!(SettingsAction::from_str("indent"), None);
        assert_eq!(SettingsAction::DeleteWhole.to_string(), "delete-toggle");
        assert_eq!(SettingsAction::ALL.map(|a| a.label())[1], "Move down");
    }

    #[test]
    fn test_render_reconstructs_and_closes() {
        let mut inst = ToggleInstance::new(data("R", ToggleStatus::Closed, 2));
        let mut s = MemorySequence::from_blocks(vec![
            inst.root_block(),
            Block::paragraph("a"),
            Block::paragraph("b"),
            Block::paragraph("c"),
        ]);
        let mut tagger = MembershipTagger::new();
        let config = EngineConfig::default();

        let view = inst.render(&mut s, &mut tagger, &config).unwrap();
        assert_eq!(view.icon, config.closed_icon);
        assert_eq!(view.title, "R");
        assert_eq!(view.placeholder, None);
        assert!(!view.hidden);

        let hidden: Vec<bool> = s.blocks().iter().map(|b| b.hidden).collect();
        assert_eq!(hidden, vec![false, true, true, false]);
        assert_eq!(inst.declared_items(), 2);
        assert!(tagger.is_known_member(&rid("R"), s.blocks()[2].id));
    }

    #[test]
    fn test_render_adopts_actual_count() {
        let mut inst = ToggleInstance::new(data("R", ToggleStatus::Open, 5));
        let mut s = MemorySequence::from_blocks(vec![inst.root_block(), Block::paragraph("a")]);
        let mut tagger = MembershipTagger::new();
        let config = EngineConfig::default();

        inst.render(&mut s, &mut tagger, &config).unwrap();
        assert_eq!(inst.declared_items(), 1);
        assert_eq!(s.blocks()[0].toggle.as_ref().unwrap().items, 1);
    }

    #[test]
    fn test_empty_toggle_shows_placeholder() {
        let config = EngineConfig::default();
        let mut inst = ToggleInstance::create("", &config);
        let mut s = MemorySequence::from_blocks(vec![inst.root_block()]);
        let mut tagger = MembershipTagger::new();

        let view = inst.render(&mut s, &mut tagger, &config).unwrap();
        assert_eq!(view.title, config.title_placeholder);
        assert_eq!(view.placeholder.as_deref(), Some(config.placeholder.as_str()));
        assert_eq!(view.status, ToggleStatus::Open);
    }

    #[test]
    fn test_toggle_persists_status_and_saves() {
        let mut inst = ToggleInstance::new(data("R", ToggleStatus::Open, 0));
        let mut s = MemorySequence::from_blocks(vec![
            inst.root_block(),
            Block::paragraph("a").tagged(&rid("R")),
            Block::paragraph("after"),
        ]);

        assert_eq!(inst.toggle(&mut s).unwrap(), ToggleStatus::Closed);
        assert_eq!(s.blocks()[0].toggle_status(), Some(ToggleStatus::Closed));
        assert!(s.blocks()[1].hidden);

        s.block_at_mut(0).unwrap().content = "Renamed".into();
        let saved = inst.save(&s).unwrap();
        assert_eq!(saved.text, "Renamed");
        assert_eq!(saved.status, ToggleStatus::Closed);
        assert_eq!(saved.items, 1);
        assert_eq!(saved.fk, rid("R"));

        assert_eq!(inst.toggle(&mut s).unwrap(), ToggleStatus::Open);
        assert!(!s.blocks()[1].hidden);
    }

    #[test]
    fn test_settings_move_restores_displaced_root() {
        let inst = ToggleInstance::new(data("R", ToggleStatus::Open, 0));
        let mut s = MemorySequence::from_blocks(vec![
            Block::paragraph("p"),
            inst.root_block(),
            Block::paragraph("a").tagged(&rid("R")),
        ]);
        s.open_toolbar();

        // The host's own "move up" already shifted the root alone.
        s.move_block(1, 0);
        let landed = inst.on_settings_move(&mut s, Direction::Up, 1).unwrap();

        assert_eq!(landed, Some(0));
        assert_eq!(s.contents(), vec!["R", "a", "p"]);
        assert!(!s.toolbar_open());
    }

    #[test]
    fn test_missing_root() {
        let mut inst = ToggleInstance::new(data("gone", ToggleStatus::Open, 0));
        let mut s = MemorySequence::from_blocks(vec![Block::paragraph("p")]);
        assert!(matches!(inst.toggle(&mut s), Err(ToggleError::RootNotFound(_))));
        assert!(inst.save(&s).is_err());
    }
}
