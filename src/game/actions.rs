use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use super::state::{IntegrityError, Phase, PlayerIndex, Zone};

/// 玩家或 AI 提交给引擎的行动，JSON 中以 `type` 字段区分。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Action {
    Summon {
        player_index: PlayerIndex,
        card_index: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tribute_indices: Option<Vec<usize>>,
    },
    Set {
        player_index: PlayerIndex,
        card_index: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tribute_indices: Option<Vec<usize>>,
    },
    Flip {
        player_index: PlayerIndex,
        card_index: usize,
    },
    Attack {
        player_index: PlayerIndex,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target_index: Option<usize>,
    },
    ActivateSpell {
        player_index: PlayerIndex,
        card_index: usize,
    },
    EndPhase {
        player_index: PlayerIndex,
    },
    EndTurn {
        player_index: PlayerIndex,
    },
    SelectCard {
        player_index: PlayerIndex,
        card_index: usize,
        location: Zone,
    },
}

impl Action {
    pub fn player_index(&self) -> PlayerIndex {
        match self {
            Action::Summon { player_index, .. }
            | Action::Set { player_index, .. }
            | Action::Flip { player_index, .. }
            | Action::Attack { player_index, .. }
            | Action::ActivateSpell { player_index, .. }
            | Action::EndPhase { player_index }
            | Action::EndTurn { player_index }
            | Action::SelectCard { player_index, .. } => *player_index,
        }
    }

    pub fn kind(&self) -> ActionKind {
        match self {
            Action::Summon { .. } => ActionKind::Summon,
            Action::Set { .. } => ActionKind::Set,
            Action::Flip { .. } => ActionKind::Flip,
            Action::Attack { .. } => ActionKind::Attack,
            Action::ActivateSpell { .. } => ActionKind::ActivateSpell,
            Action::EndPhase { .. } => ActionKind::EndPhase,
            Action::EndTurn { .. } => ActionKind::EndTurn,
            Action::SelectCard { .. } => ActionKind::SelectCard,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum ActionKind {
    Summon,
    Set,
    Flip,
    Attack,
    ActivateSpell,
    EndPhase,
    EndTurn,
    SelectCard,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ActionKind::Summon => "summon",
            ActionKind::Set => "set",
            ActionKind::Flip => "flip",
            ActionKind::Attack => "attack",
            ActionKind::ActivateSpell => "activate a spell",
            ActionKind::EndPhase => "end the phase",
            ActionKind::EndTurn => "end the turn",
            ActionKind::SelectCard => "select a card",
        };
        f.write_str(name)
    }
}

/// 被拒绝的行动。`Display` 文本即写入消息日志的内容，状态本身保持不变。
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum Rejection {
    #[error("Player {index} does not exist.")]
    UnknownPlayer { index: PlayerIndex },
    #[error("It is not {player}'s turn.")]
    NotYourTurn { player: String },
    #[error("Cannot {action} during {phase} phase.")]
    WrongPhase { action: ActionKind, phase: Phase },
    #[error("Cannot attack on the first turn.")]
    FirstTurnAttack,
    #[error("There is no card at hand position {index}.")]
    NoCardInHand { index: usize },
    #[error("Slot {index} is outside the field.")]
    SlotOutOfRange { index: usize },
    #[error("There is no card in {zone} slot {index}.")]
    EmptySlot { zone: Zone, index: usize },
    #[error("The {zone} is full.")]
    ZoneFull { zone: Zone },
    #[error("Cards cannot be selected from the {zone}.")]
    UnselectableZone { zone: Zone },
    #[error("Normal summon has already been used this turn.")]
    NormalSummonUsed,
    #[error("{card} requires exactly {required} tributes but {supplied} were offered.")]
    TributeCount {
        card: String,
        required: usize,
        supplied: usize,
    },
    #[error("Tribute slots must be distinct and occupied.")]
    InvalidTributes,
    #[error("Cannot fusion summon {card}: missing {missing}.")]
    MissingFusionMaterials { card: String, missing: String },
    #[error("{card} cannot be summoned from the hand.")]
    NotSummonable { card: String },
    #[error("{card} is not face down.")]
    NotFaceDown { card: String },
    #[error("No attacking monster is selected.")]
    NoAttackerSelected,
    #[error("{card} is not in attack position.")]
    NotInAttackPosition { card: String },
    #[error("{card} is not a Spell card.")]
    NotASpell { card: String },
    #[error("The activation condition of {card} is not met.")]
    ConditionNotMet { card: String },
    #[error("{card} could not be activated: {reason}.")]
    ActivationFault { card: String, reason: String },
    #[error("Game state failed its integrity check: {error}.")]
    IntegrityViolation { error: IntegrityError },
}
