use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

use super::actions::Action;
use super::effects::{EffectCondition, EffectKind};

/// 怪兽区与魔法陷阱区的格子数。
pub const FIELD_SLOTS: usize = 5;

/// 单张卡牌实体的唯一标识（按副本而非按卡名）。
pub type CardId = u32;
/// 玩家下标，只能是 0 或 1。
pub type PlayerIndex = usize;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum CardType {
    Monster,
    Spell,
    Trap,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Position {
    Attack,
    Defense,
    Set,
}

impl Default for Position {
    fn default() -> Self {
        Position::Attack
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SummonType {
    Normal,
    Tribute,
    Fusion,
    Special,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EffectType {
    Ignition,
    Trigger,
    Continuous,
}

/// 卡牌附带的效果描述：纯数据，由效果引擎解释执行。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CardEffect {
    pub effect_type: EffectType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<EffectCondition>,
    pub effect: EffectKind,
}

impl CardEffect {
    pub fn new(effect_type: EffectType, effect: EffectKind) -> Self {
        Self {
            effect_type,
            condition: None,
            effect,
        }
    }

    pub fn with_condition(mut self, condition: EffectCondition) -> Self {
        self.condition = Some(condition);
        self
    }
}

/// 对局中的卡牌副本，怪兽专属数值为可选字段。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Card {
    pub id: CardId,
    pub name: String,
    pub card_type: CardType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attack: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub defense: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
    #[serde(default)]
    pub position: Position,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summon_type: Option<SummonType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tributes_required: Option<u8>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fusion_materials: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effect: Option<CardEffect>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub battle_indestructible: bool,
    /// 条件成立时可不经祭品从手牌特殊召唤，不占用通常召唤。
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hand_summon_condition: Option<EffectCondition>,
}

impl Card {
    pub fn monster(id: CardId, name: impl Into<String>, attack: i32, defense: i32, level: u8) -> Self {
        Self {
            id,
            name: name.into(),
            card_type: CardType::Monster,
            attack: Some(attack),
            defense: Some(defense),
            level: Some(level),
            attribute: None,
            position: Position::Attack,
            summon_type: Some(SummonType::Normal),
            tributes_required: None,
            fusion_materials: Vec::new(),
            effect: None,
            battle_indestructible: false,
            hand_summon_condition: None,
        }
    }

    pub fn spell(id: CardId, name: impl Into<String>) -> Self {
        Self::non_monster(id, name, CardType::Spell)
    }

    pub fn trap(id: CardId, name: impl Into<String>) -> Self {
        Self::non_monster(id, name, CardType::Trap)
    }

    fn non_monster(id: CardId, name: impl Into<String>, card_type: CardType) -> Self {
        Self {
            id,
            name: name.into(),
            card_type,
            attack: None,
            defense: None,
            level: None,
            attribute: None,
            position: Position::Set,
            summon_type: None,
            tributes_required: None,
            fusion_materials: Vec::new(),
            effect: None,
            battle_indestructible: false,
            hand_summon_condition: None,
        }
    }

    pub fn with_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attribute = Some(attribute.into());
        self
    }

    pub fn with_tributes(mut self, tributes: u8) -> Self {
        self.summon_type = Some(SummonType::Tribute);
        self.tributes_required = Some(tributes);
        self
    }

    pub fn with_fusion_materials<I, S>(mut self, materials: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.summon_type = Some(SummonType::Fusion);
        self.fusion_materials = materials.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_summon_type(mut self, summon_type: SummonType) -> Self {
        self.summon_type = Some(summon_type);
        self
    }

    pub fn with_effect(mut self, effect: CardEffect) -> Self {
        self.effect = Some(effect);
        self
    }

    pub fn indestructible_by_battle(mut self) -> Self {
        self.battle_indestructible = true;
        self
    }

    pub fn hand_summonable_when(mut self, condition: EffectCondition) -> Self {
        self.hand_summon_condition = Some(condition);
        self
    }

    pub fn in_position(mut self, position: Position) -> Self {
        self.position = position;
        self
    }

    /// 复制卡牌模板并赋予新的唯一标识。
    pub fn copy_with_id(&self, id: CardId) -> Self {
        let mut card = self.clone();
        card.id = id;
        card
    }

    pub fn is_monster(&self) -> bool {
        self.card_type == CardType::Monster
    }

    pub fn attack_points(&self) -> i32 {
        self.attack.unwrap_or(0)
    }

    pub fn defense_points(&self) -> i32 {
        self.defense.unwrap_or(0)
    }
}

/// 玩家状态：手牌、两块五格场地与墓地。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Player {
    pub name: String,
    #[serde(default)]
    pub hand: Vec<Card>,
    #[serde(default)]
    pub monster_field: [Option<Card>; FIELD_SLOTS],
    #[serde(default)]
    pub spell_trap_field: [Option<Card>; FIELD_SLOTS],
    #[serde(default)]
    pub graveyard: Vec<Card>,
    pub life_points: i32,
    pub normal_summon_available: bool,
}

impl Player {
    pub fn new(name: impl Into<String>, life_points: i32) -> Self {
        Self {
            name: name.into(),
            hand: Vec::new(),
            monster_field: Default::default(),
            spell_trap_field: Default::default(),
            graveyard: Vec::new(),
            life_points,
            normal_summon_available: true,
        }
    }

    pub fn first_empty_monster_slot(&self) -> Option<usize> {
        self.monster_field.iter().position(Option::is_none)
    }

    pub fn first_empty_spell_trap_slot(&self) -> Option<usize> {
        self.spell_trap_field.iter().position(Option::is_none)
    }

    pub fn monster_count(&self) -> usize {
        self.monster_field.iter().flatten().count()
    }

    pub fn spell_trap_count(&self) -> usize {
        self.spell_trap_field.iter().flatten().count()
    }

    /// 按格子顺序列出已占用的怪兽格。
    pub fn monsters(&self) -> impl Iterator<Item = (usize, &Card)> {
        self.monster_field
            .iter()
            .enumerate()
            .filter_map(|(slot, card)| card.as_ref().map(|card| (slot, card)))
    }

    pub fn monster_at(&self, slot: usize) -> Option<&Card> {
        self.monster_field.get(slot).and_then(Option::as_ref)
    }

    /// 将指定格子的怪兽送入墓地。
    pub fn send_monster_to_graveyard(&mut self, slot: usize) -> Option<CardId> {
        let card = self.monster_field.get_mut(slot)?.take()?;
        let id = card.id;
        self.graveyard.push(card);
        Some(id)
    }

    /// 遍历该玩家所有区域中的卡牌。
    pub fn all_cards(&self) -> impl Iterator<Item = &Card> {
        self.hand
            .iter()
            .chain(self.monster_field.iter().flatten())
            .chain(self.spell_trap_field.iter().flatten())
            .chain(self.graveyard.iter())
    }
}

/// 回合阶段，按固定顺序循环。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Draw,
    Standby,
    Main1,
    Battle,
    Main2,
    End,
}

impl Phase {
    pub const ORDER: [Phase; 6] = [
        Phase::Draw,
        Phase::Standby,
        Phase::Main1,
        Phase::Battle,
        Phase::Main2,
        Phase::End,
    ];

    pub fn next(self) -> Phase {
        let index = Self::ORDER
            .iter()
            .position(|phase| *phase == self)
            .unwrap_or(0);
        Self::ORDER[(index + 1) % Self::ORDER.len()]
    }

    pub fn is_main(self) -> bool {
        matches!(self, Phase::Main1 | Phase::Main2)
    }
}

impl Default for Phase {
    fn default() -> Self {
        Phase::Draw
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Draw => "draw",
            Phase::Standby => "standby",
            Phase::Main1 => "main1",
            Phase::Battle => "battle",
            Phase::Main2 => "main2",
            Phase::End => "end",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Zone {
    Hand,
    MonsterField,
    SpellTrapField,
    Graveyard,
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Zone::Hand => "hand",
            Zone::MonsterField => "monster zone",
            Zone::SpellTrapField => "spell/trap zone",
            Zone::Graveyard => "graveyard",
        };
        f.write_str(name)
    }
}

/// `selectCard` 暂存的选择，供 `attack` 使用。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SelectedCard {
    pub player_index: PlayerIndex,
    pub card_index: usize,
    pub zone: Zone,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct DestroyedCard {
    pub owner: PlayerIndex,
    pub card_id: CardId,
}

/// 行动日志条目，效果条件据此判断“刚刚发生了什么”。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum LogEntry {
    Action {
        action: Action,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        destroyed: Vec<DestroyedCard>,
    },
    Effect {
        card_id: CardId,
        card_name: String,
        owner: PlayerIndex,
    },
}

#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum IntegrityError {
    #[error("player index {index} is out of range")]
    InvalidPlayerIndex { index: PlayerIndex },
    #[error("card id {card_id} occupies more than one zone")]
    DuplicateCardId { card_id: CardId },
    #[error("selected card points at slot {card_index}, outside the field")]
    SelectionOutOfRange { card_index: usize },
}

/// 回滚点：复制玩家与标量字段，两份只追加的日志只记长度。
#[derive(Debug, Clone)]
pub struct Checkpoint {
    players: [Player; 2],
    current_player: PlayerIndex,
    phase: Phase,
    turn: u32,
    selected_card: Option<SelectedCard>,
    first_turn: bool,
    messages: usize,
    action_log: usize,
}

/// 对局整体状态。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameState {
    pub players: [Player; 2],
    pub current_player: PlayerIndex,
    pub phase: Phase,
    pub turn: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_card: Option<SelectedCard>,
    pub first_turn: bool,
    #[serde(default)]
    pub messages: Vec<String>,
    #[serde(default)]
    pub action_log: Vec<LogEntry>,
}

impl GameState {
    pub fn new(players: [Player; 2], current_player: PlayerIndex) -> Self {
        Self {
            players,
            current_player,
            phase: Phase::Draw,
            turn: 1,
            selected_card: None,
            first_turn: true,
            messages: Vec::new(),
            action_log: Vec::new(),
        }
    }

    pub fn with_phase(mut self, phase: Phase) -> Self {
        self.phase = phase;
        self
    }

    pub fn add_message(&mut self, message: impl Into<String>) {
        self.messages.push(message.into());
    }

    pub fn record(&mut self, entry: LogEntry) {
        self.action_log.push(entry);
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    pub fn opponent_of(player: PlayerIndex) -> PlayerIndex {
        1 - player
    }

    pub fn current(&self) -> &Player {
        &self.players[self.current_player]
    }

    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            players: self.players.clone(),
            current_player: self.current_player,
            phase: self.phase,
            turn: self.turn,
            selected_card: self.selected_card,
            first_turn: self.first_turn,
            messages: self.messages.len(),
            action_log: self.action_log.len(),
        }
    }

    /// 回到 `checkpoint` 时的状态。之后追加的消息与日志条目会被截掉。
    pub fn rollback(&mut self, checkpoint: Checkpoint) {
        self.players = checkpoint.players;
        self.current_player = checkpoint.current_player;
        self.phase = checkpoint.phase;
        self.turn = checkpoint.turn;
        self.selected_card = checkpoint.selected_card;
        self.first_turn = checkpoint.first_turn;
        self.messages.truncate(checkpoint.messages);
        self.action_log.truncate(checkpoint.action_log);
    }

    /// 场上任意区域中最大的卡牌 id。
    pub fn max_card_id(&self) -> Option<CardId> {
        self.players.iter().flat_map(Player::all_cards).map(|card| card.id).max()
    }

    /// 日志末尾的条目，即“刚刚发生了什么”。
    pub fn last_entry(&self) -> Option<&LogEntry> {
        self.action_log.last()
    }

    /// 破坏怪兽：移入其持有者的墓地并写入消息。
    pub fn destroy_monster(&mut self, owner: PlayerIndex, slot: usize) -> Option<DestroyedCard> {
        let player = self.players.get_mut(owner)?;
        let name = player.monster_at(slot)?.name.clone();
        let card_id = player.send_monster_to_graveyard(slot)?;
        let owner_name = player.name.clone();
        self.add_message(format!("{owner_name}'s {name} was destroyed."));
        Some(DestroyedCard { owner, card_id })
    }

    pub fn integrity_check(&self) -> Result<(), IntegrityError> {
        if self.current_player >= self.players.len() {
            return Err(IntegrityError::InvalidPlayerIndex {
                index: self.current_player,
            });
        }

        if let Some(selected) = &self.selected_card {
            if selected.player_index >= self.players.len() {
                return Err(IntegrityError::InvalidPlayerIndex {
                    index: selected.player_index,
                });
            }
            if selected.zone != Zone::Hand && selected.card_index >= FIELD_SLOTS {
                return Err(IntegrityError::SelectionOutOfRange {
                    card_index: selected.card_index,
                });
            }
        }

        let mut seen = HashSet::new();
        for card in self.players.iter().flat_map(Player::all_cards) {
            if !seen.insert(card.id) {
                return Err(IntegrityError::DuplicateCardId { card_id: card.id });
            }
        }

        Ok(())
    }
}

impl Default for GameState {
    fn default() -> Self {
        Self::new(
            [
                Player::new("Player", crate::config::DEFAULT_LIFE_POINTS),
                Player::new("AI", crate::config::DEFAULT_LIFE_POINTS),
            ],
            0,
        )
    }
}
