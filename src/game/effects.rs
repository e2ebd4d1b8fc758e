use std::collections::HashSet;

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::actions::ActionKind;
use super::state::{
    Card, CardId, EffectType, GameState, LogEntry, Phase, PlayerIndex, Position, FIELD_SLOTS,
};

/// 条件与效果允许的最大嵌套层数。
const MAX_NESTING: usize = 16;

/// 相对于连锁条目持有者的玩家。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EffectTarget {
    Owner,
    Opponent,
}

impl EffectTarget {
    pub fn resolve(self, owner: PlayerIndex) -> Result<PlayerIndex, EffectFault> {
        if owner > 1 {
            return Err(EffectFault::PlayerOutOfRange { index: owner });
        }
        Ok(match self {
            EffectTarget::Owner => owner,
            EffectTarget::Opponent => GameState::opponent_of(owner),
        })
    }
}

/// 卡牌定义本身有误时产生的故障；只会跳过该卡的效果，不会中断引擎。
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum EffectFault {
    #[error("slot {slot} is outside the field")]
    SlotOutOfRange { slot: usize },
    #[error("player {index} does not exist")]
    PlayerOutOfRange { index: PlayerIndex },
    #[error("descriptor nests deeper than {limit} levels")]
    NestingTooDeep { limit: usize },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum EffectCondition {
    Always,
    PhaseIs {
        phase: Phase,
    },
    /// 日志最后一条是该类行动。
    LastActionWas {
        action: ActionKind,
    },
    /// 日志最后一条是指定卡名的效果结算。
    LastEffectFrom {
        name: String,
    },
    /// 刚执行的行动破坏了目标玩家的怪兽。
    MonsterDestroyed {
        target: EffectTarget,
    },
    LifeBelow {
        target: EffectTarget,
        threshold: i32,
    },
    FieldEmpty {
        target: EffectTarget,
    },
    FieldCountAtLeast {
        target: EffectTarget,
        count: usize,
    },
    GraveyardHasMonster {
        target: EffectTarget,
    },
    SlotOccupied {
        target: EffectTarget,
        slot: usize,
    },
    All {
        conditions: Vec<EffectCondition>,
    },
    Any {
        conditions: Vec<EffectCondition>,
    },
    Not {
        condition: Box<EffectCondition>,
    },
}

impl EffectCondition {
    pub fn evaluate(&self, state: &GameState, owner: PlayerIndex) -> Result<bool, EffectFault> {
        EffectTarget::Owner.resolve(owner)?;
        self.evaluate_at(state, owner, 0)
    }

    fn evaluate_at(
        &self,
        state: &GameState,
        owner: PlayerIndex,
        depth: usize,
    ) -> Result<bool, EffectFault> {
        if depth > MAX_NESTING {
            return Err(EffectFault::NestingTooDeep { limit: MAX_NESTING });
        }

        Ok(match self {
            EffectCondition::Always => true,
            EffectCondition::PhaseIs { phase } => state.phase == *phase,
            EffectCondition::LastActionWas { action } => matches!(
                state.last_entry(),
                Some(LogEntry::Action { action: last, .. }) if last.kind() == *action
            ),
            EffectCondition::LastEffectFrom { name } => matches!(
                state.last_entry(),
                Some(LogEntry::Effect { card_name, .. }) if card_name == name
            ),
            EffectCondition::MonsterDestroyed { target } => {
                let side = target.resolve(owner)?;
                match state.last_entry() {
                    Some(LogEntry::Action { destroyed, .. }) => {
                        destroyed.iter().any(|card| card.owner == side)
                    }
                    _ => false,
                }
            }
            EffectCondition::LifeBelow { target, threshold } => {
                state.players[target.resolve(owner)?].life_points < *threshold
            }
            EffectCondition::FieldEmpty { target } => {
                state.players[target.resolve(owner)?].monster_count() == 0
            }
            EffectCondition::FieldCountAtLeast { target, count } => {
                state.players[target.resolve(owner)?].monster_count() >= *count
            }
            EffectCondition::GraveyardHasMonster { target } => {
                let side = target.resolve(owner)?;
                state.players[side].graveyard.iter().any(Card::is_monster)
            }
            EffectCondition::SlotOccupied { target, slot } => {
                let side = target.resolve(owner)?;
                if *slot >= FIELD_SLOTS {
                    return Err(EffectFault::SlotOutOfRange { slot: *slot });
                }
                state.players[side].monster_field[*slot].is_some()
            }
            EffectCondition::All { conditions } => {
                for condition in conditions {
                    if !condition.evaluate_at(state, owner, depth + 1)? {
                        return Ok(false);
                    }
                }
                true
            }
            EffectCondition::Any { conditions } => {
                for condition in conditions {
                    if condition.evaluate_at(state, owner, depth + 1)? {
                        return Ok(true);
                    }
                }
                false
            }
            EffectCondition::Not { condition } => !condition.evaluate_at(state, owner, depth + 1)?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum EffectKind {
    InflictDamage {
        amount: i32,
        target: EffectTarget,
    },
    GainLife {
        amount: i32,
        target: EffectTarget,
    },
    DestroyMonsterAt {
        target: EffectTarget,
        slot: usize,
    },
    DestroyAttackPosition {
        target: EffectTarget,
    },
    DestroyAllMonsters,
    /// 将目标墓地中攻击力最高的怪兽以攻击表示特殊召唤到持有者场上。
    ReviveFromGraveyard {
        from: EffectTarget,
    },
    /// 将持有者墓地中最近送去的一只符合条件的怪兽加入手牌。
    ReturnToHand {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_attack: Option<i32>,
    },
    /// 从持有者手牌特殊召唤第一张符合条件的怪兽。
    SpecialSummonFromHand {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        attribute: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_attack: Option<i32>,
    },
    Composite {
        effects: Vec<EffectKind>,
    },
    Conditional {
        condition: Box<EffectCondition>,
        effect: Box<EffectKind>,
    },
}

impl EffectKind {
    pub fn apply(&self, state: &mut GameState, owner: PlayerIndex) -> Result<(), EffectFault> {
        EffectTarget::Owner.resolve(owner)?;
        self.apply_at(state, owner, 0)
    }

    fn apply_at(
        &self,
        state: &mut GameState,
        owner: PlayerIndex,
        depth: usize,
    ) -> Result<(), EffectFault> {
        if depth > MAX_NESTING {
            return Err(EffectFault::NestingTooDeep { limit: MAX_NESTING });
        }

        match self {
            EffectKind::InflictDamage { amount, target } => {
                let side = target.resolve(owner)?;
                let player = &mut state.players[side];
                player.life_points = player.life_points.saturating_sub(*amount);
                let message = format!("{} took {amount} damage.", player.name);
                state.add_message(message);
            }
            EffectKind::GainLife { amount, target } => {
                let side = target.resolve(owner)?;
                let player = &mut state.players[side];
                player.life_points = player.life_points.saturating_add(*amount);
                let message = format!("{} gained {amount} life points.", player.name);
                state.add_message(message);
            }
            EffectKind::DestroyMonsterAt { target, slot } => {
                let side = target.resolve(owner)?;
                if *slot >= FIELD_SLOTS {
                    return Err(EffectFault::SlotOutOfRange { slot: *slot });
                }
                state.destroy_monster(side, *slot);
            }
            EffectKind::DestroyAttackPosition { target } => {
                let side = target.resolve(owner)?;
                let slots: Vec<usize> = state.players[side]
                    .monsters()
                    .filter(|(_, card)| card.position == Position::Attack)
                    .map(|(slot, _)| slot)
                    .collect();
                for slot in slots {
                    state.destroy_monster(side, slot);
                }
            }
            EffectKind::DestroyAllMonsters => {
                for side in 0..state.players.len() {
                    for slot in 0..FIELD_SLOTS {
                        state.destroy_monster(side, slot);
                    }
                }
            }
            EffectKind::ReviveFromGraveyard { from } => {
                let source = from.resolve(owner)?;
                revive_strongest(state, source, owner);
            }
            EffectKind::ReturnToHand { max_attack } => {
                let player = &mut state.players[owner];
                let found = player.graveyard.iter().rposition(|card| {
                    card.is_monster() && max_attack.map_or(true, |limit| card.attack_points() <= limit)
                });
                let message = match found {
                    Some(index) => {
                        let monster = player.graveyard.remove(index);
                        let message = format!("{} added {} to the hand.", player.name, monster.name);
                        player.hand.push(monster);
                        message
                    }
                    None => format!("{} has no eligible monster in the graveyard.", player.name),
                };
                state.add_message(message);
            }
            EffectKind::SpecialSummonFromHand {
                name,
                attribute,
                max_attack,
            } => {
                let matches = |card: &Card| {
                    card.is_monster()
                        && name.as_ref().map_or(true, |name| &card.name == name)
                        && attribute
                            .as_ref()
                            .map_or(true, |attribute| card.attribute.as_ref() == Some(attribute))
                        && max_attack.map_or(true, |limit| card.attack_points() <= limit)
                };
                let player = &state.players[owner];
                let Some(index) = player.hand.iter().position(matches) else {
                    let message = format!("{} has no eligible monster in hand.", player.name);
                    state.add_message(message);
                    return Ok(());
                };
                let Some(slot) = player.first_empty_monster_slot() else {
                    let message = format!("{}'s monster zone is full.", player.name);
                    state.add_message(message);
                    return Ok(());
                };
                let player = &mut state.players[owner];
                let mut monster = player.hand.remove(index);
                monster.position = Position::Attack;
                let message = format!("{} special summoned {}.", player.name, monster.name);
                player.monster_field[slot] = Some(monster);
                state.add_message(message);
            }
            EffectKind::Composite { effects } => {
                for effect in effects {
                    effect.apply_at(state, owner, depth + 1)?;
                }
            }
            EffectKind::Conditional { condition, effect } => {
                if condition.evaluate_at(state, owner, depth + 1)? {
                    effect.apply_at(state, owner, depth + 1)?;
                }
            }
        }
        Ok(())
    }
}

fn revive_strongest(state: &mut GameState, source: PlayerIndex, owner: PlayerIndex) {
    let strongest = state.players[source]
        .graveyard
        .iter()
        .enumerate()
        .filter(|(_, card)| card.is_monster())
        .fold(None::<(usize, i32)>, |best, (index, card)| match best {
            Some((_, attack)) if attack >= card.attack_points() => best,
            _ => Some((index, card.attack_points())),
        });
    let owner_name = state.players[owner].name.clone();
    let (Some((index, _)), Some(slot)) = (strongest, state.players[owner].first_empty_monster_slot())
    else {
        state.add_message(format!("{owner_name} could not revive a monster."));
        return;
    };

    let mut monster = state.players[source].graveyard.remove(index);
    monster.position = Position::Attack;
    let message = format!("{owner_name} special summoned {} from the graveyard.", monster.name);
    state.players[owner].monster_field[slot] = Some(monster);
    state.add_message(message);
}

/// 记录一次效果故障：写入消息日志与 `log`，引擎继续运行。
pub(crate) fn report_fault(state: &mut GameState, card: &Card, fault: &EffectFault) {
    warn!("effect of {} (#{}) faulted: {fault}", card.name, card.id);
    state.add_message(format!("{}'s effect failed ({fault}) and was skipped.", card.name));
}

#[derive(Debug, Clone)]
struct ChainLink {
    card: Card,
    owner: PlayerIndex,
}

/// 单次结算内部使用的连锁（后进先出），不会暴露到对局状态中。
#[derive(Debug, Default)]
struct EffectChain {
    links: Vec<ChainLink>,
}

impl EffectChain {
    fn push(&mut self, link: ChainLink) {
        self.links.push(link);
    }

    fn pop(&mut self) -> Option<ChainLink> {
        self.links.pop()
    }

    fn len(&self) -> usize {
        self.links.len()
    }

    fn clear(&mut self) {
        self.links.clear();
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChainReport {
    pub resolved: usize,
    pub faults: usize,
    pub truncated: bool,
}

#[derive(Debug, Default)]
struct ResolutionPass {
    faulted: HashSet<CardId>,
    report: ChainReport,
}

#[derive(Debug, Clone)]
pub struct EffectEngine {
    max_resolutions: usize,
}

impl EffectEngine {
    pub fn new(max_resolutions: usize) -> Self {
        Self { max_resolutions }
    }

    pub fn max_resolutions(&self) -> usize {
        self.max_resolutions
    }

    /// 扫描双方场上怪兽并把连锁结算到不动点。
    pub fn resolve_all(&self, state: &mut GameState) -> ChainReport {
        let mut pass = ResolutionPass::default();
        let mut chain = EffectChain::default();

        let armed = self.scan(state, &mut pass);
        let mut active: HashSet<CardId> = armed.iter().map(|link| link.card.id).collect();
        for link in armed {
            chain.push(link);
        }

        while let Some(link) = chain.pop() {
            if pass.report.resolved >= self.max_resolutions {
                warn!(
                    "chain cap of {} hit, dropping {} pending entries",
                    self.max_resolutions,
                    chain.len() + 1
                );
                state.add_message(format!(
                    "Chain resolution limit of {} reached; remaining chain discarded.",
                    self.max_resolutions
                ));
                chain.clear();
                pass.report.truncated = true;
                break;
            }
            pass.report.resolved += 1;

            if let Err(fault) = self.invoke(state, &link.card, link.owner) {
                pass.faulted.insert(link.card.id);
                pass.report.faults += 1;
                report_fault(state, &link.card, &fault);
            }

            // 只有条件由假变真的诱发效果才会重新加入连锁。
            let armed = self.scan(state, &mut pass);
            let now_active: HashSet<CardId> = armed.iter().map(|link| link.card.id).collect();
            for link in armed {
                let retriggers = link
                    .card
                    .effect
                    .as_ref()
                    .map_or(false, |effect| effect.effect_type != EffectType::Continuous);
                if retriggers && !active.contains(&link.card.id) {
                    chain.push(link);
                }
            }
            active = now_active;
        }

        pass.report
    }

    /// 执行单张卡的效果。效果在副本上运行，出错时原状态保持不变。
    pub(crate) fn invoke(
        &self,
        state: &mut GameState,
        card: &Card,
        owner: PlayerIndex,
    ) -> Result<(), EffectFault> {
        let Some(effect) = card.effect.as_ref() else {
            return Ok(());
        };

        let owner_name = state
            .players
            .get(owner)
            .map(|player| player.name.clone())
            .ok_or(EffectFault::PlayerOutOfRange { index: owner })?;
        let checkpoint = state.checkpoint();
        state.add_message(format!("{}'s effect resolves for {owner_name}.", card.name));
        if let Err(fault) = effect.effect.apply(state, owner) {
            state.rollback(checkpoint);
            return Err(fault);
        }
        state.record(LogEntry::Effect {
            card_id: card.id,
            card_name: card.name.clone(),
            owner,
        });
        debug!("resolved effect of {} (#{}) for player {owner}", card.name, card.id);
        Ok(())
    }

    fn scan(&self, state: &mut GameState, pass: &mut ResolutionPass) -> Vec<ChainLink> {
        let mut armed = Vec::new();
        let mut faults = Vec::new();

        for (owner, player) in state.players.iter().enumerate() {
            for (_, card) in player.monsters() {
                let Some(effect) = card.effect.as_ref() else {
                    continue;
                };
                if pass.faulted.contains(&card.id) {
                    continue;
                }
                let ready = match &effect.condition {
                    Some(condition) => condition.evaluate(state, owner),
                    None => Ok(true),
                };
                match ready {
                    Ok(true) => armed.push(ChainLink {
                        card: card.clone(),
                        owner,
                    }),
                    Ok(false) => {}
                    Err(fault) => faults.push((card.clone(), fault)),
                }
            }
        }

        for (card, fault) in faults {
            pass.faulted.insert(card.id);
            pass.report.faults += 1;
            report_fault(state, &card, &fault);
        }

        armed
    }
}
