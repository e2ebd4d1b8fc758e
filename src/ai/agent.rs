use std::str::FromStr;

use log::{debug, warn};
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::game::summon::missing_fusion_materials;
use crate::game::{
    Action, Card, CardSupplier, CardType, DuelEngine, GameState, LogEntry, Phase, Player,
    PlayerIndex, Position, SummonType, Zone,
};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AiStrategy {
    /// 总是选择优先级最高的候选行动。
    Greedy,
    Random,
}

impl FromStr for AiStrategy {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "greedy" | "aggressive" => Ok(AiStrategy::Greedy),
            "random" => Ok(AiStrategy::Random),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    pub strategy: AiStrategy,
    /// 单回合内最多提交的行动数，超过后强制结束回合。
    pub max_turn_steps: usize,
}

impl AiConfig {
    pub fn with_strategy(mut self, strategy: AiStrategy) -> Self {
        self.strategy = strategy;
        self
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            strategy: AiStrategy::Greedy,
            max_turn_steps: 64,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiDecision {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<Action>,
    pub candidates: usize,
    pub strategy: AiStrategy,
}

/// 与人类玩家走同一个 `apply` 入口的简单对手。
/// 本回合谁已攻击过由行动日志推出，所以同一状态交给任何实例都会得到一致的候选。
pub struct AiAgent {
    config: AiConfig,
    rng: SmallRng,
}

impl AiAgent {
    pub fn new(config: AiConfig) -> Self {
        Self::with_rng(config, SmallRng::from_entropy())
    }

    pub fn with_seed(config: AiConfig, seed: u64) -> Self {
        Self::with_rng(config, SmallRng::seed_from_u64(seed))
    }

    fn with_rng(config: AiConfig, rng: SmallRng) -> Self {
        Self { config, rng }
    }

    pub fn config(&self) -> &AiConfig {
        &self.config
    }

    pub fn decide(&mut self, state: &GameState, player: PlayerIndex) -> AiDecision {
        let candidates = self.candidates(state, player);
        let count = candidates.len();
        let action = match self.config.strategy {
            AiStrategy::Greedy => candidates.into_iter().next(),
            AiStrategy::Random => candidates.choose(&mut self.rng).cloned(),
        };
        AiDecision {
            action,
            candidates: count,
            strategy: self.config.strategy,
        }
    }

    /// 下一步行动；不是自己的回合时返回 `None`。
    pub fn next_action(&mut self, state: &GameState, player: PlayerIndex) -> Option<Action> {
        self.decide(state, player).action
    }

    /// 连续行动直到回合交给对手。被拒绝的行动会让 AI 直接结束回合。
    pub fn play_turn<S: CardSupplier>(
        &mut self,
        engine: &mut DuelEngine<S>,
        state: GameState,
        player: PlayerIndex,
    ) -> GameState {
        let mut state = state;
        for _ in 0..self.config.max_turn_steps {
            if state.current_player != player {
                return state;
            }
            let Some(action) = self.next_action(&state, player) else {
                break;
            };
            debug!("ai player {player} submits {:?}", action.kind());

            let logged = state.action_log.len();
            state = engine.apply(state, &action);
            if state.action_log.len() == logged {
                warn!("ai action {} was rejected, ending the turn", action.kind());
                break;
            }
        }

        if state.current_player == player {
            state = engine.apply(state, &Action::EndTurn { player_index: player });
        }
        state
    }

    fn candidates(&self, state: &GameState, player: PlayerIndex) -> Vec<Action> {
        if player > 1 || state.current_player != player {
            return Vec::new();
        }
        let player_index = player;
        match state.phase {
            Phase::Draw | Phase::Standby | Phase::Main2 => vec![Action::EndPhase { player_index }],
            Phase::End => vec![Action::EndTurn { player_index }],
            Phase::Main1 => {
                let mut actions = main_phase_actions(state, player);
                if actions.is_empty() {
                    actions.push(Action::EndPhase { player_index });
                }
                actions
            }
            Phase::Battle => battle_actions(state, player),
        }
    }
}

/// 战斗阶段：已选中的攻击者先攻击，其余攻击表示且本阶段未攻击过的怪兽依次被选中。
fn battle_actions(state: &GameState, player: PlayerIndex) -> Vec<Action> {
    let player_index = player;
    if state.first_turn {
        return vec![Action::EndPhase { player_index }];
    }

    let attacked = attacked_slots(state, player);
    let ready: Vec<usize> = state.players[player]
        .monsters()
        .filter(|(slot, card)| card.position == Position::Attack && !attacked.contains(slot))
        .map(|(slot, _)| slot)
        .collect();

    let staged = state.selected_card.filter(|selected| {
        selected.player_index == player
            && selected.zone == Zone::MonsterField
            && ready.contains(&selected.card_index)
    });
    if staged.is_some() {
        let target_index = pick_target(&state.players[GameState::opponent_of(player)]);
        return vec![Action::Attack {
            player_index,
            target_index,
        }];
    }

    if ready.is_empty() {
        return vec![Action::EndPhase { player_index }];
    }
    ready
        .into_iter()
        .map(|card_index| Action::SelectCard {
            player_index,
            card_index,
            location: Zone::MonsterField,
        })
        .collect()
}

/// 本战斗阶段内已发起过攻击的格子。
///
/// 进入战斗阶段必然经过一次 `endPhase`，离开也必然经过 `endPhase` 或 `endTurn`，
/// 所以日志中最后一次阶段推进之后的行动都属于当前战斗阶段。
fn attacked_slots(state: &GameState, player: PlayerIndex) -> Vec<usize> {
    let since = state
        .action_log
        .iter()
        .rposition(|entry| {
            matches!(
                entry,
                LogEntry::Action {
                    action: Action::EndPhase { .. } | Action::EndTurn { .. },
                    ..
                }
            )
        })
        .map_or(0, |index| index + 1);

    let mut selected = None;
    let mut attacked = Vec::new();
    for entry in &state.action_log[since..] {
        let LogEntry::Action { action, .. } = entry else {
            continue;
        };
        match action {
            Action::SelectCard {
                player_index,
                card_index,
                location,
            } => {
                let own_monster = *player_index == player && *location == Zone::MonsterField;
                selected = own_monster.then_some(*card_index);
            }
            Action::Attack { player_index, .. } if *player_index == player => {
                attacked.extend(selected.take());
            }
            _ => {}
        }
    }
    attacked
}

/// 主要阶段的候选行动，按优先级排列：融合、手牌特殊召唤、通常召唤、盖放魔陷、发动魔法。
fn main_phase_actions(state: &GameState, player: PlayerIndex) -> Vec<Action> {
    let player_index = player;
    let me = &state.players[player];
    let mut actions = Vec::new();
    let has_monster_slot = me.first_empty_monster_slot().is_some();

    for (card_index, card) in me.hand.iter().enumerate() {
        if card.summon_type == Some(SummonType::Fusion)
            && has_monster_slot
            && missing_fusion_materials(me, card_index).is_empty()
        {
            actions.push(Action::Summon {
                player_index,
                card_index,
                tribute_indices: None,
            });
        }
    }

    if has_monster_slot {
        for (card_index, card) in me.hand.iter().enumerate() {
            let ready = card
                .hand_summon_condition
                .as_ref()
                .map_or(false, |condition| condition.evaluate(state, player).unwrap_or(false));
            if ready {
                actions.push(Action::Summon {
                    player_index,
                    card_index,
                    tribute_indices: None,
                });
            }
        }
    }

    if me.normal_summon_available {
        let mut summons: Vec<(i32, Action)> = me
            .hand
            .iter()
            .enumerate()
            .filter(|(_, card)| card.card_type == CardType::Monster)
            .filter_map(|(card_index, card)| {
                summon_for(me, player_index, card_index, card).map(|action| (card.attack_points(), action))
            })
            .collect();
        summons.sort_by(|a, b| b.0.cmp(&a.0));
        actions.extend(summons.into_iter().map(|(_, action)| action));
    }

    if me.first_empty_spell_trap_slot().is_some() {
        for (card_index, card) in me.hand.iter().enumerate() {
            if card.card_type != CardType::Monster {
                actions.push(Action::Set {
                    player_index,
                    card_index,
                    tribute_indices: None,
                });
            }
        }
    }

    for (card_index, card) in me.spell_trap_field.iter().enumerate() {
        let Some(card) = card else { continue };
        if card.card_type != CardType::Spell {
            continue;
        }
        let ready = card
            .effect
            .as_ref()
            .and_then(|effect| effect.condition.as_ref())
            .map_or(true, |condition| condition.evaluate(state, player).unwrap_or(false));
        if ready {
            actions.push(Action::ActivateSpell {
                player_index,
                card_index,
            });
        }
    }

    actions
}

fn summon_for(me: &Player, player_index: PlayerIndex, card_index: usize, card: &Card) -> Option<Action> {
    match card.summon_type.unwrap_or(SummonType::Normal) {
        SummonType::Normal => me.first_empty_monster_slot().map(|_| Action::Summon {
            player_index,
            card_index,
            tribute_indices: None,
        }),
        SummonType::Tribute => {
            let required = usize::from(card.tributes_required.unwrap_or(0));
            let mut fodder: Vec<(usize, i32)> = me
                .monsters()
                .map(|(slot, monster)| (slot, monster.attack_points()))
                .collect();
            if fodder.len() < required {
                return None;
            }
            if required == 0 && me.first_empty_monster_slot().is_none() {
                return None;
            }
            fodder.sort_by_key(|(_, attack)| *attack);
            fodder.truncate(required);
            // 祭品比新怪兽更强时不值得上级召唤。
            if fodder.iter().any(|(_, attack)| *attack >= card.attack_points()) {
                return None;
            }
            Some(Action::Summon {
                player_index,
                card_index,
                tribute_indices: Some(fodder.into_iter().map(|(slot, _)| slot).collect()),
            })
        }
        SummonType::Fusion | SummonType::Special => None,
    }
}

/// 优先攻击最容易击破的怪兽；对方场上为空时直接攻击。
fn pick_target(opponent: &Player) -> Option<usize> {
    opponent
        .monsters()
        .min_by_key(|(_, card)| match card.position {
            Position::Attack => card.attack_points(),
            Position::Defense | Position::Set => card.defense_points(),
        })
        .map(|(slot, _)| slot)
}
