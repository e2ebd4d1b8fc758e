use std::mem;

use log::{debug, info};
use rand::Rng;

use super::actions::{Action, ActionKind, Rejection};
use super::battle;
use super::effects::{report_fault, ChainReport, EffectEngine};
use super::state::{
    CardType, DestroyedCard, GameState, LogEntry, Phase, Player, PlayerIndex, SelectedCard, Zone,
    FIELD_SLOTS,
};
use super::summon::{self, PlacementMode};
use super::supply::CardSupplier;
use super::turn;
use crate::config::DuelConfig;

/// 对局引擎：所有行动的唯一入口。校验、结算与效果连锁都在这里串起来。
pub struct DuelEngine<S: CardSupplier> {
    config: DuelConfig,
    supplier: S,
    effects: EffectEngine,
}

impl<S: CardSupplier> DuelEngine<S> {
    pub fn new(config: DuelConfig, supplier: S) -> Self {
        let effects = EffectEngine::new(config.max_chain_resolutions);
        Self {
            config,
            supplier,
            effects,
        }
    }

    pub fn config(&self) -> &DuelConfig {
        &self.config
    }

    pub fn supplier_mut(&mut self) -> &mut S {
        &mut self.supplier
    }

    /// 发起始手牌并掷硬币决定先攻。
    pub fn start_duel<R: Rng + ?Sized>(&mut self, names: [&str; 2], coin: &mut R) -> GameState {
        let mut players = names.map(|name| Player::new(name, self.config.starting_life_points));
        for player in players.iter_mut() {
            for _ in 0..self.config.opening_hand_size {
                player.hand.push(self.supplier.draw_card());
            }
        }

        let first = if coin.gen_bool(0.5) { 0 } else { 1 };
        let mut state = GameState::new(players, first);
        let message = format!("Coin flip result: {} goes first!", state.players[first].name);
        info!("{message}");
        state.add_message(message);
        state
    }

    /// 应用一个行动。成功则提交并把效果连锁结算到不动点；
    /// 被拒绝时返回原状态，仅追加一条消息。
    pub fn apply(&mut self, mut state: GameState, action: &Action) -> GameState {
        let checkpoint = state.checkpoint();
        match self.dispatch(&mut state, action) {
            Ok(destroyed) => {
                state.record(LogEntry::Action {
                    action: action.clone(),
                    destroyed,
                });
                let report = self.effects.resolve_all(&mut state);
                Self::log_chain(action, &report);
            }
            Err(rejection) => {
                debug!("rejected {:?}: {rejection}", action.kind());
                state.rollback(checkpoint);
                state.add_message(rejection.to_string());
            }
        }
        state
    }

    pub fn apply_in_place(&mut self, state: &mut GameState, action: &Action) {
        let current = mem::take(state);
        *state = self.apply(current, action);
    }

    fn log_chain(action: &Action, report: &ChainReport) {
        if report.resolved > 0 || report.faults > 0 {
            debug!(
                "{} chain: {} resolved, {} faulted, truncated: {}",
                action.kind(),
                report.resolved,
                report.faults,
                report.truncated
            );
        }
    }

    fn dispatch(&mut self, state: &mut GameState, action: &Action) -> Result<Vec<DestroyedCard>, Rejection> {
        Self::ensure_integrity(state)?;
        let player = action.player_index();
        Self::ensure_player(player)?;

        match action {
            Action::Summon {
                card_index,
                tribute_indices,
                ..
            } => {
                Self::ensure_turn_owner(state, player)?;
                Self::ensure_main_phase(state, ActionKind::Summon)?;
                summon::play_from_hand(
                    state,
                    player,
                    *card_index,
                    tribute_indices.as_deref(),
                    PlacementMode::FaceUp,
                )?;
            }
            Action::Set {
                card_index,
                tribute_indices,
                ..
            } => {
                Self::ensure_turn_owner(state, player)?;
                Self::ensure_main_phase(state, ActionKind::Set)?;
                summon::play_from_hand(
                    state,
                    player,
                    *card_index,
                    tribute_indices.as_deref(),
                    PlacementMode::FaceDown,
                )?;
            }
            Action::Flip { card_index, .. } => {
                Self::ensure_turn_owner(state, player)?;
                summon::flip(state, player, *card_index)?;
            }
            Action::Attack { target_index, .. } => {
                Self::ensure_turn_owner(state, player)?;
                Self::ensure_battle_phase(state)?;
                return battle::attack(state, player, *target_index);
            }
            Action::ActivateSpell { card_index, .. } => {
                self.activate_spell(state, player, *card_index)?;
            }
            Action::EndPhase { .. } => {
                Self::ensure_turn_owner(state, player)?;
                turn::end_phase(state, &mut self.supplier, &self.config);
            }
            Action::EndTurn { .. } => {
                Self::ensure_turn_owner(state, player)?;
                turn::end_turn(state, &mut self.supplier, &self.config);
            }
            Action::SelectCard {
                card_index,
                location,
                ..
            } => {
                Self::select_card(state, player, *card_index, *location)?;
            }
        }
        Ok(Vec::new())
    }

    fn ensure_integrity(state: &GameState) -> Result<(), Rejection> {
        state
            .integrity_check()
            .map_err(|error| Rejection::IntegrityViolation { error })
    }

    fn ensure_player(player: PlayerIndex) -> Result<(), Rejection> {
        if player > 1 {
            return Err(Rejection::UnknownPlayer { index: player });
        }
        Ok(())
    }

    fn ensure_turn_owner(state: &GameState, player: PlayerIndex) -> Result<(), Rejection> {
        if state.current_player != player {
            return Err(Rejection::NotYourTurn {
                player: state.players[player].name.clone(),
            });
        }
        Ok(())
    }

    fn ensure_main_phase(state: &GameState, action: ActionKind) -> Result<(), Rejection> {
        if !state.phase.is_main() {
            return Err(Rejection::WrongPhase {
                action,
                phase: state.phase,
            });
        }
        Ok(())
    }

    fn ensure_battle_phase(state: &GameState) -> Result<(), Rejection> {
        if state.phase != Phase::Battle {
            return Err(Rejection::WrongPhase {
                action: ActionKind::Attack,
                phase: state.phase,
            });
        }
        if state.first_turn {
            return Err(Rejection::FirstTurnAttack);
        }
        Ok(())
    }

    fn activate_spell(&self, state: &mut GameState, player: PlayerIndex, slot: usize) -> Result<(), Rejection> {
        if slot >= FIELD_SLOTS {
            return Err(Rejection::SlotOutOfRange { index: slot });
        }
        let card = state.players[player].spell_trap_field[slot]
            .clone()
            .ok_or(Rejection::EmptySlot {
                zone: Zone::SpellTrapField,
                index: slot,
            })?;
        if card.card_type != CardType::Spell {
            return Err(Rejection::NotASpell { card: card.name });
        }

        if let Some(condition) = card.effect.as_ref().and_then(|effect| effect.condition.as_ref()) {
            match condition.evaluate(state, player) {
                Ok(true) => {}
                Ok(false) => return Err(Rejection::ConditionNotMet { card: card.name }),
                Err(fault) => {
                    return Err(Rejection::ActivationFault {
                        card: card.name,
                        reason: fault.to_string(),
                    })
                }
            }
        }

        let message = format!("{} activated {}.", state.players[player].name, card.name);
        state.add_message(message);
        if let Err(fault) = self.effects.invoke(state, &card, player) {
            report_fault(state, &card, &fault);
        }

        let owner = &mut state.players[player];
        if let Some(spent) = owner.spell_trap_field[slot].take() {
            owner.graveyard.push(spent);
        }
        Ok(())
    }

    fn select_card(
        state: &mut GameState,
        player: PlayerIndex,
        card_index: usize,
        zone: Zone,
    ) -> Result<(), Rejection> {
        let owner = &state.players[player];
        let present = match zone {
            Zone::Hand => {
                if card_index >= owner.hand.len() {
                    return Err(Rejection::NoCardInHand { index: card_index });
                }
                true
            }
            Zone::MonsterField | Zone::SpellTrapField => {
                if card_index >= FIELD_SLOTS {
                    return Err(Rejection::SlotOutOfRange { index: card_index });
                }
                let field = if zone == Zone::MonsterField {
                    &owner.monster_field
                } else {
                    &owner.spell_trap_field
                };
                field[card_index].is_some()
            }
            Zone::Graveyard => return Err(Rejection::UnselectableZone { zone }),
        };
        if !present {
            return Err(Rejection::EmptySlot {
                zone,
                index: card_index,
            });
        }

        state.selected_card = Some(SelectedCard {
            player_index: player,
            card_index,
            zone,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    use super::*;
    use crate::game::effects::{EffectCondition, EffectKind, EffectTarget};
    use crate::game::state::{Card, CardEffect, EffectType, Position};
    use crate::game::supply::SequenceSupplier;

    fn engine() -> DuelEngine<SequenceSupplier> {
        let supplier = SequenceSupplier::new(vec![Card::monster(0, "Kuriboh", 300, 200, 1)])
            .expect("templates are not empty")
            .starting_at(9000);
        DuelEngine::new(DuelConfig::default(), supplier)
    }

    fn duel(phase: Phase) -> GameState {
        let mut state = GameState::new([Player::new("Yugi", 8000), Player::new("Kaiba", 8000)], 0)
            .with_phase(phase);
        state.first_turn = false;
        state
    }

    fn summon(card_index: usize) -> Action {
        Action::Summon {
            player_index: 0,
            card_index,
            tribute_indices: None,
        }
    }

    #[test]
    fn summon_outside_main_phase_only_appends_a_message() {
        let mut engine = engine();
        for phase in [Phase::Draw, Phase::Standby, Phase::Battle, Phase::End] {
            let mut state = duel(phase);
            state.players[0].hand.push(Card::monster(1, "Kuriboh", 300, 200, 1));
            state.players[0].hand.push(Card::spell(2, "Hinotama"));

            for action in [
                summon(0),
                Action::Set {
                    player_index: 0,
                    card_index: 1,
                    tribute_indices: None,
                },
            ] {
                let next = engine.apply(state.clone(), &action);

                let mut expected = state.clone();
                expected.add_message(format!("Cannot {} during {phase} phase.", action.kind()));
                assert_eq!(next, expected);
            }
        }
    }

    #[test]
    fn successful_actions_are_logged() {
        let mut engine = engine();
        let mut state = duel(Phase::Main1);
        state.players[0].hand.push(Card::monster(1, "Kuriboh", 300, 200, 1));

        let next = engine.apply(state, &summon(0));

        assert_eq!(
            next.last_entry(),
            Some(&LogEntry::Action {
                action: summon(0),
                destroyed: Vec::new(),
            })
        );
        assert_eq!(next.players[0].monster_count(), 1);
    }

    #[test]
    fn only_the_turn_owner_may_summon_or_attack() {
        let mut engine = engine();
        let mut state = duel(Phase::Main1);
        state.players[1].hand.push(Card::monster(1, "Kuriboh", 300, 200, 1));

        let next = engine.apply(
            state.clone(),
            &Action::Summon {
                player_index: 1,
                card_index: 0,
                tribute_indices: None,
            },
        );

        assert_eq!(next.players, state.players);
        assert_eq!(
            next.messages.last().map(String::as_str),
            Some("It is not Kaiba's turn.")
        );

        let next = engine.apply(state, &Action::EndTurn { player_index: 7 });
        assert_eq!(
            next.messages.last().map(String::as_str),
            Some("Player 7 does not exist.")
        );
    }

    #[test]
    fn first_turn_blocks_attacks() {
        let mut engine = engine();
        let mut state = duel(Phase::Battle);
        state.first_turn = true;
        state.players[0].monster_field[0] = Some(Card::monster(1, "Gemini Elf", 1900, 900, 4));
        state = engine.apply(
            state,
            &Action::SelectCard {
                player_index: 0,
                card_index: 0,
                location: Zone::MonsterField,
            },
        );

        let next = engine.apply(
            state.clone(),
            &Action::Attack {
                player_index: 0,
                target_index: None,
            },
        );

        assert_eq!(next.players[1].life_points, 8000);
        assert_eq!(
            next.messages.last().map(String::as_str),
            Some("Cannot attack on the first turn.")
        );
    }

    #[test]
    fn attack_outside_battle_only_appends_a_message() {
        let mut engine = engine();
        let mut state = duel(Phase::Main1);
        state.players[0].monster_field[0] = Some(Card::monster(1, "Gemini Elf", 1900, 900, 4));
        state = engine.apply(
            state,
            &Action::SelectCard {
                player_index: 0,
                card_index: 0,
                location: Zone::MonsterField,
            },
        );

        let next = engine.apply(
            state.clone(),
            &Action::Attack {
                player_index: 0,
                target_index: None,
            },
        );

        let mut expected = state;
        expected.add_message("Cannot attack during main1 phase.");
        assert_eq!(next, expected);
    }

    #[test]
    fn select_then_attack_resolves_battle_and_triggers() {
        let mut engine = engine();
        let mut state = duel(Phase::Battle);
        state.players[0].monster_field[0] = Some(Card::monster(1, "Dark Magician", 2500, 2100, 7));
        state.players[1].monster_field[1] = Some(Card::monster(2, "Kuriboh", 300, 200, 1));
        state.players[1].monster_field[3] = Some(
            Card::monster(3, "Sangan", 1000, 600, 3)
                .in_position(Position::Defense)
                .with_effect(
                    CardEffect::new(
                        EffectType::Trigger,
                        EffectKind::GainLife {
                            amount: 1000,
                            target: EffectTarget::Owner,
                        },
                    )
                    .with_condition(EffectCondition::MonsterDestroyed {
                        target: EffectTarget::Owner,
                    }),
                ),
        );

        state = engine.apply(
            state,
            &Action::SelectCard {
                player_index: 0,
                card_index: 0,
                location: Zone::MonsterField,
            },
        );
        let next = engine.apply(
            state,
            &Action::Attack {
                player_index: 0,
                target_index: Some(1),
            },
        );

        // 2500 - 300 = 2200 战斗伤害，随后诱发回复 1000。
        assert_eq!(next.players[1].life_points, 8000 - 2200 + 1000);
        assert!(next.players[1].monster_field[1].is_none());
        assert!(next.selected_card.is_none());
        assert!(matches!(
            next.action_log.last(),
            Some(LogEntry::Effect { card_name, .. }) if card_name == "Sangan"
        ));
    }

    #[test]
    fn spell_activation_applies_effect_and_discards_the_spell() {
        let mut engine = engine();
        let mut state = duel(Phase::Main1);
        state.players[0].spell_trap_field[2] = Some(Card::spell(1, "Hinotama").with_effect(CardEffect::new(
            EffectType::Ignition,
            EffectKind::InflictDamage {
                amount: 500,
                target: EffectTarget::Opponent,
            },
        )));

        let next = engine.apply(
            state,
            &Action::ActivateSpell {
                player_index: 0,
                card_index: 2,
            },
        );

        assert_eq!(next.players[1].life_points, 7500);
        assert!(next.players[0].spell_trap_field[2].is_none());
        assert_eq!(next.players[0].graveyard.len(), 1);
        assert!(next.messages.iter().any(|message| message == "Yugi activated Hinotama."));
    }

    #[test]
    fn spell_with_unmet_condition_stays_on_the_field() {
        let mut engine = engine();
        let mut state = duel(Phase::Main1);
        state.players[0].spell_trap_field[0] = Some(Card::spell(1, "Dark Hole").with_effect(
            CardEffect::new(EffectType::Ignition, EffectKind::DestroyAllMonsters).with_condition(
                EffectCondition::FieldCountAtLeast {
                    target: EffectTarget::Opponent,
                    count: 1,
                },
            ),
        ));
        state.players[0].spell_trap_field[1] = Some(Card::trap(2, "Mirror Force"));

        let next = engine.apply(
            state.clone(),
            &Action::ActivateSpell {
                player_index: 0,
                card_index: 0,
            },
        );
        assert_eq!(next.players, state.players);
        assert_eq!(
            next.messages.last().map(String::as_str),
            Some("The activation condition of Dark Hole is not met.")
        );

        let next = engine.apply(
            state,
            &Action::ActivateSpell {
                player_index: 0,
                card_index: 1,
            },
        );
        assert_eq!(
            next.messages.last().map(String::as_str),
            Some("Mirror Force is not a Spell card.")
        );
    }

    #[test]
    fn graveyard_cards_cannot_be_selected() {
        let mut engine = engine();
        let mut state = duel(Phase::Main1);
        state.players[0].graveyard.push(Card::monster(1, "Kuriboh", 300, 200, 1));

        let next = engine.apply(
            state,
            &Action::SelectCard {
                player_index: 0,
                card_index: 0,
                location: Zone::Graveyard,
            },
        );

        assert!(next.selected_card.is_none());
        assert_eq!(
            next.messages.last().map(String::as_str),
            Some("Cards cannot be selected from the graveyard.")
        );
    }

    #[test]
    fn corrupted_state_is_rejected_without_mutation() {
        let mut engine = engine();
        let mut state = duel(Phase::Main1);
        let card = Card::monster(1, "Kuriboh", 300, 200, 1);
        state.players[0].hand.push(card.clone());
        state.players[1].hand.push(card);

        let next = engine.apply(state.clone(), &summon(0));

        assert_eq!(next.players, state.players);
        assert_eq!(next.messages.len(), 1);
        assert!(next.messages[0].starts_with("Game state failed its integrity check"));
    }

    #[test]
    fn start_duel_deals_opening_hands_and_flips_a_coin() {
        let mut engine = engine();
        let mut coin = SmallRng::seed_from_u64(3);

        let state = engine.start_duel(["Yugi", "Kaiba"], &mut coin);

        assert_eq!(state.players[0].hand.len(), 5);
        assert_eq!(state.players[1].hand.len(), 5);
        assert_eq!(state.players[0].life_points, 8000);
        assert_eq!(state.phase, Phase::Draw);
        assert_eq!(state.turn, 1);
        assert!(state.first_turn);
        let first = &state.players[state.current_player].name;
        assert_eq!(state.messages, vec![format!("Coin flip result: {first} goes first!")]);
        assert!(state.integrity_check().is_ok());
    }

    #[test]
    fn apply_in_place_matches_apply() {
        let mut engine = engine();
        let mut state = duel(Phase::Main1);
        let expected = engine.apply(state.clone(), &Action::EndPhase { player_index: 0 });

        engine.apply_in_place(&mut state, &Action::EndPhase { player_index: 0 });

        assert_eq!(state, expected);
        assert_eq!(state.phase, Phase::Battle);
    }
}
