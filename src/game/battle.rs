use std::cmp::Ordering;

use super::actions::Rejection;
use super::state::{DestroyedCard, GameState, PlayerIndex, Position, Zone, FIELD_SLOTS};

/// 结算一次攻击。攻击者取自 `selected_card`，结算后无论胜负都会清空选择。
pub fn attack(
    state: &mut GameState,
    player: PlayerIndex,
    target_index: Option<usize>,
) -> Result<Vec<DestroyedCard>, Rejection> {
    let attacker_slot = match state.selected_card {
        Some(selected) if selected.player_index == player && selected.zone == Zone::MonsterField => {
            selected.card_index
        }
        _ => return Err(Rejection::NoAttackerSelected),
    };
    let attacker = state.players[player]
        .monster_at(attacker_slot)
        .ok_or(Rejection::NoAttackerSelected)?
        .clone();
    if attacker.position != Position::Attack {
        return Err(Rejection::NotInAttackPosition {
            card: attacker.name,
        });
    }
    if let Some(index) = target_index {
        if index >= FIELD_SLOTS {
            return Err(Rejection::SlotOutOfRange { index });
        }
    }

    let opponent = GameState::opponent_of(player);
    let me = state.players[player].name.clone();
    let foe = state.players[opponent].name.clone();
    let attack = attacker.attack_points();
    let mut casualties = Casualties::default();

    let target = target_index.and_then(|slot| {
        state.players[opponent]
            .monster_at(slot)
            .cloned()
            .map(|card| (slot, card))
    });

    match target {
        None => {
            inflict(state, opponent, attack);
            state.add_message(format!(
                "{} attacked directly. {foe} took {attack} damage.",
                attacker.name
            ));
        }
        Some((slot, defender)) if defender.position == Position::Attack => {
            let guard = defender.attack_points();
            match attack.cmp(&guard) {
                Ordering::Greater => {
                    let damage = attack.saturating_sub(guard);
                    inflict(state, opponent, damage);
                    casualties.destroy(state, opponent, slot);
                    state.add_message(format!(
                        "{} destroyed {}. {foe} took {damage} damage.",
                        attacker.name, defender.name
                    ));
                }
                Ordering::Less => {
                    let damage = guard.saturating_sub(attack);
                    inflict(state, player, damage);
                    casualties.destroy(state, player, attacker_slot);
                    state.add_message(format!(
                        "{} destroyed {}. {me} took {damage} damage.",
                        defender.name, attacker.name
                    ));
                }
                Ordering::Equal => {
                    casualties.destroy(state, player, attacker_slot);
                    casualties.destroy(state, opponent, slot);
                    state.add_message(format!(
                        "{} and {} destroyed each other.",
                        attacker.name, defender.name
                    ));
                }
            }
        }
        Some((slot, defender)) => {
            let guard = defender.defense_points();
            match attack.cmp(&guard) {
                Ordering::Greater => {
                    casualties.destroy(state, opponent, slot);
                    state.add_message(format!(
                        "{} destroyed {} in defense position.",
                        attacker.name, defender.name
                    ));
                }
                Ordering::Less => {
                    let damage = guard.saturating_sub(attack);
                    inflict(state, player, damage);
                    state.add_message(format!(
                        "{me} took {damage} damage. {} was not destroyed.",
                        defender.name
                    ));
                }
                Ordering::Equal => {
                    state.add_message(format!(
                        "{} attacked {}, but neither was destroyed.",
                        attacker.name, defender.name
                    ));
                }
            }
        }
    }

    for name in &casualties.spared {
        state.add_message(format!("{name} cannot be destroyed by battle."));
    }
    state.selected_card = None;
    Ok(casualties.destroyed)
}

fn inflict(state: &mut GameState, player: PlayerIndex, damage: i32) {
    let target = &mut state.players[player];
    target.life_points = target.life_points.saturating_sub(damage);
}

/// 一次战斗中送入墓地的怪兽，以及凭自身效果留在场上的怪兽。
#[derive(Default)]
struct Casualties {
    destroyed: Vec<DestroyedCard>,
    spared: Vec<String>,
}

impl Casualties {
    fn destroy(&mut self, state: &mut GameState, owner: PlayerIndex, slot: usize) {
        let Some(card) = state.players[owner].monster_at(slot) else {
            return;
        };
        if card.battle_indestructible {
            self.spared.push(card.name.clone());
            return;
        }
        if let Some(card_id) = state.players[owner].send_monster_to_graveyard(slot) {
            self.destroyed.push(DestroyedCard { owner, card_id });
        }
    }
}
