use std::collections::HashSet;

use super::actions::Rejection;
use super::state::{
    Card, CardType, GameState, Player, PlayerIndex, Position, SummonType, Zone, FIELD_SLOTS,
};

/// `summon` 以表侧攻击表示放置怪兽，`set` 以里侧放置。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlacementMode {
    FaceUp,
    FaceDown,
}

impl PlacementMode {
    fn position(self) -> Position {
        match self {
            PlacementMode::FaceUp => Position::Attack,
            PlacementMode::FaceDown => Position::Set,
        }
    }
}

/// 从手牌打出一张卡：怪兽按召唤类型分派，魔法/陷阱盖放到后场。
pub fn play_from_hand(
    state: &mut GameState,
    player: PlayerIndex,
    card_index: usize,
    tributes: Option<&[usize]>,
    mode: PlacementMode,
) -> Result<(), Rejection> {
    let card = state.players[player]
        .hand
        .get(card_index)
        .ok_or(Rejection::NoCardInHand { index: card_index })?;

    if card.card_type != CardType::Monster {
        return set_spell_trap(state, player, card_index);
    }
    if tributes.map_or(true, <[usize]>::is_empty) && hand_summon_ready(state, player, card)? {
        return hand_special_summon(state, player, card_index, mode);
    }

    match card.summon_type.unwrap_or(SummonType::Normal) {
        SummonType::Normal => normal_summon(state, player, card_index, mode),
        SummonType::Tribute => {
            tribute_summon(state, player, card_index, tributes.unwrap_or(&[]), mode)
        }
        SummonType::Fusion => fusion_summon(state, player, card_index),
        SummonType::Special => Err(Rejection::NotSummonable {
            card: card.name.clone(),
        }),
    }
}

fn hand_summon_ready(state: &GameState, player: PlayerIndex, card: &Card) -> Result<bool, Rejection> {
    let Some(condition) = card.hand_summon_condition.as_ref() else {
        return Ok(false);
    };
    condition
        .evaluate(state, player)
        .map_err(|fault| Rejection::ActivationFault {
            card: card.name.clone(),
            reason: fault.to_string(),
        })
}

/// 凭卡牌自身条件从手牌特殊召唤，不检查也不消耗通常召唤。
fn hand_special_summon(
    state: &mut GameState,
    player: PlayerIndex,
    card_index: usize,
    mode: PlacementMode,
) -> Result<(), Rejection> {
    let owner = &mut state.players[player];
    let slot = owner.first_empty_monster_slot().ok_or(Rejection::ZoneFull {
        zone: Zone::MonsterField,
    })?;

    let mut card = owner.hand.remove(card_index);
    card.position = mode.position();

    let message = announce(&owner.name, &card, mode, "special summoned");
    owner.monster_field[slot] = Some(card);
    state.add_message(message);
    Ok(())
}

fn normal_summon(
    state: &mut GameState,
    player: PlayerIndex,
    card_index: usize,
    mode: PlacementMode,
) -> Result<(), Rejection> {
    let owner = &mut state.players[player];
    if !owner.normal_summon_available {
        return Err(Rejection::NormalSummonUsed);
    }
    let slot = owner.first_empty_monster_slot().ok_or(Rejection::ZoneFull {
        zone: Zone::MonsterField,
    })?;

    let mut card = owner.hand.remove(card_index);
    card.position = mode.position();
    owner.normal_summon_available = false;

    let message = announce(&owner.name, &card, mode, "summoned");
    owner.monster_field[slot] = Some(card);
    state.add_message(message);
    Ok(())
}

fn tribute_summon(
    state: &mut GameState,
    player: PlayerIndex,
    card_index: usize,
    tributes: &[usize],
    mode: PlacementMode,
) -> Result<(), Rejection> {
    let owner = &state.players[player];
    let card = &owner.hand[card_index];
    let required = usize::from(card.tributes_required.unwrap_or(0));
    if tributes.len() != required {
        return Err(Rejection::TributeCount {
            card: card.name.clone(),
            required,
            supplied: tributes.len(),
        });
    }
    if !owner.normal_summon_available {
        return Err(Rejection::NormalSummonUsed);
    }

    let mut distinct = HashSet::new();
    for &slot in tributes {
        if slot >= FIELD_SLOTS || owner.monster_field[slot].is_none() || !distinct.insert(slot) {
            return Err(Rejection::InvalidTributes);
        }
    }
    if required == 0 && owner.first_empty_monster_slot().is_none() {
        return Err(Rejection::ZoneFull {
            zone: Zone::MonsterField,
        });
    }

    let owner = &mut state.players[player];
    for &slot in tributes {
        owner.send_monster_to_graveyard(slot);
    }
    // 祭品离场后再找空位，可能正好是刚空出的格子。
    let slot = owner.first_empty_monster_slot().ok_or(Rejection::ZoneFull {
        zone: Zone::MonsterField,
    })?;

    let mut card = owner.hand.remove(card_index);
    card.position = mode.position();
    owner.normal_summon_available = false;

    let message = announce(&owner.name, &card, mode, "tribute summoned");
    owner.monster_field[slot] = Some(card);
    state.add_message(message);
    Ok(())
}

/// 手牌中找不到同名卡的融合素材。只看卡名是否存在，不要求每个素材各有一张副本。
pub(crate) fn missing_fusion_materials(owner: &Player, fusion_index: usize) -> Vec<&str> {
    let Some(fusion) = owner.hand.get(fusion_index) else {
        return Vec::new();
    };
    fusion
        .fusion_materials
        .iter()
        .filter(|material| {
            !owner
                .hand
                .iter()
                .enumerate()
                .any(|(index, card)| index != fusion_index && &card.name == *material)
        })
        .map(String::as_str)
        .collect()
}

fn fusion_summon(state: &mut GameState, player: PlayerIndex, card_index: usize) -> Result<(), Rejection> {
    let owner = &state.players[player];
    let fusion = &owner.hand[card_index];

    let missing = missing_fusion_materials(owner, card_index);
    if !missing.is_empty() {
        return Err(Rejection::MissingFusionMaterials {
            card: fusion.name.clone(),
            missing: missing.join(", "),
        });
    }

    // 每个素材取第一张尚未取走的同名卡；副本不足时少送几张。
    let mut used = vec![card_index];
    for material in &fusion.fusion_materials {
        let found = owner
            .hand
            .iter()
            .enumerate()
            .position(|(index, card)| !used.contains(&index) && &card.name == material);
        if let Some(index) = found {
            used.push(index);
        }
    }
    let slot = owner.first_empty_monster_slot().ok_or(Rejection::ZoneFull {
        zone: Zone::MonsterField,
    })?;

    let owner = &mut state.players[player];
    used.sort_unstable_by(|a, b| b.cmp(a));
    let mut fusion = None;
    for index in used {
        let card = owner.hand.remove(index);
        if index == card_index {
            fusion = Some(card);
        } else {
            owner.graveyard.push(card);
        }
    }
    let Some(mut fusion) = fusion else {
        return Err(Rejection::NoCardInHand { index: card_index });
    };
    fusion.position = Position::Attack;

    let message = format!("{} fusion summoned {}.", owner.name, fusion.name);
    owner.monster_field[slot] = Some(fusion);
    state.add_message(message);
    Ok(())
}

fn set_spell_trap(state: &mut GameState, player: PlayerIndex, card_index: usize) -> Result<(), Rejection> {
    let owner = &mut state.players[player];
    let slot = owner.first_empty_spell_trap_slot().ok_or(Rejection::ZoneFull {
        zone: Zone::SpellTrapField,
    })?;

    let mut card = owner.hand.remove(card_index);
    card.position = Position::Set;
    owner.spell_trap_field[slot] = Some(card);

    let message = format!("{} set a card.", owner.name);
    state.add_message(message);
    Ok(())
}

/// 翻开里侧怪兽，改为表侧守备表示。
pub fn flip(state: &mut GameState, player: PlayerIndex, slot: usize) -> Result<(), Rejection> {
    if slot >= FIELD_SLOTS {
        return Err(Rejection::SlotOutOfRange { index: slot });
    }
    let owner = &mut state.players[player];
    let card = owner.monster_field[slot].as_mut().ok_or(Rejection::EmptySlot {
        zone: Zone::MonsterField,
        index: slot,
    })?;
    if card.position != Position::Set {
        return Err(Rejection::NotFaceDown {
            card: card.name.clone(),
        });
    }
    card.position = Position::Defense;

    let message = format!("{} flipped {}.", owner.name, card.name);
    state.add_message(message);
    Ok(())
}

fn announce(player: &str, card: &Card, mode: PlacementMode, verb: &str) -> String {
    match mode {
        PlacementMode::FaceUp => format!("{player} {verb} {}.", card.name),
        PlacementMode::FaceDown => format!("{player} set a monster."),
    }
}
