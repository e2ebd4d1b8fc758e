use log::debug;

use super::state::{GameState, Phase};
use super::supply::CardSupplier;
use crate::config::DuelConfig;

/// 推进到下一阶段；从结束阶段回到抽卡阶段时换手。
pub fn end_phase<S: CardSupplier + ?Sized>(state: &mut GameState, supplier: &mut S, config: &DuelConfig) {
    state.phase = state.phase.next();
    state.add_message(format!("Phase changed to {}", state.phase));
    if state.phase == Phase::Draw {
        hand_off(state, supplier, config);
    }
}

/// 直接结束回合，不逐个经过中间阶段，也不输出阶段消息。
pub fn end_turn<S: CardSupplier + ?Sized>(state: &mut GameState, supplier: &mut S, config: &DuelConfig) {
    state.phase = Phase::Draw;
    hand_off(state, supplier, config);
}

fn hand_off<S: CardSupplier + ?Sized>(state: &mut GameState, supplier: &mut S, config: &DuelConfig) {
    let current = GameState::opponent_of(state.current_player);
    state.current_player = current;
    state.turn += 1;
    state.selected_card = None;
    state.first_turn = false;
    if let Some(max_id) = state.max_card_id() {
        supplier.reserve_ids_above(max_id);
    }

    let player = &mut state.players[current];
    player.normal_summon_available = true;
    if player.hand.len() < config.hand_draw_limit {
        let card = supplier.draw_card();
        debug!("{} draws {} (#{})", player.name, card.name, card.id);
        player.hand.push(card);
    }

    let message = format!("Turn {}: {}'s turn", state.turn, state.players[current].name);
    state.add_message(message);
}
