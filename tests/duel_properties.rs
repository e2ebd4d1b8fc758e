use duel_core::game::{ActionKind, SelectedCard};
use duel_core::{
    Action, AiAgent, AiConfig, AiStrategy, Card, CardEffect, CatalogSupplier, DuelConfig, DuelEngine,
    EffectCondition, EffectKind, EffectTarget, EffectType, GameState, LogEntry, Phase, Player,
    SequenceSupplier, Zone,
};
use rand::rngs::SmallRng;
use rand::SeedableRng;

fn engine() -> DuelEngine<SequenceSupplier> {
    let supplier = SequenceSupplier::new(vec![
        Card::monster(0, "Kuriboh", 300, 200, 1),
        Card::spell(0, "Hinotama"),
    ])
    .expect("templates are not empty")
    .starting_at(10_000);
    DuelEngine::new(DuelConfig::default(), supplier)
}

fn duel(phase: Phase) -> GameState {
    let mut state = GameState::new([Player::new("Yugi", 8000), Player::new("Kaiba", 8000)], 0)
        .with_phase(phase);
    state.first_turn = false;
    state
}

fn occupied(state: &GameState, player: usize) -> usize {
    state.players[player].monster_count()
}

fn summon(card_index: usize, tributes: Option<Vec<usize>>) -> Action {
    Action::Summon {
        player_index: 0,
        card_index,
        tribute_indices: tributes,
    }
}

fn select_and_attack(
    engine: &mut DuelEngine<SequenceSupplier>,
    state: GameState,
    attacker: usize,
    target: Option<usize>,
) -> GameState {
    let state = engine.apply(
        state,
        &Action::SelectCard {
            player_index: 0,
            card_index: attacker,
            location: Zone::MonsterField,
        },
    );
    engine.apply(
        state,
        &Action::Attack {
            player_index: 0,
            target_index: target,
        },
    )
}

#[test]
fn normal_summon_conserves_zones() {
    let mut engine = engine();
    let mut state = duel(Phase::Main1);
    state.players[0].hand = vec![
        Card::monster(1, "Celtic Guardian", 1400, 1200, 4),
        Card::monster(2, "Kuriboh", 300, 200, 1),
    ];

    let next = engine.apply(state.clone(), &summon(0, None));

    assert_eq!(next.players[0].hand.len(), state.players[0].hand.len() - 1);
    assert_eq!(occupied(&next, 0), occupied(&state, 0) + 1);
    assert_eq!(next.players[0].graveyard, state.players[0].graveyard);
    assert_eq!(next.players[0].spell_trap_field, state.players[0].spell_trap_field);
    assert_eq!(next.players[1], state.players[1]);
}

#[test]
fn tribute_summon_conserves_zones() {
    let mut engine = engine();
    let mut state = duel(Phase::Main2);
    state.players[0].hand = vec![Card::monster(1, "Blue-Eyes White Dragon", 3000, 2500, 8).with_tributes(2)];
    state.players[0].monster_field[0] = Some(Card::monster(2, "Kuriboh", 300, 200, 1));
    state.players[0].monster_field[2] = Some(Card::monster(3, "Time Wizard", 500, 400, 2));
    state.players[0].monster_field[4] = Some(Card::monster(4, "Baby Dragon", 1200, 700, 3));

    let next = engine.apply(state.clone(), &summon(0, Some(vec![0, 2])));

    assert_eq!(next.players[0].hand.len(), 0);
    assert_eq!(next.players[0].graveyard.len(), 2);
    assert_eq!(occupied(&next, 0), occupied(&state, 0) - 2 + 1);
    assert_eq!(next.players[0].monster_at(0).map(|card| card.id), Some(1));
    assert!(!next.players[0].normal_summon_available);
}

#[test]
fn normal_summon_is_available_once_per_turn() {
    let mut engine = engine();
    let mut state = duel(Phase::Main1);
    state.players[0].hand = vec![
        Card::monster(1, "Kuriboh", 300, 200, 1),
        Card::monster(2, "Time Wizard", 500, 400, 2),
        Card::monster(3, "Baby Dragon", 1200, 700, 3),
        Card::monster(4, "Thousand Dragon", 2400, 2000, 7)
            .with_fusion_materials(["Time Wizard", "Baby Dragon"]),
    ];

    state = engine.apply(state, &summon(0, None));
    assert!(!state.players[0].normal_summon_available);

    let blocked = engine.apply(state.clone(), &summon(0, None));
    assert_eq!(blocked.players, state.players);

    // 融合召唤不受通常召唤次数限制。
    state = engine.apply(state, &summon(2, None));
    assert_eq!(state.players[0].monster_at(1).map(|card| card.id), Some(4));

    state = engine.apply(state, &Action::EndTurn { player_index: 0 });
    assert!(state.players[1].normal_summon_available);
    state = engine.apply(state, &Action::EndTurn { player_index: 1 });
    assert!(state.players[0].normal_summon_available);
}

#[test]
fn equal_attackers_destroy_each_other() {
    let mut engine = engine();
    let mut state = duel(Phase::Battle);
    state.players[0].monster_field[1] = Some(Card::monster(1, "Celtic Guardian", 1400, 1200, 4));
    state.players[1].monster_field[0] = Some(Card::monster(2, "Mystic Tomato", 1400, 1100, 4));

    let next = select_and_attack(&mut engine, state, 1, Some(0));

    assert_eq!(next.players[0].graveyard.len(), 1);
    assert_eq!(next.players[1].graveyard.len(), 1);
    assert_eq!(next.players[0].life_points, 8000);
    assert_eq!(next.players[1].life_points, 8000);
    assert!(matches!(
        next.last_entry(),
        Some(LogEntry::Action { destroyed, .. }) if destroyed.len() == 2
    ));
}

#[test]
fn direct_attack_arithmetic() {
    let mut engine = engine();
    let mut state = duel(Phase::Battle);
    state.players[0].monster_field[0] = Some(Card::monster(1, "Gemini Elf", 1500, 1200, 4));

    let next = select_and_attack(&mut engine, state.clone(), 0, None);

    assert_eq!(next.players[1].life_points, 6500);
    assert_eq!(next.players[0].monster_field, state.players[0].monster_field);
    assert_eq!(next.players[1].monster_field, state.players[1].monster_field);
    assert!(next.players[0].graveyard.is_empty());
}

#[test]
fn partial_fusion_materials_are_a_full_no_op() {
    let mut engine = engine();
    let mut state = duel(Phase::Main1);
    state.players[0].hand = vec![
        Card::monster(1, "Time Wizard", 500, 400, 2),
        Card::monster(2, "Kuriboh", 300, 200, 1),
        Card::monster(3, "Thousand Dragon", 2400, 2000, 7)
            .with_fusion_materials(["Time Wizard", "Baby Dragon"]),
    ];

    let next = engine.apply(state.clone(), &summon(2, None));

    assert_eq!(next.players, state.players);
    assert_eq!(next.messages.len(), state.messages.len() + 1);
    assert_eq!(
        next.messages.last().map(String::as_str),
        Some("Cannot fusion summon Thousand Dragon: missing Baby Dragon.")
    );
}

#[test]
fn fusion_accepts_one_copy_for_repeated_material_names() {
    let mut engine = engine();
    let mut state = duel(Phase::Main1);
    state.players[0].hand = vec![
        Card::monster(1, "Blue-Eyes White Dragon", 3000, 2500, 8).with_tributes(2),
        Card::monster(2, "Blue-Eyes Ultimate Dragon", 4500, 3800, 12).with_fusion_materials([
            "Blue-Eyes White Dragon",
            "Blue-Eyes White Dragon",
            "Blue-Eyes White Dragon",
        ]),
    ];

    let next = engine.apply(state, &summon(1, None));

    assert!(next.players[0].hand.is_empty());
    assert_eq!(next.players[0].graveyard.len(), 1);
    assert_eq!(next.players[0].monster_at(0).map(|card| card.id), Some(2));
    assert!(next.players[0].normal_summon_available);
}

#[test]
fn handoffs_through_fresh_engines_never_reuse_card_ids() {
    let fresh_engine = || {
        let supplier = CatalogSupplier::standard(Some(5)).expect("catalog is not empty");
        DuelEngine::new(DuelConfig::default(), supplier)
    };
    let mut coin = SmallRng::seed_from_u64(5);
    let mut state = fresh_engine().start_duel(["Yugi", "Kaiba"], &mut coin);

    for _ in 0..2 {
        let player_index = state.current_player;
        let turn = state.turn;
        state = fresh_engine().apply(state, &Action::EndTurn { player_index });
        assert_eq!(state.turn, turn + 1);
        assert!(state.integrity_check().is_ok());
    }

    let player_index = state.current_player;
    state = fresh_engine().apply(state, &Action::EndPhase { player_index });
    assert_eq!(state.phase, Phase::Standby);
    assert_eq!(state.players[0].hand.len() + state.players[1].hand.len(), 12);
}

#[test]
fn six_end_phases_close_one_cycle() {
    let mut engine = engine();
    let mut state = duel(Phase::Draw);
    state.turn = 4;

    for _ in 0..6 {
        let player_index = state.current_player;
        state = engine.apply(state, &Action::EndPhase { player_index });
    }

    assert_eq!(state.phase, Phase::Draw);
    assert_eq!(state.current_player, 1);
    assert_eq!(state.turn, 5);
    let phase_messages = state
        .messages
        .iter()
        .filter(|message| message.starts_with("Phase changed to"))
        .count();
    assert_eq!(phase_messages, 6);
}

#[test]
fn mutually_triggering_cards_hit_the_chain_cap() {
    let config = DuelConfig {
        max_chain_resolutions: 40,
        ..DuelConfig::default()
    };
    let supplier = SequenceSupplier::new(vec![Card::monster(0, "Kuriboh", 300, 200, 1)])
        .expect("templates are not empty")
        .starting_at(10_000);
    let mut engine = DuelEngine::new(config, supplier);

    let echo = |id, name: &str, answers: &str| {
        Card::monster(id, name, 100, 100, 1).with_effect(
            CardEffect::new(
                EffectType::Trigger,
                EffectKind::InflictDamage {
                    amount: 10,
                    target: EffectTarget::Opponent,
                },
            )
            .with_condition(EffectCondition::Any {
                conditions: vec![
                    EffectCondition::LastActionWas {
                        action: ActionKind::Summon,
                    },
                    EffectCondition::LastEffectFrom {
                        name: answers.to_string(),
                    },
                ],
            }),
        )
    };
    let mut state = duel(Phase::Main1);
    state.players[0].monster_field[0] = Some(echo(1, "Ping", "Pong"));
    state.players[1].monster_field[0] = Some(echo(2, "Pong", "Ping"));
    state.players[0].hand.push(Card::monster(3, "Kuriboh", 300, 200, 1));

    let next = engine.apply(state, &summon(0, None));

    let resolved = next
        .action_log
        .iter()
        .filter(|entry| matches!(entry, LogEntry::Effect { .. }))
        .count();
    assert_eq!(resolved, 40);
    assert!(next
        .messages
        .iter()
        .any(|message| message == "Chain resolution limit of 40 reached; remaining chain discarded."));
    assert_eq!(next.players[0].monster_count(), 2);
}

#[test]
fn selection_survives_until_an_attack_consumes_it() {
    let mut engine = engine();
    let mut state = duel(Phase::Battle);
    state.players[0].monster_field[0] = Some(Card::monster(1, "Gemini Elf", 1900, 900, 4));

    state = engine.apply(
        state,
        &Action::SelectCard {
            player_index: 0,
            card_index: 0,
            location: Zone::MonsterField,
        },
    );
    assert_eq!(
        state.selected_card,
        Some(SelectedCard {
            player_index: 0,
            card_index: 0,
            zone: Zone::MonsterField,
        })
    );

    state = engine.apply(
        state,
        &Action::Attack {
            player_index: 0,
            target_index: None,
        },
    );
    assert!(state.selected_card.is_none());
}

fn play_ai_duel(seed: u64, strategy: AiStrategy, turns: usize) -> GameState {
    let supplier = CatalogSupplier::standard(Some(seed)).expect("catalog is not empty");
    let mut engine = DuelEngine::new(DuelConfig::default(), supplier);
    let mut coin = SmallRng::seed_from_u64(seed);
    let mut state = engine.start_duel(["Yugi", "Kaiba"], &mut coin);
    let config = AiConfig::default().with_strategy(strategy);
    let mut agents = [
        AiAgent::with_seed(config.clone(), seed),
        AiAgent::with_seed(config, seed + 1),
    ];

    for _ in 0..turns {
        let player = state.current_player;
        let turn = state.turn;
        state = agents[player].play_turn(&mut engine, state, player);
        assert_eq!(state.turn, turn + 1, "every AI turn ends with a handoff");
        assert!(state.integrity_check().is_ok());
    }
    state
}

#[test]
fn ai_duels_keep_every_card_in_one_zone() {
    for seed in 0..4 {
        play_ai_duel(seed, AiStrategy::Greedy, 20);
        play_ai_duel(seed, AiStrategy::Random, 20);
    }
}

#[test]
fn single_step_ai_decisions_still_finish_every_turn() {
    let supplier = CatalogSupplier::standard(Some(3)).expect("catalog is not empty");
    let mut engine = DuelEngine::new(DuelConfig::default(), supplier);
    let mut coin = SmallRng::seed_from_u64(3);
    let mut state = engine.start_duel(["Yugi", "Kaiba"], &mut coin);
    let mut agent = AiAgent::with_seed(AiConfig::default(), 3);

    let mut attacks_this_turn = 0;
    let mut turn = state.turn;
    for _ in 0..400 {
        if state.turn != turn {
            turn = state.turn;
            attacks_this_turn = 0;
        }
        let player = state.current_player;
        let Some(action) = agent.decide(&state, player).action else {
            break;
        };
        if matches!(action, Action::Attack { .. }) {
            attacks_this_turn += 1;
            assert!(attacks_this_turn <= 5, "a monster attacked twice in turn {turn}");
        }
        state = engine.apply(state, &action);
        assert!(state.integrity_check().is_ok());
    }

    assert!(state.turn >= 8, "only reached turn {}", state.turn);
}

#[test]
fn seeded_duels_are_reproducible() {
    let first = play_ai_duel(11, AiStrategy::Random, 12);
    let second = play_ai_duel(11, AiStrategy::Random, 12);
    assert_eq!(first, second);
}
