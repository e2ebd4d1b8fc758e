use once_cell::sync::Lazy;

use super::effects::{EffectCondition, EffectKind, EffectTarget};
use super::state::{Card, CardEffect, EffectType};

static STANDARD_CATALOG: Lazy<Vec<Card>> = Lazy::new(build_catalog);

/// 内置卡表。模板的 `id` 只是占位，发牌时会重新分配。
pub fn standard_catalog() -> &'static [Card] {
    &STANDARD_CATALOG
}

pub fn template(name: &str) -> Option<&'static Card> {
    STANDARD_CATALOG.iter().find(|card| card.name == name)
}

fn build_catalog() -> Vec<Card> {
    vec![
        Card::monster(1, "Dark Magician", 2500, 2100, 7)
            .with_attribute("Dark")
            .with_tributes(2),
        Card::monster(2, "Blue-Eyes White Dragon", 3000, 2500, 8)
            .with_attribute("Light")
            .with_tributes(2),
        Card::monster(3, "Kuriboh", 300, 200, 1).with_attribute("Dark"),
        Card::monster(4, "Mystic Tomato", 1400, 1100, 4)
            .with_attribute("Dark")
            .with_effect(
                CardEffect::new(
                    EffectType::Trigger,
                    EffectKind::SpecialSummonFromHand {
                        name: None,
                        attribute: Some("Dark".into()),
                        max_attack: Some(1500),
                    },
                )
                .with_condition(EffectCondition::MonsterDestroyed {
                    target: EffectTarget::Owner,
                }),
            ),
        Card::monster(5, "Sangan", 1000, 600, 3)
            .with_attribute("Dark")
            .with_effect(
                CardEffect::new(
                    EffectType::Trigger,
                    EffectKind::ReturnToHand {
                        max_attack: Some(1500),
                    },
                )
                .with_condition(EffectCondition::MonsterDestroyed {
                    target: EffectTarget::Owner,
                }),
            ),
        Card::monster(6, "Cyber Dragon", 2100, 1600, 5)
            .with_attribute("Light")
            .with_tributes(1)
            .hand_summonable_when(EffectCondition::All {
                conditions: vec![
                    EffectCondition::FieldEmpty {
                        target: EffectTarget::Owner,
                    },
                    EffectCondition::FieldCountAtLeast {
                        target: EffectTarget::Opponent,
                        count: 1,
                    },
                ],
            }),
        Card::monster(7, "Marshmallon", 300, 500, 3)
            .with_attribute("Light")
            .indestructible_by_battle(),
        Card::monster(8, "Baby Dragon", 1200, 700, 3).with_attribute("Wind"),
        Card::monster(9, "Time Wizard", 500, 400, 2).with_attribute("Light"),
        Card::monster(10, "Thousand Dragon", 2400, 2000, 7)
            .with_attribute("Wind")
            .with_fusion_materials(["Time Wizard", "Baby Dragon"]),
        Card::monster(11, "Blue-Eyes Ultimate Dragon", 4500, 3800, 12)
            .with_attribute("Light")
            .with_fusion_materials([
                "Blue-Eyes White Dragon",
                "Blue-Eyes White Dragon",
                "Blue-Eyes White Dragon",
            ]),
        Card::spell(12, "Monster Reborn").with_effect(
            CardEffect::new(
                EffectType::Ignition,
                EffectKind::ReviveFromGraveyard {
                    from: EffectTarget::Owner,
                },
            )
            .with_condition(EffectCondition::GraveyardHasMonster {
                target: EffectTarget::Owner,
            }),
        ),
        Card::spell(13, "Dark Hole").with_effect(
            CardEffect::new(EffectType::Ignition, EffectKind::DestroyAllMonsters).with_condition(
                EffectCondition::FieldCountAtLeast {
                    target: EffectTarget::Opponent,
                    count: 1,
                },
            ),
        ),
        Card::spell(14, "Dian Keto the Cure Master").with_effect(CardEffect::new(
            EffectType::Ignition,
            EffectKind::GainLife {
                amount: 1000,
                target: EffectTarget::Owner,
            },
        )),
        Card::spell(15, "Hinotama").with_effect(CardEffect::new(
            EffectType::Ignition,
            EffectKind::InflictDamage {
                amount: 500,
                target: EffectTarget::Opponent,
            },
        )),
        Card::trap(16, "Mirror Force").with_effect(CardEffect::new(
            EffectType::Trigger,
            EffectKind::DestroyAttackPosition {
                target: EffectTarget::Opponent,
            },
        )),
    ]
}
