//! 对局核心逻辑（状态模型、行动校验、召唤/战斗/阶段结算与效果连锁）。

pub mod actions;
pub mod battle;
pub mod catalog;
pub mod effects;
pub mod rules;
pub mod state;
pub mod summon;
pub mod supply;
pub mod turn;

pub use actions::{Action, ActionKind, Rejection};
pub use catalog::{standard_catalog, template};
pub use effects::{ChainReport, EffectCondition, EffectEngine, EffectFault, EffectKind, EffectTarget};
pub use rules::DuelEngine;
pub use state::{
    Card,
    CardEffect,
    CardId,
    CardType,
    Checkpoint,
    DestroyedCard,
    EffectType,
    GameState,
    IntegrityError,
    LogEntry,
    Phase,
    Player,
    PlayerIndex,
    Position,
    SelectedCard,
    SummonType,
    Zone,
    FIELD_SLOTS,
};
pub use summon::PlacementMode;
pub use supply::{CardSupplier, CatalogSupplier, SequenceSupplier, SupplyError};
