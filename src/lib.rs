pub mod ai;
pub mod config;
pub mod game;

use gloo_timers::future::TimeoutFuture;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use serde::Serialize;
use serde_wasm_bindgen::{from_value, to_value};
use std::str::FromStr;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::future_to_promise;
use web_sys::js_sys::Promise;

pub use ai::{AiAgent, AiConfig, AiDecision, AiStrategy};
pub use config::{ConfigError, DuelConfig};
pub use game::{
    Action, ActionKind, Card, CardEffect, CardId, CardSupplier, CardType, CatalogSupplier,
    DuelEngine, EffectCondition, EffectEngine, EffectFault, EffectKind, EffectTarget, EffectType,
    GameState, IntegrityError, LogEntry, Phase, Player, PlayerIndex, Position, Rejection,
    SequenceSupplier, SummonType, Zone,
};

#[cfg(feature = "wee_alloc")]
#[global_allocator]
static ALLOC: wee_alloc::WeeAlloc = wee_alloc::WeeAlloc::INIT;

#[wasm_bindgen(start)]
pub fn start() {
    set_panic_hook();
    #[cfg(feature = "browser_log")]
    let _ = console_log::init_with_level(log::Level::Debug);
}

fn serde_to_js_error<E: std::fmt::Display>(error: E) -> JsValue {
    JsValue::from_str(&error.to_string())
}

fn rejection_to_js(rejection: Rejection) -> JsValue {
    to_value(&rejection).unwrap_or_else(|serialize_err| JsValue::from_str(&serialize_err.to_string()))
}

fn parse_strategy(strategy: Option<&str>) -> AiConfig {
    let config = AiConfig::default();
    match strategy.and_then(|value| AiStrategy::from_str(value).ok()) {
        Some(strategy) => config.with_strategy(strategy),
        None => config,
    }
}

fn seeded_rng(seed: Option<u32>, salt: u64) -> SmallRng {
    match seed {
        Some(seed) => SmallRng::seed_from_u64(u64::from(seed) ^ salt),
        None => SmallRng::from_entropy(),
    }
}

fn agent_for(config: AiConfig, seed: Option<u32>) -> AiAgent {
    match seed {
        Some(seed) => AiAgent::with_seed(config, u64::from(seed)),
        None => AiAgent::new(config),
    }
}

fn load_config(config_json: Option<&str>) -> Result<DuelConfig, JsValue> {
    match config_json {
        Some(json) => DuelConfig::from_json(json).map_err(serde_to_js_error),
        None => Ok(DuelConfig::default()),
    }
}

#[derive(Serialize)]
struct AiMoveResponse<'a> {
    decision: AiDecision,
    state: &'a GameState,
}

/// 浏览器端持有的一局对局：引擎、状态与 AI 对手。
#[wasm_bindgen]
pub struct DuelSession {
    engine: DuelEngine<CatalogSupplier>,
    state: GameState,
    agent: AiAgent,
    seed: Option<u32>,
}

#[wasm_bindgen]
impl DuelSession {
    #[wasm_bindgen(constructor)]
    pub fn new(
        player_name: Option<String>,
        seed: Option<u32>,
        config_json: Option<String>,
    ) -> Result<DuelSession, JsValue> {
        let config = load_config(config_json.as_deref())?;
        let supplier = CatalogSupplier::standard(seed.map(u64::from)).map_err(serde_to_js_error)?;
        let mut engine = DuelEngine::new(config, supplier);

        let name = player_name.unwrap_or_else(|| "Player".to_string());
        let mut coin = seeded_rng(seed, 0x9e37_79b9);
        let state = engine.start_duel([name.as_str(), "AI"], &mut coin);

        Ok(DuelSession {
            engine,
            state,
            agent: agent_for(AiConfig::default(), seed),
            seed,
        })
    }

    pub fn state_json(&self) -> Result<String, JsValue> {
        serde_json::to_string(&self.state).map_err(serde_to_js_error)
    }

    pub fn messages_json(&self) -> Result<String, JsValue> {
        serde_json::to_string(self.state.messages()).map_err(serde_to_js_error)
    }

    pub fn set_state_json(&mut self, json: &str) -> Result<(), JsValue> {
        let state: GameState = serde_json::from_str(json).map_err(serde_to_js_error)?;
        state
            .integrity_check()
            .map_err(|error| rejection_to_js(Rejection::IntegrityViolation { error }))?;
        self.state = state;
        Ok(())
    }

    /// 应用一个 JSON 行动并返回新状态。被拒绝的行动不会报错，原因写在消息日志里。
    pub fn apply_json(&mut self, action_json: &str) -> Result<String, JsValue> {
        let action: Action = serde_json::from_str(action_json).map_err(serde_to_js_error)?;
        self.engine.apply_in_place(&mut self.state, &action);
        self.state_json()
    }

    pub fn ai_move_json(&mut self, player: usize, strategy: Option<String>) -> Result<String, JsValue> {
        if let Some(strategy) = strategy.as_deref() {
            let config = parse_strategy(Some(strategy));
            if config.strategy != self.agent.config().strategy {
                self.agent = agent_for(config, self.seed);
            }
        }

        let decision = self.agent.decide(&self.state, player);
        if let Some(action) = decision.action.as_ref() {
            self.engine.apply_in_place(&mut self.state, action);
        }
        let response = AiMoveResponse {
            decision,
            state: &self.state,
        };
        serde_json::to_string(&response).map_err(serde_to_js_error)
    }

    pub fn ai_turn_json(&mut self, player: usize) -> Result<String, JsValue> {
        let state = std::mem::take(&mut self.state);
        self.state = self.agent.play_turn(&mut self.engine, state, player);
        self.state_json()
    }

    /// 延迟 `delay_ms` 毫秒后给出 AI 的决定（不修改对局）。
    pub fn think_ai(&self, player: usize, strategy: Option<String>, delay_ms: Option<u32>) -> Promise {
        let state = self.state.clone();
        let config = parse_strategy(strategy.as_deref());
        let delay = delay_ms.unwrap_or(0);

        future_to_promise(async move {
            if delay > 0 {
                TimeoutFuture::new(delay).await;
            }
            let mut agent = AiAgent::new(config);
            let decision = agent.decide(&state, player);
            let json = serde_json::to_string(&decision).map_err(serde_to_js_error)?;
            Ok(JsValue::from_str(&json))
        })
    }
}

/// 无状态版本的 `apply`：传入状态与行动，返回新状态。
#[wasm_bindgen(js_name = "applyAction")]
pub fn apply_action(state: JsValue, action: JsValue, seed: Option<u32>) -> Result<JsValue, JsValue> {
    let state: GameState = from_value(state).map_err(JsValue::from)?;
    let action: Action = from_value(action).map_err(JsValue::from)?;
    let supplier = CatalogSupplier::standard(seed.map(u64::from)).map_err(serde_to_js_error)?;
    let mut engine = DuelEngine::new(DuelConfig::default(), supplier);
    let next = engine.apply(state, &action);
    to_value(&next).map_err(JsValue::from)
}

#[wasm_bindgen(js_name = "validateState")]
pub fn validate_state(state: JsValue) -> Result<(), JsValue> {
    let state: GameState = from_value(state).map_err(JsValue::from)?;
    state
        .integrity_check()
        .map_err(|error| rejection_to_js(Rejection::IntegrityViolation { error }))?;
    Ok(())
}

#[wasm_bindgen(js_name = "standardCatalog")]
pub fn standard_catalog() -> Result<JsValue, JsValue> {
    to_value(game::standard_catalog()).map_err(JsValue::from)
}

#[wasm_bindgen(js_name = "computeAiMove")]
pub fn compute_ai_move(state: JsValue, player: usize, strategy: Option<String>) -> Result<JsValue, JsValue> {
    let state: GameState = from_value(state).map_err(JsValue::from)?;
    let mut agent = AiAgent::new(parse_strategy(strategy.as_deref()));
    let decision = agent.decide(&state, player);
    to_value(&decision).map_err(JsValue::from)
}

#[cfg(feature = "console_error_panic_hook")]
fn set_panic_hook() {
    console_error_panic_hook::set_once();
}

#[cfg(not(feature = "console_error_panic_hook"))]
fn set_panic_hook() {}
