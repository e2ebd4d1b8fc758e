//! AI 对手：按阶段生成候选行动，并通过与玩家相同的入口提交。

pub mod agent;

pub use agent::{AiAgent, AiConfig, AiDecision, AiStrategy};
