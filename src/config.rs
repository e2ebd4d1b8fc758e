use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_LIFE_POINTS: i32 = 8000;
pub const DEFAULT_OPENING_HAND: usize = 5;
/// 手牌少于该数量时，换手抽卡步骤才会抽卡。
pub const DEFAULT_HAND_DRAW_LIMIT: usize = 6;
pub const DEFAULT_MAX_CHAIN_RESOLUTIONS: usize = 256;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid duel config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("`{field}` must be greater than zero")]
    NonPositive { field: &'static str },
}

/// 对局参数，可由宿主以 JSON 覆盖，缺省字段取默认值。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DuelConfig {
    pub starting_life_points: i32,
    pub opening_hand_size: usize,
    pub hand_draw_limit: usize,
    pub max_chain_resolutions: usize,
}

impl Default for DuelConfig {
    fn default() -> Self {
        Self {
            starting_life_points: DEFAULT_LIFE_POINTS,
            opening_hand_size: DEFAULT_OPENING_HAND,
            hand_draw_limit: DEFAULT_HAND_DRAW_LIMIT,
            max_chain_resolutions: DEFAULT_MAX_CHAIN_RESOLUTIONS,
        }
    }
}

impl DuelConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: DuelConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.starting_life_points <= 0 {
            return Err(ConfigError::NonPositive {
                field: "starting_life_points",
            });
        }
        if self.max_chain_resolutions == 0 {
            return Err(ConfigError::NonPositive {
                field: "max_chain_resolutions",
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config = DuelConfig::from_json(r#"{"starting_life_points":4000}"#)
            .expect("config should parse");
        assert_eq!(config.starting_life_points, 4000);
        assert_eq!(config.opening_hand_size, DEFAULT_OPENING_HAND);
        assert_eq!(config.max_chain_resolutions, DEFAULT_MAX_CHAIN_RESOLUTIONS);
    }

    #[test]
    fn zero_chain_cap_is_rejected() {
        let error = DuelConfig::from_json(r#"{"max_chain_resolutions":0}"#)
            .expect_err("zero cap must be rejected");
        assert!(matches!(
            error,
            ConfigError::NonPositive {
                field: "max_chain_resolutions"
            }
        ));
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        assert!(matches!(
            DuelConfig::from_json("{not json"),
            Err(ConfigError::Parse(_))
        ));
    }
}
