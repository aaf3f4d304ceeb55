//! Data-driven rule configuration.
//!
//! Every field carries a serde default so partial JSON documents load, and
//! `GameConfig::validate` rejects tables that would leave the engine without
//! a playable round.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::Age;
use crate::ids::FactionId;
use crate::numbers::u32_to_usize;

/// Errors surfaced when a configuration fails validation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{field} must be between {min} and {max} (got {value})")]
    RangeViolation {
        field: &'static str,
        min: i64,
        max: i64,
        value: i64,
    },
    #[error("{field} must be at least {min} (got {value})")]
    MinViolation {
        field: &'static str,
        min: i64,
        value: i64,
    },
    #[error("{field} must not be empty")]
    EmptyTable { field: &'static str },
}

/// Board generation parameters consumed by the layout seam.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardConfig {
    #[serde(default = "BoardConfig::default_radius")]
    pub radius: i32,
    #[serde(default = "BoardConfig::default_mine_count")]
    pub mine_count: u32,
    #[serde(default = "BoardConfig::default_forge_count")]
    pub forge_count: u32,
}

impl BoardConfig {
    const fn default_radius() -> i32 {
        4
    }

    const fn default_mine_count() -> u32 {
        4
    }

    const fn default_forge_count() -> u32 {
        3
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(2..=8).contains(&self.radius) {
            return Err(ConfigError::RangeViolation {
                field: "board.radius",
                min: 2,
                max: 8,
                value: i64::from(self.radius),
            });
        }
        let interior = 3 * self.radius * (self.radius - 1);
        let specials = i64::from(self.mine_count) + i64::from(self.forge_count);
        if specials > i64::from(interior) {
            return Err(ConfigError::RangeViolation {
                field: "board.mine_count + board.forge_count",
                min: 0,
                max: i64::from(interior),
                value: specials,
            });
        }
        Ok(())
    }
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            radius: Self::default_radius(),
            mine_count: Self::default_mine_count(),
            forge_count: Self::default_forge_count(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameConfig {
    #[serde(default = "GameConfig::default_mana_cap")]
    pub mana_cap: u32,
    #[serde(default = "GameConfig::default_gold_cap")]
    pub gold_cap: u32,
    #[serde(default = "GameConfig::default_starting_gold")]
    pub starting_gold: u32,
    #[serde(default = "GameConfig::default_hand_limit")]
    pub hand_limit: u32,
    #[serde(default = "GameConfig::default_champion_limit")]
    pub champion_limit: u32,
    #[serde(default = "GameConfig::default_champion_cost_step")]
    pub champion_cost_step: u32,
    #[serde(default = "GameConfig::default_round_cap")]
    pub round_cap: u32,
    #[serde(default = "GameConfig::default_vp_target")]
    pub vp_target: u32,
    /// Next-age cards revealed in the market row, indexed by round - 1.
    #[serde(default = "GameConfig::default_market_preview_by_round")]
    pub market_preview_by_round: Vec<u32>,
    /// Current age, indexed by round - 1. Rounds past the table stay in the last age.
    #[serde(default = "GameConfig::default_age_by_round")]
    pub age_by_round: Vec<Age>,
    /// Basic-action priority; factions not listed resolve after listed ones.
    #[serde(default = "GameConfig::default_basic_action_faction_order")]
    pub basic_action_faction_order: Vec<FactionId>,
    #[serde(default)]
    pub board: BoardConfig,
    #[serde(default = "GameConfig::default_starting_forces")]
    pub starting_forces: u32,
    #[serde(default = "GameConfig::default_starting_bridges")]
    pub starting_bridges: u32,
    #[serde(default = "GameConfig::default_free_card_choices")]
    pub free_card_choices: u32,
    #[serde(default = "GameConfig::default_study_max_discard")]
    pub study_max_discard: u32,
    #[serde(default = "GameConfig::default_base_gold_income")]
    pub base_gold_income: u32,
    #[serde(default = "GameConfig::default_forge_card_choices")]
    pub forge_card_choices: u32,
    #[serde(default = "GameConfig::default_basic_action_mana_cost")]
    pub basic_action_mana_cost: u32,
    #[serde(default = "GameConfig::default_retreat_mana_cost")]
    pub retreat_mana_cost: u32,
    #[serde(default = "GameConfig::default_log_limit")]
    pub log_limit: usize,
}

impl GameConfig {
    /// Parse a configuration from JSON and validate it.
    ///
    /// # Errors
    ///
    /// Returns an error when the JSON is malformed or a field is out of range.
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    const fn default_mana_cap() -> u32 {
        5
    }

    const fn default_gold_cap() -> u32 {
        30
    }

    const fn default_starting_gold() -> u32 {
        4
    }

    const fn default_hand_limit() -> u32 {
        5
    }

    const fn default_champion_limit() -> u32 {
        2
    }

    const fn default_champion_cost_step() -> u32 {
        1
    }

    const fn default_round_cap() -> u32 {
        12
    }

    const fn default_vp_target() -> u32 {
        8
    }

    fn default_market_preview_by_round() -> Vec<u32> {
        vec![0, 0, 1, 2, 0, 0, 1, 2, 0, 0, 0, 0]
    }

    fn default_age_by_round() -> Vec<Age> {
        let mut table = vec![Age::I; 4];
        table.extend([Age::II; 4]);
        table.extend([Age::III; 4]);
        table
    }

    fn default_basic_action_faction_order() -> Vec<FactionId> {
        ["wayfarers", "ironbound", "goldhand", "warhost"]
            .iter()
            .map(|id| FactionId::new(id))
            .collect()
    }

    const fn default_starting_forces() -> u32 {
        3
    }

    const fn default_starting_bridges() -> u32 {
        2
    }

    const fn default_free_card_choices() -> u32 {
        2
    }

    const fn default_study_max_discard() -> u32 {
        1
    }

    const fn default_base_gold_income() -> u32 {
        1
    }

    const fn default_forge_card_choices() -> u32 {
        2
    }

    const fn default_basic_action_mana_cost() -> u32 {
        1
    }

    const fn default_retreat_mana_cost() -> u32 {
        1
    }

    const fn default_log_limit() -> usize {
        200
    }

    /// Age in force during the given (1-based) round.
    #[must_use]
    pub fn age_for_round(&self, round: u32) -> Age {
        let index = u32_to_usize(round.saturating_sub(1));
        self.age_by_round
            .get(index)
            .or_else(|| self.age_by_round.last())
            .copied()
            .unwrap_or(Age::I)
    }

    /// Number of next-age cards dealt into the market row this round.
    #[must_use]
    pub fn preview_for_round(&self, round: u32) -> u32 {
        let index = u32_to_usize(round.saturating_sub(1));
        self.market_preview_by_round
            .get(index)
            .copied()
            .unwrap_or(0)
    }

    /// Basic-action priority rank for a faction; unlisted factions sort last.
    #[must_use]
    pub fn basic_action_rank(&self, faction: &FactionId) -> usize {
        self.basic_action_faction_order
            .iter()
            .position(|candidate| candidate == faction)
            .unwrap_or(self.basic_action_faction_order.len())
    }

    /// Validate the configuration to ensure values stay within safe bounds.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when any field violates the documented bounds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.board.validate()?;
        Self::require_min("mana_cap", self.mana_cap, 1)?;
        Self::require_min("hand_limit", self.hand_limit, 1)?;
        Self::require_min("round_cap", self.round_cap, 1)?;
        Self::require_min("vp_target", self.vp_target, 1)?;
        Self::require_min("free_card_choices", self.free_card_choices, 1)?;
        Self::require_min("forge_card_choices", self.forge_card_choices, 1)?;
        Self::require_min("log_limit", u32::try_from(self.log_limit).unwrap_or(u32::MAX), 1)?;
        if self.starting_gold > self.gold_cap {
            return Err(ConfigError::RangeViolation {
                field: "starting_gold",
                min: 0,
                max: i64::from(self.gold_cap),
                value: i64::from(self.starting_gold),
            });
        }
        if !(1..=self.mana_cap).contains(&self.basic_action_mana_cost) {
            return Err(ConfigError::RangeViolation {
                field: "basic_action_mana_cost",
                min: 1,
                max: i64::from(self.mana_cap),
                value: i64::from(self.basic_action_mana_cost),
            });
        }
        if self.starting_bridges > 6 {
            return Err(ConfigError::RangeViolation {
                field: "starting_bridges",
                min: 0,
                max: 6,
                value: i64::from(self.starting_bridges),
            });
        }
        if self.age_by_round.is_empty() {
            return Err(ConfigError::EmptyTable {
                field: "age_by_round",
            });
        }
        Ok(())
    }

    fn require_min(field: &'static str, value: u32, min: u32) -> Result<(), ConfigError> {
        if value < min {
            return Err(ConfigError::MinViolation {
                field,
                min: i64::from(min),
                value: i64::from(value),
            });
        }
        Ok(())
    }
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            mana_cap: Self::default_mana_cap(),
            gold_cap: Self::default_gold_cap(),
            starting_gold: Self::default_starting_gold(),
            hand_limit: Self::default_hand_limit(),
            champion_limit: Self::default_champion_limit(),
            champion_cost_step: Self::default_champion_cost_step(),
            round_cap: Self::default_round_cap(),
            vp_target: Self::default_vp_target(),
            market_preview_by_round: Self::default_market_preview_by_round(),
            age_by_round: Self::default_age_by_round(),
            basic_action_faction_order: Self::default_basic_action_faction_order(),
            board: BoardConfig::default(),
            starting_forces: Self::default_starting_forces(),
            starting_bridges: Self::default_starting_bridges(),
            free_card_choices: Self::default_free_card_choices(),
            study_max_discard: Self::default_study_max_discard(),
            base_gold_income: Self::default_base_gold_income(),
            forge_card_choices: Self::default_forge_card_choices(),
            basic_action_mana_cost: Self::default_basic_action_mana_cost(),
            retreat_mana_cost: Self::default_retreat_mana_cost(),
            log_limit: Self::default_log_limit(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(GameConfig::default().validate().is_ok());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config = GameConfig::from_json(r#"{ "vp_target": 5, "board": { "radius": 3 } }"#)
            .expect("config parses");
        assert_eq!(config.vp_target, 5);
        assert_eq!(config.board.radius, 3);
        assert_eq!(config.hand_limit, 5);
    }

    #[test]
    fn round_tables_fall_back_past_their_end() {
        let config = GameConfig::default();
        assert_eq!(config.age_for_round(1), Age::I);
        assert_eq!(config.age_for_round(5), Age::II);
        assert_eq!(config.age_for_round(40), Age::III);
        assert_eq!(config.preview_for_round(4), 2);
        assert_eq!(config.preview_for_round(40), 0);
    }

    #[test]
    fn unlisted_factions_rank_last() {
        let config = GameConfig::default();
        assert_eq!(config.basic_action_rank(&FactionId::new("wayfarers")), 0);
        assert_eq!(config.basic_action_rank(&FactionId::new("nomads")), 4);
    }

    #[test]
    fn invalid_tables_are_rejected() {
        let config = GameConfig {
            age_by_round: Vec::new(),
            ..GameConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::EmptyTable {
                field: "age_by_round"
            })
        );

        let config = GameConfig {
            starting_gold: 99,
            ..GameConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::RangeViolation {
                field: "starting_gold",
                ..
            })
        ));

        let config = GameConfig {
            hand_limit: 0,
            ..GameConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MinViolation {
                field: "hand_limit",
                ..
            })
        ));
    }
}
