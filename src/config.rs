//! Runtime-tunable balance configuration.
//!
//! Defaults come from the tuned constants; operators override the handful
//! of knobs that matter for live experiments via environment variables.
//! Anything that fails to parse falls back to the default with a warning.

use thiserror::Error;

use crate::game::constants::{arena, armor, director};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("armor cap {0} outside (0, 1)")]
    ArmorCapOutOfRange(f32),
    #[error("arena radius {0} must be positive")]
    ArenaRadiusNotPositive(f32),
    #[error("spawn rate base {0} must be non-negative")]
    SpawnRateNegative(f32),
}

/// Balance knobs resolved at match start and treated as immutable after
#[derive(Debug, Clone)]
pub struct BalanceConfig {
    /// Armor reduction cap before upgrades
    pub armor_cap: f32,
    /// Director base spawns per second
    pub spawn_rate_base: f32,
    /// Arena radius in world units
    pub arena_radius: f32,
    /// Hard ceiling on live enemies (performance guard)
    pub max_enemies: usize,
}

impl Default for BalanceConfig {
    fn default() -> Self {
        Self {
            armor_cap: armor::CAP,
            spawn_rate_base: director::SPAWN_BASE,
            arena_radius: arena::RADIUS,
            max_enemies: 600,
        }
    }
}

impl BalanceConfig {
    /// Load config from environment or use defaults
    pub fn load_or_default() -> Self {
        let mut config = Self::default();

        if let Ok(cap) = std::env::var("ARMOR_CAP") {
            match cap.parse::<f32>() {
                Ok(parsed) if parsed > 0.0 && parsed < 1.0 => config.armor_cap = parsed,
                _ => tracing::warn!("Invalid ARMOR_CAP '{}', using default", cap),
            }
        }

        if let Ok(rate) = std::env::var("SPAWN_RATE_BASE") {
            match rate.parse::<f32>() {
                Ok(parsed) if parsed >= 0.0 => config.spawn_rate_base = parsed,
                _ => tracing::warn!("Invalid SPAWN_RATE_BASE '{}', using default", rate),
            }
        }

        if let Ok(radius) = std::env::var("ARENA_RADIUS") {
            match radius.parse::<f32>() {
                Ok(parsed) if parsed > 0.0 => config.arena_radius = parsed,
                _ => tracing::warn!("Invalid ARENA_RADIUS '{}', using default", radius),
            }
        }

        if let Ok(max) = std::env::var("MAX_ENEMIES") {
            match max.parse::<usize>() {
                Ok(parsed) if parsed > 0 => config.max_enemies = parsed,
                _ => tracing::warn!("Invalid MAX_ENEMIES '{}', using default", max),
            }
        }

        config
    }

    /// Validate explicitly-constructed configs (env loading already falls
    /// back to defaults; this is for configs built in code)
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.armor_cap > 0.0 && self.armor_cap < 1.0) {
            return Err(ConfigError::ArmorCapOutOfRange(self.armor_cap));
        }
        if self.arena_radius <= 0.0 {
            return Err(ConfigError::ArenaRadiusNotPositive(self.arena_radius));
        }
        if self.spawn_rate_base < 0.0 {
            return Err(ConfigError::SpawnRateNegative(self.spawn_rate_base));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(BalanceConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_armor_cap() {
        let config = BalanceConfig {
            armor_cap: 1.5,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ArmorCapOutOfRange(_))
        ));
    }

    #[test]
    fn test_validate_rejects_negative_spawn_rate() {
        let config = BalanceConfig {
            spawn_rate_base: -1.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
