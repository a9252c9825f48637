use crate::types::PlayerId;
use serde::{Deserialize, Serialize};

/// Rating Update Model knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatingConfig {
    /// Starting rating for every player at the head of a replay.
    pub base_rating: i64,
    /// Base K-factor for singles (moves rating more).
    pub k_singles: f64,
    /// Base K-factor for doubles (team level, before the per-player split).
    pub k_doubles: f64,
    pub min_margin_multiplier: f64,
    pub max_margin_multiplier: f64,
    /// Added to winners/errors before splitting a team delta.
    pub split_epsilon: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReignConfig {
    /// Fractional days a reign must last to earn a crown.
    pub crown_threshold_days: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChemistryConfig {
    /// Ridge strength for the player-only baseline model.
    pub lambda_alpha: f64,
    /// Ridge strength for the player + pair model.
    pub lambda_full: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TitleConfig {
    /// When this player holds the top spot the title reads "Queen".
    #[serde(default)]
    pub queen_player_id: Option<PlayerId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LadderConfig {
    pub rating: RatingConfig,
    pub reign: ReignConfig,
    pub chemistry: ChemistryConfig,
    #[serde(default)]
    pub titles: TitleConfig,
}

impl LadderConfig {
    /// Load from the data/ directory.
    /// In tests, use LadderConfig::default_test().
    pub fn load(data_dir: &str) -> anyhow::Result<Self> {
        let path = format!("{data_dir}/ladder_config.json");
        let content = std::fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let config: LadderConfig = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Cannot parse {path}: {e}"))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make the engines meaningless.
    pub fn validate(&self) -> anyhow::Result<()> {
        let r = &self.rating;
        if r.min_margin_multiplier > r.max_margin_multiplier {
            anyhow::bail!(
                "min_margin_multiplier {} exceeds max_margin_multiplier {}",
                r.min_margin_multiplier,
                r.max_margin_multiplier
            );
        }
        if r.split_epsilon <= 0.0 {
            anyhow::bail!("split_epsilon must be positive, got {}", r.split_epsilon);
        }
        if r.k_singles < 0.0 || r.k_doubles < 0.0 {
            anyhow::bail!("K-factors must be non-negative");
        }
        if self.reign.crown_threshold_days < 0.0 {
            anyhow::bail!("crown_threshold_days must be non-negative");
        }
        let c = &self.chemistry;
        if !(c.lambda_alpha >= 0.0 && c.lambda_full >= 0.0) {
            anyhow::bail!("ridge lambdas must be non-negative");
        }
        Ok(())
    }

    /// Config with hardcoded defaults for use in unit tests.
    pub fn default_test() -> Self {
        Self {
            rating: RatingConfig {
                base_rating: 1000,
                k_singles: 24.0,
                k_doubles: 16.0,
                min_margin_multiplier: 0.75,
                max_margin_multiplier: 2.0,
                split_epsilon: 0.5,
            },
            reign: ReignConfig {
                crown_threshold_days: 14.0,
            },
            chemistry: ChemistryConfig {
                lambda_alpha: 1.0,
                lambda_full: 1.0,
            },
            titles: TitleConfig::default(),
        }
    }
}
