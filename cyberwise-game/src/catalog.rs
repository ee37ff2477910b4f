//! Static, read-only game data.
//!
//! Everything the progression rules consult but never mutate: the rank
//! ladder, tools and their upgrade tracks, achievements, the data pass
//! ladder, cities, cyber cards, mission rewards, shop stock and the
//! hacker group's taunts. The default catalog ships as embedded JSON.
use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::{STARTING_RANK, STARTING_TOOL_ID};
use crate::state::{RewardKey, RewardTrack};
use crate::store::ShopCatalog;

/// The catalog compiled into the crate.
pub const DEFAULT_CATALOG_JSON: &str = include_str!("../assets/catalog.json");

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog JSON parsing error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("rank ladder is empty")]
    EmptyRankLadder,
    #[error("first rank must be {expected} (got {found})")]
    StartingRank { expected: &'static str, found: String },
    #[error("rank {rank} requires less than the rank before it")]
    RankOrder { rank: String },
    #[error("duplicate {kind} id {id}")]
    DuplicateId { kind: &'static str, id: String },
    #[error("{context} references unknown {kind} {id}")]
    UnknownReference {
        kind: &'static str,
        id: String,
        context: String,
    },
    #[error("tool {tool} upgrades must be numbered 1..=n in order")]
    ToolUpgradeSequence { tool: String },
    #[error("data pass xp per level must be positive")]
    ZeroXpPerLevel,
    #[error("data pass tier levels must be unique and ascending (at level {level})")]
    DataPassOrder { level: u32 },
}

/// One rung on the promotion ladder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankRung {
    pub name: String,
    pub xp_required: u64,
    pub licenses_required: usize,
}

/// Ranks ordered by ascending requirements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct RankLadder(pub Vec<RankRung>);

impl RankLadder {
    #[must_use]
    pub fn first(&self) -> Option<&RankRung> {
        self.0.first()
    }

    #[must_use]
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.0.iter().position(|rung| rung.name == name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.index_of(name).is_some()
    }

    /// The rung directly above `name`, if `name` is on the ladder and not the top.
    #[must_use]
    pub fn next_after(&self, name: &str) -> Option<&RankRung> {
        self.index_of(name).and_then(|idx| self.0.get(idx + 1))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RankRung> {
        self.0.iter()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolUpgrade {
    pub level: u32,
    pub cost: u64,
    pub effect: String,
}

/// Salary bonus granted by a tool once it reaches `min_level`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolBonus {
    pub city: String,
    pub min_level: u32,
    pub bonus_pct: u32,
}

/// Clue auto-detection granted by a tool once it reaches `min_level`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoDetect {
    pub city: String,
    pub min_level: u32,
}

/// Firewall damage reduction granted by a tool once it reaches `min_level`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirewallShield {
    pub min_level: u32,
    pub reduction_pct: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolDef {
    pub id: String,
    pub name: String,
    pub description: String,
    pub upgrades: Vec<ToolUpgrade>,
    #[serde(default)]
    pub bonus: Option<ToolBonus>,
    #[serde(default)]
    pub auto_detect: Option<AutoDetect>,
    #[serde(default)]
    pub firewall_shield: Option<FirewallShield>,
}

impl ToolDef {
    #[must_use]
    pub fn max_level(&self) -> u32 {
        self.upgrades.iter().map(|u| u.level).max().unwrap_or(1)
    }

    #[must_use]
    pub fn upgrade_to(&self, level: u32) -> Option<&ToolUpgrade> {
        self.upgrades.iter().find(|u| u.level == level)
    }
}

/// Salary bonus attached to an achievement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CityBonus {
    pub city: String,
    pub bonus_pct: u32,
}

/// Data-driven achievement predicate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AchievementCondition {
    CityMissions { city: String, threshold: u32 },
    RankAtLeast { rank: String },
    TotalMissions { threshold: u32 },
    LicenseCount { threshold: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AchievementDef {
    pub id: String,
    pub name: String,
    pub description: String,
    pub reward_text: String,
    pub condition: AchievementCondition,
    #[serde(default)]
    pub bonus: Option<CityBonus>,
}

/// What claiming a data pass slot grants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RewardEffect {
    Salary {
        value: u64,
    },
    ToolLevel {
        tool_id: String,
    },
    CyberCard {
        card_id: String,
        #[serde(default)]
        exclusive: bool,
    },
    Cosmetic {
        id: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataPassTier {
    pub level: u32,
    pub free: RewardEffect,
    pub premium: RewardEffect,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataPassConfig {
    pub xp_per_level: u32,
    pub rewards: Vec<DataPassTier>,
}

impl DataPassConfig {
    #[must_use]
    pub fn tier(&self, level: u32) -> Option<&DataPassTier> {
        self.rewards.iter().find(|tier| tier.level == level)
    }

    /// The effect stored in the slot named by `key`.
    #[must_use]
    pub fn reward(&self, key: RewardKey) -> Option<&RewardEffect> {
        self.tier(key.level).map(|tier| match key.track {
            RewardTrack::Free => &tier.free,
            RewardTrack::Premium => &tier.premium,
        })
    }

    /// Every slot key on the ladder, free before premium per level.
    #[must_use]
    pub fn keys(&self) -> Vec<RewardKey> {
        self.rewards
            .iter()
            .flat_map(|tier| {
                [
                    RewardKey::free(tier.level),
                    RewardKey::premium(tier.level),
                ]
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CityDef {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub rank_required: Option<String>,
    #[serde(default)]
    pub tool_unlock: Option<String>,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quiz {
    pub question: String,
    pub options: Vec<String>,
    pub answer: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardDef {
    pub id: String,
    pub name: String,
    pub content: String,
    pub quiz: Quiz,
    pub license: String,
}

/// Payout for finishing a mission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct MissionReward {
    #[serde(default)]
    pub salary: u64,
    #[serde(default)]
    pub xp: u64,
    #[serde(default)]
    pub data_pass_xp: u32,
    #[serde(default)]
    pub card: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissionDef {
    pub id: String,
    pub city_id: String,
    pub title: String,
    pub difficulty: String,
    pub reward: MissionReward,
    pub clues: Vec<String>,
    /// Firewall damage per wrong guess; missions without one never fail.
    #[serde(default)]
    pub firewall_damage: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct HackerGroup {
    pub name: String,
    pub messages: Vec<String>,
}

/// Complete static data set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    pub ranks: RankLadder,
    pub tools: Vec<ToolDef>,
    pub achievements: Vec<AchievementDef>,
    pub data_pass: DataPassConfig,
    pub cities: Vec<CityDef>,
    pub cards: Vec<CardDef>,
    pub missions: Vec<MissionDef>,
    pub shop: ShopCatalog,
    #[serde(default)]
    pub hacker_group: HackerGroup,
}

impl Catalog {
    /// Parse a catalog from JSON without validating cross references.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON cannot be parsed into catalog data.
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Parse and validate the embedded default catalog.
    ///
    /// # Errors
    ///
    /// Returns an error if the embedded data is malformed.
    pub fn load_default() -> Result<Self, CatalogError> {
        let catalog = Self::from_json(DEFAULT_CATALOG_JSON)?;
        catalog.validate()?;
        Ok(catalog)
    }

    #[must_use]
    pub fn tool(&self, id: &str) -> Option<&ToolDef> {
        self.tools.iter().find(|tool| tool.id == id)
    }

    #[must_use]
    pub fn mission(&self, id: &str) -> Option<&MissionDef> {
        self.missions.iter().find(|mission| mission.id == id)
    }

    #[must_use]
    pub fn card(&self, id: &str) -> Option<&CardDef> {
        self.cards.iter().find(|card| card.id == id)
    }

    #[must_use]
    pub fn city(&self, id: &str) -> Option<&CityDef> {
        self.cities.iter().find(|city| city.id == id)
    }

    /// Check internal consistency: ordering, unique ids and cross references.
    ///
    /// # Errors
    ///
    /// Returns the first inconsistency found.
    pub fn validate(&self) -> Result<(), CatalogError> {
        self.validate_ranks()?;
        ensure_unique("tool", self.tools.iter().map(|t| t.id.as_str()))?;
        ensure_unique("achievement", self.achievements.iter().map(|a| a.id.as_str()))?;
        ensure_unique("city", self.cities.iter().map(|c| c.id.as_str()))?;
        ensure_unique("card", self.cards.iter().map(|c| c.id.as_str()))?;
        ensure_unique("mission", self.missions.iter().map(|m| m.id.as_str()))?;
        ensure_unique("shop item", self.shop.items.iter().map(|i| i.id.as_str()))?;
        self.validate_tools()?;
        self.validate_cities()?;
        self.validate_achievements()?;
        self.validate_data_pass()?;
        self.validate_missions()
    }

    fn validate_ranks(&self) -> Result<(), CatalogError> {
        let first = self.ranks.first().ok_or(CatalogError::EmptyRankLadder)?;
        if first.name != STARTING_RANK {
            return Err(CatalogError::StartingRank {
                expected: STARTING_RANK,
                found: first.name.clone(),
            });
        }
        ensure_unique("rank", self.ranks.iter().map(|r| r.name.as_str()))?;
        for pair in self.ranks.0.windows(2) {
            let (lower, upper) = (&pair[0], &pair[1]);
            if upper.xp_required < lower.xp_required
                || upper.licenses_required < lower.licenses_required
            {
                return Err(CatalogError::RankOrder {
                    rank: upper.name.clone(),
                });
            }
        }
        Ok(())
    }

    fn validate_tools(&self) -> Result<(), CatalogError> {
        self.require_tool(STARTING_TOOL_ID, "starting inventory")?;
        for tool in &self.tools {
            let sequential = tool
                .upgrades
                .iter()
                .zip(1_u32..)
                .all(|(upgrade, expected)| upgrade.level == expected);
            if tool.upgrades.is_empty() || !sequential {
                return Err(CatalogError::ToolUpgradeSequence {
                    tool: tool.id.clone(),
                });
            }
            let context = format!("tool {}", tool.id);
            if let Some(bonus) = &tool.bonus {
                self.require_city(&bonus.city, &context)?;
            }
            if let Some(detect) = &tool.auto_detect {
                self.require_city(&detect.city, &context)?;
            }
        }
        Ok(())
    }

    fn validate_cities(&self) -> Result<(), CatalogError> {
        for city in &self.cities {
            let context = format!("city {}", city.id);
            if let Some(rank) = &city.rank_required {
                self.require_rank(rank, &context)?;
            }
            if let Some(tool) = &city.tool_unlock {
                self.require_tool(tool, &context)?;
            }
        }
        Ok(())
    }

    fn validate_achievements(&self) -> Result<(), CatalogError> {
        for ach in &self.achievements {
            let context = format!("achievement {}", ach.id);
            match &ach.condition {
                AchievementCondition::CityMissions { city, .. } => {
                    self.require_city(city, &context)?;
                }
                AchievementCondition::RankAtLeast { rank } => self.require_rank(rank, &context)?,
                AchievementCondition::TotalMissions { .. }
                | AchievementCondition::LicenseCount { .. } => {}
            }
            if let Some(bonus) = &ach.bonus {
                self.require_city(&bonus.city, &context)?;
            }
        }
        Ok(())
    }

    fn validate_data_pass(&self) -> Result<(), CatalogError> {
        if self.data_pass.xp_per_level == 0 {
            return Err(CatalogError::ZeroXpPerLevel);
        }
        let mut previous = 0;
        for tier in &self.data_pass.rewards {
            if tier.level <= previous {
                return Err(CatalogError::DataPassOrder { level: tier.level });
            }
            previous = tier.level;
            let context = format!("data pass level {}", tier.level);
            for effect in [&tier.free, &tier.premium] {
                match effect {
                    RewardEffect::ToolLevel { tool_id } => self.require_tool(tool_id, &context)?,
                    RewardEffect::CyberCard { card_id, .. } => {
                        self.require_card(card_id, &context)?;
                    }
                    RewardEffect::Salary { .. } | RewardEffect::Cosmetic { .. } => {}
                }
            }
        }
        Ok(())
    }

    fn validate_missions(&self) -> Result<(), CatalogError> {
        for mission in &self.missions {
            let context = format!("mission {}", mission.id);
            self.require_city(&mission.city_id, &context)?;
            if let Some(card) = &mission.reward.card {
                self.require_card(card, &context)?;
            }
        }
        Ok(())
    }

    fn require_tool(&self, id: &str, context: &str) -> Result<(), CatalogError> {
        require("tool", id, context, self.tool(id).is_some())
    }

    fn require_city(&self, id: &str, context: &str) -> Result<(), CatalogError> {
        require("city", id, context, self.city(id).is_some())
    }

    fn require_card(&self, id: &str, context: &str) -> Result<(), CatalogError> {
        require("card", id, context, self.card(id).is_some())
    }

    fn require_rank(&self, name: &str, context: &str) -> Result<(), CatalogError> {
        require("rank", name, context, self.ranks.contains(name))
    }
}

fn require(kind: &'static str, id: &str, context: &str, found: bool) -> Result<(), CatalogError> {
    if found {
        Ok(())
    } else {
        Err(CatalogError::UnknownReference {
            kind,
            id: id.to_string(),
            context: context.to_string(),
        })
    }
}

fn ensure_unique<'a>(
    kind: &'static str,
    ids: impl Iterator<Item = &'a str>,
) -> Result<(), CatalogError> {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(CatalogError::DuplicateId {
                kind,
                id: id.to_string(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_catalog_loads_and_validates() {
        let catalog = Catalog::load_default().unwrap();
        assert_eq!(catalog.ranks.len(), 5);
        assert_eq!(catalog.data_pass.xp_per_level, 100);
        assert_eq!(catalog.tool("phishsniffer").unwrap().max_level(), 3);
        assert_eq!(catalog.tool("leaktracker").unwrap().max_level(), 2);
        assert_eq!(catalog.missions.len(), 4);
        assert_eq!(catalog.data_pass.keys().len(), 10);
    }

    #[test]
    fn ladder_navigation() {
        let catalog = Catalog::load_default().unwrap();
        let ladder = &catalog.ranks;
        assert_eq!(ladder.index_of("Digital Intern"), Some(0));
        assert_eq!(
            ladder.next_after("Digital Intern").map(|r| r.name.as_str()),
            Some("Junior Analyst")
        );
        assert!(ladder.next_after("Cyber Guardian").is_none());
        assert!(ladder.next_after("Nobody").is_none());
    }

    #[test]
    fn reward_lookup_by_key() {
        let catalog = Catalog::load_default().unwrap();
        assert_eq!(
            catalog.data_pass.reward(RewardKey::free(1)),
            Some(&RewardEffect::Salary { value: 50 })
        );
        assert!(catalog.data_pass.reward(RewardKey::premium(99)).is_none());
    }

    #[test]
    fn validation_rejects_dangling_references() {
        let mut catalog = Catalog::load_default().unwrap();
        catalog.cities[1].tool_unlock = Some("ghost_tool".to_string());
        assert!(matches!(
            catalog.validate(),
            Err(CatalogError::UnknownReference { kind: "tool", .. })
        ));
    }

    #[test]
    fn validation_rejects_descending_ranks() {
        let mut catalog = Catalog::load_default().unwrap();
        catalog.ranks.0[2].xp_required = 10;
        assert!(matches!(
            catalog.validate(),
            Err(CatalogError::RankOrder { .. })
        ));
    }

    #[test]
    fn validation_rejects_gapped_upgrades() {
        let mut catalog = Catalog::load_default().unwrap();
        catalog.tools[0].upgrades.remove(1);
        assert!(matches!(
            catalog.validate(),
            Err(CatalogError::ToolUpgradeSequence { .. })
        ));
    }

    #[test]
    fn validation_rejects_zero_xp_per_level() {
        let mut catalog = Catalog::load_default().unwrap();
        catalog.data_pass.xp_per_level = 0;
        assert!(matches!(
            catalog.validate(),
            Err(CatalogError::ZeroXpPerLevel)
        ));
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        assert!(matches!(
            Catalog::from_json("{\"ranks\": 3}"),
            Err(CatalogError::Parse(_))
        ));
    }
}
