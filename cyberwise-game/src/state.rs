//! The player-state aggregate and its saved shape.
//!
//! Field names serialize in camelCase and every field has a default, so
//! blobs written by older builds load with starting values for whatever
//! they lack.
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::Catalog;
use crate::constants::{
    DEFAULT_AGENT_NAME, STARTING_RANK, STARTING_SALARY, STARTING_TOOL_ID, STARTING_TOOL_LEVEL,
};
use crate::progression::settle_data_pass_levels;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(from = "String", into = "String")]
pub enum ThemeId {
    #[default]
    Default,
    Matrix,
    Danger,
    Cyber,
    Gold,
}

impl ThemeId {
    pub const ALL: [Self; 5] = [
        Self::Default,
        Self::Matrix,
        Self::Danger,
        Self::Cyber,
        Self::Gold,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Matrix => "matrix",
            Self::Danger => "danger",
            Self::Cyber => "cyber",
            Self::Gold => "gold",
        }
    }
}

impl fmt::Display for ThemeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ThemeId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|theme| theme.as_str() == s)
            .ok_or(())
    }
}

impl From<String> for ThemeId {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|()| {
            log::warn!("unknown theme {value:?}; falling back to default");
            Self::Default
        })
    }
}

impl From<ThemeId> for String {
    fn from(value: ThemeId) -> Self {
        value.as_str().to_string()
    }
}

/// Which side of the data pass a reward slot sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RewardTrack {
    Free,
    Premium,
}

impl RewardTrack {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Premium => "premium",
        }
    }
}

/// Identifies one slot on the data pass ladder.
///
/// Canonical text form is `free_3` / `premium_3`; the short `f_3` / `p_3`
/// forms found in older saves are accepted when parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RewardKey {
    pub track: RewardTrack,
    pub level: u32,
}

impl RewardKey {
    #[must_use]
    pub const fn free(level: u32) -> Self {
        Self {
            track: RewardTrack::Free,
            level,
        }
    }

    #[must_use]
    pub const fn premium(level: u32) -> Self {
        Self {
            track: RewardTrack::Premium,
            level,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid reward key {0:?}")]
pub struct RewardKeyParseError(pub String);

impl fmt::Display for RewardKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.track.as_str(), self.level)
    }
}

impl FromStr for RewardKey {
    type Err = RewardKeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || RewardKeyParseError(s.to_string());
        let (track, level) = s.rsplit_once('_').ok_or_else(invalid)?;
        let track = match track {
            "free" | "f" => RewardTrack::Free,
            "premium" | "p" => RewardTrack::Premium,
            _ => return Err(invalid()),
        };
        let level = level.parse().map_err(|_| invalid())?;
        Ok(Self { track, level })
    }
}

impl TryFrom<String> for RewardKey {
    type Error = RewardKeyParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RewardKey> for String {
    fn from(value: RewardKey) -> Self {
        value.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct MissionTally {
    pub total: u32,
    pub by_city: BTreeMap<String, u32>,
}

impl MissionTally {
    #[must_use]
    pub fn in_city(&self, city: &str) -> u32 {
        self.by_city.get(city).copied().unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnedTool {
    pub id: String,
    pub level: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Inventory {
    pub tools: Vec<OwnedTool>,
    pub cyber_cards: BTreeSet<String>,
    pub licenses: BTreeSet<String>,
}

impl Default for Inventory {
    fn default() -> Self {
        Self {
            tools: vec![OwnedTool {
                id: STARTING_TOOL_ID.to_string(),
                level: STARTING_TOOL_LEVEL,
            }],
            cyber_cards: BTreeSet::new(),
            licenses: BTreeSet::new(),
        }
    }
}

impl Inventory {
    #[must_use]
    pub fn tool(&self, id: &str) -> Option<&OwnedTool> {
        self.tools.iter().find(|tool| tool.id == id)
    }

    pub fn tool_mut(&mut self, id: &str) -> Option<&mut OwnedTool> {
        self.tools.iter_mut().find(|tool| tool.id == id)
    }

    #[must_use]
    pub fn tool_level(&self, id: &str) -> Option<u32> {
        self.tool(id).map(|tool| tool.level)
    }

    /// Adds `id` at level 1 unless already owned. Returns true when added.
    pub fn grant_tool(&mut self, id: &str) -> bool {
        if self.tool(id).is_some() {
            return false;
        }
        self.tools.push(OwnedTool {
            id: id.to_string(),
            level: STARTING_TOOL_LEVEL,
        });
        true
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DataPassState {
    pub level: u32,
    pub xp: u32,
    pub is_premium: bool,
    pub claimed_rewards: BTreeSet<RewardKey>,
}

impl Default for DataPassState {
    fn default() -> Self {
        Self {
            level: 1,
            xp: 0,
            is_premium: false,
            claimed_rewards: BTreeSet::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AchievementLog {
    pub unlocked: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    pub theme: ThemeId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct SpecialOps {
    pub last_completed_week: Option<serde_json::Value>,
}

/// Everything one agent has earned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlayerState {
    pub name: String,
    pub rank: String,
    pub salary: u64,
    pub xp: u64,
    pub missions_completed: MissionTally,
    pub inventory: Inventory,
    pub data_pass: DataPassState,
    pub achievements: AchievementLog,
    pub settings: Settings,
    pub owned_themes: BTreeSet<ThemeId>,
    #[serde(with = "login_date")]
    pub last_login_date: Option<NaiveDate>,
    pub special_ops: SpecialOps,
}

impl Default for PlayerState {
    fn default() -> Self {
        Self {
            name: DEFAULT_AGENT_NAME.to_string(),
            rank: STARTING_RANK.to_string(),
            salary: STARTING_SALARY,
            xp: 0,
            missions_completed: MissionTally::default(),
            inventory: Inventory::default(),
            data_pass: DataPassState::default(),
            achievements: AchievementLog::default(),
            settings: Settings::default(),
            owned_themes: BTreeSet::from([ThemeId::Default]),
            last_login_date: None,
            special_ops: SpecialOps::default(),
        }
    }
}

impl PlayerState {
    /// Starting state for a fresh agent.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn license_count(&self) -> usize {
        self.inventory.licenses.len()
    }

    #[must_use]
    pub fn has_achievement(&self, id: &str) -> bool {
        self.achievements.unlocked.contains(id)
    }

    #[must_use]
    pub fn has_claimed(&self, key: RewardKey) -> bool {
        self.data_pass.claimed_rewards.contains(&key)
    }

    #[must_use]
    pub fn owns_theme(&self, theme: ThemeId) -> bool {
        theme == ThemeId::Default || self.owned_themes.contains(&theme)
    }

    /// Repair a loaded state so it satisfies the catalog's invariants.
    ///
    /// Unknown ranks drop to the first rung, tools are clamped to their
    /// upgrade range, the data pass level is at least 1 with banked XP
    /// settled into levels, and the equipped theme counts as owned.
    /// Returns true if anything changed.
    pub fn normalize(&mut self, catalog: &Catalog) -> bool {
        let before = self.clone();

        if !catalog.ranks.contains(&self.rank)
            && let Some(first) = catalog.ranks.first()
        {
            log::warn!(
                "agent {} has unknown rank {:?}; resetting to {}",
                self.name,
                self.rank,
                first.name
            );
            self.rank.clone_from(&first.name);
        }

        for owned in &mut self.inventory.tools {
            let max = catalog.tool(&owned.id).map_or(owned.level, |def| def.max_level());
            owned.level = owned.level.clamp(STARTING_TOOL_LEVEL, max.max(STARTING_TOOL_LEVEL));
        }

        self.data_pass.level = self.data_pass.level.max(1);
        settle_data_pass_levels(self, catalog.data_pass.xp_per_level);
        self.owned_themes.insert(ThemeId::Default);
        self.owned_themes.insert(self.settings.theme);

        let changed = *self != before;
        if changed {
            log::debug!("normalized saved state for agent {}", self.name);
        }
        changed
    }
}

/// Dates are written as ISO `YYYY-MM-DD`; older saves used the
/// `Fri Sep 26 2025` form, which still loads.
mod login_date {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    const ISO_FORMAT: &str = "%Y-%m-%d";
    const LEGACY_FORMAT: &str = "%a %b %d %Y";

    pub fn serialize<S>(value: &Option<NaiveDate>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(date) => serializer.serialize_str(&date.format(ISO_FORMAT).to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.and_then(|text| {
            NaiveDate::parse_from_str(&text, ISO_FORMAT)
                .or_else(|_| NaiveDate::parse_from_str(&text, LEGACY_FORMAT))
                .map_err(|_| log::warn!("ignoring unreadable login date {text:?}"))
                .ok()
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_agent_defaults() {
        let state = PlayerState::new("Neo");
        assert_eq!(state.name, "Neo");
        assert_eq!(state.rank, "Digital Intern");
        assert_eq!(state.salary, 100);
        assert_eq!(state.inventory.tool_level("phishsniffer"), Some(1));
        assert_eq!(state.data_pass.level, 1);
        assert_eq!(state.settings.theme, ThemeId::Default);
        assert!(state.owns_theme(ThemeId::Default));
    }

    #[test]
    fn reward_key_text_forms() {
        assert_eq!(RewardKey::free(3).to_string(), "free_3");
        assert_eq!(RewardKey::premium(4).to_string(), "premium_4");
        assert_eq!("f_3".parse::<RewardKey>(), Ok(RewardKey::free(3)));
        assert_eq!("p_5".parse::<RewardKey>(), Ok(RewardKey::premium(5)));
        assert_eq!("premium_2".parse::<RewardKey>(), Ok(RewardKey::premium(2)));
        assert!("gold_1".parse::<RewardKey>().is_err());
        assert!("free_x".parse::<RewardKey>().is_err());
        assert!("free".parse::<RewardKey>().is_err());
    }

    #[test]
    fn legacy_blob_loads_with_defaults_for_missing_fields() {
        let blob = r#"{
            "name": "Trinity",
            "rank": "Junior Analyst",
            "salary": 420,
            "xp": 150,
            "missionsCompleted": { "total": 3, "byCity": { "inbox_isles": 3 } },
            "inventory": {
                "tools": [{ "id": "phishsniffer", "level": 2 }],
                "cyberCards": ["phishing101"],
                "licenses": ["Phishing Basics"]
            },
            "dataPass": {
                "level": 2,
                "xp": 40,
                "isPremium": false,
                "claimedRewards": ["f_1", "f_2"]
            },
            "achievements": { "unlocked": ["scam_spotter"] },
            "settings": { "theme": "matrix" },
            "lastLoginDate": "Fri Sep 26 2025",
            "specialOps": { "lastCompletedWeek": null }
        }"#;
        let state: PlayerState = serde_json::from_str(blob).unwrap();
        assert_eq!(state.salary, 420);
        assert_eq!(state.missions_completed.in_city("inbox_isles"), 3);
        assert!(state.has_claimed(RewardKey::free(2)));
        assert_eq!(state.settings.theme, ThemeId::Matrix);
        assert_eq!(
            state.last_login_date,
            NaiveDate::from_ymd_opt(2025, 9, 26)
        );
        assert!(state.owned_themes.contains(&ThemeId::Default));

        let sparse: PlayerState = serde_json::from_str(r#"{"name":"Min"}"#).unwrap();
        assert_eq!(sparse.rank, "Digital Intern");
        assert_eq!(sparse.data_pass.level, 1);
    }

    #[test]
    fn saves_use_camel_case_and_canonical_keys() {
        let mut state = PlayerState::new("Morpheus");
        state.data_pass.claimed_rewards.insert(RewardKey::premium(1));
        state.last_login_date = NaiveDate::from_ymd_opt(2026, 1, 2);
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["dataPass"]["claimedRewards"][0], "premium_1");
        assert_eq!(json["lastLoginDate"], "2026-01-02");
        assert!(json.get("missionsCompleted").is_some());
        assert_eq!(json["settings"]["theme"], "default");
    }

    #[test]
    fn unknown_theme_falls_back_to_default() {
        let state: PlayerState =
            serde_json::from_str(r#"{"settings":{"theme":"neon"}}"#).unwrap();
        assert_eq!(state.settings.theme, ThemeId::Default);
    }

    #[test]
    fn normalize_repairs_rank_tools_and_themes() {
        let catalog = Catalog::load_default().unwrap();
        let mut state = PlayerState::new("Glitch");
        state.rank = "Supreme Overlord".to_string();
        state.inventory.tools[0].level = 9;
        state.data_pass.level = 0;
        state.settings.theme = ThemeId::Gold;

        assert!(state.normalize(&catalog));
        assert_eq!(state.rank, "Digital Intern");
        assert_eq!(state.inventory.tool_level("phishsniffer"), Some(3));
        assert_eq!(state.data_pass.level, 1);
        assert!(state.owns_theme(ThemeId::Gold));
        assert!(!state.normalize(&catalog));
    }

    #[test]
    fn normalize_settles_banked_data_pass_xp() {
        let catalog = Catalog::load_default().unwrap();
        let mut state: PlayerState = serde_json::from_str(
            r#"{"name": "Cipher", "dataPass": {"level": 1, "xp": 250}}"#,
        )
        .unwrap();

        assert!(state.normalize(&catalog));
        assert_eq!(state.data_pass.level, 3);
        assert_eq!(state.data_pass.xp, 50);
        assert!(!state.normalize(&catalog));
    }

    #[test]
    fn grant_tool_is_idempotent() {
        let mut inventory = Inventory::default();
        assert!(inventory.grant_tool("socialscope"));
        assert!(!inventory.grant_tool("socialscope"));
        assert_eq!(inventory.tools.len(), 2);
    }
}
