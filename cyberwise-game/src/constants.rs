//! Centralized balance and tuning constants for Cyberwise game logic.
//!
//! These values define the deterministic math for the progression rules.
//! Content that designers iterate on (ranks, tools, rewards) lives in the
//! embedded JSON catalog instead; everything here is part of the rules.

// Storage layout -----------------------------------------------------------
pub const STORAGE_PREFIX: &str = "cyberwise_";
pub const PROFILES_KEY: &str = "profiles";
pub const ACTIVE_PROFILE_KEY: &str = "activeProfile";
pub const LEGACY_SAVE_KEY: &str = "gameData";
pub(crate) const PROFILE_ID_PREFIX: &str = "profile_";

// New agent defaults -------------------------------------------------------
pub const DEFAULT_AGENT_NAME: &str = "Agent";
pub const STARTING_RANK: &str = "Digital Intern";
pub const STARTING_SALARY: u64 = 100;
pub const STARTING_TOOL_ID: &str = "phishsniffer";
pub(crate) const STARTING_TOOL_LEVEL: u32 = 1;

// Economy ------------------------------------------------------------------
pub const PREMIUM_PASS_COST: u64 = 500;
pub const DUPLICATE_CARD_BONUS: u64 = 100;
pub const DAILY_LOGIN_BONUS: u64 = 100;

// Mission runs -------------------------------------------------------------
pub const FIREWALL_MAX_INTEGRITY: u32 = 100;

// Persistence cadence ------------------------------------------------------
pub const AUTOSAVE_INTERVAL_SECS: u64 = 30;

// Post-mission events ------------------------------------------------------
pub const CODE_RED_CHANCE: f64 = 0.30;
pub const HACKER_MESSAGE_CHANCE: f64 = 0.25;
pub const CODE_RED_NODE_COUNT: u8 = 9;
pub const CODE_RED_BASE_SEQUENCE: usize = 3;
pub const CODE_RED_TIME_LIMIT_SECS: u32 = 15;
pub const CODE_RED_SALARY_REWARD: u64 = 150;
pub const CODE_RED_DATA_PASS_XP_REWARD: u32 = 50;
