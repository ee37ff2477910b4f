//! Cyberwise Game Engine
//!
//! Platform-agnostic progression and save-profile logic for the Cyberwise
//! cybersecurity training game. Rendering lives elsewhere; this crate owns
//! the player state, the rules that change it and how it is persisted.

pub mod catalog;
pub mod constants;
pub mod events;
pub mod missions;
pub mod profiles;
pub mod progression;
pub mod session;
pub mod state;
pub mod storage;
pub mod store;

// Re-export commonly used types
pub use catalog::{
    AchievementCondition, AchievementDef, AutoDetect, CardDef, Catalog, CatalogError, CityBonus,
    CityDef, DataPassConfig, DataPassTier, FirewallShield, HackerGroup, MissionDef,
    MissionReward, Quiz, RankLadder, RankRung, RewardEffect, ToolBonus, ToolDef, ToolUpgrade,
};
pub use events::{
    CodeRedChallenge, CodeRedFailure, CodeRedReward, CodeRedStatus, PostMissionEvent,
    award_code_red, random_choice, roll_post_mission_event,
};
pub use missions::{ClueOutcome, MissionRun, MissionStatus};
pub use profiles::{Profile, ProfileError, ProfileRegistry};
pub use progression::{
    AppliedReward, ClaimError, Promotion, QuizError, QuizOutcome, apply_bonus_pct,
    apply_daily_login, apply_mission_reward, city_unlocked, claim_data_pass_reward,
    evaluate_achievements, evaluate_rank_up, mission_salary, promote_until_settled,
    settle_data_pass_levels, submit_quiz_answer, unlocked_cities,
};
pub use session::{
    AutosaveTimer, ClueProgress, GameSession, MissionReport, QuizReport, SessionError,
};
pub use state::{
    AchievementLog, DataPassState, Inventory, MissionTally, OwnedTool, PlayerState, RewardKey,
    RewardKeyParseError, RewardTrack, Settings, SpecialOps, ThemeId,
};
pub use storage::{FileBackend, MemoryBackend, PersistentStore, StorageBackend, StorageError};
pub use store::{
    PurchaseError, ShopCatalog, ShopItem, ThemePurchase, buy_premium_pass, purchase_theme,
    purchase_tool_upgrade,
};

/// Open a session over `backend` with the embedded catalog.
///
/// # Errors
///
/// Returns an error if the catalog is invalid or a legacy save cannot be
/// migrated.
pub fn open_session<B: StorageBackend>(
    backend: B,
    seed: u64,
) -> Result<GameSession<B>, OpenError> {
    let catalog = Catalog::load_default()?;
    let registry = ProfileRegistry::new(PersistentStore::new(backend));
    Ok(GameSession::start(registry, catalog, seed)?)
}

#[derive(Debug, thiserror::Error)]
pub enum OpenError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Session(#[from] SessionError),
}
