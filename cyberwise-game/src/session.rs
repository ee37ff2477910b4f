//! The live game session: one active profile, its state, and the
//! save checkpoints around every operation.
use std::time::Duration;

use chrono::NaiveDate;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use serde::Serialize;
use thiserror::Error;

use crate::catalog::Catalog;
use crate::constants::AUTOSAVE_INTERVAL_SECS;
use crate::events::{
    CodeRedChallenge, CodeRedReward, CodeRedStatus, PostMissionEvent, award_code_red,
    random_choice, roll_post_mission_event,
};
use crate::missions::{ClueOutcome, MissionRun, MissionStatus};
use crate::profiles::{Profile, ProfileError, ProfileRegistry};
use crate::progression::{
    AppliedReward, ClaimError, Promotion, QuizError, QuizOutcome, apply_daily_login,
    apply_mission_reward, city_unlocked, claim_data_pass_reward, evaluate_achievements,
    promote_until_settled, settle_data_pass_levels, submit_quiz_answer,
};
use crate::state::{PlayerState, RewardKey};
use crate::storage::{StorageBackend, StorageError};
use crate::store::{
    PurchaseError, ThemePurchase, buy_premium_pass, purchase_theme, purchase_tool_upgrade,
};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no active profile")]
    NoActiveProfile,
    #[error("unknown mission {0}")]
    UnknownMission(String),
    #[error("city {0} is locked for this agent")]
    CityLocked(String),
    #[error("no mission in progress")]
    NoMissionRun,
    #[error("no Code Red challenge in progress")]
    NoCodeRed,
    #[error("Code Red challenge is still running")]
    CodeRedUnfinished,
    #[error("save failed: {0}")]
    Storage(#[source] StorageError),
    #[error(transparent)]
    Profile(ProfileError),
    #[error(transparent)]
    Purchase(#[from] PurchaseError),
    #[error(transparent)]
    Claim(#[from] ClaimError),
    #[error(transparent)]
    Quiz(#[from] QuizError),
}

impl From<ProfileError> for SessionError {
    fn from(err: ProfileError) -> Self {
        match err {
            ProfileError::Storage(inner) => Self::Storage(inner),
            other => Self::Profile(other),
        }
    }
}

/// Fires once every `interval` of accumulated play time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutosaveTimer {
    interval: Duration,
    elapsed: Duration,
}

impl Default for AutosaveTimer {
    fn default() -> Self {
        Self::new(Duration::from_secs(AUTOSAVE_INTERVAL_SECS))
    }
}

impl AutosaveTimer {
    #[must_use]
    pub const fn new(interval: Duration) -> Self {
        Self {
            interval,
            elapsed: Duration::ZERO,
        }
    }

    /// Add `delta`; returns true when the interval was crossed. Several
    /// missed intervals still fire only once.
    pub fn advance(&mut self, delta: Duration) -> bool {
        if self.interval.is_zero() {
            return true;
        }
        self.elapsed += delta;
        if self.elapsed < self.interval {
            return false;
        }
        let interval_nanos = self.interval.as_nanos();
        let leftover = self.elapsed.as_nanos() % interval_nanos;
        self.elapsed = Duration::from_nanos(u64::try_from(leftover).unwrap_or(0));
        true
    }

    pub fn reset(&mut self) {
        self.elapsed = Duration::ZERO;
    }
}

/// Everything a finished mission changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissionReport {
    pub mission_id: String,
    pub city_id: String,
    pub salary_earned: u64,
    pub xp_gained: u64,
    pub data_pass_xp_gained: u32,
    pub card_collected: Option<String>,
    pub data_pass_levels_gained: u32,
    pub promotions: Vec<Promotion>,
    pub achievements_unlocked: Vec<String>,
    pub event: PostMissionEvent,
    pub hacker_message: Option<String>,
}

/// A graded quiz answer and any rank or achievement it triggered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuizReport {
    pub outcome: QuizOutcome,
    pub promotions: Vec<Promotion>,
    pub achievements_unlocked: Vec<String>,
}

/// Outcome of flagging a clue in the running mission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClueProgress {
    pub outcome: ClueOutcome,
    /// Present once the last clue is found and the mission is paid out.
    pub report: Option<MissionReport>,
}

#[derive(Debug, Clone)]
struct LiveProfile {
    id: String,
    state: PlayerState,
}

pub struct GameSession<B> {
    registry: ProfileRegistry<B>,
    catalog: Catalog,
    rng: ChaCha20Rng,
    autosave: AutosaveTimer,
    live: Option<LiveProfile>,
    mission_run: Option<MissionRun>,
    code_red: Option<CodeRedChallenge>,
}

impl<B: StorageBackend> GameSession<B> {
    /// Open a session: migrate a single-slot save if there is one, then
    /// load whichever profile is active.
    ///
    /// # Errors
    ///
    /// Returns an error if migration cannot be persisted.
    pub fn start(
        registry: ProfileRegistry<B>,
        catalog: Catalog,
        seed: u64,
    ) -> Result<Self, SessionError> {
        if let Some(id) = registry.migrate_legacy_save()? {
            log::info!("session starting on migrated profile {id}");
        }
        let live = registry.active_profile().map(|profile| {
            let mut state = profile.game_data;
            state.normalize(&catalog);
            LiveProfile {
                id: profile.id,
                state,
            }
        });
        Ok(Self {
            registry,
            catalog,
            rng: ChaCha20Rng::seed_from_u64(seed),
            autosave: AutosaveTimer::default(),
            live,
            mission_run: None,
            code_red: None,
        })
    }

    #[must_use]
    pub const fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    #[must_use]
    pub const fn registry(&self) -> &ProfileRegistry<B> {
        &self.registry
    }

    #[must_use]
    pub fn active_profile_id(&self) -> Option<&str> {
        self.live.as_ref().map(|live| live.id.as_str())
    }

    #[must_use]
    pub fn state(&self) -> Option<&PlayerState> {
        self.live.as_ref().map(|live| &live.state)
    }

    #[must_use]
    pub const fn mission_run(&self) -> Option<&MissionRun> {
        self.mission_run.as_ref()
    }

    #[must_use]
    pub const fn code_red(&self) -> Option<&CodeRedChallenge> {
        self.code_red.as_ref()
    }

    fn live_mut(&mut self) -> Result<&mut LiveProfile, SessionError> {
        self.live.as_mut().ok_or(SessionError::NoActiveProfile)
    }

    fn state_mut(&mut self) -> Result<&mut PlayerState, SessionError> {
        Ok(&mut self.live_mut()?.state)
    }

    /// Mutate the live state directly; the change is saved on the next checkpoint.
    ///
    /// # Errors
    ///
    /// Returns `NoActiveProfile` if no profile is loaded.
    pub fn with_state_mut<F, T>(&mut self, f: F) -> Result<T, SessionError>
    where
        F: FnOnce(&mut PlayerState) -> T,
    {
        self.state_mut().map(f)
    }

    /// Write the live state to its profile.
    ///
    /// # Errors
    ///
    /// Returns `NoActiveProfile` without a live profile and `Storage` when
    /// the write fails; the in-memory state is kept either way.
    pub fn save(&mut self) -> Result<(), SessionError> {
        let live = self.live.as_ref().ok_or(SessionError::NoActiveProfile)?;
        self.registry.update_profile(&live.id, &live.state)?;
        self.autosave.reset();
        log::debug!("saved profile {}", live.id);
        Ok(())
    }

    /// Create a new profile without switching to it.
    ///
    /// # Errors
    ///
    /// Propagates the registry's validation and storage errors.
    pub fn create_profile(&self, name: &str) -> Result<Profile, SessionError> {
        Ok(self.registry.create_profile(name)?.1)
    }

    /// Save the current profile, then switch to `id`.
    ///
    /// # Errors
    ///
    /// Fails if the current state cannot be saved or `id` does not exist;
    /// the current profile stays live in both cases.
    pub fn select_profile(&mut self, id: &str) -> Result<&PlayerState, SessionError> {
        if self.live.is_some() {
            self.save()?;
        }
        let profile = self.registry.set_active_profile(id)?;
        let mut state = profile.game_data;
        state.normalize(&self.catalog);
        self.mission_run = None;
        self.code_red = None;
        self.autosave.reset();
        let live = self.live.insert(LiveProfile {
            id: profile.id,
            state,
        });
        Ok(&live.state)
    }

    /// Delete a profile; unloads it if it was the live one.
    ///
    /// # Errors
    ///
    /// Propagates `NotFound` and storage failures from the registry.
    pub fn delete_profile(&mut self, id: &str) -> Result<(), SessionError> {
        self.registry.delete_profile(id)?;
        if self.active_profile_id() == Some(id) {
            self.live = None;
            self.mission_run = None;
            self.code_red = None;
        }
        Ok(())
    }

    /// Begin clue hunting in a mission.
    ///
    /// # Errors
    ///
    /// Returns `UnknownMission`, `CityLocked` or `NoActiveProfile`.
    pub fn start_mission(&mut self, mission_id: &str) -> Result<&MissionRun, SessionError> {
        let live = self.live.as_ref().ok_or(SessionError::NoActiveProfile)?;
        let mission = self
            .catalog
            .mission(mission_id)
            .ok_or_else(|| SessionError::UnknownMission(mission_id.to_string()))?;
        self.ensure_city_open(&live.state, &mission.city_id)?;
        let run = MissionRun::start(mission, &live.state, &self.catalog);
        Ok(self.mission_run.insert(run))
    }

    /// Flag a clue in the running mission, paying out when it is solved.
    ///
    /// # Errors
    ///
    /// Returns `NoMissionRun` when no mission was started.
    pub fn inspect_clue(&mut self, target: &str) -> Result<ClueProgress, SessionError> {
        let run = self.mission_run.as_mut().ok_or(SessionError::NoMissionRun)?;
        let outcome = run.inspect(target);
        let status = run.status();
        let mission_id = run.mission_id().to_string();
        let report = match status {
            MissionStatus::Active => None,
            MissionStatus::Breached => {
                self.mission_run = None;
                None
            }
            MissionStatus::Solved => Some(self.complete_mission(&mission_id)?),
        };
        Ok(ClueProgress { outcome, report })
    }

    fn ensure_city_open(&self, state: &PlayerState, city_id: &str) -> Result<(), SessionError> {
        let open = self
            .catalog
            .city(city_id)
            .is_some_and(|city| city_unlocked(state, city, &self.catalog.ranks));
        if open {
            Ok(())
        } else {
            Err(SessionError::CityLocked(city_id.to_string()))
        }
    }

    /// Pay out a mission and run every follow-up rule.
    ///
    /// # Errors
    ///
    /// Returns `NoActiveProfile`, `UnknownMission` or `CityLocked`; nothing
    /// changes in those cases.
    pub fn complete_mission(&mut self, mission_id: &str) -> Result<MissionReport, SessionError> {
        let catalog = &self.catalog;
        let mission = catalog
            .mission(mission_id)
            .ok_or_else(|| SessionError::UnknownMission(mission_id.to_string()))?;
        let live = self.live.as_ref().ok_or(SessionError::NoActiveProfile)?;
        self.ensure_city_open(&live.state, &mission.city_id)?;

        let live = self.live.as_mut().ok_or(SessionError::NoActiveProfile)?;
        let state = &mut live.state;
        let card_collected = mission
            .reward
            .card
            .clone()
            .filter(|card| !state.inventory.cyber_cards.contains(card));
        let salary_earned = apply_mission_reward(state, &mission.reward, &mission.city_id, catalog);
        let data_pass_levels_gained =
            settle_data_pass_levels(state, catalog.data_pass.xp_per_level);
        let promotions = promote_until_settled(state, &catalog.ranks, &catalog.cities);
        let achievements_unlocked =
            evaluate_achievements(state, &catalog.achievements, &catalog.ranks);

        let event = roll_post_mission_event(&mut self.rng);
        let hacker_message = match event {
            PostMissionEvent::HackerMessage => {
                random_choice(&catalog.hacker_group.messages, &mut self.rng).cloned()
            }
            PostMissionEvent::CodeRed => {
                self.code_red = Some(CodeRedChallenge::new(state.data_pass.level, &mut self.rng));
                None
            }
            PostMissionEvent::Quiet => None,
        };
        if self
            .mission_run
            .as_ref()
            .is_some_and(|run| run.mission_id() == mission_id)
        {
            self.mission_run = None;
        }

        log::info!("{} completed {mission_id} (+{salary_earned})", state.name);
        Ok(MissionReport {
            mission_id: mission.id.clone(),
            city_id: mission.city_id.clone(),
            salary_earned,
            xp_gained: mission.reward.xp,
            data_pass_xp_gained: mission.reward.data_pass_xp,
            card_collected,
            data_pass_levels_gained,
            promotions,
            achievements_unlocked,
            event,
            hacker_message,
        })
    }

    /// Claim a data pass slot and save immediately.
    ///
    /// # Errors
    ///
    /// Returns the claim rejection, or `Storage` if the checkpoint fails
    /// (the claim stays applied in memory).
    pub fn claim_reward(&mut self, key: RewardKey) -> Result<AppliedReward, SessionError> {
        let live = self.live.as_mut().ok_or(SessionError::NoActiveProfile)?;
        let applied = claim_data_pass_reward(&mut live.state, key, &self.catalog)?;
        self.save()?;
        Ok(applied)
    }

    /// Buy the premium pass and save immediately.
    ///
    /// # Errors
    ///
    /// Returns the purchase rejection or a checkpoint failure.
    pub fn buy_premium_pass(&mut self) -> Result<(), SessionError> {
        buy_premium_pass(self.state_mut()?)?;
        self.save()
    }

    /// # Errors
    ///
    /// Returns the purchase rejection or `NoActiveProfile`.
    pub fn purchase_tool_upgrade(&mut self, tool_id: &str) -> Result<u32, SessionError> {
        let live = self.live.as_mut().ok_or(SessionError::NoActiveProfile)?;
        Ok(purchase_tool_upgrade(&mut live.state, tool_id, &self.catalog)?)
    }

    /// # Errors
    ///
    /// Returns the purchase rejection or `NoActiveProfile`.
    pub fn purchase_theme(&mut self, item_id: &str) -> Result<ThemePurchase, SessionError> {
        let live = self.live.as_mut().ok_or(SessionError::NoActiveProfile)?;
        Ok(purchase_theme(&mut live.state, item_id, &self.catalog.shop)?)
    }

    /// Grade a card quiz. A newly earned license can complete a rank's
    /// requirements, so promotions and achievements are settled right away.
    ///
    /// # Errors
    ///
    /// Returns the quiz rejection or `NoActiveProfile`.
    pub fn submit_quiz_answer(
        &mut self,
        card_id: &str,
        answer: &str,
    ) -> Result<QuizReport, SessionError> {
        let catalog = &self.catalog;
        let live = self.live.as_mut().ok_or(SessionError::NoActiveProfile)?;
        let state = &mut live.state;
        let outcome = submit_quiz_answer(state, card_id, answer, &catalog.cards)?;

        let mut report = QuizReport {
            outcome,
            promotions: Vec::new(),
            achievements_unlocked: Vec::new(),
        };
        if matches!(report.outcome, QuizOutcome::Passed { newly_earned: true, .. }) {
            report.promotions = promote_until_settled(state, &catalog.ranks, &catalog.cities);
            report.achievements_unlocked =
                evaluate_achievements(state, &catalog.achievements, &catalog.ranks);
        }
        Ok(report)
    }

    /// Pay the daily login bonus for `today` if it is still due.
    ///
    /// # Errors
    ///
    /// Returns `NoActiveProfile` if no profile is loaded.
    pub fn check_daily_login(&mut self, today: NaiveDate) -> Result<Option<u64>, SessionError> {
        Ok(apply_daily_login(self.state_mut()?, today))
    }

    /// Start a Code Red challenge sized by the current data pass level.
    ///
    /// # Errors
    ///
    /// Returns `NoActiveProfile` if no profile is loaded.
    pub fn start_code_red(&mut self) -> Result<&CodeRedChallenge, SessionError> {
        let level = self
            .state()
            .ok_or(SessionError::NoActiveProfile)?
            .data_pass
            .level;
        let challenge = CodeRedChallenge::new(level, &mut self.rng);
        Ok(self.code_red.insert(challenge))
    }

    /// # Errors
    ///
    /// Returns `NoCodeRed` when no challenge is running.
    pub fn press_code_red_node(&mut self, node: u8) -> Result<CodeRedStatus, SessionError> {
        let challenge = self.code_red.as_mut().ok_or(SessionError::NoCodeRed)?;
        Ok(challenge.press(node))
    }

    /// Count one second off the Code Red timer.
    ///
    /// # Errors
    ///
    /// Returns `NoCodeRed` when no challenge is running.
    pub fn tick_code_red(&mut self) -> Result<CodeRedStatus, SessionError> {
        let challenge = self.code_red.as_mut().ok_or(SessionError::NoCodeRed)?;
        Ok(challenge.tick())
    }

    /// Close out a finished challenge, paying the reward on success.
    ///
    /// # Errors
    ///
    /// Returns `NoCodeRed`, `CodeRedUnfinished` or `NoActiveProfile`.
    pub fn resolve_code_red(&mut self) -> Result<Option<CodeRedReward>, SessionError> {
        let challenge = self.code_red.as_ref().ok_or(SessionError::NoCodeRed)?;
        if !challenge.status().is_finished() {
            return Err(SessionError::CodeRedUnfinished);
        }
        let xp_per_level = self.catalog.data_pass.xp_per_level;
        let live = self.live.as_mut().ok_or(SessionError::NoActiveProfile)?;
        let reward = award_code_red(&mut live.state, challenge, xp_per_level);
        self.code_red = None;
        Ok(reward)
    }

    /// A taunt from the hacker group.
    pub fn hacker_message(&mut self) -> Option<&str> {
        random_choice(&self.catalog.hacker_group.messages, &mut self.rng).map(String::as_str)
    }

    /// Advance the autosave clock, saving when the interval elapses.
    /// Returns whether a save happened.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the autosave write fails.
    pub fn tick(&mut self, elapsed: Duration) -> Result<bool, SessionError> {
        if !self.autosave.advance(elapsed) || self.live.is_none() {
            return Ok(false);
        }
        self.save()?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn autosave_fires_on_interval() {
        let mut timer = AutosaveTimer::new(Duration::from_secs(30));
        assert!(!timer.advance(Duration::from_secs(29)));
        assert!(timer.advance(Duration::from_secs(1)));
        assert!(!timer.advance(Duration::from_secs(10)));
        assert!(timer.advance(Duration::from_secs(75)));
        // 85s total since the last fire leaves 25s banked.
        assert!(timer.advance(Duration::from_secs(5)));
    }

    #[test]
    fn autosave_reset_clears_progress() {
        let mut timer = AutosaveTimer::default();
        timer.advance(Duration::from_secs(29));
        timer.reset();
        assert!(!timer.advance(Duration::from_secs(29)));
    }

    #[test]
    fn profile_storage_errors_become_session_storage_errors() {
        let err: SessionError =
            ProfileError::Storage(StorageError::Unavailable("offline".to_string())).into();
        assert!(matches!(err, SessionError::Storage(_)));
        let err: SessionError = ProfileError::EmptyName.into();
        assert!(matches!(err, SessionError::Profile(ProfileError::EmptyName)));
    }
}
