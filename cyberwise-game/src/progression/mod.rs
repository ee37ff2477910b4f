//! Progression rules: the deterministic transitions applied to a
//! [`PlayerState`] after missions, quizzes and logins.
//!
//! Every function validates before it mutates, so a rejected call leaves
//! the state exactly as it was.
pub mod data_pass;
pub mod licenses;

use chrono::NaiveDate;
use serde::Serialize;

use crate::catalog::{
    AchievementCondition, AchievementDef, Catalog, CityDef, MissionReward, RankLadder,
};
use crate::constants::DAILY_LOGIN_BONUS;
use crate::state::PlayerState;

pub use data_pass::{AppliedReward, ClaimError, claim_data_pass_reward, settle_data_pass_levels};
pub use licenses::{QuizError, QuizOutcome, submit_quiz_answer};

/// A single step up the rank ladder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Promotion {
    pub from: String,
    pub to: String,
    /// Tool handed out by the city this rank opens, when it was not owned yet.
    pub tool_granted: Option<String>,
}

/// Scale `amount` by `1 + pct/100`, rounding up.
#[must_use]
pub fn apply_bonus_pct(amount: u64, pct: u32) -> u64 {
    if pct == 0 {
        return amount;
    }
    let scaled = u128::from(amount) * u128::from(100 + pct);
    u64::try_from(scaled.div_ceil(100)).unwrap_or(u64::MAX)
}

/// Salary a mission reward is worth in `city_id` for this player.
///
/// Achievement bonuses apply first in definition order, then tool bonuses
/// in catalog order; each step rounds up before the next one.
#[must_use]
pub fn mission_salary(state: &PlayerState, base: u64, city_id: &str, catalog: &Catalog) -> u64 {
    let achievement_bonuses = catalog
        .achievements
        .iter()
        .filter(|ach| state.has_achievement(&ach.id))
        .filter_map(|ach| ach.bonus.as_ref())
        .filter(|bonus| bonus.city == city_id)
        .map(|bonus| bonus.bonus_pct);
    let tool_bonuses = catalog
        .tools
        .iter()
        .filter_map(|tool| {
            let bonus = tool.bonus.as_ref()?;
            let level = state.inventory.tool_level(&tool.id)?;
            (bonus.city == city_id && level >= bonus.min_level).then_some(bonus.bonus_pct)
        });

    achievement_bonuses
        .chain(tool_bonuses)
        .fold(base, apply_bonus_pct)
}

/// Credit a completed mission. Returns the salary actually earned.
pub fn apply_mission_reward(
    state: &mut PlayerState,
    reward: &MissionReward,
    city_id: &str,
    catalog: &Catalog,
) -> u64 {
    let earned = mission_salary(state, reward.salary, city_id, catalog);

    state.salary = state.salary.saturating_add(earned);
    state.xp = state.xp.saturating_add(reward.xp);
    state.data_pass.xp = state.data_pass.xp.saturating_add(reward.data_pass_xp);
    state.missions_completed.total += 1;
    *state
        .missions_completed
        .by_city
        .entry(city_id.to_string())
        .or_insert(0) += 1;
    if let Some(card) = &reward.card
        && state.inventory.cyber_cards.insert(card.clone())
    {
        log::debug!("{} collected card {card}", state.name);
    }

    log::debug!(
        "mission in {city_id}: +{earned} salary, +{} xp, +{} pass xp",
        reward.xp,
        reward.data_pass_xp
    );
    earned
}

/// Promote at most one rung if the next rank's requirements are met.
pub fn evaluate_rank_up(
    state: &mut PlayerState,
    ladder: &RankLadder,
    cities: &[CityDef],
) -> Option<Promotion> {
    let next = ladder.next_after(&state.rank)?;
    if state.xp < next.xp_required || state.license_count() < next.licenses_required {
        return None;
    }

    let from = std::mem::replace(&mut state.rank, next.name.clone());
    let tool_granted = cities
        .iter()
        .find(|city| city.rank_required.as_deref() == Some(next.name.as_str()))
        .and_then(|city| city.tool_unlock.as_deref())
        .filter(|tool| state.inventory.grant_tool(tool))
        .map(str::to_string);

    log::info!("{} promoted from {from} to {}", state.name, next.name);
    Some(Promotion {
        from,
        to: next.name.clone(),
        tool_granted,
    })
}

/// Apply [`evaluate_rank_up`] until no further promotion is possible.
pub fn promote_until_settled(
    state: &mut PlayerState,
    ladder: &RankLadder,
    cities: &[CityDef],
) -> Vec<Promotion> {
    std::iter::from_fn(|| evaluate_rank_up(state, ladder, cities)).collect()
}

fn condition_met(
    condition: &AchievementCondition,
    state: &PlayerState,
    ladder: &RankLadder,
) -> bool {
    match condition {
        AchievementCondition::CityMissions { city, threshold } => {
            state.missions_completed.in_city(city) >= *threshold
        }
        AchievementCondition::RankAtLeast { rank } => {
            match (ladder.index_of(&state.rank), ladder.index_of(rank)) {
                (Some(current), Some(required)) => current >= required,
                _ => false,
            }
        }
        AchievementCondition::TotalMissions { threshold } => {
            state.missions_completed.total >= *threshold
        }
        AchievementCondition::LicenseCount { threshold } => state.license_count() >= *threshold,
    }
}

/// Unlock every achievement whose condition now holds. Returns the new ids.
///
/// Conditions are checked against the state as it was before this pass.
pub fn evaluate_achievements(
    state: &mut PlayerState,
    defs: &[AchievementDef],
    ladder: &RankLadder,
) -> Vec<String> {
    let unlocked: Vec<String> = defs
        .iter()
        .filter(|def| !state.has_achievement(&def.id))
        .filter(|def| condition_met(&def.condition, state, ladder))
        .map(|def| def.id.clone())
        .collect();

    for id in &unlocked {
        log::info!("{} unlocked achievement {id}", state.name);
        state.achievements.unlocked.insert(id.clone());
    }
    unlocked
}

/// Pay the daily login bonus if it has not been paid on `today`.
pub fn apply_daily_login(state: &mut PlayerState, today: NaiveDate) -> Option<u64> {
    if state.last_login_date == Some(today) {
        return None;
    }
    state.last_login_date = Some(today);
    state.salary = state.salary.saturating_add(DAILY_LOGIN_BONUS);
    Some(DAILY_LOGIN_BONUS)
}

/// Whether the player's rank opens `city`.
#[must_use]
pub fn city_unlocked(state: &PlayerState, city: &CityDef, ladder: &RankLadder) -> bool {
    let Some(required) = &city.rank_required else {
        return true;
    };
    match (ladder.index_of(&state.rank), ladder.index_of(required)) {
        (Some(current), Some(needed)) => current >= needed,
        _ => false,
    }
}

#[must_use]
pub fn unlocked_cities<'a>(state: &PlayerState, catalog: &'a Catalog) -> Vec<&'a CityDef> {
    catalog
        .cities
        .iter()
        .filter(|city| city_unlocked(state, city, &catalog.ranks))
        .collect()
}
