//! Data pass leveling and reward claims.
use serde::Serialize;
use thiserror::Error;

use crate::catalog::{Catalog, RewardEffect};
use crate::constants::DUPLICATE_CARD_BONUS;
use crate::state::{PlayerState, RewardKey, RewardTrack};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClaimError {
    #[error("no data pass reward at {0}")]
    Invalid(RewardKey),
    #[error("{key} is locked at data pass level {current}")]
    Locked { key: RewardKey, current: u32 },
    #[error("{0} requires the premium pass")]
    PremiumLocked(RewardKey),
    #[error("{0} was already claimed")]
    AlreadyClaimed(RewardKey),
}

/// What a successful claim did to the player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AppliedReward {
    Salary { amount: u64 },
    ToolGranted { tool_id: String },
    ToolUpgraded { tool_id: String, level: u32 },
    /// Tool was already maxed; the claim is still consumed.
    ToolAtMax { tool_id: String },
    CardGranted { card_id: String },
    DuplicateCard { card_id: String, bonus: u64 },
    Cosmetic { id: String },
}

/// Convert banked data pass XP into levels. Returns the number gained.
pub fn settle_data_pass_levels(state: &mut PlayerState, xp_per_level: u32) -> u32 {
    if xp_per_level == 0 {
        return 0;
    }
    let mut gained = 0;
    while state.data_pass.xp >= xp_per_level {
        state.data_pass.xp -= xp_per_level;
        state.data_pass.level += 1;
        gained += 1;
    }
    if gained > 0 {
        log::debug!(
            "{} reached data pass level {}",
            state.name,
            state.data_pass.level
        );
    }
    gained
}

/// Claim one data pass slot.
///
/// # Errors
///
/// Rejects keys with no slot in the ladder, premium slots without the pass,
/// slots above the current level and slots that were already claimed. A
/// rejected claim changes nothing.
pub fn claim_data_pass_reward(
    state: &mut PlayerState,
    key: RewardKey,
    catalog: &Catalog,
) -> Result<AppliedReward, ClaimError> {
    let effect = catalog
        .data_pass
        .reward(key)
        .ok_or(ClaimError::Invalid(key))?;
    if key.track == RewardTrack::Premium && !state.data_pass.is_premium {
        return Err(ClaimError::PremiumLocked(key));
    }
    if state.data_pass.level < key.level {
        return Err(ClaimError::Locked {
            key,
            current: state.data_pass.level,
        });
    }
    if state.has_claimed(key) {
        return Err(ClaimError::AlreadyClaimed(key));
    }

    let applied = apply_effect(state, effect, catalog);
    state.data_pass.claimed_rewards.insert(key);
    log::info!("{} claimed {key}: {applied:?}", state.name);
    Ok(applied)
}

fn apply_effect(
    state: &mut PlayerState,
    effect: &RewardEffect,
    catalog: &Catalog,
) -> AppliedReward {
    match effect {
        RewardEffect::Salary { value } => {
            state.salary = state.salary.saturating_add(*value);
            AppliedReward::Salary { amount: *value }
        }
        RewardEffect::ToolLevel { tool_id } => {
            let max = catalog.tool(tool_id).map_or(1, |def| def.max_level());
            match state.inventory.tool_level(tool_id) {
                None => {
                    state.inventory.grant_tool(tool_id);
                    AppliedReward::ToolGranted {
                        tool_id: tool_id.clone(),
                    }
                }
                Some(level) if level >= max => AppliedReward::ToolAtMax {
                    tool_id: tool_id.clone(),
                },
                Some(level) => {
                    if let Some(owned) = state.inventory.tool_mut(tool_id) {
                        owned.level = level + 1;
                    }
                    AppliedReward::ToolUpgraded {
                        tool_id: tool_id.clone(),
                        level: level + 1,
                    }
                }
            }
        }
        RewardEffect::CyberCard { card_id, .. } => {
            if state.inventory.cyber_cards.insert(card_id.clone()) {
                AppliedReward::CardGranted {
                    card_id: card_id.clone(),
                }
            } else {
                state.salary = state.salary.saturating_add(DUPLICATE_CARD_BONUS);
                AppliedReward::DuplicateCard {
                    card_id: card_id.clone(),
                    bonus: DUPLICATE_CARD_BONUS,
                }
            }
        }
        RewardEffect::Cosmetic { id } => AppliedReward::Cosmetic { id: id.clone() },
    }
}
