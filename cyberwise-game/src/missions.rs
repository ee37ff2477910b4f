//! In-progress mission tracking: which clues have been flagged and how
//! much firewall is left.
use serde::Serialize;

use crate::catalog::{Catalog, MissionDef};
use crate::constants::FIREWALL_MAX_INTEGRITY;
use crate::state::PlayerState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MissionStatus {
    Active,
    Solved,
    Breached,
}

/// Result of flagging one element of the mission content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClueOutcome {
    Found { clue: String, remaining: usize },
    AlreadyFound,
    /// Wrong guess on a mission with no firewall; nothing happens.
    Ignored,
    Miss { damage: u32, integrity: u32 },
    Breached,
    /// The run already ended.
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissionRun {
    mission_id: String,
    clues: Vec<String>,
    found: Vec<String>,
    firewall: Option<u32>,
    damage_per_miss: u32,
    auto_detected: Option<String>,
    status: MissionStatus,
}

impl MissionRun {
    /// Begin a run, applying the player's tool perks.
    #[must_use]
    pub fn start(mission: &MissionDef, state: &PlayerState, catalog: &Catalog) -> Self {
        let reduction = catalog
            .tools
            .iter()
            .filter_map(|tool| {
                let shield = tool.firewall_shield.as_ref()?;
                let level = state.inventory.tool_level(&tool.id)?;
                (level >= shield.min_level).then_some(shield.reduction_pct)
            })
            .max()
            .unwrap_or(0)
            .min(100);
        let damage_per_miss = mission
            .firewall_damage
            .map_or(0, |damage| (damage * (100 - reduction)).div_ceil(100));

        let mut run = Self {
            mission_id: mission.id.clone(),
            clues: mission.clues.clone(),
            found: Vec::new(),
            firewall: mission.firewall_damage.map(|_| FIREWALL_MAX_INTEGRITY),
            damage_per_miss,
            auto_detected: None,
            status: MissionStatus::Active,
        };

        let detects = catalog.tools.iter().any(|tool| {
            tool.auto_detect.as_ref().is_some_and(|detect| {
                detect.city == mission.city_id
                    && state
                        .inventory
                        .tool_level(&tool.id)
                        .is_some_and(|level| level >= detect.min_level)
            })
        });
        if detects && let Some(first) = mission.clues.first() {
            run.auto_detected = Some(first.clone());
            run.inspect(first);
        }
        run
    }

    /// Flag `target` as suspicious.
    pub fn inspect(&mut self, target: &str) -> ClueOutcome {
        if self.status != MissionStatus::Active {
            return ClueOutcome::Closed;
        }
        if self.found.iter().any(|clue| clue == target) {
            return ClueOutcome::AlreadyFound;
        }
        if self.clues.iter().any(|clue| clue == target) {
            self.found.push(target.to_string());
            let remaining = self.clues.len() - self.found.len();
            if remaining == 0 {
                self.status = MissionStatus::Solved;
            }
            return ClueOutcome::Found {
                clue: target.to_string(),
                remaining,
            };
        }

        let Some(integrity) = self.firewall.as_mut() else {
            return ClueOutcome::Ignored;
        };
        *integrity = integrity.saturating_sub(self.damage_per_miss);
        if *integrity == 0 {
            self.status = MissionStatus::Breached;
            log::debug!("firewall breached on {}", self.mission_id);
            return ClueOutcome::Breached;
        }
        ClueOutcome::Miss {
            damage: self.damage_per_miss,
            integrity: *integrity,
        }
    }

    #[must_use]
    pub fn mission_id(&self) -> &str {
        &self.mission_id
    }

    #[must_use]
    pub const fn status(&self) -> MissionStatus {
        self.status
    }

    #[must_use]
    pub fn found(&self) -> &[String] {
        &self.found
    }

    /// `(found, total)` clue counts.
    #[must_use]
    pub fn progress(&self) -> (usize, usize) {
        (self.found.len(), self.clues.len())
    }

    #[must_use]
    pub const fn firewall_integrity(&self) -> Option<u32> {
        self.firewall
    }

    #[must_use]
    pub fn auto_detected(&self) -> Option<&str> {
        self.auto_detected.as_deref()
    }
}
