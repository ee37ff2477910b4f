//! Random post-mission events and the Code Red intrusion mini-game.
use rand::Rng;
use serde::Serialize;

use crate::constants::{
    CODE_RED_BASE_SEQUENCE, CODE_RED_CHANCE, CODE_RED_DATA_PASS_XP_REWARD, CODE_RED_NODE_COUNT,
    CODE_RED_SALARY_REWARD, CODE_RED_TIME_LIMIT_SECS, HACKER_MESSAGE_CHANCE,
};
use crate::progression::settle_data_pass_levels;
use crate::state::PlayerState;

/// Uniform pick from `items`; `None` when empty.
pub fn random_choice<'a, T, R>(items: &'a [T], rng: &mut R) -> Option<&'a T>
where
    R: Rng + ?Sized,
{
    if items.is_empty() {
        return None;
    }
    items.get(rng.gen_range(0..items.len()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PostMissionEvent {
    CodeRed,
    HackerMessage,
    Quiet,
}

/// Roll what happens after a mission.
///
/// Two independent draws: Code Red on the first, then a hacker taunt on the
/// second, which puts the taunt at 17.5% overall rather than 25%.
pub fn roll_post_mission_event<R>(rng: &mut R) -> PostMissionEvent
where
    R: Rng + ?Sized,
{
    if rng.r#gen::<f64>() < CODE_RED_CHANCE {
        PostMissionEvent::CodeRed
    } else if rng.r#gen::<f64>() < HACKER_MESSAGE_CHANCE {
        PostMissionEvent::HackerMessage
    } else {
        PostMissionEvent::Quiet
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CodeRedFailure {
    WrongNode,
    Timeout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CodeRedStatus {
    InProgress { entered: usize, remaining_secs: u32 },
    Succeeded,
    Failed { reason: CodeRedFailure },
}

impl CodeRedStatus {
    #[must_use]
    pub const fn is_finished(self) -> bool {
        !matches!(self, Self::InProgress { .. })
    }
}

/// Memory sequence the player must repeat before the countdown runs out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CodeRedChallenge {
    sequence: Vec<u8>,
    entered: usize,
    remaining_secs: u32,
    status: CodeRedStatus,
}

impl CodeRedChallenge {
    /// Longer sequences at higher data pass levels.
    pub fn new<R>(data_pass_level: u32, rng: &mut R) -> Self
    where
        R: Rng + ?Sized,
    {
        let extra = usize::try_from(data_pass_level / 2).unwrap_or(usize::MAX);
        let length = CODE_RED_BASE_SEQUENCE.saturating_add(extra);
        let sequence = (0..length)
            .map(|_| rng.gen_range(0..CODE_RED_NODE_COUNT))
            .collect();
        Self::with_sequence(sequence)
    }

    #[must_use]
    pub fn with_sequence(sequence: Vec<u8>) -> Self {
        Self {
            sequence,
            entered: 0,
            remaining_secs: CODE_RED_TIME_LIMIT_SECS,
            status: CodeRedStatus::InProgress {
                entered: 0,
                remaining_secs: CODE_RED_TIME_LIMIT_SECS,
            },
        }
    }

    #[must_use]
    pub fn sequence(&self) -> &[u8] {
        &self.sequence
    }

    #[must_use]
    pub const fn status(&self) -> CodeRedStatus {
        self.status
    }

    fn in_progress(&self) -> CodeRedStatus {
        CodeRedStatus::InProgress {
            entered: self.entered,
            remaining_secs: self.remaining_secs,
        }
    }

    /// Enter the next node. A wrong node ends the challenge.
    pub fn press(&mut self, node: u8) -> CodeRedStatus {
        if self.status.is_finished() {
            return self.status;
        }
        if self.sequence.get(self.entered) != Some(&node) {
            self.status = CodeRedStatus::Failed {
                reason: CodeRedFailure::WrongNode,
            };
            return self.status;
        }
        self.entered += 1;
        self.status = if self.entered == self.sequence.len() {
            CodeRedStatus::Succeeded
        } else {
            self.in_progress()
        };
        self.status
    }

    /// Advance the countdown by one second.
    pub fn tick(&mut self) -> CodeRedStatus {
        if self.status.is_finished() {
            return self.status;
        }
        self.remaining_secs = self.remaining_secs.saturating_sub(1);
        self.status = if self.remaining_secs == 0 {
            CodeRedStatus::Failed {
                reason: CodeRedFailure::Timeout,
            }
        } else {
            self.in_progress()
        };
        self.status
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CodeRedReward {
    pub salary: u64,
    pub data_pass_xp: u32,
    pub levels_gained: u32,
}

/// Pay out a blocked intrusion. Returns `None` unless the challenge succeeded.
pub fn award_code_red(
    state: &mut PlayerState,
    challenge: &CodeRedChallenge,
    xp_per_level: u32,
) -> Option<CodeRedReward> {
    if challenge.status() != CodeRedStatus::Succeeded {
        return None;
    }
    state.salary = state.salary.saturating_add(CODE_RED_SALARY_REWARD);
    state.data_pass.xp = state.data_pass.xp.saturating_add(CODE_RED_DATA_PASS_XP_REWARD);
    let levels_gained = settle_data_pass_levels(state, xp_per_level);
    log::info!("{} blocked a Code Red intrusion", state.name);
    Some(CodeRedReward {
        salary: CODE_RED_SALARY_REWARD,
        data_pass_xp: CODE_RED_DATA_PASS_XP_REWARD,
        levels_gained,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::mock::StepRng;
    use rand_chacha::ChaCha20Rng;

    #[test]
    fn random_choice_handles_empty_and_single() {
        let mut rng = ChaCha20Rng::seed_from_u64(7);
        let empty: [u8; 0] = [];
        assert!(random_choice(&empty, &mut rng).is_none());
        assert_eq!(random_choice(&["only"], &mut rng), Some(&"only"));
    }

    #[test]
    fn random_choice_reaches_every_item() {
        let mut rng = ChaCha20Rng::seed_from_u64(11);
        let items = [0, 1, 2, 3];
        let mut seen = [false; 4];
        for _ in 0..200 {
            let pick = *random_choice(&items, &mut rng).unwrap();
            seen[pick] = true;
        }
        assert!(seen.iter().all(|hit| *hit));
    }

    #[test]
    fn low_draw_is_code_red() {
        let mut rng = StepRng::new(0, 0);
        assert_eq!(roll_post_mission_event(&mut rng), PostMissionEvent::CodeRed);
    }

    #[test]
    fn high_draws_are_quiet() {
        let mut rng = StepRng::new(u64::MAX, 0);
        assert_eq!(roll_post_mission_event(&mut rng), PostMissionEvent::Quiet);
    }

    #[test]
    fn event_rates_follow_sequential_draws() {
        let mut rng = ChaCha20Rng::seed_from_u64(2024);
        let trials = 20_000_u32;
        let (mut code_red, mut taunt) = (0_u32, 0_u32);
        for _ in 0..trials {
            match roll_post_mission_event(&mut rng) {
                PostMissionEvent::CodeRed => code_red += 1,
                PostMissionEvent::HackerMessage => taunt += 1,
                PostMissionEvent::Quiet => {}
            }
        }
        let rate = |count: u32| f64::from(count) / f64::from(trials);
        assert!((rate(code_red) - 0.30).abs() < 0.02);
        assert!((rate(taunt) - 0.175).abs() < 0.02);
    }

    #[test]
    fn sequence_grows_with_pass_level() {
        let mut rng = ChaCha20Rng::seed_from_u64(3);
        assert_eq!(CodeRedChallenge::new(1, &mut rng).sequence().len(), 3);
        assert_eq!(CodeRedChallenge::new(4, &mut rng).sequence().len(), 5);
        let challenge = CodeRedChallenge::new(9, &mut rng);
        assert_eq!(challenge.sequence().len(), 7);
        assert!(challenge.sequence().iter().all(|node| *node < 9));
    }

    #[test]
    fn correct_sequence_succeeds() {
        let mut challenge = CodeRedChallenge::with_sequence(vec![4, 0, 8]);
        assert_eq!(
            challenge.press(4),
            CodeRedStatus::InProgress {
                entered: 1,
                remaining_secs: 15
            }
        );
        challenge.tick();
        challenge.press(0);
        assert_eq!(challenge.press(8), CodeRedStatus::Succeeded);
        assert_eq!(challenge.tick(), CodeRedStatus::Succeeded);
    }

    #[test]
    fn wrong_node_fails() {
        let mut challenge = CodeRedChallenge::with_sequence(vec![1, 2, 3]);
        challenge.press(1);
        assert_eq!(
            challenge.press(5),
            CodeRedStatus::Failed {
                reason: CodeRedFailure::WrongNode
            }
        );
        assert_eq!(challenge.press(2), challenge.status());
    }

    #[test]
    fn countdown_expires_after_fifteen_ticks() {
        let mut challenge = CodeRedChallenge::with_sequence(vec![1, 2, 3]);
        for _ in 0..14 {
            assert!(!challenge.tick().is_finished());
        }
        assert_eq!(
            challenge.tick(),
            CodeRedStatus::Failed {
                reason: CodeRedFailure::Timeout
            }
        );
    }

    #[test]
    fn only_success_pays() {
        let mut state = PlayerState::new("Defender");
        state.data_pass.xp = 60;
        let mut failed = CodeRedChallenge::with_sequence(vec![1]);
        failed.press(2);
        assert!(award_code_red(&mut state, &failed, 100).is_none());
        assert_eq!(state.salary, 100);

        let mut won = CodeRedChallenge::with_sequence(vec![1]);
        won.press(1);
        let reward = award_code_red(&mut state, &won, 100).unwrap();
        assert_eq!(reward.levels_gained, 1);
        assert_eq!(state.salary, 250);
        assert_eq!(state.data_pass.level, 2);
        assert_eq!(state.data_pass.xp, 10);
    }
}
