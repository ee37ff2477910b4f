//! License quizzes attached to cyber cards.
use serde::Serialize;
use thiserror::Error;

use crate::catalog::CardDef;
use crate::state::PlayerState;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuizError {
    #[error("unknown cyber card {0}")]
    UnknownCard(String),
    #[error("cyber card {0} has not been collected")]
    CardNotOwned(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum QuizOutcome {
    Passed {
        license: String,
        /// False when the license was already held.
        newly_earned: bool,
    },
    Failed,
}

/// Grade an answer to a card's quiz, awarding its license on success.
///
/// # Errors
///
/// Returns `UnknownCard` if `card_id` is not in `cards` and `CardNotOwned`
/// if the player has not collected it.
pub fn submit_quiz_answer(
    state: &mut PlayerState,
    card_id: &str,
    answer: &str,
    cards: &[CardDef],
) -> Result<QuizOutcome, QuizError> {
    let card = cards
        .iter()
        .find(|card| card.id == card_id)
        .ok_or_else(|| QuizError::UnknownCard(card_id.to_string()))?;
    if !state.inventory.cyber_cards.contains(card_id) {
        return Err(QuizError::CardNotOwned(card_id.to_string()));
    }

    if answer.trim() != card.quiz.answer {
        log::debug!("{} failed the {card_id} quiz", state.name);
        return Ok(QuizOutcome::Failed);
    }
    let newly_earned = state.inventory.licenses.insert(card.license.clone());
    if newly_earned {
        log::info!("{} earned license {}", state.name, card.license);
    }
    Ok(QuizOutcome::Passed {
        license: card.license.clone(),
        newly_earned,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;

    #[test]
    fn correct_answer_awards_license_once() {
        let catalog = Catalog::load_default().unwrap();
        let mut state = PlayerState::new("Student");
        state.inventory.cyber_cards.insert("phishing101".to_string());

        let first = submit_quiz_answer(&mut state, "phishing101", "False", &catalog.cards).unwrap();
        assert_eq!(
            first,
            QuizOutcome::Passed {
                license: "Phishing Basics".to_string(),
                newly_earned: true
            }
        );
        let second =
            submit_quiz_answer(&mut state, "phishing101", "False", &catalog.cards).unwrap();
        assert!(matches!(second, QuizOutcome::Passed { newly_earned: false, .. }));
        assert_eq!(state.license_count(), 1);
    }

    #[test]
    fn wrong_answer_changes_nothing() {
        let catalog = Catalog::load_default().unwrap();
        let mut state = PlayerState::new("Guesser");
        state.inventory.cyber_cards.insert("phishing101".to_string());
        let before = state.clone();
        assert_eq!(
            submit_quiz_answer(&mut state, "phishing101", "True", &catalog.cards),
            Ok(QuizOutcome::Failed)
        );
        assert_eq!(state, before);
    }

    #[test]
    fn quiz_requires_known_owned_card() {
        let catalog = Catalog::load_default().unwrap();
        let mut state = PlayerState::new("Skipper");
        assert_eq!(
            submit_quiz_answer(&mut state, "nope", "False", &catalog.cards),
            Err(QuizError::UnknownCard("nope".to_string()))
        );
        assert_eq!(
            submit_quiz_answer(&mut state, "malware101", "False", &catalog.cards),
            Err(QuizError::CardNotOwned("malware101".to_string()))
        );
    }
}
