use crate::config::*;
use crate::plurality::PluralityTallier;
use crate::result::QuestionResult;
use crate::schulze::SchulzeTallier;
use crate::stv::StvTallier;

/// Accumulates the votes of one question with the counting method of that
/// question.
#[derive(Debug, Clone)]
pub enum QuestionTallier {
    Plurality(PluralityTallier),
    Schulze(SchulzeTallier),
    Stv(StvTallier),
}

impl QuestionTallier {
    pub fn new(
        question: &Question,
        method: TallyMethod,
        allow_unranked: bool,
        rules: &StvRules,
    ) -> QuestionTallier {
        match method {
            TallyMethod::Plurality => QuestionTallier::Plurality(PluralityTallier::new(question)),
            TallyMethod::Schulze => {
                QuestionTallier::Schulze(SchulzeTallier::new(question, allow_unranked))
            }
            TallyMethod::Stv => {
                QuestionTallier::Stv(StvTallier::new(question, allow_unranked, rules))
            }
        }
    }

    pub fn method(&self) -> TallyMethod {
        match self {
            QuestionTallier::Plurality(_) => TallyMethod::Plurality,
            QuestionTallier::Schulze(_) => TallyMethod::Schulze,
            QuestionTallier::Stv(_) => TallyMethod::Stv,
        }
    }

    /// Counts the scores of one ballot. A rejected ballot leaves the
    /// tallier untouched.
    pub fn add_vote(&mut self, scores: &QuestionScores) -> Result<(), ScoreError> {
        match self {
            QuestionTallier::Plurality(t) => t.add_vote(scores),
            QuestionTallier::Schulze(t) => t.add_vote(scores),
            QuestionTallier::Stv(t) => t.add_vote(scores),
        }
    }

    pub fn finish(self) -> QuestionResult {
        match self {
            QuestionTallier::Plurality(t) => QuestionResult::Plurality(t.finish()),
            QuestionTallier::Schulze(t) => QuestionResult::Schulze(t.finish()),
            QuestionTallier::Stv(t) => QuestionResult::Stv(t.finish()),
        }
    }
}
