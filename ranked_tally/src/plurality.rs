use log::debug;
use snafu::ensure;
use std::cmp::Reverse;
use std::collections::BTreeMap;

use crate::config::*;
use crate::result::{PluralityResult, Tie};

/// Counts the options marked with 1. Approval ballots go through the same
/// counter, with possibly several marks per ballot.
#[derive(Debug, Clone)]
pub struct PluralityTallier {
    options: Vec<CandidateId>,
    seats: u32,
    totals: BTreeMap<CandidateId, u64>,
}

impl PluralityTallier {
    pub fn new(question: &Question) -> PluralityTallier {
        PluralityTallier {
            options: question.options.clone(),
            seats: question.seats,
            totals: question.options.iter().map(|c| (*c, 0)).collect(),
        }
    }

    pub fn add_vote(&mut self, scores: &QuestionScores) -> Result<(), ScoreError> {
        for (option, value) in scores.iter() {
            ensure!(
                self.totals.contains_key(option),
                UnknownOptionSnafu { option: *option }
            );
            ensure!(
                *value <= 1,
                InvalidValueSnafu {
                    option: *option,
                    value: *value
                }
            );
        }
        for (option, value) in scores.iter() {
            if *value == 1 {
                if let Some(count) = self.totals.get_mut(option) {
                    *count += 1;
                }
            }
        }
        Ok(())
    }

    pub fn finish(self) -> PluralityResult {
        let totals = self.totals;
        let count = |cid: &CandidateId| totals.get(cid).copied().unwrap_or(0);

        // Stable sort: equal counts keep the question order.
        let mut ranking = self.options.clone();
        ranking.sort_by_key(|cid| Reverse(count(cid)));

        let seats = (self.seats as usize).min(ranking.len());
        let (winners, tie) = match seats.checked_sub(1).and_then(|i| ranking.get(i)) {
            None => (vec![], None),
            Some(last_seat) => {
                let cutoff = count(last_seat);
                let above: Vec<CandidateId> = ranking
                    .iter()
                    .filter(|cid| count(*cid) > cutoff)
                    .cloned()
                    .collect();
                let at_cutoff: Vec<CandidateId> = ranking
                    .iter()
                    .filter(|cid| count(*cid) == cutoff)
                    .cloned()
                    .collect();
                if above.len() + at_cutoff.len() <= seats {
                    let mut winners = above;
                    winners.extend(at_cutoff);
                    (winners, None)
                } else {
                    let contested = (seats - above.len()) as u32;
                    debug!(
                        "plurality: {:?} tied with {} votes for {} seat(s)",
                        at_cutoff, cutoff, contested
                    );
                    let tie = Tie {
                        round: None,
                        candidates: at_cutoff,
                        seats: contested,
                    };
                    (above, Some(tie))
                }
            }
        };
        debug!("plurality: ranking {:?}, winners {:?}", ranking, winners);

        PluralityResult {
            totals,
            ranking,
            winners,
            tie,
        }
    }
}
