//! Condorcet counting with the beatpath (Schulze) method.
//!
//! The pairwise counts are sums over ballots, so the order in which the
//! votes are added does not matter.

use log::{debug, warn};
use snafu::ensure;
use std::collections::{BTreeMap, HashMap};

use crate::codec::UNRANKED;
use crate::config::*;
use crate::result::{SchulzeResult, Tie};

#[derive(Debug, Clone)]
pub struct SchulzeTallier {
    options: Vec<CandidateId>,
    index: HashMap<CandidateId, usize>,
    allow_unranked: bool,
    // pref[a][b]: number of ballots ranking a above b.
    pref: Vec<Vec<u64>>,
}

impl SchulzeTallier {
    pub fn new(question: &Question, allow_unranked: bool) -> SchulzeTallier {
        let n = question.options.len();
        SchulzeTallier {
            options: question.options.clone(),
            index: question
                .options
                .iter()
                .enumerate()
                .map(|(idx, cid)| (*cid, idx))
                .collect(),
            allow_unranked,
            pref: vec![vec![0; n]; n],
        }
    }

    pub fn add_vote(&mut self, scores: &QuestionScores) -> Result<(), ScoreError> {
        let ranks = ballot_ranks(scores, &self.index, self.allow_unranked)?;
        let n = self.options.len();
        for a in 0..n {
            for b in 0..n {
                if a != b && ranks[a] < ranks[b] {
                    self.pref[a][b] += 1;
                }
            }
        }
        Ok(())
    }

    pub fn finish(self) -> SchulzeResult {
        let n = self.options.len();
        let margins: Vec<Vec<i64>> = (0..n)
            .map(|a| {
                (0..n)
                    .map(|b| self.pref[a][b] as i64 - self.pref[b][a] as i64)
                    .collect()
            })
            .collect();
        let paths = strongest_paths(&margins);
        let beats = |a: usize, b: usize| paths[a][b] > paths[b][a];

        // Peel off the candidates that nobody left beats, tier by tier.
        // The beatpath relation is transitive, so every tier is non empty.
        let mut remaining: Vec<usize> = (0..n).collect();
        let mut tiers: Vec<Vec<usize>> = Vec::new();
        while !remaining.is_empty() {
            let tier: Vec<usize> = remaining
                .iter()
                .cloned()
                .filter(|a| !remaining.iter().any(|b| beats(*b, *a)))
                .collect();
            if tier.is_empty() {
                // Cannot happen with a transitive relation, keep the rest together.
                warn!("schulze: no unbeaten candidate among {:?}", remaining);
                tiers.push(remaining.clone());
                break;
            }
            remaining.retain(|c| !tier.contains(c));
            tiers.push(tier);
        }

        let ids = |idxs: &[usize]| -> Vec<CandidateId> {
            idxs.iter().map(|idx| self.options[*idx]).collect()
        };
        let ranking: Vec<Vec<CandidateId>> = tiers.iter().map(|t| ids(t.as_slice())).collect();
        let winners: Vec<CandidateId> = ranking.first().cloned().unwrap_or_default();
        let tie = if winners.len() > 1 {
            warn!("schulze: cyclic tie between {:?}", winners);
            Some(Tie {
                round: None,
                candidates: winners.clone(),
                seats: 1,
            })
        } else {
            None
        };
        debug!("schulze: ranking {:?}", ranking);

        let matrix = |m: &Vec<Vec<i64>>| -> BTreeMap<CandidateId, BTreeMap<CandidateId, i64>> {
            pairs_by_id(&self.options, |a, b| m[a][b])
        };
        SchulzeResult {
            preferences: pairs_by_id(&self.options, |a, b| self.pref[a][b]),
            margins: matrix(&margins),
            strongest_paths: matrix(&paths),
            winners: if tie.is_some() { vec![] } else { winners },
            ranking,
            tie,
        }
    }
}

/// The rank of every option of the question on one ballot, by option index.
/// Options missing from the ballot are unranked.
pub(crate) fn ballot_ranks(
    scores: &QuestionScores,
    index: &HashMap<CandidateId, usize>,
    allow_unranked: bool,
) -> Result<Vec<u32>, ScoreError> {
    let mut ranks = vec![UNRANKED; index.len()];
    for (option, rank) in scores.iter() {
        let idx = index
            .get(option)
            .copied()
            .ok_or(ScoreError::UnknownOption { option: *option })?;
        ensure!(
            (1..=UNRANKED).contains(rank),
            InvalidValueSnafu {
                option: *option,
                value: *rank
            }
        );
        ranks[idx] = *rank;
    }
    if !allow_unranked {
        // Report the first option, in question order, that has no rank.
        let mut unranked: Vec<(usize, CandidateId)> = index
            .iter()
            .filter(|(_, idx)| ranks[**idx] == UNRANKED)
            .map(|(cid, idx)| (*idx, *cid))
            .collect();
        unranked.sort();
        if let Some((_, option)) = unranked.first() {
            return UnrankedNotPermittedSnafu { option: *option }.fail();
        }
    }
    Ok(ranks)
}

/// Floyd–Warshall style widest paths over the positive margins.
fn strongest_paths(margins: &[Vec<i64>]) -> Vec<Vec<i64>> {
    let n = margins.len();
    let mut p: Vec<Vec<i64>> = margins
        .iter()
        .map(|row| row.iter().map(|d| if *d > 0 { *d } else { 0 }).collect())
        .collect();
    for i in 0..n {
        for j in 0..n {
            if i == j {
                continue;
            }
            for k in 0..n {
                if k == i || k == j {
                    continue;
                }
                let through = p[j][i].min(p[i][k]);
                if through > p[j][k] {
                    p[j][k] = through;
                }
            }
        }
    }
    p
}

fn pairs_by_id<T: Copy>(
    options: &[CandidateId],
    value: impl Fn(usize, usize) -> T,
) -> BTreeMap<CandidateId, BTreeMap<CandidateId, T>> {
    options
        .iter()
        .enumerate()
        .map(|(a, ca)| {
            let row = options
                .iter()
                .enumerate()
                .filter(|(b, _)| *b != a)
                .map(|(b, cb)| (*cb, value(a, b)))
                .collect();
            (*ca, row)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: CandidateId = CandidateId(1);
    const B: CandidateId = CandidateId(2);
    const C: CandidateId = CandidateId(3);

    fn question() -> Question {
        Question {
            id: QuestionId(1),
            options: vec![A, B, C],
            seats: 1,
            tally_method: Some("schulze".to_string()),
        }
    }

    fn add(t: &mut SchulzeTallier, count: usize, order: &[CandidateId]) {
        let scores: QuestionScores = order
            .iter()
            .enumerate()
            .map(|(idx, cid)| (*cid, idx as u32 + 1))
            .collect();
        for _ in 0..count {
            t.add_vote(&scores).unwrap();
        }
    }

    #[test]
    fn cycle_resolved_by_strongest_paths() {
        // A>B by 3, B>C by 5, C>A by 1.
        let mut t = SchulzeTallier::new(&question(), true);
        add(&mut t, 4, &[A, B, C]);
        add(&mut t, 3, &[B, C, A]);
        add(&mut t, 2, &[C, A, B]);
        let res = t.finish();

        assert_eq!(res.preferences[&A][&B], 6);
        assert_eq!(res.preferences[&B][&A], 3);
        assert_eq!(res.margins[&A][&B], 3);
        assert_eq!(res.margins[&B][&C], 5);
        assert_eq!(res.margins[&C][&A], 1);
        assert_eq!(res.margins[&A][&C], -1);

        assert_eq!(res.strongest_paths[&A][&B], 3);
        assert_eq!(res.strongest_paths[&A][&C], 3);
        assert_eq!(res.strongest_paths[&B][&C], 5);
        assert_eq!(res.strongest_paths[&B][&A], 1);
        assert_eq!(res.strongest_paths[&C][&A], 1);
        assert_eq!(res.strongest_paths[&C][&B], 1);

        assert_eq!(res.winners, vec![A]);
        assert_eq!(res.ranking, vec![vec![A], vec![B], vec![C]]);
        assert_eq!(res.tie, None);
    }

    #[test]
    fn perfect_cycle_is_a_tie() {
        let mut t = SchulzeTallier::new(&question(), true);
        add(&mut t, 3, &[A, B, C]);
        add(&mut t, 3, &[B, C, A]);
        add(&mut t, 3, &[C, A, B]);
        let res = t.finish();
        assert!(res.winners.is_empty());
        assert_eq!(res.ranking, vec![vec![A, B, C]]);
        assert_eq!(
            res.tie,
            Some(Tie {
                round: None,
                candidates: vec![A, B, C],
                seats: 1
            })
        );
    }

    #[test]
    fn unranked_is_least_preferred_and_equal_ranks_count_for_neither() {
        let mut t = SchulzeTallier::new(&question(), true);
        // A first, B and C unranked.
        t.add_vote(&[(A, 1), (B, UNRANKED)].into_iter().collect())
            .unwrap();
        // B and C share first place.
        t.add_vote(&[(A, 2), (B, 1), (C, 1)].into_iter().collect())
            .unwrap();
        let res = t.finish();
        assert_eq!(res.preferences[&A][&B], 1);
        assert_eq!(res.preferences[&A][&C], 1);
        assert_eq!(res.preferences[&B][&C], 0);
        assert_eq!(res.preferences[&C][&B], 0);
        assert_eq!(res.preferences[&B][&A], 1);
        assert_eq!(res.preferences[&C][&A], 1);
    }

    #[test]
    fn unranked_options_can_be_forbidden() {
        let mut t = SchulzeTallier::new(&question(), false);
        let partial: QuestionScores = [(A, 1), (B, 2)].into_iter().collect();
        assert_eq!(
            t.add_vote(&partial),
            Err(ScoreError::UnrankedNotPermitted { option: C })
        );
        let full: QuestionScores = [(A, 1), (B, 2), (C, 3)].into_iter().collect();
        assert_eq!(t.add_vote(&full), Ok(()));
    }

    #[test]
    fn invalid_ranks() {
        let mut t = SchulzeTallier::new(&question(), true);
        let zero: QuestionScores = [(A, 0)].into_iter().collect();
        assert!(matches!(
            t.add_vote(&zero),
            Err(ScoreError::InvalidValue { value: 0, .. })
        ));
        let unknown: QuestionScores = [(CandidateId(42), 1)].into_iter().collect();
        assert!(matches!(
            t.add_vote(&unknown),
            Err(ScoreError::UnknownOption { .. })
        ));
    }
}
