//! Single transferable vote, counted with the weighted inclusive Gregory
//! method (WIGM).
//!
//! Every round reports the standings after the action of that round. Round 1
//! only tabulates the first preferences; each later round elects the
//! candidates that reached the quota in the previous standings (transferring
//! their surplus), or eliminates the weakest candidates when nobody did.

use log::{debug, info, warn};
use snafu::ensure;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use crate::codec::UNRANKED;
use crate::config::*;
use crate::result::{Ranking, Round, StvResult, Tie};
use crate::schulze::ballot_ranks;

/// Added to the Droop quota so that a candidate can never tie it exactly.
pub const QUOTA_EPSILON: f64 = 1e-6;

// Totals closer than this are considered equal when looking for the weakest candidates.
const TIE_TOLERANCE: f64 = 1e-9;

/// The continuous Droop quota.
pub fn droop_quota(total_votes: f64, seats: u32) -> f64 {
    total_votes / (seats as f64 + 1.0) + QUOTA_EPSILON
}

#[derive(Debug, Clone)]
pub struct StvTallier {
    options: Vec<CandidateId>,
    index: HashMap<CandidateId, usize>,
    seats: u32,
    allow_unranked: bool,
    rules: StvRules,
    // Identical rankings are stored once, with their number of ballots.
    groups: BTreeMap<Vec<CandidateId>, u64>,
}

impl StvTallier {
    pub fn new(question: &Question, allow_unranked: bool, rules: &StvRules) -> StvTallier {
        StvTallier {
            options: question.options.clone(),
            index: question
                .options
                .iter()
                .enumerate()
                .map(|(idx, cid)| (*cid, idx))
                .collect(),
            seats: question.seats,
            allow_unranked,
            rules: rules.clone(),
            groups: BTreeMap::new(),
        }
    }

    pub fn add_vote(&mut self, scores: &QuestionScores) -> Result<(), ScoreError> {
        let ranks = ballot_ranks(scores, &self.index, self.allow_unranked)?;
        let mut ranked: Vec<(u32, CandidateId)> = self
            .options
            .iter()
            .zip(ranks)
            .filter(|(_, rank)| *rank < UNRANKED)
            .map(|(cid, rank)| (rank, *cid))
            .collect();
        ranked.sort();
        for pair in ranked.windows(2) {
            ensure!(pair[0].0 != pair[1].0, DuplicateRankSnafu { rank: pair[0].0 });
        }
        let ranking: Vec<CandidateId> = ranked.into_iter().map(|(_, cid)| cid).collect();
        *self.groups.entry(ranking).or_insert(0) += 1;
        Ok(())
    }

    pub fn finish(self) -> StvResult {
        info!(
            "stv: counting {} distinct rankings for {} seat(s) among {} candidates, rules: {:?}",
            self.groups.len(),
            self.seats,
            self.options.len(),
            self.rules
        );
        Count::new(&self.options, self.seats, &self.rules, self.ballot_groups()).run()
    }

    fn ballot_groups(&self) -> Vec<BallotGroup> {
        self.groups
            .iter()
            // A ballot that ranks nobody is exhausted before the first round.
            .filter(|(ranking, _)| !ranking.is_empty())
            .map(|(ranking, count)| BallotGroup {
                ranking: ranking.clone(),
                count: *count,
                value: 1.0,
                holder: None,
            })
            .collect()
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
enum CandidateStatus {
    Hopeful,
    Elected,
    Eliminated,
}

/// Identical ballots, counted together.
#[derive(PartialEq, Debug, Clone)]
struct BallotGroup {
    ranking: Vec<CandidateId>,
    count: u64,
    /// The weight each ballot still carries. Starts at 1 and only decreases.
    value: f64,
    /// Position in the ranking of the candidate holding these ballots.
    /// None before the first round and once exhausted.
    holder: Option<usize>,
}

impl BallotGroup {
    fn weight(&self) -> f64 {
        self.count as f64 * self.value
    }

    fn holder(&self) -> Option<CandidateId> {
        self.holder.and_then(|pos| self.ranking.get(pos).cloned())
    }

    fn seek(&mut self, from: usize, status: &BTreeMap<CandidateId, CandidateStatus>) {
        self.holder = (from..self.ranking.len())
            .find(|pos| status.get(&self.ranking[*pos]) == Some(&CandidateStatus::Hopeful));
    }

    /// Moves the ballots to the next hopeful preference, or exhausts them.
    fn transfer(&mut self, status: &BTreeMap<CandidateId, CandidateStatus>) {
        if let Some(pos) = self.holder {
            self.seek(pos + 1, status);
        }
    }
}

struct Count<'a> {
    options: &'a [CandidateId],
    seats: usize,
    rules: &'a StvRules,
    groups: Vec<BallotGroup>,
    status: BTreeMap<CandidateId, CandidateStatus>,
    keep_factors: BTreeMap<CandidateId, f64>,
    // What each elected candidate keeps for good.
    retained: BTreeMap<CandidateId, f64>,
    quota: f64,
    elected: Vec<CandidateId>,
    eliminated: Vec<CandidateId>,
    rounds: Vec<Round>,
    ties: Vec<Tie>,
}

impl<'a> Count<'a> {
    fn new(
        options: &'a [CandidateId],
        seats: u32,
        rules: &'a StvRules,
        groups: Vec<BallotGroup>,
    ) -> Count<'a> {
        Count {
            options,
            seats: seats as usize,
            rules,
            groups,
            status: options
                .iter()
                .map(|cid| (*cid, CandidateStatus::Hopeful))
                .collect(),
            keep_factors: options.iter().map(|cid| (*cid, 1.0)).collect(),
            retained: BTreeMap::new(),
            quota: 0.0,
            elected: Vec::new(),
            eliminated: Vec::new(),
            rounds: Vec::new(),
            ties: Vec::new(),
        }
    }

    fn run(mut self) -> StvResult {
        self.count_rounds();
        StvResult {
            elected: self.elected,
            eliminated: self.eliminated,
            rounds: self.rounds,
            ties: self.ties,
        }
    }

    fn count_rounds(&mut self) {
        let status = &self.status;
        for group in self.groups.iter_mut() {
            group.seek(0, status);
        }
        let first = self.holdings();
        let total_votes: f64 = first.values().sum();
        self.quota = droop_quota(total_votes, self.seats as u32);
        info!(
            "stv: {} votes, quota {}",
            total_votes, self.quota
        );
        let zeros: BTreeMap<CandidateId, f64> =
            self.options.iter().map(|cid| (*cid, 0.0)).collect();
        self.record_round(&zeros, &first, 0.0, vec![], vec![]);

        while self.elected.len() < self.seats {
            let hopefuls = self.hopefuls();
            if hopefuls.is_empty() {
                warn!(
                    "stv: no candidate left, {} seat(s) stay vacant",
                    self.seats - self.elected.len()
                );
                break;
            }
            let round_id = self.rounds.len() as u32 + 1;
            let unfilled = self.seats - self.elected.len();
            let before = self.holdings();
            let total = |cid: &CandidateId| before.get(cid).copied().unwrap_or(0.0);

            let mut round_elected: Vec<CandidateId> = Vec::new();
            let mut round_eliminated: Vec<CandidateId> = Vec::new();
            let mut surplus = 0.0;

            if hopefuls.len() <= unfilled {
                // As many seats as candidates left: all of them are elected without quota.
                let mut by_total = hopefuls;
                by_total.sort_by(|a, b| total(b).total_cmp(&total(a)));
                for cid in by_total.iter() {
                    self.status.insert(*cid, CandidateStatus::Elected);
                    self.retained.insert(*cid, total(cid));
                    self.elected.push(*cid);
                }
                debug!("stv: round {}: elected by default: {:?}", round_id, by_total);
                round_elected = by_total;
            } else {
                let mut reached: Vec<CandidateId> = hopefuls
                    .iter()
                    .filter(|cid| total(*cid) >= self.quota)
                    .cloned()
                    .collect();
                reached.sort_by(|a, b| total(b).total_cmp(&total(a)));
                reached.truncate(unfilled);

                if !reached.is_empty() {
                    for cid in reached.iter() {
                        self.status.insert(*cid, CandidateStatus::Elected);
                        self.elected.push(*cid);
                    }
                    let seats_left = self.elected.len() < self.seats;
                    for cid in reached.iter() {
                        let candidate_total = total(cid);
                        let candidate_surplus = candidate_total - self.quota;
                        surplus += candidate_surplus;
                        if seats_left && candidate_surplus > 0.0 {
                            self.transfer_surplus(*cid, candidate_total);
                        } else {
                            self.retained.insert(*cid, candidate_total);
                        }
                    }
                    debug!(
                        "stv: round {}: elected {:?}, surplus {}",
                        round_id, reached, surplus
                    );
                    round_elected = reached;
                } else {
                    let losers = self.select_eliminated(&hopefuls, &before, unfilled, round_id);
                    self.eliminate(&losers);
                    debug!("stv: round {}: eliminated {:?}", round_id, losers);
                    round_eliminated = losers;
                }
            }

            let after = self.holdings();
            self.record_round(&before, &after, surplus, round_elected, round_eliminated);
        }

        info!(
            "stv: elected {:?} after {} rounds, eliminated {:?}",
            self.elected,
            self.rounds.len(),
            self.eliminated
        );
    }

    /// The hopeful candidates, in question order.
    fn hopefuls(&self) -> Vec<CandidateId> {
        self.options
            .iter()
            .filter(|cid| self.status.get(*cid) == Some(&CandidateStatus::Hopeful))
            .cloned()
            .collect()
    }

    /// The current vote total of every candidate. Eliminated candidates hold
    /// nothing, elected candidates hold what they retained.
    fn holdings(&self) -> BTreeMap<CandidateId, f64> {
        let mut res: BTreeMap<CandidateId, f64> =
            self.options.iter().map(|cid| (*cid, 0.0)).collect();
        for group in self.groups.iter() {
            if let Some(cid) = group.holder() {
                if self.status.get(&cid) == Some(&CandidateStatus::Hopeful) {
                    if let Some(t) = res.get_mut(&cid) {
                        *t += group.weight();
                    }
                }
            }
        }
        for (cid, kept) in self.retained.iter() {
            res.insert(*cid, *kept);
        }
        res
    }

    /// The candidate keeps exactly the quota; the rest of every ballot it
    /// holds moves on with a reduced value.
    fn transfer_surplus(&mut self, cid: CandidateId, total: f64) {
        let keep = self.quota / total;
        if let Some(kf) = self.keep_factors.get_mut(&cid) {
            *kf *= keep;
        }
        self.retained.insert(cid, self.quota);
        let status = &self.status;
        for group in self.groups.iter_mut() {
            if group.holder() == Some(cid) {
                group.value *= 1.0 - keep;
                group.transfer(status);
            }
        }
    }

    /// Eliminated candidates pass on their ballots at full value.
    fn eliminate(&mut self, losers: &[CandidateId]) {
        for cid in losers.iter() {
            self.status.insert(*cid, CandidateStatus::Eliminated);
            self.keep_factors.insert(*cid, 0.0);
            self.eliminated.push(*cid);
        }
        let status = &self.status;
        for group in self.groups.iter_mut() {
            if let Some(cid) = group.holder() {
                if losers.contains(&cid) {
                    group.transfer(status);
                }
            }
        }
    }

    fn select_eliminated(
        &mut self,
        hopefuls: &[CandidateId],
        totals: &BTreeMap<CandidateId, f64>,
        unfilled: usize,
        round_id: u32,
    ) -> Vec<CandidateId> {
        let total = |cid: &CandidateId| totals.get(cid).copied().unwrap_or(0.0);

        if self.rules.elimination_algorithm == EliminationAlgorithm::Bulk {
            if let Some(v) = find_eliminated_candidates_bulk(hopefuls, totals, unfilled) {
                return v;
            }
        }

        let min_total = hopefuls
            .iter()
            .map(total)
            .fold(f64::INFINITY, f64::min);
        let lowest: Vec<CandidateId> = hopefuls
            .iter()
            .filter(|cid| total(*cid) - min_total <= TIE_TOLERANCE)
            .cloned()
            .collect();
        debug!("stv: round {}: lowest candidates: {:?}", round_id, lowest);

        if lowest.len() == 1 || hopefuls.len() - lowest.len() >= unfilled {
            return lowest;
        }
        if lowest.len() == hopefuls.len() && !self.can_transfer(&lowest) {
            // Nobody can be told apart from the others and no ballot would
            // move: all of them go, and the remaining seats stay vacant.
            warn!(
                "stv: round {}: all remaining candidates {:?} are tied, {} seat(s) stay vacant",
                round_id, lowest, unfilled
            );
            self.ties.push(Tie {
                round: Some(round_id),
                candidates: lowest.clone(),
                seats: unfilled as u32,
            });
            return lowest;
        }
        match self.break_tie(&lowest, round_id) {
            Some(cid) => {
                info!(
                    "stv: round {}: tie between {:?}, eliminating {}",
                    round_id, lowest, cid
                );
                vec![cid]
            }
            None => lowest,
        }
    }

    /// Whether some ballot held by one of the candidates has a later hopeful
    /// preference.
    fn can_transfer(&self, candidates: &[CandidateId]) -> bool {
        self.groups.iter().any(|group| match (group.holder, group.holder()) {
            (Some(pos), Some(cid)) if candidates.contains(&cid) => group
                .ranking
                .iter()
                .skip(pos + 1)
                .any(|next| self.status.get(next) == Some(&CandidateStatus::Hopeful)),
            _ => false,
        })
    }

    /// Picks the single candidate to eliminate among tied candidates: the
    /// lowest in the most recent earlier round where they differ, then by
    /// the tiebreak mode.
    fn break_tie(&self, tied: &[CandidateId], round_id: u32) -> Option<CandidateId> {
        let mut contenders: Vec<CandidateId> = tied.to_vec();
        // The last recorded round holds the current totals, which are tied.
        for round in self.rounds.iter().rev().skip(1) {
            let total = |cid: &CandidateId| round.rankings.get(cid).map(|r| r.total).unwrap_or(0.0);
            let min_total = contenders
                .iter()
                .map(total)
                .fold(f64::INFINITY, f64::min);
            contenders.retain(|cid| total(cid) - min_total <= TIE_TOLERANCE);
            if contenders.len() == 1 {
                debug!(
                    "stv: tie broken by the totals of round {}: {:?}",
                    round.round, contenders
                );
                return contenders.first().cloned();
            }
        }
        match self.rules.tiebreak_mode {
            // For loser selection, the candidate listed last goes first.
            TieBreakMode::UseCandidateOrder => contenders.last().cloned(),
            TieBreakMode::Random(seed) => candidate_permutation_crypto(&contenders, seed, round_id)
                .first()
                .cloned(),
        }
    }

    fn record_round(
        &mut self,
        before: &BTreeMap<CandidateId, f64>,
        after: &BTreeMap<CandidateId, f64>,
        surplus: f64,
        elected: Vec<CandidateId>,
        eliminated: Vec<CandidateId>,
    ) {
        let rankings: BTreeMap<CandidateId, Ranking> = self
            .options
            .iter()
            .map(|cid| {
                let votes = before.get(cid).copied().unwrap_or(0.0);
                let total = after.get(cid).copied().unwrap_or(0.0);
                (
                    *cid,
                    Ranking {
                        votes,
                        earned: total - votes,
                        total,
                    },
                )
            })
            .collect();
        let round = Round {
            round: self.rounds.len() as u32 + 1,
            quota: self.quota,
            surplus,
            total_votes: after.values().sum(),
            keep_factors: self.keep_factors.clone(),
            elected,
            eliminated,
            rankings,
        };
        info!(
            "stv: round {}: total votes {}, elected {:?}, eliminated {:?}",
            round.round, round.total_votes, round.elected, round.eliminated
        );
        debug!("stv: round {}: rankings {:?}", round.round, round.rankings);
        self.rounds.push(round);
    }
}

/// Eliminates at once the largest set of weakest candidates whose combined
/// total is lower than the total of the next candidate: transfers between
/// them could not save any of them. At least `unfilled` candidates are kept.
fn find_eliminated_candidates_bulk(
    hopefuls: &[CandidateId],
    totals: &BTreeMap<CandidateId, f64>,
    unfilled: usize,
) -> Option<Vec<CandidateId>> {
    let mut sorted: Vec<(CandidateId, f64)> = hopefuls
        .iter()
        .map(|cid| (*cid, totals.get(cid).copied().unwrap_or(0.0)))
        .collect();
    sorted.sort_by(|a, b| a.1.total_cmp(&b.1));

    let mut cumulative = 0.0;
    let mut cut: Option<usize> = None;
    for (idx, (_, t)) in sorted.iter().enumerate() {
        if idx > 0 && cumulative < *t - TIE_TOLERANCE && sorted.len() - idx >= unfilled {
            cut = Some(idx);
        }
        cumulative += *t;
    }
    debug!(
        "find_eliminated_candidates_bulk: sorted: {:?} cut: {:?}",
        sorted, cut
    );

    let losers: Vec<CandidateId> = sorted.iter().take(cut?).map(|(cid, _)| *cid).collect();
    // Report them in question order.
    Some(
        hopefuls
            .iter()
            .filter(|cid| losers.contains(*cid))
            .cloned()
            .collect(),
    )
}

/// Generates a "random" permutation of the candidates. Random in this context means hard to guess in advance.
/// The order is given by a SHA-256 digest, so it is reproducible from the seed.
fn candidate_permutation_crypto(
    candidates: &[CandidateId],
    seed: u32,
    num_round: u32,
) -> Vec<CandidateId> {
    let mut data: Vec<(CandidateId, String)> = candidates
        .iter()
        .map(|cid| {
            let key = format!("{:08}{:08}{:08X}", seed, num_round, cid.0);
            (*cid, sha256::digest(key.as_str()))
        })
        .collect();
    data.sort_by(|a, b| match a.1.cmp(&b.1) {
        Ordering::Equal => a.0.cmp(&b.0),
        o => o,
    });
    data.iter().map(|p| p.0).collect()
}
