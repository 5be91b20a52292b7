// ******** Output data structures *********
//
// These structures are consumed by external formatters. The field names are
// part of the output contract.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::{CandidateId, QuestionId};

/// A tie that the counting rules could not resolve. It is reported as part
/// of the result rather than broken arbitrarily.
#[derive(PartialEq, Eq, Debug, Clone, Serialize, Deserialize)]
pub struct Tie {
    /// The STV round in which the tie happened.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub round: Option<u32>,
    pub candidates: Vec<CandidateId>,
    /// The number of seats the tied candidates were contending for.
    pub seats: u32,
}

/// The standing of one candidate in one STV round.
#[derive(PartialEq, Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Ranking {
    /// Carried in from the previous round.
    pub votes: f64,
    /// Gained (or lost) in this round.
    pub earned: f64,
    pub total: f64,
}

/// Statistics for one STV round.
#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Round {
    pub round: u32,
    pub quota: f64,
    pub surplus: f64,
    pub total_votes: f64,
    pub keep_factors: BTreeMap<CandidateId, f64>,
    pub elected: Vec<CandidateId>,
    pub eliminated: Vec<CandidateId>,
    pub rankings: BTreeMap<CandidateId, Ranking>,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct StvResult {
    /// In the order the seats were filled.
    pub elected: Vec<CandidateId>,
    /// In the order of elimination.
    pub eliminated: Vec<CandidateId>,
    pub rounds: Vec<Round>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub ties: Vec<Tie>,
}

#[derive(PartialEq, Eq, Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchulzeResult {
    /// Number of ballots preferring the row candidate over the column candidate.
    pub preferences: BTreeMap<CandidateId, BTreeMap<CandidateId, u64>>,
    /// Signed preference margins.
    pub margins: BTreeMap<CandidateId, BTreeMap<CandidateId, i64>>,
    pub strongest_paths: BTreeMap<CandidateId, BTreeMap<CandidateId, i64>>,
    /// Tiers of the beatpath order, best first. Candidates in the same tier
    /// do not beat each other.
    pub ranking: Vec<Vec<CandidateId>>,
    pub winners: Vec<CandidateId>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub tie: Option<Tie>,
}

#[derive(PartialEq, Eq, Debug, Clone, Serialize, Deserialize)]
pub struct PluralityResult {
    pub totals: BTreeMap<CandidateId, u64>,
    /// Most votes first, then by question order.
    pub ranking: Vec<CandidateId>,
    pub winners: Vec<CandidateId>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub tie: Option<Tie>,
}

/// The result of one question, in the shape of its counting method.
#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QuestionResult {
    Stv(StvResult),
    Schulze(SchulzeResult),
    Plurality(PluralityResult),
}

impl QuestionResult {
    /// The candidates who won a seat.
    pub fn winners(&self) -> &[CandidateId] {
        match self {
            QuestionResult::Stv(r) => &r.elected,
            QuestionResult::Schulze(r) => &r.winners,
            QuestionResult::Plurality(r) => &r.winners,
        }
    }

    /// True if a tie was left for the election officials to settle.
    pub fn has_tie(&self) -> bool {
        match self {
            QuestionResult::Stv(r) => !r.ties.is_empty(),
            QuestionResult::Schulze(r) => r.tie.is_some(),
            QuestionResult::Plurality(r) => r.tie.is_some(),
        }
    }
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct ElectionResult {
    pub questions: BTreeMap<QuestionId, QuestionResult>,
}
