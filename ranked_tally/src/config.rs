// ********* Identifiers ***********

use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::Display;

use serde::{Deserialize, Serialize};
use snafu::Snafu;

use crate::codec::{DecodeError, EncodeError};

/// An option of a question (a candidate). Stable for the lifetime of an election.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CandidateId(pub u32);

#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuestionId(pub u32);

impl Display for CandidateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Display for QuestionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The scores of one question on one ballot: either 0/1 marks or ranks.
pub type QuestionScores = BTreeMap<CandidateId, u32>;

/// A decoded ballot record.
pub type Scores = BTreeMap<QuestionId, QuestionScores>;

// ********* Input data structures ***********

/// The layout of the ballot records of an election.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BallotType {
    /// One option chosen per question.
    Choice,
    /// Yes/no for every option of a question.
    Approval,
    /// A rank for every option of a question.
    Preferential,
}

impl Display for BallotType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BallotType::Choice => "choice",
            BallotType::Approval => "approval",
            BallotType::Preferential => "preferential",
        };
        write!(f, "{}", s)
    }
}

/// The counting methods.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum TallyMethod {
    Plurality,
    Schulze,
    Stv,
}

impl TallyMethod {
    /// Resolves the tag used in election configurations.
    pub fn from_tag(tag: &str) -> Option<TallyMethod> {
        match tag {
            "plurality" => Some(TallyMethod::Plurality),
            "schulze" => Some(TallyMethod::Schulze),
            "stv" => Some(TallyMethod::Stv),
            _ => None,
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            TallyMethod::Plurality => "plurality",
            TallyMethod::Schulze => "schulze",
            TallyMethod::Stv => "stv",
        }
    }

    /// True if the method counts ranks rather than marks.
    pub fn is_preferential(&self) -> bool {
        !matches!(self, TallyMethod::Plurality)
    }
}

impl Display for TallyMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.tag())
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: QuestionId,
    /// The options in the order they are presented. This order is also the
    /// final tie-break order.
    pub options: Vec<CandidateId>,
    #[serde(default = "default_seats")]
    pub seats: u32,
    /// Overrides the tally method of the election.
    #[serde(default)]
    pub tally_method: Option<String>,
}

fn default_seats() -> u32 {
    1
}

fn default_allow_unranked() -> bool {
    true
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Election {
    pub ballot_type: BallotType,
    /// The tally method of every question that does not declare its own.
    #[serde(default)]
    pub tally_method: Option<String>,
    /// Whether preferential ballots may leave options unranked.
    #[serde(default = "default_allow_unranked")]
    pub allow_unranked: bool,
    /// The crypt module applied to the records, `None` or "none" for plain records.
    #[serde(default)]
    pub crypt: Option<String>,
    pub questions: Vec<Question>,
    #[serde(default)]
    pub stv_rules: StvRules,
}

// ********* Configuration **********

#[derive(Eq, PartialEq, Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TieBreakMode {
    /// The candidate listed last in the question is eliminated first.
    UseCandidateOrder,
    /// Hard to guess in advance but reproducible: candidates are ordered by a
    /// SHA-256 digest of the seed, the round and the candidate id.
    Random(u32),
}

/// The elimination algorithm to apply when nobody reaches the quota.
///
/// - Ties eliminates the lowest candidate, or all the candidates tied for
/// the lowest total when enough candidates remain to fill the seats.
///
/// - Bulk additionally eliminates at once every group of low candidates whose
/// combined total cannot overtake the next candidate.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EliminationAlgorithm {
    Ties,
    Bulk,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StvRules {
    pub tiebreak_mode: TieBreakMode,
    pub elimination_algorithm: EliminationAlgorithm,
}

impl StvRules {
    pub const DEFAULT_RULES: StvRules = StvRules {
        tiebreak_mode: TieBreakMode::UseCandidateOrder,
        elimination_algorithm: EliminationAlgorithm::Ties,
    };
}

impl Default for StvRules {
    fn default() -> Self {
        StvRules::DEFAULT_RULES
    }
}

// ********* Errors **********

/// The failure reported by an external collaborator (crypt module, vote source).
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Status {
    message: String,
}

impl Status {
    pub fn new(message: impl Into<String>) -> Status {
        Status {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Error for Status {}

impl Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// A score that a question tallier refuses to count.
#[derive(Debug, Snafu, Eq, PartialEq, Clone)]
#[snafu(visibility(pub(crate)))]
pub enum ScoreError {
    #[snafu(display("option {option} is not part of the question"))]
    UnknownOption { option: CandidateId },
    #[snafu(display("option {option} has the invalid score {value}"))]
    InvalidValue { option: CandidateId, value: u32 },
    #[snafu(display("option {option} is unranked, which this election does not permit"))]
    UnrankedNotPermitted { option: CandidateId },
    #[snafu(display("rank {rank} is given to more than one option"))]
    DuplicateRank { rank: u32 },
}

/// Errors that prevent a tally run from completing. No partial result is
/// ever produced alongside one of these.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum TallyError {
    #[snafu(display("could not read the votes of the election: {source}"))]
    VoteSource { source: Status },
    #[snafu(display("vote #{index} could not be decrypted: {source}"))]
    Decrypt { index: usize, source: Status },
    #[snafu(display("vote #{index} is malformed: {source}"))]
    Decode { index: usize, source: DecodeError },
    #[snafu(display("could not encode a vote: {source}"))]
    Encode { source: EncodeError },
    #[snafu(display("vote #{index} scores question {question}, which is not part of the election"))]
    UnknownQuestion { index: usize, question: QuestionId },
    #[snafu(display("vote #{index} has no score for question {question}"))]
    MissingQuestion { index: usize, question: QuestionId },
    #[snafu(display("vote #{index} is inconsistent with question {question}: {source}"))]
    InconsistentVote {
        index: usize,
        question: QuestionId,
        source: ScoreError,
    },
    #[snafu(display("question {question}: unknown tally method {method:?}"))]
    InvalidTallyMethod { question: QuestionId, method: String },
    #[snafu(display("question {question}: {method} cannot count {ballot_type} ballots"))]
    IncompatibleBallot {
        question: QuestionId,
        method: TallyMethod,
        ballot_type: BallotType,
    },
    #[snafu(display("question {question} is invalid: {reason}"))]
    InvalidQuestion { question: QuestionId, reason: String },
    #[snafu(display("unsupported crypt module {name:?}"))]
    UnsupportedCrypt { name: String },
}
