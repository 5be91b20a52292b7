use rand::{CryptoRng, RngCore};
use snafu::ResultExt;

use crate::codec;
pub use crate::config::*;
use crate::election::{ElectionTallier, NoCrypt};
use crate::result::ElectionResult;

/// A builder for counting votes held in memory.
///
/// The votes are encoded as ballot records, so they go through the same path
/// as stored records.
///
/// ```
/// use rand::rngs::OsRng;
/// use ranked_tally::builder::Builder;
/// use ranked_tally::{BallotType, CandidateId, QuestionId, TallyError, TallyMethod};
///
/// let (anna, bob, clara) = (CandidateId(1), CandidateId(2), CandidateId(3));
/// let mut builder = Builder::new(BallotType::Preferential, TallyMethod::Stv)?
///     .question(QuestionId(1), &[anna, bob, clara], 1)?;
///
/// builder.add_vote_simple(QuestionId(1), &[anna, clara])?;
/// builder.add_vote_simple(QuestionId(1), &[bob])?;
/// builder.add_vote_simple(QuestionId(1), &[anna])?;
///
/// let result = builder.tally(&mut OsRng)?;
/// assert_eq!(result.questions[&QuestionId(1)].winners(), &[anna]);
/// # Ok::<(), TallyError>(())
/// ```
pub struct Builder {
    election: Election,
    records: Vec<Vec<u8>>,
}

impl Builder {
    pub fn new(ballot_type: BallotType, method: TallyMethod) -> Result<Builder, TallyError> {
        Ok(Builder {
            election: Election {
                ballot_type,
                tally_method: Some(method.tag().to_string()),
                allow_unranked: true,
                crypt: None,
                questions: Vec::new(),
                stv_rules: StvRules::DEFAULT_RULES,
            },
            records: Vec::new(),
        })
    }

    /// Declares a question, with its options in presentation order.
    pub fn question(
        mut self,
        id: QuestionId,
        options: &[CandidateId],
        seats: u32,
    ) -> Result<Builder, TallyError> {
        if self.election.questions.iter().any(|q| q.id == id) {
            return InvalidQuestionSnafu {
                question: id,
                reason: "the question id is used twice".to_string(),
            }
            .fail();
        }
        self.election.questions.push(Question {
            id,
            options: options.to_vec(),
            seats,
            tally_method: None,
        });
        Ok(self)
    }

    pub fn stv_rules(mut self, rules: &StvRules) -> Builder {
        self.election.stv_rules = rules.clone();
        self
    }

    pub fn allow_unranked(mut self, allow: bool) -> Builder {
        self.election.allow_unranked = allow;
        self
    }

    /// The election configuration accumulated so far.
    pub fn election(&self) -> &Election {
        &self.election
    }

    /// Adds a vote with explicit scores for every question.
    pub fn add_vote(&mut self, scores: &Scores) -> Result<(), TallyError> {
        let record = codec::encode(self.election.ballot_type, scores).context(EncodeSnafu {})?;
        self.records.push(record.into_bytes());
        Ok(())
    }

    /// Adds a vote for a single question.
    ///
    /// candidates: the choices of the voter. They are ranked in order on a
    /// preferential ballot and marked on the other ballots.
    pub fn add_vote_simple(
        &mut self,
        question: QuestionId,
        candidates: &[CandidateId],
    ) -> Result<(), TallyError> {
        let q = self
            .election
            .questions
            .iter()
            .find(|q| q.id == question)
            .ok_or(TallyError::UnknownQuestion {
                index: self.records.len(),
                question,
            })?;
        let question_scores: QuestionScores = match self.election.ballot_type {
            BallotType::Preferential => candidates
                .iter()
                .enumerate()
                .map(|(idx, cid)| (*cid, idx as u32 + 1))
                .collect(),
            BallotType::Choice => candidates.iter().map(|cid| (*cid, 1)).collect(),
            BallotType::Approval => q
                .options
                .iter()
                .map(|cid| (*cid, 0))
                // Options outside of the question are kept, for the count to reject them.
                .chain(candidates.iter().map(|cid| (*cid, 1)))
                .collect(),
        };
        let scores: Scores = [(question, question_scores)].into_iter().collect();
        self.add_vote(&scores)
    }

    /// Counts the votes added so far.
    pub fn tally<R>(&self, rng: &mut R) -> Result<ElectionResult, TallyError>
    where
        R: RngCore + CryptoRng + ?Sized,
    {
        let tallier = ElectionTallier::new(&self.election)?;
        tallier.run(&self.records, &NoCrypt, rng)
    }
}
