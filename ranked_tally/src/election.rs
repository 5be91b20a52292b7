//! Runs every question of an election over one closed set of ballot records.

use log::{debug, info};
use rand::seq::SliceRandom;
use rand::{CryptoRng, RngCore};
use snafu::{ensure, OptionExt, ResultExt};
use std::collections::{BTreeMap, HashSet};

use crate::codec;
use crate::config::*;
use crate::result::ElectionResult;
use crate::tallier::QuestionTallier;

/// Turns a stored ballot record into its encoded form.
pub trait Crypt {
    fn decrypt(&self, record: &[u8]) -> Result<Vec<u8>, Status>;
}

/// Records stored in the clear.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCrypt;

impl Crypt for NoCrypt {
    fn decrypt(&self, record: &[u8]) -> Result<Vec<u8>, Status> {
        Ok(record.to_vec())
    }
}

/// Finds the crypt module named in an election configuration.
pub fn resolve_crypt(name: Option<&str>) -> Result<Box<dyn Crypt>, TallyError> {
    match name {
        None | Some("none") => Ok(Box::new(NoCrypt)),
        Some(other) => UnsupportedCryptSnafu {
            name: other.to_string(),
        }
        .fail(),
    }
}

/// The valid votes of an election: every current record, struck votes excluded.
pub trait VoteSource {
    fn records(&self) -> Result<Vec<Vec<u8>>, Status>;
}

impl VoteSource for Vec<Vec<u8>> {
    fn records(&self) -> Result<Vec<Vec<u8>>, Status> {
        Ok(self.clone())
    }
}

/// A validated election, ready to count.
#[derive(Debug, Clone)]
pub struct ElectionTallier {
    ballot_type: BallotType,
    allow_unranked: bool,
    stv_rules: StvRules,
    questions: Vec<(Question, TallyMethod)>,
}

impl ElectionTallier {
    /// Checks the configuration of every question before any vote is read.
    pub fn new(election: &Election) -> Result<ElectionTallier, TallyError> {
        let mut seen: HashSet<QuestionId> = HashSet::new();
        let mut questions: Vec<(Question, TallyMethod)> = Vec::new();
        for q in election.questions.iter() {
            ensure!(
                seen.insert(q.id),
                InvalidQuestionSnafu {
                    question: q.id,
                    reason: "the question id is used twice".to_string()
                }
            );
            ensure!(
                !q.options.is_empty(),
                InvalidQuestionSnafu {
                    question: q.id,
                    reason: "no options".to_string()
                }
            );
            ensure!(
                q.seats >= 1,
                InvalidQuestionSnafu {
                    question: q.id,
                    reason: "no seats to fill".to_string()
                }
            );
            let options: HashSet<CandidateId> = q.options.iter().cloned().collect();
            ensure!(
                options.len() == q.options.len(),
                InvalidQuestionSnafu {
                    question: q.id,
                    reason: "an option is listed twice".to_string()
                }
            );

            let tag = q
                .tally_method
                .as_deref()
                .or(election.tally_method.as_deref())
                .unwrap_or_default();
            let method = TallyMethod::from_tag(tag).context(InvalidTallyMethodSnafu {
                question: q.id,
                method: tag.to_string(),
            })?;
            let compatible = if method.is_preferential() {
                election.ballot_type == BallotType::Preferential
            } else {
                election.ballot_type != BallotType::Preferential
            };
            ensure!(
                compatible,
                IncompatibleBallotSnafu {
                    question: q.id,
                    method,
                    ballot_type: election.ballot_type,
                }
            );
            debug!(
                "ElectionTallier::new: question {}: {} option(s), {} seat(s), method {}",
                q.id,
                q.options.len(),
                q.seats,
                method
            );
            questions.push((q.clone(), method));
        }
        Ok(ElectionTallier {
            ballot_type: election.ballot_type,
            allow_unranked: election.allow_unranked,
            stv_rules: election.stv_rules.clone(),
            questions,
        })
    }

    pub fn ballot_type(&self) -> BallotType {
        self.ballot_type
    }

    /// The resolved counting method of a question.
    pub fn method(&self, question: QuestionId) -> Option<TallyMethod> {
        self.questions
            .iter()
            .find(|(q, _)| q.id == question)
            .map(|(_, m)| *m)
    }

    /// Counts all the votes of the source. The records are processed in an
    /// order drawn from `rng`, which does not change the outcome.
    ///
    /// Any failing record aborts the whole run.
    pub fn run<R>(
        &self,
        source: &dyn VoteSource,
        crypt: &dyn Crypt,
        rng: &mut R,
    ) -> Result<ElectionResult, TallyError>
    where
        R: RngCore + CryptoRng + ?Sized,
    {
        let records = source.records().context(VoteSourceSnafu {})?;
        info!(
            "run: {} records, {} question(s), {} ballots",
            records.len(),
            self.questions.len(),
            self.ballot_type
        );
        // Keep the submission index for error reports.
        let mut records: Vec<(usize, Vec<u8>)> = records.into_iter().enumerate().collect();
        records.shuffle(rng);

        let mut talliers: BTreeMap<QuestionId, QuestionTallier> = self
            .questions
            .iter()
            .map(|(q, method)| {
                (
                    q.id,
                    QuestionTallier::new(q, *method, self.allow_unranked, &self.stv_rules),
                )
            })
            .collect();

        for (index, record) in records.iter() {
            let index = *index;
            let plain = crypt.decrypt(record).context(DecryptSnafu { index })?;
            let scores = codec::decode(self.ballot_type, &plain).context(DecodeSnafu { index })?;
            if let Some(question) = scores.keys().find(|qid| !talliers.contains_key(*qid)) {
                return UnknownQuestionSnafu {
                    index,
                    question: *question,
                }
                .fail();
            }
            for (question, tallier) in talliers.iter_mut() {
                let question_scores = scores.get(question).context(MissingQuestionSnafu {
                    index,
                    question: *question,
                })?;
                tallier
                    .add_vote(question_scores)
                    .context(InconsistentVoteSnafu {
                        index,
                        question: *question,
                    })?;
            }
        }

        let questions: BTreeMap<_, _> = talliers
            .into_iter()
            .map(|(qid, tallier)| {
                let res = tallier.finish();
                info!(
                    "run: question {}: winners {:?}{}",
                    qid,
                    res.winners(),
                    if res.has_tie() { " (unresolved tie)" } else { "" }
                );
                (qid, res)
            })
            .collect();
        Ok(ElectionResult { questions })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::QuestionResult;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn election(ballot_type: BallotType, method: &str, questions: Vec<Question>) -> Election {
        Election {
            ballot_type,
            tally_method: Some(method.to_string()),
            allow_unranked: true,
            crypt: None,
            questions,
            stv_rules: StvRules::DEFAULT_RULES,
        }
    }

    fn question(id: u32, options: &[u32], seats: u32) -> Question {
        Question {
            id: QuestionId(id),
            options: options.iter().cloned().map(CandidateId).collect(),
            seats,
            tally_method: None,
        }
    }

    fn record(ballot_type: BallotType, votes: &[(u32, Vec<(u32, u32)>)]) -> Vec<u8> {
        let scores: Scores = votes
            .iter()
            .map(|(qid, s)| {
                (
                    QuestionId(*qid),
                    s.iter().map(|(c, v)| (CandidateId(*c), *v)).collect(),
                )
            })
            .collect();
        codec::encode(ballot_type, &scores).unwrap().into_bytes()
    }

    fn ranked(order: &[u32]) -> Vec<(u32, u32)> {
        order
            .iter()
            .enumerate()
            .map(|(idx, c)| (*c, idx as u32 + 1))
            .collect()
    }

    fn stv_records() -> Vec<Vec<u8>> {
        let mut res = Vec::new();
        let groups: Vec<(usize, Vec<u32>)> = vec![
            (9, vec![1, 2, 3]),
            (4, vec![2, 1]),
            (3, vec![3, 2, 4]),
            (2, vec![4, 3]),
            (1, vec![5, 4, 3]),
        ];
        for (n, order) in groups.iter() {
            for _ in 0..*n {
                res.push(record(BallotType::Preferential, &[(1, ranked(order))]));
            }
        }
        res
    }

    #[test]
    fn result_does_not_depend_on_shuffle() {
        let _ = env_logger::try_init();
        let e = election(
            BallotType::Preferential,
            "stv",
            vec![question(1, &[1, 2, 3, 4, 5], 2)],
        );
        let tallier = ElectionTallier::new(&e).unwrap();
        let records = stv_records();
        let reference = tallier
            .run(&records, &NoCrypt, &mut StdRng::seed_from_u64(0))
            .unwrap();
        let reference_js = serde_json::to_string(&reference).unwrap();
        for seed in 1..20 {
            let res = tallier
                .run(&records, &NoCrypt, &mut StdRng::seed_from_u64(seed))
                .unwrap();
            assert_eq!(serde_json::to_string(&res).unwrap(), reference_js);
        }
        match &reference.questions[&QuestionId(1)] {
            QuestionResult::Stv(r) => {
                assert_eq!(r.elected.len(), 2);
                assert_eq!(r.elected[0], CandidateId(1));
            }
            _ => panic!("not an STV result"),
        }
    }

    #[test]
    fn serialization_is_repeatable() {
        let e = election(
            BallotType::Preferential,
            "schulze",
            vec![question(1, &[1, 2, 3, 4, 5], 1)],
        );
        let tallier = ElectionTallier::new(&e).unwrap();
        let records = stv_records();
        let a = tallier
            .run(&records, &NoCrypt, &mut StdRng::seed_from_u64(3))
            .unwrap();
        let b = tallier
            .run(&records, &NoCrypt, &mut StdRng::seed_from_u64(4))
            .unwrap();
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
        assert_eq!(a.questions[&QuestionId(1)].winners(), &[CandidateId(1)]);
    }

    #[test]
    fn counts_several_questions() {
        let e = election(
            BallotType::Choice,
            "plurality",
            vec![question(1, &[1, 2], 1), question(2, &[3, 4, 5], 1)],
        );
        let tallier = ElectionTallier::new(&e).unwrap();
        let records: Vec<Vec<u8>> = vec![
            record(BallotType::Choice, &[(1, vec![(1, 1)]), (2, vec![(5, 1)])]),
            record(BallotType::Choice, &[(1, vec![(2, 1)]), (2, vec![(5, 1)])]),
            record(BallotType::Choice, &[(1, vec![(2, 1)]), (2, vec![(3, 1)])]),
            record(BallotType::Choice, &[(1, vec![(2, 1)]), (2, vec![(3, 1)])]),
        ];
        let res = tallier
            .run(&records, &NoCrypt, &mut StdRng::seed_from_u64(7))
            .unwrap();
        assert_eq!(res.questions[&QuestionId(1)].winners(), &[CandidateId(2)]);
        assert!(res.questions[&QuestionId(2)].has_tie());
    }

    #[test]
    fn missing_question_aborts() {
        let e = election(
            BallotType::Choice,
            "plurality",
            vec![question(1, &[1, 2], 1), question(2, &[3, 4], 1)],
        );
        let tallier = ElectionTallier::new(&e).unwrap();
        let records = vec![record(BallotType::Choice, &[(1, vec![(1, 1)])])];
        let err = tallier
            .run(&records, &NoCrypt, &mut StdRng::seed_from_u64(1))
            .unwrap_err();
        assert!(matches!(
            err,
            TallyError::MissingQuestion {
                index: 0,
                question: QuestionId(2)
            }
        ));
    }

    #[test]
    fn unknown_question_aborts() {
        let e = election(BallotType::Choice, "plurality", vec![question(1, &[1, 2], 1)]);
        let tallier = ElectionTallier::new(&e).unwrap();
        let records = vec![record(
            BallotType::Choice,
            &[(1, vec![(1, 1)]), (9, vec![(1, 1)])],
        )];
        let err = tallier
            .run(&records, &NoCrypt, &mut StdRng::seed_from_u64(1))
            .unwrap_err();
        assert!(matches!(
            err,
            TallyError::UnknownQuestion {
                question: QuestionId(9),
                ..
            }
        ));
    }

    #[test]
    fn inconsistent_vote_aborts() {
        let e = election(
            BallotType::Preferential,
            "stv",
            vec![question(1, &[1, 2], 1)],
        );
        let tallier = ElectionTallier::new(&e).unwrap();
        let records = vec![record(
            BallotType::Preferential,
            &[(1, vec![(1, 1), (2, 1)])],
        )];
        let err = tallier
            .run(&records, &NoCrypt, &mut StdRng::seed_from_u64(1))
            .unwrap_err();
        assert!(matches!(
            err,
            TallyError::InconsistentVote {
                source: ScoreError::DuplicateRank { rank: 1 },
                ..
            }
        ));
    }

    #[test]
    fn malformed_record_aborts() {
        let e = election(BallotType::Choice, "plurality", vec![question(1, &[1, 2], 1)]);
        let tallier = ElectionTallier::new(&e).unwrap();
        let mut records = vec![record(BallotType::Choice, &[(1, vec![(1, 1)])])];
        records.push(b"Q00000001A0000000".to_vec());
        let err = tallier
            .run(&records, &NoCrypt, &mut StdRng::seed_from_u64(1))
            .unwrap_err();
        assert!(matches!(err, TallyError::Decode { index: 1, .. }));
    }

    struct FailingCrypt;

    impl Crypt for FailingCrypt {
        fn decrypt(&self, _record: &[u8]) -> Result<Vec<u8>, Status> {
            Err(Status::new("key unavailable"))
        }
    }

    struct FailingSource;

    impl VoteSource for FailingSource {
        fn records(&self) -> Result<Vec<Vec<u8>>, Status> {
            Err(Status::new("connection lost"))
        }
    }

    #[test]
    fn collaborator_failures_abort() {
        let e = election(BallotType::Choice, "plurality", vec![question(1, &[1, 2], 1)]);
        let tallier = ElectionTallier::new(&e).unwrap();
        let records = vec![record(BallotType::Choice, &[(1, vec![(1, 1)])])];
        let err = tallier
            .run(&records, &FailingCrypt, &mut StdRng::seed_from_u64(1))
            .unwrap_err();
        assert!(matches!(err, TallyError::Decrypt { index: 0, .. }));
        assert_eq!(
            err.to_string(),
            "vote #0 could not be decrypted: key unavailable"
        );

        let err = tallier
            .run(&FailingSource, &NoCrypt, &mut StdRng::seed_from_u64(1))
            .unwrap_err();
        assert!(matches!(err, TallyError::VoteSource { .. }));
    }

    #[test]
    fn rejects_bad_configuration() {
        let e = election(BallotType::Preferential, "borda", vec![question(1, &[1, 2], 1)]);
        assert!(matches!(
            ElectionTallier::new(&e),
            Err(TallyError::InvalidTallyMethod { .. })
        ));

        let mut e = election(BallotType::Preferential, "stv", vec![question(1, &[1, 2], 1)]);
        e.tally_method = None;
        assert!(matches!(
            ElectionTallier::new(&e),
            Err(TallyError::InvalidTallyMethod { .. })
        ));

        let e = election(BallotType::Approval, "schulze", vec![question(1, &[1, 2], 1)]);
        assert!(matches!(
            ElectionTallier::new(&e),
            Err(TallyError::IncompatibleBallot {
                method: TallyMethod::Schulze,
                ballot_type: BallotType::Approval,
                ..
            })
        ));

        let e = election(
            BallotType::Preferential,
            "plurality",
            vec![question(1, &[1, 2], 1)],
        );
        assert!(matches!(
            ElectionTallier::new(&e),
            Err(TallyError::IncompatibleBallot { .. })
        ));

        for q in [
            question(1, &[], 1),
            question(1, &[1, 1], 1),
            question(1, &[1, 2], 0),
        ] {
            let e = election(BallotType::Preferential, "stv", vec![q]);
            assert!(matches!(
                ElectionTallier::new(&e),
                Err(TallyError::InvalidQuestion { .. })
            ));
        }

        let e = election(
            BallotType::Preferential,
            "stv",
            vec![question(1, &[1, 2], 1), question(1, &[3, 4], 1)],
        );
        assert!(matches!(
            ElectionTallier::new(&e),
            Err(TallyError::InvalidQuestion { .. })
        ));
    }

    #[test]
    fn question_method_overrides_election_method() {
        let mut e = election(
            BallotType::Preferential,
            "stv",
            vec![question(1, &[1, 2], 1), question(2, &[1, 2], 1)],
        );
        e.questions[1].tally_method = Some("schulze".to_string());
        let tallier = ElectionTallier::new(&e).unwrap();
        assert_eq!(tallier.method(QuestionId(1)), Some(TallyMethod::Stv));
        assert_eq!(tallier.method(QuestionId(2)), Some(TallyMethod::Schulze));
        assert_eq!(tallier.method(QuestionId(3)), None);
    }

    #[test]
    fn resolves_crypt_modules() {
        assert!(resolve_crypt(None).is_ok());
        assert!(resolve_crypt(Some("none")).is_ok());
        assert!(matches!(
            resolve_crypt(Some("rsa")),
            Err(TallyError::UnsupportedCrypt { .. })
        ));
    }
}
