//! Fixed-width text encoding of ballot records.
//!
//! The layouts are a persisted contract: records already stored with them
//! must keep decoding to the same scores.
//!
//! | ballot type    | field                       | width |
//! |----------------|-----------------------------|-------|
//! | `choice`       | `Q{question}A{option}`      | 18    |
//! | `approval`     | `Q{question}-A{option}-y--` | 23    |
//! | `preferential` | `Q{question}-A{option}-R{rank}--` | 31 |
//!
//! All identifiers and ranks are 8 upper-case hexadecimal digits.

use log::debug;
use snafu::{ensure, Snafu};

use crate::config::*;

/// The highest rank a voter can give.
pub const MAX_RANK: u32 = 999;
/// The rank of an option the voter left unranked. It is less preferred than
/// any actual rank.
pub const UNRANKED: u32 = 1000;

const HEX_WIDTH: usize = 8;

#[derive(Debug, Snafu, Eq, PartialEq, Clone)]
pub enum DecodeError {
    #[snafu(display("record of {len} bytes is not a whole number of {stride}-byte fields"))]
    Length { len: usize, stride: usize },
    #[snafu(display("field #{field} does not follow the {ballot_type} layout"))]
    Layout { field: usize, ballot_type: BallotType },
    #[snafu(display("field #{field} has the rank {rank}, outside of 1..=1000"))]
    RankRange { field: usize, rank: u32 },
    #[snafu(display("field #{field} repeats question {question}, option {option}"))]
    Repeated {
        field: usize,
        question: QuestionId,
        option: CandidateId,
    },
}

#[derive(Debug, Snafu, Eq, PartialEq, Clone)]
pub enum EncodeError {
    #[snafu(display(
        "question {question}, option {option}: {value} cannot be stored on a {ballot_type} ballot"
    ))]
    Unencodable {
        question: QuestionId,
        option: CandidateId,
        value: u32,
        ballot_type: BallotType,
    },
    #[snafu(display("question {question} has no option to store"))]
    EmptyQuestion { question: QuestionId },
}

/// The width in bytes of one field of the given ballot type.
pub fn stride(ballot_type: BallotType) -> usize {
    match ballot_type {
        BallotType::Choice => 18,
        BallotType::Approval => 23,
        BallotType::Preferential => 31,
    }
}

/// Encodes the scores into a record. Questions and options are written in
/// ascending order, so equal scores always give byte-identical records.
///
/// Only scores that decode back to themselves are accepted: a question needs
/// at least one option, and a choice ballot only stores chosen options (1).
pub fn encode(ballot_type: BallotType, scores: &Scores) -> Result<String, EncodeError> {
    let mut record = String::with_capacity(
        stride(ballot_type) * scores.values().map(|q| q.len()).sum::<usize>(),
    );
    for (question, options) in scores.iter() {
        ensure!(
            !options.is_empty(),
            EmptyQuestionSnafu {
                question: *question
            }
        );
        for (option, value) in options.iter() {
            let unencodable = UnencodableSnafu {
                question: *question,
                option: *option,
                value: *value,
                ballot_type,
            };
            match ballot_type {
                BallotType::Choice => {
                    ensure!(*value == 1, unencodable);
                    record.push_str(&format!("Q{:08X}A{:08X}", question.0, option.0));
                }
                BallotType::Approval => {
                    ensure!(*value <= 1, unencodable);
                    let mark = if *value == 1 { 'y' } else { 'n' };
                    record.push_str(&format!("Q{:08X}-A{:08X}-{}--", question.0, option.0, mark));
                }
                BallotType::Preferential => {
                    ensure!((1..=UNRANKED).contains(value), unencodable);
                    record.push_str(&format!(
                        "Q{:08X}-A{:08X}-R{:08X}--",
                        question.0, option.0, value
                    ));
                }
            }
        }
    }
    Ok(record)
}

/// Decodes a record. Any deviation from the layout is reported, the record is
/// never partially decoded.
pub fn decode(ballot_type: BallotType, record: &[u8]) -> Result<Scores, DecodeError> {
    let width = stride(ballot_type);
    ensure!(
        record.len() % width == 0,
        LengthSnafu {
            len: record.len(),
            stride: width
        }
    );

    let mut scores = Scores::new();
    for (field, chunk) in record.chunks(width).enumerate() {
        let (question, option, value) = match ballot_type {
            BallotType::Choice => decode_choice(chunk).map(|(q, a)| (q, a, 1)),
            BallotType::Approval => decode_approval(chunk),
            BallotType::Preferential => decode_preferential(chunk),
        }
        .ok_or(DecodeError::Layout { field, ballot_type })?;

        if ballot_type == BallotType::Preferential {
            ensure!(
                (1..=UNRANKED).contains(&value),
                RankRangeSnafu { field, rank: value }
            );
        }

        let previous = scores
            .entry(QuestionId(question))
            .or_default()
            .insert(CandidateId(option), value);
        ensure!(
            previous.is_none(),
            RepeatedSnafu {
                field,
                question: QuestionId(question),
                option: CandidateId(option)
            }
        );
    }
    debug!(
        "decode: {} fields, {} questions",
        record.len() / width,
        scores.len()
    );
    Ok(scores)
}

// Q{8}A{8}
fn decode_choice(chunk: &[u8]) -> Option<(u32, u32)> {
    let mut cursor = Cursor::new(chunk);
    cursor.literal(b"Q")?;
    let question = cursor.hex()?;
    cursor.literal(b"A")?;
    let option = cursor.hex()?;
    cursor.end()?;
    Some((question, option))
}

// Q{8}-A{8}-{y|n}--
fn decode_approval(chunk: &[u8]) -> Option<(u32, u32, u32)> {
    let mut cursor = Cursor::new(chunk);
    cursor.literal(b"Q")?;
    let question = cursor.hex()?;
    cursor.literal(b"-A")?;
    let option = cursor.hex()?;
    cursor.literal(b"-")?;
    let value = match cursor.byte()? {
        b'y' => 1,
        b'n' => 0,
        _ => return None,
    };
    cursor.literal(b"--")?;
    cursor.end()?;
    Some((question, option, value))
}

// Q{8}-A{8}-R{8}--
fn decode_preferential(chunk: &[u8]) -> Option<(u32, u32, u32)> {
    let mut cursor = Cursor::new(chunk);
    cursor.literal(b"Q")?;
    let question = cursor.hex()?;
    cursor.literal(b"-A")?;
    let option = cursor.hex()?;
    cursor.literal(b"-R")?;
    let rank = cursor.hex()?;
    cursor.literal(b"--")?;
    cursor.end()?;
    Some((question, option, rank))
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(bytes: &'a [u8]) -> Cursor<'a> {
        Cursor { bytes, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Option<&'a [u8]> {
        let s = self.bytes.get(self.pos..self.pos + n)?;
        self.pos += n;
        Some(s)
    }

    fn byte(&mut self) -> Option<u8> {
        self.take(1).map(|s| s[0])
    }

    fn literal(&mut self, expected: &[u8]) -> Option<()> {
        (self.take(expected.len())? == expected).then_some(())
    }

    // Only upper-case digits are produced by the encoder, anything else is corruption.
    fn hex(&mut self) -> Option<u32> {
        let digits = self.take(HEX_WIDTH)?;
        digits.iter().try_fold(0u32, |acc, d| {
            let v = match d {
                b'0'..=b'9' => d - b'0',
                b'A'..=b'F' => d - b'A' + 10,
                _ => return None,
            };
            Some((acc << 4) | v as u32)
        })
    }

    fn end(&self) -> Option<()> {
        (self.pos == self.bytes.len()).then_some(())
    }
}
