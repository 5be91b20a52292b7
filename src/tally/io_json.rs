// Versioned JSON dump of ballot records:
// {"formatVersion": 1, "records": [{"record": "...", "count": 3}]}

use crate::tally::*;

use serde::{Deserialize, Serialize};

pub const FORMAT_VERSION: u32 = 1;
/// The most records a single dump may expand to.
pub const MAX_RECORDS: u64 = 10_000_000;

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
struct JsonRecord {
    record: String,
    /// The number of identical records. Defaults to 1.
    count: Option<u64>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
struct JsonVotes {
    #[serde(rename = "formatVersion")]
    format_version: u32,
    records: Vec<JsonRecord>,
}

pub fn read_json_records(path: &str) -> CliResult<Vec<Vec<u8>>> {
    let contents = fs::read_to_string(path).context(OpeningVotesSnafu { path })?;
    parse_json_records(path, &contents)
}

fn parse_json_records(path: &str, contents: &str) -> CliResult<Vec<Vec<u8>>> {
    let votes: JsonVotes = serde_json::from_str(contents).context(ParsingJsonSnafu { path })?;
    ensure!(
        votes.format_version == FORMAT_VERSION,
        UnsupportedFormatVersionSnafu {
            path,
            version: votes.format_version,
            expected: FORMAT_VERSION
        }
    );
    let total = votes
        .records
        .iter()
        .try_fold(0u64, |acc, jr| acc.checked_add(jr.count.unwrap_or(1)))
        .filter(|n| *n <= MAX_RECORDS);
    let total = total.context(TooManyRecordsSnafu {
        path,
        limit: MAX_RECORDS,
    })?;
    let mut res: Vec<Vec<u8>> = Vec::with_capacity(total as usize);
    for jr in votes.records.iter() {
        let count = jr.count.unwrap_or(1);
        for _ in 0..count {
            res.push(jr.record.as_bytes().to_vec());
        }
    }
    debug!(
        "parse_json_records: {} entries, {} records",
        votes.records.len(),
        res.len()
    );
    Ok(res)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_counts() {
        let js = r#"{"formatVersion": 1, "records": [
            {"record": "Q00000001A00000001", "count": 2},
            {"record": "Q00000001A00000002"},
            {"record": "Q00000001A00000003", "count": 0}
        ]}"#;
        let records = parse_json_records("votes.json", js).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[2], b"Q00000001A00000002".to_vec());
    }

    #[test]
    fn rejects_oversized_counts() {
        let js = r#"{"formatVersion": 1, "records": [
            {"record": "Q00000001A00000001", "count": 1000000000000}
        ]}"#;
        assert!(matches!(
            parse_json_records("votes.json", js),
            Err(CliError::TooManyRecords { limit: MAX_RECORDS, .. })
        ));
        let js = r#"{"formatVersion": 1, "records": [
            {"record": "Q00000001A00000001", "count": 18446744073709551615},
            {"record": "Q00000001A00000002", "count": 1}
        ]}"#;
        assert!(matches!(
            parse_json_records("votes.json", js),
            Err(CliError::TooManyRecords { .. })
        ));
    }

    #[test]
    fn rejects_other_versions() {
        let js = r#"{"formatVersion": 2, "records": []}"#;
        assert!(matches!(
            parse_json_records("votes.json", js),
            Err(CliError::UnsupportedFormatVersion { version: 2, .. })
        ));
    }
}
