use crate::tally::*;

use serde::{Deserialize, Serialize};
use serde_json::Value as JSValue;

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct OutputSettings {
    #[serde(rename = "contestName")]
    pub contest_name: String,
    #[serde(rename = "outputDirectory")]
    pub output_directory: Option<String>,
    #[serde(rename = "contestDate")]
    pub contest_date: Option<String>,
    #[serde(rename = "contestJurisdiction")]
    pub contest_jurisdiction: Option<String>,
}

/// The contest description written at the top of the summary.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub contest: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jurisdiction: Option<String>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct VoteSourceConfig {
    pub provider: String,
    #[serde(rename = "filePath")]
    pub file_path: String,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct TallyConfig {
    #[serde(rename = "outputSettings")]
    pub output_settings: OutputSettings,
    #[serde(rename = "voteSources")]
    pub vote_sources: Vec<VoteSourceConfig>,
    pub election: Election,
}

pub fn read_config(path: &str) -> CliResult<TallyConfig> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    debug!("read_config: {} bytes read from {:?}", contents.len(), path);
    serde_json::from_str(&contents).context(ParsingJsonSnafu { path })
}

pub fn read_summary(path: &str) -> CliResult<JSValue> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let js: JSValue = serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu { path })?;
    debug!("read_summary: {:?}", js["config"]);
    Ok(js)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_configuration() {
        let js = r#"{
            "outputSettings": {"contestName": "Board", "contestDate": "2024-06-01"},
            "voteSources": [{"provider": "lines", "filePath": "votes.txt"}],
            "election": {
                "ballotType": "preferential",
                "tallyMethod": "stv",
                "stvRules": {"tiebreakMode": {"random": 3}},
                "questions": [{"id": 1, "options": [1, 2, 3], "seats": 2}]
            }
        }"#;
        let config: TallyConfig = serde_json::from_str(js).unwrap();
        assert_eq!(config.output_settings.contest_name, "Board");
        assert_eq!(config.output_settings.output_directory, None);
        assert_eq!(config.vote_sources[0].provider, "lines");
        assert_eq!(config.election.questions[0].seats, 2);
        assert_eq!(
            config.election.stv_rules.tiebreak_mode,
            TieBreakMode::Random(3)
        );
        assert_eq!(
            config.election.stv_rules.elimination_algorithm,
            EliminationAlgorithm::Ties
        );
    }

    #[test]
    fn output_config_omits_missing_fields() {
        let c = OutputConfig {
            contest: "Board".to_string(),
            date: None,
            jurisdiction: Some("Springfield".to_string()),
        };
        assert_eq!(
            serde_json::to_value(&c).unwrap(),
            serde_json::json!({"contest": "Board", "jurisdiction": "Springfield"})
        );
    }
}
