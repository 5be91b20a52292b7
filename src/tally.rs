use log::{debug, info, warn};

use ranked_tally::*;
use snafu::{prelude::*, Snafu};

use std::fs;
use std::path::{Path, PathBuf};

use rand::rngs::OsRng;
use serde_json::json;
use serde_json::Value as JSValue;
use text_diff::print_diff;

use crate::tally::config_reader::*;

pub mod config_reader;
mod io_json;
mod io_lines;

#[derive(Debug, Snafu)]
pub enum CliError {
    #[snafu(display("Error opening file {path}"))]
    OpeningJson {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing the JSON of {path}"))]
    ParsingJson {
        source: serde_json::Error,
        path: String,
    },
    #[snafu(display("Error serializing the summary"))]
    WritingJson { source: serde_json::Error },
    #[snafu(display("Error writing the summary to {path}"))]
    WritingSummary {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error opening the vote file {path}"))]
    OpeningVotes {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("{path}: unsupported format version {version}, expected {expected}"))]
    UnsupportedFormatVersion {
        path: String,
        version: u32,
        expected: u32,
    },
    #[snafu(display("{path}: more than {limit} records"))]
    TooManyRecords { path: String, limit: u64 },
    #[snafu(display("Provider not implemented {provider:?}"))]
    UnknownProvider { provider: String },
    #[snafu(display("The configuration file has no parent directory"))]
    MissingParentDir {},
    #[snafu(display("No vote source in the configuration"))]
    NoVoteSource {},
    #[snafu(display("Tally failed: {source}"))]
    Tally { source: TallyError },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type CliResult<T> = Result<T, CliError>;

fn read_vote_source(root_p: &Path, vs: &VoteSourceConfig) -> CliResult<Vec<Vec<u8>>> {
    let p: PathBuf = root_p.join(&vs.file_path);
    let path = p.as_path().display().to_string();
    info!("Attempting to read vote file {:?}", path);
    match vs.provider.as_str() {
        "lines" => io_lines::read_lines_records(&path),
        "json" => io_json::read_json_records(&path),
        x => UnknownProviderSnafu {
            provider: x.to_string(),
        }
        .fail(),
    }
}

/// Display value of a vote total. Presentation only: the results keep full precision.
fn display_votes(x: f64) -> String {
    format!("{:.6}", x)
}

fn log_outcome(result: &ElectionResult) {
    for (qid, res) in result.questions.iter() {
        match res {
            QuestionResult::Stv(stv) => {
                if let Some(last) = stv.rounds.last() {
                    info!(
                        "Question {}: {} round(s), quota {}",
                        qid,
                        stv.rounds.len(),
                        display_votes(last.quota)
                    );
                    for cid in stv.elected.iter() {
                        let total = last.rankings.get(cid).map(|r| r.total).unwrap_or(0.0);
                        info!("Question {}: elected {} with {}", qid, cid, display_votes(total));
                    }
                }
                for tie in stv.ties.iter() {
                    warn!(
                        "Question {}: round {:?}: unresolved tie between {:?} for {} seat(s)",
                        qid, tie.round, tie.candidates, tie.seats
                    );
                }
            }
            QuestionResult::Schulze(schulze) => {
                info!("Question {}: ranking {:?}", qid, schulze.ranking);
                if let Some(tie) = &schulze.tie {
                    warn!("Question {}: unresolved tie between {:?}", qid, tie.candidates);
                }
            }
            QuestionResult::Plurality(plurality) => {
                for cid in plurality.ranking.iter() {
                    info!(
                        "Question {}: {}: {} vote(s)",
                        qid,
                        cid,
                        plurality.totals.get(cid).copied().unwrap_or(0)
                    );
                }
                if let Some(tie) = &plurality.tie {
                    warn!(
                        "Question {}: unresolved tie between {:?} for {} seat(s)",
                        qid, tie.candidates, tie.seats
                    );
                }
            }
        }
    }
}

fn build_summary_js(config: &TallyConfig, result: &ElectionResult) -> CliResult<JSValue> {
    let c = OutputConfig {
        contest: config.output_settings.contest_name.clone(),
        date: config.output_settings.contest_date.clone(),
        jurisdiction: config.output_settings.contest_jurisdiction.clone(),
    };
    let results = serde_json::to_value(&result.questions).context(WritingJsonSnafu {})?;
    Ok(json!({
        "config": c,
        "results": results }))
}

fn write_summary(path: &str, pretty_js: &str) -> CliResult<()> {
    if path == "stdout" {
        println!("{}", pretty_js);
        return Ok(());
    }
    info!("Writing the summary to {:?}", path);
    fs::write(path, pretty_js).context(WritingSummarySnafu { path })
}

pub fn run_election(
    config_path: &str,
    out: Option<String>,
    check_summary_path: Option<String>,
) -> CliResult<()> {
    let config_p = Path::new(config_path);
    let config = read_config(config_path)?;
    info!("config: {:?}", config.output_settings);
    debug!("election: {:?}", config.election);

    ensure!(!config.vote_sources.is_empty(), NoVoteSourceSnafu {});

    let root_p = config_p.parent().context(MissingParentDirSnafu {})?;
    let mut records: Vec<Vec<u8>> = Vec::new();
    for vs in config.vote_sources.iter() {
        let mut file_records = read_vote_source(root_p, vs)?;
        records.append(&mut file_records);
    }
    info!("{} records read", records.len());

    let crypt = resolve_crypt(config.election.crypt.as_deref()).context(TallySnafu {})?;
    let tallier = ElectionTallier::new(&config.election).context(TallySnafu {})?;
    let result = tallier
        .run(&records, crypt.as_ref(), &mut OsRng)
        .context(TallySnafu {})?;
    log_outcome(&result);

    // Assemble the final json
    let result_js = build_summary_js(&config, &result)?;
    let pretty_js_stats = serde_json::to_string_pretty(&result_js).context(WritingJsonSnafu {})?;

    let out_path = match (out, &config.output_settings.output_directory) {
        (Some(p), _) => Some(p),
        (None, Some(dir)) => Some(
            root_p
                .join(dir)
                .join("summary.json")
                .display()
                .to_string(),
        ),
        (None, None) => None,
    };
    if let Some(p) = out_path {
        write_summary(&p, &pretty_js_stats)?;
    }

    // The reference summary, if provided for comparison
    if let Some(summary_p) = check_summary_path {
        let summary_ref = read_summary(&summary_p)?;
        let pretty_js_summary_ref =
            serde_json::to_string_pretty(&summary_ref).context(WritingJsonSnafu {})?;
        if pretty_js_summary_ref != pretty_js_stats {
            warn!("Found differences with the reference string");
            print_diff(
                pretty_js_summary_ref.as_str(),
                pretty_js_stats.as_ref(),
                "\n",
            );
            whatever!("Difference detected between calculated summary and reference summary")
        }
        info!("The summary matches the reference {:?}", summary_p);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use snafu::ErrorCompat;

    fn run_election_test(test_name: &str, config_lpath: &str, summary_lpath: &str) {
        let _ = env_logger::try_init();
        let test_dir = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/data");
        info!("Running test {}", test_name);
        let res = run_election(
            &format!("{}/{}/{}", test_dir, test_name, config_lpath),
            None,
            Some(format!("{}/{}/{}", test_dir, test_name, summary_lpath)),
        );
        if let Err(e) = &res {
            warn!("Error occurred {:?}", e);
            eprintln!("An error occurred {}", e);
            if let Some(bt) = ErrorCompat::backtrace(e) {
                eprintln!("trace: {}", bt);
            }
        }
        assert!(res.is_ok());
    }

    fn test_wrapper(test_name: &str) {
        run_election_test(
            test_name,
            format!("{}_config.json", test_name).as_str(),
            format!("{}_expected_summary.json", test_name).as_str(),
        )
    }

    #[test]
    fn everyone_gets_eliminated() {
        test_wrapper("everyone_gets_eliminated");
    }

    #[test]
    fn schulze_cycle() {
        test_wrapper("schulze_cycle");
    }

    #[test]
    fn plurality_tie() {
        test_wrapper("plurality_tie");
    }

    #[test]
    fn reference_mismatch_fails() {
        let test_dir = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/data");
        let res = run_election(
            &format!("{}/schulze_cycle/schulze_cycle_config.json", test_dir),
            None,
            Some(format!(
                "{}/plurality_tie/plurality_tie_expected_summary.json",
                test_dir
            )),
        );
        assert!(matches!(res, Err(CliError::Whatever { .. })));
    }

    #[test]
    fn unknown_provider_fails() {
        let res = read_vote_source(
            Path::new("."),
            &VoteSourceConfig {
                provider: "ess".to_string(),
                file_path: "votes.xlsx".to_string(),
            },
        );
        assert!(matches!(res, Err(CliError::UnknownProvider { .. })));
    }

    #[test]
    fn display_rounds_to_six_decimals() {
        assert_eq!(display_votes(2500.000001), "2500.000001");
        assert_eq!(display_votes(1.0 / 3.0), "0.333333");
    }
}
