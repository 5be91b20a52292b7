// One encoded record per line.

use crate::tally::*;

pub fn read_lines_records(path: &str) -> CliResult<Vec<Vec<u8>>> {
    let contents = fs::read_to_string(path).context(OpeningVotesSnafu { path })?;
    Ok(parse_lines(&contents))
}

fn parse_lines(contents: &str) -> Vec<Vec<u8>> {
    let mut res: Vec<Vec<u8>> = Vec::new();
    for (idx, line) in contents.lines().enumerate() {
        let record = line.trim();
        if record.is_empty() {
            debug!("parse_lines: line {}: empty, skipped", idx + 1);
            continue;
        }
        res.push(record.as_bytes().to_vec());
    }
    res
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_empty_lines() {
        let contents = "Q00000001A00000001\r\n\n  \nQ00000001A00000002\n";
        assert_eq!(
            parse_lines(contents),
            vec![
                b"Q00000001A00000001".to_vec(),
                b"Q00000001A00000002".to_vec()
            ]
        );
    }
}
