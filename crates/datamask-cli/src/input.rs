use serde_json::Value;

use crate::CliError;

/// Records from a JSON array document or from JSON lines (one value per
/// non-blank line).
pub fn parse_records(content: &str) -> Result<Vec<Value>, CliError> {
    let trimmed = content.trim_start();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    if trimmed.starts_with('[') {
        return match serde_json::from_str::<Value>(trimmed)? {
            Value::Array(records) => Ok(records),
            _ => Err(CliError::InvalidInput("expected a JSON array".to_string())),
        };
    }

    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            serde_json::from_str(line).map_err(|err| {
                CliError::InvalidInput(format!("line {}: {err}", index + 1))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reads_json_array() {
        let records = parse_records(" [{\"a\": 1}, {\"a\": 2}]\n").expect("array");
        assert_eq!(records, vec![json!({"a": 1}), json!({"a": 2})]);
    }

    #[test]
    fn reads_json_lines_skipping_blank_lines() {
        let records = parse_records("{\"a\": 1}\n\n{\"a\": null}\n").expect("lines");
        assert_eq!(records, vec![json!({"a": 1}), json!({"a": null})]);
    }

    #[test]
    fn reports_the_failing_line() {
        let err = parse_records("{\"a\": 1}\n{oops}\n").expect_err("bad line");
        assert!(err.to_string().contains("line 2"), "{err}");
    }

    #[test]
    fn empty_input_has_no_records() {
        assert!(parse_records("  \n").expect("empty").is_empty());
    }
}
