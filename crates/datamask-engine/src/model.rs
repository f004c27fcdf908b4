use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// What happens to properties that have no bound rule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum CoverageMode {
    /// Unbound properties are replaced by their absence value.
    #[default]
    Exclude,
    /// Unbound properties are copied unchanged.
    Include,
}

impl CoverageMode {
    pub fn as_str(self) -> &'static str {
        match self {
            CoverageMode::Exclude => "exclude",
            CoverageMode::Include => "include",
        }
    }
}

impl std::fmt::Display for CoverageMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CoverageMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "exclude" => Ok(CoverageMode::Exclude),
            "include" => Ok(CoverageMode::Include),
            other => Err(format!("unknown coverage mode '{other}'")),
        }
    }
}

/// Outcome of masking one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MaskResult {
    is_success: bool,
    errors: Vec<String>,
    masked_data: String,
}

impl MaskResult {
    pub(crate) fn new(errors: Vec<String>, masked_data: String) -> Self {
        Self {
            is_success: errors.is_empty(),
            errors,
            masked_data,
        }
    }

    /// `true` exactly when no property failed.
    pub fn is_success(&self) -> bool {
        self.is_success
    }

    /// One `"<property>: <reason>"` entry per failed property.
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Serialized masked object. Failed properties are `null`.
    pub fn masked_data(&self) -> &str {
        &self.masked_data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_tracks_errors() {
        assert!(MaskResult::new(Vec::new(), "{}".to_string()).is_success());
        let failed = MaskResult::new(vec!["age: boom".to_string()], "{}".to_string());
        assert!(!failed.is_success());
        assert_eq!(failed.errors(), ["age: boom".to_string()]);
    }

    #[test]
    fn coverage_parses_and_defaults() {
        assert_eq!(CoverageMode::default(), CoverageMode::Exclude);
        assert_eq!(" Include ".parse::<CoverageMode>(), Ok(CoverageMode::Include));
        assert!("both".parse::<CoverageMode>().is_err());
    }
}
