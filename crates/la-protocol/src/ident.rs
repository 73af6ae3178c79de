//! Device identification
//!
//! On connect the driver sends `IDENT`. The analyzer answers with a single
//! data token such as `LA4800 V2.13` followed by `OK`.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::ParseError;

/// Reserved identification command
pub const IDENT_COMMAND: &str = "IDENT";

static IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?P<model>LA(?:4800|3200))\s+V(?P<version>[\d.]+)")
        .expect("identification pattern is valid")
});

/// Known analyzer models
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AnalyzerModel {
    /// LA4800
    La4800,
    /// LA3200
    La3200,
}

impl AnalyzerModel {
    /// Model name as reported by the device
    pub fn name(&self) -> &'static str {
        match self {
            AnalyzerModel::La4800 => "LA4800",
            AnalyzerModel::La3200 => "LA3200",
        }
    }
}

impl fmt::Display for AnalyzerModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AnalyzerModel {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LA4800" => Ok(AnalyzerModel::La4800),
            "LA3200" => Ok(AnalyzerModel::La3200),
            other => Err(ParseError::UnknownModel(other.to_string())),
        }
    }
}

/// Parsed identification reply
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Identification {
    /// Analyzer model
    pub model: AnalyzerModel,
    /// Firmware version, e.g. `2.13`
    pub version: String,
}

impl fmt::Display for Identification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} V{}", self.model, self.version)
    }
}

impl FromStr for Identification {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let caps = IDENTIFIER
            .captures(s)
            .ok_or_else(|| ParseError::InvalidIdentification(s.to_string()))?;
        Ok(Self {
            model: caps["model"].parse()?,
            version: caps["version"].to_string(),
        })
    }
}

/// Parse the data tokens of an `IDENT` reply
///
/// The reply must consist of exactly one token.
pub fn parse_identification(tokens: &[String]) -> Result<Identification, ParseError> {
    match tokens {
        [token] => token.parse(),
        _ => Err(ParseError::UnexpectedTokenCount {
            expected: 1,
            actual: tokens.len(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_la4800() {
        let ident: Identification = "LA4800 V2.13".parse().unwrap();
        assert_eq!(ident.model, AnalyzerModel::La4800);
        assert_eq!(ident.version, "2.13");
    }

    #[test]
    fn test_parse_la3200_with_extra_whitespace() {
        let ident: Identification = "LA3200\t V1.0.4".parse().unwrap();
        assert_eq!(ident.model, AnalyzerModel::La3200);
        assert_eq!(ident.version, "1.0.4");
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert_eq!(
            "GARBAGE".parse::<Identification>(),
            Err(ParseError::InvalidIdentification("GARBAGE".into()))
        );
        assert!("LA5000 V1.0".parse::<Identification>().is_err());
        assert!("LA4800 2.13".parse::<Identification>().is_err());
    }

    #[test]
    fn test_parse_identification_requires_one_token() {
        assert_eq!(
            parse_identification(&[]),
            Err(ParseError::UnexpectedTokenCount { expected: 1, actual: 0 })
        );
        let two = vec!["LA4800 V2.13".to_string(), "X".to_string()];
        assert!(matches!(
            parse_identification(&two),
            Err(ParseError::UnexpectedTokenCount { actual: 2, .. })
        ));

        let one = vec!["LA4800 V2.13".to_string()];
        assert_eq!(
            parse_identification(&one).unwrap().to_string(),
            "LA4800 V2.13"
        );
    }

    #[test]
    fn test_model_names_round_trip() {
        for model in [AnalyzerModel::La4800, AnalyzerModel::La3200] {
            assert_eq!(model.name().parse::<AnalyzerModel>().unwrap(), model);
        }
        assert!("LA9999".parse::<AnalyzerModel>().is_err());
    }
}
