//! Lexical scan of free text for group mentions.

use std::collections::HashSet;

use regex::Regex;

use crate::error::ValidationError;

/// A token captured by a lexical pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexicalHit {
    /// Captured token, lowercased.
    pub token: String,
    /// Full text matched by the pattern.
    pub context: String,
}

/// Extracts candidate group tokens from text.
#[derive(Debug, Clone)]
pub struct LexicalScanner {
    patterns: Vec<Regex>,
}

impl LexicalScanner {
    /// Compiles the patterns. Each must have exactly one capture group.
    pub fn new(patterns: &[String]) -> Result<Self, ValidationError> {
        let patterns = patterns
            .iter()
            .enumerate()
            .map(|(idx, pattern)| {
                let field = format!("discovery.lexical_patterns[{idx}]");
                let re = Regex::new(pattern)
                    .map_err(|e| ValidationError::config(field.clone(), e.to_string()))?;
                if re.captures_len() != 2 {
                    return Err(ValidationError::config(
                        field,
                        "pattern must have exactly one capture group",
                    ));
                }
                Ok(re)
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    /// Distinct tokens over `texts`, in order of first capture.
    ///
    /// Within one text, patterns are applied in declared order.
    pub fn scan<'a, I>(&self, texts: I) -> Vec<LexicalHit>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut seen = HashSet::new();
        let mut hits = Vec::new();
        for text in texts {
            for pattern in &self.patterns {
                for caps in pattern.captures_iter(text) {
                    let Some(token) = caps.get(1) else { continue };
                    let token = token.as_str().trim().to_lowercase();
                    if token.is_empty() || !seen.insert(token.clone()) {
                        continue;
                    }
                    hits.push(LexicalHit {
                        token,
                        context: caps[0].to_string(),
                    });
                }
            }
        }
        hits
    }
}
