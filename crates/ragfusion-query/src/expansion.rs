//! Query expansion: ask a completion model for alternative phrasings.

use std::collections::HashSet;

use tracing::debug;

use ragfusion_core::{CompletionProvider, Result};

/// Generates paraphrased search queries for a user query.
#[derive(Debug, Clone)]
pub struct QueryExpander {
    /// Maximum number of generated queries.
    pub num_queries: usize,

    /// Sampling temperature for the completion call.
    pub temperature: f32,
}

impl Default for QueryExpander {
    fn default() -> Self {
        Self {
            num_queries: 4,
            temperature: 0.0,
        }
    }
}

impl QueryExpander {
    pub fn new(num_queries: usize, temperature: f32) -> Self {
        Self {
            num_queries,
            temperature,
        }
    }

    /// Build the prompt sent to the completion provider.
    pub fn prompt(&self, query: &str) -> String {
        format!(
            "You are a helpful assistant that generates multiple search queries based on a single input query.\n\
             Generate {} different search queries or hypothetical questions related to: {}\n\
             Output one query per line, with no numbering and no extra text.",
            self.num_queries, query
        )
    }

    /// Generate up to `num_queries` alternative queries, in generation order.
    ///
    /// Makes a single completion call; none when `num_queries` is zero.
    pub async fn expand<C>(&self, completer: &C, query: &str) -> Result<Vec<String>>
    where
        C: CompletionProvider + ?Sized,
    {
        if self.num_queries == 0 {
            return Ok(Vec::new());
        }

        let response = completer
            .complete(&self.prompt(query), self.temperature)
            .await?;
        let queries = parse_queries(&response, query, self.num_queries);

        debug!(
            "{} returned {} generated queries",
            completer.name(),
            queries.len()
        );

        Ok(queries)
    }
}

/// Split a completion response into queries.
///
/// Lines are trimmed and stripped of list markers and quotes. Empty lines,
/// repeats and copies of the original query are dropped.
pub fn parse_queries(response: &str, original: &str, limit: usize) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    seen.insert(original.trim().to_lowercase());

    response
        .lines()
        .map(clean_line)
        .filter(|line| !line.is_empty())
        .filter(|line| seen.insert(line.to_lowercase()))
        .take(limit)
        .map(str::to_string)
        .collect()
}

fn clean_line(line: &str) -> &str {
    let line = line.trim();
    let line = strip_list_marker(line).trim();
    line.trim_matches(|c: char| c == '"' || c == '\'' || c == '“' || c == '”')
        .trim()
}

fn strip_list_marker(line: &str) -> &str {
    if let Some(rest) = line
        .strip_prefix("- ")
        .or_else(|| line.strip_prefix("* "))
        .or_else(|| line.strip_prefix("• "))
    {
        return rest;
    }

    // "1." / "12)" style numbering; "1.5" is a number, not a marker
    let digits = line.chars().take_while(char::is_ascii_digit).count();
    if digits > 0 {
        let rest = &line[digits..];
        if let Some(rest) = rest.strip_prefix('.').or_else(|| rest.strip_prefix(')')) {
            if rest.is_empty() || rest.starts_with(char::is_whitespace) {
                return rest;
            }
        }
    }

    line
}
