use async_trait::async_trait;
use please_index::IndexedTool;

use crate::error::SearchError;
use crate::strategy::{SearchHit, SearchMode, SearchOptions, SearchStrategy, finalize_hits, round3};

/// Case-insensitive pattern matching over searchable text
///
/// A query that fails to compile as a regex is escaped and retried as a
/// literal, so `read(` still matches tools containing that exact substring.
pub struct RegexStrategy;

impl RegexStrategy {
    pub fn new() -> Self {
        Self
    }

    fn compile(query: &str) -> ::regex::Regex {
        ::regex::RegexBuilder::new(query)
            .case_insensitive(true)
            .build()
            .unwrap_or_else(|_| {
                ::regex::RegexBuilder::new(&::regex::escape(query))
                    .case_insensitive(true)
                    .build()
                    .expect("escaped pattern always compiles")
            })
    }

    /// Bounded composite score over all matches in one document
    fn score(pattern: &::regex::Regex, query: &str, text: &str) -> Option<f32> {
        let matches: Vec<::regex::Match<'_>> = pattern.find_iter(text).collect();
        let first = matches.first()?;

        let text_len = text.len().max(1) as f32;
        let matched_chars: usize = matches.iter().map(|m| m.len()).sum();

        let density = matched_chars as f32 / text_len;
        let match_count = matches.len() as f32;
        let position_bonus = 1.0 - first.start() as f32 / text_len;

        let query_lower = query.to_lowercase();
        let exact_bonus = if matches
            .iter()
            .any(|m| m.as_str().to_lowercase() == query_lower)
        {
            0.3
        } else {
            0.0
        };

        let score = (2.0 * density + 0.1 * match_count + 0.2 * position_bonus + exact_bonus)
            .min(1.0);
        Some(round3(score))
    }
}

impl Default for RegexStrategy {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SearchStrategy for RegexStrategy {
    fn mode(&self) -> SearchMode {
        SearchMode::Regex
    }

    async fn initialize(&self) -> Result<(), SearchError> {
        Ok(())
    }

    async fn search(
        &self,
        query: &str,
        tools: &[IndexedTool],
        options: &SearchOptions,
    ) -> Result<Vec<SearchHit>, SearchError> {
        let pattern = Self::compile(query);

        let hits = tools
            .iter()
            .filter_map(|tool| {
                Self::score(&pattern, query, &tool.searchable_text)
                    .map(|score| SearchHit::from_tool(tool, score, SearchMode::Regex))
            })
            .collect();

        Ok(finalize_hits(hits, options))
    }

    async fn dispose(&self) {}
}
