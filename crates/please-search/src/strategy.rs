use std::str::FromStr;

use async_trait::async_trait;
use please_index::IndexedTool;
use serde::Serialize;

use crate::error::SearchError;

/// The four search modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    Regex,
    Bm25,
    Embedding,
    Hybrid,
}

impl SearchMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Regex => "regex",
            Self::Bm25 => "bm25",
            Self::Embedding => "embedding",
            Self::Hybrid => "hybrid",
        }
    }
}

impl std::fmt::Display for SearchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchMode {
    type Err = SearchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "regex" => Ok(Self::Regex),
            "bm25" => Ok(Self::Bm25),
            "embedding" => Ok(Self::Embedding),
            "hybrid" => Ok(Self::Hybrid),
            other => Err(SearchError::UnknownMode(other.to_string())),
        }
    }
}

/// Per-request knobs
#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// Maximum number of results
    pub top_k: usize,
    /// Minimum score to include, if any
    pub threshold: Option<f32>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            top_k: 10,
            threshold: None,
        }
    }
}

/// One ranked result
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub description: String,
    /// Score in `[0, 1]`
    pub score: f32,
    pub match_type: SearchMode,
}

impl SearchHit {
    pub(crate) fn from_tool(tool: &IndexedTool, score: f32, match_type: SearchMode) -> Self {
        Self {
            name: tool.tool.name.clone(),
            title: tool.tool.title.clone(),
            description: tool.tool.description.clone(),
            score,
            match_type,
        }
    }
}

/// Contract all four strategies implement
#[async_trait]
pub trait SearchStrategy: Send + Sync {
    fn mode(&self) -> SearchMode;

    async fn initialize(&self) -> Result<(), SearchError>;

    /// Rank `tools` against `query`; results are sorted descending by score
    /// and truncated to `top_k`, with every score at or above the threshold.
    async fn search(
        &self,
        query: &str,
        tools: &[IndexedTool],
        options: &SearchOptions,
    ) -> Result<Vec<SearchHit>, SearchError>;

    async fn dispose(&self);
}

/// Shared tail of every strategy: threshold filter, stable descending sort
/// (ties keep iteration order), topK cut.
pub(crate) fn finalize_hits(mut hits: Vec<SearchHit>, options: &SearchOptions) -> Vec<SearchHit> {
    if let Some(threshold) = options.threshold {
        hits.retain(|hit| hit.score >= threshold);
    }

    hits.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    hits.truncate(options.top_k);
    hits
}

/// Round to three decimals
pub(crate) fn round3(value: f32) -> f32 {
    (value * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(name: &str, score: f32) -> SearchHit {
        SearchHit {
            name: name.to_string(),
            title: None,
            description: String::new(),
            score,
            match_type: SearchMode::Regex,
        }
    }

    #[test]
    fn finalize_sorts_filters_and_truncates() {
        let hits = vec![hit("low", 0.2), hit("high", 0.9), hit("mid", 0.5)];
        let options = SearchOptions {
            top_k: 2,
            threshold: Some(0.3),
        };

        let out = finalize_hits(hits, &options);
        let names: Vec<&str> = out.iter().map(|h| h.name.as_str()).collect();
        assert_eq!(names, vec!["high", "mid"]);
    }

    #[test]
    fn ties_keep_iteration_order() {
        let hits = vec![hit("first", 0.5), hit("second", 0.5), hit("third", 0.5)];
        let out = finalize_hits(hits, &SearchOptions::default());
        let names: Vec<&str> = out.iter().map(|h| h.name.as_str()).collect();
        assert_eq!(names, vec!["first", "second", "third"]);
    }

    #[test]
    fn mode_parses_and_prints() {
        for mode in [
            SearchMode::Regex,
            SearchMode::Bm25,
            SearchMode::Embedding,
            SearchMode::Hybrid,
        ] {
            assert_eq!(mode.as_str().parse::<SearchMode>().expect("parse"), mode);
        }
        assert!("fuzzy".parse::<SearchMode>().is_err());
    }

    #[test]
    fn round3_rounds_half_up() {
        assert_eq!(round3(0.123_449), 0.123);
        assert_eq!(round3(0.123_5), 0.124);
        assert_eq!(round3(1.0), 1.0);
    }
}
