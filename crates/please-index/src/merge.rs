use std::collections::HashMap;

use crate::types::{Bm25Stats, IndexedTool};

/// Merge two scoped tool sets, project scope overriding user scope
///
/// Iteration order is user-then-project: user tools keep their positions
/// (with the project record substituted on a name collision), then
/// project-only tools follow in their own order.
pub fn merge_indexed_tools(project: Vec<IndexedTool>, user: Vec<IndexedTool>) -> Vec<IndexedTool> {
    let mut project_slots: Vec<Option<IndexedTool>> = project.into_iter().map(Some).collect();
    let project_index: HashMap<String, usize> = project_slots
        .iter()
        .enumerate()
        .filter_map(|(i, slot)| slot.as_ref().map(|t| (t.tool.name.clone(), i)))
        .collect();

    let mut merged = Vec::with_capacity(project_slots.len() + user.len());

    for tool in user {
        match project_index
            .get(&tool.tool.name)
            .and_then(|&i| project_slots[i].take())
        {
            Some(project_tool) => {
                tracing::debug!(tool = %tool.tool.name, "project index overrides user index");
                merged.push(project_tool);
            }
            None => merged.push(tool),
        }
    }

    merged.extend(project_slots.into_iter().flatten());
    merged
}

/// Combine BM25 statistics from two corpora
///
/// Document counts and per-term document frequencies are summed; the average
/// document length is weighted by each corpus's document count.
pub fn merge_bm25_stats(project: &Bm25Stats, user: &Bm25Stats) -> Bm25Stats {
    let total_documents = project.total_documents + user.total_documents;

    let avg_doc_length = if total_documents == 0 {
        0.0
    } else {
        (project.avg_doc_length * project.total_documents as f64
            + user.avg_doc_length * user.total_documents as f64)
            / total_documents as f64
    };

    let mut document_frequencies = project.document_frequencies.clone();
    for (term, df) in &user.document_frequencies {
        *document_frequencies.entry(term.clone()).or_insert(0) += df;
    }

    Bm25Stats {
        avg_doc_length,
        document_frequencies,
        total_documents,
    }
}
