//! In-memory search index
//!
//! Evaluates term and fuzzy multi-match queries plus nested bucket
//! aggregations over a document map keyed by record id. Re-indexing the same
//! id replaces the document, so delivery is idempotent.

use async_trait::async_trait;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};

use crate::domain::{
    AggregationKind, AggregationNode, AggregationSpec, Bucket, BucketTree, Fuzziness, IndexField,
    Record, RecordId, SearchIndex, SearchQuery,
};
use crate::Result;

/// Default bucket cap for terms aggregations without an explicit size
pub const DEFAULT_TERMS_SIZE: usize = 10;

#[derive(Default)]
pub struct MemorySearchIndex {
    documents: RwLock<BTreeMap<RecordId, Record>>,
}

impl MemorySearchIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: &RecordId) -> bool {
        self.documents.read().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.documents.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SearchIndex for MemorySearchIndex {
    async fn index(&self, document: &Record) -> Result<()> {
        self.documents.write().insert(document.id, document.clone());
        Ok(())
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.documents.read().len() as u64)
    }

    async fn search(&self, query: &SearchQuery, size: usize) -> Result<Vec<Record>> {
        let documents = self.documents.read();
        let mut hits: Vec<Record> = documents
            .values()
            .filter(|doc| matches_query(doc, query))
            .cloned()
            .collect();
        hits.sort_by(Record::newest_first);
        hits.truncate(size);
        Ok(hits)
    }

    async fn aggregate(&self, spec: &[AggregationSpec]) -> Result<BucketTree> {
        let documents = self.documents.read();
        let all: Vec<&Record> = documents.values().collect();

        let mut tree = BucketTree::new();
        for agg in spec {
            tree.aggregations
                .insert(agg.name.clone(), evaluate(agg, &all));
        }
        Ok(tree)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Query evaluation
// ═══════════════════════════════════════════════════════════════════════════

fn field_values(doc: &Record, field: IndexField) -> Vec<String> {
    match field {
        IndexField::RecordId => vec![doc.id.to_string()],
        IndexField::OwnerKey => vec![doc.owner_key.clone()],
        IndexField::Amount => vec![doc.amount.normalize().to_string()],
        IndexField::Currency => vec![doc.currency.as_str().to_string()],
        IndexField::CreatedAt => vec![doc.created_at.to_rfc3339()],
        IndexField::Note => doc.note.iter().cloned().collect(),
        IndexField::Tags => doc.tags.iter().cloned().collect(),
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

fn matches_query(doc: &Record, query: &SearchQuery) -> bool {
    match query {
        SearchQuery::Term { field, value } => {
            field_values(doc, *field).iter().any(|v| v == value)
        }
        SearchQuery::MultiMatch {
            text,
            fields,
            fuzziness,
        } => {
            let terms = tokenize(text);
            if terms.is_empty() {
                return false;
            }
            let doc_tokens: Vec<String> = fields
                .iter()
                .flat_map(|f| field_values(doc, *f))
                .flat_map(|v| tokenize(&v))
                .collect();

            // Any query term matching any field token is a hit
            terms
                .iter()
                .any(|term| doc_tokens.iter().any(|tok| fuzzy_eq(term, tok, *fuzziness)))
        }
    }
}

fn fuzzy_eq(term: &str, token: &str, fuzziness: Fuzziness) -> bool {
    let max_edits = fuzziness.max_edits(term.chars().count());
    if max_edits == 0 {
        return term == token;
    }
    levenshtein_distance(term, token) <= max_edits
}

/// Character-level edit distance (two-row)
fn levenshtein_distance(s1: &str, s2: &str) -> usize {
    let b: Vec<char> = s2.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, c1) in s1.chars().enumerate() {
        curr[0] = i + 1;
        for (j, c2) in b.iter().enumerate() {
            let cost = usize::from(c1 != *c2);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

// ═══════════════════════════════════════════════════════════════════════════
// Aggregation evaluation
// ═══════════════════════════════════════════════════════════════════════════

fn amounts(docs: &[&Record], field: IndexField) -> Vec<Decimal> {
    match field {
        IndexField::Amount => docs.iter().map(|d| d.amount).collect(),
        _ => Vec::new(),
    }
}

fn evaluate(spec: &AggregationSpec, docs: &[&Record]) -> AggregationNode {
    match &spec.kind {
        AggregationKind::Terms { field, size } => {
            let mut groups: HashMap<String, Vec<&Record>> = HashMap::new();
            for doc in docs {
                for value in field_values(doc, *field) {
                    groups.entry(value).or_default().push(*doc);
                }
            }

            let mut ranked: Vec<(String, Vec<&Record>)> = groups.into_iter().collect();
            ranked.sort_by(|a, b| b.1.len().cmp(&a.1.len()).then_with(|| a.0.cmp(&b.0)));
            ranked.truncate(size.unwrap_or(DEFAULT_TERMS_SIZE));

            let buckets = ranked
                .into_iter()
                .map(|(key, members)| {
                    let mut bucket = Bucket::new(key, members.len() as u64);
                    for sub in &spec.subs {
                        bucket
                            .aggregations
                            .insert(sub.name.clone(), evaluate(sub, &members));
                    }
                    bucket
                })
                .collect();
            AggregationNode::buckets(buckets)
        }
        AggregationKind::Sum { field } => {
            // Sum over no documents is zero, not missing
            AggregationNode::metric(Some(amounts(docs, *field).into_iter().sum()))
        }
        AggregationKind::Avg { field } => {
            let values = amounts(docs, *field);
            let avg = if values.is_empty() {
                None
            } else {
                let total: Decimal = values.iter().copied().sum();
                Some(total / Decimal::from(values.len()))
            };
            AggregationNode::metric(avg)
        }
        AggregationKind::Max { field } => {
            AggregationNode::metric(amounts(docs, *field).into_iter().max())
        }
        AggregationKind::Min { field } => {
            AggregationNode::metric(amounts(docs, *field).into_iter().min())
        }
    }
}
