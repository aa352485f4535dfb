//! Search index query model

use serde::{Deserialize, Serialize};
use std::fmt;

/// Fields exposed by the search index mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexField {
    RecordId,
    OwnerKey,
    Amount,
    Currency,
    CreatedAt,
    Note,
    Tags,
}

impl IndexField {
    /// Field name in the index mapping
    pub fn as_str(&self) -> &'static str {
        match self {
            IndexField::RecordId => "transactionId",
            IndexField::OwnerKey => "userId",
            IndexField::Amount => "amount",
            IndexField::Currency => "currency",
            IndexField::CreatedAt => "timestamp",
            IndexField::Note => "description",
            IndexField::Tags => "tags",
        }
    }

    /// Keyword fields match exactly; the rest are analyzed text or numbers
    pub fn is_keyword(&self) -> bool {
        matches!(
            self,
            IndexField::RecordId | IndexField::OwnerKey | IndexField::Currency | IndexField::Tags
        )
    }
}

impl fmt::Display for IndexField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Edit-distance tolerance for text matching
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Fuzziness {
    /// Exact term match
    None,
    /// Term-length dependent: 0 edits up to 2 chars, 1 up to 5, 2 beyond
    Auto,
    Fixed(u8),
}

impl Fuzziness {
    /// Maximum edit distance allowed for a term of `term_len` characters
    pub fn max_edits(&self, term_len: usize) -> usize {
        match self {
            Fuzziness::None => 0,
            Fuzziness::Auto => match term_len {
                0..=2 => 0,
                3..=5 => 1,
                _ => 2,
            },
            Fuzziness::Fixed(n) => *n as usize,
        }
    }
}

/// Search query accepted by the index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SearchQuery {
    /// Exact match on a keyword field
    Term { field: IndexField, value: String },
    /// Free text matched across several fields
    MultiMatch {
        text: String,
        fields: Vec<IndexField>,
        fuzziness: Fuzziness,
    },
}

impl SearchQuery {
    pub fn term(field: IndexField, value: impl Into<String>) -> Self {
        SearchQuery::Term {
            field,
            value: value.into(),
        }
    }

    pub fn multi_match(
        text: impl Into<String>,
        fields: impl IntoIterator<Item = IndexField>,
        fuzziness: Fuzziness,
    ) -> Self {
        SearchQuery::MultiMatch {
            text: text.into(),
            fields: fields.into_iter().collect(),
            fuzziness,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auto_fuzziness() {
        assert_eq!(Fuzziness::Auto.max_edits(2), 0);
        assert_eq!(Fuzziness::Auto.max_edits(4), 1);
        assert_eq!(Fuzziness::Auto.max_edits(9), 2);
        assert_eq!(Fuzziness::None.max_edits(9), 0);
        assert_eq!(Fuzziness::Fixed(1).max_edits(9), 1);
    }

    #[test]
    fn test_builders() {
        let q = SearchQuery::term(IndexField::OwnerKey, "alice");
        assert_eq!(
            q,
            SearchQuery::Term {
                field: IndexField::OwnerKey,
                value: "alice".to_string()
            }
        );

        let q = SearchQuery::multi_match("coffee", [IndexField::Note, IndexField::Tags], Fuzziness::Auto);
        match q {
            SearchQuery::MultiMatch { fields, .. } => assert_eq!(fields.len(), 2),
            _ => panic!("expected multi_match"),
        }
    }

    #[test]
    fn test_field_names() {
        assert_eq!(IndexField::OwnerKey.as_str(), "userId");
        assert!(IndexField::Tags.is_keyword());
        assert!(!IndexField::Note.is_keyword());
    }
}
