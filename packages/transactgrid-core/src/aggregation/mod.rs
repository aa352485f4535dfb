//! Summary aggregation: request shape and response assembly

mod assembler;

pub use assembler::assemble;

use transactgrid_storage::domain::{AggregationSpec, IndexField};

/// Top-level terms aggregation, one bucket per owner
pub const OWNERS: &str = "owners";
pub const TOTAL_AMOUNT: &str = "total_amount";
pub const AVG_AMOUNT: &str = "avg_amount";
pub const MAX_AMOUNT: &str = "max_amount";
pub const MIN_AMOUNT: &str = "min_amount";
/// Per-owner terms on currency, each bucket carrying `currency_total`
pub const CURRENCIES: &str = "currencies";
pub const CURRENCY_TOTAL: &str = "currency_total";
pub const TOP_TAGS: &str = "top_tags";

/// Aggregation request whose response `assemble` understands
///
/// `top_n` caps the tags reported per owner; the assembler never truncates.
pub fn summary_spec(top_n: usize) -> Vec<AggregationSpec> {
    vec![AggregationSpec::terms(OWNERS, IndexField::OwnerKey)
        .sub(AggregationSpec::sum(TOTAL_AMOUNT, IndexField::Amount))
        .sub(AggregationSpec::avg(AVG_AMOUNT, IndexField::Amount))
        .sub(AggregationSpec::max(MAX_AMOUNT, IndexField::Amount))
        .sub(AggregationSpec::min(MIN_AMOUNT, IndexField::Amount))
        .sub(
            AggregationSpec::terms(CURRENCIES, IndexField::Currency)
                .sub(AggregationSpec::sum(CURRENCY_TOTAL, IndexField::Amount)),
        )
        .sub(AggregationSpec::terms(TOP_TAGS, IndexField::Tags).size(top_n))]
}
