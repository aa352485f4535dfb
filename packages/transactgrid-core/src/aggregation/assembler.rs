//! Fold a summary bucket tree into per-owner `SummaryRecord`s
//!
//! Pure and deterministic. Output order is the owner bucket order of the
//! input. Absent sub-aggregations leave their field unset; a sub-aggregation
//! of the wrong node kind, a missing `owners` node or a repeated owner key is
//! an `AggregationShape` error.

use rust_decimal::Decimal;
use std::collections::HashSet;
use transactgrid_storage::domain::{
    AggregationNode, Bucket, BucketTree, SummaryRecord, TagFrequency,
};

use super::{AVG_AMOUNT, CURRENCIES, CURRENCY_TOTAL, MAX_AMOUNT, MIN_AMOUNT, OWNERS, TOP_TAGS, TOTAL_AMOUNT};
use crate::error::{CoreError, Result};

pub fn assemble(tree: &BucketTree) -> Result<Vec<SummaryRecord>> {
    let owners = tree
        .get(OWNERS)
        .ok_or_else(|| CoreError::aggregation_shape(format!("missing '{}' aggregation", OWNERS)))?;
    let buckets = expect_buckets(owners, OWNERS)?;

    let mut seen = HashSet::with_capacity(buckets.len());
    let mut summaries = Vec::with_capacity(buckets.len());
    for bucket in buckets {
        // One owner twice means two snapshots were merged upstream
        if !seen.insert(bucket.key.as_str()) {
            return Err(CoreError::aggregation_shape(format!(
                "owner '{}' appears in more than one bucket",
                bucket.key
            )));
        }
        summaries.push(assemble_owner(bucket)?);
    }
    Ok(summaries)
}

fn expect_buckets<'a>(node: &'a AggregationNode, name: &str) -> Result<&'a [Bucket]> {
    node.as_buckets().ok_or_else(|| {
        CoreError::aggregation_shape(format!(
            "'{}' is a {} node, expected buckets",
            name,
            node.kind_name()
        ))
    })
}

/// Metric value of an optional sub-aggregation
fn metric(bucket: &Bucket, name: &str) -> Result<Option<Decimal>> {
    match bucket.sub(name) {
        None => Ok(None),
        Some(node) => node.as_metric().ok_or_else(|| {
            CoreError::aggregation_shape(format!(
                "'{}' under '{}' is a {} node, expected a metric",
                name,
                bucket.key,
                node.kind_name()
            ))
        }),
    }
}

fn assemble_owner(bucket: &Bucket) -> Result<SummaryRecord> {
    let mut summary = SummaryRecord::new(bucket.key.clone(), bucket.doc_count);
    summary.total_amount = metric(bucket, TOTAL_AMOUNT)?;
    summary.average_amount = metric(bucket, AVG_AMOUNT)?;
    summary.max_amount = metric(bucket, MAX_AMOUNT)?;
    summary.min_amount = metric(bucket, MIN_AMOUNT)?;

    if let Some(node) = bucket.sub(CURRENCIES) {
        // (currency, doc count) in first-seen order
        let mut counts: Vec<(&str, u64)> = Vec::new();
        for currency in expect_buckets(node, CURRENCIES)? {
            if let Some(total) = metric(currency, CURRENCY_TOTAL)? {
                *summary
                    .total_amount_by_currency
                    .entry(currency.key.clone())
                    .or_insert(Decimal::ZERO) += total;
            }
            match counts.iter_mut().find(|(key, _)| *key == currency.key) {
                Some((_, count)) => *count += currency.doc_count,
                None => counts.push((currency.key.as_str(), currency.doc_count)),
            }
        }

        // Strictly greater: ties keep the earlier bucket, zero counts included
        let mut best: Option<(&str, u64)> = None;
        for (key, count) in counts {
            if best.map_or(true, |(_, c)| count > c) {
                best = Some((key, count));
            }
        }
        summary.most_used_currency = best.map(|(key, _)| key.to_string());
    }

    if let Some(node) = bucket.sub(TOP_TAGS) {
        for tag in expect_buckets(node, TOP_TAGS)? {
            match summary.top_tags.iter_mut().find(|t| t.tag == tag.key) {
                Some(existing) => existing.count += tag.doc_count,
                None => summary.top_tags.push(TagFrequency {
                    tag: tag.key.clone(),
                    count: tag.doc_count,
                }),
            }
        }
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn dec(cents: i64) -> Option<Decimal> {
        Some(Decimal::new(cents, 2))
    }

    fn currency(key: &str, count: u64, total_cents: i64) -> Bucket {
        Bucket::new(key, count).with(CURRENCY_TOTAL, AggregationNode::metric(dec(total_cents)))
    }

    fn full_owner(key: &str) -> Bucket {
        Bucket::new(key, 4)
            .with(TOTAL_AMOUNT, AggregationNode::metric(dec(10000)))
            .with(AVG_AMOUNT, AggregationNode::metric(dec(2500)))
            .with(MAX_AMOUNT, AggregationNode::metric(dec(4000)))
            .with(MIN_AMOUNT, AggregationNode::metric(dec(1000)))
            .with(
                CURRENCIES,
                AggregationNode::buckets(vec![currency("USD", 3, 6000), currency("EUR", 1, 4000)]),
            )
            .with(
                TOP_TAGS,
                AggregationNode::buckets(vec![Bucket::new("food", 3), Bucket::new("rent", 1)]),
            )
    }

    fn tree(owners: Vec<Bucket>) -> BucketTree {
        BucketTree::new().with(OWNERS, AggregationNode::buckets(owners))
    }

    #[test]
    fn test_full_bucket() {
        let summaries = assemble(&tree(vec![full_owner("alice")])).unwrap();
        assert_eq!(summaries.len(), 1);

        let alice = &summaries[0];
        assert_eq!(alice.owner_key, "alice");
        assert_eq!(alice.total_transactions, 4);
        assert_eq!(alice.total_amount, dec(10000));
        assert_eq!(alice.average_amount, dec(2500));
        assert_eq!(alice.max_amount, dec(4000));
        assert_eq!(alice.min_amount, dec(1000));
        assert_eq!(alice.total_amount_by_currency.get("USD"), dec(6000).as_ref());
        assert_eq!(alice.total_amount_by_currency.get("EUR"), dec(4000).as_ref());
        assert_eq!(alice.most_used_currency.as_deref(), Some("USD"));
        assert_eq!(alice.tag_count("food"), Some(3));
        assert_eq!(alice.top_tags[1].tag, "rent");
    }

    #[test]
    fn test_missing_sub_aggregations_stay_unset() {
        let summaries = assemble(&tree(vec![Bucket::new("bob", 2)])).unwrap();
        let bob = &summaries[0];

        assert_eq!(bob.total_transactions, 2);
        assert_eq!(bob.total_amount, None);
        assert_eq!(bob.average_amount, None);
        assert_eq!(bob.max_amount, None);
        assert_eq!(bob.min_amount, None);
        assert_eq!(bob.most_used_currency, None);
        assert!(bob.total_amount_by_currency.is_empty());
        assert!(bob.top_tags.is_empty());
    }

    #[test]
    fn test_zero_metric_differs_from_unset() {
        let owner = Bucket::new("carol", 1)
            .with(TOTAL_AMOUNT, AggregationNode::metric(Some(Decimal::ZERO)))
            .with(AVG_AMOUNT, AggregationNode::metric(None));

        let carol = &assemble(&tree(vec![owner])).unwrap()[0];
        assert_eq!(carol.total_amount, Some(Decimal::ZERO));
        assert_eq!(carol.average_amount, None);
    }

    #[test]
    fn test_most_used_currency_first_seen_wins_ties() {
        let owner = Bucket::new("alice", 4).with(
            CURRENCIES,
            AggregationNode::buckets(vec![
                currency("GBP", 2, 100),
                currency("JPY", 2, 200),
                currency("CAD", 1, 300),
            ]),
        );

        let alice = &assemble(&tree(vec![owner])).unwrap()[0];
        assert_eq!(alice.most_used_currency.as_deref(), Some("GBP"));
    }

    #[test]
    fn test_most_used_currency_with_zero_counts() {
        let owner = Bucket::new("alice", 0).with(
            CURRENCIES,
            AggregationNode::buckets(vec![currency("CAD", 0, 0), currency("USD", 0, 0)]),
        );

        let alice = &assemble(&tree(vec![owner])).unwrap()[0];
        assert_eq!(alice.most_used_currency.as_deref(), Some("CAD"));
    }

    #[test]
    fn test_empty_currency_buckets_leave_unset() {
        let owner = Bucket::new("alice", 1).with(CURRENCIES, AggregationNode::buckets(Vec::new()));
        let alice = &assemble(&tree(vec![owner])).unwrap()[0];
        assert_eq!(alice.most_used_currency, None);
    }

    #[test]
    fn test_duplicate_currency_and_tag_buckets_summed() {
        let owner = Bucket::new("alice", 5)
            .with(
                CURRENCIES,
                AggregationNode::buckets(vec![
                    currency("EUR", 2, 1000),
                    currency("USD", 3, 500),
                    currency("EUR", 2, 250),
                ]),
            )
            .with(
                TOP_TAGS,
                AggregationNode::buckets(vec![
                    Bucket::new("food", 2),
                    Bucket::new("travel", 1),
                    Bucket::new("food", 1),
                ]),
            );

        let alice = &assemble(&tree(vec![owner])).unwrap()[0];
        assert_eq!(alice.total_amount_by_currency.get("EUR"), dec(1250).as_ref());
        assert_eq!(alice.most_used_currency.as_deref(), Some("EUR"));
        assert_eq!(
            alice.top_tags,
            vec![
                TagFrequency { tag: "food".into(), count: 3 },
                TagFrequency { tag: "travel".into(), count: 1 },
            ]
        );
    }

    #[test]
    fn test_input_order_preserved_and_deterministic() {
        let input = tree(vec![
            Bucket::new("zed", 1),
            full_owner("alice"),
            Bucket::new("mike", 7),
        ]);

        let first = assemble(&input).unwrap();
        let second = assemble(&input).unwrap();
        assert_eq!(first, second);

        let keys: Vec<&str> = first.iter().map(|s| s.owner_key.as_str()).collect();
        assert_eq!(keys, vec!["zed", "alice", "mike"]);
    }

    #[test]
    fn test_empty_owner_list() {
        assert!(assemble(&tree(Vec::new())).unwrap().is_empty());
    }

    #[test]
    fn test_missing_owners_is_shape_error() {
        let err = assemble(&BucketTree::new()).unwrap_err();
        assert!(matches!(err, CoreError::AggregationShape(_)));
    }

    #[test]
    fn test_wrong_node_kinds_are_shape_errors() {
        let metric_owners = BucketTree::new().with(OWNERS, AggregationNode::metric(None));
        assert!(matches!(
            assemble(&metric_owners),
            Err(CoreError::AggregationShape(_))
        ));

        let bucketed_total = Bucket::new("alice", 1)
            .with(TOTAL_AMOUNT, AggregationNode::buckets(Vec::new()));
        assert!(matches!(
            assemble(&tree(vec![bucketed_total])),
            Err(CoreError::AggregationShape(_))
        ));
    }

    #[test]
    fn test_duplicate_owner_is_shape_error() {
        let input = tree(vec![Bucket::new("alice", 1), Bucket::new("alice", 2)]);
        let err = assemble(&input).unwrap_err();
        assert!(err.to_string().contains("alice"));
    }
}
