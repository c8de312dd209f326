//! Ledger statistics: direction totals, net, category shares, daily cells, chart series.

use std::collections::{BTreeMap, HashMap};

use uuid::Uuid;

use lifelog_domain::{
    signed_difference, Category, CategoryKind, CategoryTotal, ChartPoint, ChartSeries,
    DateScope, Direction, LedgerSummary, Transaction, UNKNOWN_CATEGORY,
};

use crate::{cancel::CancelSignal, ledger_service::LedgerService, CoreError, CoreResult};

/// Computes every statistic in a single pass over `transactions`.
///
/// Categories with no transactions never appear. A category id with no record at all is
/// reported under [`UNKNOWN_CATEGORY`]; soft-deleted categories keep their name.
pub fn aggregate(transactions: &[Transaction], categories: &[Category]) -> LedgerSummary {
    let index: HashMap<Uuid, &Category> = categories.iter().map(|c| (c.id, c)).collect();

    let mut summary = LedgerSummary::empty();
    let mut per_category: BTreeMap<String, (u64, usize, Option<CategoryKind>)> = BTreeMap::new();
    let mut chart_income: BTreeMap<String, u64> = BTreeMap::new();
    let mut chart_expense: BTreeMap<String, u64> = BTreeMap::new();

    for txn in transactions {
        let category = index.get(&txn.category_id);
        let name = category.map_or(UNKNOWN_CATEGORY, |c| c.name.as_str());
        let kind = category.map(|c| c.kind);
        let fixed = kind == Some(CategoryKind::new(txn.direction, true));

        match txn.direction {
            Direction::Income => {
                summary.income.add(txn.amount, fixed);
                *chart_income.entry(name.to_string()).or_default() += txn.amount;
            }
            Direction::Expense => {
                summary.expense.add(txn.amount, fixed);
                *chart_expense.entry(name.to_string()).or_default() += txn.amount;
            }
        }

        let entry = per_category
            .entry(name.to_string())
            .or_insert((0, 0, kind));
        entry.0 += txn.amount;
        entry.1 += 1;

        summary
            .daily
            .entry(txn.date)
            .or_default()
            .add(txn.direction, txn.amount);
    }

    summary.net = signed_difference(summary.income.total, summary.expense.total);
    let denominator = summary.income.total + summary.expense.total;
    summary.categories = per_category
        .into_iter()
        .map(|(name, (amount, count, kind))| {
            let percentage = if denominator == 0 {
                0.0
            } else {
                amount as f64 / denominator as f64 * 100.0
            };
            (
                name,
                CategoryTotal {
                    amount,
                    count,
                    kind,
                    percentage,
                },
            )
        })
        .collect();
    summary.chart = ChartSeries {
        income: chart_points(chart_income),
        expense: chart_points(chart_expense),
    };
    summary
}

/// Largest slice first; ties ordered by name.
fn chart_points(totals: BTreeMap<String, u64>) -> Vec<ChartPoint> {
    let mut points: Vec<ChartPoint> = totals
        .into_iter()
        .map(|(name, value)| ChartPoint { name, value })
        .collect();
    points.sort_by(|a, b| b.value.cmp(&a.value).then_with(|| a.name.cmp(&b.name)));
    points
}

/// Result of a boundary-safe summary load: zeroed statistics plus the failure when reading failed.
#[derive(Debug)]
pub struct SummaryReport {
    pub summary: LedgerSummary,
    pub failure: Option<CoreError>,
}

impl SummaryReport {
    pub fn is_ok(&self) -> bool {
        self.failure.is_none()
    }
}

#[derive(Clone)]
pub struct SummaryService {
    ledger: LedgerService,
}

impl SummaryService {
    pub fn new(ledger: LedgerService) -> Self {
        Self { ledger }
    }

    pub async fn summarize(&self, owner_id: Uuid, scope: DateScope) -> CoreResult<LedgerSummary> {
        let snapshot = self.ledger.load(owner_id, scope).await?;
        Ok(aggregate(&snapshot.transactions, &snapshot.categories))
    }

    /// Never fails: a read failure or cancellation yields an empty summary and the error.
    pub async fn report(
        &self,
        owner_id: Uuid,
        scope: DateScope,
        cancel: &CancelSignal,
    ) -> SummaryReport {
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(CoreError::Cancelled),
            result = self.summarize(owner_id, scope) => result,
        };
        match outcome {
            Ok(summary) => SummaryReport {
                summary,
                failure: None,
            },
            Err(err) => {
                tracing::warn!(owner_id = %owner_id, scope = %scope, error = %err, "failed to summarize ledger");
                SummaryReport {
                    summary: LedgerSummary::empty(),
                    failure: Some(err),
                }
            }
        }
    }
}
