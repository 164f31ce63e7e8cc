//! Maps the statement's ORDER BY, GROUP BY and aggregates onto result columns.

use super::compare::SortKey;
use crate::context::select::same_column;
use crate::context::{AggregationKind, DerivedColumn, DerivedKind, ItemRef, OrderByItem, Projection, SelectContext};
use crate::error::MergeError;

/// One aggregate projection and the columns holding its partials.
#[derive(Debug, Clone)]
pub struct AggregationColumn {
    pub kind: AggregationKind,
    pub column: usize,
    /// Columns fed to the aggregation unit: the partial itself, or SUM and COUNT for AVG.
    pub inputs: Vec<usize>,
}

#[derive(Debug, Clone)]
pub struct MergeLayout {
    pub columns: Vec<String>,
    /// Columns visible to the caller; derived columns follow them.
    pub visible: usize,
    pub order_keys: Vec<SortKey>,
    pub group_keys: Vec<SortKey>,
    pub aggregations: Vec<AggregationColumn>,
}

impl MergeLayout {
    pub fn new(select: &SelectContext, columns: Vec<String>, derived: &[DerivedColumn]) -> Result<Self, MergeError> {
        let visible = columns.len().checked_sub(derived.len()).ok_or(MergeError::ColumnIndexOutOfRange {
            index: derived.len(),
            count: columns.len(),
        })?;
        let resolver = Resolver {
            select,
            columns: &columns,
            derived,
            visible,
        };
        let order_keys = select
            .order_by
            .iter()
            .map(|item| resolver.sort_key(item))
            .collect::<Result<Vec<_>, _>>()?;
        let group_keys = select
            .group_by
            .iter()
            .map(|item| resolver.sort_key(item))
            .collect::<Result<Vec<_>, _>>()?;
        let aggregations = resolver.aggregations()?;
        Ok(Self {
            columns,
            visible,
            order_keys,
            group_keys,
            aggregations,
        })
    }

    pub fn group_columns(&self) -> Vec<usize> {
        self.group_keys.iter().map(|k| k.column).collect()
    }

    pub fn visible_columns(&self) -> Vec<usize> {
        (0..self.visible).collect()
    }
}

struct Resolver<'a> {
    select: &'a SelectContext,
    columns: &'a [String],
    derived: &'a [DerivedColumn],
    visible: usize,
}

impl Resolver<'_> {
    fn sort_key(&self, item: &OrderByItem) -> Result<SortKey, MergeError> {
        Ok(SortKey {
            column: self.item_column(&item.item)?,
            direction: item.direction,
            nulls: item.nulls,
        })
    }

    fn item_column(&self, item: &ItemRef) -> Result<usize, MergeError> {
        match item {
            ItemRef::Index(i) => {
                if *i >= 1 && *i <= self.visible {
                    Ok(i - 1)
                } else {
                    Err(MergeError::ColumnIndexOutOfRange {
                        index: *i,
                        count: self.visible,
                    })
                }
            }
            ItemRef::Expression(expression) => {
                if !self.select.has_star() {
                    if let Some(index) = self.select.projection_index(item).filter(|i| *i < self.visible) {
                        return Ok(index);
                    }
                }
                if let Some(index) = self.columns[..self.visible]
                    .iter()
                    .position(|label| same_column(label, expression))
                {
                    return Ok(index);
                }
                if let Some(offset) = self.derived.iter().position(|d| {
                    matches!(d.kind, DerivedKind::OrderBy { .. } | DerivedKind::GroupBy { .. })
                        && same_column(&d.expression, expression)
                }) {
                    return Ok(self.visible + offset);
                }
                Err(MergeError::ColumnNotFound(expression.clone()))
            }
        }
    }

    fn derived_index(&self, wanted: DerivedKind) -> Option<usize> {
        self.derived.iter().position(|d| d.kind == wanted).map(|o| self.visible + o)
    }

    fn aggregations(&self) -> Result<Vec<AggregationColumn>, MergeError> {
        let mut aggregations = Vec::new();
        for (index, projection) in self.select.projections.iter().enumerate() {
            let Projection::Aggregation {
                kind,
                function,
                distinct,
                argument,
                alias,
            } = projection
            else {
                continue;
            };
            let kind = match kind {
                Some(kind) if !*distinct => *kind,
                _ => {
                    let function = if *distinct {
                        format!("{}(DISTINCT {})", function, argument)
                    } else {
                        function.clone()
                    };
                    return Err(MergeError::UnsupportedAggregateCombination { function });
                }
            };
            let label = alias.clone().unwrap_or_else(|| format!("{}({})", function, argument));
            let column = if self.select.has_star() {
                self.columns[..self.visible]
                    .iter()
                    .position(|c| same_column(c, &label))
                    .ok_or_else(|| MergeError::ColumnNotFound(label.clone()))?
            } else if index < self.visible {
                index
            } else {
                return Err(MergeError::ColumnIndexOutOfRange {
                    index,
                    count: self.visible,
                });
            };
            let inputs = match kind {
                AggregationKind::Avg => {
                    let sum = self.derived_index(DerivedKind::AvgSum { projection: index });
                    let count = self.derived_index(DerivedKind::AvgCount { projection: index });
                    match (sum, count) {
                        (Some(sum), Some(count)) => vec![sum, count],
                        _ => return Err(MergeError::ColumnNotFound(format!("SUM/COUNT helpers of {}", label))),
                    }
                }
                _ => vec![column],
            };
            aggregations.push(AggregationColumn { kind, column, inputs });
        }
        Ok(aggregations)
    }
}
