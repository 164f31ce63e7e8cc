//! SELECT metadata consumed by rewriting and merging.

use crate::value::Value;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AggregationKind {
    Count,
    Sum,
    Max,
    Min,
    Avg,
}

impl AggregationKind {
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "COUNT" => Some(AggregationKind::Count),
            "SUM" => Some(AggregationKind::Sum),
            "MAX" => Some(AggregationKind::Max),
            "MIN" => Some(AggregationKind::Min),
            "AVG" => Some(AggregationKind::Avg),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AggregationKind::Count => "COUNT",
            AggregationKind::Sum => "SUM",
            AggregationKind::Max => "MAX",
            AggregationKind::Min => "MIN",
            AggregationKind::Avg => "AVG",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Projection {
    /// `*` or `t.*`.
    Star,
    Column { expression: String, alias: Option<String> },
    Aggregation {
        /// `None` for aggregate functions with no cross-shard combination rule.
        kind: Option<AggregationKind>,
        function: String,
        distinct: bool,
        argument: String,
        alias: Option<String>,
    },
}

impl Projection {
    pub fn alias(&self) -> Option<&str> {
        match self {
            Projection::Star => None,
            Projection::Column { alias, .. } | Projection::Aggregation { alias, .. } => alias.as_deref(),
        }
    }

    fn matches(&self, expression: &str) -> bool {
        if self.alias().map_or(false, |a| a.eq_ignore_ascii_case(expression)) {
            return true;
        }
        match self {
            Projection::Column { expression: own, .. } => same_column(own, expression),
            _ => false,
        }
    }
}

/// Column equality ignoring case and table qualifiers (`o.order_id` == `order_id`).
pub fn same_column(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b) || unqualified(a).eq_ignore_ascii_case(unqualified(b))
}

pub fn unqualified(expression: &str) -> &str {
    let trimmed = expression.trim();
    let name = trimmed.rsplit('.').next().unwrap_or(trimmed);
    name.trim_matches(|c| c == '`' || c == '"' || c == '[' || c == ']')
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NullsOrder {
    First,
    Last,
}

/// What an ORDER BY / GROUP BY item points at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ItemRef {
    /// 1-based select-list position.
    Index(usize),
    Expression(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderByItem {
    pub item: ItemRef,
    pub direction: OrderDirection,
    pub nulls: NullsOrder,
}

impl OrderByItem {
    /// NULLs sort as the smallest value unless told otherwise.
    pub fn new(item: ItemRef, direction: OrderDirection) -> Self {
        let nulls = match direction {
            OrderDirection::Asc => NullsOrder::First,
            OrderDirection::Desc => NullsOrder::Last,
        };
        Self { item, direction, nulls }
    }

    pub fn asc(expression: &str) -> Self {
        Self::new(ItemRef::Expression(expression.to_string()), OrderDirection::Asc)
    }

    pub fn desc(expression: &str) -> Self {
        Self::new(ItemRef::Expression(expression.to_string()), OrderDirection::Desc)
    }

    fn same_item(&self, other: &OrderByItem) -> bool {
        match (&self.item, &other.item) {
            (ItemRef::Index(a), ItemRef::Index(b)) => a == b,
            (ItemRef::Expression(a), ItemRef::Expression(b)) => same_column(a, b),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaginationValue {
    Literal(u64),
    /// Index into the statement parameters.
    Parameter(usize),
}

impl PaginationValue {
    pub fn resolve(&self, parameters: &[Value]) -> Option<u64> {
        match self {
            PaginationValue::Literal(v) => Some(*v),
            PaginationValue::Parameter(i) => parameters
                .get(*i)
                .and_then(Value::as_i64)
                .map(|v| v.max(0) as u64),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Pagination {
    pub offset: Option<PaginationValue>,
    pub row_count: Option<PaginationValue>,
}

impl Pagination {
    pub fn offset(&self, parameters: &[Value]) -> u64 {
        self.offset.and_then(|o| o.resolve(parameters)).unwrap_or(0)
    }

    pub fn row_count(&self, parameters: &[Value]) -> Option<u64> {
        self.row_count.and_then(|r| r.resolve(parameters))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DerivedKind {
    AvgSum { projection: usize },
    AvgCount { projection: usize },
    OrderBy { item: usize },
    GroupBy { item: usize },
}

/// A column added to the select list so shard results carry what merging needs.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedColumn {
    pub kind: DerivedKind,
    pub expression: String,
    pub alias: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectContext {
    pub projections: Vec<Projection>,
    pub distinct: bool,
    pub group_by: Vec<OrderByItem>,
    pub order_by: Vec<OrderByItem>,
    pub pagination: Option<Pagination>,
}

impl SelectContext {
    pub fn has_star(&self) -> bool {
        self.projections.iter().any(|p| matches!(p, Projection::Star))
    }

    pub fn has_aggregation(&self) -> bool {
        self.projections.iter().any(|p| matches!(p, Projection::Aggregation { .. }))
    }

    /// Select-list position an item refers to, when it is in the select list.
    pub fn projection_index(&self, item: &ItemRef) -> Option<usize> {
        match item {
            ItemRef::Index(i) if *i >= 1 && *i <= self.projections.len() => Some(i - 1),
            ItemRef::Index(_) => None,
            ItemRef::Expression(expression) => self.projections.iter().position(|p| p.matches(expression)),
        }
    }

    fn is_covered(&self, item: &ItemRef) -> bool {
        self.projection_index(item).is_some() || (self.has_star() && matches!(item, ItemRef::Expression(_)))
    }

    /// Columns appended after the visible select list, in a fixed order:
    /// AVG helpers, then ORDER BY items, then GROUP BY items missing from the list.
    pub fn derived_columns(&self) -> Vec<DerivedColumn> {
        let mut derived = Vec::new();
        let mut avg_count = 0;
        for (index, projection) in self.projections.iter().enumerate() {
            if let Projection::Aggregation {
                kind: Some(AggregationKind::Avg),
                distinct,
                argument,
                ..
            } = projection
            {
                let argument = if *distinct {
                    format!("DISTINCT {}", argument)
                } else {
                    argument.clone()
                };
                derived.push(DerivedColumn {
                    kind: DerivedKind::AvgSum { projection: index },
                    expression: format!("SUM({})", argument),
                    alias: format!("AVG_DERIVED_SUM_{}", avg_count),
                });
                derived.push(DerivedColumn {
                    kind: DerivedKind::AvgCount { projection: index },
                    expression: format!("COUNT({})", argument),
                    alias: format!("AVG_DERIVED_COUNT_{}", avg_count),
                });
                avg_count += 1;
            }
        }
        let mut order_count = 0;
        for (index, item) in self.order_by.iter().enumerate() {
            if let ItemRef::Expression(expression) = &item.item {
                if !self.is_covered(&item.item) {
                    derived.push(DerivedColumn {
                        kind: DerivedKind::OrderBy { item: index },
                        expression: expression.clone(),
                        alias: format!("ORDER_BY_DERIVED_{}", order_count),
                    });
                    order_count += 1;
                }
            }
        }
        let mut group_count = 0;
        for (index, item) in self.group_by.iter().enumerate() {
            if let ItemRef::Expression(expression) = &item.item {
                let ordered_too = self.order_by.iter().any(|o| o.same_item(item));
                if !self.is_covered(&item.item) && !ordered_too {
                    derived.push(DerivedColumn {
                        kind: DerivedKind::GroupBy { item: index },
                        expression: expression.clone(),
                        alias: format!("GROUP_BY_DERIVED_{}", group_count),
                    });
                    group_count += 1;
                }
            }
        }
        derived
    }

    /// GROUP BY and ORDER BY name the same items in the same order.
    pub fn is_same_group_and_order(&self) -> bool {
        !self.group_by.is_empty()
            && self.group_by.len() == self.order_by.len()
            && self
                .group_by
                .iter()
                .zip(&self.order_by)
                .all(|(g, o)| g.same_item(o))
    }

    /// Grouping must be redone by materialising every shard row.
    pub fn needs_memory_group_merge(&self) -> bool {
        if self.distinct && self.group_by.is_empty() && !self.has_aggregation() {
            return true;
        }
        if self.group_by.is_empty() {
            return self.has_aggregation();
        }
        !self.is_same_group_and_order()
    }

    pub fn needs_group_merge(&self) -> bool {
        !self.group_by.is_empty() || self.has_aggregation() || self.distinct
    }
}
