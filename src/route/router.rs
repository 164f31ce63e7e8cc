//! Routing engine.

use super::{RouteContext, RouteMapper, RouteType, RouteUnit};
use crate::context::{HintContext, LogicSql, ShardingCondition, ShardingConditions, StatementKind};
use crate::error::RoutingError;
use crate::rule::{BindingTableRule, DataNode, ShardingRule, TableRule};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

type RouteResult<T> = std::result::Result<T, RoutingError>;

/// Computes the [`RouteContext`] of a statement from its tables, sharding
/// conditions and hints.
///
/// The router is shared across statements. Its only state is the
/// data source picked for unicast reads of each table set, so repeated reads
/// of the same broadcast tables keep hitting one data source.
pub struct ShardingRouter {
    rule: Arc<ShardingRule>,
    unicast_cache: RwLock<HashMap<Vec<String>, String>>,
    next_unicast: AtomicUsize,
}

impl ShardingRouter {
    pub fn new(rule: Arc<ShardingRule>) -> Self {
        Self {
            rule,
            unicast_cache: RwLock::new(HashMap::new()),
            next_unicast: AtomicUsize::new(0),
        }
    }

    pub fn rule(&self) -> &Arc<ShardingRule> {
        &self.rule
    }

    #[instrument(name = "router.route", skip_all, fields(kind = ?logic_sql.kind, tables = ?logic_sql.tables, route_type = tracing::field::Empty))]
    pub fn route(
        &self,
        logic_sql: &LogicSql,
        conditions: &ShardingConditions,
        hint: &HintContext,
    ) -> RouteResult<RouteContext> {
        if let Some(forced) = hint.data_source() {
            if !self.rule.data_source_names().iter().any(|ds| ds == forced) {
                return Err(RoutingError::NoTargetFound {
                    table: logic_sql.tables.first().cloned().unwrap_or_default(),
                    reason: format!("hinted data source '{}' is not configured", forced),
                });
            }
        }

        let context = self.route_by_kind(logic_sql, conditions, hint)?;
        if context.units.is_empty() {
            return Err(RoutingError::NoTargetFound {
                table: logic_sql.tables.first().cloned().unwrap_or_default(),
                reason: "no data node matches the sharding conditions".to_string(),
            });
        }
        tracing::Span::current().record("route_type", tracing::field::debug(&context.route_type));
        debug!(units = context.units.len(), "Routed statement");
        Ok(context)
    }

    fn route_by_kind(
        &self,
        logic_sql: &LogicSql,
        conditions: &ShardingConditions,
        hint: &HintContext,
    ) -> RouteResult<RouteContext> {
        let tables = &logic_sql.tables;
        let sharding_tables: Vec<String> = tables
            .iter()
            .filter(|t| self.rule.is_sharding_table(t))
            .cloned()
            .collect();

        match logic_sql.kind {
            StatementKind::Tcl => return Ok(self.database_broadcast(tables, hint)),
            StatementKind::Ddl => {
                return match sharding_tables.first() {
                    Some(primary) => self.table_broadcast(primary, &sharding_tables, tables, hint),
                    None => self.route_unsharded(logic_sql, hint, false),
                };
            }
            StatementKind::Dal => {
                return match sharding_tables.first().and_then(|t| self.rule.table_rule(t)) {
                    Some(rule) => Ok(self.first_node_unicast(rule, tables)),
                    None => self.route_unsharded(logic_sql, hint, true),
                };
            }
            _ => {}
        }

        if sharding_tables.is_empty() {
            return self.route_unsharded(logic_sql, hint, logic_sql.kind == StatementKind::Select);
        }
        self.check_full_route(logic_sql, &sharding_tables, conditions, hint)?;

        let mut context = if sharding_tables.len() == 1 || self.rule.is_all_binding_tables(&sharding_tables) {
            self.route_standard(logic_sql, &sharding_tables, conditions, hint)?
        } else {
            self.route_complex(logic_sql, &sharding_tables, conditions, hint)?
        };
        self.attach_unsharded_tables(&mut context, tables)?;
        Ok(context)
    }

    /// SELECT / UPDATE / DELETE without any sharding value scan every node;
    /// reject that when full routes are disabled.
    fn check_full_route(
        &self,
        logic_sql: &LogicSql,
        sharding_tables: &[String],
        conditions: &ShardingConditions,
        hint: &HintContext,
    ) -> RouteResult<()> {
        if self.rule.props().allow_full_route
            || !matches!(
                logic_sql.kind,
                StatementKind::Select | StatementKind::Update | StatementKind::Delete
            )
        {
            return Ok(());
        }
        for table in sharding_tables {
            let hinted = hint.database_values(table).is_some() || hint.table_values(table).is_some();
            if hinted || hint.data_source().is_some() {
                continue;
            }
            let columns = self.rule.sharding_columns(table);
            let scope = self.binding_scope(table);
            let constrained =
                !conditions.groups.is_empty() && conditions.groups.iter().all(|g| g.constrains(&scope, &columns));
            if !constrained {
                warn!(table = %table, "Rejecting full route");
                return Err(RoutingError::FullRouteRejected { table: table.clone() });
            }
        }
        Ok(())
    }

    /// The table itself plus every table bound to it; their conditions are interchangeable.
    fn binding_scope(&self, logic_table: &str) -> Vec<String> {
        match self.rule.binding_rule(logic_table) {
            Some(binding) => binding.tables().to_vec(),
            None => vec![logic_table.to_ascii_lowercase()],
        }
    }

    /// Routes one sharding table (the first of `sharding_tables`) and aligns
    /// the others, which must all be bound to it, by actual-table position.
    fn route_standard(
        &self,
        logic_sql: &LogicSql,
        sharding_tables: &[String],
        conditions: &ShardingConditions,
        hint: &HintContext,
    ) -> RouteResult<RouteContext> {
        let primary = self.table_rule(&sharding_tables[0])?;
        let bound: Vec<&TableRule> = sharding_tables[1..]
            .iter()
            .map(|t| self.table_rule(t))
            .collect::<RouteResult<_>>()?;

        let per_group = self.route_table(primary, conditions, hint)?;
        let mut nodes: Vec<DataNode> = Vec::new();
        for node in per_group.iter().flatten() {
            if !nodes.contains(node) {
                nodes.push(node.clone());
            }
        }
        let order = primary.data_nodes();
        nodes.sort_by_key(|n| order.iter().position(|o| o == n));

        let units = nodes
            .iter()
            .map(|node| self.bound_unit(primary, &bound, node))
            .collect::<RouteResult<Vec<_>>>()?;

        let mut context = RouteContext::new(RouteType::Standard, units);
        if logic_sql.kind == StatementKind::Insert {
            for (index, group) in per_group.iter().enumerate() {
                if group.len() != 1 {
                    return Err(RoutingError::NoTargetFound {
                        table: primary.logic_table.clone(),
                        reason: format!("insert value group {} routes to {} data nodes", index, group.len()),
                    });
                }
            }
            context.original_data_nodes = per_group;
        }
        Ok(context)
    }

    /// Data nodes of one table for every condition group.
    fn route_table(
        &self,
        table_rule: &TableRule,
        conditions: &ShardingConditions,
        hint: &HintContext,
    ) -> RouteResult<Vec<Vec<DataNode>>> {
        let logic_table = table_rule.logic_table.as_str();
        let scope = self.binding_scope(logic_table);
        let unconstrained = [ShardingCondition::default()];
        let groups: &[ShardingCondition] = if conditions.groups.is_empty() {
            &unconstrained
        } else {
            &conditions.groups
        };

        let database_strategy = self.rule.database_strategy(table_rule);
        let table_strategy = self.rule.table_strategy(table_rule);
        let available_data_sources = table_rule.data_source_names();

        let mut per_group = Vec::with_capacity(groups.len());
        for group in groups {
            let resolved = group.resolve(&scope)?;
            let data_sources = match hint.data_source() {
                Some(forced) => available_data_sources
                    .iter()
                    .filter(|ds| ds.as_str() == forced)
                    .cloned()
                    .collect(),
                None => database_strategy.do_sharding(
                    &available_data_sources,
                    logic_table,
                    &resolved,
                    hint.database_values(logic_table),
                )?,
            };
            let mut nodes = Vec::new();
            for data_source in data_sources {
                let tables = table_rule.actual_tables(&data_source);
                for table in
                    table_strategy.do_sharding(tables, logic_table, &resolved, hint.table_values(logic_table))?
                {
                    nodes.push(DataNode::new(data_source.clone(), table));
                }
            }
            debug!(table = logic_table, nodes = nodes.len(), "Routed condition group");
            per_group.push(nodes);
        }
        Ok(per_group)
    }

    fn bound_unit(&self, primary: &TableRule, bound: &[&TableRule], node: &DataNode) -> RouteResult<RouteUnit> {
        let mut mappers = vec![RouteMapper::new(primary.logic_table.clone(), node.table.clone())];
        for table in bound {
            let actual = BindingTableRule::aligned_actual_table(primary, table, &node.data_source, &node.table)?;
            mappers.push(RouteMapper::new(table.logic_table.clone(), actual));
        }
        Ok(RouteUnit::new(&node.data_source, mappers))
    }

    /// Sharding tables that are not all bound: route each binding group on
    /// its own, then join the groups per data source (Cartesian product).
    fn route_complex(
        &self,
        logic_sql: &LogicSql,
        sharding_tables: &[String],
        conditions: &ShardingConditions,
        hint: &HintContext,
    ) -> RouteResult<RouteContext> {
        let mut groups: Vec<Vec<String>> = Vec::new();
        for table in sharding_tables {
            let joined = groups.iter_mut().find(|g| {
                self.rule
                    .binding_rule(table)
                    .map_or(false, |binding| g.iter().all(|t| binding.contains(t)))
            });
            match joined {
                Some(group) => group.push(table.clone()),
                None => groups.push(vec![table.clone()]),
            }
        }

        let mut routed: Vec<Vec<RouteUnit>> = Vec::with_capacity(groups.len());
        for group in &groups {
            routed.push(self.route_standard(logic_sql, group, conditions, hint)?.units);
        }

        let mut units = Vec::new();
        for data_source in self.rule.data_source_names() {
            let per_group: Vec<Vec<&RouteUnit>> = routed
                .iter()
                .map(|group_units| {
                    group_units
                        .iter()
                        .filter(|u| u.data_source_name() == data_source)
                        .collect()
                })
                .collect();
            if per_group.iter().any(Vec::is_empty) {
                continue;
            }
            let mut combinations: Vec<Vec<RouteMapper>> = vec![Vec::new()];
            for group_units in &per_group {
                combinations = combinations
                    .iter()
                    .flat_map(|prefix| {
                        group_units.iter().map(move |unit| {
                            let mut mappers = prefix.clone();
                            mappers.extend(unit.table_mappers.iter().cloned());
                            mappers
                        })
                    })
                    .collect();
            }
            units.extend(combinations.into_iter().map(|m| RouteUnit::new(data_source, m)));
        }

        if units.is_empty() {
            return Err(RoutingError::FederationRequired {
                tables: sharding_tables.to_vec(),
            });
        }
        Ok(RouteContext::new(RouteType::Complex, units))
    }

    /// Adds broadcast and single tables to sharded units. Single tables pin
    /// the statement to their data source.
    fn attach_unsharded_tables(&self, context: &mut RouteContext, tables: &[String]) -> RouteResult<()> {
        for table in tables {
            if self.rule.is_sharding_table(table) {
                continue;
            }
            if let Some(data_source) = self.rule.single_table_data_source(table) {
                context.units.retain(|u| u.data_source_name() == data_source);
                if context.units.is_empty() {
                    return Err(RoutingError::FederationRequired {
                        tables: tables.to_vec(),
                    });
                }
            }
            for unit in &mut context.units {
                unit.table_mappers.push(RouteMapper::identity(table));
            }
        }
        Ok(())
    }

    /// Statements that touch no sharding table. Broadcast tables reach every
    /// data source; unconfigured tables are read from one.
    fn route_unsharded(&self, logic_sql: &LogicSql, hint: &HintContext, read_only: bool) -> RouteResult<RouteContext> {
        let tables = &logic_sql.tables;
        if let Some(forced) = hint.data_source() {
            return Ok(RouteContext::new(RouteType::Unicast, vec![identity_unit(forced, tables)]));
        }

        let mut single_data_source: Option<&str> = None;
        for table in tables {
            if let Some(data_source) = self.rule.single_table_data_source(table) {
                match single_data_source {
                    Some(existing) if existing != data_source => {
                        return Err(RoutingError::FederationRequired {
                            tables: tables.to_vec(),
                        })
                    }
                    _ => single_data_source = Some(data_source),
                }
            }
        }
        if let Some(data_source) = single_data_source {
            return Ok(RouteContext::new(RouteType::Single, vec![identity_unit(data_source, tables)]));
        }

        if tables.iter().any(|t| self.rule.is_broadcast_table(t)) {
            return Ok(self.database_broadcast(tables, hint));
        }
        if read_only {
            Ok(self.unicast(tables))
        } else {
            Ok(self.database_broadcast(tables, hint))
        }
    }

    fn unicast(&self, tables: &[String]) -> RouteContext {
        let mut key = tables.to_vec();
        key.sort();
        let cached = self.unicast_cache.read().get(&key).cloned();
        let data_source = match cached {
            Some(data_source) => data_source,
            None => {
                let names = self.rule.data_source_names();
                let picked = names[self.next_unicast.fetch_add(1, Ordering::Relaxed) % names.len()].clone();
                self.unicast_cache
                    .write()
                    .entry(key)
                    .or_insert(picked)
                    .clone()
            }
        };
        RouteContext::new(RouteType::Unicast, vec![identity_unit(&data_source, tables)])
    }

    fn first_node_unicast(&self, table_rule: &TableRule, tables: &[String]) -> RouteContext {
        let units = table_rule
            .data_nodes()
            .into_iter()
            .take(1)
            .map(|node| {
                let mut mappers = vec![RouteMapper::new(table_rule.logic_table.clone(), node.table.clone())];
                mappers.extend(
                    tables
                        .iter()
                        .filter(|t| **t != table_rule.logic_table)
                        .map(|t| RouteMapper::identity(t)),
                );
                RouteUnit::new(&node.data_source, mappers)
            })
            .collect();
        RouteContext::new(RouteType::Unicast, units)
    }

    fn database_broadcast(&self, tables: &[String], hint: &HintContext) -> RouteContext {
        let units = self
            .rule
            .data_source_names()
            .iter()
            .filter(|ds| hint.data_source().map_or(true, |forced| forced == ds.as_str()))
            .map(|ds| identity_unit(ds, tables))
            .collect();
        RouteContext::new(RouteType::DatabaseBroadcast, units)
    }

    /// DDL on a sharding table runs against every one of its data nodes.
    fn table_broadcast(
        &self,
        primary: &str,
        sharding_tables: &[String],
        tables: &[String],
        hint: &HintContext,
    ) -> RouteResult<RouteContext> {
        let primary = self.table_rule(primary)?;
        let bound: Vec<&TableRule> = sharding_tables[1..]
            .iter()
            .filter(|t| self.rule.binding_rule(&primary.logic_table).map_or(false, |b| b.contains(t)))
            .map(|t| self.table_rule(t))
            .collect::<RouteResult<_>>()?;
        let mut units = Vec::new();
        for node in primary.data_nodes() {
            if hint.data_source().map_or(false, |forced| forced != node.data_source) {
                continue;
            }
            let mut unit = self.bound_unit(primary, &bound, &node)?;
            for table in tables {
                if unit.actual_table(table).is_none() {
                    unit.table_mappers.push(RouteMapper::identity(table));
                }
            }
            units.push(unit);
        }
        Ok(RouteContext::new(RouteType::TableBroadcast, units))
    }

    fn table_rule(&self, logic_table: &str) -> RouteResult<&TableRule> {
        self.rule
            .table_rule(logic_table)
            .ok_or_else(|| RoutingError::NoTargetFound {
                table: logic_table.to_string(),
                reason: "table has no sharding rule".to_string(),
            })
    }
}

fn identity_unit(data_source: &str, tables: &[String]) -> RouteUnit {
    RouteUnit::new(data_source, tables.iter().map(|t| RouteMapper::identity(t)).collect())
}
