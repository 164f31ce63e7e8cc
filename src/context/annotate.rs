//! Builds a [`LogicSql`] from SQL text.
//!
//! This is a locator, not a parser: it runs the sqlparser tokenizer, keeps
//! byte offsets for every lexeme, and pattern-matches the handful of clauses
//! routing and rewriting care about (table references, the select list,
//! GROUP BY / ORDER BY, LIMIT / OFFSET, INSERT columns and VALUES groups).
//! Anything it does not recognise is left untouched in the SQL text.

use super::insert::{InsertContext, InsertValue, InsertValueGroup};
use super::select::{
    AggregationKind, ItemRef, NullsOrder, OrderByItem, OrderDirection, Pagination, PaginationValue, Projection,
    SelectContext,
};
use super::{LogicSql, SqlToken, StatementKind};
use crate::error::{Error, Result};
use crate::value::Value;
use sqlparser::dialect::GenericDialect;
use sqlparser::tokenizer::{Token, Tokenizer};
use tracing::trace;

/// Aggregates recognised by name but without a cross-shard combination rule.
const OTHER_AGGREGATES: &[&str] = &[
    "GROUP_CONCAT",
    "STRING_AGG",
    "ARRAY_AGG",
    "STDDEV",
    "STDDEV_POP",
    "STDDEV_SAMP",
    "VARIANCE",
    "VAR_POP",
    "VAR_SAMP",
    "MEDIAN",
    "BIT_AND",
    "BIT_OR",
    "BIT_XOR",
];

/// Words that end a table reference or a select item alias.
const CLAUSE_WORDS: &[&str] = &[
    "WHERE", "GROUP", "ORDER", "LIMIT", "OFFSET", "HAVING", "JOIN", "INNER", "LEFT", "RIGHT", "FULL", "CROSS",
    "OUTER", "NATURAL", "ON", "USING", "SET", "VALUES", "VALUE", "SELECT", "UNION", "EXCEPT", "INTERSECT", "WINDOW",
    "FOR", "LOCK", "AS", "WITH", "INTO", "FROM", "STRAIGHT_JOIN", "PARTITION", "FETCH", "END", "DUPLICATE",
];

#[derive(Debug, Clone)]
struct Lexeme {
    token: Token,
    start: usize,
    end: usize,
    /// Parenthesis nesting level; a paren shares the level of its outside.
    depth: usize,
}

impl Lexeme {
    /// Upper-cased text of an unquoted word.
    fn keyword(&self) -> Option<String> {
        match &self.token {
            Token::Word(w) if w.quote_style.is_none() => Some(w.value.to_uppercase()),
            _ => None,
        }
    }

    fn is(&self, keyword: &str) -> bool {
        self.keyword().map_or(false, |k| k == keyword)
    }

    fn is_clause_word(&self) -> bool {
        self.keyword().map_or(false, |k| CLAUSE_WORDS.contains(&k.as_str()))
    }

    fn is_placeholder(&self) -> bool {
        matches!(&self.token, Token::Placeholder(p) if p.starts_with('?'))
    }
}

/// Annotates `sql` for one invocation with `parameters`.
pub fn annotate(sql: &str, parameters: Vec<Value>) -> Result<LogicSql> {
    let lexemes = lex(sql)?;
    let first = lexemes
        .iter()
        .find_map(Lexeme::keyword)
        .ok_or_else(|| Error::Validation(format!("Statement has no leading keyword: '{}'", sql)))?;
    let kind = classify(&first)?;

    let mut logic_sql = LogicSql::new(kind, sql).with_parameters(parameters);
    logic_sql.parameter_markers = lexemes.iter().filter(|l| l.is_placeholder()).map(|l| l.start).collect();

    let mut tokens = Vec::new();
    let mut table_positions = Vec::new();
    for (index, token) in find_tables(&lexemes, kind) {
        if let SqlToken::TableName { logic_table, .. } = &token {
            if !logic_sql.tables.contains(logic_table) {
                logic_sql.tables.push(logic_table.clone());
            }
        }
        table_positions.push(index);
        tokens.push(token);
    }

    match kind {
        StatementKind::Select if first == "SELECT" => {
            let (select, select_tokens) = select_context(sql, &lexemes)?;
            logic_sql.select = Some(select);
            tokens.extend(select_tokens);
        }
        StatementKind::Insert => {
            if let (Some(&table_index), Some(table)) = (table_positions.first(), logic_sql.tables.first()) {
                let (insert, insert_tokens) = insert_context(sql, &lexemes, table_index, table)?;
                logic_sql.insert = Some(insert);
                tokens.extend(insert_tokens);
            }
        }
        _ => {}
    }

    tokens.sort_by_key(|t| (t.start(), t.end()));
    logic_sql.tokens = tokens;
    trace!(sql = %sql, tables = ?logic_sql.tables, tokens = logic_sql.tokens.len(), "Annotated statement");
    Ok(logic_sql)
}

fn classify(first: &str) -> Result<StatementKind> {
    let kind = match first {
        "SELECT" | "WITH" | "VALUES" => StatementKind::Select,
        "INSERT" | "REPLACE" => StatementKind::Insert,
        "UPDATE" => StatementKind::Update,
        "DELETE" => StatementKind::Delete,
        "CREATE" | "ALTER" | "DROP" | "TRUNCATE" | "RENAME" => StatementKind::Ddl,
        "SHOW" | "DESCRIBE" | "DESC" | "EXPLAIN" | "USE" | "SET" => StatementKind::Dal,
        "BEGIN" | "START" | "COMMIT" | "ROLLBACK" | "SAVEPOINT" | "RELEASE" => StatementKind::Tcl,
        other => return Err(Error::Validation(format!("Unsupported statement type '{}'", other))),
    };
    Ok(kind)
}

fn lex(sql: &str) -> Result<Vec<Lexeme>> {
    let dialect = GenericDialect {};
    let located = Tokenizer::new(&dialect, sql)
        .tokenize_with_location()
        .map_err(|e| Error::Validation(format!("Failed to tokenize SQL: {}", e)))?;

    let line_starts: Vec<usize> = std::iter::once(0)
        .chain(sql.match_indices('\n').map(|(i, _)| i + 1))
        .collect();
    let starts: Vec<usize> = located
        .iter()
        .map(|t| byte_offset(sql, &line_starts, t.location.line, t.location.column))
        .collect();

    let mut lexemes = Vec::with_capacity(located.len());
    let mut depth = 0usize;
    for (i, located_token) in located.into_iter().enumerate() {
        if matches!(located_token.token, Token::Whitespace(_) | Token::EOF) {
            continue;
        }
        let start = starts.get(i).copied().unwrap_or(sql.len());
        let end = starts.get(i + 1).copied().unwrap_or(sql.len());
        let lexeme_depth = match located_token.token {
            Token::LParen => {
                depth += 1;
                depth - 1
            }
            Token::RParen => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| Error::Validation(format!("Unbalanced ')' at byte {}", start)))?;
                depth
            }
            _ => depth,
        };
        lexemes.push(Lexeme {
            token: located_token.token,
            start,
            end,
            depth: lexeme_depth,
        });
    }
    if depth != 0 {
        return Err(Error::Validation("Unbalanced '(' in statement".to_string()));
    }
    Ok(lexemes)
}

/// Converts a 1-based (line, character column) location into a byte offset.
fn byte_offset(sql: &str, line_starts: &[usize], line: u64, column: u64) -> usize {
    let line_start = match line_starts.get(line.saturating_sub(1) as usize) {
        Some(start) => *start,
        None => return sql.len(),
    };
    sql[line_start..]
        .char_indices()
        .nth(column.saturating_sub(1) as usize)
        .map(|(i, _)| line_start + i)
        .unwrap_or(sql.len())
}

fn matching_paren(lexemes: &[Lexeme], open: usize) -> Option<usize> {
    let depth = lexemes.get(open)?.depth;
    lexemes
        .iter()
        .enumerate()
        .skip(open + 1)
        .find(|(_, l)| matches!(l.token, Token::RParen) && l.depth == depth)
        .map(|(i, _)| i)
}

/// Table-name token at `index`, following a `schema.` qualifier if present.
/// Returns the token and the index just past the name.
fn table_name_at(lexemes: &[Lexeme], index: usize) -> Option<(usize, SqlToken, usize)> {
    let lexeme = lexemes.get(index)?;
    if lexeme.is_clause_word() {
        return None;
    }
    let mut name_index = index;
    if let (Some(dot), Some(next)) = (lexemes.get(index + 1), lexemes.get(index + 2)) {
        if matches!(dot.token, Token::Period) && matches!(next.token, Token::Word(_)) {
            name_index = index + 2;
        }
    }
    let name = &lexemes[name_index];
    match &name.token {
        Token::Word(w) => Some((
            name_index,
            SqlToken::TableName {
                start: name.start,
                end: name.end,
                logic_table: w.value.to_ascii_lowercase(),
                quote: w.quote_style,
            },
            name_index + 1,
        )),
        _ => None,
    }
}

/// Skips `AS alias` or a bare alias after a table reference.
fn skip_alias(lexemes: &[Lexeme], index: usize) -> usize {
    match lexemes.get(index) {
        Some(l) if l.is("AS") => index + 2,
        Some(l) if matches!(l.token, Token::Word(_)) && !l.is_clause_word() => index + 1,
        _ => index,
    }
}

fn find_tables(lexemes: &[Lexeme], kind: StatementKind) -> Vec<(usize, SqlToken)> {
    let mut found = Vec::new();
    // one flag per open paren: does it start a subquery?
    let mut subquery_stack: Vec<bool> = Vec::new();
    let first_word = lexemes.iter().position(|l| l.keyword().is_some());

    let mut i = 0;
    while i < lexemes.len() {
        let lexeme = &lexemes[i];
        match lexeme.token {
            Token::LParen => {
                let starts_query = lexemes.get(i + 1).map_or(false, |n| n.is("SELECT") || n.is("WITH"));
                subquery_stack.push(starts_query);
                i += 1;
                continue;
            }
            Token::RParen => {
                subquery_stack.pop();
                i += 1;
                continue;
            }
            _ => {}
        }
        let in_query_scope = subquery_stack.last().copied().unwrap_or(true);
        let keyword = lexeme.keyword();
        let mut next = i + 1;
        match keyword.as_deref() {
            Some("FROM") if in_query_scope => {
                let mut j = i + 1;
                while let Some((index, token, after)) = table_name_at(lexemes, j) {
                    found.push((index, token));
                    j = skip_alias(lexemes, after);
                    match lexemes.get(j) {
                        Some(l) if matches!(l.token, Token::Comma) => j += 1,
                        _ => break,
                    }
                }
                next = j.max(i + 1);
            }
            Some("JOIN") | Some("STRAIGHT_JOIN") if in_query_scope => {
                if let Some((index, token, after)) = table_name_at(lexemes, i + 1) {
                    found.push((index, token));
                    next = after;
                }
            }
            Some("INTO") if kind == StatementKind::Insert => {
                if let Some((index, token, after)) = table_name_at(lexemes, i + 1) {
                    found.push((index, token));
                    next = after;
                }
            }
            Some("UPDATE") if Some(i) == first_word => {
                if let Some((index, token, after)) = table_name_at(lexemes, i + 1) {
                    found.push((index, token));
                    next = after;
                }
            }
            Some("TABLE") if kind == StatementKind::Ddl => {
                let mut j = i + 1;
                while lexemes
                    .get(j)
                    .map_or(false, |l| l.is("IF") || l.is("NOT") || l.is("EXISTS"))
                {
                    j += 1;
                }
                if let Some((index, token, after)) = table_name_at(lexemes, j) {
                    found.push((index, token));
                    next = after;
                }
            }
            Some("TRUNCATE") if kind == StatementKind::Ddl => {
                if !lexemes.get(i + 1).map_or(false, |l| l.is("TABLE")) {
                    if let Some((index, token, after)) = table_name_at(lexemes, i + 1) {
                        found.push((index, token));
                        next = after;
                    }
                }
            }
            Some("ON") if kind == StatementKind::Ddl => {
                if let Some((index, token, after)) = table_name_at(lexemes, i + 1) {
                    found.push((index, token));
                    next = after;
                }
            }
            Some("DESCRIBE") | Some("DESC") if Some(i) == first_word => {
                if let Some((index, token, after)) = table_name_at(lexemes, i + 1) {
                    found.push((index, token));
                    next = after;
                }
            }
            _ => {}
        }
        i = next;
    }
    found
}

fn text(sql: &str, lexemes: &[Lexeme], from: usize, to: usize) -> String {
    match (lexemes.get(from), to.checked_sub(1).and_then(|last| lexemes.get(last))) {
        (Some(first), Some(last)) if from < to => sql[first.start..last.end].trim().to_string(),
        _ => String::new(),
    }
}

/// Splits `[from, to)` on commas at `depth`.
fn split_commas(lexemes: &[Lexeme], from: usize, to: usize, depth: usize) -> Vec<(usize, usize)> {
    let mut parts = Vec::new();
    let mut start = from;
    for i in from..to {
        if matches!(lexemes[i].token, Token::Comma) && lexemes[i].depth == depth {
            parts.push((start, i));
            start = i + 1;
        }
    }
    if start < to {
        parts.push((start, to));
    }
    parts
}

fn find_top_level(lexemes: &[Lexeme], from: usize, keyword: &str) -> Option<usize> {
    (from..lexemes.len()).find(|&i| lexemes[i].depth == 0 && lexemes[i].is(keyword))
}

/// End of a clause: the next top-level word in `stops`, or a `;`.
fn clause_end(lexemes: &[Lexeme], from: usize, stops: &[&str]) -> usize {
    (from..lexemes.len())
        .find(|&i| {
            let l = &lexemes[i];
            l.depth == 0
                && (matches!(l.token, Token::SemiColon)
                    || l.keyword().map_or(false, |k| stops.contains(&k.as_str())))
        })
        .unwrap_or(lexemes.len())
}

fn select_context(sql: &str, lexemes: &[Lexeme]) -> Result<(SelectContext, Vec<SqlToken>)> {
    let mut select = SelectContext::default();
    let mut tokens = Vec::new();
    let select_index = find_top_level(lexemes, 0, "SELECT")
        .ok_or_else(|| Error::Validation("SELECT statement without SELECT keyword".to_string()))?;

    let mut items_start = select_index + 1;
    if lexemes.get(items_start).map_or(false, |l| l.is("DISTINCT")) {
        select.distinct = true;
        items_start += 1;
    } else if lexemes.get(items_start).map_or(false, |l| l.is("ALL")) {
        items_start += 1;
    }
    let items_end = clause_end(
        lexemes,
        items_start,
        &["FROM", "WHERE", "GROUP", "ORDER", "LIMIT", "OFFSET", "UNION", "EXCEPT", "INTERSECT"],
    );
    for (from, to) in split_commas(lexemes, items_start, items_end, 0) {
        select.projections.push(projection(sql, lexemes, from, to));
    }
    if items_end > items_start {
        tokens.push(SqlToken::Projections {
            position: lexemes[items_end - 1].end,
        });
    }

    if let Some(group) = find_top_level(lexemes, items_end, "GROUP") {
        if lexemes.get(group + 1).map_or(false, |l| l.is("BY")) {
            let end = clause_end(
                lexemes,
                group + 2,
                &["HAVING", "ORDER", "LIMIT", "OFFSET", "WINDOW", "UNION", "FOR", "LOCK", "FETCH"],
            );
            select.group_by = order_items(sql, lexemes, group + 2, end);
        }
    }
    if let Some(order) = find_top_level(lexemes, items_end, "ORDER") {
        if lexemes.get(order + 1).map_or(false, |l| l.is("BY")) {
            let end = clause_end(lexemes, order + 2, &["LIMIT", "OFFSET", "FETCH", "FOR", "LOCK", "UNION"]);
            select.order_by = order_items(sql, lexemes, order + 2, end);
        }
    }

    let mut pagination = Pagination::default();
    if let Some(limit) = find_top_level(lexemes, items_end, "LIMIT") {
        if let Some(first) = pagination_value(lexemes, limit + 1) {
            let first_token = &lexemes[limit + 1];
            let comma = lexemes.get(limit + 2).map_or(false, |l| matches!(l.token, Token::Comma));
            match (comma, pagination_value(lexemes, limit + 3)) {
                (true, Some(second)) => {
                    // MySQL `LIMIT offset, count`
                    let second_token = &lexemes[limit + 3];
                    pagination.offset = Some(first);
                    pagination.row_count = Some(second);
                    tokens.push(SqlToken::Offset {
                        start: first_token.start,
                        end: first_token.end,
                        value: first,
                    });
                    tokens.push(SqlToken::RowCount {
                        start: second_token.start,
                        end: second_token.end,
                        value: second,
                    });
                }
                _ => {
                    pagination.row_count = Some(first);
                    tokens.push(SqlToken::RowCount {
                        start: first_token.start,
                        end: first_token.end,
                        value: first,
                    });
                }
            }
        }
    }
    if let Some(offset) = find_top_level(lexemes, items_end, "OFFSET") {
        if let Some(value) = pagination_value(lexemes, offset + 1) {
            let token = &lexemes[offset + 1];
            pagination.offset = Some(value);
            tokens.push(SqlToken::Offset {
                start: token.start,
                end: token.end,
                value,
            });
        }
    }
    if pagination.offset.is_some() || pagination.row_count.is_some() {
        select.pagination = Some(pagination);
    }
    Ok((select, tokens))
}

fn pagination_value(lexemes: &[Lexeme], index: usize) -> Option<PaginationValue> {
    let lexeme = lexemes.get(index)?;
    match &lexeme.token {
        Token::Number(n, _) => n.parse().ok().map(PaginationValue::Literal),
        Token::Placeholder(_) if lexeme.is_placeholder() => Some(PaginationValue::Parameter(
            lexemes[..index].iter().filter(|l| l.is_placeholder()).count(),
        )),
        _ => None,
    }
}

fn projection(sql: &str, lexemes: &[Lexeme], from: usize, to: usize) -> Projection {
    let len = to - from;
    let (expression_end, alias) = if len >= 3 && lexemes[to - 2].is("AS") {
        (to - 2, word_value(&lexemes[to - 1]))
    } else if len >= 2 && is_implicit_alias(&lexemes[to - 2], &lexemes[to - 1]) {
        (to - 1, word_value(&lexemes[to - 1]))
    } else {
        (to, None)
    };

    let parts = &lexemes[from..expression_end];
    let is_star = match parts {
        [only] => matches!(only.token, Token::Mul),
        [_, dot, star] => matches!(dot.token, Token::Period) && matches!(star.token, Token::Mul),
        _ => false,
    };
    if is_star {
        return Projection::Star;
    }

    if let (Some(name), Some(open)) = (parts.first().and_then(Lexeme::keyword), parts.get(1)) {
        let closes_item = matching_paren(lexemes, from + 1) == Some(expression_end - 1);
        let known = AggregationKind::parse(&name);
        if matches!(open.token, Token::LParen) && closes_item && (known.is_some() || OTHER_AGGREGATES.contains(&name.as_str())) {
            let mut argument_start = from + 2;
            let distinct = lexemes.get(argument_start).map_or(false, |l| l.is("DISTINCT"));
            if distinct {
                argument_start += 1;
            }
            return Projection::Aggregation {
                kind: known,
                function: name,
                distinct,
                argument: text(sql, lexemes, argument_start, expression_end - 1),
                alias,
            };
        }
    }

    Projection::Column {
        expression: text(sql, lexemes, from, expression_end),
        alias,
    }
}

fn is_implicit_alias(previous: &Lexeme, last: &Lexeme) -> bool {
    let last_is_name = matches!(last.token, Token::Word(_)) && !last.is_clause_word();
    let previous_ends_expression = match &previous.token {
        Token::Word(_) => !previous.is("DISTINCT"),
        Token::Number(_, _) | Token::SingleQuotedString(_) | Token::RParen => true,
        _ => false,
    };
    last_is_name && previous_ends_expression
}

fn word_value(lexeme: &Lexeme) -> Option<String> {
    match &lexeme.token {
        Token::Word(w) => Some(w.value.clone()),
        _ => None,
    }
}

fn order_items(sql: &str, lexemes: &[Lexeme], from: usize, to: usize) -> Vec<OrderByItem> {
    split_commas(lexemes, from, to, 0)
        .into_iter()
        .filter_map(|(start, end)| {
            let mut end = end;
            let mut nulls = None;
            if end >= start + 2 && lexemes[end - 2].is("NULLS") {
                nulls = if lexemes[end - 1].is("FIRST") {
                    Some(NullsOrder::First)
                } else {
                    Some(NullsOrder::Last)
                };
                end -= 2;
            }
            let mut direction = OrderDirection::Asc;
            if end > start && (lexemes[end - 1].is("ASC") || lexemes[end - 1].is("DESC")) {
                if lexemes[end - 1].is("DESC") {
                    direction = OrderDirection::Desc;
                }
                end -= 1;
            }
            if end <= start {
                return None;
            }
            let item = match (&lexemes[start].token, end - start) {
                (Token::Number(n, _), 1) => match n.parse::<usize>() {
                    Ok(index) => ItemRef::Index(index),
                    Err(_) => ItemRef::Expression(n.clone()),
                },
                _ => ItemRef::Expression(text(sql, lexemes, start, end)),
            };
            let mut order = OrderByItem::new(item, direction);
            if let Some(nulls) = nulls {
                order.nulls = nulls;
            }
            Some(order)
        })
        .collect()
}

fn insert_context(
    sql: &str,
    lexemes: &[Lexeme],
    table_index: usize,
    table: &str,
) -> Result<(InsertContext, Vec<SqlToken>)> {
    let mut insert = InsertContext {
        table: table.to_string(),
        ..Default::default()
    };
    let mut tokens = Vec::new();
    let mut cursor = table_index + 1;

    if lexemes.get(cursor).map_or(false, |l| matches!(l.token, Token::LParen)) {
        let close = matching_paren(lexemes, cursor)
            .ok_or_else(|| Error::Validation("Unclosed INSERT column list".to_string()))?;
        insert.columns = lexemes[cursor + 1..close]
            .iter()
            .filter_map(|l| match &l.token {
                Token::Word(w) => Some(w.value.to_ascii_lowercase()),
                _ => None,
            })
            .collect();
        tokens.push(SqlToken::InsertColumns {
            position: lexemes[close].start,
        });
        cursor = close + 1;
    }

    let values_keyword = (cursor..lexemes.len()).find(|&i| lexemes[i].depth == 0 && (lexemes[i].is("VALUES") || lexemes[i].is("VALUE")));
    if let Some(keyword) = values_keyword {
        let mut open = keyword + 1;
        while lexemes.get(open).map_or(false, |l| matches!(l.token, Token::LParen)) {
            let close = matching_paren(lexemes, open)
                .ok_or_else(|| Error::Validation("Unclosed INSERT value group".to_string()))?;
            let values = split_commas(lexemes, open + 1, close, 1)
                .into_iter()
                .map(|(from, to)| insert_value(sql, lexemes, from, to))
                .collect();
            insert.value_groups.push(InsertValueGroup {
                start: lexemes[open].start,
                end: lexemes[close].end,
                values,
            });
            match lexemes.get(close + 1) {
                Some(l) if matches!(l.token, Token::Comma) => open = close + 2,
                _ => break,
            }
        }
    }
    if let (Some(first), Some(last)) = (insert.value_groups.first(), insert.value_groups.last()) {
        tokens.push(SqlToken::InsertValues {
            start: first.start,
            end: last.end,
        });
    }
    Ok((insert, tokens))
}

fn insert_value(sql: &str, lexemes: &[Lexeme], from: usize, to: usize) -> InsertValue {
    let parts = &lexemes[from..to];
    match parts {
        [only] => match &only.token {
            Token::Number(n, _) => number(n).map(InsertValue::Literal).unwrap_or_else(|| InsertValue::Expression(n.clone())),
            Token::SingleQuotedString(s) => InsertValue::Literal(Value::Text(s.clone())),
            Token::Placeholder(_) if only.is_placeholder() => {
                InsertValue::Parameter(lexemes[..from].iter().filter(|l| l.is_placeholder()).count())
            }
            _ if only.is("NULL") => InsertValue::Literal(Value::Null),
            _ if only.is("TRUE") => InsertValue::Literal(Value::Bool(true)),
            _ if only.is("FALSE") => InsertValue::Literal(Value::Bool(false)),
            _ => InsertValue::Expression(text(sql, lexemes, from, to)),
        },
        [sign, value] if matches!(sign.token, Token::Minus) => match &value.token {
            Token::Number(n, _) => number(&format!("-{}", n))
                .map(InsertValue::Literal)
                .unwrap_or_else(|| InsertValue::Expression(text(sql, lexemes, from, to))),
            _ => InsertValue::Expression(text(sql, lexemes, from, to)),
        },
        _ => InsertValue::Expression(text(sql, lexemes, from, to)),
    }
}

fn number(raw: &str) -> Option<Value> {
    raw.parse::<i64>()
        .map(Value::Int)
        .ok()
        .or_else(|| raw.parse::<f64>().ok().map(Value::Float))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_names(logic_sql: &LogicSql) -> Vec<(String, String)> {
        logic_sql
            .tokens
            .iter()
            .filter_map(|t| match t {
                SqlToken::TableName {
                    start,
                    end,
                    logic_table,
                    ..
                } => Some((logic_table.clone(), logic_sql.sql[*start..*end].to_string())),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_select_tables_and_aliases() {
        let sql = "SELECT o.order_id, i.item_id FROM t_order o JOIN `t_order_item` AS i ON o.order_id = i.order_id WHERE o.user_id = ?";
        let logic_sql = annotate(sql, vec![Value::Int(1)]).unwrap();
        assert_eq!(logic_sql.kind, StatementKind::Select);
        assert_eq!(logic_sql.tables, vec!["t_order", "t_order_item"]);
        assert_eq!(
            table_names(&logic_sql),
            vec![
                ("t_order".to_string(), "t_order".to_string()),
                ("t_order_item".to_string(), "`t_order_item`".to_string())
            ]
        );
        assert_eq!(logic_sql.parameter_markers, vec![sql.len() - 1]);
    }

    #[test]
    fn test_comma_separated_from_list() {
        let logic_sql = annotate("SELECT * FROM t_order o, t_config c WHERE o.status = c.k", vec![]).unwrap();
        assert_eq!(logic_sql.tables, vec!["t_order", "t_config"]);
        assert_eq!(logic_sql.select.unwrap().projections, vec![Projection::Star]);
    }

    #[test]
    fn test_select_metadata() {
        let sql = "SELECT user_id, COUNT(*) AS cnt, AVG(price) avg_price FROM t_order GROUP BY user_id ORDER BY user_id DESC LIMIT 10 OFFSET 20";
        let logic_sql = annotate(sql, vec![]).unwrap();
        let select = logic_sql.select.clone().unwrap();
        assert_eq!(select.projections.len(), 3);
        assert!(matches!(
            &select.projections[1],
            Projection::Aggregation { kind: Some(AggregationKind::Count), argument, alias: Some(alias), .. }
                if argument == "*" && alias == "cnt"
        ));
        assert!(matches!(
            &select.projections[2],
            Projection::Aggregation { kind: Some(AggregationKind::Avg), alias: Some(alias), .. } if alias == "avg_price"
        ));
        assert_eq!(select.group_by, vec![OrderByItem::asc("user_id")]);
        assert_eq!(select.order_by, vec![OrderByItem::desc("user_id")]);
        let pagination = select.pagination.unwrap();
        assert_eq!(pagination.row_count, Some(PaginationValue::Literal(10)));
        assert_eq!(pagination.offset, Some(PaginationValue::Literal(20)));

        let projections = logic_sql
            .tokens
            .iter()
            .find_map(|t| match t {
                SqlToken::Projections { position } => Some(*position),
                _ => None,
            })
            .unwrap();
        assert_eq!(&sql[..projections], "SELECT user_id, COUNT(*) AS cnt, AVG(price) avg_price");
    }

    #[test]
    fn test_mysql_limit_with_parameters() {
        let sql = "SELECT * FROM t_order WHERE user_id = ? LIMIT ?, ?";
        let logic_sql = annotate(sql, vec![Value::Int(1), Value::Int(5), Value::Int(10)]).unwrap();
        let pagination = logic_sql.pagination().unwrap();
        assert_eq!(pagination.offset, Some(PaginationValue::Parameter(1)));
        assert_eq!(pagination.row_count, Some(PaginationValue::Parameter(2)));
        assert_eq!(logic_sql.parameter_markers.len(), 3);
    }

    #[test]
    fn test_insert_groups() {
        let sql = "INSERT INTO t_order (user_id, status) VALUES (?, 'init'), (-3, NOW())";
        let logic_sql = annotate(sql, vec![Value::Int(10)]).unwrap();
        assert_eq!(logic_sql.kind, StatementKind::Insert);
        let insert = logic_sql.insert.clone().unwrap();
        assert_eq!(insert.table, "t_order");
        assert_eq!(insert.columns, vec!["user_id", "status"]);
        assert_eq!(insert.value_groups.len(), 2);
        assert_eq!(
            insert.value_groups[0].values,
            vec![InsertValue::Parameter(0), InsertValue::Literal(Value::from("init"))]
        );
        assert_eq!(insert.value_groups[1].values[0], InsertValue::Literal(Value::Int(-3)));
        assert_eq!(insert.value_groups[1].values[1], InsertValue::Expression("NOW()".to_string()));
        assert_eq!(&sql[insert.value_groups[1].start..insert.value_groups[1].end], "(-3, NOW())");
        assert!(logic_sql
            .tokens
            .iter()
            .any(|t| matches!(t, SqlToken::InsertColumns { position } if &sql[*position..*position + 1] == ")")));
    }

    #[test]
    fn test_statement_kinds() {
        assert_eq!(annotate("UPDATE t_order SET status = 'x'", vec![]).unwrap().tables, vec!["t_order"]);
        assert_eq!(annotate("DELETE FROM t_order", vec![]).unwrap().kind, StatementKind::Delete);
        let ddl = annotate("CREATE TABLE IF NOT EXISTS t_order (order_id BIGINT)", vec![]).unwrap();
        assert_eq!(ddl.kind, StatementKind::Ddl);
        assert_eq!(ddl.tables, vec!["t_order"]);
        assert_eq!(annotate("COMMIT", vec![]).unwrap().kind, StatementKind::Tcl);
        assert!(annotate("FROBNICATE t_order", vec![]).is_err());
    }

    #[test]
    fn test_function_from_is_not_a_table() {
        let logic_sql = annotate("SELECT EXTRACT(YEAR FROM create_time) FROM t_order", vec![]).unwrap();
        assert_eq!(logic_sql.tables, vec!["t_order"]);
    }

    #[test]
    fn test_multiline_offsets() {
        let sql = "SELECT *\n  FROM t_order\n WHERE order_id = 1";
        let logic_sql = annotate(sql, vec![]).unwrap();
        assert_eq!(table_names(&logic_sql), vec![("t_order".to_string(), "t_order".to_string())]);
    }
}
