//! Inline expressions for data node lists.
//!
//! `ds_${0..1}.t_order_${[0, 1]}` expands to the Cartesian product of its
//! placeholders, left to right:
//! `ds_0.t_order_0, ds_0.t_order_1, ds_1.t_order_0, ds_1.t_order_1`.
//! Top-level commas separate independent expressions.

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Literal(String),
    Choices(Vec<String>),
}

/// Expands an inline expression into its concrete values.
pub fn expand(expression: &str) -> Result<Vec<String>> {
    let mut result = Vec::new();
    for part in split_top_level(expression)? {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        result.extend(expand_one(part)?);
    }
    Ok(result)
}

fn split_top_level(expression: &str) -> Result<Vec<&str>> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in expression.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| Error::Config(format!("Unbalanced '}}' in inline expression '{}'", expression)))?;
            }
            ',' if depth == 0 => {
                parts.push(&expression[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err(Error::Config(format!("Unclosed '${{' in inline expression '{}'", expression)));
    }
    parts.push(&expression[start..]);
    Ok(parts)
}

fn expand_one(expression: &str) -> Result<Vec<String>> {
    let segments = parse_segments(expression)?;
    let mut results = vec![String::new()];
    for segment in segments {
        results = match segment {
            Segment::Literal(text) => results.into_iter().map(|r| r + &text).collect(),
            Segment::Choices(choices) => results
                .iter()
                .flat_map(|prefix| choices.iter().map(move |c| format!("{}{}", prefix, c)))
                .collect(),
        };
    }
    Ok(results)
}

fn parse_segments(expression: &str) -> Result<Vec<Segment>> {
    let mut segments = Vec::new();
    let mut rest = expression;
    while let Some(open) = rest.find("${") {
        if open > 0 {
            segments.push(Segment::Literal(rest[..open].to_string()));
        }
        let body_start = open + 2;
        let close = rest[body_start..]
            .find('}')
            .map(|i| body_start + i)
            .ok_or_else(|| Error::Config(format!("Unclosed '${{' in inline expression '{}'", expression)))?;
        segments.push(Segment::Choices(parse_choices(rest[body_start..close].trim(), expression)?));
        rest = &rest[close + 1..];
    }
    if !rest.is_empty() {
        segments.push(Segment::Literal(rest.to_string()));
    }
    Ok(segments)
}

fn parse_choices(body: &str, expression: &str) -> Result<Vec<String>> {
    if let Some((low, high)) = body.split_once("..") {
        let (low, high) = (low.trim(), high.trim());
        let parsed = low.parse::<i64>().and_then(|l| high.parse::<i64>().map(|h| (l, h)));
        let (l, h) = parsed
            .map_err(|_| Error::Config(format!("Invalid range '{}' in inline expression '{}'", body, expression)))?;
        if h < l {
            return Err(Error::Config(format!("Empty range '{}' in inline expression '{}'", body, expression)));
        }
        // keep zero padding of the lower bound, e.g. ${00..15}
        let width = if low.len() > 1 && low.starts_with('0') { low.len() } else { 0 };
        return Ok((l..=h).map(|v| format!("{:0width$}", v, width = width)).collect());
    }
    let list = body.strip_prefix('[').and_then(|b| b.strip_suffix(']')).unwrap_or(body);
    let choices: Vec<String> = list
        .split(',')
        .map(|c| c.trim().trim_matches(|q| q == '\'' || q == '"').to_string())
        .filter(|c| !c.is_empty())
        .collect();
    if choices.is_empty() {
        return Err(Error::Config(format!("Empty placeholder in inline expression '{}'", expression)));
    }
    Ok(choices)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_product() {
        assert_eq!(
            expand("ds_${0..1}.t_order_${0..1}").unwrap(),
            vec!["ds_0.t_order_0", "ds_0.t_order_1", "ds_1.t_order_0", "ds_1.t_order_1"]
        );
    }

    #[test]
    fn test_list_and_top_level_commas() {
        assert_eq!(
            expand("ds_0.t_user, ds_${['1', '2']}.t_user").unwrap(),
            vec!["ds_0.t_user", "ds_1.t_user", "ds_2.t_user"]
        );
    }

    #[test]
    fn test_zero_padding() {
        assert_eq!(expand("t_${00..02}").unwrap(), vec!["t_00", "t_01", "t_02"]);
    }

    #[test]
    fn test_plain_text_passes_through() {
        assert_eq!(expand("ds_0.t_config").unwrap(), vec!["ds_0.t_config"]);
    }

    #[test]
    fn test_malformed_expressions() {
        assert!(expand("ds_${0..1.t_order").is_err());
        assert!(expand("ds_${3..1}").is_err());
        assert!(expand("ds_${a..b}").is_err());
    }
}
