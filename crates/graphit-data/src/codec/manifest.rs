//! Shape manifest text
//!
//! The manifest is a list of tuples, one per column in column order:
//! `[(30, 50), (30, 50), ()]`. An empty list marks a flat table.

use graphit_core::Shape;

pub fn format_manifest(shapes: &[Shape]) -> String {
    let parts: Vec<String> = shapes.iter().map(Shape::to_string).collect();
    format!("[{}]", parts.join(", "))
}

pub fn parse_manifest(text: &str) -> Result<Vec<Shape>, String> {
    let inner = text
        .trim()
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .ok_or_else(|| format!("manifest is not a list: {:?}", text))?;

    let mut shapes = Vec::new();
    let mut rest = inner.trim_start();
    while !rest.is_empty() {
        let body_start = rest
            .strip_prefix('(')
            .ok_or_else(|| format!("expected '(' at {:?}", rest))?;
        let close = body_start
            .find(')')
            .ok_or_else(|| format!("unterminated tuple at {:?}", rest))?;
        shapes.push(parse_tuple(&body_start[..close])?);

        rest = body_start[close + 1..].trim_start();
        if let Some(after_comma) = rest.strip_prefix(',') {
            rest = after_comma.trim_start();
        } else if !rest.is_empty() {
            return Err(format!("expected ',' at {:?}", rest));
        }
    }
    Ok(shapes)
}

fn parse_tuple(body: &str) -> Result<Shape, String> {
    let dims = body
        .split(',')
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(|d| d.parse::<usize>().map_err(|_| format!("bad dimension {:?}", d)))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Shape::new(dims))
}
