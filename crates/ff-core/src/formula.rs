//! Reference scanner for `calculateValue` expressions.
//!
//! Built on `winnow` 0.7. Formulas are JavaScript snippets such as
//! `value = data.price * data.qty`; only the parts that matter for the tree
//! are understood: `data.<key>` / `row.<key>` member accesses (dotted or
//! bracketed), string literals (skipped) and bracket balance. Everything
//! else passes through untouched.

use crate::error::FormError;
use std::ops::Range;
use winnow::combinator::{alt, delimited, preceded};
use winnow::error::ContextError;
use winnow::prelude::*;
use winnow::token::{any, take_till, take_while};

/// Which object a reference reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefScope {
    /// `data.<key>`: a field anywhere in the submission.
    Data,
    /// `row.<key>`: a sibling inside the same edit-grid row.
    Row,
}

/// One component reference inside a formula.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormulaRef {
    pub scope: RefScope,
    pub key: String,
    /// Byte range of `key` inside the source.
    pub span: Range<usize>,
}

/// Extract every `data.*` / `row.*` reference, in source order.
pub fn references(src: &str) -> Result<Vec<FormulaRef>, FormError> {
    let mut refs = Vec::new();
    let mut open: Vec<(char, usize)> = Vec::new();
    let mut rest = src;
    let mut after_dot = false;

    while let Some(c) = rest.chars().next() {
        let offset = src.len() - rest.len();
        match c {
            '"' | '\'' | '`' => {
                skip_string_literal.parse_next(&mut rest).map_err(|_| {
                    FormError::Formula {
                        offset,
                        message: "unterminated string literal".into(),
                    }
                })?;
                after_dot = false;
            }
            '(' | '[' | '{' => {
                open.push((c, offset));
                rest = &rest[1..];
                after_dot = false;
            }
            ')' | ']' | '}' => {
                let expected = match c {
                    ')' => '(',
                    ']' => '[',
                    _ => '{',
                };
                match open.pop() {
                    Some((o, _)) if o == expected => {}
                    _ => {
                        return Err(FormError::Formula {
                            offset,
                            message: format!("unbalanced `{c}`"),
                        });
                    }
                }
                rest = &rest[1..];
                after_dot = false;
            }
            c if c.is_ascii_digit() => {
                let _ = take_while::<_, _, ContextError>(1.., |c: char| {
                    c.is_ascii_alphanumeric() || c == '.' || c == '_'
                })
                .parse_next(&mut rest);
                after_dot = false;
            }
            c if is_ident_start(c) => {
                let ident = parse_identifier.parse_next(&mut rest).map_err(|_| {
                    FormError::Formula {
                        offset,
                        message: "bad identifier".into(),
                    }
                })?;
                let scope = match ident {
                    "data" if !after_dot => Some(RefScope::Data),
                    "row" if !after_dot => Some(RefScope::Row),
                    _ => None,
                };
                if let Some(scope) = scope {
                    let checkpoint = rest;
                    match parse_member.parse_next(&mut rest) {
                        Ok(key) => {
                            let start = offset_in(src, key);
                            refs.push(FormulaRef {
                                scope,
                                key: key.to_string(),
                                span: start..start + key.len(),
                            });
                        }
                        Err(_) => rest = checkpoint,
                    }
                }
                after_dot = false;
            }
            '.' => {
                rest = &rest[1..];
                after_dot = true;
            }
            c if c.is_whitespace() => {
                rest = &rest[c.len_utf8()..];
            }
            _ => {
                rest = &rest[c.len_utf8()..];
                after_dot = false;
            }
        }
    }

    if let Some((c, offset)) = open.pop() {
        return Err(FormError::Formula {
            offset,
            message: format!("unclosed `{c}`"),
        });
    }
    Ok(refs)
}

/// Rewrite every reference to `old` so it names `new` instead.
pub fn rename_reference(src: &str, old: &str, new: &str) -> Result<String, FormError> {
    let refs = references(src)?;
    let mut out = src.to_string();
    for r in refs.iter().rev().filter(|r| r.key == old) {
        out.replace_range(r.span.clone(), new);
    }
    Ok(out)
}

/// Distinct referenced keys, first occurrence order.
pub fn referenced_keys(src: &str) -> Result<Vec<String>, FormError> {
    let mut keys: Vec<String> = Vec::new();
    for r in references(src)? {
        if !keys.contains(&r.key) {
            keys.push(r.key);
        }
    }
    Ok(keys)
}

// ─── Low-level parsers ──────────────────────────────────────────────────

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn parse_identifier<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    take_while(1.., |c: char| c.is_alphanumeric() || c == '_' || c == '$').parse_next(input)
}

/// `.key`, `['key']` or `["key"]`.
fn parse_member<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    alt((
        preceded('.', parse_identifier),
        delimited(
            '[',
            alt((
                delimited('\'', take_till(1.., '\''), '\''),
                delimited('"', take_till(1.., '"'), '"'),
            )),
            ']',
        ),
    ))
    .parse_next(input)
}

fn skip_string_literal(input: &mut &str) -> ModalResult<()> {
    let quote: char = any.parse_next(input)?;
    loop {
        let _: &str = take_till(0.., |c: char| c == quote || c == '\\').parse_next(input)?;
        let c: char = any.parse_next(input)?;
        if c == '\\' {
            let _: char = any.parse_next(input)?;
        } else {
            return Ok(());
        }
    }
}

/// Byte offset of `slice` inside `src`. `slice` must borrow from `src`.
fn offset_in(src: &str, slice: &str) -> usize {
    slice.as_ptr() as usize - src.as_ptr() as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(src: &str) -> Vec<String> {
        references(src).unwrap().into_iter().map(|r| r.key).collect()
    }

    #[test]
    fn dotted_and_bracketed_refs() {
        assert_eq!(
            keys("value = data.price * data['qty'] + row[\"tax\"];"),
            ["price", "qty", "tax"]
        );
    }

    #[test]
    fn scope_is_recorded() {
        let refs = references("row.a + data.b").unwrap();
        assert_eq!(refs[0].scope, RefScope::Row);
        assert_eq!(refs[1].scope, RefScope::Data);
    }

    #[test]
    fn string_literals_are_skipped() {
        assert_eq!(keys("value = 'data.fake' + data.real"), ["real"]);
        assert_eq!(keys(r#"value = "say \"data.x\"" + data.y"#), ["y"]);
    }

    #[test]
    fn nested_member_is_not_a_reference() {
        assert_eq!(keys("value = instance.data.total"), Vec::<String>::new());
        assert_eq!(keys("value = metadata.x"), Vec::<String>::new());
    }

    #[test]
    fn numbers_do_not_confuse_the_scanner() {
        assert_eq!(keys("value = 1.5 * data.rate"), ["rate"]);
    }

    #[test]
    fn unbalanced_brackets_are_errors() {
        let err = references("value = (data.a + 1").unwrap_err();
        assert!(matches!(err, FormError::Formula { offset: 8, .. }));
        assert!(references("value = data.a)").is_err());
        assert!(references("value = 'open").is_err());
    }

    #[test]
    fn rename_rewrites_only_matching_keys() {
        let out = rename_reference("value = data.qty * data.qtyMax + data['qty']", "qty", "count")
            .unwrap();
        assert_eq!(out, "value = data.count * data.qtyMax + data['count']");
    }

    #[test]
    fn referenced_keys_are_distinct() {
        assert_eq!(
            referenced_keys("value = data.a + data.b + data.a").unwrap(),
            ["a", "b"]
        );
    }
}
