// src/template.rs

//! `{placeholder}` interpolation over a flat key/value mapping
//!
//! Values are JSON values. Strings and arrays of strings are rendered, any
//! other value passes through untouched. A placeholder is `{ident}` where
//! `ident` is made of ASCII letters, digits and underscores; anything else in
//! braces is left literal, and so is `${...}` so shell parameter expansion in
//! recipe commands survives rendering.
//!
//! [`resolve`] re-renders the whole mapping against the previous snapshot
//! until a pass changes nothing. Chains of length `n` settle in at most `n`
//! passes, so the number of passes is bounded by the number of keys and a
//! mapping still changing after that is reported as a configuration error.

use crate::error::{Error, Result};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

/// Flat mapping the resolver works on
pub type TemplateMap = BTreeMap<String, Value>;

/// Resolve every placeholder in `map` until fixpoint
pub fn resolve(map: &TemplateMap) -> Result<TemplateMap> {
    let max_passes = map.len() + 2;
    let mut current = map.clone();

    for pass in 1..=max_passes {
        let mut next = TemplateMap::new();
        for (key, value) in &current {
            next.insert(key.clone(), render_value(value, &current)?);
        }

        if next == current {
            debug!("template resolved after {} pass(es)", pass);
            check_self_references(&current)?;
            return Ok(current);
        }
        current = next;
    }

    let unsettled: Vec<&str> = current
        .iter()
        .filter(|(_, v)| !references(v, &current).is_empty())
        .map(|(k, _)| k.as_str())
        .collect();

    Err(Error::ConfigError(format!(
        "template did not converge after {} passes; cyclic references among: {}",
        max_passes,
        unsettled.join(", ")
    )))
}

/// Render a single template once against an already resolved mapping
pub fn render(template: &str, ctx: &TemplateMap) -> Result<String> {
    render_str(template, ctx)
}

fn render_value(value: &Value, ctx: &TemplateMap) -> Result<Value> {
    match value {
        Value::String(s) => Ok(Value::String(render_str(s, ctx)?)),
        Value::Array(items) if items.iter().all(Value::is_string) => {
            let mut rendered = Vec::with_capacity(items.len());
            for item in items {
                rendered.push(render_value(item, ctx)?);
            }
            Ok(Value::Array(rendered))
        }
        other => Ok(other.clone()),
    }
}

fn render_str(template: &str, ctx: &TemplateMap) -> Result<String> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        let (before, after_open) = rest.split_at(open);
        out.push_str(before);

        let shell_expansion = before.ends_with('$');
        match placeholder_at(after_open) {
            Some(ident) if !shell_expansion => {
                let value = ctx.get(ident).ok_or_else(|| {
                    Error::ConfigError(format!("unknown placeholder '{{{}}}'", ident))
                })?;
                out.push_str(&value_as_text(value));
                rest = &after_open[ident.len() + 2..];
            }
            _ => {
                out.push('{');
                rest = &after_open[1..];
            }
        }
    }

    out.push_str(rest);
    Ok(out)
}

/// Identifier of a `{ident}` placeholder starting at the head of `s`
fn placeholder_at(s: &str) -> Option<&str> {
    let body = s.strip_prefix('{')?;
    let end = body.find('}')?;
    let ident = &body[..end];
    if !ident.is_empty() && ident.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Some(ident)
    } else {
        None
    }
}

fn value_as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(value_as_text)
            .collect::<Vec<_>>()
            .join(" "),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Keys of `ctx` still referenced by placeholders inside `value`
fn references<'a>(value: &'a Value, ctx: &TemplateMap) -> Vec<&'a str> {
    let mut found = Vec::new();
    let mut collect = |s: &'a str| {
        for (idx, _) in s.match_indices('{') {
            if s[..idx].ends_with('$') {
                continue;
            }
            if let Some(ident) = placeholder_at(&s[idx..]) {
                if ctx.contains_key(ident) {
                    found.push(ident);
                }
            }
        }
    };

    match value {
        Value::String(s) => collect(s),
        Value::Array(items) => {
            for item in items {
                if let Value::String(s) = item {
                    collect(s);
                }
            }
        }
        _ => {}
    }
    found
}

fn check_self_references(map: &TemplateMap) -> Result<()> {
    for (key, value) in map {
        let refs = references(value, map);
        if let Some(first) = refs.first() {
            return Err(Error::ConfigError(format!(
                "placeholder '{{{}}}' in '{}' refers back to itself",
                first, key
            )));
        }
    }
    Ok(())
}

/// Build a [`TemplateMap`] from string pairs
pub fn map_of<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> TemplateMap
where
    K: Into<String>,
    V: Into<Value>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_resolve_simple_reference() {
        let map = map_of([("a", "hello"), ("b", "{a} world")]);
        let resolved = resolve(&map).unwrap();
        assert_eq!(resolved["a"], json!("hello"));
        assert_eq!(resolved["b"], json!("hello world"));
    }

    #[test]
    fn test_resolve_nested_lists() {
        let mut map = TemplateMap::new();
        map.insert("prefix".into(), json!("/a/b/c"));
        map.insert(
            "flags".into(),
            json!(["/c/d/e", "{prefix}/wow", "/A/{flags1}"]),
        );
        map.insert("flags1".into(), json!("/x/y"));

        let resolved = resolve(&map).unwrap();
        assert_eq!(
            resolved["flags"],
            json!(["/c/d/e", "/a/b/c/wow", "/A//x/y"])
        );
    }

    #[test]
    fn test_resolve_is_idempotent() {
        let map = map_of([
            ("workdir", "/w"),
            ("builddir", "{workdir}/build"),
            ("cachedir", "{builddir}/cache"),
        ]);
        let once = resolve(&map).unwrap();
        let twice = resolve(&once).unwrap();
        assert_eq!(once, twice);
        assert_eq!(once["cachedir"], json!("/w/build/cache"));
    }

    #[test]
    fn test_non_string_values_pass_through() {
        let mut map = TemplateMap::new();
        map.insert("jobs".into(), json!(4));
        map.insert("ccache".into(), json!(true));
        map.insert("make".into(), json!("make -j{jobs}"));

        let resolved = resolve(&map).unwrap();
        assert_eq!(resolved["jobs"], json!(4));
        assert_eq!(resolved["ccache"], json!(true));
        assert_eq!(resolved["make"], json!("make -j4"));
    }

    #[test]
    fn test_list_reference_is_space_joined() {
        let mut map = TemplateMap::new();
        map.insert("cflags".into(), json!(["-O3", "-g"]));
        map.insert("cmd".into(), json!("cc {cflags} -c x.c"));

        let resolved = resolve(&map).unwrap();
        assert_eq!(resolved["cmd"], json!("cc -O3 -g -c x.c"));
    }

    #[test]
    fn test_cycle_is_config_error() {
        let map = map_of([("a", "{b}"), ("b", "{a}")]);
        let err = resolve(&map).unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));
    }

    #[test]
    fn test_growing_self_reference_is_config_error() {
        let map = map_of([("a", "x{a}")]);
        assert!(matches!(resolve(&map), Err(Error::ConfigError(_))));
    }

    #[test]
    fn test_unknown_placeholder_is_config_error() {
        let map = map_of([("a", "{missing}/x")]);
        let err = resolve(&map).unwrap_err();
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn test_literal_braces_survive() {
        let map = map_of([
            ("home", "/h"),
            ("cmd", "echo ${HOME} {not an ident} { } {home}"),
        ]);
        let resolved = resolve(&map).unwrap();
        assert_eq!(
            resolved["cmd"],
            json!("echo ${HOME} {not an ident} { } /h")
        );
    }

    #[test]
    fn test_render_single_template() {
        let ctx = map_of([("version", "1.1.1w")]);
        let url = render("https://example.org/openssl-{version}.tar.gz", &ctx).unwrap();
        assert_eq!(url, "https://example.org/openssl-1.1.1w.tar.gz");
    }
}
