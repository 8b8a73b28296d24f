//! The dynamic value model.
//!
//! Values flowing from manifests, targets, template specs, override files
//! and `-v` flags are untyped nested trees: scalars, sequences and
//! string-keyed mappings. [`serde_yaml::Value`] is exactly that tagged sum
//! with codecs derived for every format this crate touches, so the module
//! provides operations over it rather than a parallel type:
//!
//! - [`deep_merge`] combines layers with last-writer-wins at scalar leaves,
//! - [`lookup_nested`] / [`set_nested`] implement dotted-path access,
//! - [`collect_strings`] gathers string leaves (used for secret redaction).
//!
//! Sequences overwrite wholesale on merge; they are never concatenated.

pub mod overrides;

use serde_yaml::{Mapping, Value};

use crate::core::GokError;

/// A string-keyed tree of values.
pub type Values = Mapping;

/// Merge value layers left to right into a fresh tree.
///
/// Mappings merge recursively; any other pair of values is resolved in favor
/// of the later layer. The inputs are never mutated and nested mappings are
/// copied into the result, so the output shares no structure with any input.
pub fn deep_merge<'a, I>(layers: I) -> Values
where
    I: IntoIterator<Item = &'a Values>,
{
    let mut out = Values::new();
    for layer in layers {
        merge_into(&mut out, layer);
    }
    out
}

fn merge_into(dst: &mut Values, src: &Values) {
    for (key, value) in src {
        if let Value::Mapping(src_map) = value {
            if let Some(Value::Mapping(dst_map)) = dst.get_mut(key) {
                merge_into(dst_map, src_map);
                continue;
            }
            let mut copy = Values::new();
            merge_into(&mut copy, src_map);
            dst.insert(key.clone(), Value::Mapping(copy));
            continue;
        }
        dst.insert(key.clone(), value.clone());
    }
}

/// Look up a dotted path, walking only through mappings.
///
/// Returns `None` when any segment is missing or when traversal hits a
/// non-mapping before the final segment.
pub fn lookup_nested<'a>(map: &'a Values, path: &str) -> Option<&'a Value> {
    let mut current = map;
    let mut segments = path.split('.').peekable();
    loop {
        let segment = segments.next()?;
        let key = Value::String(segment.to_string());
        let value = current.get(&key)?;
        if segments.peek().is_none() {
            return Some(value);
        }
        match value {
            Value::Mapping(next) => current = next,
            _ => return None,
        }
    }
}

/// Set a dotted path, creating intermediate mappings as needed.
///
/// Fails with [`GokError::NonMapSegment`] when an existing prefix resolves
/// to a non-mapping (e.g. setting `a.b.c` while `a.b` is a string).
pub fn set_nested(map: &mut Values, path: &str, value: Value) -> Result<(), GokError> {
    let segments: Vec<&str> = path.split('.').collect();
    let (last, prefix) = segments.split_last().expect("split never yields an empty list");

    let mut current = map;
    for (i, segment) in prefix.iter().enumerate() {
        let key = Value::String((*segment).to_string());
        if !current.contains_key(&key) {
            current.insert(key.clone(), Value::Mapping(Values::new()));
        }
        current = match current.get_mut(&key) {
            Some(Value::Mapping(next)) => next,
            _ => {
                return Err(GokError::NonMapSegment {
                    path: path.to_string(),
                    segment: segments[..=i].join("."),
                })
            }
        };
    }

    current.insert(Value::String((*last).to_string()), value);
    Ok(())
}

/// Recursively collect all non-empty string leaves of a value tree.
#[must_use]
pub fn collect_strings(value: &Value) -> Vec<String> {
    let mut out = Vec::new();
    collect_strings_into(value, &mut out);
    out
}

fn collect_strings_into(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::String(s) => {
            if !s.is_empty() {
                out.push(s.clone());
            }
        }
        Value::Sequence(seq) => {
            for item in seq {
                collect_strings_into(item, out);
            }
        }
        Value::Mapping(map) => {
            for (_, item) in map {
                collect_strings_into(item, out);
            }
        }
        _ => {}
    }
}
