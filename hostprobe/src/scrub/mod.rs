//! Post-collection normalization.
//!
//! Scrubbing rewrites collected values in place: every string is
//! normalized, then a handful of well-known fields are canonicalized.
//! Running it twice gives the same result as running it once.

mod tables;

use std::sync::LazyLock;

use log::debug;
use regex::Regex;

use crate::inventory::{Inventory, Record, Value};

/// `(R)`, `(TM)`, `(C)` and `(SM)` markers.
static MARKERS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\((?:r|tm|c|sm)\)").unwrap());

/// Decorative symbols dropped outright.
const DECORATIVE: [char; 4] = ['\u{2122}', '\u{00AE}', '\u{00A9}', '\u{2120}'];

/// Normalize one string: drop decorative characters and markers, collapse
/// whitespace runs, trim.
pub fn normalize_text(input: &str) -> String {
    let mut text: String = input
        .chars()
        .filter(|c| !DECORATIVE.contains(c))
        .filter_map(|c| match c {
            '\u{00A0}' => Some(' '),
            c if c.is_whitespace() => Some(' '),
            c if c.is_control() => None,
            c => Some(c),
        })
        .collect();

    // Removing one marker can expose another, e.g. "((R)R)"
    while MARKERS.is_match(&text) {
        text = MARKERS.replace_all(&text, "").into_owned();
    }

    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Canonical vendor name, or the input unchanged.
pub fn canonical_vendor(vendor: &str) -> String {
    match tables::lookup(tables::VENDORS, vendor) {
        Some((_, canonical)) => canonical.to_string(),
        None => vendor.to_string(),
    }
}

/// Model with a known prefix replaced by its canonical form.
pub fn canonical_model(model: &str) -> String {
    tables::lookup(tables::MODELS, model)
        .and_then(|(len, canonical)| Some(format!("{canonical}{}", model.get(len..)?)))
        .unwrap_or_else(|| model.to_string())
}

fn normalize_value(value: &mut Value) {
    match value {
        Value::Text(text) => *value = Value::text(normalize_text(text)),
        Value::List(items) => items.iter_mut().for_each(normalize_value),
        Value::Map(map) => map.values_mut().for_each(normalize_value),
        Value::Absent | Value::Bool(_) | Value::Integer(_) => {}
    }
}

/// Apply `f` to every text inside `value`.
fn map_text(value: &mut Value, f: &dyn Fn(&str) -> String) {
    match value {
        Value::Text(text) => *text = f(text),
        Value::List(items) => items.iter_mut().for_each(|item| map_text(item, f)),
        Value::Map(map) => map.values_mut().for_each(|item| map_text(item, f)),
        Value::Absent | Value::Bool(_) | Value::Integer(_) => {}
    }
}

fn canonicalize(field: &str, value: &mut Value) {
    match field {
        "hostname" | "mac_address" => map_text(value, &|s| s.to_uppercase()),
        "domain" | "fqdn" | "wwn" => map_text(value, &|s| s.to_lowercase()),
        "vendor" | "bios_vendor" => map_text(value, &canonical_vendor),
        "model" | "cpu_model" => map_text(value, &canonical_model),
        _ => {}
    }
}

/// Scrub one record in place.
pub fn scrub_record(record: &mut Record) {
    for (field, value) in record.values_mut() {
        normalize_value(value);
        canonicalize(field, value);
    }
}

/// Scrub every collected category in place.
pub fn scrub(inventory: &mut Inventory) {
    for (category, data) in inventory.iter_mut() {
        debug!("scrub: {} ({} record(s))", category, data.records().len());
        data.records_mut().iter_mut().for_each(scrub_record);
    }
}
