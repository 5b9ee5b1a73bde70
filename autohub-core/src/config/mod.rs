use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tracing::warn;

/// Flat option-name -> value mapping, owned by the host. The host's dialog
/// hands values back as JSON, but numeric and boolean fields frequently
/// arrive as strings, so all derivation goes through the coercing parsers
/// below.
pub type ConfigValues = serde_json::Map<String, Value>;

pub const KEY_SHOW_DEBUG_INFO: &str = "showDebugInfo";
pub const KEY_UPDATE_FREQUENCY: &str = "updateFrequency";

pub const DEFAULT_UPDATE_FREQUENCY: u64 = 60;
pub const MIN_UPDATE_FREQUENCY: u64 = 10;

pub fn parse_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim() {
            "true" | "True" | "1" => Some(true),
            "false" | "False" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

pub fn parse_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub fn bool_value(values: &ConfigValues, key: &str, default: bool) -> bool {
    values.get(key).and_then(parse_bool).unwrap_or(default)
}

pub fn u64_value(values: &ConfigValues, key: &str, default: u64) -> u64 {
    values.get(key).and_then(parse_u64).unwrap_or(default)
}

/// Field-name -> message mapping for validation callbacks. At most one
/// message per field; the first one recorded wins.
#[derive(Debug, Default, Serialize)]
pub struct FieldErrors(HashMap<String, String>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_insert_with(|| message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.0.iter()
    }
}

/// Outcome of a configuration-validation callback. Acceptance is not stored
/// separately: a validation is accepted iff it carries no field errors.
#[derive(Debug, Serialize)]
pub struct Validation {
    pub values: ConfigValues,
    pub errors: FieldErrors,
}

impl Validation {
    pub fn accept(values: ConfigValues) -> Self {
        Self {
            values,
            errors: FieldErrors::new(),
        }
    }

    pub fn with_errors(values: ConfigValues, errors: FieldErrors) -> Self {
        Self { values, errors }
    }

    pub fn accepted(&self) -> bool {
        self.errors.is_empty()
    }
}

/// The two scalars the plugin caches out of its preferences. Atomics so the
/// poll runner can read them without taking a lock.
#[derive(Debug)]
pub struct Settings {
    debug: AtomicBool,
    update_frequency: AtomicU64,
}

impl Settings {
    pub fn from_values(values: &ConfigValues) -> Self {
        Self {
            debug: AtomicBool::new(bool_value(values, KEY_SHOW_DEBUG_INFO, false)),
            update_frequency: AtomicU64::new(u64_value(
                values,
                KEY_UPDATE_FREQUENCY,
                DEFAULT_UPDATE_FREQUENCY,
            )),
        }
    }

    /// Re-derive both scalars from a saved configuration. Values below the
    /// recommended minimum are applied unclamped, only logged.
    pub fn apply(&self, values: &ConfigValues) {
        let debug = bool_value(values, KEY_SHOW_DEBUG_INFO, false);
        let frequency = u64_value(values, KEY_UPDATE_FREQUENCY, DEFAULT_UPDATE_FREQUENCY);
        if frequency < MIN_UPDATE_FREQUENCY {
            warn!(
                "{} of {}s is below the recommended minimum of {}s",
                KEY_UPDATE_FREQUENCY, frequency, MIN_UPDATE_FREQUENCY
            );
        }
        self.debug.store(debug, Ordering::Release);
        self.update_frequency.store(frequency, Ordering::Release);
    }

    pub fn debug(&self) -> bool {
        self.debug.load(Ordering::Acquire)
    }

    pub fn update_frequency(&self) -> u64 {
        self.update_frequency.load(Ordering::Acquire)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.update_frequency())
    }
}
