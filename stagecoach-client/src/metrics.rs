//! Service counters
//!
//! Counters are passed around as an `Arc<dyn Metrics>` collaborator rather
//! than registered globally. [`Counters`] keeps them in memory and renders the
//! Prometheus text exposition format.

use std::collections::BTreeMap;
use std::fmt::Write;
use std::sync::Mutex;

pub const HOOKS_TOTAL: &str = "hooks_total";
pub const HOOKS_INVALID: &str = "hooks_invalid";
pub const API_CALLS_TOTAL: &str = "api_calls_total";
pub const API_CALLS_FAILED_TOTAL: &str = "api_calls_failed_total";

pub trait Metrics: Send + Sync {
    /// A parsed hook, by event kind
    fn count_hook(&self, kind: &str);

    /// A request that couldn't be parsed as a hook
    fn count_invalid_hook(&self);

    /// An outgoing API call, by operation name
    fn count_api_call(&self, name: &str);

    fn count_failed_api_call(&self, name: &str);
}

/// In-memory counters keyed by metric name and label value
#[derive(Debug, Default)]
pub struct Counters {
    values: Mutex<BTreeMap<(&'static str, String), u64>>,
}

impl Counters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value of a counter, zero when never incremented
    pub fn get(&self, name: &str, label: &str) -> u64 {
        self.values
            .lock()
            .map(|values| {
                values
                    .iter()
                    .find(|((n, l), _)| *n == name && l == label)
                    .map(|(_, v)| *v)
                    .unwrap_or(0)
            })
            .unwrap_or(0)
    }

    /// Renders every counter in Prometheus text format
    pub fn render(&self) -> String {
        let mut output = String::new();
        let Ok(values) = self.values.lock() else {
            return output;
        };

        let mut current = None;
        for ((name, label), value) in values.iter() {
            if current != Some(*name) {
                let _ = writeln!(output, "# TYPE {} counter", name);
                current = Some(*name);
            }
            match label_key(name) {
                Some(key) => {
                    let _ = writeln!(output, "{}{{{}=\"{}\"}} {}", name, key, label, value);
                }
                None => {
                    let _ = writeln!(output, "{} {}", name, value);
                }
            }
        }
        output
    }

    fn increment(&self, name: &'static str, label: &str) {
        if let Ok(mut values) = self.values.lock() {
            *values.entry((name, label.to_string())).or_insert(0) += 1;
        }
    }
}

fn label_key(name: &str) -> Option<&'static str> {
    match name {
        HOOKS_TOTAL => Some("kind"),
        API_CALLS_TOTAL | API_CALLS_FAILED_TOTAL => Some("name"),
        _ => None,
    }
}

impl Metrics for Counters {
    fn count_hook(&self, kind: &str) {
        self.increment(HOOKS_TOTAL, kind);
    }

    fn count_invalid_hook(&self) {
        self.increment(HOOKS_INVALID, "");
    }

    fn count_api_call(&self, name: &str) {
        self.increment(API_CALLS_TOTAL, name);
    }

    fn count_failed_api_call(&self, name: &str) {
        self.increment(API_CALLS_FAILED_TOTAL, name);
    }
}
