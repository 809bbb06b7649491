//! Attribute ledger: bounded integer resources and pure delta arithmetic.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Snapshot of every tracked resource, keyed by resource name.
pub type Attributes = BTreeMap<String, i64>;

/// Sparse signed changes keyed by resource name.
pub type Deltas = BTreeMap<String, i64>;

/// Valid range and starting value for one resource.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSpec {
    /// Resource key as it appears in snapshots, e.g. "cash".
    pub key: String,
    /// Starting value when a game is created without generated attributes.
    pub initial: i64,
    /// Lower bound (inclusive).
    #[serde(default)]
    pub min: i64,
    /// Upper bound (inclusive); `None` means unbounded.
    #[serde(default)]
    pub max: Option<i64>,
}

impl ResourceSpec {
    /// Resource clamped to `[0, max]`.
    pub fn bounded(key: &str, initial: i64, max: i64) -> Self {
        Self {
            key: key.to_string(),
            initial,
            min: 0,
            max: Some(max),
        }
    }

    /// Resource with a floor of 0 and no ceiling.
    pub fn floored(key: &str, initial: i64) -> Self {
        Self {
            key: key.to_string(),
            initial,
            min: 0,
            max: None,
        }
    }

    /// Clamp `value` into this resource's range.
    pub fn clamp(&self, value: i64) -> i64 {
        let v = value.max(self.min);
        match self.max {
            Some(max) => v.min(max),
            None => v,
        }
    }
}

/// The fixed set of resources a game tracks.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeSchema {
    pub resources: Vec<ResourceSpec>,
}

impl Default for AttributeSchema {
    fn default() -> Self {
        Self {
            resources: vec![
                ResourceSpec::floored("cash", 1000),
                ResourceSpec::bounded("morale", 50, 100),
                ResourceSpec::bounded("reputation", 50, 100),
                ResourceSpec::floored("innovation", 10),
            ],
        }
    }
}

impl AttributeSchema {
    pub fn spec(&self, key: &str) -> Option<&ResourceSpec> {
        self.resources.iter().find(|r| r.key == key)
    }

    /// Clamp a value for `key`. Keys outside the schema only get the 0 floor.
    pub fn clamp(&self, key: &str, value: i64) -> i64 {
        match self.spec(key) {
            Some(spec) => spec.clamp(value),
            None => value.max(0),
        }
    }

    pub fn initial_snapshot(&self) -> Attributes {
        self.resources
            .iter()
            .map(|r| (r.key.clone(), r.clamp(r.initial)))
            .collect()
    }

    /// Build a starting snapshot from generated values.
    ///
    /// Only schema keys survive; missing keys take their configured initial
    /// value and everything is clamped.
    pub fn seed(&self, generated: &Attributes) -> Attributes {
        self.resources
            .iter()
            .map(|r| {
                let value = lookup(generated, &r.key)
                    .map(|(_, v)| *v)
                    .unwrap_or(r.initial);
                (r.key.clone(), r.clamp(value))
            })
            .collect()
    }
}

/// Entry for `key`, preferring an exact match over a case-insensitive one.
fn lookup<'a>(map: &'a BTreeMap<String, i64>, key: &str) -> Option<(&'a String, &'a i64)> {
    map.get_key_value(key)
        .or_else(|| map.iter().find(|(k, _)| k.eq_ignore_ascii_case(key)))
}

/// Apply sparse deltas to a snapshot and clamp the touched keys.
///
/// Delta keys match snapshot keys ignoring ASCII case, and the result keeps
/// the snapshot's spelling. Keys with no match are ignored: the attribute
/// set is fixed by the snapshot, not by generated content.
pub fn apply_deltas(schema: &AttributeSchema, snapshot: &Attributes, deltas: &Deltas) -> Attributes {
    let mut next = snapshot.clone();
    for (key, delta) in deltas {
        let Some((known, _)) = lookup(snapshot, key) else {
            debug!(key = %key, delta, "ignoring delta for unknown attribute");
            continue;
        };
        if let Some(value) = next.get_mut(known) {
            *value = schema.clamp(known, value.saturating_add(*delta));
        }
    }
    next
}

/// Keys whose value differs between two snapshots, with `after - before`.
pub fn diff(before: &Attributes, after: &Attributes) -> Deltas {
    let mut out = Deltas::new();
    for (key, &new) in after {
        let old = before.get(key).copied().unwrap_or(0);
        if new != old {
            out.insert(key.clone(), new.saturating_sub(old));
        }
    }
    for (key, &old) in before {
        if !after.contains_key(key) && old != 0 {
            out.insert(key.clone(), old.saturating_neg());
        }
    }
    out
}
