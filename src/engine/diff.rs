//! Minimal patch computation between desired and current objects.
//!
//! The comparison is a recursive subset check: every field the builder set
//! must be present and equal in the current object, while fields only the
//! server sets (defaults, status, bookkeeping metadata) are ignored.
//! Fields in [`BUILDER_OWNED`] are the exception: the server never writes
//! them, so a key the builder dropped is reported as a removal (`null`).

use serde_json::{Map, Value};

/// Metadata fields owned by the API server.
const SERVER_MANAGED_METADATA: &[&str] = &[
    "resourceVersion",
    "uid",
    "creationTimestamp",
    "managedFields",
    "generation",
    "selfLink",
    "deletionTimestamp",
    "deletionGracePeriodSeconds",
];

/// Fields whose whole content comes from the builder.
const BUILDER_OWNED: &[&str] = &[
    "labels",
    "annotations",
    "data",
    "binaryData",
    "nodeSelector",
    "matchLabels",
    "limits",
    "requests",
    "affinity",
    "tolerations",
];

/// How allocations made by the platform are treated on update.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DiffPolicy {
    /// Desired object is written as built.
    #[default]
    Strict,
    /// Cluster IPs and node ports are carried over from the current object.
    PreserveAllocations,
}

impl DiffPolicy {
    /// Copy platform-assigned values from `current` into `desired` before diffing.
    pub fn prepare(&self, desired: &mut Value, current: &Value) {
        strip_server_managed(desired);
        if *self == DiffPolicy::PreserveAllocations {
            preserve_allocations(desired, current);
        }
    }
}

/// Fields of `desired` that differ from `current`; an empty object when in sync.
pub fn compute_patch(desired: &Value, current: &Value) -> Value {
    let mut desired = desired.clone();
    strip_server_managed(&mut desired);
    diff_value(&desired, current, false).unwrap_or_else(|| Value::Object(Map::new()))
}

/// Whether a patch from [`compute_patch`] changes nothing.
pub fn is_empty_patch(patch: &Value) -> bool {
    match patch {
        Value::Object(map) => map.is_empty(),
        Value::Null => true,
        _ => false,
    }
}

/// `owned` marks a value below a [`BUILDER_OWNED`] field, where extra keys
/// in `current` are removals rather than server defaults.
fn diff_value(desired: &Value, current: &Value, owned: bool) -> Option<Value> {
    match (desired, current) {
        (Value::Object(desired), Value::Object(current)) => {
            let mut patch = Map::new();
            for (key, desired_field) in desired {
                if desired_field.is_null() {
                    continue;
                }
                let owned_field = owned || BUILDER_OWNED.contains(&key.as_str());
                match current.get(key) {
                    Some(current_field) => {
                        if let Some(changed) = diff_value(desired_field, current_field, owned_field) {
                            patch.insert(key.clone(), changed);
                        }
                    }
                    None => {
                        patch.insert(key.clone(), desired_field.clone());
                    }
                }
            }
            for (key, current_field) in current {
                if desired.get(key).is_some_and(|d| !d.is_null()) || is_unset(current_field) {
                    continue;
                }
                if owned || BUILDER_OWNED.contains(&key.as_str()) {
                    patch.insert(key.clone(), Value::Null);
                }
            }
            (!patch.is_empty()).then_some(Value::Object(patch))
        }
        (Value::Array(desired_items), Value::Array(current_items)) => {
            let differs = desired_items.len() != current_items.len()
                || desired_items
                    .iter()
                    .zip(current_items)
                    .any(|(d, c)| diff_value(d, c, owned).is_some());
            differs.then(|| desired.clone())
        }
        _ => (desired != current).then(|| desired.clone()),
    }
}

/// Null or empty, the same as absent once serialized.
fn is_unset(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

fn strip_server_managed(object: &mut Value) {
    if let Some(map) = object.as_object_mut() {
        map.remove("status");
        if let Some(metadata) = map.get_mut("metadata").and_then(Value::as_object_mut) {
            for field in SERVER_MANAGED_METADATA {
                metadata.remove(*field);
            }
        }
    }
}

fn preserve_allocations(desired: &mut Value, current: &Value) {
    let Some(current_spec) = current.get("spec") else {
        return;
    };
    let Some(desired_spec) = desired.get_mut("spec").and_then(Value::as_object_mut) else {
        return;
    };

    for field in ["clusterIP", "clusterIPs", "healthCheckNodePort"] {
        if !desired_spec.contains_key(field)
            && let Some(value) = current_spec.get(field)
        {
            desired_spec.insert(field.to_string(), value.clone());
        }
    }

    let Some(current_ports) = current_spec.get("ports").and_then(Value::as_array) else {
        return;
    };
    let Some(desired_ports) = desired_spec.get_mut("ports").and_then(Value::as_array_mut) else {
        return;
    };
    for port in desired_ports.iter_mut() {
        let Some(port) = port.as_object_mut() else {
            continue;
        };
        if port.contains_key("nodePort") {
            continue;
        }
        let name = port.get("name").cloned();
        let allocated = current_ports
            .iter()
            .find(|p| p.get("name").cloned() == name)
            .and_then(|p| p.get("nodePort"))
            .cloned();
        if let Some(node_port) = allocated {
            port.insert("nodePort".to_string(), node_port);
        }
    }
}
