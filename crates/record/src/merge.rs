use serde_json::{Map, Value};

/// Deep-merges `patch` into `base`.
///
/// Mappings merge key by key. Every other value in the patch, sequences
/// included, replaces what was there.
pub fn deep_merge(base: Value, patch: Value) -> Value {
  match (base, patch) {
    (Value::Object(mut base), Value::Object(patch)) => {
      merge_maps(&mut base, patch);
      Value::Object(base)
    }
    (_, patch) => patch,
  }
}

/// Deep-merges the `patch` map into `base` in place.
pub fn merge_maps(base: &mut Map<String, Value>, patch: Map<String, Value>) {
  for (key, incoming) in patch {
    let merged = match base.remove(&key) {
      Some(existing) => deep_merge(existing, incoming),
      None => incoming,
    };
    base.insert(key, merged);
  }
}
