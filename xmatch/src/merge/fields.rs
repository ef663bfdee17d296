use crate::types::Record;

/// Merges the fields of two records.
///
/// Keys found in only one record pass through unchanged. Keys found in both are emitted twice,
/// as `{left_name}_{key}` and `{right_name}_{key}`.
pub fn merge_fields(left_name: &str, left: Record, right_name: &str, right: Record) -> Record {
    let mut merged = Record::new();

    for (key, value) in left.iter() {
        if right.contains_key(key) {
            merged.insert(prefixed(left_name, key), value.clone());
        } else {
            merged.insert(key, value.clone());
        }
    }

    for (key, value) in right {
        if left.contains_key(&key) {
            merged.insert(prefixed(right_name, &key), value);
        } else {
            merged.insert(key, value);
        }
    }

    merged
}

/// Applies the [`merge_fields`] rule to key lists.
///
/// Returns the keys a merged record has, left keys first, each list keeping its order. This
/// lets callers derive the merged schema before any record is produced.
pub fn merge_keys<L, R>(left_name: &str, left: &[L], right_name: &str, right: &[R]) -> Vec<String>
where
    L: AsRef<str>,
    R: AsRef<str>,
{
    let in_left = |key: &str| left.iter().any(|k| k.as_ref() == key);
    let in_right = |key: &str| right.iter().any(|k| k.as_ref() == key);

    let left_keys = left.iter().map(|key| {
        let key = key.as_ref();
        if in_right(key) {
            prefixed(left_name, key)
        } else {
            key.to_string()
        }
    });
    let right_keys = right.iter().map(|key| {
        let key = key.as_ref();
        if in_left(key) {
            prefixed(right_name, key)
        } else {
            key.to_string()
        }
    });

    left_keys.chain(right_keys).collect()
}

fn prefixed(name: &str, key: &str) -> String {
    format!("{name}_{key}")
}
