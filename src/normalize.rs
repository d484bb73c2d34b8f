// ABOUTME: Canonical form of runtime configuration for equality checks.
// ABOUTME: Sorts lists recursively so runtime echo ordering never reads as drift.

use serde_json::Value;

/// Canonicalize a configuration value.
///
/// Maps keep their keys and have their values normalized. Lists have their
/// elements normalized and are then sorted by the compact JSON text of each
/// element, which makes list comparison insensitive to ordering. Everything
/// else passes through unchanged.
pub fn normalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, value)| (key.clone(), normalize(value)))
                .collect(),
        ),
        Value::Array(items) => {
            let mut keyed: Vec<(String, Value)> = items
                .iter()
                .map(|item| {
                    let item = normalize(item);
                    (item.to_string(), item)
                })
                .collect();
            keyed.sort_by(|a, b| a.0.cmp(&b.0));
            Value::Array(keyed.into_iter().map(|(_, item)| item).collect())
        }
        scalar => scalar.clone(),
    }
}

/// Structural equality of the normalized forms.
pub fn equal(a: &Value, b: &Value) -> bool {
    normalize(a) == normalize(b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn list_order_is_ignored() {
        assert!(equal(&json!({"A": 1, "B": [1, 2]}), &json!({"A": 1, "B": [2, 1]})));
    }

    #[test]
    fn nested_lists_inside_maps_inside_lists() {
        let a = json!([{"Env": ["B=2", "A=1"]}, {"Env": ["C=3"]}]);
        let b = json!([{"Env": ["C=3"]}, {"Env": ["A=1", "B=2"]}]);
        assert!(equal(&a, &b));
    }

    #[test]
    fn empty_map_and_empty_list_differ() {
        assert!(!equal(&json!({}), &json!([])));
    }

    #[test]
    fn scalars_compare_by_value() {
        assert!(equal(&json!("x"), &json!("x")));
        assert!(!equal(&json!(1), &json!("1")));
        assert!(equal(&Value::Null, &Value::Null));
    }

    #[test]
    fn different_values_are_not_equal() {
        assert!(!equal(&json!({"A": [1, 2]}), &json!({"A": [1, 3]})));
        assert!(!equal(&json!({"A": 1}), &json!({"A": 1, "B": 2})));
    }

    #[test]
    fn duplicates_are_preserved() {
        assert!(!equal(&json!([1, 1, 2]), &json!([1, 2])));
    }

    fn arb_value() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i32>().prop_map(|n| json!(n)),
            "[a-z=0-9]{0,6}".prop_map(Value::String),
        ];
        leaf.prop_recursive(4, 32, 6, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
                prop::collection::btree_map("[A-Za-z]{1,5}", inner, 0..5)
                    .prop_map(|m| Value::Object(m.into_iter().collect())),
            ]
        })
    }

    proptest! {
        #[test]
        fn normalize_is_idempotent(v in arb_value()) {
            let once = normalize(&v);
            prop_assert_eq!(normalize(&once), once);
        }

        #[test]
        fn permutations_are_equal(
            items in prop::collection::vec(arb_value(), 0..8),
            seed in any::<u64>(),
        ) {
            let mut shuffled = items.clone();
            // Deterministic Fisher-Yates driven by the generated seed
            let mut state = seed;
            for i in (1..shuffled.len()).rev() {
                state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                let j = (state >> 33) as usize % (i + 1);
                shuffled.swap(i, j);
            }
            prop_assert!(equal(&Value::Array(items), &Value::Array(shuffled)));
        }
    }
}
