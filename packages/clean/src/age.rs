//! Age sentinel handling shared by the party and victim tables.

use collision_map_table::Value;

/// Age codes that mean "not stated" rather than a real age.
pub const AGE_SENTINELS: &[i64] = &[0, 998];

/// Replaces sentinel ages with [`Value::Missing`] and coerces the rest to
/// integers.
///
/// Cells that are not integer-like become missing as well, so a non-missing
/// count over the result counts real ages only.
#[must_use]
pub fn sanitize_age(values: &[Value]) -> Vec<Value> {
    values.iter().map(sanitize_age_value).collect()
}

fn sanitize_age_value(value: &Value) -> Value {
    match value.as_i64() {
        Some(age) if !AGE_SENTINELS.contains(&age) => Value::Int(age),
        _ => Value::Missing,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinels_become_missing() {
        let out = sanitize_age(&[Value::Int(0), Value::Int(998)]);
        assert!(out.iter().all(Value::is_missing));
    }

    #[test]
    fn real_ages_pass_through() {
        for age in [1, 17, 45, 99, 997, 999, 120] {
            assert_eq!(sanitize_age(&[Value::Int(age)]), vec![Value::Int(age)]);
        }
    }

    #[test]
    fn integral_floats_and_text_are_coerced() {
        let out = sanitize_age(&[Value::Float(34.0), Value::from("52"), Value::from("abc")]);
        assert_eq!(out, vec![Value::Int(34), Value::Int(52), Value::Missing]);
    }

    #[test]
    fn missing_stays_missing() {
        assert_eq!(sanitize_age(&[Value::Missing]), vec![Value::Missing]);
    }
}
