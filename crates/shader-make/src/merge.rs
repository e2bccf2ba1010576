//! Layering of option sources.

use serde::{de::DeserializeOwned, Serialize};
use serde_json::{from_value, to_value, Result, Value};

/// Overlays `overrides` onto `base`, going through JSON.
///
/// Only values of `overrides` that differ from `T::default()` win, so that an option left
/// unset on the command line doesn't clobber the settings file.
#[inline]
pub fn merge<T>(base: &T, overrides: &T) -> Result<T>
where
    T: Default + Serialize + DeserializeOwned,
{
    let mut merged = to_value(base)?;
    let defaults = to_value(T::default())?;
    overlay(&mut merged, to_value(overrides)?, &defaults);
    from_value(merged)
}

/// Recursively overlays `overrides` onto `base`, field by field, skipping values equal to the
/// matching value of `defaults`.
#[inline]
pub fn overlay(base: &mut Value, overrides: Value, defaults: &Value) {
    match (base, overrides) {
        (Value::Object(base), Value::Object(overrides)) => {
            for (key, value) in overrides {
                let default = defaults.get(&key).unwrap_or(&Value::Null);
                let slot = base.entry(key).or_insert(Value::Null);
                overlay(slot, value, default);
            }
        }
        (base, value) => {
            if value != *defaults {
                *base = value;
            }
        }
    }
}
