//! Dish record
//!
//! The same JSON shape is authored into QR codes and requested from the
//! nutrition generator. Upstream text is untrusted, so deserialization is
//! lenient: `null` or missing optional fields fall back to defaults and the
//! free-text calorie field is reduced to its first run of digits.

use serde::{Deserialize, Deserializer, Serialize};

use crate::services::presentation::parse_calories_value;

/// Value of `response` in the record the generator emits when none of the
/// detected objects is a food dish.
pub const FOOD_NOT_FOUND_SENTINEL: &str = "Food Item Not Found";

/// A food dish and its nutrition metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dish {
    #[serde(default, deserialize_with = "null_as_default")]
    pub object: String,
    #[serde(rename = "imgURL", default, skip_serializing_if = "Option::is_none")]
    pub img_url: Option<String>,
    pub ingredients: Vec<Ingredient>,
    /// Meter suggested by the payload author; the displayed meter is always
    /// recomputed from the ingredient totals.
    #[serde(rename = "calorieMeter", default, skip_serializing_if = "Option::is_none")]
    pub calorie_meter_hint: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub not_recommended_for_diseases: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub common_uses: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub nutritional_value: String,
}

/// One ingredient of a dish
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ingredient {
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "deserialize_calories")]
    pub calories: i64,
    #[serde(default = "default_quantity", deserialize_with = "deserialize_quantity")]
    pub quantity: u32,
    #[serde(rename = "imgURL", default, skip_serializing_if = "Option::is_none")]
    pub img_url: Option<String>,
}

impl Ingredient {
    pub fn new(name: impl Into<String>, calories: i64) -> Self {
        Self {
            name: name.into(),
            calories,
            quantity: default_quantity(),
            img_url: None,
        }
    }

    pub fn with_quantity(mut self, quantity: u32) -> Self {
        self.quantity = quantity;
        self
    }

    pub fn with_img_url(mut self, url: impl Into<String>) -> Self {
        self.img_url = Some(url.into());
        self
    }
}

fn default_quantity() -> u32 {
    1
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn deserialize_calories<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(parse_calories_value(&value))
}

fn deserialize_quantity<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Number(n) => match n.as_u64() {
            Some(q) => q.min(u64::from(u32::MAX)) as u32,
            // 2.0, 1.5, -3: round, floor at zero
            None => n
                .as_f64()
                .filter(|q| q.is_finite())
                .map(|q| q.round().clamp(0.0, f64::from(u32::MAX)) as u32)
                .unwrap_or(0),
        },
        serde_json::Value::String(s) => s.trim().parse().unwrap_or_else(|_| default_quantity()),
        _ => default_quantity(),
    })
}
