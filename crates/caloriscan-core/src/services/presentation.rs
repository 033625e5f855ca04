//! Dish presentation
//!
//! Pure, synchronous transformation of a dish payload (structured JSON or a
//! string that may or may not be JSON) into view state: ingredient totals,
//! quantity adjustment and the Low/Medium/High calorie meter.
//!
//! Nothing here returns an error for bad input. Unparseable text is wrapped
//! as `{ "rawData": <text> }` and a payload without an `ingredients` list is
//! the [`PresentationState::NoDishData`] terminal state.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::models::dish::{Dish, FOOD_NOT_FOUND_SENTINEL};

/// Upper bound of the Low band (inclusive)
pub const LOW_MAX_CALORIES: i64 = 300;

/// Upper bound of the Medium band (inclusive)
pub const MEDIUM_MAX_CALORIES: i64 = 700;

// ============================================================================
// Calorie parsing
// ============================================================================

/// Extract the first run of ASCII digits from a free-text calorie field.
///
/// `None`, empty text, or text without digits yields 0. Runs too long to fit
/// an `i64` saturate.
pub fn parse_calories(text: Option<&str>) -> i64 {
    let Some(text) = text else {
        return 0;
    };

    let digits: String = text
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();

    if digits.is_empty() {
        return 0;
    }

    digits.parse::<i64>().unwrap_or(i64::MAX)
}

/// Calorie field as it appears in JSON: free text, a bare number, or absent.
pub fn parse_calories_value(value: &Value) -> i64 {
    match value {
        Value::String(s) => parse_calories(Some(s)),
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .map(|c| c.max(0))
            .unwrap_or(0),
        _ => 0,
    }
}

// ============================================================================
// Payload normalization
// ============================================================================

/// Normalize a payload into structured JSON without ever failing.
///
/// Objects pass through. Strings are parsed (tolerating a surrounding
/// markdown code fence); if parsing fails the original text is wrapped as
/// `{ "rawData": text }`. Anything else is wrapped the same way.
pub fn normalize_payload(payload: Value) -> Value {
    match payload {
        Value::Object(_) => payload,
        Value::String(text) => normalize_text(&text),
        other => json!({ "rawData": other }),
    }
}

/// [`normalize_payload`] for a payload that arrives as text.
pub fn normalize_text(text: &str) -> Value {
    match serde_json::from_str::<Value>(strip_code_fence(text)) {
        Ok(value) => value,
        Err(e) => {
            log::debug!("[presentation] Payload is not JSON: {}", e);
            json!({ "rawData": text })
        }
    }
}

/// Generators sometimes wrap JSON in ```json fences despite instructions.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

// ============================================================================
// QR payloads
// ============================================================================

/// Encode a dish into the JSON text authored into QR codes.
pub fn encode_qr_payload(dish: &Dish) -> serde_json::Result<String> {
    serde_json::to_string(dish)
}

/// Decode scanned QR text. Only JSON well-formedness is checked here; the
/// shape is checked by [`present`].
pub fn decode_qr_payload(text: &str) -> serde_json::Result<Value> {
    serde_json::from_str(text.trim())
}

/// Decode scanned QR text straight into a [`Dish`].
pub fn decode_qr_dish(text: &str) -> serde_json::Result<Dish> {
    serde_json::from_str(text.trim())
}

// ============================================================================
// Calorie meter
// ============================================================================

/// Three-tier classification of a dish's total calories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CalorieMeter {
    Low,
    Medium,
    High,
}

impl CalorieMeter {
    /// `<= 300` Low, `301..=700` Medium, `> 700` High
    pub fn from_total(total_calories: i64) -> Self {
        if total_calories > MEDIUM_MAX_CALORIES {
            CalorieMeter::High
        } else if total_calories > LOW_MAX_CALORIES {
            CalorieMeter::Medium
        } else {
            CalorieMeter::Low
        }
    }

    /// Display color as a hex string
    pub fn color(&self) -> &'static str {
        match self {
            CalorieMeter::High => "#e63946",
            CalorieMeter::Medium => "#fca311",
            CalorieMeter::Low => "#2ecc71",
        }
    }
}

impl std::fmt::Display for CalorieMeter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CalorieMeter::Low => write!(f, "Low"),
            CalorieMeter::Medium => write!(f, "Medium"),
            CalorieMeter::High => write!(f, "High"),
        }
    }
}

// ============================================================================
// View state
// ============================================================================

/// What the dish surface should show for a payload
#[derive(Debug, Clone, PartialEq)]
pub enum PresentationState {
    /// A dish with ingredients, ready to display and adjust
    Ready(DishView),
    /// The generator answered with its "not a food dish" sentinel
    FoodNotFound,
    /// No ingredients list; show the empty state with a way back to capture
    NoDishData { raw: Value },
}

impl PresentationState {
    pub fn dish(&self) -> Option<&DishView> {
        match self {
            PresentationState::Ready(view) => Some(view),
            _ => None,
        }
    }
}

/// Build view state from a payload (object or string).
pub fn present(payload: Value) -> PresentationState {
    let normalized = normalize_payload(payload);

    let has_ingredients = normalized
        .get("ingredients")
        .map(Value::is_array)
        .unwrap_or(false);

    if !has_ingredients {
        let is_sentinel = normalized
            .get("response")
            .and_then(Value::as_str)
            .map(|r| r.trim().eq_ignore_ascii_case(FOOD_NOT_FOUND_SENTINEL))
            .unwrap_or(false);
        if is_sentinel {
            return PresentationState::FoodNotFound;
        }
        return PresentationState::NoDishData { raw: normalized };
    }

    match serde_json::from_value::<Dish>(normalized.clone()) {
        Ok(dish) => PresentationState::Ready(DishView::new(dish)),
        Err(e) => {
            log::warn!("[presentation] Ingredients present but dish malformed: {}", e);
            PresentationState::NoDishData { raw: normalized }
        }
    }
}

/// [`present`] for a payload that arrives as text.
pub fn present_text(text: &str) -> PresentationState {
    present(Value::String(text.to_string()))
}

/// A dish with client-side adjustable ingredient quantities
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DishView {
    dish: Dish,
}

impl DishView {
    pub fn new(dish: Dish) -> Self {
        Self { dish }
    }

    pub fn dish(&self) -> &Dish {
        &self.dish
    }

    pub fn into_dish(self) -> Dish {
        self.dish
    }

    /// Sum of `calories * quantity` over all ingredients
    pub fn total_calories(&self) -> i64 {
        self.dish
            .ingredients
            .iter()
            .map(|i| i.calories.saturating_mul(i64::from(i.quantity)))
            .fold(0i64, i64::saturating_add)
    }

    pub fn calorie_meter(&self) -> CalorieMeter {
        CalorieMeter::from_total(self.total_calories())
    }

    /// Position of the first ingredient called `name`
    pub fn ingredient_index(&self, name: &str) -> Option<usize> {
        self.dish.ingredients.iter().position(|i| i.name == name)
    }

    /// Adjust the quantity of the ingredient at `index` by `delta`,
    /// flooring at zero. Returns `false` if there is no such ingredient.
    pub fn update_quantity(&mut self, index: usize, delta: i64) -> bool {
        let Some(ingredient) = self.dish.ingredients.get_mut(index) else {
            return false;
        };
        let next = (i64::from(ingredient.quantity) + delta).clamp(0, i64::from(u32::MAX));
        ingredient.quantity = next as u32;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::dish::Ingredient;

    fn sample_dish() -> Dish {
        Dish {
            object: "Pizza".to_string(),
            img_url: None,
            ingredients: vec![
                Ingredient::new("Cheese", 100),
                Ingredient::new("Dough", 150).with_img_url("http://x/dough.png"),
            ],
            calorie_meter_hint: Some("Medium".to_string()),
            not_recommended_for_diseases: vec!["Diabetes".to_string()],
            common_uses: "Dinner".to_string(),
            nutritional_value: "Carbs".to_string(),
        }
    }

    #[test]
    fn test_parse_calories() {
        assert_eq!(parse_calories(Some("250 kcal")), 250);
        assert_eq!(parse_calories(None), 0);
        assert_eq!(parse_calories(Some("no digits")), 0);
        assert_eq!(parse_calories(Some("")), 0);
        assert_eq!(parse_calories(Some("about 90-120 per 100g")), 90);
    }

    #[test]
    fn test_parse_calories_value() {
        assert_eq!(parse_calories_value(&json!("52 cal")), 52);
        assert_eq!(parse_calories_value(&json!(80)), 80);
        assert_eq!(parse_calories_value(&json!(-5)), 0);
        assert_eq!(parse_calories_value(&Value::Null), 0);
        assert_eq!(parse_calories_value(&json!(["1"])), 0);
    }

    #[test]
    fn test_calorie_meter_thresholds() {
        assert_eq!(CalorieMeter::from_total(0), CalorieMeter::Low);
        assert_eq!(CalorieMeter::from_total(300), CalorieMeter::Low);
        assert_eq!(CalorieMeter::from_total(301), CalorieMeter::Medium);
        assert_eq!(CalorieMeter::from_total(700), CalorieMeter::Medium);
        assert_eq!(CalorieMeter::from_total(701), CalorieMeter::High);
    }

    #[test]
    fn test_normalize_payload_passes_objects_through() {
        let payload = json!({"object": "Soup"});
        assert_eq!(normalize_payload(payload.clone()), payload);
    }

    #[test]
    fn test_normalize_payload_wraps_unparseable_text() {
        let normalized = normalize_text("definitely not json");
        assert_eq!(normalized, json!({"rawData": "definitely not json"}));
    }

    #[test]
    fn test_normalize_payload_strips_code_fence() {
        let normalized = normalize_text("```json\n{\"object\": \"Tea\"}\n```");
        assert_eq!(normalized["object"], "Tea");
    }

    #[test]
    fn test_present_without_ingredients_is_empty_state() {
        let state = present(json!({"object": "Mystery"}));
        assert!(matches!(state, PresentationState::NoDishData { .. }));

        let state = present_text("garbage");
        match state {
            PresentationState::NoDishData { raw } => assert_eq!(raw["rawData"], "garbage"),
            other => panic!("unexpected state: {:?}", other),
        }
    }

    #[test]
    fn test_present_sentinel() {
        let state = present_text(r#"{"response": "Food Item Not Found"}"#);
        assert_eq!(state, PresentationState::FoodNotFound);
    }

    #[test]
    fn test_total_calories_and_meter() {
        let mut view = DishView::new(sample_dish());
        assert_eq!(view.total_calories(), 250);
        assert_eq!(view.calorie_meter(), CalorieMeter::Low);

        assert!(view.update_quantity(1, 2));
        assert_eq!(view.total_calories(), 100 + 150 * 3);
        assert_eq!(view.calorie_meter(), CalorieMeter::Medium);
    }

    #[test]
    fn test_update_quantity_never_negative() {
        let mut view = DishView::new(sample_dish());
        for _ in 0..10 {
            view.update_quantity(0, -1);
        }
        assert_eq!(view.dish().ingredients[0].quantity, 0);
        assert_eq!(view.total_calories(), 150);

        view.update_quantity(0, -1_000);
        assert_eq!(view.dish().ingredients[0].quantity, 0);
        assert!(!view.update_quantity(7, 1));
    }

    #[test]
    fn test_update_quantity_targets_one_row() {
        let mut dish = sample_dish();
        dish.ingredients.push(Ingredient::new("Cheese", 100));
        let mut view = DishView::new(dish);

        assert_eq!(view.ingredient_index("Cheese"), Some(0));
        assert_eq!(view.ingredient_index("Anchovies"), None);

        assert!(view.update_quantity(2, 1));
        let quantities: Vec<u32> = view.dish().ingredients.iter().map(|i| i.quantity).collect();
        assert_eq!(quantities, vec![1, 1, 2]);
    }

    #[test]
    fn test_qr_round_trip_preserves_ingredients() {
        let mut dish = sample_dish();
        dish.ingredients[0].quantity = 3;

        let encoded = encode_qr_payload(&dish).unwrap();
        let decoded = decode_qr_dish(&encoded).unwrap();

        assert_eq!(decoded.ingredients.len(), dish.ingredients.len());
        for (a, b) in decoded.ingredients.iter().zip(dish.ingredients.iter()) {
            assert_eq!(a.name, b.name);
            assert_eq!(a.calories, b.calories);
            assert_eq!(a.quantity, b.quantity);
        }

        let state = present(decode_qr_payload(&encoded).unwrap());
        assert_eq!(state.dish().unwrap().dish(), &dish);
    }
}
