//! Nutrition generation prompt

/// Upper bound on generated output, in tokens
pub const NUTRITION_MAX_TOKENS: u32 = 500;

/// System message sent ahead of the nutrition prompt
pub const SYSTEM_PROMPT: &str = "You are an expert in food and nutrition.";

/// Build the user prompt for a set of detected labels.
///
/// The model must answer with exactly one of two JSON shapes: a populated
/// dish record, or the `{"response": "Food Item Not Found"}` sentinel.
pub fn build_nutrition_prompt(labels: &[String]) -> String {
    format!(
        r#"The following objects were detected in an image: {labels}.

Identify if any of these objects represent a food dish. If there are multiple food-related objects, return details only for the most specific or parent-level food dish. Ignore subcategories or generic classifications.

For the identified parent food dish, provide the details in JSON format as follows:
{{
  "object": "<name of the food dish>",
  "ingredients": [
    {{
      "name": "<ingredient name>",
      "calories": "<calories per 100g or serving>"
    }}
  ],
  "calorieMeter": "<Low | Medium | High>",
  "notRecommendedForDiseases": [
    "Disease 1",
    "Disease 2",
    "Disease 3",
    "Disease 4",
    "Disease 5"
  ],
  "commonUses": "<Common uses or purposes>",
  "nutritionalValue": "<Brief description of the nutritional value>"
}}

If no food dishes are detected, return the following response:
{{
  "response": "{sentinel}"
}}

Ensure the output is valid JSON and fits within {max_tokens} tokens."#,
        labels = labels.join(", "),
        sentinel = crate::models::FOOD_NOT_FOUND_SENTINEL,
        max_tokens = NUTRITION_MAX_TOKENS,
    )
}
