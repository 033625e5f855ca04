//! Dish rendering

use colored::Colorize;
use serde::Serialize;
use serde_json::{json, Value};
use tabled::Tabled;

use caloriscan_core::models::FOOD_NOT_FOUND_SENTINEL;
use caloriscan_core::services::presentation::{CalorieMeter, DishView, PresentationState};

use super::{print_json, render_table, OutputFormat};

pub const FOOD_NOT_FOUND_MESSAGE: &str = "Food item not found. Try a picture of a dish.";
pub const NO_DISH_DATA_MESSAGE: &str = "No dish data available.";

#[derive(Debug, Serialize, Tabled)]
#[serde(rename_all = "camelCase")]
pub struct IngredientRow {
    #[tabled(rename = "Ingredient")]
    pub name: String,
    #[tabled(rename = "Calories")]
    pub calories: i64,
    #[tabled(rename = "Qty")]
    pub quantity: u32,
    #[tabled(rename = "Subtotal")]
    pub subtotal: i64,
    #[tabled(rename = "Image", display_with = "display_url")]
    #[serde(rename = "imgURL", skip_serializing_if = "Option::is_none")]
    pub img_url: Option<String>,
}

fn display_url(url: &Option<String>) -> String {
    url.clone().unwrap_or_else(|| "-".to_string())
}

/// JSON shape of a rendered dish
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DishReport {
    pub object: String,
    #[serde(rename = "imgURL", skip_serializing_if = "Option::is_none")]
    pub img_url: Option<String>,
    pub ingredients: Vec<IngredientRow>,
    pub total_calories: i64,
    pub calorie_meter: CalorieMeter,
    pub calorie_meter_color: &'static str,
    pub not_recommended_for_diseases: Vec<String>,
    pub common_uses: String,
    pub nutritional_value: String,
}

impl From<&DishView> for DishReport {
    fn from(view: &DishView) -> Self {
        let dish = view.dish();
        let meter = view.calorie_meter();
        Self {
            object: dish.object.clone(),
            img_url: dish.img_url.clone(),
            ingredients: dish
                .ingredients
                .iter()
                .map(|i| IngredientRow {
                    name: i.name.clone(),
                    calories: i.calories,
                    quantity: i.quantity,
                    subtotal: i.calories.saturating_mul(i64::from(i.quantity)),
                    img_url: i.img_url.clone(),
                })
                .collect(),
            total_calories: view.total_calories(),
            calorie_meter: meter,
            calorie_meter_color: meter.color(),
            not_recommended_for_diseases: dish.not_recommended_for_diseases.clone(),
            common_uses: dish.common_uses.clone(),
            nutritional_value: dish.nutritional_value.clone(),
        }
    }
}

/// JSON value for any presentation state
pub fn presentation_json(state: &PresentationState) -> anyhow::Result<Value> {
    Ok(match state {
        PresentationState::Ready(view) => serde_json::to_value(DishReport::from(view))?,
        PresentationState::FoodNotFound => json!({ "response": FOOD_NOT_FOUND_SENTINEL }),
        PresentationState::NoDishData { raw } => json!({
            "error": NO_DISH_DATA_MESSAGE,
            "raw": raw,
        }),
    })
}

/// "#e63946" -> (230, 57, 70)
fn hex_rgb(hex: &str) -> Option<(u8, u8, u8)> {
    let hex = hex.strip_prefix('#')?;
    if hex.len() != 6 {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
    Some((channel(0)?, channel(2)?, channel(4)?))
}

fn meter_label(meter: CalorieMeter) -> String {
    let label = meter.to_string();
    match hex_rgb(meter.color()) {
        Some((r, g, b)) => label.truecolor(r, g, b).bold().to_string(),
        None => label,
    }
}

fn print_dish_table(view: &DishView) {
    let report = DishReport::from(view);

    println!("{}", report.object.bold());
    if let Some(url) = &report.img_url {
        println!("Image: {}", url);
    }
    println!("{}", render_table(&report.ingredients));
    println!(
        "Total: {} kcal  Calorie meter: {}",
        report.total_calories,
        meter_label(report.calorie_meter)
    );

    if !report.not_recommended_for_diseases.is_empty() {
        println!(
            "Not recommended for: {}",
            report.not_recommended_for_diseases.join(", ")
        );
    }
    if !report.common_uses.is_empty() {
        println!("Common uses: {}", report.common_uses);
    }
    if !report.nutritional_value.is_empty() {
        println!("Nutritional value: {}", report.nutritional_value);
    }
}

pub fn print_presentation(state: &PresentationState, format: OutputFormat) -> anyhow::Result<()> {
    if format == OutputFormat::Json {
        return print_json(&presentation_json(state)?);
    }

    match state {
        PresentationState::Ready(view) => print_dish_table(view),
        PresentationState::FoodNotFound => println!("{}", FOOD_NOT_FOUND_MESSAGE.yellow()),
        PresentationState::NoDishData { raw } => {
            println!("{}", NO_DISH_DATA_MESSAGE.yellow());
            log::debug!("[render] Payload without ingredients: {}", raw);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use caloriscan_core::services::presentation::present_text;

    #[test]
    fn test_hex_rgb() {
        assert_eq!(hex_rgb("#e63946"), Some((230, 57, 70)));
        assert_eq!(hex_rgb("#2ecc71"), Some((46, 204, 113)));
        assert_eq!(hex_rgb("e63946"), None);
        assert_eq!(hex_rgb("#zz0000"), None);
    }

    #[test]
    fn test_report_totals_and_meter() {
        let state = present_text(
            r#"{"object":"Pizza","ingredients":[
                {"name":"Cheese","calories":"400 kcal","quantity":2},
                {"name":"Dough","calories":"250","imgURL":"http://x/dough.png"}
            ]}"#,
        );
        let view = state.dish().unwrap();
        let report = DishReport::from(view);
        assert_eq!(report.total_calories, 1050);
        assert_eq!(report.calorie_meter, CalorieMeter::High);
        assert_eq!(report.calorie_meter_color, "#e63946");
        assert_eq!(report.ingredients[0].subtotal, 800);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["ingredients"][1]["imgURL"], "http://x/dough.png");
        assert!(json["ingredients"][0].get("imgURL").is_none());
    }

    #[test]
    fn test_sentinel_json() {
        let json = presentation_json(&PresentationState::FoodNotFound).unwrap();
        assert_eq!(json, json!({ "response": "Food Item Not Found" }));
    }
}
