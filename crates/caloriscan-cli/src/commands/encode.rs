//! Produce QR payload text from a dish JSON file

use anyhow::{Context as _, Result};
use serde_json::json;

use caloriscan_core::services::presentation::{decode_qr_dish, encode_qr_payload};

use super::Context;
use crate::backends::read_source;
use crate::output::{print_json, OutputFormat};

pub async fn execute(ctx: &Context, source: &str) -> Result<()> {
    let text = read_source(source)?;
    let dish = decode_qr_dish(&text)
        .context("Not a dish record (needs at least an ingredients list)")?;
    let payload = encode_qr_payload(&dish)?;
    log::debug!(
        "[encode] {} ingredient(s), {} bytes",
        dish.ingredients.len(),
        payload.len()
    );

    match ctx.format {
        OutputFormat::Table => println!("{}", payload),
        OutputFormat::Json => print_json(&json!({ "payload": payload }))?,
    }
    Ok(())
}
