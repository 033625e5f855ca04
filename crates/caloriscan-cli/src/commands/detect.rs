//! One-shot detection of an image file

use anyhow::{anyhow, Context as _, Result};
use serde_json::json;

use caloriscan_core::services::presentation::present_text;
use caloriscan_core::utils::encode_base64_image;

use super::{expand_path, Context};
use crate::output::dish::{presentation_json, print_presentation};
use crate::output::{print_info, print_json, OutputFormat};

pub async fn execute(ctx: &Context, image: &str, raw: bool) -> Result<()> {
    let path = expand_path(image);
    let bytes = tokio::fs::read(&path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;

    if ctx.chatty() {
        print_info(&format!("Sending {} ({} bytes)...", path.display(), bytes.len()), ctx.quiet);
    }

    let result = ctx
        .client
        .detect_base64(encode_base64_image(&bytes))
        .await
        .map_err(|e| {
            log::debug!("[detect] {:?}", e);
            match e.details() {
                Some(details) => anyhow!("{} ({})", e.user_message(), details),
                None => anyhow!("{}", e.user_message()),
            }
        })?;

    if raw {
        println!("{}", result.raw_nutrition_text);
        return Ok(());
    }

    let presentation = present_text(&result.raw_nutrition_text);
    match ctx.format {
        OutputFormat::Json => print_json(&json!({
            "detectedObjects": result.detected_objects,
            "remainingTokens": result.remaining_quota,
            "dish": presentation_json(&presentation)?,
        })),
        OutputFormat::Table => {
            print_info(&format!("Detected: {}", result.detected_objects.join(", ")), ctx.quiet);
            print_presentation(&presentation, ctx.format)?;
            print_info(&format!("{} detection calls left", result.remaining_quota), ctx.quiet);
            Ok(())
        }
    }
}
