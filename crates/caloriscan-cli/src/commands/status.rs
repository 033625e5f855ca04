//! Token status command

use anyhow::{Context as _, Result};
use serde::Serialize;
use tabled::Tabled;

use caloriscan_core::TokenStatusResponse;

use super::Context;
use crate::output::{print_single, print_success, print_warning};

pub const TOKENS_AVAILABLE: &str = "Detector tokens available!";
pub const TOKENS_EXHAUSTED: &str = "Limit reached. Please wait until reset.";

#[derive(Debug, Serialize, Tabled)]
#[serde(rename_all = "camelCase")]
pub struct TokenRow {
    #[tabled(rename = "Remaining")]
    pub remaining_tokens: i64,
    #[tabled(rename = "Limit")]
    pub limit: String,
    #[tabled(rename = "Resets At")]
    pub resets_at: String,
}

impl From<&TokenStatusResponse> for TokenRow {
    fn from(status: &TokenStatusResponse) -> Self {
        Self {
            remaining_tokens: status.remaining_tokens,
            limit: status
                .limit
                .map(|l| l.to_string())
                .unwrap_or_else(|| "-".to_string()),
            resets_at: status
                .resets_at
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| "-".to_string()),
        }
    }
}

pub async fn execute(ctx: &Context) -> Result<()> {
    let status = ctx
        .client
        .token_status()
        .await
        .with_context(|| format!("Could not fetch token status from {}", ctx.client.base_url()))?;

    print_single(&TokenRow::from(&status), ctx.format)?;

    if ctx.chatty() {
        if status.remaining_tokens > 0 {
            print_success(TOKENS_AVAILABLE, ctx.quiet);
        } else {
            print_warning(TOKENS_EXHAUSTED, ctx.quiet);
        }
    }
    Ok(())
}
