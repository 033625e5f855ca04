//! Scan QR payloads from a text source

use std::sync::Arc;

use anyhow::{bail, Result};

use caloriscan_core::capture::session::{MSG_INVALID_QR, STATUS_QR_DECODED};
use caloriscan_core::capture::ScanStep;

use super::Context;
use crate::backends::{read_source, TextScanner, Unplugged};
use crate::output::dish::print_presentation;
use crate::output::{print_info, print_success};

pub async fn execute(ctx: &Context, source: &str) -> Result<()> {
    let text = read_source(source)?;
    let controller = ctx.controller(Arc::new(Unplugged), Arc::new(TextScanner::new(&text)));

    controller.start_scan().await?;

    let step = tokio::select! {
        step = controller.scan_until_done() => step?,
        _ = tokio::signal::ctrl_c() => {
            controller.stop_scan().await;
            ScanStep::Cancelled
        }
    };
    let overlay = controller.session().await.error().map(str::to_string);
    controller.shutdown().await;

    match step {
        ScanStep::Decoded(presentation) => {
            if ctx.chatty() {
                print_success(STATUS_QR_DECODED, ctx.quiet);
            }
            print_presentation(&presentation, ctx.format)
        }
        ScanStep::Invalid => bail!("{}", overlay.as_deref().unwrap_or(MSG_INVALID_QR)),
        ScanStep::Failed(reason) => bail!("{}", reason),
        ScanStep::Cancelled | ScanStep::Pending => {
            print_info("Scan cancelled.", ctx.quiet);
            Ok(())
        }
    }
}
