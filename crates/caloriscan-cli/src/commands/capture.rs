//! Capture a frame from a directory-backed camera and run detection

use std::sync::Arc;

use anyhow::{anyhow, Result};
use serde::Serialize;
use serde_json::json;
use tabled::Tabled;

use caloriscan_core::capture::session::STATUS_PROCESSED;
use caloriscan_core::capture::{CaptureController, CaptureError};

use super::{expand_path, Context};
use crate::backends::{DirectoryCamera, Unplugged};
use crate::output::dish::{presentation_json, print_presentation};
use crate::output::{print_info, print_json, print_output, print_success, OutputFormat};

#[derive(Debug, Serialize, Tabled)]
pub struct DeviceRow {
    #[tabled(rename = "#")]
    pub index: usize,
    #[tabled(rename = "ID")]
    pub id: String,
    #[tabled(rename = "Label")]
    pub label: String,
    #[tabled(rename = "Selected")]
    pub selected: bool,
}

pub struct CaptureArgs<'a> {
    pub dir: &'a str,
    pub device: Option<&'a str>,
    pub list_devices: bool,
}

/// Prefer the overlay message the session set for the failure
async fn session_error(controller: &CaptureController, err: CaptureError) -> anyhow::Error {
    log::debug!("[capture] {}", err);
    match controller.session().await.error() {
        Some(message) => anyhow!("{}", message),
        None => anyhow!("{}", err),
    }
}

pub async fn execute(ctx: &Context, args: CaptureArgs<'_>) -> Result<()> {
    let camera = DirectoryCamera::new(expand_path(args.dir));
    let controller = ctx.controller(Arc::new(camera), Arc::new(Unplugged));

    if let Err(e) = controller.open_camera().await {
        return Err(session_error(&controller, e).await);
    }

    if let Some(device) = args.device {
        if let Err(e) = controller.switch_device(device).await {
            let err = session_error(&controller, e).await;
            controller.shutdown().await;
            return Err(err);
        }
    }

    if args.list_devices {
        let rows: Vec<DeviceRow> = {
            let session = controller.session().await;
            let selected = session.selected_device_id().map(str::to_string);
            session
                .devices()
                .iter()
                .enumerate()
                .map(|(i, d)| DeviceRow {
                    index: i + 1,
                    id: d.id.clone(),
                    label: d.display_label(i),
                    selected: selected.as_deref() == Some(d.id.as_str()),
                })
                .collect()
        };
        controller.shutdown().await;
        return print_output(&rows, ctx.format, "No cameras found.");
    }

    if ctx.chatty() {
        let selected = controller.session().await.selected_device_id().map(str::to_string);
        print_info(
            &format!("Capturing from {}...", selected.as_deref().unwrap_or("default camera")),
            ctx.quiet,
        );
    }

    let processed = match controller.capture().await {
        Ok(processed) => processed,
        Err(e) => return Err(session_error(&controller, e).await),
    };
    controller.shutdown().await;

    match ctx.format {
        OutputFormat::Json => print_json(&json!({
            "detectedObjects": processed.result.detected_objects,
            "remainingTokens": processed.result.remaining_quota,
            "dish": presentation_json(&processed.presentation)?,
        })),
        OutputFormat::Table => {
            print_success(STATUS_PROCESSED, ctx.quiet);
            print_info(
                &format!("Detected: {}", processed.result.detected_objects.join(", ")),
                ctx.quiet,
            );
            print_presentation(&processed.presentation, ctx.format)
        }
    }
}
