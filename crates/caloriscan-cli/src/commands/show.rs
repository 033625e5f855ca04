//! Render a dish payload (QR text or a saved nutrition response)

use anyhow::{bail, Context as _, Result};

use caloriscan_core::services::presentation::{present_text, PresentationState};

use super::Context;
use crate::backends::read_source;
use crate::output::dish::print_presentation;
use crate::output::print_warning;

/// Which ingredient an adjustment applies to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdjustTarget {
    /// First ingredient with this name
    Name(String),
    /// 1-based row, as shown in the table
    Row(usize),
}

/// `NAME=DELTA` or `#ROW=DELTA`, e.g. `Cheese=+1` or `#2=-1`
pub fn parse_adjustment(spec: &str) -> Result<(AdjustTarget, i64)> {
    let Some((target, delta)) = spec.rsplit_once('=') else {
        bail!("Invalid adjustment '{}'. Use NAME=DELTA, e.g. Cheese=+1", spec);
    };
    let target = target.trim();
    if target.is_empty() {
        bail!("Invalid adjustment '{}': missing ingredient name", spec);
    }
    let target = match target.strip_prefix('#') {
        Some(row) => match row.trim().parse::<usize>() {
            Ok(row) if row > 0 => AdjustTarget::Row(row),
            _ => bail!("Invalid adjustment '{}': rows are numbered from 1", spec),
        },
        None => AdjustTarget::Name(target.to_string()),
    };
    let delta = delta
        .trim()
        .trim_start_matches('+')
        .parse::<i64>()
        .with_context(|| format!("Invalid adjustment '{}': delta must be an integer", spec))?;
    Ok((target, delta))
}

/// Literal JSON, `@path` for a file, or `-` for stdin
fn load_payload(payload: &str) -> Result<String> {
    match payload.strip_prefix('@') {
        Some(path) => read_source(path),
        None if payload == "-" => read_source("-"),
        None => Ok(payload.to_string()),
    }
}

pub async fn execute(ctx: &Context, payload: &str, adjustments: &[String]) -> Result<()> {
    let text = load_payload(payload)?;
    let mut state = present_text(&text);

    if !adjustments.is_empty() {
        let PresentationState::Ready(view) = &mut state else {
            bail!("Quantities can only be adjusted on a dish with ingredients");
        };
        for spec in adjustments {
            let (target, delta) = parse_adjustment(spec)?;
            let index = match &target {
                AdjustTarget::Name(name) => view.ingredient_index(name),
                AdjustTarget::Row(row) => Some(row - 1),
            };
            if !index.is_some_and(|i| view.update_quantity(i, delta)) {
                print_warning(&format!("No ingredient matches '{}'", spec), ctx.quiet);
            }
        }
    }

    print_presentation(&state, ctx.format)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_adjustment() {
        assert_eq!(
            parse_adjustment("Cheese=+1").unwrap(),
            (AdjustTarget::Name("Cheese".to_string()), 1)
        );
        assert_eq!(
            parse_adjustment("Olive Oil=-2").unwrap(),
            (AdjustTarget::Name("Olive Oil".to_string()), -2)
        );
        assert_eq!(parse_adjustment("#2=+1").unwrap(), (AdjustTarget::Row(2), 1));
        assert!(parse_adjustment("#0=1").is_err());
        assert!(parse_adjustment("Cheese").is_err());
        assert!(parse_adjustment("=1").is_err());
        assert!(parse_adjustment("Cheese=lots").is_err());
    }

    #[test]
    fn test_literal_payload_passes_through() {
        assert_eq!(load_payload(r#"{"a":1}"#).unwrap(), r#"{"a":1}"#);
    }
}
