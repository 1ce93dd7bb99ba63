//! Natural-language rendering of FHIR `Dosage` instructions.

use serde_json::Value as Json;

/// Returned when a medication carries no dosage instruction at all.
pub const NO_DOSAGE_INSTRUCTIONS: &str = "No dosage instructions available.";

/// Returned when the first dosage instruction yields neither an additional instruction nor a
/// quantity and frequency.
pub const NO_SPECIFIC_DOSAGE_INSTRUCTIONS: &str = "No specific dosage instructions available.";

const TAKE_AS_NEEDED: &str = "Take as needed";

/// Render the first of `instructions` as a sentence, e.g. `"With food. Quantity of 2, twice per day."`.
///
/// Instructions marked `asNeededBoolean` are rendered from their free text only.
pub fn format_dosage_instructions(instructions: &[Json]) -> String {
    let Some(instruction) = instructions.first() else {
        return NO_DOSAGE_INSTRUCTIONS.to_owned();
    };

    if instruction.get("asNeededBoolean").and_then(Json::as_bool) == Some(true) {
        return as_needed(instruction);
    }

    let parts: Vec<String> = [
        additional_instruction(instruction),
        quantity_and_frequency(instruction),
    ]
    .into_iter()
    .flatten()
    .collect();

    if parts.is_empty() {
        return NO_SPECIFIC_DOSAGE_INSTRUCTIONS.to_owned();
    }

    format!("{}.", parts.join(". "))
}

fn as_needed(instruction: &Json) -> String {
    match instruction.get("text").and_then(Json::as_str) {
        Some(text) if text.ends_with('.') => text.to_owned(),
        Some(text) if !text.is_empty() => format!("{text}."),
        _ => format!("{TAKE_AS_NEEDED}."),
    }
}

/// Free text, or the display of the first coding, of the first additional instruction.
fn additional_instruction(instruction: &Json) -> Option<String> {
    let additional = instruction.pointer("/additionalInstruction/0")?;
    let text = non_empty_str(additional.get("text"))
        .or_else(|| non_empty_str(additional.pointer("/coding/0/display")))?;

    let text = text.trim_end_matches('.');
    (!text.is_empty()).then(|| text.to_owned())
}

/// `"Quantity of <dose>, <frequency>"`, requiring both a dose quantity and a timing repeat.
fn quantity_and_frequency(instruction: &Json) -> Option<String> {
    let dose = match instruction.pointer("/doseAndRate/0/doseQuantity/value")? {
        Json::Number(n) => format_number(n.as_f64()?),
        Json::String(s) => s.clone(),
        _ => return None,
    };
    let repeat = instruction
        .pointer("/timing/repeat")
        .filter(|repeat| repeat.is_object())?;

    let frequency = positive_number(repeat.get("frequency")).unwrap_or(1.0);
    let period = positive_number(repeat.get("period")).unwrap_or(1.0);
    let period_unit = non_empty_str(repeat.get("periodUnit")).unwrap_or("d");

    let daily = period == 1.0 && period_unit == "d";
    let timing = match frequency {
        f if f == 1.0 && daily => "once per day".to_owned(),
        f if f == 2.0 && daily => "twice per day".to_owned(),
        f if f == 3.0 && daily => "three times per day".to_owned(),
        f => {
            let times = if f == 1.0 {
                "once".to_owned()
            } else if f == 2.0 {
                "twice".to_owned()
            } else {
                format!("{} times", format_number(f))
            };
            format!("{times} per {} {period_unit}", format_number(period))
        }
    };

    Some(format!("Quantity of {dose}, {timing}"))
}

fn non_empty_str(value: Option<&Json>) -> Option<&str> {
    value.and_then(Json::as_str).filter(|s| !s.is_empty())
}

/// Numbers that are absent, zero or not numbers at all fall back to the caller's default.
fn positive_number(value: Option<&Json>) -> Option<f64> {
    value
        .and_then(Json::as_f64)
        .filter(|n| *n != 0.0 && n.is_finite())
}

/// Integral values print without a fractional part, as JSON writers usually emit them.
pub(crate) fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}
