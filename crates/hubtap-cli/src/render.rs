//! Console rendering for decoded payloads.
//!
//! Two output shapes:
//!
//! - [`render_value`] prints a single value, the way `invoke` results appear.
//!   Scalars print bare (a string result prints without quotes), composites
//!   print as compact single-line JSON.
//! - [`render_invocation`] prints a received invocation as one JSON line with
//!   the method name and the arguments keyed by their subscription labels,
//!   so piped output stays machine-readable.

use hubtap_core::DynamicValue;

/// Renders a single value for the console.
pub fn render_value(value: &DynamicValue) -> String {
    match value {
        DynamicValue::Null => "null".to_owned(),
        DynamicValue::Bool(flag) => flag.to_string(),
        DynamicValue::Integer(number) => number.to_string(),
        DynamicValue::Float(number) => serde_json::Number::from_f64(*number)
            .map(|n| n.to_string())
            .unwrap_or_else(|| number.to_string()),
        DynamicValue::Decimal(literal) => literal.to_string(),
        DynamicValue::String(text) => text.clone(),
        DynamicValue::Timestamp(stamp) => stamp.to_rfc3339(),
        DynamicValue::Seq(_) | DynamicValue::Map(_) => render_json(value),
    }
}

/// Renders an inbound invocation as one JSON line:
/// `{"message":"<method>","data":{"<label>":<value>,…}}`.
///
/// Arguments beyond the label list are keyed `argN` by position, so a label
/// mismatch never drops data.
pub fn render_invocation(method: &str, labels: &[String], arguments: &[DynamicValue]) -> String {
    let mut data = Vec::with_capacity(arguments.len());
    for (index, value) in arguments.iter().enumerate() {
        let label = labels
            .get(index)
            .cloned()
            .unwrap_or_else(|| format!("arg{index}"));
        data.push((label, value.clone()));
    }
    let envelope = DynamicValue::Map(vec![
        ("message".to_owned(), DynamicValue::String(method.to_owned())),
        ("data".to_owned(), DynamicValue::Map(data)),
    ]);
    render_json(&envelope)
}

fn render_json(value: &DynamicValue) -> String {
    value
        .encode()
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .unwrap_or_else(|| "<unprintable>".to_owned())
}
