use crate::models::BillingRecord;
use serde::Serialize;

// Fixed display text carried over from the original report format.
const PRETEXT: &str = "今月のAWSの利用費は…";
const CURRENCY_SUFFIX: &str = "円";
const ATTACHMENT_COLOR: &str = "good";

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub channel: String,
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Attachment {
    pub fallback: String,
    pub pretext: String,
    pub color: String,
    pub fields: Vec<Field>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Field {
    pub title: String,
    pub value: String,
    pub short: bool,
}

impl ChatMessage {
    pub fn field_count(&self) -> usize {
        self.attachments.iter().map(|a| a.fields.len()).sum()
    }
}

/// Raw amount × conversion rate, rounded to two decimals with ties away from
/// zero, rendered with exactly two decimal digits.
pub fn format_amount(raw: f64, rate: f64) -> String {
    let rounded = (raw * rate * 100.0).round() / 100.0;
    format!("{rounded:.2}")
}

/// Builds the webhook payload: one field per record entry, in record order,
/// plus a fallback line repeating the aggregate amount.
pub fn build_message(record: &BillingRecord, channel: &str, rate: f64) -> ChatMessage {
    let fields = record
        .entries()
        .iter()
        .map(|entry| Field {
            title: entry.label.clone(),
            value: format!("{} {CURRENCY_SUFFIX}", format_amount(entry.amount, rate)),
            short: true,
        })
        .collect();

    let total = format_amount(record.total(), rate);
    ChatMessage {
        channel: channel.to_string(),
        attachments: vec![Attachment {
            fallback: format!("今月のAWSの利用費は、{total} {CURRENCY_SUFFIX}です。"),
            pretext: PRETEXT.to_string(),
            color: ATTACHMENT_COLOR.to_string(),
            fields,
        }],
    }
}
