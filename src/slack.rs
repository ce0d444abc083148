use crate::error::AppError;
use crate::message::ChatMessage;
use reqwest::Client;

/// Posts the message to the incoming webhook. Any status below 400 counts as
/// delivered; anything else is a `DeliveryFailed` error.
pub async fn post_message(
    client: &Client,
    webhook_url: &str,
    message: &ChatMessage,
) -> Result<u16, AppError> {
    let response = client.post(webhook_url).json(message).send().await?;
    let status = response.status().as_u16();

    // Drain the body before judging the status so the check cannot run ahead
    // of the response.
    let body = response.text().await?;
    tracing::debug!(status, body = %body, "webhook response");

    if status < 400 {
        Ok(status)
    } else {
        Err(AppError::DeliveryFailed { status })
    }
}
