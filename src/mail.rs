use std::env;

use crate::schema::mail::MailMessage;
use anyhow::anyhow;
use isahc::{AsyncReadResponseExt, Request, RequestExt};

/// Hand a plain-text message to the HTTP mail API. Fire-and-forget:
/// the caller logs a failure and moves on, delivery is the service's
/// problem.
pub async fn send(subject: &str, body: &str, to: &[String]) -> Result<(), anyhow::Error> {
    let api_key = env::var("MAIL_API_KEY")?;
    let url = env::var("MAIL_API_URL")?;
    let from = env::var("MAIL_FROM")?;
    let mut response = Request::post(url)
        .header("Authorization", format!("Bearer {}", api_key))
        .header("Content-Type", "application/json")
        .body(serde_json::to_vec(&MailMessage {
            from,
            to: to.to_vec(),
            subject: subject.to_string(),
            text: body.to_string(),
        })?)?
        .send_async()
        .await?;

    if response.status().is_success() {
        Ok(())
    } else {
        Err(anyhow!("Mail API returned {}: {}", response.status(), response.text().await?))
    }
}
