use std::time::Duration;

use log::{info, warn};
use serde_json::json;

use crate::library::{constant::WEBHOOK_TIMEOUT_SECS, system};

/// Posts a failure message to a Discord-style webhook. Delivery problems are only logged.
pub fn send_failure(webhook_url: Option<&str>, message: &str) {
    let Some(url) = webhook_url else {
        info!("No webhook URL configured, skipping notification");
        return;
    };

    let body = failure_payload(&system::hostname(), message).to_string();

    let config = ureq::Agent::config_builder()
        .timeout_global(Some(Duration::from_secs(WEBHOOK_TIMEOUT_SECS)))
        .build();
    let agent = ureq::Agent::new_with_config(config);

    match agent
        .post(url)
        .header("Content-Type", "application/json")
        .send(body.as_bytes())
    {
        Ok(_) => info!("Sent failure notification"),
        Err(err) => warn!("Failed to send failure notification: {}", err),
    }
}

fn failure_payload(hostname: &str, message: &str) -> serde_json::Value {
    json!({
        "username": hostname,
        "content": format!("Backup Error:\n{}", message),
    })
}
