use reqwest::Client;
use tracing::{info, warn};

const DEFAULT_ENDPOINT: &str = "https://hook.eu2.make.com/garment-studio-results";

/// Posts every successful generation or refinement result to an external
/// endpoint. Dispatch is detached from the request path: failures are logged
/// and never surfaced or retried.
pub struct WebhookNotifier {
    client: Client,
    endpoint: String,
}

impl WebhookNotifier {
    pub fn new(endpoint: String) -> Self {
        Self { client: Client::new(), endpoint }
    }

    pub fn from_env() -> Self {
        Self::new(std::env::var("WEBHOOK_URL").unwrap_or_else(|_| DEFAULT_ENDPOINT.to_string()))
    }

    /// Fire-and-forget: spawns the POST and returns immediately.
    pub fn notify(&self, image_url: String) {
        let client = self.client.clone();
        let endpoint = self.endpoint.clone();
        tokio::spawn(async move {
            let result = client
                .post(&endpoint)
                .json(&serde_json::json!({ "imageUrl": image_url }))
                .send()
                .await;
            match result {
                Ok(response) if response.status().is_success() => {
                    info!("📨 Webhook notified: {}", endpoint);
                }
                Ok(response) => {
                    warn!("⚠️ Webhook returned non-success status {}: {}", response.status(), endpoint);
                }
                Err(e) => {
                    warn!("⚠️ Webhook delivery failed for {}: {}", endpoint, e);
                }
            }
        });
    }
}
