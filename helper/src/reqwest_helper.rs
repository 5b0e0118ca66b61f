use anyhow::{Context, Result};
use reqwest::Response;
use serde::de::DeserializeOwned;

/// Read the whole body before deserializing so a failure can quote the
/// offending payload instead of a truncated stream error.
pub async fn deserialize_response<T>(response: Response) -> Result<T>
where
    T: DeserializeOwned,
{
    let full = response
        .bytes()
        .await
        .context("Failed to get bytes from the body of the message")?;

    serde_json::from_slice(&full).with_context(|| {
        format!(
            "Failed to deserialize the (supposedly JSON) body, the text \
             message is {:?}",
            String::from_utf8_lossy(&full)
        )
    })
}
