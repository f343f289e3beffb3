//! `reqwest` implementation of [`DonationCollaborator`].

use crate::collaborator::{
    Activation, Checkout, CollaboratorError, CollectiveDetail, CreateDonationBox,
    DonationBoxRecord, DonationCollaborator, OneTimeDonationRequest, UpdateDonationBox,
};
use crate::config::BackendConfig;
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

/// Talks to the donation backend over HTTPS with JSON bodies.
#[derive(Debug, Clone)]
pub struct HttpCollaborator {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpCollaborator {
    /// Builds a client with the configured timeout and bearer token.
    pub fn from_config(config: &BackendConfig) -> Result<Self, CollaboratorError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CollaboratorError::Transport(format!("client init failed: {e}")))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.api_token.clone(),
        })
    }

    fn url(&self, path: &str) -> Result<Url, CollaboratorError> {
        let joined = join_url(&self.base_url, path);
        Url::parse(&joined).map_err(|e| CollaboratorError::Transport(format!("bad url {joined}: {e}")))
    }

    /// `collectives/{id}` with `id` percent-encoded as one path segment.
    fn collective_url(&self, id: &str) -> Result<Url, CollaboratorError> {
        let mut url = self.url("collectives")?;
        url.path_segments_mut()
            .map_err(|_| CollaboratorError::Transport(format!("base url cannot take a path: {}", self.base_url)))?
            .push(id);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let mut req = self.client.request(method, url);
        if let Some(token) = self.token.as_deref() {
            req = req.bearer_auth(token);
        }
        req
    }

    async fn send(&self, req: RequestBuilder) -> Result<String, CollaboratorError> {
        let resp = req
            .send()
            .await
            .map_err(|e| CollaboratorError::Transport(e.to_string()))?;
        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| CollaboratorError::Transport(format!("read failed: {e}")))?;
        debug!(status = status.as_u16(), bytes = text.len(), "backend response");
        if status.is_success() {
            Ok(text)
        } else {
            Err(status_error(status, &text))
        }
    }

    async fn call<B, T>(&self, method: Method, url: Url, body: Option<&B>) -> Result<T, CollaboratorError>
    where
        B: Serialize + Sync + ?Sized,
        T: DeserializeOwned,
    {
        let mut req = self.request(method, url);
        if let Some(body) = body {
            req = req.json(body);
        }
        let text = self.send(req).await?;
        decode(&text)
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

fn decode<T: DeserializeOwned>(text: &str) -> Result<T, CollaboratorError> {
    let body = if text.trim().is_empty() { "null" } else { text };
    serde_json::from_str(body).map_err(|e| CollaboratorError::Decode(e.to_string()))
}

/// Maps a non-success response to an error.  4xx bodies carrying a
/// `message` field are surfaced to the donor as-is.
fn status_error(status: StatusCode, body: &str) -> CollaboratorError {
    let message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string));
    match message {
        Some(message)
            if status.is_client_error() && status != StatusCode::NOT_FOUND =>
        {
            CollaboratorError::Rejected(message)
        }
        Some(message) => CollaboratorError::Status {
            status: status.as_u16(),
            message,
        },
        None => CollaboratorError::Status {
            status: status.as_u16(),
            message: body.trim().to_string(),
        },
    }
}

#[async_trait]
impl DonationCollaborator for HttpCollaborator {
    async fn create_donation_box(
        &self,
        request: &CreateDonationBox,
    ) -> Result<DonationBoxRecord, CollaboratorError> {
        self.call(Method::POST, self.url("donation-box")?, Some(request))
            .await
    }

    async fn update_donation_box(
        &self,
        update: &UpdateDonationBox,
    ) -> Result<DonationBoxRecord, CollaboratorError> {
        self.call(Method::PATCH, self.url("donation-box")?, Some(update))
            .await
    }

    async fn activate_donation_box(&self) -> Result<Activation, CollaboratorError> {
        let activation: Option<Activation> = self
            .call::<(), _>(Method::POST, self.url("donation-box/activate")?, None)
            .await?;
        Ok(activation.unwrap_or_default())
    }

    async fn cancel_donation_box(&self) -> Result<(), CollaboratorError> {
        let req = self.request(Method::POST, self.url("donation-box/cancel")?);
        self.send(req).await.map(|_| ())
    }

    async fn get_collective_by_id(&self, id: &str) -> Result<CollectiveDetail, CollaboratorError> {
        self.call::<(), _>(Method::GET, self.collective_url(id)?, None)
            .await
    }

    async fn create_one_time_donation(
        &self,
        request: &OneTimeDonationRequest,
    ) -> Result<Checkout, CollaboratorError> {
        self.call(Method::POST, self.url("donations/one-time")?, Some(request))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_join_with_a_single_slash() {
        assert_eq!(
            join_url("https://api.test/v1/", "/donation-box"),
            "https://api.test/v1/donation-box"
        );
        let collab = HttpCollaborator::from_config(&BackendConfig {
            base_url: "https://api.test/v1///".into(),
            timeout_secs: 5,
            api_token: None,
        })
        .unwrap();
        assert_eq!(
            collab.url("collectives/k1").unwrap().as_str(),
            "https://api.test/v1/collectives/k1"
        );
    }

    #[test]
    fn collective_ids_are_one_encoded_segment() {
        let collab = HttpCollaborator::from_config(&BackendConfig {
            base_url: "https://api.test/v1".into(),
            timeout_secs: 5,
            api_token: None,
        })
        .unwrap();
        let url = collab.collective_url("water/wells?x=1#top").unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.test/v1/collectives/water%2Fwells%3Fx=1%23top"
        );
        assert_eq!(url.query(), None);
        assert_eq!(url.fragment(), None);
    }

    #[test]
    fn client_errors_with_message_are_rejections() {
        let err = status_error(StatusCode::UNPROCESSABLE_ENTITY, r#"{"message":"card declined"}"#);
        assert_eq!(err, CollaboratorError::Rejected("card declined".into()));

        let err = status_error(StatusCode::NOT_FOUND, r#"{"message":"no such collective"}"#);
        assert!(matches!(err, CollaboratorError::Status { status: 404, .. }));

        let err = status_error(StatusCode::BAD_GATEWAY, "upstream down\n");
        assert_eq!(
            err,
            CollaboratorError::Status {
                status: 502,
                message: "upstream down".into()
            }
        );
    }

    #[test]
    fn empty_activation_body_decodes_to_none() {
        let parsed: Option<Activation> = decode("").unwrap();
        assert_eq!(parsed, None);
        let parsed: Option<Activation> = decode(r#"{"checkoutUrl":"https://pay.test/x"}"#).unwrap();
        assert_eq!(parsed.unwrap().checkout_url.as_deref(), Some("https://pay.test/x"));
        assert!(matches!(decode::<Checkout>("{}"), Err(CollaboratorError::Decode(_))));
    }
}
