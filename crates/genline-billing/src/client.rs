use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use url::Url;

use crate::error::BillingError;
use crate::ledger::SubscriptionLedger;
use crate::types::{BalanceCheck, WriteOff, WriteOffMeta};

/// Ledger backed by a remote subscription service
#[derive(Clone)]
pub struct HttpLedger {
    http: reqwest::Client,
    base_url: Url,
    api_key: Option<SecretString>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WriteOffRequest<'a> {
    amount: u64,
    /// Job id; the service deduplicates repeated write-offs for one job
    idempotency_key: &'a str,
    meta: &'a WriteOffMeta,
}

impl HttpLedger {
    /// Create a new ledger client
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built
    pub fn new(base_url: Url, api_key: Option<SecretString>) -> Result<Self, BillingError> {
        let http = reqwest::Client::builder().build().map_err(BillingError::Request)?;

        Ok(Self {
            http,
            base_url,
            api_key,
        })
    }

    fn url(&self, path: &str) -> Result<Url, BillingError> {
        self.base_url.join(path).map_err(|e| BillingError::Api {
            status: 0,
            message: format!("invalid URL: {e}"),
        })
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => builder.header("x-service-api-key", key.expose_secret()),
            None => builder,
        }
    }

    async fn parse<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T, BillingError> {
        if response.status().is_success() {
            Ok(response.json().await?)
        } else {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            Err(BillingError::Api { status, message })
        }
    }
}

#[async_trait]
impl SubscriptionLedger for HttpLedger {
    /// GET `/subscriptions/:id/balance?estimate=N`
    async fn check_balance(&self, subscription_id: &str, estimate: u64) -> Result<BalanceCheck, BillingError> {
        let url = self.url(&format!("subscriptions/{subscription_id}/balance"))?;

        let response = self
            .authorize(self.http.get(url))
            .query(&[("estimate", estimate)])
            .send()
            .await?;

        Self::parse(response).await
    }

    /// POST `/subscriptions/:id/write-offs`
    async fn write_off(&self, subscription_id: &str, amount: u64, meta: &WriteOffMeta) -> Result<WriteOff, BillingError> {
        let url = self.url(&format!("subscriptions/{subscription_id}/write-offs"))?;

        let body = WriteOffRequest {
            amount,
            idempotency_key: &meta.job_id,
            meta,
        };

        let response = self.authorize(self.http.post(url)).json(&body).send().await?;

        let result = Self::parse::<WriteOff>(response).await;
        if let Err(e) = &result {
            tracing::error!(subscription_id, amount, job_id = %meta.job_id, error = %e, "write-off failed");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn test_client(base: &str) -> HttpLedger {
        HttpLedger::new(Url::parse(base).unwrap(), Some(SecretString::from("test-key"))).unwrap()
    }

    fn meta() -> WriteOffMeta {
        WriteOffMeta {
            job_id: "job_1".to_owned(),
            chat_id: Some("chat_1".to_owned()),
            model_id: "gpt-x".to_owned(),
            provider_id: Some("openai".to_owned()),
            prompt_units: 10,
            completion_units: 20,
            status: "done".to_owned(),
        }
    }

    #[tokio::test]
    async fn check_balance_sends_estimate() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/subscriptions/sub_1/balance"))
            .and(query_param("estimate", "42"))
            .and(header("x-service-api-key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "sufficient": true,
                "balance": 1000
            })))
            .mount(&server)
            .await;

        let client = test_client(&format!("{}/", server.uri()));
        let check = client.check_balance("sub_1", 42).await.unwrap();

        assert!(check.sufficient);
        assert_eq!(check.balance, 1000);
    }

    #[tokio::test]
    async fn write_off_uses_job_id_as_idempotency_key() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/subscriptions/sub_1/write-offs"))
            .and(body_partial_json(serde_json::json!({
                "amount": 7,
                "idempotencyKey": "job_1",
                "meta": {"modelId": "gpt-x", "promptUnits": 10, "completionUnits": 20}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "transaction": {
                    "id": "tx_1",
                    "subscriptionId": "sub_1",
                    "amount": 7,
                    "createdAt": "2026-01-01T00:00:00Z",
                    "meta": {
                        "jobId": "job_1",
                        "modelId": "gpt-x",
                        "promptUnits": 10,
                        "completionUnits": 20,
                        "status": "done"
                    }
                },
                "newBalance": 993
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&format!("{}/", server.uri()));
        let result = client.write_off("sub_1", 7, &meta()).await.unwrap();

        assert_eq!(result.transaction.id, "tx_1");
        assert_eq!(result.new_balance, 993);
    }

    #[tokio::test]
    async fn api_error_returns_billing_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/subscriptions/sub_1/write-offs"))
            .respond_with(ResponseTemplate::new(500).set_body_string("internal server error"))
            .mount(&server)
            .await;

        let client = test_client(&format!("{}/", server.uri()));
        let err = client.write_off("sub_1", 1, &meta()).await.unwrap_err();

        assert!(matches!(err, BillingError::Api { status: 500, .. }));
    }
}
