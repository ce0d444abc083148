use crate::error::AppError;
use crate::metrics::{ChargeQuery, MetricsSource};
use crate::models::Datapoint;
use crate::sigv4::{sign_request, AwsCredentials};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use reqwest::Client;
use serde_json::{json, Value};

const NAMESPACE: &str = "AWS/Billing";
const METRIC_NAME: &str = "EstimatedCharges";
const PERIOD_SECONDS: u32 = 86_400;
const SERVICE: &str = "monitoring";
const TARGET: &str = "GraniteServiceVersion20100801.GetMetricStatistics";
const CONTENT_TYPE: &str = "application/x-amz-json-1.0";

/// Estimated-charges source backed by the CloudWatch GetMetricStatistics API,
/// called directly over its JSON protocol with SigV4-signed requests.
pub struct CloudWatchSource {
    region: String,
    credentials: AwsCredentials,
    endpoint_override: Option<String>,
}

impl CloudWatchSource {
    pub fn new(region: impl Into<String>, credentials: AwsCredentials) -> Self {
        Self {
            region: region.into(),
            credentials,
            endpoint_override: None,
        }
    }

    /// Point the source at a non-default endpoint, e.g. a local stub.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint_override = Some(endpoint.into());
        self
    }

    fn endpoint(&self) -> String {
        self.endpoint_override
            .clone()
            .unwrap_or_else(|| format!("https://monitoring.{}.amazonaws.com", self.region))
    }

    fn request_body(query: &ChargeQuery) -> Value {
        let mut dimensions = vec![json!({ "Name": "Currency", "Value": "USD" })];
        if let Some(name) = &query.service_name {
            dimensions.push(json!({ "Name": "ServiceName", "Value": name }));
        }

        json!({
            "Namespace": NAMESPACE,
            "MetricName": METRIC_NAME,
            "StartTime": query.window.start.timestamp(),
            "EndTime": query.window.end.timestamp(),
            "Period": PERIOD_SECONDS,
            "Statistics": ["Average"],
            "Dimensions": dimensions,
        })
    }

    /// CloudWatch returns datapoints in no particular order; sort ascending so
    /// the last one is the most recent sample in the window.
    fn parse_datapoints(body: &Value) -> Vec<Datapoint> {
        let items = body
            .get("Datapoints")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let mut out = Vec::with_capacity(items.len());
        for item in items {
            let Some(average) = item.get("Average").and_then(Value::as_f64) else {
                continue;
            };
            let Some(timestamp) = item
                .get("Timestamp")
                .and_then(Value::as_f64)
                .and_then(|secs| Utc.timestamp_opt(secs as i64, 0).single())
            else {
                continue;
            };
            out.push(Datapoint { timestamp, average });
        }

        out.sort_by_key(|d| d.timestamp);
        out
    }
}

fn host_of(endpoint: &str) -> Result<String, AppError> {
    let parsed = url::Url::parse(endpoint)
        .map_err(|e| AppError::Config(format!("invalid metrics endpoint '{endpoint}': {e}")))?;
    let host = parsed
        .host_str()
        .ok_or_else(|| AppError::Config(format!("metrics endpoint '{endpoint}' has no host")))?;
    Ok(match parsed.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}

#[async_trait]
impl MetricsSource for CloudWatchSource {
    async fn fetch_datapoints(
        &self,
        client: &Client,
        query: &ChargeQuery,
    ) -> Result<Vec<Datapoint>, AppError> {
        let endpoint = self.endpoint();
        let host = host_of(&endpoint)?;
        let payload = serde_json::to_vec(&Self::request_body(query))?;

        let signed = sign_request(
            &self.credentials,
            &self.region,
            SERVICE,
            &host,
            TARGET,
            CONTENT_TYPE,
            &payload,
            Utc::now(),
        );

        let mut request = client
            .post(&endpoint)
            .header("Content-Type", CONTENT_TYPE)
            .header("X-Amz-Target", TARGET)
            .header("X-Amz-Date", &signed.amz_date)
            .header("Authorization", &signed.authorization);
        if let Some(token) = &signed.security_token {
            request = request.header("X-Amz-Security-Token", token);
        }

        let body: Value = request
            .body(payload)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(Self::parse_datapoints(&body))
    }
}
