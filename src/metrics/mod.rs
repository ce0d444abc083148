use crate::error::AppError;
use crate::models::{Datapoint, ReportWindow};
use async_trait::async_trait;
use reqwest::Client;

pub mod cloudwatch;

/// One estimated-charges query: always scoped to USD, optionally narrowed to
/// a single service.
#[derive(Debug, Clone)]
pub struct ChargeQuery {
    pub window: ReportWindow,
    pub service_name: Option<String>,
}

impl ChargeQuery {
    pub fn aggregate(window: ReportWindow) -> Self {
        Self {
            window,
            service_name: None,
        }
    }

    pub fn for_service(window: ReportWindow, service_name: impl Into<String>) -> Self {
        Self {
            window,
            service_name: Some(service_name.into()),
        }
    }
}

#[async_trait]
pub trait MetricsSource {
    async fn fetch_datapoints(
        &self,
        client: &Client,
        query: &ChargeQuery,
    ) -> Result<Vec<Datapoint>, AppError>;
}

/// Charge for a window: the most recent sample, or 0 when the window has no
/// datapoints at all.
pub fn last_average(datapoints: &[Datapoint]) -> f64 {
    datapoints.last().map_or(0.0, |d| d.average)
}
