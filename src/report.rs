use crate::config::AppConfig;
use crate::error::AppError;
use crate::message::{build_message, ChatMessage};
use crate::metrics::{last_average, ChargeQuery, MetricsSource};
use crate::models::{BillingRecord, ReportWindow, TOTAL_LABEL};
use crate::slack::post_message;
use chrono::NaiveDate;
use reqwest::Client;

pub struct DeliveryReceipt {
    pub status: u16,
    pub field_count: usize,
}

/// Runs one report: previous-day window, aggregate charge, one charge per
/// configured service, then a single webhook post.
pub struct BillingReporter {
    client: Client,
}

impl BillingReporter {
    pub fn new() -> Result<Self, AppError> {
        let client = Client::builder()
            .connect_timeout(std::time::Duration::from_secs(10))
            .timeout(std::time::Duration::from_secs(30))
            .build()?;
        Ok(Self { client })
    }

    /// Fetches the aggregate charge, then each service's charge strictly in
    /// order with one query in flight at a time. Any fetch error aborts the
    /// run before anything is delivered.
    pub async fn collect(
        &self,
        source: &dyn MetricsSource,
        window: ReportWindow,
        service_names: &[String],
    ) -> Result<BillingRecord, AppError> {
        let mut record = BillingRecord::default();

        let datapoints = source
            .fetch_datapoints(&self.client, &ChargeQuery::aggregate(window))
            .await?;
        record.push(TOTAL_LABEL, last_average(&datapoints));
        tracing::info!(total = record.total(), "fetched aggregate estimated charges");

        for name in service_names {
            let datapoints = source
                .fetch_datapoints(&self.client, &ChargeQuery::for_service(window, name.clone()))
                .await?;
            let amount = last_average(&datapoints);
            tracing::info!(service = %name, amount, "fetched service estimated charges");
            record.push(name.clone(), amount);
        }

        Ok(record)
    }

    async fn compose(
        &self,
        cfg: &AppConfig,
        source: &dyn MetricsSource,
        base_date: NaiveDate,
    ) -> Result<ChatMessage, AppError> {
        let window = ReportWindow::preceding(base_date)?;
        tracing::info!(start = %window.start, end = %window.end, "reporting window");

        let record = self.collect(source, window, &cfg.service_names).await?;
        Ok(build_message(&record, &cfg.channel, cfg.conversion_rate))
    }

    /// Builds the message without delivering it.
    pub async fn preview(
        &self,
        cfg: &AppConfig,
        source: &dyn MetricsSource,
        base_date: NaiveDate,
    ) -> Result<ChatMessage, AppError> {
        self.compose(cfg, source, base_date).await
    }

    pub async fn report(
        &self,
        cfg: &AppConfig,
        source: &dyn MetricsSource,
        base_date: NaiveDate,
    ) -> Result<DeliveryReceipt, AppError> {
        let message = self.compose(cfg, source, base_date).await?;
        let status = post_message(&self.client, &cfg.webhook_url, &message).await?;
        tracing::info!(status, fields = message.field_count(), "report delivered");

        Ok(DeliveryReceipt {
            status,
            field_count: message.field_count(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Datapoint;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use std::sync::Mutex;

    /// Returns canned responses in order and records which label each query
    /// asked for.
    struct ScriptedSource {
        responses: Mutex<Vec<Result<Vec<Datapoint>, AppError>>>,
        seen: Mutex<Vec<Option<String>>>,
    }

    impl ScriptedSource {
        fn new(responses: Vec<Result<Vec<Datapoint>, AppError>>) -> Self {
            Self {
                responses: Mutex::new(responses),
                seen: Mutex::new(Vec::new()),
            }
        }

        fn seen(&self) -> Vec<Option<String>> {
            self.seen.lock().expect("lock").clone()
        }
    }

    #[async_trait]
    impl MetricsSource for ScriptedSource {
        async fn fetch_datapoints(
            &self,
            _client: &Client,
            query: &ChargeQuery,
        ) -> Result<Vec<Datapoint>, AppError> {
            self.seen
                .lock()
                .expect("lock")
                .push(query.service_name.clone());
            let mut responses = self.responses.lock().expect("lock");
            if responses.is_empty() {
                return Err(AppError::Config("no scripted response left".into()));
            }
            responses.remove(0)
        }
    }

    fn points(values: &[f64]) -> Vec<Datapoint> {
        values
            .iter()
            .enumerate()
            .map(|(i, &average)| Datapoint {
                timestamp: Utc.timestamp_opt(1_700_000_000 + i as i64 * 60, 0).unwrap(),
                average,
            })
            .collect()
    }

    fn window() -> ReportWindow {
        ReportWindow::for_day(NaiveDate::from_ymd_opt(2024, 6, 1).expect("date")).expect("window")
    }

    #[tokio::test]
    async fn collect_orders_total_then_services() {
        let source = ScriptedSource::new(vec![
            Ok(points(&[10.0, 12.3456])),
            Ok(points(&[1.0])),
            Ok(vec![]),
            Ok(points(&[0.5, 0.75])),
        ]);
        let reporter = BillingReporter::new().expect("reporter");
        let services = vec!["A".to_string(), "B".to_string(), "C".to_string()];

        let record = reporter
            .collect(&source, window(), &services)
            .await
            .expect("collect");

        let labels: Vec<&str> = record.entries().iter().map(|e| e.label.as_str()).collect();
        assert_eq!(labels, vec![TOTAL_LABEL, "A", "B", "C"]);
        assert_eq!(record.total(), 12.3456);
        assert_eq!(record.entries()[1].amount, 1.0);
        assert_eq!(record.entries()[2].amount, 0.0);
        assert_eq!(record.entries()[3].amount, 0.75);

        // Aggregate query first, then services in configured order.
        assert_eq!(
            source.seen(),
            vec![
                None,
                Some("A".to_string()),
                Some("B".to_string()),
                Some("C".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn collect_reports_zero_when_no_datapoints_anywhere() {
        let source = ScriptedSource::new(vec![Ok(vec![]), Ok(vec![]), Ok(vec![])]);
        let reporter = BillingReporter::new().expect("reporter");
        let services = vec!["A".to_string(), "B".to_string()];

        let record = reporter
            .collect(&source, window(), &services)
            .await
            .expect("collect");

        assert_eq!(record.entries().len(), 3);
        for entry in record.entries() {
            assert_eq!(entry.amount, 0.0);
        }
    }

    #[tokio::test]
    async fn collect_stops_at_first_fetch_error() {
        let source = ScriptedSource::new(vec![
            Ok(points(&[5.0])),
            Ok(points(&[1.0])),
            Err(AppError::Config("throttled".into())),
            Ok(points(&[2.0])),
        ]);
        let reporter = BillingReporter::new().expect("reporter");
        let services = vec!["A".to_string(), "B".to_string(), "C".to_string()];

        let err = reporter
            .collect(&source, window(), &services)
            .await
            .expect_err("expected fetch error");
        assert!(err.to_string().contains("throttled"));

        // The failing service was the last one queried; C was never reached.
        assert_eq!(
            source.seen(),
            vec![None, Some("A".to_string()), Some("B".to_string())]
        );
    }

    #[tokio::test]
    async fn collect_fails_when_aggregate_fetch_fails() {
        let source = ScriptedSource::new(vec![Err(AppError::Config("no credentials".into()))]);
        let reporter = BillingReporter::new().expect("reporter");

        let err = reporter
            .collect(&source, window(), &["A".to_string()])
            .await
            .expect_err("expected fetch error");
        assert!(err.to_string().contains("no credentials"));
        assert_eq!(source.seen(), vec![None]);
    }
}
