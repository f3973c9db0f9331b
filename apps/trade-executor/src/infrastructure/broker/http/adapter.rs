//! HTTP broker adapter implementing `BrokerPort`.

use std::time::Instant;

use async_trait::async_trait;

use crate::application::ports::{BrokerError, BrokerPort, Quote, QuoteRequest};
use crate::domain::shared::BrokerOrderId;
use crate::domain::trading::{Order, TradeReport};
use crate::observability::record_broker_call;

use super::api_types::{OrderRequest, QuoteResponse, TradeReportResponse};
use super::config::HttpBrokerConfig;
use super::error::BrokerHttpError;
use super::http_client::BrokerHttpClient;

/// Broker adapter for the REST broker API.
#[derive(Debug, Clone)]
pub struct HttpBrokerAdapter {
    client: BrokerHttpClient,
}

impl HttpBrokerAdapter {
    /// Create a new adapter.
    pub fn new(config: &HttpBrokerConfig) -> Result<Self, BrokerHttpError> {
        Ok(Self {
            client: BrokerHttpClient::new(config)?,
        })
    }

    /// Broker API base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        self.client.base_url()
    }

    fn quote_path(request: &QuoteRequest) -> String {
        format!(
            "/api/{}/quote/{}/{}",
            request.broker, request.exchange, request.contract_id
        )
    }
}

#[async_trait]
impl BrokerPort for HttpBrokerAdapter {
    async fn get_quote(&self, request: &QuoteRequest) -> Result<Quote, BrokerError> {
        let started = Instant::now();
        let result: Result<QuoteResponse, BrokerHttpError> =
            self.client.get(&Self::quote_path(request)).await;
        record_broker_call("quote", started.elapsed().as_secs_f64());

        let quote = Quote::from(result.map_err(BrokerError::from)?);
        tracing::debug!(
            contract_id = request.contract_id,
            bid = ?quote.bid,
            ask = ?quote.ask,
            last = ?quote.last,
            "Quote received"
        );
        Ok(quote)
    }

    async fn submit_order(&self, order: &Order) -> Result<BrokerOrderId, BrokerError> {
        let instruction = &order.instruction;
        let body = OrderRequest::from(order);

        tracing::info!(
            strategy = %instruction.strategy_name,
            symbol = %instruction.symbol,
            side = %instruction.side,
            order_type = %instruction.order_type,
            quantity = %instruction.quantity,
            price = ?order.price,
            "Submitting order to broker"
        );

        let started = Instant::now();
        let result = self
            .client
            .post_text(&format!("/api/{}/order", instruction.broker), &body)
            .await;
        record_broker_call("order", started.elapsed().as_secs_f64());

        let text = result.map_err(BrokerError::from)?;
        BrokerOrderId::parse(&text).ok_or_else(|| BrokerError::MalformedResponse {
            message: format!("order id is not an integer: {text}"),
        })
    }

    async fn get_trades(&self, broker: &str) -> Result<Vec<TradeReport>, BrokerError> {
        let started = Instant::now();
        let result: Result<Vec<TradeReportResponse>, BrokerHttpError> =
            self.client.get(&format!("/api/{broker}/trades")).await;
        record_broker_call("trades", started.elapsed().as_secs_f64());

        let responses = result.map_err(BrokerError::from)?;
        let total = responses.len();
        let reports: Vec<TradeReport> = responses
            .into_iter()
            .filter_map(TradeReportResponse::into_report)
            .collect();

        if reports.len() < total {
            tracing::warn!(
                broker,
                skipped = total - reports.len(),
                "Trade reports with non-numeric order ids skipped"
            );
        }
        Ok(reports)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::trading::{OrderType, ReportStatus, Side, TradeInstruction};
    use crate::infrastructure::broker::http::RetryConfig;
    use rust_decimal_macros::dec;
    use std::time::Duration;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn adapter(server: &MockServer) -> HttpBrokerAdapter {
        let retry = RetryConfig {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(5),
            multiplier: 2.0,
            jitter_factor: 0.0,
        };
        let config = HttpBrokerConfig::new(server.uri())
            .with_timeout(Duration::from_millis(500))
            .with_retry(retry);
        HttpBrokerAdapter::new(&config).unwrap()
    }

    fn order(order_type: OrderType, price: Option<rust_decimal::Decimal>) -> Order {
        Order::new(
            TradeInstruction {
                strategy_name: "S1".to_string(),
                contract_id: 123,
                exchange: "CME".to_string(),
                symbol: "ES".to_string(),
                side: Side::Buy,
                quantity: dec!(1),
                order_type,
                broker: "IB".to_string(),
                limit_price: None,
            },
            price,
        )
    }

    fn quote_request() -> QuoteRequest {
        QuoteRequest {
            broker: "IB".to_string(),
            exchange: "CME".to_string(),
            contract_id: 123,
        }
    }

    #[tokio::test]
    async fn get_quote_hits_broker_route() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/IB/quote/CME/123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "bid": 4500.0, "ask": 4500.25, "last": 4500.0
            })))
            .expect(1)
            .mount(&server)
            .await;

        let quote = adapter(&server).get_quote(&quote_request()).await.unwrap();

        assert_eq!(quote.ask, Some(dec!(4500.25)));
        assert!(quote.has_live_market());
    }

    #[tokio::test]
    async fn get_quote_retries_server_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/IB/quote/CME/123"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/IB/quote/CME/123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "bid": 1, "ask": 2, "last": 1.5
            })))
            .mount(&server)
            .await;

        let quote = adapter(&server).get_quote(&quote_request()).await.unwrap();
        assert_eq!(quote.bid, Some(dec!(1)));
    }

    #[tokio::test]
    async fn get_quote_malformed_json_fails() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/IB/quote/CME/123"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let err = adapter(&server).get_quote(&quote_request()).await.unwrap_err();
        assert!(matches!(err, BrokerError::MalformedResponse { .. }));
    }

    #[tokio::test]
    async fn submit_order_parses_quoted_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/IB/order"))
            .and(body_partial_json(serde_json::json!({
                "strategy_name": "S1",
                "side": "BUY",
                "order_type": "LMT",
                "limit_price": 4500.25
            })))
            .respond_with(ResponseTemplate::new(200).set_body_string("\"42\""))
            .expect(1)
            .mount(&server)
            .await;

        let id = adapter(&server)
            .submit_order(&order(OrderType::Limit, Some(dec!(4500.25))))
            .await
            .unwrap();
        assert_eq!(id, BrokerOrderId::new(42));
    }

    #[tokio::test]
    async fn submit_order_is_never_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/IB/order"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        let result = adapter(&server)
            .submit_order(&order(OrderType::Market, None))
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn submit_order_rejection() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/IB/order"))
            .respond_with(ResponseTemplate::new(422).set_body_string("unknown contract"))
            .mount(&server)
            .await;

        let err = adapter(&server)
            .submit_order(&order(OrderType::Market, None))
            .await
            .unwrap_err();
        assert!(matches!(err, BrokerError::OrderRejected { .. }));
    }

    #[tokio::test]
    async fn submit_order_non_numeric_id_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/IB/order"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;

        let err = adapter(&server)
            .submit_order(&order(OrderType::Market, None))
            .await
            .unwrap_err();
        assert!(matches!(err, BrokerError::MalformedResponse { .. }));
    }

    #[tokio::test]
    async fn get_trades_decodes_reports() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/IB/trades"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"orderId": 42, "price": 101.5, "quantity": 10, "status": "Filled", "time": "10:00:00"},
                {"orderId": "43", "price": 0, "quantity": 0, "status": "Submitted", "time": "10:00:01"},
                {"orderId": "n/a", "price": 0, "quantity": 0, "status": "Filled", "time": "10:00:02"}
            ])))
            .mount(&server)
            .await;

        let reports = adapter(&server).get_trades("IB").await.unwrap();

        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].order_id, BrokerOrderId::new(42));
        assert_eq!(reports[0].status, ReportStatus::Filled);
        assert!(!reports[1].is_terminal());
    }

    #[tokio::test]
    async fn get_trades_client_error_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/IB/trades"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        assert!(adapter(&server).get_trades("IB").await.is_err());
    }
}
