use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, header};

use super::flux;
use super::r#trait::{ColumnStore, DeletePredicate, Point, Row, RowQuery, StoreError, TimeRange};

/// Connection settings for an InfluxDB v2 instance.
#[derive(Clone)]
pub struct InfluxSettings {
    pub url: String,
    pub token: String,
    pub org: String,
    pub bucket: String,
    pub timeout: Duration,
}

impl core::fmt::Debug for InfluxSettings {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("InfluxSettings")
            .field("url", &self.url)
            .field("org", &self.org)
            .field("bucket", &self.bucket)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// InfluxDB v2 HTTP adapter.
///
/// Writes line protocol, reads with Flux, and purges with delete predicates. Each call
/// is a single request bounded by the client timeout; nothing is retried.
#[derive(Debug, Clone)]
pub struct InfluxColumnStore {
    client: Client,
    settings: InfluxSettings,
}

impl InfluxColumnStore {
    pub fn new(settings: InfluxSettings) -> Result<Self, StoreError> {
        let client = Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| StoreError::Transport(e.to_string()))?;
        Ok(Self { client, settings })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.settings.url.trim_end_matches('/'), path)
    }

    fn auth(&self) -> String {
        format!("Token {}", self.settings.token)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<String, StoreError> {
        let response = request
            .header(header::AUTHORIZATION, self.auth())
            .send()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;

        if status.is_success() {
            Ok(body)
        } else {
            Err(StoreError::Rejected {
                status: status.as_u16(),
                body,
            })
        }
    }
}

#[async_trait]
impl ColumnStore for InfluxColumnStore {
    #[tracing::instrument(skip(self, query), fields(measurement = %query.measurement))]
    async fn query(&self, query: &RowQuery) -> Result<Vec<Row>, StoreError> {
        let body = serde_json::json!({
            "query": flux::flux_query(&self.settings.bucket, query),
            "type": "flux",
            "dialect": {
                "header": true,
                "annotations": [],
                "delimiter": ",",
            },
        });

        let request = self
            .client
            .post(self.endpoint("/api/v2/query"))
            .query(&[("org", self.settings.org.as_str())])
            .header(header::ACCEPT, "application/csv")
            .json(&body);

        let text = self.send(request).await?;
        let rows = flux::parse_query_response(&text)?;
        tracing::debug!(rows = rows.len(), "influx query complete");
        Ok(rows)
    }

    #[tracing::instrument(skip(self, point), fields(measurement = %point.measurement))]
    async fn write(&self, point: Point) -> Result<(), StoreError> {
        let line = flux::line_protocol(&point)?;

        let request = self
            .client
            .post(self.endpoint("/api/v2/write"))
            .query(&[
                ("org", self.settings.org.as_str()),
                ("bucket", self.settings.bucket.as_str()),
                ("precision", "ns"),
            ])
            .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(line);

        self.send(request).await.map(|_| ())
    }

    #[tracing::instrument(skip(self, predicate), fields(measurement = %predicate.measurement))]
    async fn delete(&self, range: TimeRange, predicate: &DeletePredicate) -> Result<(), StoreError> {
        let request = self
            .client
            .post(self.endpoint("/api/v2/delete"))
            .query(&[
                ("org", self.settings.org.as_str()),
                ("bucket", self.settings.bucket.as_str()),
            ])
            .json(&flux::delete_body(range.start, range.stop, predicate));

        self.send(request).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use httpmock::prelude::*;

    fn store_for(server: &MockServer) -> InfluxColumnStore {
        InfluxColumnStore::new(InfluxSettings {
            url: server.base_url(),
            token: "test-token".into(),
            org: "acme-org".into(),
            bucket: "users".into(),
            timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn write_posts_line_protocol() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/api/v2/write")
                .query_param("org", "acme-org")
                .query_param("bucket", "users")
                .query_param("precision", "ns")
                .header("authorization", "Token test-token")
                .body_includes("Users,Type=Admin,UserId=u1 Name=\"Ann\"");
            then.status(204);
        });

        let t = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let point = Point::new("Users", t)
            .tag("UserId", "u1")
            .tag("Type", "Admin")
            .field("Name", "Ann");
        store_for(&server).write(point).await.unwrap();
        mock.assert();
    }

    #[tokio::test]
    async fn query_parses_csv_rows() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/api/v2/query")
                .query_param("org", "acme-org")
                .header("authorization", "Token test-token")
                .body_includes("\"type\":\"flux\"")
                .body_includes("r[\\\"UserId\\\"] == \\\"u1\\\"");
            then.status(200)
                .header("content-type", "text/csv; charset=utf-8")
                .body(
                    ",result,table,_start,_stop,_time,_value,_field,_measurement,Type,UserId\r\n\
                     ,_result,0,1970-01-01T00:00:00Z,2024-01-01T00:00:00Z,2023-11-14T22:13:20Z,Ann,Name,Users,Admin,u1\r\n",
                );
        });

        let q = RowQuery::new("Users", TimeRange::up_to(Utc::now())).tag_eq("UserId", "u1");
        let rows = store_for(&server).query(&q).await.unwrap();
        mock.assert();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].value, "Ann");
        assert_eq!(rows[0].tag("Type"), Some("Admin"));
    }

    #[tokio::test]
    async fn delete_posts_predicate() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/api/v2/delete")
                .query_param("org", "acme-org")
                .query_param("bucket", "users")
                .body_includes("_measurement=\\\"Users\\\" AND UserId=\\\"u1\\\"");
            then.status(204);
        });

        let now = Utc::now();
        let predicate = DeletePredicate::new("Users").tag_eq("UserId", "u1");
        store_for(&server)
            .delete(TimeRange::new(now - chrono::Duration::days(365), now), &predicate)
            .await
            .unwrap();
        mock.assert();
    }

    #[tokio::test]
    async fn non_success_status_is_rejection() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/api/v2/write");
            then.status(401).body("{\"code\":\"unauthorized\"}");
        });

        let point = Point::new("Users", Utc::now()).tag("UserId", "u1").field("Name", "Ann");
        let err = store_for(&server).write(point).await.unwrap_err();
        assert!(matches!(err, StoreError::Rejected { status: 401, .. }));
    }

    #[tokio::test]
    async fn unreachable_store_is_transport_error() {
        let store = InfluxColumnStore::new(InfluxSettings {
            url: "http://127.0.0.1:1".into(),
            token: "t".into(),
            org: "o".into(),
            bucket: "b".into(),
            timeout: Duration::from_secs(2),
        })
        .unwrap();
        let err = store
            .query(&RowQuery::new("Users", TimeRange::up_to(Utc::now())))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Transport(_)));
    }
}
