use async_trait::async_trait;
use reqwest::Response;

use super::EntityState;
use super::HostError;
use super::ServiceCall;
use super::ServiceCaller;
use super::StateReader;
use crate::config::HomeAssistantConfig;

/// Home Assistant REST API client
///
/// Reads states from `GET /api/states` and calls services through
/// `POST /api/services/<domain>/<service>`, authenticating with a long-lived
/// access token.
#[derive(Debug, Clone)]
pub struct HomeAssistantClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl HomeAssistantClient {
    pub fn new(config: &HomeAssistantConfig) -> Result<Self, HostError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("dashstyle/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url: config.url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

fn check_status(response: Response, path: &str) -> Result<Response, HostError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(HostError::Status {
            status: status.as_u16(),
            path: path.to_string(),
        })
    }
}

#[async_trait]
impl StateReader for HomeAssistantClient {
    async fn all_states(&self) -> Result<Vec<EntityState>, HostError> {
        let path = "/api/states";
        let response = self
            .http
            .get(self.url(path))
            .bearer_auth(&self.token)
            .send()
            .await?;

        let states: Vec<EntityState> = check_status(response, path)?.json().await?;
        tracing::debug!("Fetched {} entity states", states.len());
        Ok(states)
    }
}

#[async_trait]
impl ServiceCaller for HomeAssistantClient {
    async fn call_service(&self, call: &ServiceCall) -> Result<(), HostError> {
        let path = format!("/api/services/{}/{}", call.domain, call.service);
        tracing::debug!("Calling {} for {}", call, call.entity_id);

        let response = self
            .http
            .post(self.url(&path))
            .bearer_auth(&self.token)
            .json(&serde_json::json!({ "entity_id": call.entity_id }))
            .send()
            .await?;

        check_status(response, &path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::Mutex;

    use axum::Json;
    use axum::Router;
    use axum::extract::Path;
    use axum::extract::State;
    use axum::http::HeaderMap;
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::routing::post;
    use serde_json::Value;

    use super::*;
    use crate::host::Service;

    type Recorded = Arc<Mutex<Vec<(String, Value)>>>;

    const TOKEN: &str = "test-token";

    fn authorized(headers: &HeaderMap) -> bool {
        headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(|v| v == format!("Bearer {}", TOKEN))
            .unwrap_or(false)
    }

    async fn states(headers: HeaderMap) -> Result<Json<Value>, StatusCode> {
        if !authorized(&headers) {
            return Err(StatusCode::UNAUTHORIZED);
        }
        Ok(Json(serde_json::json!([
            {
                "entity_id": "light.kueche_decke",
                "state": "on",
                "attributes": {"friendly_name": "Küche Decke"},
                "last_changed": "2024-01-01T00:00:00+00:00"
            },
            {"entity_id": "sensor.kueche_temp", "state": "21.5", "attributes": {}}
        ])))
    }

    async fn service(
        State(recorded): State<Recorded>,
        headers: HeaderMap,
        Path((domain, service)): Path<(String, String)>,
        Json(body): Json<Value>,
    ) -> StatusCode {
        if !authorized(&headers) {
            return StatusCode::UNAUTHORIZED;
        }
        if body["entity_id"] == "cover.stuck" {
            return StatusCode::BAD_REQUEST;
        }
        recorded
            .lock()
            .unwrap()
            .push((format!("{}.{}", domain, service), body));
        StatusCode::OK
    }

    async fn spawn_fake_home_assistant(recorded: Recorded) -> String {
        let app = Router::new()
            .route("/api/states", get(states))
            .route("/api/services/:domain/:service", post(service))
            .with_state(recorded);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/", addr)
    }

    fn client(url: String, token: &str) -> HomeAssistantClient {
        HomeAssistantClient::new(&HomeAssistantConfig {
            url,
            token: token.to_string(),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_all_states() {
        let url = spawn_fake_home_assistant(Recorded::default()).await;
        let states = client(url, TOKEN).all_states().await.unwrap();
        assert_eq!(
            states,
            vec![
                EntityState::new("light.kueche_decke", "on"),
                EntityState::new("sensor.kueche_temp", "21.5"),
            ]
        );
    }

    #[tokio::test]
    async fn test_all_states_rejected_token() {
        let url = spawn_fake_home_assistant(Recorded::default()).await;
        let err = client(url, "wrong").all_states().await.unwrap_err();
        match err {
            HostError::Status { status, path } => {
                assert_eq!(status, 401);
                assert_eq!(path, "/api/states");
            }
            other => panic!("Expected status error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_call_service() {
        let recorded = Recorded::default();
        let url = spawn_fake_home_assistant(recorded.clone()).await;

        let call = ServiceCall {
            domain: "light",
            service: Service::TurnOn,
            entity_id: "light.kueche_decke".to_string(),
        };
        client(url, TOKEN).call_service(&call).await.unwrap();

        let recorded = recorded.lock().unwrap();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].0, "light.turn_on");
        assert_eq!(recorded[0].1, serde_json::json!({"entity_id": "light.kueche_decke"}));
    }

    #[tokio::test]
    async fn test_call_service_failure() {
        let url = spawn_fake_home_assistant(Recorded::default()).await;

        let call = ServiceCall {
            domain: "cover",
            service: Service::StopCover,
            entity_id: "cover.stuck".to_string(),
        };
        let err = client(url, TOKEN).call_service(&call).await.unwrap_err();
        assert!(err.to_string().contains("400"));
        assert!(err.to_string().contains("/api/services/cover/stop_cover"));
    }
}
