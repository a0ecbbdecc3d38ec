//! HTTP client for the decision gateway.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use dhara_config::GatewaySection;
use reqwest::header::HeaderValue;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, error, info, warn};

use crate::context::ToolContext;
use crate::error::{HilError, HilResult};
use crate::gateway::{DecisionGateway, ToolInterceptor};
use crate::redaction::redacted;
use crate::types::{ProposalUpdate, RequestSnapshot, Verdict};

/// Header carrying the API key on every call.
pub const API_KEY_HEADER: &str = "X-DHARA-API-KEY";

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Client for the gateway's three operations.
///
/// Holds no per-request state, so one instance can be shared by any number
/// of concurrent approval flows. No call is retried.
#[derive(Clone)]
pub struct GatewayClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
    tenant_id: String,
    app_id: String,
    environment: String,
    default_risk_level: String,
    request_timeout: Duration,
}

impl fmt::Debug for GatewayClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayClient")
            .field("base_url", &self.base_url)
            .field("has_api_key", &self.api_key.is_some())
            .field("tenant_id", &self.tenant_id)
            .field("app_id", &self.app_id)
            .field("environment", &self.environment)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct Webhook<'a> {
    decision_url: &'a str,
}

#[derive(Serialize)]
struct Registration<'a> {
    tenant_id: &'a str,
    app_id: &'a str,
    agent_id: &'a str,
    run_id: &'a str,
    step_id: &'a str,
    tool_name: &'a str,
    tool_args: &'a Map<String, Value>,
    tool_args_redacted: &'a Map<String, Value>,
    context_summary: &'a str,
    risk_level: &'a str,
    environment: &'a str,
    tags: &'a [String],
    idempotency_key: &'a str,
    webhook: Webhook<'a>,
    metadata: &'a std::collections::BTreeMap<String, String>,
    display_hints: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RegistrationResponse {
    #[serde(default)]
    action: Option<String>,
    #[serde(default)]
    request_id: Option<String>,
    #[serde(default)]
    expires_at: Option<String>,
}

impl GatewayClient {
    /// Create a client for the gateway at `base_url`.
    ///
    /// A trailing slash is stripped. Tenant and app default to empty, the
    /// environment to `dev`.
    ///
    /// # Errors
    ///
    /// Returns [`HilError::Transport`] if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>) -> HilResult<Self> {
        let http = Client::builder().build()?;
        let base_url = base_url.into().trim_end_matches('/').to_owned();
        Ok(Self {
            http,
            base_url,
            api_key: None,
            tenant_id: String::new(),
            app_id: String::new(),
            environment: "dev".to_owned(),
            default_risk_level: "MEDIUM".to_owned(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        })
    }

    /// Create a client from the `[gateway]` config section.
    ///
    /// # Errors
    ///
    /// Returns [`HilError::Transport`] if the HTTP client cannot be built.
    pub fn from_config(section: &GatewaySection) -> HilResult<Self> {
        let mut client = Self::new(section.base_url.as_str())?
            .with_tenant(section.tenant_id.as_str(), section.app_id.as_str())
            .with_environment(section.environment.as_str())
            .with_request_timeout(Duration::from_secs(section.request_timeout_secs));
        if let Some(key) = &section.api_key {
            client = client.with_api_key(key.as_str());
        }
        Ok(client)
    }

    /// Set the API key.
    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Set the tenant and application identity.
    #[must_use]
    pub fn with_tenant(mut self, tenant_id: impl Into<String>, app_id: impl Into<String>) -> Self {
        self.tenant_id = tenant_id.into();
        self.app_id = app_id.into();
        self
    }

    /// Set the environment label.
    #[must_use]
    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = environment.into();
        self
    }

    /// Risk level sent when the context does not set one.
    #[must_use]
    pub fn with_default_risk_level(mut self, risk_level: impl Into<String>) -> Self {
        self.default_risk_level = risk_level.into();
        self
    }

    /// Per-call HTTP timeout.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Gateway base URL without trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn authorized(&self, builder: RequestBuilder) -> HilResult<RequestBuilder> {
        let builder = builder.timeout(self.request_timeout);
        let Some(api_key) = &self.api_key else {
            return Ok(builder);
        };
        let mut value = HeaderValue::from_str(api_key)
            .map_err(|e| HilError::Config(format!("invalid API key characters: {e}")))?;
        value.set_sensitive(true);
        Ok(builder.header(API_KEY_HEADER, value))
    }

    fn registration<'a>(
        &'a self,
        tool_name: &'a str,
        args: &'a Map<String, Value>,
        args_redacted: &'a Map<String, Value>,
        context: &'a ToolContext,
    ) -> Registration<'a> {
        Registration {
            tenant_id: &self.tenant_id,
            app_id: &self.app_id,
            agent_id: &context.agent_id,
            run_id: &context.run_id,
            step_id: &context.step_id,
            tool_name,
            tool_args: args,
            tool_args_redacted: args_redacted,
            context_summary: &context.context_summary,
            risk_level: context.risk_level_or(&self.default_risk_level),
            environment: &self.environment,
            tags: &context.tags,
            idempotency_key: context.effective_idempotency_key(),
            webhook: Webhook {
                decision_url: &context.decision_url,
            },
            metadata: &context.metadata,
            display_hints: context.display.as_ref().map(crate::context::DisplayHints::to_value),
        }
    }
}

/// Read the body, turning any non-success status into [`HilError::Remote`].
async fn success_body(response: Response, operation: &str) -> HilResult<String> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        error!(status = %status, body = %body, operation, "gateway rejected request");
        return Err(HilError::Remote {
            status: status.as_u16(),
            body,
        });
    }
    Ok(body)
}

fn parse_body<T: DeserializeOwned>(body: &str, operation: &str) -> HilResult<T> {
    serde_json::from_str(body)
        .map_err(|e| HilError::InvalidResponse(format!("{operation} response: {e}")))
}

/// Interpret an HTTP 400 from a gateway that predates immediate verdicts.
fn legacy_verdict(body: &str) -> Verdict {
    let detail = match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(map)) => match map.get("detail") {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => String::new(),
        },
        _ => body.to_owned(),
    };
    if detail.contains("DENY") {
        Verdict::Deny { reason: detail }
    } else {
        Verdict::Allow {
            reason: Some(detail),
        }
    }
}

fn verdict_for_action(action: &str) -> HilResult<Verdict> {
    let reason = format!("Policy decision: {action}");
    match action {
        "ALLOW" => Ok(Verdict::Allow {
            reason: Some(reason),
        }),
        "DENY" => Ok(Verdict::Deny { reason }),
        "REQUIRE_APPROVAL" => Err(HilError::InvalidResponse(
            "REQUIRE_APPROVAL verdict without request_id".to_owned(),
        )),
        other => {
            warn!(action = other, "unrecognized policy action, treating as allow");
            Ok(Verdict::Allow {
                reason: Some(reason),
            })
        },
    }
}

fn interpret_registration(response: RegistrationResponse) -> HilResult<Verdict> {
    let action = response.action.filter(|a| !a.is_empty());
    let request_id = response.request_id.filter(|id| !id.is_empty());
    match (action, request_id) {
        (_, Some(request_id)) => Ok(Verdict::RequireApproval {
            request_id,
            expires_at: response.expires_at,
        }),
        (Some(action), None) => verdict_for_action(&action),
        (None, None) => Err(HilError::InvalidResponse(
            "registration response carries neither action nor request_id".to_owned(),
        )),
    }
}

#[async_trait]
impl ToolInterceptor for GatewayClient {
    async fn evaluate(
        &self,
        tool_name: &str,
        args: &Map<String, Value>,
        context: &ToolContext,
    ) -> HilResult<Verdict> {
        let args_redacted = redacted(args);
        let body = self.registration(tool_name, args, &args_redacted, context);

        debug!(tool = tool_name, run_id = %context.run_id, "registering tool call");

        let response = self
            .authorized(self.http.post(self.url("/v1/requests")))?
            .json(&body)
            .send()
            .await?;

        if response.status() == StatusCode::BAD_REQUEST {
            let text = response.text().await?;
            warn!(tool = tool_name, "gateway answered with legacy 400 verdict");
            return Ok(legacy_verdict(&text));
        }

        let text = success_body(response, "register").await?;
        let verdict = interpret_registration(parse_body(&text, "registration")?)?;

        match &verdict {
            Verdict::RequireApproval { request_id, .. } => {
                info!(tool = tool_name, request_id = %request_id, "tool call awaiting approval");
            },
            other => info!(tool = tool_name, verdict = ?other, "tool call resolved by policy"),
        }
        Ok(verdict)
    }
}

#[async_trait]
impl DecisionGateway for GatewayClient {
    async fn fetch_status(&self, request_id: &str) -> HilResult<RequestSnapshot> {
        let response = self
            .authorized(self.http.get(self.url(&format!("/v1/requests/{request_id}"))))?
            .send()
            .await?;
        let text = success_body(response, "fetch_status").await?;
        parse_body(&text, "status")
    }

    async fn submit_proposal(
        &self,
        request_id: &str,
        update: &ProposalUpdate,
    ) -> HilResult<RequestSnapshot> {
        debug!(
            request_id,
            version_from = update.version_from,
            "submitting proposal"
        );
        let response = self
            .authorized(
                self.http
                    .post(self.url(&format!("/v1/requests/{request_id}/proposal"))),
            )?
            .json(update)
            .send()
            .await?;
        let text = success_body(response, "submit_proposal").await?;
        parse_body(&text, "proposal")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::DisplayHints;
    use crate::redaction::MASK;
    use crate::types::{Decision, RequestStatus};
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> GatewayClient {
        GatewayClient::new(server.uri())
            .unwrap()
            .with_api_key("test-key")
            .with_tenant("tid", "aid")
    }

    fn args(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(m) => m,
            _ => panic!("expected object"),
        }
    }

    async fn mount_registration(server: &MockServer, template: ResponseTemplate) {
        Mock::given(method("POST"))
            .and(path("/v1/requests"))
            .respond_with(template)
            .mount(server)
            .await;
    }

    async fn first_body(server: &MockServer) -> Value {
        let requests = server.received_requests().await.unwrap();
        requests[0].body_json().unwrap()
    }

    #[tokio::test]
    async fn registration_sends_full_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/requests"))
            .and(header(API_KEY_HEADER, "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "request_id": "req-abc",
                "expires_at": "2026-02-22T15:30:00Z",
            })))
            .expect(1)
            .mount(&server)
            .await;

        let ctx = ToolContext::new("bot", "r1").with_decision_url("https://hooks.example/d");
        let verdict = client(&server)
            .evaluate(
                "send_email",
                &args(json!({"to": "bob@example.com", "api_key": "sk-live"})),
                &ctx,
            )
            .await
            .unwrap();

        assert_eq!(
            verdict,
            Verdict::RequireApproval {
                request_id: "req-abc".to_owned(),
                expires_at: Some("2026-02-22T15:30:00Z".to_owned()),
            }
        );

        let body = first_body(&server).await;
        assert_eq!(body["tenant_id"], "tid");
        assert_eq!(body["app_id"], "aid");
        assert_eq!(body["agent_id"], "bot");
        assert_eq!(body["run_id"], "r1");
        assert_eq!(body["step_id"], "step");
        assert_eq!(body["tool_name"], "send_email");
        assert_eq!(body["tool_args"]["api_key"], "sk-live");
        assert_eq!(body["tool_args_redacted"]["api_key"], MASK);
        assert_eq!(body["tool_args_redacted"]["to"], "bob@example.com");
        assert_eq!(body["risk_level"], "MEDIUM");
        assert_eq!(body["environment"], "dev");
        assert_eq!(body["idempotency_key"], "r1");
        assert_eq!(body["webhook"]["decision_url"], "https://hooks.example/d");
        assert_eq!(body["metadata"], json!({}));
        assert_eq!(body["display_hints"], Value::Null);
    }

    #[tokio::test]
    async fn registration_sends_display_hints_and_metadata() {
        let server = MockServer::start().await;
        mount_registration(
            &server,
            ResponseTemplate::new(200).set_body_json(json!({"request_id": "req-1"})),
        )
        .await;

        let ctx = ToolContext::new("bot", "r1")
            .with_risk_level("HIGH")
            .with_metadata("team", "growth")
            .with_display(DisplayHints::new("Send email").with_category("comms"));
        client(&server)
            .evaluate("send_email", &Map::new(), &ctx)
            .await
            .unwrap();

        let body = first_body(&server).await;
        assert_eq!(body["risk_level"], "HIGH");
        assert_eq!(body["metadata"], json!({"team": "growth"}));
        assert_eq!(
            body["display_hints"],
            json!({"title": "Send email", "category": "comms", "sections": []})
        );
    }

    #[tokio::test]
    async fn immediate_verdicts() {
        let server = MockServer::start().await;
        mount_registration(
            &server,
            ResponseTemplate::new(200).set_body_json(json!({"action": "DENY", "request_id": null})),
        )
        .await;

        let verdict = client(&server)
            .evaluate("rm", &Map::new(), &ToolContext::default())
            .await
            .unwrap();
        assert_eq!(
            verdict,
            Verdict::Deny {
                reason: "Policy decision: DENY".to_owned()
            }
        );
    }

    #[tokio::test]
    async fn unrecognized_action_maps_to_allow() {
        let server = MockServer::start().await;
        mount_registration(
            &server,
            ResponseTemplate::new(200).set_body_json(json!({"action": "SHADOW"})),
        )
        .await;

        let verdict = client(&server)
            .evaluate("rm", &Map::new(), &ToolContext::default())
            .await
            .unwrap();
        assert_eq!(
            verdict,
            Verdict::Allow {
                reason: Some("Policy decision: SHADOW".to_owned())
            }
        );
    }

    #[tokio::test]
    async fn legacy_bad_request_deny_detail() {
        let server = MockServer::start().await;
        mount_registration(
            &server,
            ResponseTemplate::new(400).set_body_json(json!({"detail": "Policy DENY: blocked"})),
        )
        .await;

        let verdict = client(&server)
            .evaluate("rm", &Map::new(), &ToolContext::default())
            .await
            .unwrap();
        assert_eq!(
            verdict,
            Verdict::Deny {
                reason: "Policy DENY: blocked".to_owned()
            }
        );
    }

    #[tokio::test]
    async fn legacy_bad_request_plain_text_allows() {
        let server = MockServer::start().await;
        mount_registration(
            &server,
            ResponseTemplate::new(400).set_body_string("ALLOW via legacy policy"),
        )
        .await;

        let verdict = client(&server)
            .evaluate("ls", &Map::new(), &ToolContext::default())
            .await
            .unwrap();
        assert_eq!(
            verdict,
            Verdict::Allow {
                reason: Some("ALLOW via legacy policy".to_owned())
            }
        );
    }

    #[tokio::test]
    async fn server_error_is_remote() {
        let server = MockServer::start().await;
        mount_registration(&server, ResponseTemplate::new(500).set_body_string("boom")).await;

        let err = client(&server)
            .evaluate("ls", &Map::new(), &ToolContext::default())
            .await
            .unwrap_err();
        assert!(matches!(err, HilError::Remote { status: 500, ref body } if body == "boom"));
    }

    #[tokio::test]
    async fn uninterpretable_registration_is_invalid() {
        let server = MockServer::start().await;
        mount_registration(
            &server,
            ResponseTemplate::new(200).set_body_json(json!({"ok": true})),
        )
        .await;

        let err = client(&server)
            .evaluate("ls", &Map::new(), &ToolContext::default())
            .await
            .unwrap_err();
        assert!(matches!(err, HilError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn fetch_status_parses_snapshot() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/requests/req-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "REVISE_REQUESTED",
                "version": 1,
                "last_decision": "revise",
                "last_decision_revise_input": "add greeting",
            })))
            .mount(&server)
            .await;

        let snapshot = client(&server).fetch_status("req-1").await.unwrap();
        assert_eq!(snapshot.status, Some(RequestStatus::ReviseRequested));
        assert_eq!(snapshot.last_decision, Some(Decision::Revise));
        assert_eq!(
            snapshot.last_decision_revise_input.as_deref(),
            Some("add greeting")
        );
    }

    #[tokio::test]
    async fn fetch_status_unknown_id_is_remote() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/requests/missing"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({"detail": "not found"})))
            .mount(&server)
            .await;

        let err = client(&server).fetch_status("missing").await.unwrap_err();
        assert!(matches!(err, HilError::Remote { status: 404, .. }));
    }

    #[tokio::test]
    async fn proposal_without_display_hints_omits_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/requests/req-1/proposal"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"request_id": "req-1", "version": 2, "status": "PENDING"})),
            )
            .mount(&server)
            .await;

        let update = ProposalUpdate::new(1, "send_email", args(json!({"to": "alice"})))
            .with_tags(vec!["email".to_owned()]);
        let snapshot = client(&server)
            .submit_proposal("req-1", &update)
            .await
            .unwrap();
        assert_eq!(snapshot.version, Some(2));

        let body = first_body(&server).await;
        assert!(body.as_object().unwrap().get("display_hints").is_none());
        assert_eq!(body["version_from"], 1);
        assert_eq!(body["updated_tool_name"], "send_email");
        assert_eq!(body["updated_tool_args"], json!({"to": "alice"}));
        assert_eq!(body["tags"], json!(["email"]));
    }

    #[tokio::test]
    async fn proposal_forwards_display_hints_verbatim() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/requests/req-1/proposal"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"version": 2})))
            .mount(&server)
            .await;

        let hints = json!({
            "title": "Wire transfer",
            "custom": {"nested": [1, 2, {"k": null}]},
        });
        let update = ProposalUpdate::new(1, "transfer", Map::new()).with_display_hints(hints.clone());
        client(&server)
            .submit_proposal("req-1", &update)
            .await
            .unwrap();

        let body = first_body(&server).await;
        assert_eq!(body["display_hints"], hints);
    }

    #[tokio::test]
    async fn unreachable_gateway_is_transport_error() {
        let client = GatewayClient::new("http://127.0.0.1:1")
            .unwrap()
            .with_request_timeout(Duration::from_secs(2));
        let err = client.fetch_status("req-1").await.unwrap_err();
        assert!(matches!(err, HilError::Transport(_)));
    }

    #[test]
    fn from_config_strips_trailing_slash_and_hides_key() {
        let section = GatewaySection {
            base_url: "https://hil.example/".to_owned(),
            api_key: Some("secret".to_owned()),
            tenant_id: "acme".to_owned(),
            ..GatewaySection::default()
        };
        let client = GatewayClient::from_config(&section).unwrap();
        assert_eq!(client.base_url(), "https://hil.example");
        let debug = format!("{client:?}");
        assert!(debug.contains("has_api_key: true"));
        assert!(!debug.contains("secret"));
    }
}
