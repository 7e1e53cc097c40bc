// Session host over HTTP, driven through the router with `oneshot`.
//
// A scripted analyzer stands in for the external service so these tests
// can force failures and hold an analysis open to observe the busy state.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use base64::Engine;
use serde_json::{json, Value};
use tokio::sync::Notify;
use tower::ServiceExt;

use topical::analysis::{
    AnalysisRequest, AnalysisResult, ReportContext, ReportKind, SemanticRanking, TopicAnalyzer,
    TopicCandidate,
};
use topical::config::Config;
use topical::db::models::{Priority, TopicDraft};
use topical::error::TopicalError;
use topical::session::SessionHost;
use topical::web::{build_router, AppState};

/// Replays queued replies in order; once the queue is empty every call
/// returns the `energy` / `policy` pair.
#[derive(Default)]
struct ScriptedAnalyzer {
    replies: Mutex<VecDeque<Result<AnalysisResult, TopicalError>>>,
    requests: Mutex<Vec<AnalysisRequest>>,
    /// When set, `analyze` signals `started` and waits on `release`.
    hold: Option<(Arc<Notify>, Arc<Notify>)>,
}

impl ScriptedAnalyzer {
    fn push(&self, reply: Result<AnalysisResult, TopicalError>) {
        self.replies.lock().unwrap().push_back(reply);
    }

    fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

fn draft(name: &str, priority: Priority) -> TopicDraft {
    TopicDraft {
        topic_name: name.to_string(),
        priority,
        summaries: vec![format!("{name} summary")],
        related_records: vec!["Article about renewable energy policy".to_string()],
        related_topics: vec![],
    }
}

fn energy_and_policy() -> AnalysisResult {
    let mut energy = draft("energy", Priority::High);
    energy.related_topics = vec!["policy".to_string()];
    AnalysisResult {
        topics: vec![energy, draft("policy", Priority::Medium)],
    }
}

#[async_trait]
impl TopicAnalyzer for ScriptedAnalyzer {
    fn model_name(&self) -> &str {
        "scripted"
    }

    async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResult, TopicalError> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some((started, release)) = &self.hold {
            started.notify_one();
            release.notified().await;
        }
        let next = self.replies.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(energy_and_policy()))
    }

    async fn write_report(
        &self,
        context: &ReportContext,
        kind: ReportKind,
    ) -> Result<String, TopicalError> {
        Ok(format!("{kind} report on {}", context.topic_name))
    }

    async fn rank_topics(
        &self,
        _query: &str,
        candidates: &[TopicCandidate],
        _max_results: usize,
    ) -> Result<SemanticRanking, TopicalError> {
        Ok(SemanticRanking {
            recommended_topics: candidates.iter().map(|c| c.topic_id.clone()).collect(),
            reasoning: "all of them".to_string(),
            confidence: 0.8,
        })
    }
}

fn test_config(extra: &[(&str, &str)]) -> Config {
    let mut vars: HashMap<String, String> = HashMap::from([
        ("TOPICAL_API_KEY".to_string(), "sk-test".to_string()),
        (
            "TOPICAL_CONFIG".to_string(),
            "/nonexistent/topical/api_config.json".to_string(),
        ),
    ]);
    for (k, v) in extra {
        vars.insert(k.to_string(), v.to_string());
    }
    Config::from_lookup(|key| vars.get(key).cloned()).unwrap()
}

fn app_with(analyzer: Arc<ScriptedAnalyzer>, config: Config) -> Router {
    let db = topical::db::in_memory().unwrap();
    let session = Arc::new(SessionHost::new(Arc::new(config), analyzer, db));
    build_router(AppState::new(session))
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap_or(Value::Null)
    };
    (status, json)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn analyze_text(group: &str, text: &str) -> Request<Body> {
    post_json("/api/analyze", json!({ "group_name": group, "text": text }))
}

fn topic_names(outcome: &Value) -> Vec<String> {
    outcome["new_topics"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["topic_name"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn renewable_energy_scenario_renders_exact_topics() {
    let analyzer = Arc::new(ScriptedAnalyzer::default());
    let app = app_with(analyzer.clone(), test_config(&[]));

    let (status, body) = send(
        &app,
        analyze_text("news", "Article about renewable energy policy"),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "body: {body}");
    assert_eq!(topic_names(&body), vec!["energy", "policy"]);
    assert_eq!(body["record_count"], 1);
    assert_eq!(body["group"]["group_id"], "group_001");
    assert_eq!(body["new_topics"][0]["topic_id"], "topic_001_01");
    assert_eq!(body["new_topics"][0]["summaries"][0], "energy summary");
    assert_eq!(body["new_topics"][0]["related_topics"][0], "policy");

    let sent = analyzer.requests.lock().unwrap()[0].clone();
    assert_eq!(sent.records, vec!["Article about renewable energy policy"]);
    assert!(sent.existing_topics.is_empty());
}

#[tokio::test]
async fn service_failure_is_reported_and_next_request_works() {
    let analyzer = Arc::new(ScriptedAnalyzer::default());
    analyzer.push(Err(TopicalError::Service(
        "service returned 500 Internal Server Error: boom".to_string(),
    )));
    let app = app_with(analyzer.clone(), test_config(&[]));

    let (status, body) = send(&app, analyze_text("news", "first attempt at this")).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["kind"], "service");
    assert!(body["error"].as_str().unwrap().contains("500"));

    let (_, status_body) = send(&app, get("/api/status")).await;
    assert_eq!(status_body["analysis"]["running"], false);
    assert!(status_body["analysis"]["last_error"]
        .as_str()
        .unwrap()
        .contains("boom"));

    let (status, body) = send(&app, analyze_text("news", "second attempt at this")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(topic_names(&body), vec!["energy", "policy"]);

    let (_, status_body) = send(&app, get("/api/status")).await;
    assert!(status_body["analysis"]["last_error"].is_null());
    assert_eq!(status_body["analysis"]["completed"], 1);
    assert_eq!(status_body["recent_runs"].as_array().unwrap().len(), 2);
    assert_eq!(status_body["recent_runs"][0]["outcome"], "ok");
    assert_eq!(status_body["recent_runs"][1]["outcome"], "service");
}

#[tokio::test]
async fn second_submission_while_running_is_busy() {
    let started = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let analyzer = Arc::new(ScriptedAnalyzer {
        hold: Some((started.clone(), release.clone())),
        ..ScriptedAnalyzer::default()
    });
    let app = app_with(analyzer.clone(), test_config(&[]));

    let first = tokio::spawn({
        let app = app.clone();
        async move { send(&app, analyze_text("news", "long running analysis")).await }
    });
    started.notified().await;

    let (status, body) = send(&app, analyze_text("other", "should be rejected")).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["kind"], "busy");

    let (_, status_body) = send(&app, get("/api/status")).await;
    assert_eq!(status_body["analysis"]["running"], true);
    assert_eq!(status_body["analysis"]["group_name"], "news");

    release.notify_one();
    let (status, _) = first.await.unwrap();
    assert_eq!(status, StatusCode::OK);
    assert_eq!(analyzer.calls(), 1);
}

#[tokio::test]
async fn empty_input_is_rejected_before_the_service() {
    let analyzer = Arc::new(ScriptedAnalyzer::default());
    let app = app_with(analyzer.clone(), test_config(&[]));

    let (status, body) = send(&app, analyze_text("news", "  \n ok \n\n")).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["kind"], "validation");

    let (status, _) = send(
        &app,
        post_json("/api/analyze", json!({ "group_name": "news" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    assert_eq!(analyzer.calls(), 0);
}

#[tokio::test]
async fn uploaded_document_is_decoded() {
    let analyzer = Arc::new(ScriptedAnalyzer::default());
    let app = app_with(analyzer.clone(), test_config(&[]));

    let data = base64::engine::general_purpose::STANDARD
        .encode("Solar panels on every roof\nWind farm approvals\nok\n");
    let (status, body) = send(
        &app,
        post_json(
            "/api/analyze",
            json!({
                "group_name": "news",
                "file": { "file_name": "chat.txt", "data_base64": data }
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "body: {body}");
    assert_eq!(body["record_count"], 2);

    let (status, body) = send(
        &app,
        post_json(
            "/api/analyze",
            json!({
                "group_name": "news",
                "file": { "file_name": "chat.exe", "data_base64": data }
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["kind"], "validation");
    assert_eq!(analyzer.calls(), 1);
}

#[tokio::test]
async fn identical_resubmission_does_not_reload_configuration() {
    let lookups = Arc::new(AtomicUsize::new(0));
    let vars: HashMap<&str, &str> = HashMap::from([
        ("TOPICAL_API_KEY", "sk-test"),
        ("TOPICAL_CONFIG", "/nonexistent/topical/api_config.json"),
    ]);
    let config = Config::from_lookup({
        let lookups = lookups.clone();
        move |key: &str| {
            lookups.fetch_add(1, Ordering::SeqCst);
            vars.get(key).map(|v| v.to_string())
        }
    })
    .unwrap();
    let after_load = lookups.load(Ordering::SeqCst);

    let analyzer = Arc::new(ScriptedAnalyzer::default());
    let app = app_with(analyzer.clone(), config);

    let (first_status, first) = send(&app, analyze_text("news", "same input twice")).await;
    let (second_status, second) = send(&app, analyze_text("news", "same input twice")).await;
    assert_eq!(first_status, StatusCode::OK);
    assert_eq!(second_status, StatusCode::OK);
    assert_eq!(topic_names(&first), topic_names(&second));

    assert_eq!(lookups.load(Ordering::SeqCst), after_load);
    assert_eq!(analyzer.calls(), 2);

    // The second run appends to the same group and sees the first run's topics
    assert_eq!(second["group"]["group_id"], "group_001");
    assert_eq!(second["new_topics"][0]["topic_id"], "topic_001_03");
    let sent = analyzer.requests.lock().unwrap()[1].clone();
    assert_eq!(sent.existing_topics.len(), 2);
}

#[test]
fn missing_key_is_a_configuration_error() {
    let config = Config::from_lookup(|key| match key {
        "TOPICAL_CONFIG" => Some("/nonexistent/topical/api_config.json".to_string()),
        _ => None,
    })
    .unwrap();
    let err = config.require_api_key().unwrap_err();
    assert!(matches!(err, TopicalError::Configuration(_)));
    assert_eq!(err.kind(), "configuration");
}

#[tokio::test]
async fn topics_are_listed_by_priority_and_can_be_edited() {
    let analyzer = Arc::new(ScriptedAnalyzer::default());
    analyzer.push(Ok(AnalysisResult {
        topics: vec![
            draft("budget", Priority::Low),
            draft("outage", Priority::High),
            draft("hiring", Priority::Medium),
        ],
    }));
    let app = app_with(analyzer, test_config(&[]));
    send(&app, analyze_text("ops", "weekly ops chat log")).await;

    let (status, topics) = send(&app, get("/api/topics")).await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = topics
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["topic_name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["outage", "hiring", "budget"]);
    assert_eq!(topics[0]["group_name"], "ops");

    let (_, high) = send(&app, get("/api/topics?priority=high")).await;
    assert_eq!(high.as_array().unwrap().len(), 1);

    let request = Request::builder()
        .method("PATCH")
        .uri("/api/topics/topic_001_02")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({ "summary": "Database failover" }).to_string()))
        .unwrap();
    let (status, topic) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(topic["summaries"][0], "Database failover");

    let (status, topic) = send(
        &app,
        post_json(
            "/api/topics/topic_001_02/related",
            json!({ "related_topic": "hiring" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(topic["related_topics"], json!(["hiring"]));

    let (status, body) = send(
        &app,
        post_json(
            "/api/topics/topic_001_02/related",
            json!({ "related_topic": "no such topic" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], "not_found");

    let (_, graph) = send(&app, get("/api/graph")).await;
    assert_eq!(graph["nodes"].as_array().unwrap().len(), 3);
    assert_eq!(graph["edges"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn report_search_export_and_delete() {
    let analyzer = Arc::new(ScriptedAnalyzer::default());
    let app = app_with(analyzer, test_config(&[]));
    send(&app, analyze_text("news", "Article about renewable energy policy")).await;

    let (status, report) = send(
        &app,
        post_json("/api/topics/topic_001_01/report", json!({ "kind": "detailed" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["content"], "detailed report on energy");
    assert!(report["exported_to"].is_null());

    // No kind given: detailed
    let (status, report) = send(
        &app,
        post_json("/api/topics/topic_001_01/report", json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["content"], "detailed report on energy");

    let (status, _) = send(
        &app,
        post_json("/api/topics/topic_001_01/report", json!({ "kind": "summary" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &app,
        post_json("/api/topics/topic_001_01/report", json!({ "kind": "poem" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, results) = send(&app, get("/api/search?q=energy&ai=true")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(results["keyword_results"][0]["topic"]["topic_name"], "energy");
    assert_eq!(results["ai_results"].as_array().unwrap().len(), 2);
    assert!(results["ai_error"].is_null());

    let (status, _) = send(&app, get("/api/search?q=%20")).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, export) = send(&app, get("/api/groups/group_001/export")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(export["group_data"]["group_name"], "news");
    assert!(export["export_time"].is_string());

    let delete = Request::builder()
        .method("DELETE")
        .uri("/api/groups/group_001")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, delete).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, get("/api/groups/group_001")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (_, groups) = send(&app, get("/api/groups")).await;
    assert_eq!(groups, json!([]));
}

#[tokio::test]
async fn password_protects_the_api() {
    let analyzer = Arc::new(ScriptedAnalyzer::default());
    let app = app_with(
        analyzer,
        test_config(&[
            ("TOPICAL_WEB_PASSWORD", "hunter22"),
            ("TOPICAL_SESSION_SECRET", "test-secret"),
        ]),
    );

    let (status, _) = send(&app, get("/api/status")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &app,
        post_json("/api/login", json!({ "password": "wrong" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let response = app
        .clone()
        .oneshot(post_json("/api/login", json!({ "password": "hunter22" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap()
        .split(';')
        .next()
        .unwrap()
        .to_string();

    let request = Request::builder()
        .uri("/api/status")
        .header(header::COOKIE, cookie)
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["api_key_configured"], true);
    assert!(!body.to_string().contains("sk-test"));
}

#[tokio::test]
async fn unknown_paths() {
    let app = app_with(Arc::new(ScriptedAnalyzer::default()), test_config(&[]));

    let (status, body) = send(&app, get("/api/nope")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].is_string());

    let response = app.clone().oneshot(get("/some/page")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "text/html; charset=utf-8"
    );
}
