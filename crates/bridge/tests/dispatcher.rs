//! End-to-end dispatch tests against stubbed backend capabilities.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use weapp_automator::{
    Connector, Element, LaunchOptions, Page, ProcessRunner, Session, SessionEvent,
};
use weapp_bridge::Dispatcher;
use weapp_core::{Config, Error, Result};

#[derive(Default)]
struct StubElement {
    taps: AtomicUsize,
    inputs: Mutex<Vec<String>>,
    triggers: Mutex<Vec<(String, Value)>>,
}

#[async_trait]
impl Element for StubElement {
    async fn text(&self) -> Result<Value> {
        Ok(json!("hello"))
    }
    async fn size(&self) -> Result<Value> {
        Ok(json!({ "width": 100, "height": 40 }))
    }
    async fn offset(&self) -> Result<Value> {
        Ok(json!({ "left": 0, "top": 120 }))
    }
    async fn attribute(&self, name: &str) -> Result<Value> {
        Ok(json!(format!("attr:{}", name)))
    }
    async fn style(&self, name: &str) -> Result<Value> {
        Ok(json!(format!("style:{}", name)))
    }
    async fn tap(&self) -> Result<()> {
        self.taps.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
    async fn input(&self, value: &str) -> Result<()> {
        self.inputs.lock().unwrap().push(value.to_string());
        Ok(())
    }
    async fn trigger(&self, event_name: &str, detail: Value) -> Result<()> {
        self.triggers
            .lock()
            .unwrap()
            .push((event_name.to_string(), detail));
        Ok(())
    }
}

struct StubPage {
    data: Mutex<Value>,
    element: Arc<StubElement>,
    queries: AtomicUsize,
}

impl StubPage {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            data: Mutex::new(json!({})),
            element: Arc::new(StubElement::default()),
            queries: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl Page for StubPage {
    fn path(&self) -> String {
        "pages/index/index".to_string()
    }
    async fn data(&self, path: Option<&str>) -> Result<Value> {
        let data = self.data.lock().unwrap().clone();
        Ok(match path {
            Some(key) => data.get(key).cloned().unwrap_or(Value::Null),
            None => data,
        })
    }
    async fn set_data(&self, data: Value) -> Result<()> {
        *self.data.lock().unwrap() = data;
        Ok(())
    }
    async fn query(&self, selector: &str) -> Result<Option<Arc<dyn Element>>> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        if selector == ".missing" {
            Ok(None)
        } else {
            Ok(Some(self.element.clone()))
        }
    }
}

struct StubSession {
    page: Arc<StubPage>,
    wx_calls: Mutex<Vec<(String, Vec<Value>)>>,
    eval_result: Mutex<Value>,
    backend_calls: AtomicUsize,
}

impl StubSession {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            page: StubPage::new(),
            wx_calls: Mutex::new(Vec::new()),
            eval_result: Mutex::new(Value::Null),
            backend_calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl Session for StubSession {
    async fn current_page(&self) -> Result<Arc<dyn Page>> {
        self.backend_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.page.clone())
    }
    async fn navigate_to(&self, url: &str) -> Result<Value> {
        self.backend_calls.fetch_add(1, Ordering::SeqCst);
        Ok(json!(format!("Navigated to: {}", url)))
    }
    async fn evaluate(&self, _script: &str, _args: &[Value]) -> Result<Value> {
        self.backend_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.eval_result.lock().unwrap().clone())
    }
    async fn call_wx_method(&self, method: &str, args: &[Value]) -> Result<Value> {
        self.backend_calls.fetch_add(1, Ordering::SeqCst);
        self.wx_calls
            .lock()
            .unwrap()
            .push((method.to_string(), args.to_vec()));
        Ok(json!({ "errMsg": format!("{}:ok", method) }))
    }
    async fn disconnect(&self) -> Result<()> {
        Ok(())
    }
    fn subscribe(&self) -> mpsc::UnboundedReceiver<SessionEvent> {
        let (_tx, rx) = mpsc::unbounded_channel();
        rx
    }
}

struct StubConnector {
    attach_ok: bool,
    session: Arc<StubSession>,
    launches: AtomicUsize,
}

impl StubConnector {
    fn new(attach_ok: bool) -> Arc<Self> {
        Arc::new(Self {
            attach_ok,
            session: StubSession::new(),
            launches: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl Connector for StubConnector {
    async fn connect(&self, _ws_endpoint: &str) -> Result<Arc<dyn Session>> {
        if self.attach_ok {
            Ok(self.session.clone())
        } else {
            Err(Error::Backend("connection refused".to_string()))
        }
    }
    async fn launch(&self, _opts: &LaunchOptions) -> Result<Arc<dyn Session>> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        Ok(self.session.clone())
    }
}

struct StubRunner {
    runs: Mutex<Vec<(PathBuf, Vec<String>)>>,
}

impl StubRunner {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            runs: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl ProcessRunner for StubRunner {
    async fn run(&self, program: &Path, args: &[String]) -> Result<String> {
        self.runs
            .lock()
            .unwrap()
            .push((program.to_path_buf(), args.to_vec()));
        Ok("cli output".to_string())
    }
}

fn dispatcher(attach_ok: bool) -> (Dispatcher, Arc<StubConnector>, Arc<StubRunner>) {
    let connector = StubConnector::new(attach_ok);
    let runner = StubRunner::new();
    let dispatcher = Dispatcher::new(connector.clone(), runner.clone(), Config::default());
    (dispatcher, connector, runner)
}

async fn connected_dispatcher() -> (Dispatcher, Arc<StubConnector>, Arc<StubRunner>) {
    let (mut d, connector, runner) = dispatcher(true);
    let env = d.dispatch("launch", &json!({ "projectPath": "/proj" })).await;
    assert!(!env.is_error, "launch failed: {}", env.content);
    (d, connector, runner)
}

#[tokio::test]
async fn test_disconnected_operations_fail_without_backend_calls() {
    let (mut d, connector, _) = dispatcher(true);

    let env = d
        .dispatch("navigate_to", &json!({ "url": "/pages/index/index" }))
        .await;
    assert!(env.is_error);
    assert_eq!(
        env.content,
        "Not connected to Mini Program. Use launch or connect first."
    );
    assert_eq!(connector.session.backend_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_unknown_tool_is_an_error_envelope() {
    let (mut d, _, _) = dispatcher(true);
    let env = d.dispatch("frobnicate", &json!({})).await;
    assert!(env.is_error);
    assert_eq!(env.content, "Unknown tool: frobnicate");
}

#[tokio::test]
async fn test_launch_attaches_to_running_backend() {
    let (mut d, connector, _) = dispatcher(true);
    let env = d.dispatch("launch", &json!({ "projectPath": "/proj" })).await;
    assert!(!env.is_error);
    assert_eq!(env.content, "Connected to an already-running Mini Program backend");
    assert_eq!(connector.launches.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_launch_falls_back_to_spawning_devtools() {
    let (mut d, connector, runner) = dispatcher(false);
    let env = d.dispatch("launch", &json!({ "projectPath": "/proj" })).await;
    assert!(!env.is_error);
    assert_eq!(env.content, "Launched WeChat DevTools for project /proj");
    assert_eq!(connector.launches.load(Ordering::SeqCst), 1);

    // The launch context supplies the project for later CLI operations.
    let env = d
        .dispatch("build_npm", &json!({ "toolPath": "/opt/cli" }))
        .await;
    assert!(!env.is_error, "{}", env.content);
    let runs = runner.runs.lock().unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].0, PathBuf::from("/opt/cli"));
    assert_eq!(runs[0].1, vec!["build-npm", "--project", "/proj"]);
}

#[tokio::test]
async fn test_launch_while_connected_is_rejected() {
    let (mut d, _, _) = connected_dispatcher().await;
    let env = d.dispatch("launch", &json!({ "projectPath": "/proj" })).await;
    assert!(env.is_error);
    assert_eq!(
        env.content,
        "Already connected to Mini Program. Use disconnect first."
    );
}

#[tokio::test]
async fn test_launch_requires_project_path() {
    let (mut d, _, _) = dispatcher(true);
    let env = d.dispatch("launch", &json!({})).await;
    assert!(env.is_error);
    assert_eq!(env.content, "Missing required parameter: projectPath");
}

#[tokio::test]
async fn test_connect_reports_endpoint() {
    let (mut d, _, _) = dispatcher(true);
    let env = d.dispatch("connect", &json!({})).await;
    assert!(!env.is_error);
    assert_eq!(env.content, "Connected to Mini Program at ws://127.0.0.1:9420");
}

#[tokio::test]
async fn test_page_data_round_trip() {
    let (mut d, _, _) = connected_dispatcher().await;

    let env = d
        .dispatch("set_page_data", &json!({ "data": { "a": 1 } }))
        .await;
    assert!(!env.is_error);
    assert_eq!(env.content, "Page data updated");

    let env = d.dispatch("get_page_data", &json!({})).await;
    assert!(!env.is_error);
    assert!(env.content.contains("\"a\": 1"));

    let env = d.dispatch("get_page_data", &json!({ "path": "a" })).await;
    assert!(!env.is_error);
    assert_eq!(env.content, "1");
}

#[tokio::test]
async fn test_set_page_data_requires_object() {
    let (mut d, _, _) = connected_dispatcher().await;
    let env = d.dispatch("set_page_data", &json!({ "data": 7 })).await;
    assert!(env.is_error);
    assert_eq!(env.content, "Missing required parameter: data");
}

#[tokio::test]
async fn test_get_element_info_bundle() {
    let (mut d, _, _) = connected_dispatcher().await;
    let env = d.dispatch("get_element", &json!({ "selector": ".btn" })).await;
    assert!(!env.is_error);
    assert!(env.content.contains("\"text\": \"hello\""));
    assert!(env.content.contains("\"width\": 100"));
    assert!(env.content.contains("\"top\": 120"));
}

#[tokio::test]
async fn test_get_element_attribute_requires_name_before_lookup() {
    let (mut d, connector, _) = connected_dispatcher().await;
    let env = d
        .dispatch("get_element", &json!({ "selector": ".btn", "action": "attribute" }))
        .await;
    assert!(env.is_error);
    assert_eq!(env.content, "Missing required parameter: attributeName");
    assert_eq!(connector.session.page.queries.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_element_not_found_names_the_selector() {
    let (mut d, _, _) = connected_dispatcher().await;
    let env = d
        .dispatch("tap_element", &json!({ "selector": ".missing" }))
        .await;
    assert!(env.is_error);
    assert_eq!(env.content, "Element not found: .missing");
}

#[tokio::test]
async fn test_tap_element() {
    let (mut d, connector, _) = connected_dispatcher().await;
    let env = d.dispatch("tap_element", &json!({ "selector": ".btn" })).await;
    assert!(!env.is_error);
    assert_eq!(env.content, "Tapped element: .btn");
    assert_eq!(
        connector.session.page.element.taps.load(Ordering::SeqCst),
        1
    );
}

#[tokio::test]
async fn test_input_text_requires_value() {
    let (mut d, _, _) = connected_dispatcher().await;
    let env = d.dispatch("input_text", &json!({ "selector": ".field" })).await;
    assert!(env.is_error);
    assert_eq!(env.content, "Missing required parameter: value");
}

#[tokio::test]
async fn test_input_text_delivers_value() {
    let (mut d, connector, _) = connected_dispatcher().await;
    let env = d
        .dispatch("input_text", &json!({ "selector": ".field", "value": "hi" }))
        .await;
    assert!(!env.is_error);
    assert_eq!(env.content, "Input sent to: .field");
    assert_eq!(
        *connector.session.page.element.inputs.lock().unwrap(),
        vec!["hi".to_string()]
    );
}

#[tokio::test]
async fn test_trigger_event_defaults_detail() {
    let (mut d, connector, _) = connected_dispatcher().await;
    let env = d
        .dispatch("trigger_event", &json!({ "selector": ".btn", "eventName": "longpress" }))
        .await;
    assert!(!env.is_error);
    assert_eq!(env.content, "Triggered longpress on: .btn");
    let triggers = connector.session.page.element.triggers.lock().unwrap();
    assert_eq!(triggers[0], ("longpress".to_string(), json!({})));
}

#[tokio::test]
async fn test_evaluate_null_renders_undefined() {
    let (mut d, _, _) = connected_dispatcher().await;
    let env = d
        .dispatch("evaluate", &json!({ "script": "() => undefined" }))
        .await;
    assert!(!env.is_error);
    assert_eq!(env.content, "undefined");
}

#[tokio::test]
async fn test_call_method_forwards_args() {
    let (mut d, connector, _) = connected_dispatcher().await;
    let env = d
        .dispatch(
            "call_method",
            &json!({ "method": "showToast", "args": [{ "title": "hi" }] }),
        )
        .await;
    assert!(!env.is_error);
    let calls = connector.session.wx_calls.lock().unwrap();
    assert_eq!(calls[0].0, "showToast");
    assert_eq!(calls[0].1, vec![json!({ "title": "hi" })]);
}

#[tokio::test]
async fn test_call_cloud_function_wraps_call() {
    let (mut d, connector, _) = connected_dispatcher().await;
    let env = d
        .dispatch(
            "call_cloud_function",
            &json!({ "name": "login", "data": { "uid": 7 } }),
        )
        .await;
    assert!(!env.is_error);
    let calls = connector.session.wx_calls.lock().unwrap();
    assert_eq!(calls[0].0, "cloud.callFunction");
    assert_eq!(calls[0].1, vec![json!({ "name": "login", "data": { "uid": 7 } })]);
}

#[tokio::test]
async fn test_call_cloud_function_defaults_data() {
    let (mut d, connector, _) = connected_dispatcher().await;
    d.dispatch("call_cloud_function", &json!({ "name": "sync" })).await;
    let calls = connector.session.wx_calls.lock().unwrap();
    assert_eq!(calls[0].1, vec![json!({ "name": "sync", "data": {} })]);
}

#[tokio::test]
async fn test_check_health_while_disconnected() {
    let (mut d, _, _) = dispatcher(true);
    let env = d.dispatch("check_health", &json!({})).await;
    assert!(!env.is_error);
    assert_eq!(
        serde_json::from_str::<Value>(&env.content).expect("json"),
        json!({ "connected": false })
    );
}

#[tokio::test]
async fn test_check_health_while_connected() {
    let (mut d, connector, _) = connected_dispatcher().await;
    *connector.session.eval_result.lock().unwrap() = json!("wifi");

    let env = d.dispatch("check_health", &json!({})).await;
    assert!(!env.is_error);
    let report: Value = serde_json::from_str(&env.content).expect("json");
    assert_eq!(report["connected"], true);
    assert_eq!(report["pagePath"], "pages/index/index");
    assert_eq!(report["networkType"], "wifi");
    assert_eq!(report["recentConsoleErrors"][0], "No recent console errors");
}

#[tokio::test]
async fn test_deploy_functions_exact_argument_order() {
    let (mut d, _, runner) = connected_dispatcher().await;
    let env = d
        .dispatch(
            "deploy_functions",
            &json!({
                "env": "prod-1",
                "names": ["login", "sync"],
                "remoteInstall": true,
                "toolPath": "/opt/cli",
            }),
        )
        .await;
    assert!(!env.is_error, "{}", env.content);
    assert_eq!(env.content, "cli output");
    let runs = runner.runs.lock().unwrap();
    assert_eq!(
        runs[0].1,
        vec![
            "cloud",
            "functions",
            "deploy",
            "--env",
            "prod-1",
            "--names",
            "login,sync",
            "--project",
            "/proj",
            "--remote-npm-install",
        ]
    );
}

#[tokio::test]
async fn test_deploy_without_project_path_spawns_nothing() {
    let (mut d, _, runner) = dispatcher(true);
    // Connected via attach: no launch context, so no recorded project path.
    d.dispatch("connect", &json!({})).await;

    let env = d
        .dispatch(
            "deploy_functions",
            &json!({ "env": "dev", "names": ["login"], "toolPath": "/opt/cli" }),
        )
        .await;
    assert!(env.is_error);
    assert!(env.content.contains("Project path is required"));
    assert!(runner.runs.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_cli_operations_require_connection() {
    let (mut d, _, runner) = dispatcher(true);
    let env = d
        .dispatch("build_npm", &json!({ "projectPath": "/proj", "toolPath": "/opt/cli" }))
        .await;
    assert!(env.is_error);
    assert_eq!(
        env.content,
        "Not connected to Mini Program. Use launch or connect first."
    );
    assert!(runner.runs.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_list_functions() {
    let (mut d, _, runner) = connected_dispatcher().await;
    let env = d
        .dispatch("list_functions", &json!({ "env": "dev", "toolPath": "/opt/cli" }))
        .await;
    assert!(!env.is_error);
    let runs = runner.runs.lock().unwrap();
    assert_eq!(
        runs[0].1,
        vec!["cloud", "functions", "list", "--env", "dev", "--project", "/proj"]
    );
}

#[tokio::test]
async fn test_disconnect_is_informational_when_idle() {
    let (mut d, _, _) = connected_dispatcher().await;

    let env = d.dispatch("disconnect", &json!({})).await;
    assert!(!env.is_error);
    assert_eq!(env.content, "Disconnected from Mini Program");

    let env = d.dispatch("disconnect", &json!({})).await;
    assert!(!env.is_error);
    assert_eq!(env.content, "Already disconnected");
}

#[tokio::test]
async fn test_navigate_to() {
    let (mut d, _, _) = connected_dispatcher().await;
    let env = d
        .dispatch("navigate_to", &json!({ "url": "/pages/detail/detail?id=1" }))
        .await;
    assert!(!env.is_error);
    assert_eq!(env.content, "Navigated to: /pages/detail/detail?id=1");
}
