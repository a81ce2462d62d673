//! Session health diagnostics, best-effort per field.

use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use weapp_automator::{ConnectionManager, Session};

/// Script evaluated in the app context; its own failure path resolves the
/// sentinel instead of raising, so the probe never throws backend-side.
const NETWORK_PROBE: &str = "() => new Promise((resolve) => wx.getNetworkType({ \
     success: (res) => resolve(res.networkType), \
     fail: () => resolve('unknown') }))";

pub const NETWORK_UNKNOWN: &str = "unknown";
pub const NO_RECENT_ERRORS: &str = "No recent console errors";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_type: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub recent_console_errors: Vec<String>,
}

/// Aggregate page location, network status, and recent error events. Each
/// field degrades independently; no single backend failure aborts the report.
pub async fn evaluate(manager: &ConnectionManager) -> HealthReport {
    let Ok(session) = manager.session() else {
        return HealthReport {
            connected: false,
            page_path: None,
            network_type: None,
            recent_console_errors: Vec::new(),
        };
    };

    let page_path = match session.current_page().await {
        Ok(page) => page.path(),
        Err(e) => format!("error: {}", e),
    };

    let network_type = network_probe(&session).await;

    let mut recent_console_errors = manager.log().lock().await.recent_errors(5);
    if recent_console_errors.is_empty() {
        recent_console_errors.push(NO_RECENT_ERRORS.to_string());
    }

    HealthReport {
        connected: true,
        page_path: Some(page_path),
        network_type: Some(network_type),
        recent_console_errors,
    }
}

async fn network_probe(session: &Arc<dyn Session>) -> String {
    match session.evaluate(NETWORK_PROBE, &[]).await {
        Ok(Value::String(kind)) => kind,
        Ok(_) | Err(_) => NETWORK_UNKNOWN.to_string(),
    }
}
