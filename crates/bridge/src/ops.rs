//! The fixed operation set exposed over the RPC transport.

use serde_json::{json, Value};
use weapp_core::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Launch,
    Connect,
    CheckHealth,
    NavigateTo,
    GetPageData,
    SetPageData,
    GetElement,
    TapElement,
    InputText,
    TriggerEvent,
    CallMethod,
    Evaluate,
    CallCloudFunction,
    BuildNpm,
    DeployFunctions,
    ListFunctions,
    Disconnect,
}

pub const ALL_OPERATIONS: [Operation; 17] = [
    Operation::Launch,
    Operation::Connect,
    Operation::CheckHealth,
    Operation::NavigateTo,
    Operation::GetPageData,
    Operation::SetPageData,
    Operation::GetElement,
    Operation::TapElement,
    Operation::InputText,
    Operation::TriggerEvent,
    Operation::CallMethod,
    Operation::Evaluate,
    Operation::CallCloudFunction,
    Operation::BuildNpm,
    Operation::DeployFunctions,
    Operation::ListFunctions,
    Operation::Disconnect,
];

impl Operation {
    pub fn from_name(name: &str) -> Option<Self> {
        let op = match name {
            "launch" => Self::Launch,
            "connect" => Self::Connect,
            "check_health" => Self::CheckHealth,
            "navigate_to" => Self::NavigateTo,
            "get_page_data" => Self::GetPageData,
            "set_page_data" => Self::SetPageData,
            "get_element" => Self::GetElement,
            "tap_element" => Self::TapElement,
            "input_text" => Self::InputText,
            "trigger_event" => Self::TriggerEvent,
            "call_method" => Self::CallMethod,
            "evaluate" => Self::Evaluate,
            "call_cloud_function" => Self::CallCloudFunction,
            "build_npm" => Self::BuildNpm,
            "deploy_functions" => Self::DeployFunctions,
            "list_functions" => Self::ListFunctions,
            "disconnect" => Self::Disconnect,
            _ => return None,
        };
        Some(op)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Launch => "launch",
            Self::Connect => "connect",
            Self::CheckHealth => "check_health",
            Self::NavigateTo => "navigate_to",
            Self::GetPageData => "get_page_data",
            Self::SetPageData => "set_page_data",
            Self::GetElement => "get_element",
            Self::TapElement => "tap_element",
            Self::InputText => "input_text",
            Self::TriggerEvent => "trigger_event",
            Self::CallMethod => "call_method",
            Self::Evaluate => "evaluate",
            Self::CallCloudFunction => "call_cloud_function",
            Self::BuildNpm => "build_npm",
            Self::DeployFunctions => "deploy_functions",
            Self::ListFunctions => "list_functions",
            Self::Disconnect => "disconnect",
        }
    }

    /// Connection-management operations and the health probe handle the
    /// Disconnected state themselves; everything else fails fast without one.
    pub fn requires_connection(self) -> bool {
        !matches!(
            self,
            Self::Launch | Self::Connect | Self::Disconnect | Self::CheckHealth
        )
    }

    pub fn schema(self) -> Value {
        match self {
            Self::Launch => json!({
                "name": "launch",
                "description": "Launch WeChat DevTools for a Mini Program project, attaching to an already-running instance when possible.",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "projectPath": { "type": "string", "description": "Absolute path to the Mini Program project" },
                        "toolPath": { "type": "string", "description": "Path to the WeChat DevTools CLI (optional)" },
                        "port": { "type": "integer", "description": "Automation endpoint port (default: 9420)" }
                    },
                    "required": ["projectPath"]
                }
            }),
            Self::Connect => json!({
                "name": "connect",
                "description": "Attach to a running Mini Program automation backend without launching DevTools.",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "wsEndpoint": { "type": "string", "description": "WebSocket endpoint (default: ws://127.0.0.1:9420)" }
                    },
                    "required": []
                }
            }),
            Self::CheckHealth => json!({
                "name": "check_health",
                "description": "Report connection state, current page path, network type, and recent console errors.",
                "inputSchema": { "type": "object", "properties": {}, "required": [] }
            }),
            Self::NavigateTo => json!({
                "name": "navigate_to",
                "description": "Navigate the Mini Program to a page URL.",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "url": { "type": "string", "description": "Page URL, e.g. /pages/index/index" }
                    },
                    "required": ["url"]
                }
            }),
            Self::GetPageData => json!({
                "name": "get_page_data",
                "description": "Read data of the current page, optionally narrowed to a dot-path.",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "path": { "type": "string", "description": "Dot-path into page data (optional)" }
                    },
                    "required": []
                }
            }),
            Self::SetPageData => json!({
                "name": "set_page_data",
                "description": "Merge data into the current page.",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "data": { "type": "object", "description": "Key/value pairs to set" }
                    },
                    "required": ["data"]
                }
            }),
            Self::GetElement => json!({
                "name": "get_element",
                "description": "Resolve an element by selector and inspect or act on it. Actions: info (default), attribute, style, tap, input, trigger.",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "selector": { "type": "string", "description": "WXML selector" },
                        "action": { "type": "string", "enum": ["info", "attribute", "style", "tap", "input", "trigger"] },
                        "attributeName": { "type": "string", "description": "Attribute to read (action: attribute)" },
                        "styleName": { "type": "string", "description": "Style property to read (action: style)" },
                        "value": { "type": "string", "description": "Text to input (action: input, default: empty)" },
                        "eventName": { "type": "string", "description": "Event to trigger (action: trigger)" },
                        "detail": { "type": "object", "description": "Event detail (action: trigger, default: {})" }
                    },
                    "required": ["selector"]
                }
            }),
            Self::TapElement => json!({
                "name": "tap_element",
                "description": "Tap the element matching a selector.",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "selector": { "type": "string", "description": "WXML selector" }
                    },
                    "required": ["selector"]
                }
            }),
            Self::InputText => json!({
                "name": "input_text",
                "description": "Type text into the input element matching a selector.",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "selector": { "type": "string", "description": "WXML selector" },
                        "value": { "type": "string", "description": "Text to input" }
                    },
                    "required": ["selector", "value"]
                }
            }),
            Self::TriggerEvent => json!({
                "name": "trigger_event",
                "description": "Trigger a component event on the element matching a selector.",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "selector": { "type": "string", "description": "WXML selector" },
                        "eventName": { "type": "string", "description": "Event name, e.g. tap, change" },
                        "detail": { "type": "object", "description": "Event detail object (default: {})" }
                    },
                    "required": ["selector", "eventName"]
                }
            }),
            Self::CallMethod => json!({
                "name": "call_method",
                "description": "Call a wx API method by name.",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "method": { "type": "string", "description": "Method name, e.g. showToast" },
                        "args": { "type": "array", "description": "Positional arguments (default: [])" }
                    },
                    "required": ["method"]
                }
            }),
            Self::Evaluate => json!({
                "name": "evaluate",
                "description": "Evaluate a script in the Mini Program app context.",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "script": { "type": "string", "description": "Function source to evaluate" },
                        "args": { "type": "array", "description": "Arguments passed to the function (default: [])" }
                    },
                    "required": ["script"]
                }
            }),
            Self::CallCloudFunction => json!({
                "name": "call_cloud_function",
                "description": "Invoke a cloud function from the Mini Program context.",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "name": { "type": "string", "description": "Cloud function name" },
                        "data": { "type": "object", "description": "Payload (default: {})" },
                        "config": { "type": "object", "description": "Call config, e.g. env (optional)" }
                    },
                    "required": ["name"]
                }
            }),
            Self::BuildNpm => json!({
                "name": "build_npm",
                "description": "Run the DevTools CLI npm build for a project.",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "projectPath": { "type": "string", "description": "Project path (defaults to the launched project)" },
                        "toolPath": { "type": "string", "description": "DevTools CLI path (optional)" }
                    },
                    "required": []
                }
            }),
            Self::DeployFunctions => json!({
                "name": "deploy_functions",
                "description": "Deploy cloud functions via the DevTools CLI.",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "env": { "type": "string", "description": "Cloud environment id" },
                        "names": { "type": "array", "items": { "type": "string" }, "description": "Function names to deploy" },
                        "remoteInstall": { "type": "boolean", "description": "Install npm dependencies remotely (default: false)" },
                        "projectPath": { "type": "string", "description": "Project path (defaults to the launched project)" },
                        "toolPath": { "type": "string", "description": "DevTools CLI path (optional)" }
                    },
                    "required": ["env", "names"]
                }
            }),
            Self::ListFunctions => json!({
                "name": "list_functions",
                "description": "List deployed cloud functions via the DevTools CLI.",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "env": { "type": "string", "description": "Cloud environment id" },
                        "projectPath": { "type": "string", "description": "Project path (defaults to the launched project)" },
                        "toolPath": { "type": "string", "description": "DevTools CLI path (optional)" }
                    },
                    "required": ["env"]
                }
            }),
            Self::Disconnect => json!({
                "name": "disconnect",
                "description": "Disconnect from the Mini Program automation session.",
                "inputSchema": { "type": "object", "properties": {}, "required": [] }
            }),
        }
    }
}

// ─── Argument extraction ─────────────────────────────────────────────────────

pub fn required_str<'a>(args: &'a Value, key: &str) -> Result<&'a str> {
    args.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| Error::Validation(format!("Missing required parameter: {}", key)))
}

pub fn optional_str<'a>(args: &'a Value, key: &str) -> Option<&'a str> {
    args.get(key).and_then(Value::as_str)
}

pub fn optional_port(args: &Value, key: &str) -> Result<Option<u16>> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_u64()
            .and_then(|p| u16::try_from(p).ok())
            .map(Some)
            .ok_or_else(|| Error::Validation(format!("Invalid port: {}", v))),
    }
}

pub fn optional_bool(args: &Value, key: &str) -> bool {
    args.get(key).and_then(Value::as_bool).unwrap_or(false)
}

pub fn optional_array(args: &Value, key: &str) -> Vec<Value> {
    args.get(key)
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

pub fn required_string_array(args: &Value, key: &str) -> Result<Vec<String>> {
    let values = args
        .get(key)
        .and_then(Value::as_array)
        .ok_or_else(|| Error::Validation(format!("Missing required parameter: {}", key)))?;
    values
        .iter()
        .map(|v| {
            v.as_str()
                .map(str::to_string)
                .ok_or_else(|| Error::Validation(format!("Parameter {} must be an array of strings", key)))
        })
        .collect()
}
