pub(crate) mod invoker;
pub(crate) mod protocol;
pub(crate) mod tools;
pub(crate) mod transport;

use invoker::{InvokeError, ToolInvoker};
use protocol::{JsonRpcError, JsonRpcRequest, JsonRpcResponse};
use serde_json::{Value, json};
use tools::ToolRegistry;

use crate::backend::Backend;

pub(crate) const PROTOCOL_VERSION: &str = "2024-11-05";
pub(crate) const SERVER_NAME: &str = "modelbridge";

/// Methods the server routes; everything else is `Unknown`
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Method<'a> {
    Initialize,
    ToolsList,
    ToolsCall,
    Unknown(&'a str),
}

impl<'a> Method<'a> {
    pub fn parse(method: &'a str) -> Self {
        match method {
            "initialize" => Method::Initialize,
            "tools/list" => Method::ToolsList,
            "tools/call" => Method::ToolsCall,
            other => Method::Unknown(other),
        }
    }
}

/// MCP Server implementation
pub(crate) struct McpServer<B> {
    registry: ToolRegistry,
    invoker: ToolInvoker<B>,
}

impl<B: Backend> McpServer<B> {
    pub fn new(registry: ToolRegistry, invoker: ToolInvoker<B>) -> Self {
        Self { registry, invoker }
    }

    /// Handle incoming JSON-RPC request; always yields exactly one response
    pub async fn handle_request(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        let id = request.response_id();
        tracing::debug!(method = %request.method, id = %id, "dispatching request");

        let result = match Method::parse(&request.method) {
            Method::Initialize => Ok(self.handle_initialize()),
            Method::ToolsList => Ok(json!({ "tools": self.registry.descriptors() })),
            Method::ToolsCall => self.handle_tools_call(&request.params()).await,
            Method::Unknown(method) => Err(JsonRpcError::method_not_found(method)),
        };

        match result {
            Ok(value) => JsonRpcResponse::success(id, value),
            Err(error) => JsonRpcResponse::error(id, error),
        }
    }

    /// Handle initialize request
    fn handle_initialize(&self) -> Value {
        json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {
                "tools": {}
            },
            "serverInfo": {
                "name": SERVER_NAME,
                "version": env!("CARGO_PKG_VERSION")
            }
        })
    }

    /// Handle tools/call request, converting invoker failures into protocol errors
    async fn handle_tools_call(&self, params: &Value) -> Result<Value, JsonRpcError> {
        let name = params.get("name").and_then(|v| v.as_str());
        let arguments = params.get("arguments").cloned().unwrap_or(json!({}));

        let outcome = match name {
            Some(name) => self.invoker.invoke(&self.registry, name, &arguments).await,
            None => Err(InvokeError::UnknownTool(
                params.get("name").map_or_else(|| "<missing>".to_string(), Value::to_string),
            )),
        };

        match outcome {
            Ok(text) => Ok(json!({
                "content": [{
                    "type": "text",
                    "text": text
                }]
            })),
            Err(e) => Err(JsonRpcError::application(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use invoker::tests::StubBackend;
    use protocol::{Payload, parse_line};
    use std::time::Duration;

    fn server(backend: StubBackend) -> McpServer<StubBackend> {
        McpServer::new(
            ToolRegistry::new(),
            ToolInvoker::new(backend, Duration::from_secs(5)),
        )
    }

    async fn call(server: &McpServer<StubBackend>, line: &str) -> Value {
        let request = parse_line(line).unwrap();
        serde_json::to_value(server.handle_request(request).await).unwrap()
    }

    #[test]
    fn test_method_parse() {
        assert_eq!(Method::parse("initialize"), Method::Initialize);
        assert_eq!(Method::parse("tools/list"), Method::ToolsList);
        assert_eq!(Method::parse("tools/call"), Method::ToolsCall);
        assert_eq!(Method::parse("shutdown"), Method::Unknown("shutdown"));
    }

    #[tokio::test]
    async fn test_initialize_is_constant() {
        let server = server(StubBackend::replying(""));
        let line = r#"{"jsonrpc":"2.0","id":1,"method":"initialize"}"#;
        let first = call(&server, line).await;
        let second = call(&server, line).await;

        assert_eq!(first["id"], json!(1));
        assert_eq!(first["result"]["protocolVersion"], json!(PROTOCOL_VERSION));
        assert_eq!(first["result"]["serverInfo"]["name"], json!("modelbridge"));
        assert!(first["result"]["capabilities"]["tools"].is_object());
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_tools_list_is_stable() {
        let server = server(StubBackend::replying(""));
        let line = r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#;
        let first = call(&server, line).await;
        let second = call(&server, line).await;

        let tools = first["result"]["tools"].as_array().unwrap();
        assert_eq!(tools.len(), 3);
        assert_eq!(tools[0]["name"], json!("ask_model"));
        assert_eq!(tools[1]["name"], json!("list_models"));
        assert_eq!(tools[2]["name"], json!("health_check"));
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_unknown_tool_is_application_error() {
        let server = server(StubBackend::replying(""));
        let response = call(
            &server,
            r#"{"jsonrpc":"2.0","id":3,"method":"tools/call","params":{"name":"bogus_tool","arguments":{}}}"#,
        )
        .await;

        assert_eq!(response["id"], json!(3));
        assert_eq!(response["error"]["code"], json!(-32000));
        assert!(
            response["error"]["message"]
                .as_str()
                .unwrap()
                .contains("bogus_tool")
        );
        assert!(response.get("result").is_none());
    }

    #[tokio::test]
    async fn test_missing_tool_name_is_application_error() {
        let server = server(StubBackend::replying(""));
        let response = call(&server, r#"{"id":4,"method":"tools/call"}"#).await;
        assert_eq!(response["error"]["code"], json!(-32000));
    }

    #[tokio::test]
    async fn test_tool_success_wraps_text_content() {
        let server = server(StubBackend::replying("Paris"));
        let response = call(
            &server,
            r#"{"id":"q-1","method":"tools/call","params":{"name":"ask_model","arguments":{"question":"Capital of France?"}}}"#,
        )
        .await;

        assert_eq!(response["id"], json!("q-1"));
        assert_eq!(
            response["result"],
            json!({ "content": [{ "type": "text", "text": "Paris" }] })
        );
    }

    #[tokio::test]
    async fn test_absent_arguments_default_to_empty_object() {
        let server = server(StubBackend::replying(""));
        let response = call(
            &server,
            r#"{"id":6,"method":"tools/call","params":{"name":"list_models"}}"#,
        )
        .await;
        assert_eq!(
            response["result"]["content"][0]["text"],
            json!("stub backend: model-router")
        );
    }

    #[tokio::test]
    async fn test_health_check_tool() {
        let server = server(StubBackend::replying(""));
        let response = call(
            &server,
            r#"{"id":8,"method":"tools/call","params":{"name":"health_check","arguments":{}}}"#,
        )
        .await;
        assert_eq!(
            response["result"]["content"][0]["text"],
            json!("endpoint reachable and credential accepted")
        );
    }

    #[tokio::test]
    async fn test_tool_failure_is_application_error() {
        let server = server(StubBackend::failing("401 Unauthorized"));
        let response = call(
            &server,
            r#"{"id":7,"method":"tools/call","params":{"name":"ask_model","arguments":{"question":"hi"}}}"#,
        )
        .await;
        assert_eq!(response["error"]["code"], json!(-32000));
        assert_eq!(response["error"]["message"], json!("401 Unauthorized"));
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let server = server(StubBackend::replying(""));
        let request = parse_line(r#"{"jsonrpc":"2.0","id":5,"method":"frobnicate"}"#).unwrap();
        let response = server.handle_request(request).await;

        assert_eq!(response.id, json!(5));
        match response.payload {
            Payload::Error(error) => {
                assert_eq!(error.code, protocol::METHOD_NOT_FOUND);
                assert!(error.message.contains("frobnicate"));
            }
            Payload::Result(_) => panic!("expected an error payload"),
        }
    }

    #[tokio::test]
    async fn test_null_id_is_echoed_as_null() {
        let server = server(StubBackend::replying(""));
        let response = call(&server, r#"{"method":"initialize"}"#).await;
        assert_eq!(response["id"], Value::Null);
        assert!(response.as_object().unwrap().contains_key("id"));
    }
}
