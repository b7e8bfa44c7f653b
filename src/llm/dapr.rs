//! Dapr Conversation API provider
//!
//! Talks to the local Dapr sidecar, which forwards the conversation to the
//! configured LLM component (OpenAI, Anthropic, ...).

use super::error::LlmError;
use super::types::{LlmResponse, Message, Role, ToolCall, ToolDefinition};
use super::LlmProvider;
use crate::config::LlmConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

const CONVERSATION_API_VERSION: &str = "v1.0-alpha2";
const API_TOKEN_HEADER: &str = "dapr-api-token";

/// Chat client for a Dapr conversation component
pub struct DaprChatClient {
    client: reqwest::Client,
    endpoint: String,
    provider: String,
    component: String,
    timeout_secs: u64,
    api_token: Option<String>,
}

impl DaprChatClient {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build HTTP client for Dapr")?;

        Ok(Self {
            client,
            endpoint: config.dapr_endpoint.trim_end_matches('/').to_string(),
            provider: config.provider.clone(),
            component: config.component.clone(),
            timeout_secs: config.timeout_secs,
            api_token: config.api_token.clone(),
        })
    }

    fn converse_url(&self) -> String {
        format!(
            "{}/{}/conversation/{}/converse",
            self.endpoint, CONVERSATION_API_VERSION, self.component
        )
    }

    fn build_request(
        &self,
        messages: &[Message],
        tools: Option<&[ToolDefinition]>,
    ) -> ConverseRequest {
        let tools: Vec<DaprTool> = tools
            .unwrap_or_default()
            .iter()
            .map(|t| DaprTool {
                function: DaprFunction {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: t.parameters.clone(),
                },
            })
            .collect();
        let tool_choice = if tools.is_empty() { None } else { Some("auto") };

        ConverseRequest {
            name: self.component.clone(),
            inputs: vec![ConversationInput {
                messages: messages.iter().map(convert_message).collect(),
            }],
            tools,
            tool_choice,
        }
    }

    async fn send_request(&self, request: &ConverseRequest) -> Result<ConverseResponse, LlmError> {
        let mut builder = self.client.post(self.converse_url()).json(request);
        if let Some(token) = &self.api_token {
            builder = builder.header(API_TOKEN_HEADER, token);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| LlmError::from_network_error(e, self.timeout_secs))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(LlmError::from_http_status(status, error_text));
        }

        response
            .json::<ConverseResponse>()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl LlmProvider for DaprChatClient {
    fn name(&self) -> &str {
        &self.provider
    }

    async fn chat(
        &self,
        messages: &[Message],
        tools: Option<&[ToolDefinition]>,
    ) -> Result<LlmResponse> {
        let request = self.build_request(messages, tools);
        tracing::debug!(
            "Dapr converse via component '{}' ({} messages, {} tools)",
            self.component,
            messages.len(),
            request.tools.len()
        );

        let response = self.send_request(&request).await?;
        Ok(parse_response(response)?)
    }
}

fn convert_message(message: &Message) -> DaprMessage {
    let content = if message.content.is_empty() {
        Vec::new()
    } else {
        vec![TextPart {
            text: message.content.clone(),
        }]
    };

    match message.role {
        Role::System => DaprMessage::OfSystem(TextMessage { content }),
        Role::User => DaprMessage::OfUser(TextMessage { content }),
        Role::Assistant => DaprMessage::OfAssistant(AssistantMessage {
            content,
            tool_calls: message
                .tool_calls
                .iter()
                .map(|call| DaprToolCall {
                    id: call.id.clone(),
                    function: DaprFunctionCall {
                        name: call.name.clone(),
                        arguments: call.arguments.to_string(),
                    },
                })
                .collect(),
        }),
        Role::Tool => DaprMessage::OfTool(ToolMessage {
            tool_id: message.tool_call_id.clone().unwrap_or_default(),
            name: message.name.clone().unwrap_or_default(),
            content,
        }),
    }
}

fn parse_response(response: ConverseResponse) -> Result<LlmResponse, LlmError> {
    let choice = response
        .outputs
        .into_iter()
        .flat_map(|o| o.choices)
        .next()
        .ok_or_else(|| LlmError::InvalidResponse("no choices in conversation output".into()))?;

    tracing::debug!("Dapr finish reason: {:?}", choice.finish_reason);

    let calls = choice
        .message
        .tool_calls
        .into_iter()
        .enumerate()
        .map(|(index, call)| ToolCall {
            id: if call.id.is_empty() {
                format!("call_{}", index)
            } else {
                call.id
            },
            name: call.function.name,
            arguments: parse_arguments(&call.function.arguments),
        })
        .collect();

    Ok(LlmResponse::from_parts(choice.message.content, calls))
}

/// Arguments arrive as a JSON-encoded string
fn parse_arguments(raw: &str) -> Value {
    if raw.trim().is_empty() {
        return Value::Object(Default::default());
    }
    serde_json::from_str(raw).unwrap_or_else(|e| {
        tracing::warn!("Tool call arguments are not valid JSON: {}", e);
        Value::String(raw.to_string())
    })
}

// Wire format

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ConverseRequest {
    name: String,
    inputs: Vec<ConversationInput>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<DaprTool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'static str>,
}

#[derive(Debug, Serialize)]
struct ConversationInput {
    messages: Vec<DaprMessage>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
enum DaprMessage {
    OfSystem(TextMessage),
    OfUser(TextMessage),
    OfAssistant(AssistantMessage),
    OfTool(ToolMessage),
}

#[derive(Debug, Serialize)]
struct TextMessage {
    content: Vec<TextPart>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AssistantMessage {
    content: Vec<TextPart>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<DaprToolCall>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ToolMessage {
    tool_id: String,
    name: String,
    content: Vec<TextPart>,
}

#[derive(Debug, Serialize)]
struct TextPart {
    text: String,
}

#[derive(Debug, Serialize)]
struct DaprTool {
    function: DaprFunction,
}

#[derive(Debug, Serialize)]
struct DaprFunction {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct DaprToolCall {
    #[serde(default)]
    id: String,
    function: DaprFunctionCall,
}

#[derive(Debug, Serialize, Deserialize)]
struct DaprFunctionCall {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct ConverseResponse {
    #[serde(default)]
    outputs: Vec<ConversationOutput>,
}

#[derive(Debug, Deserialize)]
struct ConversationOutput {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Choice {
    #[serde(default)]
    finish_reason: Option<String>,
    #[serde(default)]
    message: ChoiceMessage,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<DaprToolCall>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use serde_json::json;

    fn client() -> DaprChatClient {
        let config = Config::from_lookup(|key| match key {
            "DAPR_HTTP_ENDPOINT" => Some("http://sidecar:3500/".to_string()),
            "DAPR_LLM_COMPONENT_DEFAULT" => Some("azure-openai".to_string()),
            _ => None,
        });
        DaprChatClient::new(&config.llm).unwrap()
    }

    #[test]
    fn test_converse_url() {
        assert_eq!(
            client().converse_url(),
            "http://sidecar:3500/v1.0-alpha2/conversation/azure-openai/converse"
        );
    }

    #[test]
    fn test_request_wire_format() {
        let messages = vec![
            Message::system("be brief"),
            Message::user("how many hotels?"),
            Message::assistant_tool_calls(
                None,
                vec![ToolCall {
                    id: "call_1".into(),
                    name: "run_sql".into(),
                    arguments: json!({ "query": "SELECT 1" }),
                }],
            ),
            Message::tool_result("call_1", "run_sql", "917"),
        ];
        let tools = vec![ToolDefinition {
            name: "run_sql".into(),
            description: "Run a query".into(),
            parameters: json!({ "type": "object" }),
        }];

        let request = client().build_request(&messages, Some(&tools));
        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(value["name"], "azure-openai");
        assert_eq!(value["toolChoice"], "auto");
        assert_eq!(value["tools"][0]["function"]["name"], "run_sql");

        let wire = &value["inputs"][0]["messages"];
        assert_eq!(wire[0]["ofSystem"]["content"][0]["text"], "be brief");
        assert_eq!(wire[1]["ofUser"]["content"][0]["text"], "how many hotels?");
        assert_eq!(wire[2]["ofAssistant"]["toolCalls"][0]["id"], "call_1");
        assert_eq!(
            wire[2]["ofAssistant"]["toolCalls"][0]["function"]["arguments"],
            "{\"query\":\"SELECT 1\"}"
        );
        assert_eq!(wire[3]["ofTool"]["toolId"], "call_1");
        assert_eq!(wire[3]["ofTool"]["name"], "run_sql");
        assert_eq!(wire[3]["ofTool"]["content"][0]["text"], "917");
    }

    #[test]
    fn test_request_without_tools_omits_tool_choice() {
        let request = client().build_request(&[Message::user("hi")], None);
        let value = serde_json::to_value(&request).unwrap();
        assert!(value.get("tools").is_none());
        assert!(value.get("toolChoice").is_none());
    }

    #[test]
    fn test_parse_text_response() {
        let response: ConverseResponse = serde_json::from_value(json!({
            "outputs": [{
                "choices": [{
                    "finishReason": "stop",
                    "index": 0,
                    "message": { "content": "There are 917 hotels." }
                }]
            }]
        }))
        .unwrap();

        let parsed = parse_response(response).unwrap();
        assert_eq!(parsed.text(), Some("There are 917 hotels."));
        assert!(parsed.tool_calls().is_empty());
    }

    #[test]
    fn test_parse_tool_call_response() {
        let response: ConverseResponse = serde_json::from_value(json!({
            "outputs": [{
                "choices": [{
                    "finishReason": "tool_calls",
                    "message": {
                        "toolCalls": [
                            {
                                "id": "call_abc",
                                "function": {
                                    "name": "run_sql",
                                    "arguments": "{\"query\":\"SELECT COUNT(*)\"}"
                                }
                            },
                            { "function": { "name": "list_buckets", "arguments": "" } }
                        ]
                    }
                }]
            }]
        }))
        .unwrap();

        let parsed = parse_response(response).unwrap();
        assert!(matches!(parsed, LlmResponse::ToolCalls { .. }));
        let calls = parsed.tool_calls();
        assert_eq!(calls[0].id, "call_abc");
        assert_eq!(calls[0].arguments, json!({ "query": "SELECT COUNT(*)" }));
        assert_eq!(calls[1].id, "call_1");
        assert_eq!(calls[1].arguments, json!({}));
    }

    #[test]
    fn test_parse_empty_outputs_is_invalid() {
        let response: ConverseResponse = serde_json::from_value(json!({ "outputs": [] })).unwrap();
        assert!(matches!(
            parse_response(response),
            Err(LlmError::InvalidResponse(_))
        ));
    }
}
