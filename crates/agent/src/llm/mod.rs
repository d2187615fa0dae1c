use anyhow::{anyhow, Result};
use serde::Deserialize;
use serde_json::{json, Value};

// LM Studio's OpenAI-compatible endpoint; any compatible server works.
const DEFAULT_BASE_URL: &str = "http://localhost:1234/v1";
const DEFAULT_MODEL: &str = "mistral-7b-instruct";

pub struct ChatClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

#[derive(Debug, Deserialize)]
pub struct AssistantMessage {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub function_call: Option<FunctionCall>,
}

#[derive(Debug, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default)]
    pub arguments: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: AssistantMessage,
}

impl ChatClient {
    pub fn from_env() -> Self {
        ChatClient {
            client: reqwest::Client::new(),
            base_url: std::env::var("LLM_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
            model: std::env::var("LLM_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// One chat-completions round trip with the tool schema attached.
    /// The model only picks a tool; it never executes anything.
    pub async fn chat(&self, history: &[Value]) -> Result<AssistantMessage> {
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .json(&json!({
                "model": self.model,
                "messages": history,
                "functions": function_schema(),
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow!("LLM endpoint returned {}", response.status()));
        }
        let mut parsed: ChatResponse = response.json().await?;
        if parsed.choices.is_empty() {
            return Err(anyhow!("LLM response carried no choices"));
        }
        Ok(parsed.choices.remove(0).message)
    }
}

/// Function-calling schema advertised to the model, one entry per
/// dispatchable operation.
pub fn function_schema() -> Value {
    json!([
        {
            "name": "update_cue_sheet",
            "description": "Modify fields inside the cue sheet (auto-backup included).",
            "parameters": {
                "type": "object",
                "properties": {
                    "scene_keyword": { "type": "string" },
                    "field": { "type": "string" },
                    "new_value": { "type": "string" }
                },
                "required": ["scene_keyword", "field", "new_value"]
            }
        },
        {
            "name": "render_video",
            "description": "Run the beat-synchronized auto-cut renderer after edits are saved.",
            "parameters": { "type": "object", "properties": {} }
        },
        {
            "name": "list_versions",
            "description": "List all available versioned backups of the cue sheet.",
            "parameters": { "type": "object", "properties": {} }
        },
        {
            "name": "restore_version",
            "description": "Restore a previous cue sheet from a timestamped backup (YYYY-MM-DD_HH-MM-SS).",
            "parameters": {
                "type": "object",
                "properties": { "timestamp": { "type": "string" } },
                "required": ["timestamp"]
            }
        },
        {
            "name": "sync_from_otio",
            "description": "Re-import an NLE timeline and update cue sheet timings.",
            "parameters": {
                "type": "object",
                "properties": { "otio_path": { "type": "string" } },
                "required": []
            }
        },
        {
            "name": "export_timeline",
            "description": "Export the cue sheet as an extended timeline with beat and zone markers.",
            "parameters": { "type": "object", "properties": {} }
        }
    ])
}
