//! Typed tool calls.
//!
//! Tasks carry `(tool, params)` in wire form; `ToolCall::parse` turns that
//! pair into a typed variant at dispatch time. A name outside the table is
//! `UnknownTool`; a missing or ill-typed field is `InvalidParams`. The
//! dispatcher downstream is an exhaustive match, so adding a variant without
//! handling it is a compile error.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ToolError;

/// Every tool name the registry dispatches, in wire spelling.
pub const KNOWN_TOOLS: &[&str] = &[
    "readFile",
    "writeFile",
    "listDirectory",
    "createDirectory",
    "deletePath",
    "findFiles",
    "searchCode",
    "runCommand",
    "saveKnowledge",
    "loadKnowledge",
    "saveGlobalInsight",
    "loadGlobalInsights",
    "ingestDocument",
    "queryDeveloperLibrary",
    "generateDiff",
    "applyPatch",
];

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadFileParams {
    pub path: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteFileParams {
    pub path: String,
    pub content: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PathParams {
    pub path: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FindFilesParams {
    pub pattern: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchCodeParams {
    pub query: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunCommandParams {
    #[serde(alias = "cmd")]
    pub command: String,
    #[serde(default)]
    pub cwd: Option<String>,
    /// Extra attempts with exponential backoff on execution failure.
    #[serde(default)]
    pub retries: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveKnowledgeParams {
    pub key: String,
    pub value: Value,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadKnowledgeParams {
    pub key: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveGlobalInsightParams {
    pub topic: String,
    pub insight: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestDocumentParams {
    pub text: String,
    #[serde(default)]
    pub source: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryLibraryParams {
    pub question: String,
    #[serde(default)]
    pub top_k: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyPatchParams {
    pub patch: String,
}

/// One parsed, well-typed tool invocation.
#[derive(Debug, Clone)]
pub enum ToolCall {
    ReadFile(ReadFileParams),
    WriteFile(WriteFileParams),
    ListDirectory(PathParams),
    CreateDirectory(PathParams),
    DeletePath(PathParams),
    FindFiles(FindFilesParams),
    SearchCode(SearchCodeParams),
    RunCommand(RunCommandParams),
    SaveKnowledge(SaveKnowledgeParams),
    LoadKnowledge(LoadKnowledgeParams),
    SaveGlobalInsight(SaveGlobalInsightParams),
    LoadGlobalInsights,
    IngestDocument(IngestDocumentParams),
    QueryDeveloperLibrary(QueryLibraryParams),
    GenerateDiff,
    ApplyPatch(ApplyPatchParams),
}

fn typed<T: serde::de::DeserializeOwned>(tool: &str, params: &Value) -> Result<T, ToolError> {
    // A missing params object reads as an empty one so that the error the
    // caller sees names the first missing field, not the whole object.
    let value = match params {
        Value::Null => Value::Object(Default::default()),
        other => other.clone(),
    };
    serde_json::from_value(value).map_err(|e| ToolError::invalid_params(tool, e.to_string()))
}

impl ToolCall {
    pub fn parse(tool: &str, params: &Value) -> Result<Self, ToolError> {
        match tool {
            "readFile" => Ok(Self::ReadFile(typed(tool, params)?)),
            "writeFile" => Ok(Self::WriteFile(typed(tool, params)?)),
            "listDirectory" => Ok(Self::ListDirectory(typed(tool, params)?)),
            "createDirectory" => Ok(Self::CreateDirectory(typed(tool, params)?)),
            "deletePath" => Ok(Self::DeletePath(typed(tool, params)?)),
            "findFiles" => Ok(Self::FindFiles(typed(tool, params)?)),
            "searchCode" => Ok(Self::SearchCode(typed(tool, params)?)),
            // Older planner builds emit "executeTerminalCommand".
            "runCommand" | "executeTerminalCommand" => Ok(Self::RunCommand(typed(tool, params)?)),
            "saveKnowledge" => Ok(Self::SaveKnowledge(typed(tool, params)?)),
            "loadKnowledge" => Ok(Self::LoadKnowledge(typed(tool, params)?)),
            "saveGlobalInsight" => Ok(Self::SaveGlobalInsight(typed(tool, params)?)),
            "loadGlobalInsights" => Ok(Self::LoadGlobalInsights),
            "ingestDocument" => Ok(Self::IngestDocument(typed(tool, params)?)),
            "queryDeveloperLibrary" => Ok(Self::QueryDeveloperLibrary(typed(tool, params)?)),
            "generateDiff" => Ok(Self::GenerateDiff),
            "applyPatch" => Ok(Self::ApplyPatch(typed(tool, params)?)),
            other => Err(ToolError::UnknownTool(other.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::ReadFile(_) => "readFile",
            Self::WriteFile(_) => "writeFile",
            Self::ListDirectory(_) => "listDirectory",
            Self::CreateDirectory(_) => "createDirectory",
            Self::DeletePath(_) => "deletePath",
            Self::FindFiles(_) => "findFiles",
            Self::SearchCode(_) => "searchCode",
            Self::RunCommand(_) => "runCommand",
            Self::SaveKnowledge(_) => "saveKnowledge",
            Self::LoadKnowledge(_) => "loadKnowledge",
            Self::SaveGlobalInsight(_) => "saveGlobalInsight",
            Self::LoadGlobalInsights => "loadGlobalInsights",
            Self::IngestDocument(_) => "ingestDocument",
            Self::QueryDeveloperLibrary(_) => "queryDeveloperLibrary",
            Self::GenerateDiff => "generateDiff",
            Self::ApplyPatch(_) => "applyPatch",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_every_known_tool_name() {
        let sample_params = json!({
            "path": "a", "content": "b", "pattern": "*.rs", "query": "fn",
            "command": "ls", "key": "k", "value": 1, "topic": "t",
            "insight": "i", "text": "doc", "question": "q", "patch": "--- a"
        });
        for tool in KNOWN_TOOLS {
            let call = ToolCall::parse(tool, &sample_params)
                .unwrap_or_else(|e| panic!("{tool} should parse: {e}"));
            assert_eq!(call.name(), *tool);
        }
    }

    #[test]
    fn unknown_tool_is_named_in_the_error() {
        let err = ToolCall::parse("frobnicate", &json!({})).unwrap_err();
        assert!(matches!(err, ToolError::UnknownTool(name) if name == "frobnicate"));
    }

    #[test]
    fn missing_required_field_is_invalid_params() {
        let err = ToolCall::parse("readFile", &json!({})).unwrap_err();
        match err {
            ToolError::InvalidParams { tool, message } => {
                assert_eq!(tool, "readFile");
                assert!(message.contains("path"));
            }
            other => panic!("expected InvalidParams, got {other:?}"),
        }

        let err = ToolCall::parse("writeFile", &json!({"path": "a"})).unwrap_err();
        assert!(matches!(err, ToolError::InvalidParams { .. }));
    }

    #[test]
    fn null_params_read_as_empty_object() {
        assert!(matches!(
            ToolCall::parse("generateDiff", &Value::Null),
            Ok(ToolCall::GenerateDiff)
        ));
        let err = ToolCall::parse("readFile", &Value::Null).unwrap_err();
        assert!(matches!(err, ToolError::InvalidParams { .. }));
    }

    #[test]
    fn execute_terminal_command_is_a_run_command_alias() {
        let call = ToolCall::parse("executeTerminalCommand", &json!({"command": "ls"})).unwrap();
        assert_eq!(call.name(), "runCommand");
        match call {
            ToolCall::RunCommand(p) => assert_eq!(p.command, "ls"),
            other => panic!("expected RunCommand, got {other:?}"),
        }
    }

    #[test]
    fn run_command_accepts_cmd_alias() {
        let call = ToolCall::parse("runCommand", &json!({"cmd": "cargo test"})).unwrap();
        match call {
            ToolCall::RunCommand(p) => {
                assert_eq!(p.command, "cargo test");
                assert!(p.cwd.is_none());
                assert!(p.retries.is_none());
            }
            other => panic!("expected RunCommand, got {other:?}"),
        }
    }
}
