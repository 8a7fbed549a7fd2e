//! Terminal tool used by the model to answer the human.

use async_trait::async_trait;
use proto::ToolError;

use crate::Tool;

/// Tool whose argument is the assistant's reply
pub struct RespondTool;

#[async_trait]
impl Tool for RespondTool {
    fn name(&self) -> &str {
        "respond_tool"
    }

    fn description(&self) -> &str {
        "used to give an answer to the human. The input to this tool is a string with your response"
    }

    fn is_terminal(&self) -> bool {
        true
    }

    async fn execute(&self, input: &str) -> Result<String, ToolError> {
        Ok(input.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn respond_tool_echoes_input_and_is_terminal() {
        let tool = RespondTool;
        assert!(tool.is_terminal());
        let out = tool.execute("Welcome aboard!").await.expect("respond");
        assert_eq!(out, "Welcome aboard!");
    }
}
