//! Tina, the outreach persona for Mileva LLC.

use crate::tools::MultiplyNumbers;
use mileva_voice::Agent;

/// System instructions, sent to the model verbatim.
pub const TINA_INSTRUCTIONS: &str = include_str!("../prompts/tina.md");

/// Builds the assistant persona with its callable tools.
pub fn assistant() -> Agent {
    Agent::new(TINA_INSTRUCTIONS.trim()).with_tool(MultiplyNumbers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn persona_carries_instructions_and_tool() {
        let agent = assistant();
        assert!(agent.instructions().starts_with("## Identity & Purpose"));
        assert!(agent.instructions().contains("You are Tina"));
        assert!(agent
            .instructions()
            .ends_with("automatically sent after the call."));

        let names: Vec<&str> = agent.tools().iter().map(|t| t.name()).collect();
        assert_eq!(names, vec!["multiply_numbers"]);
    }

    #[test]
    fn prompt_only_tools_are_not_registered() {
        let agent = assistant();
        assert!(agent.find_tool("query_knowledge_base").is_none());
        assert!(agent.find_tool("schedule_discovery_call").is_none());
    }
}
