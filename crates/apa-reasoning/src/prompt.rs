//! Assembles the single user-role message sent to a provider for one REASON
//! step. Section order and labels are fixed; a provider only ever sees this
//! shape, never a multi-message chat history.

use apa_core::types::{Action, Agent, Observation, RunContext, Task};

pub fn build_prompt(
    agent: &Agent,
    task: &Task,
    context: &RunContext,
    prior_actions: &[Action],
    prior_observations: &[Observation],
) -> String {
    let mut out = String::new();

    out.push_str(&agent.system_prompt_or_default());
    out.push_str("\n\n");

    out.push_str(&format!("Task: {}\n\n", task.description));

    out.push_str("Available Tools:\n");
    if agent.tools.is_empty() {
        out.push_str("(none)\n");
    } else {
        for tool in &agent.tools {
            out.push_str(&format!("- {tool}\n"));
        }
    }
    out.push('\n');

    out.push_str("Previous Steps:\n");
    if prior_actions.is_empty() {
        out.push_str("(none yet)\n");
    } else {
        for (i, (action, observation)) in prior_actions.iter().zip(prior_observations.iter()).enumerate() {
            out.push_str(&format!("Step {}:\n", i + 1));
            out.push_str(&format!(
                "Action: {} - {}\n",
                action.r#type,
                action.description.as_deref().unwrap_or("")
            ));
            let result_str = observation
                .result
                .as_ref()
                .map(|v| v.to_string())
                .unwrap_or_else(|| observation.error.clone().unwrap_or_default());
            out.push_str(&format!("Observation: {} - {}\n", observation.status, result_str));
        }
    }
    out.push('\n');

    out.push_str("Current Context:\n");
    out.push_str(&serde_json::to_string(context).unwrap_or_else(|_| "{}".to_string()));
    out.push_str("\n\n");

    out.push_str(
        "Respond in exactly this grammar. To take an action:\n\
         Thought: <reasoning>\n\
         Action: <type>\n\
         Action Input: <JSON>\n\
         \n\
         Or, to terminate:\n\
         Thought: <why done>\n\
         Action: finish\n\
         Result: <final>\n",
    );

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use apa_core::types::RelevantMemory;
    use serde_json::json;

    fn agent() -> Agent {
        Agent {
            id: "a1".into(),
            name: "tester".into(),
            model: "gpt-4o".into(),
            provider: "openai".into(),
            temperature: 5,
            max_tokens: 2000,
            tools: vec!["echo".into()],
            system_prompt: None,
            max_iterations: 10,
            enable_memory: true,
            enable_tools: true,
            enable_learning: false,
            enable_collaboration: false,
            safety_guardrails: None,
            metadata: json!({}),
        }
    }

    #[test]
    fn assembles_fixed_sections_in_order() {
        let agent = agent();
        let task = Task::new("summarize the quarterly report");
        let context = RunContext::new(
            agent.id.clone(),
            "exec-1".into(),
            task.description.clone(),
            Vec::<RelevantMemory>::new(),
        );
        let prompt = build_prompt(&agent, &task, &context, &[], &[]);

        assert!(prompt.starts_with("You are a helpful AI agent."));
        let task_pos = prompt.find("Task:").unwrap();
        let tools_pos = prompt.find("Available Tools:").unwrap();
        let steps_pos = prompt.find("Previous Steps:").unwrap();
        let ctx_pos = prompt.find("Current Context:").unwrap();
        let grammar_pos = prompt.find("Thought: <reasoning>").unwrap();
        assert!(task_pos < tools_pos);
        assert!(tools_pos < steps_pos);
        assert!(steps_pos < ctx_pos);
        assert!(ctx_pos < grammar_pos);
        assert!(prompt.contains("- echo"));
        assert!(prompt.contains("(none yet)"));
    }

    #[test]
    fn renders_prior_steps() {
        let agent = agent();
        let task = Task::new("t");
        let context = RunContext::new(
            agent.id.clone(),
            "exec-1".into(),
            task.description.clone(),
            Vec::<RelevantMemory>::new(),
        );
        let action = Action::new("calculation", json!({"expression": "2+2"}));
        let observation = Observation::success(json!({"result": 4.0}));
        let prompt = build_prompt(&agent, &task, &context, &[action], &[observation]);

        assert!(prompt.contains("Step 1:"));
        assert!(prompt.contains("Action: calculation"));
        assert!(prompt.contains("Observation: success"));
    }
}
