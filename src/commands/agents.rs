//! `call <agent> [request]`: ask a planning agent and schedule its answer.
//!
//! ACTION lines go through the same text path as typed commands, minus the
//! destructive handlers, so an agent can never clear the show.

use async_trait::async_trait;
use serde_json::json;

use crate::agents::{build_prompt, call_agent, parse_reply, AgentPlan};
use crate::commands::CommandHandler;
use crate::error::{ShowError, ShowResult};
use crate::models::commands::CommandResponse;
use crate::session::ShowController;

pub struct CallAgentHandler;

#[async_trait]
impl CommandHandler for CallAgentHandler {
    fn name(&self) -> &'static str {
        "call"
    }

    fn matches(&self, text: &str) -> bool {
        text.starts_with("call ")
    }

    async fn handle(&self, controller: &ShowController, text: &str) -> ShowResult<CommandResponse> {
        let session = controller.session()?;
        let mut parts = text.splitn(3, ' ').skip(1);
        let name = parts.next().unwrap_or_default();
        let request = parts.next().unwrap_or_default();

        let agent = controller.agents().get(name).ok_or_else(|| {
            ShowError::Resolution(format!(
                "Unknown agent '{}' (available: {})",
                name,
                controller.agents().names().join(", ")
            ))
        })?;

        let prompt = build_prompt(session.song(), session.fixtures(), request);
        let reply = call_agent(agent.as_ref(), &prompt, controller.agent_timeout()).await?;
        let parsed = parse_reply(&reply, session.song());

        match parsed.plan {
            AgentPlan::Actions(actions) => {
                let mut results = Vec::with_capacity(actions.len());
                let mut applied = 0;
                for action in &actions {
                    match session.apply_text(action) {
                        Ok(outcome) => {
                            applied += 1;
                            results.push(json!({ "action": action, "success": true, "message": outcome.message }));
                        }
                        Err(err) => {
                            log::warn!("[agent] action '{}' failed: {}", action, err);
                            results.push(json!({ "action": action, "success": false, "message": err.to_string() }));
                        }
                    }
                }
                Ok(CommandResponse {
                    success: applied > 0,
                    message: format!("{}: applied {}/{} actions", name, applied, actions.len()),
                    data: Some(json!(results)),
                })
            }
            AgentPlan::Effects(planned) => {
                let delta = session.apply_planned(&planned)?;
                let source = if parsed.used_fallback { "fallback plan" } else { "plan" };
                Ok(CommandResponse::ok(format!(
                    "{}: scheduled {} effects from {}",
                    name,
                    delta.added.len(),
                    source
                ))
                .with_data(json!({ "planned": planned, "delta": delta })))
            }
        }
    }
}
