//! Handlers that touch the effect list or the canvas.

use async_trait::async_trait;
use serde_json::json;

use crate::commands::CommandHandler;
use crate::error::{ShowError, ShowResult};
use crate::interpreter::literal::is_add_command;
use crate::models::commands::CommandResponse;
use crate::models::effects::EffectDelta;
use crate::session::{ShowController, TextOutcome};

/// Literal token that authorizes `clear all`.
pub const CONFIRM_TOKEN: &str = "confirm";

fn delta_response(message: String, delta: &EffectDelta) -> CommandResponse {
    CommandResponse::ok(message).with_data(json!(delta))
}

fn outcome_response(outcome: TextOutcome) -> CommandResponse {
    delta_response(outcome.message, &outcome.delta)
}

pub struct RenderHandler;

#[async_trait]
impl CommandHandler for RenderHandler {
    fn name(&self) -> &'static str {
        "render"
    }

    fn matches(&self, text: &str) -> bool {
        text == "render"
    }

    async fn handle(&self, controller: &ShowController, _text: &str) -> ShowResult<CommandResponse> {
        let session = controller.session()?;
        let validation = session.validate();
        let report = session.render_all();
        let message = if report.total == 0 {
            "No effects to render".to_string()
        } else if validation.is_clean() {
            format!("Rendered {}/{} effects", report.rendered, report.total)
        } else {
            format!(
                "Rendered {}/{} effects ({} invalid)",
                report.rendered, report.total, validation.invalid
            )
        };
        let success = report.success;
        let data = json!({ "render": report, "validation": validation });
        Ok(CommandResponse {
            success,
            message,
            data: Some(data),
        })
    }
}

pub struct ClearAllHandler;

#[async_trait]
impl CommandHandler for ClearAllHandler {
    fn name(&self) -> &'static str {
        "clear_all"
    }

    fn matches(&self, text: &str) -> bool {
        text == "clear all" || text.starts_with("clear all ")
    }

    async fn handle(&self, controller: &ShowController, text: &str) -> ShowResult<CommandResponse> {
        let session = controller.session()?;
        let confirmed = text.split_whitespace().skip(2).any(|t| t == CONFIRM_TOKEN);
        if !confirmed {
            return Err(ShowError::DestructiveOpRejected(format!(
                "This would remove all {} effects. Send 'clear all {}' to proceed",
                session.effect_count(),
                CONFIRM_TOKEN
            )));
        }
        let delta = session.clear_all()?;
        Ok(delta_response(format!("Cleared {} effects", delta.removed.len()), &delta))
    }
}

pub struct ClearIdHandler;

#[async_trait]
impl CommandHandler for ClearIdHandler {
    fn name(&self) -> &'static str {
        "clear_id"
    }

    fn matches(&self, text: &str) -> bool {
        text.starts_with("clear id ")
    }

    async fn handle(&self, controller: &ShowController, text: &str) -> ShowResult<CommandResponse> {
        let id = text.trim_start_matches("clear id").trim();
        let delta = controller.session()?.clear_id(id)?;
        Ok(delta_response(format!("Removed effect {}", id), &delta))
    }
}

pub struct ClearGroupHandler;

#[async_trait]
impl CommandHandler for ClearGroupHandler {
    fn name(&self) -> &'static str {
        "clear_group"
    }

    fn matches(&self, text: &str) -> bool {
        text.starts_with("clear group ")
    }

    async fn handle(&self, controller: &ShowController, text: &str) -> ShowResult<CommandResponse> {
        let group = text.trim_start_matches("clear group").trim();
        let delta = controller.session()?.clear_group(group)?;
        Ok(delta_response(
            format!("Removed {} effects in group {}", delta.removed.len(), group),
            &delta,
        ))
    }
}

pub struct AddHandler;

#[async_trait]
impl CommandHandler for AddHandler {
    fn name(&self) -> &'static str {
        "add"
    }

    fn matches(&self, text: &str) -> bool {
        is_add_command(text)
    }

    async fn handle(&self, controller: &ShowController, text: &str) -> ShowResult<CommandResponse> {
        Ok(outcome_response(controller.session()?.add_literal(text)?))
    }
}

/// Literal effect expressions, then natural language.
pub struct FreeTextHandler;

#[async_trait]
impl CommandHandler for FreeTextHandler {
    fn name(&self) -> &'static str {
        "freetext"
    }

    fn matches(&self, text: &str) -> bool {
        !text.is_empty()
    }

    async fn handle(&self, controller: &ShowController, text: &str) -> ShowResult<CommandResponse> {
        Ok(outcome_response(controller.session()?.apply_text(text)?))
    }

    fn is_fallback(&self) -> bool {
        true
    }
}
