//! Analysis commands and background task listing.

use async_trait::async_trait;
use serde_json::json;

use crate::commands::CommandHandler;
use crate::error::{ShowError, ShowResult};
use crate::interpreter::time::parse_time_literal;
use crate::models::commands::CommandResponse;
use crate::session::ShowController;

pub struct TasksHandler;

#[async_trait]
impl CommandHandler for TasksHandler {
    fn name(&self) -> &'static str {
        "tasks"
    }

    fn matches(&self, text: &str) -> bool {
        text == "tasks"
    }

    async fn handle(&self, controller: &ShowController, _text: &str) -> ShowResult<CommandResponse> {
        let tasks = controller.tasks().list();
        let running = controller.tasks().running();
        Ok(CommandResponse::ok(format!("{} task(s), {} running", tasks.len(), running)).with_data(json!(tasks)))
    }
}

/// `analyze`, `analyze context [reset]`, `analyze beats <start> <end>`
pub struct AnalyzeHandler;

#[async_trait]
impl CommandHandler for AnalyzeHandler {
    fn name(&self) -> &'static str {
        "analyze"
    }

    fn matches(&self, text: &str) -> bool {
        text == "analyze" || text.starts_with("analyze ")
    }

    async fn handle(&self, controller: &ShowController, text: &str) -> ShowResult<CommandResponse> {
        let session = controller.session()?;
        let args: Vec<&str> = text.split_whitespace().skip(1).collect();

        match args.as_slice() {
            [] => {
                let handle = controller
                    .tasks()
                    .start("analyze", format!("context analysis for {}", session.song_id()));
                let task_id = handle.id().to_string();
                tokio::spawn(async move {
                    handle.progress(0.1, "summarizing arrangement");
                    let validation = session.validate();
                    match session.context_summary() {
                        Ok((summary, _)) => handle.complete(json!({
                            "context": summary,
                            "effects": session.effect_count(),
                            "invalidEffects": validation.invalid,
                        })),
                        Err(err) => handle.fail(err.to_string()),
                    }
                });
                Ok(CommandResponse::ok(format!("Started analysis task {}", task_id))
                    .with_data(json!({ "taskId": task_id })))
            }
            ["context"] => {
                let (summary, cached) = session.context_summary()?;
                let message = if cached { "Context summary (cached)" } else { "Context summary" };
                Ok(CommandResponse::ok(message).with_data(summary))
            }
            ["context", "reset"] => {
                let had = session.reset_context_summary()?;
                Ok(CommandResponse::ok(if had {
                    "Context summary cleared"
                } else {
                    "No cached context summary"
                }))
            }
            ["beats", start, end] => {
                let bpm = session.song().effective_bpm();
                let parse = |token: &str| {
                    parse_time_literal(token, bpm).ok_or_else(|| ShowError::Parse(format!("bad time '{}'", token)))
                };
                let report = session.beats_report(parse(*start)?, parse(*end)?)?;
                let count = report["count"].as_u64().unwrap_or_default();
                Ok(CommandResponse::ok(format!("{} beat(s) in window", count)).with_data(report))
            }
            _ => Err(ShowError::Parse(
                "usage: analyze | analyze context [reset] | analyze beats <start> <end>".into(),
            )),
        }
    }
}
