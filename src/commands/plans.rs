//! Named planning markers. They live in the song metadata and never touch the
//! effect list.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::json;

use crate::commands::CommandHandler;
use crate::error::{ShowError, ShowResult};
use crate::interpreter::time::parse_time_literal;
use crate::models::commands::CommandResponse;
use crate::session::ShowController;

static CREATE_PLAN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^create plan (?P<name>.+?) at (?P<start>\S+)(?: to (?P<end>\S+))?(?: description (?P<description>.+))?$",
    )
    .expect("valid regex")
});

pub struct PlanHandler;

fn parse_time(token: &str, bpm: f32) -> ShowResult<f32> {
    parse_time_literal(token, bpm).ok_or_else(|| ShowError::Parse(format!("bad time '{}'", token)))
}

#[async_trait]
impl CommandHandler for PlanHandler {
    fn name(&self) -> &'static str {
        "plans"
    }

    fn matches(&self, text: &str) -> bool {
        text.starts_with("create plan ")
            || text.starts_with("delete plan ")
            || text == "reset plans"
            || text == "list plans"
    }

    async fn handle(&self, controller: &ShowController, text: &str) -> ShowResult<CommandResponse> {
        let session = controller.session()?;

        if text == "list plans" {
            let plans = session.plans();
            return Ok(CommandResponse::ok(format!("{} plan(s)", plans.len())).with_data(json!(plans)));
        }
        if text == "reset plans" {
            let removed = session.reset_plans()?;
            return Ok(CommandResponse::ok(format!("Removed {} plan(s)", removed)));
        }
        if let Some(key) = text.strip_prefix("delete plan ") {
            let plan = session.delete_plan(key)?;
            return Ok(CommandResponse::ok(format!("Deleted plan '{}'", plan.name)).with_data(json!(plan)));
        }

        let caps = CREATE_PLAN.captures(text).ok_or_else(|| {
            ShowError::Parse("usage: create plan <name> at <time> [to <end>] [description <text>]".into())
        })?;
        let bpm = session.song().effective_bpm();
        let start = parse_time(&caps["start"], bpm)?;
        let end = caps.name("end").map(|m| parse_time(m.as_str(), bpm)).transpose()?;
        let description = caps.name("description").map_or("", |m| m.as_str());
        let plan = session.create_plan(&caps["name"], start, end, description)?;
        Ok(CommandResponse::ok(format!("Created plan '{}' at {:.2}s", plan.name, plan.start)).with_data(json!(plan)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_grammar() {
        let caps = CREATE_PLAN
            .captures("create plan big drop at 1:00 to 64b description strobes everywhere")
            .expect("match");
        assert_eq!(&caps["name"], "big drop");
        assert_eq!(parse_time(&caps["start"], 120.0).ok(), Some(60.0));
        assert_eq!(caps.name("end").map(|m| m.as_str()), Some("64b"));
        assert_eq!(&caps["description"], "strobes everywhere");

        let bare = CREATE_PLAN.captures("create plan intro at 0s").expect("match");
        assert!(bare.name("end").is_none());
    }
}
