//! Text command surface.
//!
//! The dispatcher walks its handlers in registration order and runs the first
//! one whose `matches` accepts the text. The free-text handler matches
//! everything and always stays last. Errors never escape a command: they come
//! back as a failed [`CommandResponse`].

pub mod agents;
pub mod analysis;
pub mod effects;
pub mod plans;

use async_trait::async_trait;
use serde_json::json;

use crate::error::ShowResult;
use crate::interpreter::normalize;
use crate::models::commands::CommandResponse;
use crate::session::ShowController;

pub const USAGE: &[&str] = &[
    "help",
    "tasks",
    "render",
    "clear all [confirm]",
    "clear id <id>",
    "clear group <gid>",
    "add <action> to <fixture> at <time> [duration|for <time>]",
    "analyze",
    "analyze context [reset]",
    "analyze beats <start> <end>",
    "call <agent> [request]",
    "create plan <name> at <time> [to <end>] [description <text>]",
    "delete plan <id|name>",
    "reset plans",
    "list plans",
    "<effect> <fixture-ref> [color] at <time> [for <duration>] [with intensity <v>]",
    "<anything else is interpreted as natural language>",
];

#[async_trait]
pub trait CommandHandler: Send + Sync {
    fn name(&self) -> &'static str;

    /// `text` is already normalized (lowercase, marker stripped).
    fn matches(&self, text: &str) -> bool;

    async fn handle(&self, controller: &ShowController, text: &str) -> ShowResult<CommandResponse>;

    /// Catch-all handlers are kept behind every other handler.
    fn is_fallback(&self) -> bool {
        false
    }
}

#[derive(Default)]
pub struct CommandDispatcher {
    handlers: Vec<Box<dyn CommandHandler>>,
}

impl CommandDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default_handlers() -> Self {
        let mut dispatcher = Self::new();
        dispatcher.register(Box::new(HelpHandler));
        dispatcher.register(Box::new(analysis::TasksHandler));
        dispatcher.register(Box::new(effects::RenderHandler));
        dispatcher.register(Box::new(effects::ClearAllHandler));
        dispatcher.register(Box::new(effects::ClearIdHandler));
        dispatcher.register(Box::new(effects::ClearGroupHandler));
        dispatcher.register(Box::new(effects::AddHandler));
        dispatcher.register(Box::new(plans::PlanHandler));
        dispatcher.register(Box::new(analysis::AnalyzeHandler));
        dispatcher.register(Box::new(agents::CallAgentHandler));
        dispatcher.register(Box::new(effects::FreeTextHandler));
        dispatcher
    }

    /// Append a handler, keeping any catch-all at the end.
    pub fn register(&mut self, handler: Box<dyn CommandHandler>) {
        let index = if handler.is_fallback() {
            self.handlers.len()
        } else {
            self.handlers
                .iter()
                .position(|h| h.is_fallback())
                .unwrap_or(self.handlers.len())
        };
        self.handlers.insert(index, handler);
    }

    pub fn handler_names(&self) -> Vec<&'static str> {
        self.handlers.iter().map(|h| h.name()).collect()
    }

    fn find(&self, text: &str) -> Option<&dyn CommandHandler> {
        self.handlers
            .iter()
            .find(|h| h.matches(text))
            .map(|h| h.as_ref())
    }

    pub async fn dispatch(&self, controller: &ShowController, text: &str) -> CommandResponse {
        let text = normalize(text);
        if text.is_empty() {
            return CommandResponse::fail("Empty command");
        }
        let Some(handler) = self.find(&text) else {
            return CommandResponse::fail(format!("No handler for '{}'", text));
        };

        log::info!("[dispatch] '{}' -> {}", text, handler.name());
        match handler.handle(controller, &text).await {
            Ok(response) => response,
            Err(err) => {
                if err.is_rejection() {
                    log::info!("[dispatch] {}", err);
                } else {
                    log::warn!("[dispatch] {} failed: {}", handler.name(), err);
                }
                CommandResponse::fail(err.to_string())
            }
        }
    }
}

pub struct HelpHandler;

#[async_trait]
impl CommandHandler for HelpHandler {
    fn name(&self) -> &'static str {
        "help"
    }

    fn matches(&self, text: &str) -> bool {
        text == "help" || text == "?"
    }

    async fn handle(&self, _controller: &ShowController, _text: &str) -> ShowResult<CommandResponse> {
        Ok(CommandResponse::ok(USAGE.join("\n")).with_data(json!(USAGE)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    #[async_trait]
    impl CommandHandler for Echo {
        fn name(&self) -> &'static str {
            "echo"
        }

        fn matches(&self, text: &str) -> bool {
            text.starts_with("echo")
        }

        async fn handle(&self, _controller: &ShowController, text: &str) -> ShowResult<CommandResponse> {
            Ok(CommandResponse::ok(text.to_string()))
        }
    }

    #[test]
    fn free_text_stays_last() {
        let mut dispatcher = CommandDispatcher::with_default_handlers();
        dispatcher.register(Box::new(Echo));
        let names = dispatcher.handler_names();
        assert_eq!(names.last(), Some(&"freetext"));
        assert_eq!(names[names.len() - 2], "echo");
        assert_eq!(names[0], "help");
    }

    #[test]
    fn first_match_wins() {
        let dispatcher = CommandDispatcher::with_default_handlers();
        let name = |text: &str| dispatcher.find(&normalize(text)).map(|h| h.name());
        assert_eq!(name("/HELP"), Some("help"));
        assert_eq!(name("clear all"), Some("clear_all"));
        assert_eq!(name("clear group grp-1"), Some("clear_group"));
        assert_eq!(name("add flash to all at 1s"), Some("add"));
        assert_eq!(name("analyze beats 1s 2s"), Some("analyze"));
        assert_eq!(name("list plans"), Some("plans"));
        assert_eq!(name("flash red on parcan_l at 10s"), Some("freetext"));
    }
}
