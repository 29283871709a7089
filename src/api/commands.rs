//! Chat commands
//!
//! A plain line is sent as a message; lines starting with `/` are commands.
//! Message numbers are 1-based, as shown by `/list`.

use std::sync::Arc;

use crate::core::conversation::{Conversation, MessageState};
use crate::core::languages::{language_name, SUPPORTED_LANGUAGES};
use crate::shared::error::{AppError, AppResult};
use crate::shared::types::Message;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    Send(String),
    Draft(String),
    Translate(usize),
    Target { index: usize, language: String },
    Summarize(usize),
    List,
    Languages,
    Clear,
    Help,
    Quit,
}

/// What the front end should do after a command ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Text(String),
    Silent,
    Quit,
}

pub const HELP: &str = "\
Type a message and press enter to send it.
  /draft <text>            detect the language of a draft
  /translate <n>           translate message n (again to reverse)
  /target <n> <language>   change the target language of message n
  /summarize <n>           summarize a long message
  /list                    show the conversation
  /languages               list target languages
  /clear                   delete the whole conversation
  /quit                    exit";

fn parse_index(arg: Option<&str>) -> AppResult<usize> {
    let raw = arg.ok_or_else(|| AppError::Validation("Missing message number".to_string()))?;
    match raw.parse::<usize>() {
        Ok(n) if n > 0 => Ok(n - 1),
        _ => Err(AppError::Validation(format!("Invalid message number: {}", raw))),
    }
}

impl ChatCommand {
    pub fn parse(line: &str) -> AppResult<Self> {
        let line = line.trim();
        let Some(rest) = line.strip_prefix('/') else {
            return Ok(ChatCommand::Send(line.to_string()));
        };

        let (name, args) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
        let args = args.trim();
        let mut words = args.split_whitespace();
        match name {
            "draft" => Ok(ChatCommand::Draft(args.to_string())),
            "translate" | "t" => Ok(ChatCommand::Translate(parse_index(words.next())?)),
            "target" => {
                let index = parse_index(words.next())?;
                let language = words
                    .next()
                    .ok_or_else(|| AppError::Validation("Missing language".to_string()))?;
                Ok(ChatCommand::Target {
                    index,
                    language: language.to_string(),
                })
            }
            "summarize" | "s" => Ok(ChatCommand::Summarize(parse_index(words.next())?)),
            "list" | "ls" => Ok(ChatCommand::List),
            "languages" => Ok(ChatCommand::Languages),
            "clear" => Ok(ChatCommand::Clear),
            "help" | "?" => Ok(ChatCommand::Help),
            "quit" | "exit" | "q" => Ok(ChatCommand::Quit),
            other => Err(AppError::Validation(format!("Unknown command: /{}", other))),
        }
    }
}

/// One line per message: number, sender, languages and text.
pub fn render_message(number: usize, message: &Message, state: Option<MessageState>) -> String {
    let who = if message.summary {
        "summary"
    } else if message.is_user() {
        "you"
    } else {
        "bot"
    };
    let languages = match (&message.source_language, state) {
        (_, Some(MessageState::Composed)) => "detecting…".to_string(),
        (Some(source), _) if message.is_user() => format!(
            "{} → {}",
            language_name(source),
            language_name(&message.target_language)
        ),
        (None, _) if message.is_user() => "language unknown".to_string(),
        _ => String::new(),
    };
    let mut line = format!("[{}] {}", number, who);
    if !languages.is_empty() {
        line.push_str(&format!(" ({})", languages));
    }
    if message.translated {
        line.push_str(" [translated]");
    }
    line.push_str(": ");
    line.push_str(&message.text);
    line
}

fn render_conversation(conversation: &Conversation) -> String {
    let messages = conversation.messages();
    if messages.is_empty() {
        return "No messages yet.".to_string();
    }
    messages
        .iter()
        .enumerate()
        .map(|(i, message)| render_message(i + 1, message, conversation.message_state(i)))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Run one command.
pub async fn execute(conversation: &Arc<Conversation>, command: ChatCommand) -> AppResult<Reply> {
    match command {
        ChatCommand::Send(text) => {
            conversation.send_message(&text)?;
            Ok(Reply::Silent)
        }
        ChatCommand::Draft(text) => {
            let outcome = conversation.set_draft(&text).await;
            Ok(Reply::Text(match outcome.language() {
                Some(code) => format!("Draft language: {}", language_name(code)),
                None => "Draft language: unknown".to_string(),
            }))
        }
        ChatCommand::Translate(index) => {
            if conversation.translate(index).await? {
                Ok(Reply::Text(render_one(conversation, index)))
            } else {
                Ok(Reply::Text("Nothing to translate.".to_string()))
            }
        }
        ChatCommand::Target { index, language } => {
            if conversation.change_target_language(index, &language)? {
                Ok(Reply::Text(render_one(conversation, index)))
            } else {
                Ok(Reply::Text("No such message.".to_string()))
            }
        }
        ChatCommand::Summarize(index) => {
            if !conversation.can_summarize(index) {
                return Ok(Reply::Text("Message is too short to summarize.".to_string()));
            }
            Ok(match conversation.summarize(index).await? {
                Some(_) => Reply::Text(render_one(conversation, index + 1)),
                // Unavailable, cancelled or already running; details are logged.
                None => Reply::Text("No summary was added.".to_string()),
            })
        }
        ChatCommand::List => Ok(Reply::Text(render_conversation(conversation))),
        ChatCommand::Languages => Ok(Reply::Text(
            SUPPORTED_LANGUAGES
                .iter()
                .map(|(code, name)| format!("{}  {}", code, name))
                .collect::<Vec<_>>()
                .join("\n"),
        )),
        ChatCommand::Clear => {
            conversation.clear();
            Ok(Reply::Text("Conversation cleared.".to_string()))
        }
        ChatCommand::Help => Ok(Reply::Text(HELP.to_string())),
        ChatCommand::Quit => Ok(Reply::Quit),
    }
}

fn render_one(conversation: &Conversation, index: usize) -> String {
    conversation
        .message(index)
        .map(|m| render_message(index + 1, &m, conversation.message_state(index)))
        .unwrap_or_default()
}
