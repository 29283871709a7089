use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use super::commands::{execute, ChatCommand, Reply, HELP};
use crate::core::conversation::Conversation;
use crate::shared::error::{AppError, AppResult};
use crate::shared::events::ChatEvent;

/// Print events the user should see without asking for them.
fn spawn_event_printer(conversation: &Conversation) -> tokio::task::JoinHandle<()> {
    let mut rx = conversation.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(ChatEvent::Notice { text, .. }) => eprintln!("! {}", text),
                Ok(ChatEvent::DownloadProgress(progress)) => {
                    eprintln!(
                        "downloading {}: {}/{} bytes",
                        progress.kind, progress.loaded, progress.total
                    );
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => debug!(skipped, "event printer lagged"),
                Err(RecvError::Closed) => break,
            }
        }
    })
}

/// Read commands from stdin until `/quit` or end of input.
pub async fn run_repl(conversation: Arc<Conversation>) -> AppResult<()> {
    println!("{}", HELP);
    if !conversation.is_empty() {
        println!("Restored {} messages. Type /list to show them.", conversation.len());
    }

    let printer = spawn_event_printer(&conversation);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let reply = match ChatCommand::parse(&line) {
            Ok(command) => execute(&conversation, command).await,
            Err(e) => Err(e),
        };
        match reply {
            Ok(Reply::Text(text)) => println!("{}", text),
            Ok(Reply::Silent) => {}
            Ok(Reply::Quit) => break,
            Err(AppError::Validation(message)) => println!("{}", message),
            Err(e) => warn!(error = %e, "command failed"),
        }
    }

    printer.abort();
    Ok(())
}
