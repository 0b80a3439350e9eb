//! Terminal client for the Cloud Advisor server
//!
//! (c) Softlandia 2025

use cloud_advisor::client::{
    ChatSession, ChatState, ClientSettings, HttpChatRelay, HttpHistoryStore, NoticeLevel,
};
use cloud_advisor::infrastructure::entities::MessageRole;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::runtime::{Builder, Runtime};

const HELP: &str = "\
Type a message to chat. Commands:
  /new             start a new conversation
  /list            list saved conversations
  /open <id>       open a saved conversation
  /title <text>    rename the current conversation
  /delete [id]     delete a conversation (default: the current one)
  /help            show this help
  /quit            exit";

type Session = ChatSession<HttpChatRelay, HttpHistoryStore>;

fn main() -> anyhow::Result<()> {
    cloud_advisor::init_tracing("warn");

    let settings = ClientSettings::from_env();
    let runtime: Runtime = Builder::new_multi_thread().enable_all().build()?;

    runtime.block_on(run(settings))
}

async fn run(settings: ClientSettings) -> anyhow::Result<()> {
    let mut session = ChatSession::new(
        HttpChatRelay::new(&settings),
        HttpHistoryStore::new(&settings),
    );

    println!("Cloud Advisor at {}", settings.backend_url);
    println!("{HELP}");
    session.refresh().await;
    print_notices(&mut session);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    prompt()?;

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            prompt()?;
            continue;
        }

        match line.split_once(' ').unwrap_or((line, "")) {
            ("/quit" | "/exit", _) => break,
            ("/help", _) => println!("{HELP}"),
            ("/new", _) => {
                session.new_chat();
                println!("(new conversation)");
            }
            ("/list", _) => {
                session.refresh().await;
                print_conversations(session.state());
            }
            ("/open", id) if !id.trim().is_empty() => {
                if session.open(id.trim()).await.is_ok() {
                    print_transcript(session.state());
                }
            }
            ("/title", title) if !title.trim().is_empty() => match session.state().current() {
                Some(id) => {
                    let id = id.to_owned();
                    if session.rename(&id, title.trim()).await.is_ok() {
                        println!("(renamed)");
                    }
                }
                None => println!("(nothing to rename yet)"),
            },
            ("/delete", id) => {
                let target = match id.trim() {
                    "" => session.state().current().map(str::to_owned),
                    id => Some(id.to_owned()),
                };
                match target {
                    Some(id) => {
                        if session.delete(&id).await.is_ok() {
                            println!("(deleted {id})");
                        }
                    }
                    None => println!("(no conversation selected)"),
                }
            }
            (command, _) if command.starts_with('/') => {
                println!("unknown command {command}, try /help");
            }
            _ => {
                let mut renderer = StreamRenderer::default();
                print!("assistant> ");
                std::io::stdout().flush()?;
                let result = session
                    .send(line, &mut |state: &ChatState| renderer.render(state))
                    .await;
                println!();
                if result.is_err() {
                    println!("(reply discarded)");
                }
            }
        }

        print_notices(&mut session);
        prompt()?;
    }

    Ok(())
}

/// Prints only the part of the streaming reply that has not been printed yet.
#[derive(Default)]
struct StreamRenderer {
    shown: usize,
}

impl StreamRenderer {
    fn render(&mut self, state: &ChatState) {
        if !state.is_loading() {
            return;
        }
        let Some(reply) = state.transcript().last() else {
            return;
        };
        if reply.role != MessageRole::Assistant {
            return;
        }
        if let Some(fresh) = reply.content.get(self.shown..) {
            print!("{fresh}");
            let _ = std::io::stdout().flush();
            self.shown = reply.content.len();
        }
    }
}

fn prompt() -> std::io::Result<()> {
    print!("you> ");
    std::io::stdout().flush()
}

fn print_notices(session: &mut Session) {
    for notice in session.state_mut().take_notices() {
        let tag = match notice.level {
            NoticeLevel::Info => "info",
            NoticeLevel::Warning => "warning",
            NoticeLevel::Error => "error",
        };
        eprintln!("[{tag}] {}", notice.message);
    }
}

fn print_conversations(state: &ChatState) {
    if state.conversations().is_empty() {
        println!("(no saved conversations)");
        return;
    }
    for conversation in state.conversations() {
        let marker = if state.current() == Some(conversation.id.as_str()) {
            "*"
        } else {
            " "
        };
        println!(
            "{marker} {}  {}  {}",
            conversation.id,
            conversation.updated_at.format("%Y-%m-%d %H:%M"),
            conversation.title.as_deref().unwrap_or("(untitled)")
        );
    }
}

fn print_transcript(state: &ChatState) {
    for entry in state.transcript() {
        let speaker = match entry.role {
            MessageRole::User => "you",
            MessageRole::Assistant => "assistant",
        };
        println!("{speaker}> {}", entry.content);
    }
}
