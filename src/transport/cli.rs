//! CLI transport for direct terminal interaction

use crate::mcp::release;
use crate::session::{ChatAction, ChatMessage, SessionController, SessionServices};
use anyhow::Result;
use colored::Colorize;
use std::io::{self, BufRead, Write};

/// How a terminal chat loop finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatExit {
    /// Input ran out; the session was ended normally
    EndOfInput,
    /// The exit action was chosen; the caller must terminate immediately
    Terminate,
}

/// Map a `/command` line to its action
fn command_action(input: &str) -> Option<ChatAction> {
    match input {
        "/reset" => Some(ChatAction::ResetAgent),
        "/reload" => Some(ChatAction::ReloadEnv),
        "/exit" | "/quit" => Some(ChatAction::ExitApp),
        _ => None,
    }
}

fn command_for(action: ChatAction) -> &'static str {
    match action {
        ChatAction::ResetAgent => "/reset",
        ChatAction::ReloadEnv => "/reload",
        ChatAction::ExitApp => "/exit",
    }
}

fn print_message<W: Write>(out: &mut W, message: &ChatMessage) -> io::Result<()> {
    writeln!(out, "\n{}\n", message.content)?;
    if !message.actions.is_empty() {
        let hints: Vec<String> = message
            .actions
            .iter()
            .filter_map(|button| button.name.parse::<ChatAction>().ok())
            .map(|action| format!("{} {}", command_for(action).cyan(), action.label()))
            .collect();
        writeln!(out, "{}\n", hints.join("   ").dimmed())?;
    }
    Ok(())
}

/// Drive one session from line-oriented input until EOF or the exit action
pub async fn chat_loop<R, W>(
    session: &mut SessionController,
    input: R,
    out: &mut W,
) -> Result<ChatExit>
where
    R: BufRead,
    W: Write,
{
    let start = session.start().await;
    print_message(out, &start)?;

    let mut lines = input.lines();
    loop {
        write!(out, "{} ", ">".bold())?;
        out.flush()?;

        let Some(line) = lines.next() else {
            break;
        };
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(action) = command_action(line) {
            let reply = session.action(action).await;
            for message in &reply.messages {
                print_message(out, message)?;
            }
            if reply.terminate {
                out.flush()?;
                return Ok(ChatExit::Terminate);
            }
            continue;
        }

        let reply = session.message(line).await;
        print_message(out, &reply)?;
    }

    writeln!(out)?;
    session.end().await;
    Ok(ChatExit::EndOfInput)
}

/// Run interactive chat mode on stdin/stdout
pub async fn run_chat(services: SessionServices) -> Result<()> {
    println!("{}", "dbagent chat".bold().cyan());
    println!(
        "Type a question. Commands: {}, {}, {}. Ctrl-D ends the session.",
        "/reset".cyan(),
        "/reload".cyan(),
        "/exit".cyan()
    );

    let mut session = SessionController::new(services);
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    match chat_loop(&mut session, stdin.lock(), &mut stdout).await? {
        ChatExit::EndOfInput => Ok(()),
        ChatExit::Terminate => {
            // Immediate exit, no teardown of the open clients
            std::process::exit(0);
        }
    }
}

/// Connect to every active backend, print its tools, then disconnect
pub async fn run_tools(services: SessionServices) -> Result<()> {
    let config = services.config.load();
    config.require_active_backend()?;

    for backend in config.active_backends() {
        let name = backend.backend.server_name();
        println!(
            "\n{} {}",
            backend.backend.label().bold().cyan(),
            format!("({})", backend.url).dimmed()
        );

        let client = match services.connector.open(name, &backend.url).await {
            Ok(client) => client,
            Err(e) => {
                println!("  {} {:#}", "✗".red(), e);
                continue;
            }
        };

        let tools = client.tools();
        println!("  {} {} tools", "✓".green(), tools.len());
        for tool in tools {
            let summary = tool.description.lines().next().unwrap_or_default();
            println!("  {} {}", tool.name.green(), summary.dimmed());
        }

        release(client.as_ref()).await;
    }

    Ok(())
}
