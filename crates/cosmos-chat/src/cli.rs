//! Interactive chat loop
//!
//! Reads a line, sends it with the recent history, prints the reply.
//! Lines starting with `/` are local commands.

use cosmos_core::{ChatClient, ChatCompletionRequest, ChatConfig, ChatSession, Message, Role};
use nu_ansi_term::{Color, Style};
use reedline::{
    ColumnarMenu, Completer, DefaultHinter, Emacs, KeyCode, KeyModifiers, Keybindings,
    MenuBuilder, Prompt, Reedline, ReedlineEvent, ReedlineMenu, Signal, Suggestion,
};
use std::borrow::Cow;
use tracing::{debug, info, warn};

/// Available commands for autocomplete display
const COMMANDS: &[(&str, &str)] = &[
    ("/help", "Show available commands"),
    ("/history", "Show the conversation so far"),
    ("/session", "Show the session files"),
    ("/exit", "Leave the chat"),
    ("/quit", "Leave the chat"),
];

/// Command completer for reedline
#[derive(Clone)]
pub struct CommandCompleter {
    commands: Vec<(&'static str, &'static str)>,
}

impl CommandCompleter {
    pub fn new() -> Self {
        Self {
            commands: COMMANDS.to_vec(),
        }
    }
}

impl Completer for CommandCompleter {
    fn complete(&mut self, line: &str, pos: usize) -> Vec<Suggestion> {
        if !line.starts_with('/') {
            return Vec::new();
        }

        self.commands
            .iter()
            .filter(|(cmd, _)| cmd.starts_with(line))
            .map(|(cmd, desc)| Suggestion {
                value: cmd.to_string(),
                description: Some(desc.to_string()),
                extra: None,
                span: reedline::Span::new(0, pos),
                append_whitespace: true,
                style: None,
            })
            .collect()
    }
}

impl Default for CommandCompleter {
    fn default() -> Self {
        Self::new()
    }
}

/// `> ` prompt with colored styling
struct ColoredPrompt {
    style: Style,
}

impl ColoredPrompt {
    fn new() -> Self {
        Self {
            style: Color::Cyan.bold(),
        }
    }
}

impl Prompt for ColoredPrompt {
    fn render_prompt_left(&self) -> Cow<'_, str> {
        Cow::Owned(self.style.paint("> ").to_string())
    }

    fn render_prompt_right(&self) -> Cow<'_, str> {
        Cow::Borrowed("")
    }

    fn render_prompt_indicator(&self, _prompt_mode: reedline::PromptEditMode) -> Cow<'_, str> {
        Cow::Borrowed("")
    }

    fn render_prompt_multiline_indicator(&self) -> Cow<'_, str> {
        Cow::Borrowed("")
    }

    fn render_prompt_history_search_indicator(
        &self,
        _history_search: reedline::PromptHistorySearch,
    ) -> Cow<'_, str> {
        Cow::Borrowed("")
    }
}

/// What the loop should do after a line was inspected
#[derive(Debug, PartialEq, Eq)]
enum CommandOutcome {
    /// Not a command; send it to the bot
    Chat,
    /// Command handled; read the next line
    Handled,
    /// Leave the loop
    Exit,
}

/// Run the chat loop until the user leaves or a fatal error occurs
pub async fn run_chat(
    client: ChatClient,
    mut session: ChatSession,
    config: &ChatConfig,
) -> anyhow::Result<()> {
    info!(session = %session.id(), "Starting chat loop");

    println!("\nThe conversation with {} has started!\n", session.bot_name());

    let mut keybindings = default_keybindings();
    keybindings.add_binding(
        KeyModifiers::NONE,
        KeyCode::Char('/'),
        ReedlineEvent::Edit(vec![reedline::EditCommand::Complete]),
    );

    let menu = Box::new(
        ColumnarMenu::default()
            .with_name("command_menu")
            .with_columns(1)
            .with_column_width(Some(40))
            .with_only_buffer_difference(false),
    );

    let hinter = DefaultHinter::default().with_style(Style::new().dimmed());

    let mut line_editor = Reedline::create()
        .with_completer(Box::new(CommandCompleter::new()))
        .with_menu(ReedlineMenu::EngineCompleter(menu))
        .with_hinter(Box::new(hinter))
        .with_edit_mode(Box::new(Emacs::new(keybindings)));

    let prompt = ColoredPrompt::new();

    loop {
        match line_editor.read_line(&prompt) {
            Ok(Signal::Success(line)) => {
                if process_line(&client, &mut session, &line, config).await? == CommandOutcome::Exit {
                    break;
                }
            }
            Ok(Signal::CtrlC) => {
                println!("^C");
                continue;
            }
            Ok(Signal::CtrlD) => break,
            Err(err) => {
                eprintln!("\nError: {}\n", err);
                break;
            }
        }
    }

    println!("\nGoodbye!\n");
    Ok(())
}

/// Handle one line of input.
///
/// Commands are matched on the trimmed line; chat input is sent as typed.
/// Recoverable turn errors are printed and the loop goes on. Anything else
/// is returned.
async fn process_line(
    client: &ChatClient,
    session: &mut ChatSession,
    line: &str,
    config: &ChatConfig,
) -> anyhow::Result<CommandOutcome> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(CommandOutcome::Handled);
    }

    match handle_command(trimmed, session) {
        CommandOutcome::Chat => {}
        outcome => return Ok(outcome),
    }

    let show_payload = config.show_payload;
    let result = session
        .send_with(client, line, |request| echo_payload(request, show_payload))
        .await;

    match result {
        Ok(reply) => println!("{}: {}", session.bot_name(), reply),
        Err(e) if e.is_recoverable() => eprintln!("Error: {}", e),
        Err(e) => {
            debug!(session = %session.id(), "Ending chat on fatal error: {}", e);
            return Err(e.into());
        }
    }

    Ok(CommandOutcome::Chat)
}

/// Log the outgoing payload, and print it when asked to
fn echo_payload(request: &ChatCompletionRequest, show: bool) {
    match serde_json::to_string_pretty(request) {
        Ok(payload) => {
            debug!("Request payload: {}", payload);
            if show {
                println!("Sending data to API: {}", payload);
            }
        }
        Err(e) => warn!("Could not render request payload: {}", e),
    }
}

/// Default keybindings for reedline
fn default_keybindings() -> Keybindings {
    let mut keybindings = Keybindings::new();
    keybindings.add_binding(
        KeyModifiers::NONE,
        KeyCode::Tab,
        ReedlineEvent::Edit(vec![reedline::EditCommand::Complete]),
    );
    keybindings.add_binding(KeyModifiers::NONE, KeyCode::Enter, ReedlineEvent::Submit);
    keybindings.add_binding(KeyModifiers::NONE, KeyCode::Esc, ReedlineEvent::Esc);
    keybindings.add_binding(
        KeyModifiers::CONTROL,
        KeyCode::Char('c'),
        ReedlineEvent::CtrlC,
    );
    keybindings.add_binding(
        KeyModifiers::CONTROL,
        KeyCode::Char('d'),
        ReedlineEvent::CtrlD,
    );
    keybindings.add_binding(KeyModifiers::NONE, KeyCode::Up, ReedlineEvent::Up);
    keybindings.add_binding(KeyModifiers::NONE, KeyCode::Down, ReedlineEvent::Down);
    keybindings
}

/// Handle `/` commands
fn handle_command(input: &str, session: &ChatSession) -> CommandOutcome {
    let lower = input.to_lowercase();

    match lower.as_str() {
        "/exit" | "/quit" | "/q" => CommandOutcome::Exit,
        "/help" | "/?" => {
            print_help();
            CommandOutcome::Handled
        }
        "/history" => {
            print_history(session.messages(), session.bot_name());
            CommandOutcome::Handled
        }
        "/session" => {
            println!();
            println!("Session: {}", session.id());
            println!("  history:  {}", session.history_path().display());
            println!("  identity: {}", session.identity_path().display());
            println!("  messages: {}", session.messages().len());
            println!();
            CommandOutcome::Handled
        }
        _ if lower.starts_with('/') => {
            eprintln!("Unknown command: {}. Type /help for the command list.", input);
            CommandOutcome::Handled
        }
        _ => CommandOutcome::Chat,
    }
}

/// Print help message
fn print_help() {
    println!();
    println!("Available commands:");
    for (cmd, desc) in COMMANDS {
        println!("  {} - {}", cmd, desc);
    }
    println!();
    println!("Anything else is sent to the bot. Ctrl-D also leaves the chat.");
    println!();
}

/// One line per stored message
fn history_lines(messages: &[Message], bot_name: &str) -> Vec<String> {
    messages
        .iter()
        .enumerate()
        .map(|(i, msg)| {
            let who = match msg.role {
                Role::System => "system",
                Role::User => "you",
                Role::Assistant => bot_name,
            };
            let preview: String = msg.content.chars().take(100).collect();
            let ellipsis = if msg.content.chars().count() > 100 { "..." } else { "" };
            format!(
                "{}. [{}] {}: {}{}",
                i + 1,
                msg.timestamp,
                who,
                preview.replace('\n', " "),
                ellipsis
            )
        })
        .collect()
}

/// Print conversation history
fn print_history(messages: &[Message], bot_name: &str) {
    println!();
    println!("Conversation history ({} messages):", messages.len());
    println!("{}", "─".repeat(50));
    for line in history_lines(messages, bot_name) {
        println!("{}", line);
    }
    println!("{}", "─".repeat(50));
    println!();
}
