//! Interactive session setup: resume an old session or start a new one

use cosmos_core::identity::FALLBACK_BOT_NAME;
use cosmos_core::{
    ChatSession, Customization, CustomizationLoader, IdentityFile, SessionStore, default_identity,
};
use reedline::{Prompt, Reedline, Signal};
use std::borrow::Cow;

const DEFAULT_USER_NAME: &str = "User";

/// Source of answers to setup questions
pub trait Console {
    /// Ask a question; `None` means the user bailed out (Ctrl-C / Ctrl-D)
    fn ask(&mut self, question: &str) -> anyhow::Result<Option<String>>;
}

/// Console backed by a plain reedline editor
pub struct ReedlineConsole {
    editor: Reedline,
}

impl ReedlineConsole {
    pub fn new() -> Self {
        Self {
            editor: Reedline::create(),
        }
    }
}

impl Default for ReedlineConsole {
    fn default() -> Self {
        Self::new()
    }
}

impl Console for ReedlineConsole {
    fn ask(&mut self, question: &str) -> anyhow::Result<Option<String>> {
        let prompt = QuestionPrompt(question);
        match self.editor.read_line(&prompt)? {
            Signal::Success(line) => Ok(Some(line)),
            Signal::CtrlC | Signal::CtrlD => Ok(None),
        }
    }
}

/// Prompt that renders the question itself
struct QuestionPrompt<'a>(&'a str);

impl Prompt for QuestionPrompt<'_> {
    fn render_prompt_left(&self) -> Cow<'_, str> {
        Cow::Borrowed(self.0)
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

/// Y/N answer; anything but yes counts as no
fn is_yes(answer: &str) -> bool {
    let answer = answer.trim();
    answer.eq_ignore_ascii_case("y") || answer.eq_ignore_ascii_case("yes")
}

/// 1-based menu choice to an index, if in range
fn parse_choice(input: &str, count: usize) -> Option<usize> {
    match input.trim().parse::<usize>() {
        Ok(n) if (1..=count).contains(&n) => Some(n - 1),
        _ => None,
    }
}

/// Ask whether to resume, then resume or create a session.
///
/// Returns `None` if the user aborts at any prompt.
pub fn open_session(
    console: &mut dyn Console,
    store: &SessionStore,
    customization: &CustomizationLoader,
    max_history: usize,
) -> anyhow::Result<Option<ChatSession>> {
    let Some(answer) = console.ask("Do you want to continue a previous session? (Y/N) > ")? else {
        return Ok(None);
    };

    if is_yes(&answer) {
        continue_session(console, store, customization, max_history)
    } else {
        start_new_session(console, store, customization, max_history)
    }
}

fn continue_session(
    console: &mut dyn Console,
    store: &SessionStore,
    customization: &CustomizationLoader,
    max_history: usize,
) -> anyhow::Result<Option<ChatSession>> {
    let sessions = store.list()?;
    if sessions.is_empty() {
        println!("No previous sessions found.");
        return start_new_session(console, store, customization, max_history);
    }

    println!("Choose a session to continue:");
    for (idx, id) in sessions.iter().enumerate() {
        println!("{}. {}", idx + 1, id);
    }

    loop {
        let Some(input) = console.ask("Enter the session number: ")? else {
            return Ok(None);
        };

        match parse_choice(&input, sessions.len()) {
            Some(idx) => {
                let session = ChatSession::resume(store.clone(), &sessions[idx], max_history)?;
                return Ok(Some(session));
            }
            None => println!("Please enter a number between 1 and {}.", sessions.len()),
        }
    }
}

fn start_new_session(
    console: &mut dyn Console,
    store: &SessionStore,
    customization: &CustomizationLoader,
    max_history: usize,
) -> anyhow::Result<Option<ChatSession>> {
    println!("Starting a new session.");

    let custom = load_customization(customization);

    let user_name = match custom.user_name.clone() {
        Some(name) => name,
        None => match console.ask("What's your name? > ")? {
            Some(name) => or_default(name, DEFAULT_USER_NAME),
            None => return Ok(None),
        },
    };

    let bot_name = match custom.bot_name.clone() {
        Some(name) => name,
        None => match console.ask("What name do you want for the bot? > ")? {
            Some(name) => or_default(name, FALLBACK_BOT_NAME),
            None => return Ok(None),
        },
    };

    let identity = match custom.identity_text.clone() {
        Some(text) => {
            println!(
                "Custom identity loaded from '{}':\n{}",
                customization.dir().display(),
                text
            );
            text
        }
        None => {
            let Some(answer) =
                console.ask("Do you want to provide a custom identity for the bot? (Y/N) > ")?
            else {
                return Ok(None);
            };

            if is_yes(&answer) {
                match console.ask("Please type the identity for the bot: ")? {
                    Some(text) if !text.trim().is_empty() => text.trim().to_string(),
                    Some(_) => default_identity(&bot_name, &user_name),
                    None => return Ok(None),
                }
            } else {
                default_identity(&bot_name, &user_name)
            }
        }
    };

    let identity = IdentityFile::new(user_name, bot_name, identity);
    let session = ChatSession::start(store.clone(), &identity, custom.history, max_history)?;
    tracing::info!(session = %session.id(), "Started new session");

    Ok(Some(session))
}

/// Read overrides, reporting the outcome the way the user expects to see it
fn load_customization(loader: &CustomizationLoader) -> Customization {
    match loader.try_load() {
        Ok(Some(custom)) => {
            println!(
                "Custom identity and chat history loaded from '{}' folder.",
                loader.dir().display()
            );
            custom
        }
        Ok(None) => Customization::default(),
        Err(e) => {
            println!("Error: Could not decode JSON in customization files.");
            tracing::warn!(error = %e, "Ignoring customization files");
            Customization::default()
        }
    }
}

fn or_default(value: String, default: &str) -> String {
    let value = value.trim();
    if value.is_empty() {
        default.to_string()
    } else {
        value.to_string()
    }
}
