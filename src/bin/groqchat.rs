//! Interactive chat with Groq-hosted models.
//!
//! This binary provides a streaming REPL with persistent multi-chat history,
//! a typing effect, file attachments, and optional voice input.
//!
//! # Usage
//!
//! ```bash
//! # Basic usage with default settings
//! groqchat
//!
//! # Specify a model and language
//! groqchat --model llama-3.3-70b-versatile --lang en
//!
//! # Dictate through an external speech-to-text program
//! groqchat --voice-command "my-stt --language {lang}"
//!
//! # Disable colors (useful for piping output)
//! groqchat --no-color
//! ```
//!
//! Type `/help` while chatting for the list of slash commands.

use std::path::PathBuf;

use arrrg::CommandLine;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing_subscriber::{EnvFilter, fmt};

use groqchat::chat::{
    ChatArgs, ChatCommand, ChatConfig, ChatController, ChatSessionStore, PlainTextRenderer,
    Renderer, SessionId, SessionRef, Theme, TurnOutcome, data_dir, help_text, parse_command,
};
use groqchat::utils::time::now;
use groqchat::{Attachment, FileStore, Groq, KnownModel, Model, Preferences, Storage};

type Controller = ChatController<FileStore>;

/// Main entry point for the groqchat application.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let (args, _) = ChatArgs::from_command_line_relaxed("groqchat [OPTIONS]");
    let dir = data_dir(args.data_dir.as_deref())?;
    let storage = Storage::new(FileStore::open(&dir)?);
    let prefs = Preferences::load(&storage);
    let config = ChatConfig::resolve(args, &prefs)?;

    let client = Groq::new(None)?;
    let store = ChatSessionStore::load(storage);
    let mut controller = ChatController::new(client, store, config)?;
    let mut renderer =
        PlainTextRenderer::with_color(controller.config().use_color, controller.config().theme);
    let mut rl = DefaultEditor::new()?;

    // Ctrl+C while a reply streams stops it; at the prompt rustyline reports it instead.
    let stop = controller.stop_handle();
    ctrlc::set_handler(move || {
        stop.stop();
    })?;

    println!("Groq Chat (model: {})", controller.config().model);
    println!("Type /help for commands, /quit to exit\n");
    print_welcome(&mut controller, &mut renderer);

    let mut staged: Option<Attachment> = None;
    let mut prefill: Option<String> = None;

    loop {
        let prompt = match &staged {
            Some(attachment) => format!(
                "{} [{}]: ",
                controller.config().username,
                attachment.name()
            ),
            None => format!("{}: ", controller.config().username),
        };
        let readline = match prefill.take() {
            Some(text) => rl.readline_with_initial(&prompt, (text.as_str(), "")),
            None => rl.readline(&prompt),
        };

        match readline {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() && staged.is_none() {
                    continue;
                }
                if !line.is_empty() {
                    let _ = rl.add_history_entry(line);
                }

                if let Some(cmd) = parse_command(line) {
                    match run_command(cmd, &mut controller, &mut renderer, &mut rl, &mut staged)
                        .await
                    {
                        Flow::Continue => {}
                        Flow::Prefill(text) => prefill = Some(text),
                        Flow::Quit => {
                            println!("Goodbye!");
                            break;
                        }
                    }
                    continue;
                }

                // Regular message - send to the API
                let outcome = controller.send(line, staged.as_ref(), &mut renderer).await;
                match outcome {
                    TurnOutcome::Empty | TurnOutcome::Dropped => {}
                    // Failures are logged by the controller and leave the partial reply.
                    TurnOutcome::Failed(_)
                    | TurnOutcome::Completed { .. }
                    | TurnOutcome::Cancelled { .. } => staged = None,
                }
            }
            Err(ReadlineError::Interrupted) => {
                // Ctrl+C at prompt - nothing to stop
                println!();
                continue;
            }
            Err(ReadlineError::Eof) => {
                // Ctrl+D - exit
                println!("\nGoodbye!");
                break;
            }
            Err(err) => {
                renderer.print_error(&format!("Input error: {err}"));
                break;
            }
        }
    }

    Ok(())
}

enum Flow {
    Continue,
    Prefill(String),
    Quit,
}

async fn run_command(
    cmd: ChatCommand,
    controller: &mut Controller,
    renderer: &mut PlainTextRenderer,
    rl: &mut DefaultEditor,
    staged: &mut Option<Attachment>,
) -> Flow {
    let strings = controller.config().locale.strings();
    match cmd {
        ChatCommand::Quit => return Flow::Quit,
        ChatCommand::Help => {
            for line in help_text().lines() {
                println!("    {line}");
            }
        }
        ChatCommand::New => {
            controller.new_session();
            print_welcome(controller, renderer);
        }
        ChatCommand::Chats => print_sessions(controller, renderer),
        ChatCommand::Open(target) => match resolve(controller, Some(target)) {
            Some(id) => {
                controller.store_mut().select_session(id);
                print_history(controller, renderer);
            }
            None => renderer.print_error("No such chat; see /chats"),
        },
        ChatCommand::Rename(title) => {
            let title = match title {
                Some(title) => title,
                None => match rl.readline("Title: ") {
                    Ok(title) => title.trim().to_string(),
                    Err(_) => return Flow::Continue,
                },
            };
            let id = controller.active_id();
            controller.store_mut().rename_session(id, &title);
            renderer.print_info(&format!("Renamed to: {title}"));
        }
        ChatCommand::Pin(target) => match resolve(controller, target) {
            Some(id) => {
                controller.store_mut().toggle_pin(id);
                let pinned = controller.store().get(id).is_some_and(|s| s.pinned);
                renderer.print_info(if pinned { "Pinned." } else { "Unpinned." });
            }
            None => renderer.print_error("No such chat; see /chats"),
        },
        ChatCommand::Delete(target) => match resolve(controller, target) {
            Some(id) => {
                let title = controller
                    .store()
                    .get(id)
                    .map(|s| s.title.clone())
                    .unwrap_or_default();
                let question = format!("{} \"{title}\" [y/N] ", strings.confirm_delete);
                if confirm(rl, &question) {
                    controller.delete_session(id);
                    renderer.print_info("Deleted.");
                    print_welcome(controller, renderer);
                }
            }
            None => renderer.print_error("No such chat; see /chats"),
        },
        ChatCommand::Clear => {
            controller.clear_active();
            renderer.print_info("Conversation cleared.");
            print_welcome(controller, renderer);
        }
        ChatCommand::Export(dir) => {
            let dir = dir.map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."));
            match controller.export_active(&dir) {
                Ok(path) => renderer.print_info(&format!("Saved {}", path.display())),
                Err(err) => renderer.print_error(&format!("Export failed: {err}")),
            }
        }
        ChatCommand::Attach(path) => match Attachment::new(&path) {
            Ok(attachment) => {
                renderer.print_info(&format!(
                    "Attached {} ({}). Type a message or press Enter to send it.",
                    attachment.name(),
                    attachment.mime()
                ));
                if attachment.is_image() && !controller.config().model.accepts_images() {
                    renderer.print_info(&format!(
                        "{} does not read images; try /model with a vision model (see /models).",
                        controller.config().model
                    ));
                }
                *staged = Some(attachment);
            }
            Err(err) => renderer.print_error(&err.to_string()),
        },
        ChatCommand::Detach => {
            if staged.take().is_some() {
                renderer.print_info("Attachment removed.");
            }
        }
        ChatCommand::Voice => {
            renderer.print_info(strings.listening);
            match controller.listen().await {
                Ok(text) if !text.is_empty() => return Flow::Prefill(text),
                Ok(_) => {}
                Err(err) if err.is_unsupported() => {
                    // Blocking alert: nothing happens until the user acknowledges it.
                    renderer.print_error(strings.voice_unsupported);
                    let _ = rl.readline("[Enter] ");
                }
                Err(err) => renderer.print_error(&err.to_string()),
            }
        }
        ChatCommand::Model(name) => match name.parse::<Model>() {
            Ok(model) => {
                renderer.print_info(&format!("Model changed to: {model}"));
                controller.set_model(model);
            }
            Err(err) => renderer.print_error(&err),
        },
        ChatCommand::Models => {
            for known in KnownModel::ALL {
                let marker = if controller.config().model == Model::Known(known) {
                    "*"
                } else {
                    " "
                };
                let vision = if known.supports_images() { " (vision)" } else { "" };
                println!("  {marker} {:<48} {}{vision}", known.as_str(), known.label());
            }
        }
        ChatCommand::Lang(locale) => {
            let locale = locale.unwrap_or_else(|| controller.config().locale.toggled());
            report(renderer, controller.set_locale(locale), &format!("Language: {locale}"));
        }
        ChatCommand::Theme(theme) => {
            let theme = theme.unwrap_or_else(|| match controller.config().theme {
                Theme::Dark => Theme::Light,
                Theme::Light => Theme::Dark,
            });
            renderer.set_theme(theme);
            let label = if theme.is_dark() { "dark" } else { "light" };
            report(renderer, controller.set_theme(theme), &format!("Theme: {label}"));
        }
        ChatCommand::Name(name) => {
            report(
                renderer,
                controller.set_username(&name),
                &format!("Name: {name}"),
            );
        }
        ChatCommand::History => print_history(controller, renderer),
        ChatCommand::ShowConfig => print_config(controller),
        ChatCommand::Invalid(message) => renderer.print_error(&message),
    }
    Flow::Continue
}

fn report(renderer: &mut PlainTextRenderer, result: groqchat::Result<()>, done: &str) {
    match result {
        Ok(()) => renderer.print_info(done),
        Err(err) => renderer.print_error(&format!("Could not save preference: {err}")),
    }
}

fn confirm(rl: &mut DefaultEditor, question: &str) -> bool {
    match rl.readline(question) {
        Ok(answer) => matches!(
            answer.trim().to_lowercase().as_str(),
            "y" | "yes" | "e" | "evet"
        ),
        Err(_) => false,
    }
}

fn resolve(controller: &mut Controller, target: Option<SessionRef>) -> Option<SessionId> {
    let Some(target) = target else {
        return Some(controller.active_id());
    };
    let ordered = controller
        .store()
        .grouped(controller.config().locale, now())
        .ordered_ids();
    target.resolve(&ordered)
}

fn print_welcome(controller: &mut Controller, renderer: &mut PlainTextRenderer) {
    let id = controller.active_id();
    let fresh = controller.store().get(id).is_none_or(|s| s.is_fresh());
    if !fresh {
        return;
    }
    let strings = controller.config().locale.strings();
    renderer.print_heading(strings.welcome);
    for suggestion in strings.suggestions {
        renderer.print_info(&format!("  - {suggestion}"));
    }
}

fn print_sessions(controller: &mut Controller, renderer: &mut PlainTextRenderer) {
    let active = controller.active_id();
    let locale = controller.config().locale;
    let strings = locale.strings();
    let groups = controller.store().grouped(locale, now());
    let mut number = 0;
    let mut line = |session: &groqchat::chat::ChatSession| {
        number += 1;
        let marker = if session.id == active { "*" } else { " " };
        let pin = if session.pinned { " (pinned)" } else { "" };
        format!("  {marker}{number:>3}. {}{pin}", session.title)
    };

    if !groups.pinned.is_empty() {
        renderer.print_heading(strings.pinned);
        for &session in &groups.pinned {
            let text = line(session);
            renderer.print_info(&text);
        }
    }
    renderer.print_heading(strings.recents);
    if groups.recent.is_empty() {
        renderer.print_info(&format!("  {}", strings.no_recent_chats));
    }
    for (label, sessions) in &groups.recent {
        renderer.print_info(&format!(" {label}"));
        for &session in sessions {
            let text = line(session);
            renderer.print_info(&text);
        }
    }
}

fn print_history(controller: &mut Controller, renderer: &mut PlainTextRenderer) {
    let id = controller.active_id();
    let username = controller.config().username.clone();
    let Some(session) = controller.store().get(id) else {
        return;
    };
    renderer.print_heading(&session.title);
    if session.is_fresh() {
        print_welcome(controller, renderer);
        return;
    }
    for message in session.visible_messages() {
        let label = match message.role() {
            groqchat::Role::User => username.as_str(),
            groqchat::Role::Assistant => message.role().export_label(),
        };
        renderer.print_message(label, message.role(), message.content());
    }
}

fn print_config(controller: &Controller) {
    let config = controller.config();
    println!("    Current Configuration:");
    println!("      Model: {}", config.model);
    println!("      Language: {}", config.locale);
    println!(
        "      Theme: {}",
        if config.theme.is_dark() { "dark" } else { "light" }
    );
    println!("      Name: {}", config.username);
    match config.max_tokens {
        Some(max) => println!("      Max tokens: {max}"),
        None => println!("      Max tokens: (endpoint default)"),
    }
    match config.temperature {
        Some(temperature) => println!("      Temperature: {temperature}"),
        None => println!("      Temperature: (endpoint default)"),
    }
    println!("      Typing tick: {}ms", config.tick.as_millis());
    match config.voice_command.as_deref() {
        Some(command) => println!("      Voice command: {command}"),
        None => println!("      Voice command: (none)"),
    }
    println!(
        "      Data directory: {}",
        controller.store().storage().store().dir().display()
    );
}
