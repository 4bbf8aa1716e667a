//! Interactive chat loop.

use super::Context;
use crate::output;
use anyhow::Result;
use biometric_auth::NumberSubmission;
use chat_completion::{SendOutcome, SendRejection};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};
use widget_protocol_types::{Message, Sender};
use widget_runtime::{ChatWidget, InputMode, SubmitOutcome, WidgetView};

/// A line starting with `/`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Meta {
    Open,
    Close,
    Logout,
    Status,
    Help,
    Quit,
}

impl Meta {
    fn parse(line: &str) -> Option<Result<Self, String>> {
        let command = line.trim().strip_prefix('/')?;
        Some(match command.trim().to_lowercase().as_str() {
            "open" => Ok(Meta::Open),
            "close" => Ok(Meta::Close),
            "logout" => Ok(Meta::Logout),
            "status" => Ok(Meta::Status),
            "help" | "?" => Ok(Meta::Help),
            "quit" | "exit" | "q" => Ok(Meta::Quit),
            other => Err(other.to_string()),
        })
    }
}

/// Prints transcript lines the terminal has not shown yet.
#[derive(Debug, Default)]
struct Transcript {
    printed: usize,
    pending: bool,
}

impl Transcript {
    fn render(&mut self, view: &WidgetView) {
        if view.messages.len() < self.printed {
            // Transcript was cleared (logout)
            output::print_divider();
            self.printed = 0;
        }
        for message in &view.messages[self.printed..] {
            println!("{}", format_message(message));
        }
        self.printed = view.messages.len();

        if view.pending && !self.pending {
            println!("bot  > ...");
        }
        self.pending = view.pending;
    }
}

fn format_message(message: &Message) -> String {
    let prefix = match message.sender {
        Sender::Bot => "bot  > ",
        Sender::User => "you  > ",
    };
    let indent = " ".repeat(prefix.len());
    let mut lines = message.text.lines();
    let mut out = format!("{}{}", prefix, lines.next().unwrap_or_default());
    for line in lines {
        out.push('\n');
        if !line.is_empty() {
            out.push_str(&indent);
            out.push_str(line);
        }
    }
    out
}

fn prompt_hint(mode: InputMode) -> &'static str {
    match mode {
        InputMode::Country => "country (name or dial code)",
        InputMode::Phone => "phone number",
        InputMode::Waiting => "waiting for approval",
        InputMode::Retry => "phone number to retry",
        InputMode::Chat => "message",
    }
}

fn print_status(view: &WidgetView) {
    output::print_row("Widget", if view.open { "open" } else { "closed" });
    output::print_row("Auth", view.auth.status.as_str());
    if let Some(code) = &view.auth.dial_code {
        output::print_row("Country code", code);
    }
    if let Some(number) = &view.auth.full_number {
        output::print_row("Phone number", number);
    }
    if view.auth.status.is_in_flight() {
        output::print_row("Poll attempts", &view.auth.attempts_made.to_string());
    }
    output::print_row("Countries", &view.country_count.to_string());
    output::print_row("Messages", &view.messages.len().to_string());
}

fn print_help() {
    println!("Commands:");
    output::print_row("/open", "open the widget");
    output::print_row("/close", "close the widget");
    output::print_row("/logout", "forget the session and transcript");
    output::print_row("/status", "show the widget state");
    output::print_row("/quit", "leave");
}

fn report(outcome: &SubmitOutcome) {
    let hint = match outcome {
        SubmitOutcome::Busy => "Authentication in progress. Approve the request in your app.",
        SubmitOutcome::NeedCountry => "Choose a country first.",
        SubmitOutcome::Chat(SendOutcome::Rejected(SendRejection::Pending)) => {
            "Still waiting for the previous reply."
        }
        SubmitOutcome::Number(NumberSubmission::Ignored) => "Not expecting a phone number right now.",
        _ => return,
    };
    println!("  ({})", hint);
}

/// Open the widget and drive it from stdin until `/quit` or end of input.
pub async fn chat(ctx: &Context) -> Result<()> {
    let widget = ChatWidget::from_config(&ctx.config, &ctx.secrets, &ctx.paths)?;
    let mut revisions = widget.subscribe();
    let mut transcript = Transcript::default();

    widget.open().await;
    transcript.render(&widget.snapshot());
    println!("  (type /help for commands)");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut mode = None;

    loop {
        let view = widget.snapshot();
        if view.open && mode != Some(view.input_mode) {
            mode = Some(view.input_mode);
            println!("  [{}]", prompt_hint(view.input_mode));
        }

        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if !handle_line(&widget, &line).await {
                    break;
                }
                transcript.render(&widget.snapshot());
            }
            changed = revisions.changed() => {
                if changed.is_err() {
                    break;
                }
                transcript.render(&widget.snapshot());
            }
        }
    }

    widget.close();
    info!("chat session ended");
    Ok(())
}

/// Returns false when the loop should stop.
async fn handle_line(widget: &ChatWidget, line: &str) -> bool {
    match Meta::parse(line) {
        Some(Ok(Meta::Quit)) => return false,
        Some(Ok(Meta::Open)) => widget.open().await,
        Some(Ok(Meta::Close)) => {
            widget.close();
            println!("  (widget closed, /open to reopen)");
        }
        Some(Ok(Meta::Logout)) => widget.logout(),
        Some(Ok(Meta::Status)) => print_status(&widget.snapshot()),
        Some(Ok(Meta::Help)) => print_help(),
        Some(Err(other)) => println!("  (unknown command /{}, try /help)", other),
        None => submit(widget, line).await,
    }
    true
}

async fn submit(widget: &ChatWidget, line: &str) {
    let view = widget.snapshot();
    if !view.open {
        println!("  (widget is closed, /open to reopen)");
        return;
    }

    match view.input_mode {
        InputMode::Country => {
            if line.trim().is_empty() {
                return;
            }
            match widget.select_country(line) {
                Some(country) => debug!(dial_code = %country.dial_code, "country chosen"),
                None if view.countries_failed => {
                    println!("  (country list unavailable, /open to retry)")
                }
                None => println!("  (no country matches '{}')", line.trim()),
            }
        }
        InputMode::Chat => {
            // Replies arrive through the revision channel
            let widget = widget.clone();
            let line = line.to_string();
            tokio::spawn(async move {
                let outcome = widget.submit_text(&line).await;
                report(&outcome);
            });
        }
        _ => report(&widget.submit_text(line).await),
    }
}
