//! Saved-session commands.

use super::Context;
use crate::output::{self, OutputFormat};
use anyhow::Result;
use serde::Serialize;
use std::fmt;
use widget_protocol_types::{AuthStep, Sender, WidgetRecord};
use widget_storage::StateStore;

#[derive(Serialize)]
struct StatusReport {
    saved: bool,
    authenticated: bool,
    phone_number: Option<String>,
    country_code: Option<String>,
    step: AuthStep,
    messages: usize,
    last_reply: Option<String>,
}

impl From<Option<WidgetRecord>> for StatusReport {
    fn from(record: Option<WidgetRecord>) -> Self {
        let saved = record.is_some();
        let record = record.unwrap_or_default();
        let non_empty = |value: String| Some(value).filter(|v| !v.is_empty());
        Self {
            saved,
            authenticated: record.is_authenticated,
            phone_number: non_empty(record.phone_number),
            country_code: non_empty(record.selected_country_code),
            step: record.auth_step,
            messages: record.messages.len(),
            last_reply: record
                .messages
                .iter()
                .rev()
                .find(|m| m.sender == Sender::Bot)
                .map(|m| m.text.clone()),
        }
    }
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.saved {
            return write!(f, "No saved session");
        }
        let step = match self.step {
            AuthStep::Country => "choose country",
            AuthStep::Phone => "enter phone number",
        };
        writeln!(f, "Authenticated: {}", if self.authenticated { "yes" } else { "no" })?;
        if let Some(number) = &self.phone_number {
            writeln!(f, "Phone number:  {}", number)?;
        }
        if let Some(code) = &self.country_code {
            writeln!(f, "Country code:  {}", code)?;
        }
        if !self.authenticated {
            writeln!(f, "Next step:     {}", step)?;
        }
        write!(f, "Messages:      {}", self.messages)?;
        if let Some(reply) = &self.last_reply {
            write!(f, "\nLast reply:    {}", reply.replace('\n', " "))?;
        }
        Ok(())
    }
}

/// Print a summary of the saved session.
pub fn status(ctx: &Context, format: &OutputFormat) -> Result<()> {
    let record = ctx.state_store().load()?;
    output::print(&StatusReport::from(record), format);
    Ok(())
}

/// Delete the saved session.
pub fn reset(ctx: &Context, format: &OutputFormat) -> Result<()> {
    let store = ctx.state_store();
    let existed = store.load()?.is_some();
    store.clear()?;
    if existed {
        output::print_success("Saved session removed", format);
    } else {
        output::print_success("No saved session", format);
    }
    Ok(())
}
