use std::time::Duration;

use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::chat::{ChatMessage, ChatRole};
use crate::error::ChatError;

/// Deadline for one round trip to the chat backend. When it expires the
/// in-flight request is dropped, cancelling it.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Simulated thinking time when no backend is configured.
const DEMO_DELAY: Duration = Duration::from_millis(600);

const WELCOME: &str = "Namaste! I am your AI travel assistant. Ask me about the monasteries, local tips, or weather.\nExample: \"Tell me about Rumtek Monastery\"";

/// Rendering sink the widget drives. Handed in by the embedding UI, so the
/// controller never reaches for ambient globals.
pub trait WidgetView: Send {
    fn append(&mut self, role: ChatRole, html: &str);
    fn clear_input(&mut self);
    fn show_typing(&mut self);
    fn hide_typing(&mut self);
    fn focus_input(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WidgetState {
    Closed,
    Open,
}

/// Why the modal should close.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseTrigger {
    CloseButton,
    MinimizeButton,
    OutsideClick,
    EscapeKey,
}

/// The chat modal's controller: open/closed state, the transcript, the
/// typing indicator and the exchange with the backend.
pub struct ChatWidget<V: WidgetView> {
    state: WidgetState,
    transcript: Vec<ChatMessage>,
    typing: bool,
    backend_url: Option<String>,
    http: Client,
    timeout: Duration,
    view: V,
}

impl<V: WidgetView> ChatWidget<V> {
    /// `backend_url` absent selects the demo fallback for every exchange.
    pub fn new(http: Client, backend_url: Option<String>, view: V) -> Self {
        let mut widget = Self {
            state: WidgetState::Closed,
            transcript: Vec::new(),
            typing: false,
            backend_url,
            http,
            timeout: REQUEST_TIMEOUT,
            view,
        };
        widget.append(ChatRole::Bot, WELCOME);
        widget
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn state(&self) -> WidgetState {
        self.state
    }

    pub fn transcript(&self) -> &[ChatMessage] {
        &self.transcript
    }

    /// Chat icon activated: open the modal and focus the input.
    pub fn open(&mut self) {
        if self.state == WidgetState::Closed {
            self.state = WidgetState::Open;
            self.view.focus_input();
        }
    }

    /// Close button, minimize button, a click outside the modal or Escape.
    pub fn close(&mut self, trigger: CloseTrigger) {
        if self.state == WidgetState::Open {
            debug!("Chat closed via {trigger:?}");
            self.state = WidgetState::Closed;
        }
    }

    /// Send the input's text. Empty input (after trimming) is dropped
    /// silently. The typing indicator goes up before the exchange and
    /// comes down exactly once, whatever the outcome.
    pub async fn send(&mut self, input: &str) {
        let text = input.trim();
        if text.is_empty() {
            return;
        }
        let text = text.to_string();

        self.append(ChatRole::User, &text);
        self.view.clear_input();
        self.show_typing();

        let backend = match self.backend_url.clone() {
            Some(url) => url,
            None => {
                tokio::time::sleep(DEMO_DELAY).await;
                self.hide_typing();
                self.append(
                    ChatRole::Bot,
                    &format!("(No backend configured) Demo reply: I received: {text}"),
                );
                return;
            }
        };

        let outcome =
            match tokio::time::timeout(self.timeout, request_reply(&self.http, &backend, &text))
                .await
            {
                Ok(result) => result,
                Err(_) => Err(ChatError::Timeout(self.timeout)),
            };

        self.hide_typing();
        match outcome {
            Ok(reply) => self.append(ChatRole::Bot, &reply),
            Err(e) => {
                warn!("Chat exchange failed: {e}");
                self.append(ChatRole::Bot, &format!("Sorry, something went wrong. {e}"));
            }
        }
    }

    fn append(&mut self, role: ChatRole, text: &str) {
        self.view.append(role, &render_html(text));
        self.transcript.push(ChatMessage::new(role, text));
    }

    fn show_typing(&mut self) {
        if !self.typing {
            self.typing = true;
            self.view.show_typing();
        }
    }

    fn hide_typing(&mut self) {
        if self.typing {
            self.typing = false;
            self.view.hide_typing();
        }
    }
}

/// POST the message and pull a reply out of whatever comes back: a `reply`
/// field, then a `message` field, then the raw body verbatim.
async fn request_reply(http: &Client, url: &str, text: &str) -> Result<String, ChatError> {
    let resp = http.post(url).json(&json!({ "message": text })).send().await?;
    if !resp.status().is_success() {
        return Err(ChatError::Status(resp.status()));
    }
    let body = resp.text().await?;
    Ok(extract_reply(&body))
}

fn extract_reply(body: &str) -> String {
    let Ok(data) = serde_json::from_str::<Value>(body) else {
        return body.to_string();
    };
    data.get("reply")
        .and_then(Value::as_str)
        .or_else(|| data.get("message").and_then(Value::as_str))
        .map(str::to_string)
        .unwrap_or_else(|| data.to_string())
}

/// Escape markup-significant characters. Ampersand goes first so the
/// entities produced for the others are not escaped a second time.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#039;")
}

/// Sanitized markup for one transcript line: escaped text with literal
/// newlines turned into line breaks.
pub fn render_html(text: &str) -> String {
    escape_html(text).replace('\n', "<br>")
}
