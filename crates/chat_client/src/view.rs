//! Message rendering: the `ChatView` seam, the in-memory `Transcript`, and a
//! line-oriented `TerminalView`.

use std::io::Write;
use std::time::{Duration, Instant};

use crate::clipboard::{Clipboard, CopyAction, CopyIcon, COPY_FEEDBACK};

/// Who a message is from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
    Error,
}

/// Position of a message in its transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(pub usize);

/// One rendered message and its copy control.
#[derive(Debug, Clone)]
pub struct Message {
    pub id: MessageId,
    pub role: Role,
    pub text: String,
    copy: CopyAction,
}

impl Message {
    pub fn copy_icon(&self, now: Instant) -> CopyIcon {
        self.copy.icon(now)
    }
}

/// Everything the session driver needs from a UI.
pub trait ChatView {
    /// Append a message and scroll to it.
    fn render(&mut self, role: Role, text: &str) -> MessageId;

    /// Overwrite the visible text of `id` and keep the view at the bottom.
    fn replace(&mut self, id: MessageId, text: &str);

    fn clear_input(&mut self);

    fn set_send_enabled(&mut self, enabled: bool);

    /// Transient server status (e.g. "processing").
    fn status(&mut self, _text: &str) {}
}

/// In-memory chat view.
#[derive(Debug, Clone)]
pub struct Transcript {
    messages: Vec<Message>,
    input: String,
    send_enabled: bool,
    send_history: Vec<bool>,
    pinned_to_bottom: bool,
    last_status: Option<String>,
    copy_feedback: Duration,
}

impl Default for Transcript {
    fn default() -> Self {
        Self::new(COPY_FEEDBACK)
    }
}

impl Transcript {
    pub fn new(copy_feedback: Duration) -> Self {
        Self {
            messages: Vec::new(),
            input: String::new(),
            send_enabled: true,
            send_history: Vec::new(),
            pinned_to_bottom: true,
            last_status: None,
            copy_feedback,
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn get(&self, id: MessageId) -> Option<&Message> {
        self.messages.get(id.0)
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// The `n`th most recent message, 1-based.
    pub fn nth_from_end(&self, n: usize) -> Option<&Message> {
        n.checked_sub(1)
            .and_then(|back| self.messages.len().checked_sub(back + 1))
            .and_then(|i| self.messages.get(i))
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn set_input(&mut self, text: impl Into<String>) {
        self.input = text.into();
    }

    pub fn send_enabled(&self) -> bool {
        self.send_enabled
    }

    /// Every value passed to `set_send_enabled`, in order.
    pub fn send_history(&self) -> &[bool] {
        &self.send_history
    }

    pub fn is_pinned_to_bottom(&self) -> bool {
        self.pinned_to_bottom
    }

    /// The user scrolled away from the latest content.
    pub fn scroll_up(&mut self) {
        self.pinned_to_bottom = false;
    }

    pub fn last_status(&self) -> Option<&str> {
        self.last_status.as_deref()
    }

    /// Copy the visible text of `id`. Returns false if there is no such message.
    pub fn copy(&mut self, id: MessageId, clipboard: &dyn Clipboard, now: Instant) -> bool {
        let Some(message) = self.messages.get_mut(id.0) else {
            return false;
        };
        message.copy.invoke(clipboard, &message.text, now);
        true
    }

    fn scroll_to_bottom(&mut self) {
        self.pinned_to_bottom = true;
    }
}

impl ChatView for Transcript {
    fn render(&mut self, role: Role, text: &str) -> MessageId {
        let id = MessageId(self.messages.len());
        self.messages.push(Message {
            id,
            role,
            text: text.to_string(),
            copy: CopyAction::new(self.copy_feedback),
        });
        self.scroll_to_bottom();
        id
    }

    fn replace(&mut self, id: MessageId, text: &str) {
        if let Some(message) = self.messages.get_mut(id.0) {
            message.text.clear();
            message.text.push_str(text);
        }
        self.scroll_to_bottom();
    }

    fn clear_input(&mut self) {
        self.input.clear();
    }

    fn set_send_enabled(&mut self, enabled: bool) {
        self.send_enabled = enabled;
        self.send_history.push(enabled);
    }

    fn status(&mut self, text: &str) {
        self.last_status = Some(text.to_string());
    }
}

/// Terminal rendering on top of a `Transcript`.
///
/// User messages are right-aligned with the copy marker in front; other
/// messages are left-aligned with the marker behind. The message being
/// streamed stays open on its line until another message starts or the
/// send control comes back.
pub struct TerminalView<W: Write> {
    transcript: Transcript,
    out: W,
    width: usize,
    open: Option<(MessageId, String)>,
}

impl<W: Write> TerminalView<W> {
    pub fn new(out: W, width: usize, copy_feedback: Duration) -> Self {
        Self {
            transcript: Transcript::new(copy_feedback),
            out,
            width,
            open: None,
        }
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn transcript_mut(&mut self) -> &mut Transcript {
        &mut self.transcript
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    /// Print a one-off notice (copy confirmation, command feedback).
    pub fn notice(&mut self, text: &str) {
        self.close_open_line();
        self.write(&format!("{text}\n"));
    }

    fn write(&mut self, text: &str) {
        let result = self
            .out
            .write_all(text.as_bytes())
            .and_then(|_| self.out.flush());
        if let Err(e) = result {
            tracing::warn!(error = %e, "terminal write failed");
        }
    }

    fn close_open_line(&mut self) {
        if let Some((id, _)) = self.open.take() {
            let glyph = self.copy_glyph(id);
            self.write(&format!(" {glyph}\n"));
        }
    }

    fn copy_glyph(&self, id: MessageId) -> &'static str {
        self.transcript
            .get(id)
            .map(|m| m.copy_icon(Instant::now()).glyph())
            .unwrap_or(CopyIcon::Copy.glyph())
    }

    fn write_user(&mut self, id: MessageId, text: &str) {
        let glyph = self.copy_glyph(id);
        let mut lines = text.lines();
        let first = format!("{glyph} {}", lines.next().unwrap_or_default());
        let mut rendered = format!("{first:>width$}\n", width = self.width);
        for line in lines {
            rendered.push_str(&format!("{line:>width$}\n", width = self.width));
        }
        self.write(&rendered);
    }
}

impl<W: Write> ChatView for TerminalView<W> {
    fn render(&mut self, role: Role, text: &str) -> MessageId {
        self.close_open_line();
        let id = self.transcript.render(role, text);
        match role {
            Role::User => self.write_user(id, text),
            Role::Assistant | Role::Error => {
                self.write(text);
                self.open = Some((id, text.to_string()));
            }
        }
        id
    }

    fn replace(&mut self, id: MessageId, text: &str) {
        self.transcript.replace(id, text);
        let suffix = match &self.open {
            Some((open_id, written)) if *open_id == id => text
                .strip_prefix(written.as_str())
                .map(str::to_string),
            _ => None,
        };
        match suffix {
            Some(suffix) => self.write(&suffix),
            None => {
                self.close_open_line();
                self.write(text);
            }
        }
        self.open = Some((id, text.to_string()));
    }

    fn clear_input(&mut self) {
        self.transcript.clear_input();
    }

    fn set_send_enabled(&mut self, enabled: bool) {
        if enabled {
            self.close_open_line();
        }
        self.transcript.set_send_enabled(enabled);
    }

    fn status(&mut self, text: &str) {
        self.transcript.status(text);
        if self.open.as_ref().is_some_and(|(_, written)| written.is_empty()) {
            self.write(&format!("[{text}] "));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clipboard::tests::MemoryClipboard;

    #[test]
    fn render_appends_in_order_and_pins_to_bottom() {
        let mut t = Transcript::default();
        t.scroll_up();
        let a = t.render(Role::User, "hi");
        let b = t.render(Role::Assistant, "");
        assert_eq!(a, MessageId(0));
        assert_eq!(b, MessageId(1));
        assert!(t.is_pinned_to_bottom());

        t.scroll_up();
        t.replace(b, "Hello");
        assert!(t.is_pinned_to_bottom());
        assert_eq!(t.last().unwrap().text, "Hello");
        assert_eq!(t.nth_from_end(2).unwrap().text, "hi");
        assert!(t.nth_from_end(0).is_none());
        assert!(t.nth_from_end(3).is_none());
    }

    #[test]
    fn copy_uses_exact_visible_text() {
        let clipboard = MemoryClipboard::default();
        let mut t = Transcript::default();
        let id = t.render(Role::Assistant, "");
        t.replace(id, "Hello there");
        let now = Instant::now();

        assert!(t.copy(id, &clipboard, now));
        assert_eq!(clipboard.contents.borrow().as_slice(), ["Hello there"]);
        assert_eq!(t.get(id).unwrap().copy_icon(now), CopyIcon::Check);
        assert_eq!(
            t.get(id).unwrap().copy_icon(now + Duration::from_secs(2)),
            CopyIcon::Copy
        );
        assert!(!t.copy(MessageId(9), &clipboard, now));
    }

    #[test]
    fn terminal_streams_suffixes_and_places_markers_by_role() {
        let mut view = TerminalView::new(Vec::new(), 20, COPY_FEEDBACK);
        view.render(Role::User, "hi");
        view.set_send_enabled(false);
        let id = view.render(Role::Assistant, "");
        view.replace(id, "Hel");
        view.replace(id, "Hello");
        view.set_send_enabled(true);

        let out = String::from_utf8(view.into_inner()).unwrap();
        assert_eq!(out, format!("{:>20}\nHello ⧉\n", "⧉ hi"));
    }

    #[test]
    fn terminal_overwrite_starts_fresh_line() {
        let mut view = TerminalView::new(Vec::new(), 10, COPY_FEEDBACK);
        let id = view.render(Role::Assistant, "");
        view.replace(id, "par");
        view.replace(id, "Error: boom");
        view.set_send_enabled(true);

        let out = String::from_utf8(view.into_inner()).unwrap();
        assert_eq!(out, "par ⧉\nError: boom ⧉\n");
    }
}
