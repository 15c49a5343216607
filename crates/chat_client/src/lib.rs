//! Streaming chat client library (config, HTTP transport, stream decoding,
//! session driver and views). Used by the `chat-client` binary.

pub mod client;
pub mod clipboard;
pub mod config;
pub mod messages;
pub mod session;
pub mod stream;
pub mod view;

pub use client::{ChatResponse, Client, ClientError};
pub use clipboard::{Clipboard, ClipboardError, CopyAction, CopyIcon, SystemClipboard};
pub use config::{default_config_path, Config, ConfigError};
pub use messages::StreamRecord;
pub use session::{ChatSession, SessionState, SubmitOutcome};
pub use stream::{Decoded, RecordDecoder};
pub use view::{ChatView, Message, MessageId, Role, TerminalView, Transcript};
