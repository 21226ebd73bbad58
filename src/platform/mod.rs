pub mod telegram;

/// A message received from any platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingMessage {
    /// Platform identifier (e.g., "telegram")
    pub platform: &'static str,
    /// Chat the message was posted in; replies go back here
    pub chat_id: i64,
    /// Platform-specific sender ID, absent for channel posts
    pub user_id: Option<u64>,
    /// Display name of the sender
    pub user_name: Option<String>,
    /// The message text, absent for stickers, photos and the like
    pub text: Option<String>,
}
