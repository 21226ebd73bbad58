use reqwest::Url;
use serde::Deserialize;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, ParseMode, WebAppInfo};
use teloxide::utils::{html, markdown};

/// Text formatting applied to an outgoing message
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Formatting {
    Markdown,
    Html,
}

impl Formatting {
    pub fn parse_mode(self) -> ParseMode {
        match self {
            Formatting::Markdown => ParseMode::MarkdownV2,
            Formatting::Html => ParseMode::Html,
        }
    }

    /// Escape user-supplied text so it renders literally in this mode
    pub fn escape(self, text: &str) -> String {
        match self {
            Formatting::Markdown => markdown::escape(text),
            Formatting::Html => html::escape(text),
        }
    }
}

/// Where a button leads when pressed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ButtonTarget {
    /// Opens an external link
    Url(Url),
    /// Opens an embedded mini app
    WebApp(Url),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub label: String,
    pub target: ButtonTarget,
}

impl Button {
    fn to_telegram(&self) -> InlineKeyboardButton {
        match &self.target {
            ButtonTarget::Url(url) => InlineKeyboardButton::url(self.label.clone(), url.clone()),
            ButtonTarget::WebApp(url) => {
                InlineKeyboardButton::web_app(self.label.clone(), WebAppInfo { url: url.clone() })
            }
        }
    }
}

/// A single outbound message addressed to the chat the update came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub formatting: Option<Formatting>,
    pub buttons: Vec<Button>,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            formatting: None,
            buttons: Vec::new(),
        }
    }

    pub fn with_formatting(mut self, formatting: Option<Formatting>) -> Self {
        self.formatting = formatting;
        self
    }

    pub fn with_buttons(mut self, buttons: Vec<Button>) -> Self {
        self.buttons = buttons;
        self
    }

    /// Inline keyboard with one button per row, or None when there are no buttons
    pub fn keyboard(&self) -> Option<InlineKeyboardMarkup> {
        if self.buttons.is_empty() {
            return None;
        }
        let rows = self
            .buttons
            .iter()
            .map(|button| vec![button.to_telegram()]);
        Some(InlineKeyboardMarkup::new(rows))
    }
}
