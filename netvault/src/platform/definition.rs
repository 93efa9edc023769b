//! Model profiles: the per-vendor dialog description.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::channel::Timeouts;
use crate::config::duration;

/// Dialog attributes of a model, cloned into every device created from it.
///
/// Empty pattern strings disable the corresponding prompt. An empty
/// `enabled_prompt_pattern` makes the command phase wait for EOF instead
/// of a prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Attributes {
    pub need_login_chat: bool,
    pub need_enabled_mode: bool,
    pub need_paging_off: bool,
    pub keep_control_chars: bool,
    pub suppress_auto_lf: bool,
    pub send_extra_post_password_newline: bool,

    pub enable_command: String,
    pub disable_pager_command: String,
    pub disable_pager_extra_prompt_count: u32,

    pub username_prompt_pattern: String,
    pub password_prompt_pattern: String,
    pub enable_password_prompt_pattern: String,
    pub disabled_prompt_pattern: String,
    pub enabled_prompt_pattern: String,
    pub post_login_prompt_pattern: String,
    pub post_login_prompt_response: String,

    /// Echo format for each sent command; `%q` quotes it, `%s` inserts it raw.
    pub quote_sent_commands_format: String,
    /// Captured lines matching this regex are dropped before saving.
    pub line_filter: String,
    /// Content type handed to the repository backend.
    pub content_type: String,

    pub command_list: Vec<String>,

    #[serde(with = "duration")]
    pub read_timeout: Duration,
    #[serde(with = "duration")]
    pub match_timeout: Duration,
    #[serde(with = "duration")]
    pub send_timeout: Duration,
    #[serde(with = "duration")]
    pub command_read_timeout: Duration,
    #[serde(with = "duration")]
    pub command_match_timeout: Duration,

    /// Program and arguments run instead of dialing, when non-empty.
    pub run_prog: Vec<String>,
    #[serde(with = "duration")]
    pub run_timeout: Duration,

    /// Lines kept in the per-device error log; 0 disables it.
    pub errlog_hist_size: usize,
    /// Suppress snapshots identical to the previous one.
    pub changes_only: bool,
}

impl Default for Attributes {
    fn default() -> Self {
        Self {
            need_login_chat: false,
            need_enabled_mode: false,
            need_paging_off: false,
            keep_control_chars: false,
            suppress_auto_lf: false,
            send_extra_post_password_newline: false,
            enable_command: String::new(),
            disable_pager_command: String::new(),
            disable_pager_extra_prompt_count: 0,
            username_prompt_pattern: String::new(),
            password_prompt_pattern: String::new(),
            enable_password_prompt_pattern: String::new(),
            disabled_prompt_pattern: String::new(),
            enabled_prompt_pattern: String::new(),
            post_login_prompt_pattern: String::new(),
            post_login_prompt_response: String::new(),
            quote_sent_commands_format: "!![%q]".to_string(),
            line_filter: String::new(),
            content_type: "text/plain".to_string(),
            command_list: vec![],
            read_timeout: Duration::from_secs(10),
            match_timeout: Duration::from_secs(20),
            send_timeout: Duration::from_secs(5),
            command_read_timeout: Duration::from_secs(20),
            command_match_timeout: Duration::from_secs(30),
            run_prog: vec![],
            run_timeout: Duration::from_secs(60),
            errlog_hist_size: 60,
            changes_only: false,
        }
    }
}

impl Attributes {
    /// Timeouts for the login, enable and pager phases.
    pub fn timeouts(&self) -> Timeouts {
        Timeouts {
            read: self.read_timeout,
            matching: self.match_timeout,
            send: self.send_timeout,
        }
    }

    /// Timeouts while the command list runs.
    pub fn command_timeouts(&self) -> Timeouts {
        Timeouts {
            read: self.command_read_timeout,
            matching: self.command_match_timeout,
            send: self.send_timeout,
        }
    }

    /// Whether the model runs a local program instead of dialing.
    pub fn runs_program(&self) -> bool {
        !self.run_prog.is_empty()
    }

    /// Render the echo block for a sent command.
    pub fn format_sent_command(&self, command: &str) -> String {
        let mut out = String::with_capacity(self.quote_sent_commands_format.len() + command.len());
        let mut chars = self.quote_sent_commands_format.chars().peekable();
        while let Some(c) = chars.next() {
            if c != '%' {
                out.push(c);
                continue;
            }
            match chars.peek() {
                Some('q') => {
                    out.push_str(&format!("{:?}", command));
                    chars.next();
                }
                Some('s') => {
                    out.push_str(command);
                    chars.next();
                }
                Some('%') => {
                    out.push('%');
                    chars.next();
                }
                _ => out.push('%'),
            }
        }
        out
    }
}

/// A named model profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Model {
    /// Model name (e.g., "cisco-ios", "junos", "run").
    pub name: String,

    /// Default attributes for devices of this model.
    pub attributes: Attributes,
}

impl Model {
    pub fn new(name: impl Into<String>, attributes: Attributes) -> Self {
        Self {
            name: name.into(),
            attributes,
        }
    }
}
