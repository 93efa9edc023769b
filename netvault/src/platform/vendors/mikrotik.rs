//! MikroTik RouterOS model.
//!
//! RouterOS colors its console heavily; escape sequences are stripped
//! before matching. The export header carries a timestamp and is
//! filtered out.

use crate::platform::{Attributes, Model};

/// Create the MikroTik RouterOS model.
pub fn model() -> Model {
    Model::new(
        "mikrotik",
        Attributes {
            need_login_chat: true,
            username_prompt_pattern: r"Login:\s*$".to_string(),
            password_prompt_pattern: r"Password:\s*$".to_string(),
            enabled_prompt_pattern: r"\[\S+@\S+\]\s+>\s*$".to_string(),
            line_filter: r"^# \S+ \d{2}:\d{2}:\d{2} by RouterOS".to_string(),
            command_list: vec![
                "/system resource print".to_string(),
                "/export".to_string(),
            ],
            ..Default::default()
        },
    )
}
