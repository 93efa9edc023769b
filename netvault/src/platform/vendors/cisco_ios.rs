//! Cisco IOS model.
//!
//! # Prompt Examples
//!
//! ```text
//! router>                   # user exec
//! router#                   # privileged exec, after "enable"
//! ```

use crate::platform::{Attributes, Model};

/// Create the Cisco IOS model.
pub fn model() -> Model {
    Model::new(
        "cisco-ios",
        Attributes {
            need_login_chat: true,
            need_enabled_mode: true,
            need_paging_off: true,
            enable_command: "enable".to_string(),
            disable_pager_command: "term len 0".to_string(),
            username_prompt_pattern: r"Username:\s*$".to_string(),
            password_prompt_pattern: r"Password:\s*$".to_string(),
            enable_password_prompt_pattern: r"Password:\s*$".to_string(),
            disabled_prompt_pattern: r"\S+>\s*$".to_string(),
            enabled_prompt_pattern: r"\S+#\s*$".to_string(),
            line_filter: concat!(
                r"^(ntp clock-period",
                r"|! Last configuration change",
                r"|! NVRAM config last updated)"
            )
            .to_string(),
            command_list: vec!["show ver".to_string(), "show run".to_string()],
            ..Default::default()
        },
    )
}
