//! Fortinet FortiOS model.
//!
//! Paging is disabled through a three-line console config block, which
//! produces two extra prompts.

use crate::platform::{Attributes, Model};

/// Create the FortiOS model.
pub fn model() -> Model {
    Model::new(
        "fortios",
        Attributes {
            need_login_chat: true,
            need_paging_off: true,
            username_prompt_pattern: r"login:\s*$".to_string(),
            password_prompt_pattern: r"Password:\s*$".to_string(),
            enabled_prompt_pattern: r"^\S+ (\(\S+\) )?[#$]\s*$".to_string(),
            disable_pager_command: "config system console\nset output standard\nend".to_string(),
            disable_pager_extra_prompt_count: 2,
            line_filter: r"^(#conf_file_ver=|System time:)".to_string(),
            command_list: vec![
                "get system status".to_string(),
                "show full-configuration".to_string(),
            ],
            ..Default::default()
        },
    )
}
