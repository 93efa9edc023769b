//! Arista EOS model.
//!
//! # Prompt Examples
//!
//! ```text
//! switch>                   # exec
//! switch#                   # privileged exec
//! ```

use crate::platform::{Attributes, Model};

/// Create the Arista EOS model.
pub fn model() -> Model {
    Model::new(
        "arista-eos",
        Attributes {
            need_login_chat: true,
            need_enabled_mode: true,
            need_paging_off: true,
            enable_command: "enable".to_string(),
            disable_pager_command: "terminal length 0".to_string(),
            username_prompt_pattern: r"(?i)login:\s?$|^Username:\s*$".to_string(),
            password_prompt_pattern: r"(?i)^password:\s?$".to_string(),
            enable_password_prompt_pattern: r"(?i)^password:\s?$".to_string(),
            disabled_prompt_pattern: r"^[\w.\-@()/: ]{1,63}>\s?$".to_string(),
            enabled_prompt_pattern: r"^[\w.\-@()/: ]{1,63}#\s?$".to_string(),
            command_list: vec![
                "show version".to_string(),
                "show running-config".to_string(),
            ],
            ..Default::default()
        },
    )
}
