//! Juniper JUNOS model.
//!
//! JUNOS logs straight into operational mode, so there is no enable
//! phase. The pager is disabled with two `set cli` commands, which
//! produce one extra prompt.
//!
//! # Prompt Examples
//!
//! ```text
//! user@router>              # operational mode
//! {master:0}user@router>    # with routing-engine indicator
//! ```

use crate::platform::{Attributes, Model};

/// Create the Juniper JUNOS model.
pub fn model() -> Model {
    Model::new(
        "junos",
        Attributes {
            need_login_chat: true,
            need_paging_off: true,
            username_prompt_pattern: r"login:\s*$".to_string(),
            password_prompt_pattern: r"[Pp]assword:\s*$".to_string(),
            enabled_prompt_pattern: r"(?:\{[^}]+\})?[\w.\-@]+>\s*$".to_string(),
            disable_pager_command: "set cli screen-length 0\nset cli screen-width 0".to_string(),
            disable_pager_extra_prompt_count: 1,
            command_list: vec![
                "show version".to_string(),
                "show configuration | display set".to_string(),
            ],
            ..Default::default()
        },
    )
}
