//! Nokia SR OS model (classic CLI).
//!
//! # Prompt Examples
//!
//! ```text
//! A:router#                 # active CPM
//! *A:admin@router#          # unsaved changes, MD-CLI style user
//! ```

use crate::platform::{Attributes, Model};

/// Create the Nokia SR OS model.
pub fn model() -> Model {
    Model::new(
        "nokia-sros",
        Attributes {
            need_login_chat: true,
            need_paging_off: true,
            disable_pager_command: "environment no more".to_string(),
            username_prompt_pattern: r"[Ll]ogin:\s*$".to_string(),
            password_prompt_pattern: r"[Pp]assword:\s*$".to_string(),
            enabled_prompt_pattern: r"^\*?[abcdAB]:[\w\s_.@-]+#\s?$".to_string(),
            command_list: vec![
                "show version".to_string(),
                "admin display-config".to_string(),
            ],
            line_filter: r"^# Generated ".to_string(),
            ..Default::default()
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::PromptSet;

    #[test]
    fn test_sros_prompt() {
        let attrs = model().attributes;
        let prompt = PromptSet::compile(&[attrs.enabled_prompt_pattern]).unwrap();
        assert_eq!(prompt.find(b"A:router# "), Some(0));
        assert_eq!(prompt.find(b"*A:admin@pe1#"), Some(0));
        assert_eq!(prompt.find(b"[/]"), None);
    }
}
