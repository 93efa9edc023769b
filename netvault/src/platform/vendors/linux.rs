//! Linux model.
//!
//! Standard Linux/Unix shells with `$` (user) and `#` (root) prompts. No
//! enable or pager phase.

use crate::platform::{Attributes, Model};

/// Create the Linux model.
pub fn model() -> Model {
    Model::new(
        "linux",
        Attributes {
            need_login_chat: true,
            username_prompt_pattern: r"login:\s*$".to_string(),
            password_prompt_pattern: r"[Pp]assword[:\s]*$".to_string(),
            enabled_prompt_pattern: r"[$#]\s*$".to_string(),
            command_list: vec![
                "uname -a".to_string(),
                "ip -o addr".to_string(),
                "ip route".to_string(),
            ],
            ..Default::default()
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::PromptSet;

    #[test]
    fn test_linux_model() {
        let model = model();
        assert_eq!(model.name, "linux");
        assert!(model.attributes.need_login_chat);
        assert!(!model.attributes.need_enabled_mode);
    }

    #[test]
    fn test_shell_prompt_match() {
        let attrs = model().attributes;
        let prompt = PromptSet::compile(&[attrs.enabled_prompt_pattern]).unwrap();
        assert_eq!(prompt.find(b"user@host:~$ "), Some(0));
        assert_eq!(prompt.find(b"root@host:~# "), Some(0));
        assert_eq!(prompt.find(b"Linux host 6.1.0"), None);
    }

    #[test]
    fn test_login_prompt_match() {
        let attrs = model().attributes;
        let prompts = PromptSet::compile(&[
            attrs.username_prompt_pattern,
            attrs.password_prompt_pattern,
        ])
        .unwrap();
        assert_eq!(prompts.find(b"host login: "), Some(0));
        assert_eq!(prompts.find(b"Password: "), Some(1));
    }
}
