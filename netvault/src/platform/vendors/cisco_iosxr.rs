//! Cisco IOS XR model.
//!
//! IOS XR users land directly in privileged mode. Every `show` command
//! prints a timestamp line first, which the line filter removes.

use crate::platform::{Attributes, Model};

/// Create the Cisco IOS XR model.
pub fn model() -> Model {
    Model::new(
        "cisco-iosxr",
        Attributes {
            need_login_chat: true,
            need_paging_off: true,
            disable_pager_command: "terminal length 0".to_string(),
            username_prompt_pattern: r"Username:\s*$".to_string(),
            password_prompt_pattern: r"Password:\s*$".to_string(),
            enabled_prompt_pattern: r"\S+#\s*$".to_string(),
            line_filter: r"^\w{3} \w{3} +\d+ \d+:\d+:\d+(\.\d+)? \S+$".to_string(),
            command_list: vec![
                "show version".to_string(),
                "show running-config".to_string(),
            ],
            ..Default::default()
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_line_is_filtered() {
        let attrs = model().attributes;
        let filter = regex::Regex::new(&attrs.line_filter).unwrap();
        assert!(filter.is_match("Thu Oct 18 10:02:03.123 UTC"));
        assert!(!filter.is_match("hostname xr1"));
    }

    #[test]
    fn test_prompt() {
        let attrs = model().attributes;
        let prompt = regex::bytes::Regex::new(&attrs.enabled_prompt_pattern).unwrap();
        assert!(prompt.is_match(b"RP/0/RSP0/CPU0:xr1#"));
    }
}
