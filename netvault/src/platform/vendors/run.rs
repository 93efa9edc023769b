//! Local program model.
//!
//! Runs `run_prog` instead of dialing and captures everything it prints
//! until it exits. The device identity reaches the program through the
//! `NETVAULT_DEV_*` environment variables.

use crate::platform::{Attributes, Model};

/// Create the run model.
pub fn model() -> Model {
    Model::new(
        "run",
        Attributes {
            command_list: vec![String::new()],
            run_prog: vec![
                "/bin/sh".to_string(),
                "-c".to_string(),
                "env | grep '^NETVAULT_DEV_' | grep -v -e _PASS= -e _ENABLE= | sort".to_string(),
            ],
            ..Default::default()
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_model_waits_for_eof() {
        let attrs = model().attributes;
        assert!(attrs.runs_program());
        assert!(attrs.enabled_prompt_pattern.is_empty());
        assert_eq!(attrs.command_list, vec![String::new()]);
        assert!(!attrs.need_login_chat);
    }
}
