//! Per-device dialog state machine.
//!
//! ```text
//! START -> [login] -> [enable] -> [pager off] -> commands -> END
//! ```
//!
//! Each phase maps its failure to the [`FetchCode`] reported on the fetch
//! result.

use log::debug;

use super::capture::Capture;
use super::response::FetchCode;
use crate::channel::{Matched, PromptSet, Session};
use crate::error::{ChannelError, DialogError};
use crate::platform::Attributes;

/// Credentials used by the login and enable phases.
#[derive(Clone, Copy)]
pub struct Credentials<'a> {
    pub user: &'a str,
    pub password: &'a str,
    pub enable_password: &'a str,
}

impl std::fmt::Debug for Credentials<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .finish_non_exhaustive()
    }
}

/// Drives one device through its dialog over an open session.
pub struct Dialog<'a> {
    session: Session,
    attrs: &'a Attributes,
    credentials: Credentials<'a>,
    capture: Capture,
}

impl<'a> Dialog<'a> {
    pub fn new(session: Session, attrs: &'a Attributes, credentials: Credentials<'a>) -> Self {
        Self {
            session,
            attrs,
            credentials,
            capture: Capture::new(),
        }
    }

    /// Run every phase the model asks for. `logged` skips the login chat.
    pub async fn run(&mut self, logged: bool) -> Result<(), DialogError> {
        let mut enabled = false;

        if self.attrs.need_login_chat && !logged {
            enabled = self
                .login()
                .await
                .map_err(|e| DialogError::new(FetchCode::Login, "login", e))?;
        }

        if self.attrs.need_enabled_mode && !enabled {
            self.enable()
                .await
                .map_err(|e| DialogError::new(FetchCode::Enable, "enable", e))?;
        }

        if self.attrs.need_paging_off {
            self.pager_off()
                .await
                .map_err(|e| DialogError::new(FetchCode::Pager, "pager", e))?;
        }

        self.send_commands()
            .await
            .map_err(|e| DialogError::new(FetchCode::Commands, "commands", e))
    }

    /// Match one of `patterns`; empty patterns never match.
    async fn expect<S: AsRef<str>>(&mut self, patterns: &[S]) -> Result<Matched, ChannelError> {
        let prompts = PromptSet::prompts(patterns)?;
        self.session.expect(&prompts).await
    }

    /// Login chat. Returns whether the device landed in enabled mode.
    pub async fn login(&mut self) -> Result<bool, ChannelError> {
        let attrs = self.attrs;
        let label = self.session.label().to_string();

        let m = self
            .expect(&[
                &attrs.username_prompt_pattern,
                &attrs.password_prompt_pattern,
            ])
            .await?;

        if m.index == 0 {
            debug!("{}: login: username prompt", label);
            self.session.sendln(self.credentials.user).await?;

            let m = self
                .expect(&[
                    &attrs.password_prompt_pattern,
                    &attrs.enabled_prompt_pattern,
                    &attrs.disabled_prompt_pattern,
                ])
                .await?;
            match m.index {
                1 => return Ok(true),
                2 => return Ok(false),
                _ => {}
            }
        }

        debug!("{}: login: password prompt", label);
        self.session.sendln_secret(self.credentials.password).await?;
        if attrs.send_extra_post_password_newline {
            self.session.sendln("").await?;
        }

        if !attrs.post_login_prompt_pattern.is_empty() {
            let m = self
                .expect(&[
                    &attrs.disabled_prompt_pattern,
                    &attrs.enabled_prompt_pattern,
                    &attrs.post_login_prompt_pattern,
                ])
                .await?;
            if m.index != 2 {
                return Ok(m.index == 1);
            }
            debug!("{}: login: post-login prompt", label);
            self.session
                .sendln(&attrs.post_login_prompt_response)
                .await?;
        }

        let m = self
            .expect(&[
                &attrs.disabled_prompt_pattern,
                &attrs.enabled_prompt_pattern,
            ])
            .await?;
        Ok(m.index == 1)
    }

    /// Elevate to enabled mode.
    pub async fn enable(&mut self) -> Result<(), ChannelError> {
        let attrs = self.attrs;

        self.session.sendln("").await?;
        let m = self
            .expect(&[
                &attrs.disabled_prompt_pattern,
                &attrs.enabled_prompt_pattern,
            ])
            .await?;
        if m.index == 1 {
            return Ok(());
        }

        self.session.sendln(&attrs.enable_command).await?;
        let m = self
            .expect(&[
                &attrs.enable_password_prompt_pattern,
                &attrs.enabled_prompt_pattern,
            ])
            .await?;
        if m.index == 0 {
            self.session
                .sendln_secret(self.credentials.enable_password)
                .await?;
            self.expect(&[&attrs.enabled_prompt_pattern]).await?;
        }
        Ok(())
    }

    /// Send the pager command and consume one prompt per line it carries.
    pub async fn pager_off(&mut self) -> Result<(), ChannelError> {
        let attrs = self.attrs;

        self.session.sendln(&attrs.disable_pager_command).await?;
        for _ in 0..=attrs.disable_pager_extra_prompt_count {
            self.expect(&[&attrs.enabled_prompt_pattern]).await?;
        }
        Ok(())
    }

    /// Run the command list under the command timeouts, capturing the
    /// echo and output of each command. A failure clears the capture.
    pub async fn send_commands(&mut self) -> Result<(), ChannelError> {
        let saved = self.session.set_timeouts(self.attrs.command_timeouts());
        let result = self.run_commands().await;
        self.session.set_timeouts(saved);

        if result.is_err() {
            self.capture.clear();
        }
        result
    }

    async fn run_commands(&mut self) -> Result<(), ChannelError> {
        let attrs = self.attrs;
        // An empty enabled prompt waits for EOF.
        let prompts = PromptSet::compile(&[&attrs.enabled_prompt_pattern])?;

        for command in &attrs.command_list {
            if !command.is_empty() {
                self.session.sendln(command).await?;
            }
            let m = self.session.expect(&prompts).await?;

            let mut echo = attrs.format_sent_command(command);
            echo.push('\n');
            self.capture.push(echo);
            self.capture.push(m.buffer);

            if m.eof {
                break;
            }
        }
        Ok(())
    }

    pub fn capture(&self) -> &Capture {
        &self.capture
    }

    /// Finish the dialog, returning the session for closing and the capture.
    pub fn into_parts(self) -> (Session, Capture) {
        (self.session, self.capture)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    use crate::channel::SessionConfig;
    use crate::platform::vendors;
    use crate::transport::Stream;

    const CREDS: Credentials<'static> = Credentials {
        user: "lab",
        password: "pass",
        enable_password: "en",
    };

    fn fast(mut attrs: Attributes) -> Attributes {
        attrs.read_timeout = Duration::from_secs(2);
        attrs.match_timeout = Duration::from_secs(3);
        attrs.command_read_timeout = Duration::from_secs(2);
        attrs.command_match_timeout = Duration::from_secs(3);
        attrs
    }

    async fn connect(attrs: &Attributes) -> (Session, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).await.unwrap();
        let (server, _) = listener.accept().await.unwrap();
        let config = SessionConfig {
            timeouts: attrs.timeouts(),
            ..Default::default()
        };
        (Session::new(Stream::from_tcp(client), config), server)
    }

    async fn read_line(server: &mut TcpStream) -> String {
        let mut line = Vec::new();
        let mut byte = [0u8; 1];
        loop {
            let n = server.read(&mut byte).await.unwrap();
            if n == 0 || byte[0] == b'\n' {
                return String::from_utf8(line).unwrap();
            }
            line.push(byte[0]);
        }
    }

    #[tokio::test]
    async fn test_login_reports_enabled_after_username() {
        let attrs = fast(vendors::cisco_ios::model().attributes);
        let (session, mut server) = connect(&attrs).await;
        let device = tokio::spawn(async move {
            server.write_all(b"Username: ").await.unwrap();
            assert_eq!(read_line(&mut server).await, "lab");
            server.write_all(b"\r\nrouter#").await.unwrap();
            tokio::time::sleep(Duration::from_millis(200)).await;
        });

        let mut dialog = Dialog::new(session, &attrs, CREDS);
        assert!(dialog.login().await.unwrap());
        device.await.unwrap();
    }

    #[tokio::test]
    async fn test_login_with_post_login_prompt() {
        let mut attrs = fast(vendors::cisco_ios::model().attributes);
        attrs.post_login_prompt_pattern = r"Press any key".to_string();
        attrs.post_login_prompt_response = "y".to_string();

        let (session, mut server) = connect(&attrs).await;
        let device = tokio::spawn(async move {
            server.write_all(b"Password: ").await.unwrap();
            assert_eq!(read_line(&mut server).await, "pass");
            server.write_all(b"\r\nPress any key").await.unwrap();
            assert_eq!(read_line(&mut server).await, "y");
            server.write_all(b"\r\nrouter>").await.unwrap();
            tokio::time::sleep(Duration::from_millis(200)).await;
        });

        let mut dialog = Dialog::new(session, &attrs, CREDS);
        assert!(!dialog.login().await.unwrap());
        device.await.unwrap();
    }

    #[tokio::test]
    async fn test_enable_with_password() {
        let attrs = fast(vendors::cisco_ios::model().attributes);
        let (session, mut server) = connect(&attrs).await;
        let device = tokio::spawn(async move {
            assert_eq!(read_line(&mut server).await, "");
            server.write_all(b"\r\nrouter>").await.unwrap();
            assert_eq!(read_line(&mut server).await, "enable");
            server.write_all(b"\r\nPassword: ").await.unwrap();
            assert_eq!(read_line(&mut server).await, "en");
            server.write_all(b"\r\nrouter#").await.unwrap();
            tokio::time::sleep(Duration::from_millis(200)).await;
        });

        let mut dialog = Dialog::new(session, &attrs, CREDS);
        dialog.enable().await.unwrap();
        device.await.unwrap();
    }

    #[tokio::test]
    async fn test_pager_off_consumes_extra_prompts() {
        let attrs = fast(vendors::fortios::model().attributes);
        let (session, mut server) = connect(&attrs).await;
        let device = tokio::spawn(async move {
            for expected in ["config system console", "set output standard", "end"] {
                assert_eq!(read_line(&mut server).await, expected);
                server.write_all(b"\r\nFGT60E (console) # ").await.unwrap();
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
            tokio::time::sleep(Duration::from_millis(200)).await;
        });

        let mut dialog = Dialog::new(session, &attrs, CREDS);
        dialog.pager_off().await.unwrap();
        device.await.unwrap();
    }

    #[tokio::test]
    async fn test_send_commands_captures_and_restores_timeouts() {
        let mut attrs = fast(vendors::cisco_ios::model().attributes);
        attrs.command_list = vec!["show run".to_string()];

        let (session, mut server) = connect(&attrs).await;
        let device = tokio::spawn(async move {
            assert_eq!(read_line(&mut server).await, "show run");
            server
                .write_all(b"show run\r\nhostname r1\r\nrouter#")
                .await
                .unwrap();
            tokio::time::sleep(Duration::from_millis(200)).await;
        });

        let mut dialog = Dialog::new(session, &attrs, CREDS);
        let before = dialog.session.timeouts();
        dialog.send_commands().await.unwrap();
        assert_eq!(dialog.session.timeouts(), before);

        let payload = dialog.capture().render("").unwrap();
        let text = String::from_utf8(payload).unwrap();
        assert!(text.starts_with("!![\"show run\"]\n"));
        assert!(text.contains("hostname r1"));
        device.await.unwrap();
    }

    #[tokio::test]
    async fn test_send_commands_failure_rolls_back_capture() {
        let mut attrs = fast(vendors::cisco_ios::model().attributes);
        attrs.command_list = vec!["show ver".to_string(), "show run".to_string()];

        let (session, mut server) = connect(&attrs).await;
        tokio::spawn(async move {
            assert_eq!(read_line(&mut server).await, "show ver");
            server.write_all(b"Version 1\r\nrouter#").await.unwrap();
            assert_eq!(read_line(&mut server).await, "show run");
            server.write_all(b"sh").await.unwrap();
        });

        let mut dialog = Dialog::new(session, &attrs, CREDS);
        let err = dialog.send_commands().await.unwrap_err();
        assert!(matches!(err, ChannelError::UnexpectedEof));
        assert!(dialog.capture().is_empty());
    }

    #[tokio::test]
    async fn test_empty_command_only_awaits_prompt() {
        let mut attrs = fast(vendors::linux::model().attributes);
        attrs.command_list = vec![String::new()];

        let (session, mut server) = connect(&attrs).await;
        tokio::spawn(async move {
            server.write_all(b"motd\r\nuser@host:~$ ").await.unwrap();
            let mut rest = Vec::new();
            let _ = server.read_to_end(&mut rest).await;
            assert!(rest.is_empty());
        });

        let mut dialog = Dialog::new(session, &attrs, CREDS);
        dialog.send_commands().await.unwrap();
        assert_eq!(dialog.capture().len(), 2);
        let (session, _) = dialog.into_parts();
        session.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_run_maps_phase_to_code() {
        let attrs = fast(vendors::cisco_ios::model().attributes);
        let (session, server) = connect(&attrs).await;
        drop(server);

        let mut dialog = Dialog::new(session, &attrs, CREDS);
        let err = dialog.run(false).await.unwrap_err();
        assert_eq!(err.code, FetchCode::Login);
        assert_eq!(err.to_string(), "login: match: unexpected EOF");
    }

    #[tokio::test]
    async fn test_run_reports_enable_failure() {
        let attrs = fast(vendors::cisco_ios::model().attributes);
        let (session, mut server) = connect(&attrs).await;
        let device = tokio::spawn(async move {
            server.write_all(b"Username: ").await.unwrap();
            assert_eq!(read_line(&mut server).await, "lab");
            server.write_all(b"\r\nPassword: ").await.unwrap();
            assert_eq!(read_line(&mut server).await, "pass");
            server.write_all(b"\r\nrouter> ").await.unwrap();
            assert_eq!(read_line(&mut server).await, "");
        });

        let mut dialog = Dialog::new(session, &attrs, CREDS);
        let err = dialog.run(false).await.unwrap_err();
        device.await.unwrap();
        assert_eq!(err.code, FetchCode::Enable);
        assert_eq!(err.to_string(), "enable: match: unexpected EOF");
    }

    #[tokio::test]
    async fn test_run_reports_pager_failure() {
        let attrs = fast(vendors::cisco_ios::model().attributes);
        let (session, mut server) = connect(&attrs).await;
        let device = tokio::spawn(async move {
            assert_eq!(read_line(&mut server).await, "");
            server.write_all(b"\r\nrouter# ").await.unwrap();
            assert_eq!(read_line(&mut server).await, "term len 0");
        });

        let mut dialog = Dialog::new(session, &attrs, CREDS);
        let err = dialog.run(true).await.unwrap_err();
        device.await.unwrap();
        assert_eq!(err.code, FetchCode::Pager);
        assert_eq!(err.to_string(), "pager: match: unexpected EOF");
        assert!(dialog.capture().is_empty());
    }
}
