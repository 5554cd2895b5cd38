//! Control protocol
//!
//! One command per connection:
//!
//! - `start` loads the bootstrap HTML, runs the page scripts in order,
//!   closes the document and tracks changes
//! - `stop` tears the session down
//! - `click <selector>` (or `click` with the selector on the next line)
//!   clicks an element and tracks changes
//!
//! The changed document is written back only when there is one; otherwise
//! the connection is closed without a body.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};

use hdom_js::Callbacks;
use smol::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use smol::net::{TcpListener, TcpStream};

use crate::config::Config;
use crate::error::{ControlError, SessionError};
use crate::session::Session;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Stop,
    Click(String),
}

impl Command {
    pub fn parse(line: &str) -> Result<Self, ControlError> {
        let line = line.trim();
        let (name, arg) = match line.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (line, ""),
        };
        match name {
            "start" => Ok(Command::Start),
            "stop" => Ok(Command::Stop),
            "click" if arg.is_empty() => Err(ControlError::MissingArgument("click")),
            "click" => Ok(Command::Click(arg.to_string())),
            _ => Err(ControlError::UnknownCommand(line.to_string())),
        }
    }
}

/// Owns the page inputs and the current session
pub struct Controller {
    html: String,
    scripts: Vec<String>,
    config: Config,
    callbacks: Callbacks,
    session: Option<Session>,
}

impl Controller {
    pub fn new(html: impl Into<String>, scripts: Vec<String>, config: Config, callbacks: Callbacks) -> Self {
        Self {
            html: html.into(),
            scripts,
            config,
            callbacks,
            session: None,
        }
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Run `command`, returning the changed document if any
    pub fn handle(&mut self, command: &Command) -> Result<Option<String>, ControlError> {
        match command {
            Command::Start => self.start(),
            Command::Stop => {
                self.stop();
                Ok(None)
            }
            Command::Click(selector) => {
                let session = self.session.as_ref().ok_or(SessionError::NotStarted)?;
                Ok(session.trigger_click(selector)?)
            }
        }
    }

    fn start(&mut self) -> Result<Option<String>, ControlError> {
        self.stop();
        tracing::debug!("htm={}", truncate(&self.html, 50));
        let mut session = Session::new(self.html.clone(), self.config.clone(), self.callbacks.clone());
        session.start()?;

        let mut initialized = false;
        for (i, script) in self.scripts.iter().enumerate() {
            tracing::debug!("exec <script> {} ({} bytes, initial = {})", i, script.len(), !initialized);
            let result = session.exec(script, !initialized);
            initialized = true;
            match result {
                Ok(_) => {}
                Err(err) if err.is_halted() => {
                    tracing::info!("execution halted: {}", err);
                    self.session = Some(session);
                    return Ok(None);
                }
                Err(err) => tracing::warn!("exec <script> {}: {}", i, err),
            }
        }
        if !initialized {
            session.exec("", true)?;
        }

        session.close_doc()?;
        let html = session.track_changes()?;
        tracing::info!("start: changed = {}", html.is_some());
        self.session = Some(session);
        Ok(html)
    }

    fn stop(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.stop();
        }
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((i, _)) => &s[..i],
        None => s,
    }
}

/// Accept control connections on `addr` until the listener fails
pub async fn serve(addr: SocketAddr, controller: Controller) -> Result<(), ControlError> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("control listening on {}", listener.local_addr()?);
    serve_on(listener, Arc::new(Mutex::new(controller))).await
}

/// Accept loop over an already bound listener
pub async fn serve_on(listener: TcpListener, controller: Arc<Mutex<Controller>>) -> Result<(), ControlError> {
    loop {
        let (stream, peer) = listener.accept().await?;
        tracing::debug!("control connection from {}", peer);
        let controller = controller.clone();
        smol::spawn(async move {
            if let Err(err) = handle_connection(stream, controller).await {
                tracing::warn!("control {}: {}", peer, err);
            }
        })
        .detach();
    }
}

async fn handle_connection(stream: TcpStream, controller: Arc<Mutex<Controller>>) -> Result<(), ControlError> {
    let mut reader = BufReader::new(stream.clone());
    let mut line = String::new();
    reader.read_line(&mut line).await?;
    let command = match Command::parse(&line) {
        Err(ControlError::MissingArgument("click")) => {
            let mut selector = String::new();
            reader.read_line(&mut selector).await?;
            Command::parse(&format!("click {}", selector.trim()))?
        }
        other => other?,
    };

    // sessions block on their script thread, keep them off the executor
    let response = smol::unblock(move || {
        let mut controller = controller.lock().unwrap_or_else(PoisonError::into_inner);
        controller.handle(&command)
    })
    .await?;

    if let Some(html) = response {
        let mut stream = stream;
        stream.write_all(html.as_bytes()).await?;
        stream.flush().await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(Command::parse("start\n").unwrap(), Command::Start);
        assert_eq!(Command::parse(" stop ").unwrap(), Command::Stop);
        assert_eq!(
            Command::parse("click #go > a").unwrap(),
            Command::Click("#go > a".into())
        );
        assert!(matches!(Command::parse("click"), Err(ControlError::MissingArgument("click"))));
        assert!(matches!(Command::parse("reload"), Err(ControlError::UnknownCommand(_))));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("héllo", 2), "hé");
        assert_eq!(truncate("ab", 5), "ab");
    }

    #[test]
    fn test_click_without_session() {
        let mut controller = Controller::new("<p></p>", Vec::new(), Config::default(), Callbacks::default());
        let err = controller.handle(&Command::Click("p".into())).unwrap_err();
        assert!(matches!(err, ControlError::Session(SessionError::NotStarted)));
    }
}
