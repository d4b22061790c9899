//! Right-click opens the chat surface, which is an external program. The
//! main loop only fires the request; the child runs and is waited on in a
//! worker thread, and its outcome comes back through a channel.

use bevy::prelude::*;
use std::process::Command;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Mutex;
use std::thread;

#[cfg(windows)]
use std::os::windows::process::CommandExt;

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x08000000;

#[derive(Event, Clone, Copy, Debug, Default)]
pub struct OpenChat;

#[derive(Debug, PartialEq)]
pub enum ChatOutcome {
    Closed { status: Option<i32> },
    Failed(String),
}

#[derive(Resource)]
pub struct ChatBridge {
    command: Option<Vec<String>>,
    sender: Sender<ChatOutcome>,
    // Receiver is !Sync; resources need Sync.
    receiver: Mutex<Receiver<ChatOutcome>>,
    in_flight: bool,
}

impl ChatBridge {
    pub fn new(command: Option<Vec<String>>) -> Self {
        let (sender, receiver) = channel();
        Self {
            command,
            sender,
            receiver: Mutex::new(receiver),
            in_flight: false,
        }
    }

    /// Starts the chat program unless one is already open. Returns whether a
    /// new one was started.
    pub fn open(&mut self) -> bool {
        if self.in_flight {
            info!("Chat already open");
            return false;
        }
        let Some((program, args)) = self.command.as_ref().and_then(|c| c.split_first()) else {
            info!("Chat requested but no chat command is configured");
            return false;
        };
        let mut command = Command::new(program);
        command.args(args);
        #[cfg(windows)]
        command.creation_flags(CREATE_NO_WINDOW);

        let sender = self.sender.clone();
        let spawned = thread::Builder::new()
            .name("chat".into())
            .spawn(move || {
                let outcome = match command.status() {
                    Ok(status) => ChatOutcome::Closed {
                        status: status.code(),
                    },
                    Err(err) => ChatOutcome::Failed(err.to_string()),
                };
                // The app may have quit already.
                let _ = sender.send(outcome);
            });
        match spawned {
            Ok(_) => {
                info!("Opening chat with `{program}`");
                self.in_flight = true;
                true
            }
            Err(err) => {
                warn!("Could not start chat worker: {err}");
                false
            }
        }
    }

    /// Outcomes posted by the worker since the last call.
    pub fn drain(&mut self) -> Vec<ChatOutcome> {
        let outcomes: Vec<ChatOutcome> = match self.receiver.get_mut() {
            Ok(receiver) => receiver.try_iter().collect(),
            Err(_) => Vec::new(),
        };
        if !outcomes.is_empty() {
            self.in_flight = false;
        }
        outcomes
    }
}

pub fn open_chat(mut requests: EventReader<OpenChat>, mut bridge: ResMut<ChatBridge>) {
    // Several clicks in one frame still open a single chat.
    if requests.read().count() > 0 {
        bridge.open();
    }
}

pub fn collect_chat_outcomes(mut bridge: ResMut<ChatBridge>) {
    for outcome in bridge.drain() {
        match outcome {
            ChatOutcome::Closed { status: Some(0) } => info!("Chat closed"),
            ChatOutcome::Closed { status } => warn!("Chat exited with status {status:?}"),
            ChatOutcome::Failed(reason) => warn!("Chat failed to run: {reason}"),
        }
    }
}
