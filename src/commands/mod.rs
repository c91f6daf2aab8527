pub mod client;
pub mod executable;
pub mod get;
pub mod hello;
pub mod set;

use bytes::Bytes;
use std::fmt;
use std::str::{self, FromStr};
use std::vec;
use strum_macros::{EnumString, IntoStaticStr};
use thiserror::Error as ThisError;

use crate::commands::executable::Executable;
use crate::frame::Frame;
use crate::store::{Store, WriteError};

use client::ClientMeta;
use get::Get;
use hello::Hello;
use set::Set;

/// A parsed client request. Commands carry no reference to the connection they came from; the
/// connection handler pairs them with their origin when submitting them for execution.
#[derive(Debug, PartialEq, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum Command {
    Get(Get),
    Set(Set),

    #[strum(serialize = "client")]
    ClientMeta(ClientMeta),
    Hello(Hello),
}

impl Command {
    pub fn name(&self) -> &'static str {
        self.into()
    }
}

impl Executable for Command {
    fn exec(self, store: &mut Store) -> Result<Frame, ExecError> {
        match self {
            Command::Get(cmd) => cmd.exec(store),
            Command::Set(cmd) => cmd.exec(store),
            Command::ClientMeta(cmd) => cmd.exec(store),
            Command::Hello(cmd) => cmd.exec(store),
        }
    }
}

/// Command names the decoder recognizes. Matching is case-insensitive.
#[derive(Debug, EnumString)]
#[strum(ascii_case_insensitive)]
enum Verb {
    Get,
    Set,
    Client,
    Hello,
}

impl TryFrom<Frame> for Command {
    type Error = CommandParserError;

    fn try_from(frame: Frame) -> Result<Self, Self::Error> {
        let parser = &mut CommandParser::try_from(frame)?;

        let command_name = parser.next_bytes().map_err(|_| CommandParserError::EmptyCommand)?;
        let verb = str::from_utf8(&command_name)
            .ok()
            .and_then(|name| Verb::from_str(name).ok())
            .ok_or_else(|| CommandParserError::UnknownCommand {
                command: String::from_utf8_lossy(&command_name).into_owned(),
            })?;

        match verb {
            Verb::Get => Get::try_from(parser).map(Command::Get),
            Verb::Set => Set::try_from(parser).map(Command::Set),
            Verb::Client => ClientMeta::try_from(parser).map(Command::ClientMeta),
            Verb::Hello => Hello::try_from(parser).map(Command::Hello),
        }
    }
}

/// The arguments of a single request, in order, command name first.
pub struct CommandParser {
    args: vec::IntoIter<Bytes>,
}

impl TryFrom<Frame> for CommandParser {
    type Error = CommandParserError;

    fn try_from(frame: Frame) -> Result<Self, Self::Error> {
        // Clients send commands to the server as RESP arrays of strings.
        let frames = match frame {
            Frame::Array(array) => array,
            frame => return Err(CommandParserError::InvalidFrame { actual: frame }),
        };

        let args = frames
            .into_iter()
            .map(|frame| match frame {
                // Both `Simple` and `Bulk` representation may carry an argument. While errors
                // are stored as strings, they are considered separate types.
                Frame::Simple(s) => Ok(Bytes::from(s)),
                Frame::Bulk(bytes) => Ok(bytes),
                frame => Err(CommandParserError::InvalidFrame { actual: frame }),
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            args: args.into_iter(),
        })
    }
}

impl CommandParser {
    /// Number of arguments not consumed yet.
    fn remaining(&self) -> usize {
        self.args.len()
    }

    fn next_bytes(&mut self) -> Result<Bytes, CommandParserError> {
        self.args.next().ok_or(CommandParserError::EndOfStream)
    }

    /// Fails unless exactly `count` arguments are left.
    fn expect_remaining(
        &self,
        count: usize,
        command: &'static str,
    ) -> Result<(), CommandParserError> {
        if self.remaining() != count {
            return Err(CommandParserError::WrongNumberOfArguments { command });
        }
        Ok(())
    }
}

#[derive(Debug, ThisError, PartialEq)]
pub enum CommandParserError {
    #[error("protocol error; expected array of strings, got {}", .actual.kind())]
    InvalidFrame { actual: Frame },
    #[error("empty command")]
    EmptyCommand,
    #[error("unknown command '{command}'")]
    UnknownCommand { command: String },
    #[error("wrong number of arguments for {command}")]
    WrongNumberOfArguments { command: &'static str },
    #[error("protocol error; attempting to extract a value failed due to the frame being fully consumed")]
    EndOfStream,
}

/// Failures while executing a decoded command against the store.
#[derive(Debug, ThisError, PartialEq)]
pub enum ExecError {
    #[error("key not found")]
    KeyNotFound,
    #[error(transparent)]
    Write(#[from] WriteError),
}

/// The `-ERR ...` reply sent to clients for a failed request.
///
/// Messages may echo client input, so line breaks are replaced to keep the reply a single line.
pub fn error_reply(err: impl fmt::Display) -> Frame {
    let msg = format!("ERR {}", err).replace(['\r', '\n'], " ");
    Frame::Error(msg)
}
