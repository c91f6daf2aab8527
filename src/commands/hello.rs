use bytes::Bytes;

use crate::commands::executable::Executable;
use crate::commands::{CommandParser, CommandParserError, ExecError};
use crate::frame::Frame;
use crate::store::Store;

pub const SERVER_NAME: &str = "solodis";

/// Handshake sent by clients when they connect. Replies with a map describing the server.
/// Protocol version and authentication arguments are accepted and ignored.
///
/// Ref: <https://redis.io/docs/latest/commands/hello>
#[derive(Debug, PartialEq)]
pub struct Hello {}

impl Executable for Hello {
    fn exec(self, _store: &mut Store) -> Result<Frame, ExecError> {
        let fields = [
            ("server", SERVER_NAME),
            ("version", env!("CARGO_PKG_VERSION")),
            ("proto", "3"),
            ("mode", "standalone"),
            ("role", "master"),
        ];

        let entries = fields
            .into_iter()
            .map(|(key, value)| {
                (
                    Frame::Bulk(Bytes::from_static(key.as_bytes())),
                    Frame::Bulk(Bytes::from_static(value.as_bytes())),
                )
            })
            .collect();

        Ok(Frame::Map(entries))
    }
}

impl TryFrom<&mut CommandParser> for Hello {
    type Error = CommandParserError;

    fn try_from(_parser: &mut CommandParser) -> Result<Self, Self::Error> {
        Ok(Self {})
    }
}
