use bytes::Bytes;

use crate::commands::executable::Executable;
use crate::commands::{CommandParser, CommandParserError, ExecError};
use crate::frame::Frame;
use crate::store::Store;

/// Get the value of `key`.
///
/// Unlike Redis, a missing key is reported as an error reply rather than `nil`.
#[derive(Debug, PartialEq)]
pub struct Get {
    pub key: Bytes,
}

impl Executable for Get {
    fn exec(self, store: &mut Store) -> Result<Frame, ExecError> {
        store
            .get(&self.key)
            .map(Frame::Bulk)
            .ok_or(ExecError::KeyNotFound)
    }
}

impl TryFrom<&mut CommandParser> for Get {
    type Error = CommandParserError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        parser.expect_remaining(1, "GET")?;
        let key = parser.next_bytes()?;
        Ok(Self { key })
    }
}
