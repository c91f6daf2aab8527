use crate::commands::executable::Executable;
use crate::commands::{CommandParser, CommandParserError, ExecError};
use crate::frame::Frame;
use crate::store::Store;

/// Connection-scoped `CLIENT ...` requests, e.g. the `CLIENT SETINFO` calls client libraries
/// send right after connecting. Subcommands are not interpreted; every request is acknowledged.
#[derive(Debug, PartialEq)]
pub struct ClientMeta {}

impl Executable for ClientMeta {
    fn exec(self, _store: &mut Store) -> Result<Frame, ExecError> {
        Ok(Frame::Simple("OK".to_string()))
    }
}

impl TryFrom<&mut CommandParser> for ClientMeta {
    type Error = CommandParserError;

    fn try_from(_parser: &mut CommandParser) -> Result<Self, Self::Error> {
        Ok(Self {})
    }
}
