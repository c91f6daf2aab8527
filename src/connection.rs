use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use tokio::net::TcpStream;
use tokio_util::codec::Framed;
use uuid::Uuid;

use crate::codec::FrameCodec;
use crate::frame::Frame;
use crate::Error;

/// A client connection that reads and writes whole RESP frames.
pub struct Connection {
    pub id: Uuid,
    pub client_address: SocketAddr,
    // Bytes read from the socket are buffered by the codec until a complete frame is parsed.
    framed: Framed<TcpStream, FrameCodec>,
}

impl Connection {
    pub fn new(stream: TcpStream) -> Result<Connection, Error> {
        Self::with_codec(stream, FrameCodec::default())
    }

    pub fn with_codec(stream: TcpStream, codec: FrameCodec) -> Result<Connection, Error> {
        let client_address = stream.peer_addr()?;

        Ok(Connection {
            id: Uuid::new_v4(),
            client_address,
            framed: Framed::new(stream, codec),
        })
    }

    /// Reads the next frame. Returns `None` once the peer closed the connection cleanly.
    pub async fn read_frame(&mut self) -> Result<Option<Frame>, Error> {
        self.framed.next().await.transpose()
    }

    pub async fn write_frame(&mut self, frame: Frame) -> Result<(), Error> {
        self.framed.send(frame).await
    }
}
