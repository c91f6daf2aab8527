use tracing::{debug, info, instrument};

use crate::commands::{error_reply, Command};
use crate::connection::Connection;
use crate::coordinator::{CoordinatorHandle, Session};
use crate::Error;

/// Serves one client until it disconnects.
///
/// Each frame read gets exactly one reply, written before the next frame is read. Commands are
/// executed by the coordinator; the reply is written here so a slow client never stalls it.
#[instrument(
    name = "connection",
    skip(conn, coordinator),
    fields(connection_id = %conn.id, client_address = %conn.client_address)
)]
pub async fn handle_connection(
    mut conn: Connection,
    coordinator: CoordinatorHandle,
) -> Result<(), Error> {
    let session = Session::new(conn.id, conn.client_address);
    coordinator.connect(session).await?;

    let result = serve(&mut conn, &coordinator).await;

    // The coordinator is told about the disconnect whatever ended the session.
    if let Err(e) = coordinator.disconnect(conn.id).await {
        debug!("Could not report disconnect: {}", e);
    }

    result
}

async fn serve(conn: &mut Connection, coordinator: &CoordinatorHandle) -> Result<(), Error> {
    while let Some(frame) = conn.read_frame().await? {
        debug!("Received frame from client: {:?}", frame);

        let res = match Command::try_from(frame) {
            Ok(cmd) => match coordinator.submit(conn.id, cmd).await {
                Ok(res) => res,
                Err(e) => {
                    // Best effort; the client may already be gone.
                    let _ = conn.write_frame(error_reply("server shutting down")).await;
                    return Err(e.into());
                }
            },
            // Malformed requests are answered and the connection stays open.
            Err(e) => error_reply(e),
        };

        debug!("Sending response to client: {:?}", res);
        conn.write_frame(res).await?;
    }

    info!("Connection closed");
    Ok(())
}
