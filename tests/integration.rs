use bytes::Bytes;
use redis::aio::MultiplexedConnection;
use redis::RedisError;
use std::net::SocketAddr;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use solodis::config::Config;
use solodis::connection::Connection;
use solodis::frame::Frame;
use solodis::server::Server;
use solodis::Error;

struct TestServer {
    addr: SocketAddr,
    stop: oneshot::Sender<()>,
    task: JoinHandle<Result<(), Error>>,
}

impl TestServer {
    async fn start() -> TestServer {
        Self::start_with(Config::default()).await
    }

    async fn start_with(config: Config) -> TestServer {
        let config = Config {
            listen_addr: "127.0.0.1:0".to_string(),
            ..config
        };
        let server = Server::bind(config).await.unwrap();
        let addr = server.local_addr().unwrap();

        let (stop, stopped) = oneshot::channel::<()>();
        let task = tokio::spawn(server.run_until(async move {
            let _ = stopped.await;
        }));

        TestServer { addr, stop, task }
    }

    async fn connect(&self) -> Result<MultiplexedConnection, RedisError> {
        let client = redis::Client::open(format!("redis://{}/", self.addr))?;
        client.get_multiplexed_async_connection().await
    }

    async fn connect_raw(&self) -> Connection {
        let stream = TcpStream::connect(self.addr).await.unwrap();
        Connection::new(stream).unwrap()
    }

    async fn shutdown(self) {
        self.stop.send(()).unwrap();
        self.task.await.unwrap().unwrap();
    }
}

fn request(args: &[&str]) -> Frame {
    Frame::Array(
        args.iter()
            .map(|arg| Frame::Bulk(Bytes::copy_from_slice(arg.as_bytes())))
            .collect(),
    )
}

#[tokio::test]
async fn test_set_and_get() {
    let server = TestServer::start().await;
    let mut con = server.connect().await.unwrap();

    let reply: String = redis::cmd("SET")
        .arg("foo")
        .arg("bar")
        .query_async(&mut con)
        .await
        .unwrap();
    assert_eq!(reply, "OK");

    let value: String = redis::cmd("GET")
        .arg("foo")
        .query_async(&mut con)
        .await
        .unwrap();
    assert_eq!(value, "bar");

    server.shutdown().await;
}

#[tokio::test]
async fn test_binary_values() {
    let server = TestServer::start().await;
    let mut con = server.connect().await.unwrap();
    let value: Vec<u8> = vec![0, 255, b'\r', b'\n', 7];

    let _: () = redis::cmd("SET")
        .arg("bin")
        .arg(value.as_slice())
        .query_async(&mut con)
        .await
        .unwrap();

    let actual: Vec<u8> = redis::cmd("GET")
        .arg("bin")
        .query_async(&mut con)
        .await
        .unwrap();
    assert_eq!(actual, value);

    server.shutdown().await;
}

#[tokio::test]
async fn test_get_missing_key() {
    let server = TestServer::start().await;
    let mut con = server.connect().await.unwrap();

    let result: Result<Option<String>, RedisError> = redis::cmd("GET")
        .arg("missing")
        .query_async(&mut con)
        .await;

    let err = result.unwrap_err();
    assert!(
        err.to_string().contains("key not found"),
        "unexpected error: {err}"
    );

    server.shutdown().await;
}

#[tokio::test]
async fn test_wrong_number_of_arguments_keeps_connection_usable() {
    let server = TestServer::start().await;
    let mut con = server.connect().await.unwrap();

    let result: Result<(), RedisError> = redis::cmd("SET").arg("foo").query_async(&mut con).await;
    let err = result.unwrap_err();
    assert!(
        err.to_string().contains("wrong number of arguments"),
        "unexpected error: {err}"
    );

    let _: () = redis::cmd("SET")
        .arg("foo")
        .arg("baz")
        .query_async(&mut con)
        .await
        .unwrap();
    let value: String = redis::cmd("GET")
        .arg("foo")
        .query_async(&mut con)
        .await
        .unwrap();
    assert_eq!(value, "baz");

    server.shutdown().await;
}

#[tokio::test]
async fn test_decode_errors_are_replied() {
    let server = TestServer::start().await;
    let mut conn = server.connect_raw().await;

    let cases = [
        (Frame::Array(vec![]), "ERR empty command"),
        (request(&["FLUSHALL"]), "ERR unknown command 'FLUSHALL'"),
        (request(&["GET"]), "ERR wrong number of arguments for GET"),
        (
            request(&["get", "a", "b"]),
            "ERR wrong number of arguments for GET",
        ),
        (
            Frame::Simple("PING".to_string()),
            "ERR protocol error; expected array of strings, got simple string",
        ),
    ];

    for (frame, expected) in cases {
        conn.write_frame(frame).await.unwrap();
        assert_eq!(
            conn.read_frame().await.unwrap(),
            Some(Frame::Error(expected.to_string()))
        );
    }

    // Still served after all those errors.
    conn.write_frame(request(&["CLIENT", "SETNAME", "test"]))
        .await
        .unwrap();
    assert_eq!(
        conn.read_frame().await.unwrap(),
        Some(Frame::Simple("OK".to_string()))
    );

    server.shutdown().await;
}

#[tokio::test]
async fn test_cross_connection_visibility() {
    let server = TestServer::start().await;
    let mut a = server.connect().await.unwrap();
    let mut b = server.connect().await.unwrap();

    let _: () = redis::cmd("SET")
        .arg("x")
        .arg(1)
        .query_async(&mut a)
        .await
        .unwrap();

    let value: String = redis::cmd("GET")
        .arg("x")
        .query_async(&mut b)
        .await
        .unwrap();
    assert_eq!(value, "1");

    server.shutdown().await;
}

#[tokio::test]
async fn test_same_connection_order() {
    let server = TestServer::start().await;
    let mut con = server.connect().await.unwrap();

    let replies: (String, String, String, String) = redis::pipe()
        .cmd("SET")
        .arg("order")
        .arg(1)
        .cmd("SET")
        .arg("order")
        .arg(2)
        .cmd("SET")
        .arg("order")
        .arg(3)
        .cmd("GET")
        .arg("order")
        .query_async(&mut con)
        .await
        .unwrap();

    assert_eq!(
        replies,
        (
            "OK".to_string(),
            "OK".to_string(),
            "OK".to_string(),
            "3".to_string()
        )
    );

    server.shutdown().await;
}

#[tokio::test]
async fn test_concurrent_sets_to_different_keys() {
    let server = TestServer::start().await;

    let mut expected = Vec::new();
    let mut tasks = Vec::new();
    for client in 0..8 {
        let mut con = server.connect().await.unwrap();
        let entries: Vec<(String, u64)> = (0..25)
            .map(|i| (format!("client{client}:key{i}"), rand::random::<u64>()))
            .collect();
        expected.extend(entries.clone());

        tasks.push(tokio::spawn(async move {
            for (key, value) in entries {
                let _: () = redis::cmd("SET")
                    .arg(&key)
                    .arg(value)
                    .query_async(&mut con)
                    .await
                    .unwrap();
            }
        }));
    }

    for task in tasks {
        task.await.unwrap();
    }

    let mut con = server.connect().await.unwrap();
    for (key, value) in expected {
        let actual: u64 = redis::cmd("GET")
            .arg(&key)
            .query_async(&mut con)
            .await
            .unwrap();
        assert_eq!(actual, value, "lost write for {key}");
    }

    server.shutdown().await;
}

#[tokio::test]
async fn test_hello() {
    let server = TestServer::start().await;
    let mut conn = server.connect_raw().await;

    conn.write_frame(request(&["HELLO", "3"])).await.unwrap();
    let reply = conn.read_frame().await.unwrap();

    let Some(Frame::Map(entries)) = reply else {
        panic!("expected a map reply, got {reply:?}");
    };
    assert!(entries.contains(&(
        Frame::Bulk(Bytes::from("server")),
        Frame::Bulk(Bytes::from("solodis"))
    )));

    server.shutdown().await;
}

#[tokio::test]
async fn test_max_keys() {
    let server = TestServer::start_with(Config {
        max_keys: Some(1),
        ..Config::default()
    })
    .await;
    let mut conn = server.connect_raw().await;

    conn.write_frame(request(&["SET", "a", "1"])).await.unwrap();
    assert_eq!(
        conn.read_frame().await.unwrap(),
        Some(Frame::Simple("OK".to_string()))
    );

    conn.write_frame(request(&["SET", "b", "2"])).await.unwrap();
    assert_eq!(
        conn.read_frame().await.unwrap(),
        Some(Frame::Error("ERR max number of keys (1) reached".to_string()))
    );

    server.shutdown().await;
}

#[tokio::test]
async fn test_shutdown() {
    let server = TestServer::start().await;
    let addr = server.addr;
    let mut conn = server.connect_raw().await;

    conn.write_frame(request(&["SET", "a", "1"])).await.unwrap();
    assert_eq!(
        conn.read_frame().await.unwrap(),
        Some(Frame::Simple("OK".to_string()))
    );

    server.shutdown().await;

    // The listener is gone.
    assert!(TcpStream::connect(addr).await.is_err());

    // Open connections are told the server is going away on their next request, then closed.
    conn.write_frame(request(&["GET", "a"])).await.unwrap();
    assert_eq!(
        conn.read_frame().await.unwrap(),
        Some(Frame::Error("ERR server shutting down".to_string()))
    );
    assert!(!matches!(conn.read_frame().await, Ok(Some(_))));
}

/// Writes raw bytes on a fresh connection and returns it wrapped for reading replies.
///
/// Write errors are ignored: the server may reset the connection before a hostile payload has
/// been sent in full.
async fn send_raw(addr: SocketAddr, bytes: &[u8]) -> Connection {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let _ = stream.write_all(bytes).await;
    Connection::new(stream).unwrap()
}

#[tokio::test]
async fn test_deeply_nested_request_does_not_take_down_server() {
    let server = TestServer::start().await;

    let mut payload = b"*1\r\n".repeat(200_000);
    payload.extend_from_slice(b":1\r\n");
    let mut hostile = send_raw(server.addr, &payload).await;

    // The offending connection is dropped without a reply.
    assert!(!matches!(hostile.read_frame().await, Ok(Some(_))));

    // Everyone else is still served.
    let mut con = server.connect().await.unwrap();
    let _: () = redis::cmd("SET")
        .arg("alive")
        .arg("yes")
        .query_async(&mut con)
        .await
        .unwrap();
    let value: String = redis::cmd("GET")
        .arg("alive")
        .query_async(&mut con)
        .await
        .unwrap();
    assert_eq!(value, "yes");

    server.shutdown().await;
}

#[tokio::test]
async fn test_crlf_in_command_name_yields_a_single_error_reply() {
    let server = TestServer::start().await;
    let mut conn = send_raw(server.addr, b"*1\r\n$8\r\nX\r\n+OK\r\n\r\n").await;

    assert_eq!(
        conn.read_frame().await.unwrap(),
        Some(Frame::Error("ERR unknown command 'X  +OK  '".to_string()))
    );

    // A smuggled `+OK` would show up here instead of the GET reply.
    conn.write_frame(request(&["GET", "missing"])).await.unwrap();
    assert_eq!(
        conn.read_frame().await.unwrap(),
        Some(Frame::Error("ERR key not found".to_string()))
    );

    server.shutdown().await;
}

#[tokio::test]
async fn test_nested_array_request_yields_a_single_error_reply() {
    let server = TestServer::start().await;
    let mut conn = send_raw(server.addr, b"*1\r\n*0\r\n").await;

    assert_eq!(
        conn.read_frame().await.unwrap(),
        Some(Frame::Error(
            "ERR protocol error; expected array of strings, got array".to_string()
        ))
    );

    conn.write_frame(request(&["SET", "k", "v"])).await.unwrap();
    assert_eq!(
        conn.read_frame().await.unwrap(),
        Some(Frame::Simple("OK".to_string()))
    );
    conn.write_frame(request(&["GET", "k"])).await.unwrap();
    assert_eq!(
        conn.read_frame().await.unwrap(),
        Some(Frame::Bulk(Bytes::from("v")))
    );

    server.shutdown().await;
}
