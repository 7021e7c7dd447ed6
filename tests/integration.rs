//! End-to-end tests over a real TCP connection.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};

use file_depot::config::ServerSettings;
use file_depot::storage::CHUNK_SIZE;
use file_depot::{FileService, LocalStorage, Server};

async fn start_server(max_clients: usize) -> (TempDir, SocketAddr) {
    let dir = TempDir::new().unwrap();
    let storage = LocalStorage::new(dir.path()).await.unwrap();
    let settings = ServerSettings {
        bind_address: "127.0.0.1".to_string(),
        port: 0,
        max_clients,
        max_command_length: 1024,
    };

    let server = Server::bind(settings, FileService::new(Arc::new(storage)))
        .await
        .unwrap();
    let addr = server.local_addr().unwrap();
    tokio::spawn(server.run());

    (dir, addr)
}

struct TestClient {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl TestClient {
    async fn connect(addr: SocketAddr) -> Self {
        let mut client = Self::connect_raw(addr).await;
        let greeting = client.read_line().await;
        assert_eq!(greeting, "220 file-depot ready");
        client
    }

    async fn connect_raw(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.unwrap();
        let (read_half, writer) = stream.into_split();
        Self {
            reader: BufReader::new(read_half),
            writer,
        }
    }

    async fn send(&mut self, line: &str) {
        self.writer
            .write_all(format!("{line}\r\n").as_bytes())
            .await
            .unwrap();
    }

    async fn send_raw(&mut self, bytes: &[u8]) {
        self.writer.write_all(bytes).await.unwrap();
    }

    async fn read_line(&mut self) -> String {
        let mut line = String::new();
        self.reader.read_line(&mut line).await.unwrap();
        line.trim_end_matches(['\r', '\n']).to_string()
    }

    async fn read_bytes(&mut self, n: usize) -> Vec<u8> {
        let mut buf = vec![0u8; n];
        self.reader.read_exact(&mut buf).await.unwrap();
        buf
    }

    async fn command(&mut self, line: &str) -> String {
        self.send(line).await;
        self.read_line().await
    }

    async fn upload(&mut self, name: &str, data: &[u8]) -> String {
        self.send(&format!("STOR {} {}", data.len(), name)).await;
        self.send_raw(data).await;
        self.read_line().await
    }

    async fn list(&mut self) -> Vec<String> {
        let header = self.command("LIST").await;
        let count: usize = header
            .strip_prefix("200 ")
            .and_then(|rest| rest.strip_suffix(" files"))
            .unwrap()
            .parse()
            .unwrap();

        let mut names = Vec::new();
        for _ in 0..count {
            names.push(self.read_line().await);
        }
        assert_eq!(self.read_line().await, "226 End of list");
        names
    }

    /// Returns the header line and the body
    async fn download(&mut self, name: &str) -> (String, Vec<u8>) {
        let header = self.command(&format!("RETR {name}")).await;
        let size: usize = header
            .strip_prefix("150 ")
            .and_then(|rest| rest.split(' ').next())
            .unwrap()
            .parse()
            .unwrap();
        let body = self.read_bytes(size).await;
        assert_eq!(self.read_line().await, "226 Transfer complete");
        (header, body)
    }
}

#[tokio::test]
async fn test_help_noop_quit() {
    let (_dir, addr) = start_server(4).await;
    let mut client = TestClient::connect(addr).await;

    client.send("HELP").await;
    let mut lines = Vec::new();
    loop {
        let line = client.read_line().await;
        let done = line.starts_with("214 ");
        lines.push(line);
        if done {
            break;
        }
    }
    assert!(lines.iter().any(|l| l.starts_with("214-RETR <name>")));
    assert_eq!(lines.last().unwrap(), "214 End of help");

    assert_eq!(client.command("NOOP").await, "200 OK");
    assert_eq!(client.command("QUIT").await, "221 Goodbye");

    let mut rest = String::new();
    client.reader.read_to_string(&mut rest).await.unwrap();
    assert!(rest.is_empty());
}

#[tokio::test]
async fn test_upload_list_download_delete() {
    let (dir, addr) = start_server(4).await;
    let mut client = TestClient::connect(addr).await;

    assert_eq!(
        client.upload("a.txt", b"hello").await,
        "201 File uploaded successfully: a.txt"
    );
    assert_eq!(client.list().await, vec!["a.txt".to_string()]);

    let (header, body) = client.download("a.txt").await;
    assert_eq!(header, "150 5 text/plain attachment; filename=\"a.txt\"");
    assert_eq!(body, b"hello");

    assert_eq!(
        client.command("DELE a.txt").await,
        "200 File deleted successfully: a.txt"
    );
    assert!(client.list().await.is_empty());
    assert!(!dir.path().join("a.txt").exists());
}

#[tokio::test]
async fn test_names_with_spaces() {
    let (_dir, addr) = start_server(4).await;
    let mut client = TestClient::connect(addr).await;

    client.upload("quarterly report.pdf", b"%PDF").await;
    let (header, body) = client.download("quarterly report.pdf").await;

    assert_eq!(
        header,
        "150 4 application/pdf attachment; filename=\"quarterly report.pdf\""
    );
    assert_eq!(body, b"%PDF");
}

#[tokio::test]
async fn test_error_replies_keep_session_in_sync() {
    let (_dir, addr) = start_server(4).await;
    let mut client = TestClient::connect(addr).await;

    client.upload("dup.txt", b"one").await;
    assert_eq!(
        client.upload("dup.txt", b"two two").await,
        "409 File already exists: dup.txt"
    );
    assert_eq!(client.command("NOOP").await, "200 OK");

    client.send("STOR 4").await;
    client.send_raw(b"data").await;
    assert_eq!(client.read_line().await, "400 Filename cannot be empty");

    assert_eq!(
        client.upload("../up.txt", b"x").await,
        "400 Invalid filename: ../up.txt"
    );

    assert_eq!(
        client.command("RETR nope.txt").await,
        "404 File not found: nope.txt"
    );
    assert_eq!(client.command("RETR").await, "400 Filename cannot be empty");
    assert_eq!(
        client.command("DELE nope.txt").await,
        "404 File not found: nope.txt"
    );
    assert_eq!(client.command("FROB").await, "400 Unknown command");
    assert_eq!(
        client.command("STOR many x").await,
        "400 Invalid upload size: many"
    );

    let (_, body) = client.download("dup.txt").await;
    assert_eq!(body, b"one");
}

#[tokio::test]
async fn test_command_too_long() {
    let (_dir, addr) = start_server(4).await;
    let mut client = TestClient::connect(addr).await;

    let long = format!("RETR {}", "x".repeat(2048));
    assert_eq!(client.command(&long).await, "400 Command too long");
    assert_eq!(client.read_line().await, "");

    let mut next = TestClient::connect(addr).await;
    assert_eq!(next.command("NOOP").await, "200 OK");
}

#[tokio::test]
async fn test_control_characters_in_names_are_refused() {
    let (_dir, addr) = start_server(4).await;
    let mut client = TestClient::connect(addr).await;

    client.send("STOR 2 fake\r226 End of list").await;
    client.send_raw(b"xx").await;
    assert_eq!(
        client.read_line().await,
        "400 Filename cannot contain control characters"
    );
    assert!(client.list().await.is_empty());
}

#[tokio::test]
async fn test_unterminated_line_is_cut_off() {
    let (_dir, addr) = start_server(4).await;
    let mut client = TestClient::connect(addr).await;

    // No newline ever arrives; the server must stop reading at the limit
    client.send_raw(&vec![b'A'; 8 * 1024]).await;
    assert_eq!(client.read_line().await, "400 Command too long");
    assert_eq!(client.read_line().await, "");
}

#[tokio::test]
async fn test_oversized_batch_count_is_rejected() {
    let (_dir, addr) = start_server(4).await;
    let mut client = TestClient::connect(addr).await;

    assert_eq!(
        client.command("MSTOR 18446744073709551615").await,
        "400 Too many files in batch: 18446744073709551615 (max 256)"
    );
    assert_eq!(
        client.command("MSTOR 1000000000000").await,
        "400 Too many files in batch: 1000000000000 (max 256)"
    );
    assert_eq!(client.command("NOOP").await, "200 OK");

    // Other clients are unaffected
    let mut other = TestClient::connect(addr).await;
    assert_eq!(
        other.upload("after.txt", b"ok").await,
        "201 File uploaded successfully: after.txt"
    );
}

#[tokio::test]
async fn test_oversized_batch_header_closes_connection() {
    let (dir, addr) = start_server(4).await;
    let mut client = TestClient::connect(addr).await;

    client.send("MSTOR 2").await;
    client.send("1 first.txt").await;
    client.send_raw(b"1").await;
    client.send_raw(format!("1 {}", "n".repeat(4096)).as_bytes()).await;
    assert_eq!(client.read_line().await, "400 Command too long");
    assert_eq!(client.read_line().await, "");

    // Files before the bad header stay stored
    assert!(dir.path().join("first.txt").exists());
}

#[tokio::test]
async fn test_batch_upload() {
    let (_dir, addr) = start_server(4).await;
    let mut client = TestClient::connect(addr).await;

    client.send("MSTOR 2").await;
    client.send("3 one.txt").await;
    client.send_raw(b"111").await;
    client.send("2 two.txt").await;
    client.send_raw(b"22").await;
    assert_eq!(
        client.read_line().await,
        "201 Uploaded 2 files: one.txt, two.txt"
    );

    let mut names = client.list().await;
    names.sort();
    assert_eq!(names, vec!["one.txt".to_string(), "two.txt".to_string()]);
}

#[tokio::test]
async fn test_batch_upload_stops_at_first_failure() {
    let (_dir, addr) = start_server(4).await;
    let mut client = TestClient::connect(addr).await;
    client.upload("taken.txt", b"original").await;

    client.send("MSTOR 3").await;
    client.send("1 first.txt").await;
    client.send_raw(b"1").await;
    client.send("5 taken.txt").await;
    client.send_raw(b"new!!").await;
    client.send("1 third.txt").await;
    client.send_raw(b"3").await;
    assert_eq!(client.read_line().await, "409 File already exists: taken.txt");

    let mut names = client.list().await;
    names.sort();
    assert_eq!(names, vec!["first.txt".to_string(), "taken.txt".to_string()]);

    let (_, body) = client.download("taken.txt").await;
    assert_eq!(body, b"original");
}

#[tokio::test]
async fn test_multi_chunk_transfer() {
    let (_dir, addr) = start_server(4).await;
    let mut client = TestClient::connect(addr).await;
    let data: Vec<u8> = (0..3 * CHUNK_SIZE + 7).map(|i| (i % 253) as u8).collect();

    assert_eq!(
        client.upload("large.bin", &data).await,
        "201 File uploaded successfully: large.bin"
    );

    let (header, body) = client.download("large.bin").await;
    assert_eq!(
        header,
        format!(
            "150 {} application/octet-stream attachment; filename=\"large.bin\"",
            data.len()
        )
    );
    assert_eq!(body, data);
}

#[tokio::test]
async fn test_disconnect_mid_upload_stores_nothing() {
    let (dir, addr) = start_server(4).await;

    {
        let mut client = TestClient::connect(addr).await;
        client.send("STOR 100 partial.bin").await;
        client.send_raw(&[9u8; 10]).await;
    }

    tokio::time::sleep(Duration::from_millis(100)).await;

    let mut client = TestClient::connect(addr).await;
    assert!(client.list().await.is_empty());
    assert!(!dir.path().join("partial.bin").exists());

    // The name was never taken
    assert_eq!(
        client.upload("partial.bin", b"whole").await,
        "201 File uploaded successfully: partial.bin"
    );
}

#[tokio::test]
async fn test_disconnect_mid_download_keeps_server_usable() {
    let (_dir, addr) = start_server(4).await;
    let data = vec![5u8; 4 * CHUNK_SIZE];

    let mut client = TestClient::connect(addr).await;
    client.upload("stream.bin", &data).await;

    {
        let mut leaver = TestClient::connect(addr).await;
        let header = leaver.command("RETR stream.bin").await;
        assert!(header.starts_with("150 "));
        leaver.read_bytes(1024).await;
    }

    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(
        client.command("DELE stream.bin").await,
        "200 File deleted successfully: stream.bin"
    );
    assert!(client.list().await.is_empty());
}

#[tokio::test]
async fn test_connection_limit() {
    let (_dir, addr) = start_server(1).await;

    let mut first = TestClient::connect(addr).await;

    let mut second = TestClient::connect_raw(addr).await;
    assert_eq!(
        second.read_line().await,
        "421 Too many connections. Try again later."
    );

    assert_eq!(first.command("NOOP").await, "200 OK");
    assert_eq!(first.command("QUIT").await, "221 Goodbye");

    // The slot frees up once the first session ends
    tokio::time::sleep(Duration::from_millis(100)).await;
    let mut third = TestClient::connect(addr).await;
    assert_eq!(third.command("NOOP").await, "200 OK");
}
