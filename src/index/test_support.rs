//! Record builders and a local HTTP origin shared by index and session tests.

use std::sync::{Arc, Mutex};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use super::{ChannelReference, PackageRecord, Version};

/// Channel used by test records.
pub fn test_channel() -> ChannelReference {
    ChannelReference::new("https://conda.example.org/test", "linux-64")
}

/// Build a minimal record with the given name and version.
pub fn record(name: &str, version: &str) -> PackageRecord {
    PackageRecord {
        name: name.to_string(),
        version: Version::parse(version).expect("valid test version"),
        build: "0".to_string(),
        build_number: 0,
        subdir: "linux-64".to_string(),
        file_name: format!("{name}-{version}-0.conda"),
        channel: test_channel(),
        size: Some(1024),
        depends: Vec::new(),
        timestamp: None,
        license: None,
        md5: None,
        sha256: None,
    }
}

/// Plain `repodata.json` bytes holding one `.conda` entry per `(name, version)`.
pub fn repodata(entries: &[(&str, &str)]) -> Vec<u8> {
    let packages: serde_json::Map<String, serde_json::Value> = entries
        .iter()
        .map(|(n, v)| {
            (
                format!("{n}-{v}-0.conda"),
                serde_json::json!({"name": n, "version": v, "build": "0"}),
            )
        })
        .collect();
    serde_json::to_vec(&serde_json::json!({"packages.conda": packages})).expect("serialize")
}

/// Local HTTP origin recording every request head it receives.
pub struct TestOrigin {
    /// `http://127.0.0.1:<port>/chan`.
    pub base_url: String,
    /// Lowercased request heads in arrival order.
    requests: Arc<Mutex<Vec<String>>>,
}

impl TestOrigin {
    /// Request heads received so far.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().expect("requests lock").clone()
    }

    /// Channel partition `noarch` on this origin.
    pub fn channel(&self) -> ChannelReference {
        ChannelReference::new(self.base_url.clone(), "noarch")
    }
}

/// Raw HTTP/1.1 response with `Content-Length` and `Connection: close`.
pub fn response(status: &str, headers: &[(&str, &str)], body: &[u8]) -> Vec<u8> {
    let mut out = format!(
        "HTTP/1.1 {status}\r\nContent-Length: {}\r\nConnection: close\r\n",
        body.len()
    );
    for (k, v) in headers {
        out.push_str(&format!("{k}: {v}\r\n"));
    }
    out.push_str("\r\n");
    let mut bytes = out.into_bytes();
    bytes.extend_from_slice(body);
    bytes
}

/// Serve `handler(lowercased request head, index of request)` on an ephemeral port.
pub async fn serve<F>(handler: F) -> TestOrigin
where
    F: Fn(&str, usize) -> Vec<u8> + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let requests = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&requests);
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let mut buf = Vec::new();
            let mut chunk = [0u8; 1024];
            while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                match socket.read(&mut chunk).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => buf.extend_from_slice(&chunk[..n]),
                }
            }
            let head = String::from_utf8_lossy(&buf).to_ascii_lowercase();
            let index = {
                let mut guard = seen.lock().expect("requests lock");
                guard.push(head.clone());
                guard.len() - 1
            };
            let reply = handler(&head, index);
            let _ = socket.write_all(&reply).await;
            let _ = socket.shutdown().await;
        }
    });
    TestOrigin {
        base_url: format!("http://{addr}/chan"),
        requests,
    }
}
