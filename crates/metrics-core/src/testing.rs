//! Fakes shared by the unit tests

use std::collections::VecDeque;
use std::sync::Mutex;

use metrics_platform::counters::{
    CounterError, CpuTimes, InterfaceCounters, MemoryStats, SystemCounters,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

/// Counter source that replays scripted readings
#[derive(Default)]
pub struct FakeCounters {
    pub cpu: Mutex<VecDeque<CpuTimes>>,
    pub memory: MemoryStats,
    pub network: Mutex<VecDeque<Vec<InterfaceCounters>>>,
    pub fail_memory: bool,
    pub fail_network: bool,
}

impl FakeCounters {
    pub fn with_cpu(readings: Vec<CpuTimes>) -> Self {
        Self {
            cpu: Mutex::new(readings.into()),
            ..Self::default()
        }
    }
}

impl SystemCounters for FakeCounters {
    fn hostname(&self) -> String {
        "test-host".to_string()
    }
    fn os_name(&self) -> String {
        "linux".to_string()
    }
    fn os_version(&self) -> Option<String> {
        Some("Test OS 1.0".to_string())
    }
    fn arch(&self) -> String {
        "amd64".to_string()
    }
    fn cpu_times(&self) -> Result<CpuTimes, CounterError> {
        self.cpu
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| CounterError::parse("/proc/stat", "exhausted"))
    }
    fn memory(&self) -> Result<MemoryStats, CounterError> {
        if self.fail_memory {
            return Err(CounterError::parse("/proc/meminfo", "broken"));
        }
        Ok(self.memory)
    }
    fn network_interfaces(&self) -> Result<Vec<InterfaceCounters>, CounterError> {
        if self.fail_network {
            return Err(CounterError::parse("/proc/net/dev", "broken"));
        }
        Ok(self.network.lock().unwrap().pop_front().unwrap_or_default())
    }
}

pub fn cpu(user: u64, system: u64, idle: u64, total: u64) -> CpuTimes {
    CpuTimes {
        user,
        system,
        idle,
        total,
        ..CpuTimes::default()
    }
}

pub fn iface(name: &str, rx: u64, tx: u64) -> InterfaceCounters {
    InterfaceCounters {
        name: name.to_string(),
        rx_bytes: rx,
        tx_bytes: tx,
    }
}

pub struct CapturedRequest {
    pub head: String,
    pub body: Vec<u8>,
}

impl CapturedRequest {
    pub fn header(&self, name: &str) -> Option<String> {
        self.head.lines().skip(1).find_map(|line| {
            let (key, value) = line.split_once(':')?;
            key.trim()
                .eq_ignore_ascii_case(name)
                .then(|| value.trim().to_string())
        })
    }

    pub fn request_line(&self) -> &str {
        self.head.lines().next().unwrap_or_default()
    }
}

/// Serve exactly one HTTP/1.1 request with a canned response. Returns the base
/// URL and a receiver for the request as the server saw it.
pub async fn serve_once(
    status_line: &'static str,
    body: &'static str,
) -> (String, oneshot::Receiver<CapturedRequest>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];

        let header_end = loop {
            let n = socket.read(&mut chunk).await.unwrap();
            assert!(n > 0, "connection closed before headers");
            buf.extend_from_slice(&chunk[..n]);
            if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
        };

        let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
        let content_length = head
            .lines()
            .find_map(|l| {
                let (k, v) = l.split_once(':')?;
                k.trim()
                    .eq_ignore_ascii_case("content-length")
                    .then(|| v.trim().parse::<usize>().ok())
                    .flatten()
            })
            .unwrap_or(0);

        while buf.len() < header_end + content_length {
            let n = socket.read(&mut chunk).await.unwrap();
            assert!(n > 0, "connection closed before body");
            buf.extend_from_slice(&chunk[..n]);
        }

        let response = format!(
            "{}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status_line,
            body.len(),
            body
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.ok();

        let _ = tx.send(CapturedRequest {
            head,
            body: buf[header_end..header_end + content_length].to_vec(),
        });
    });

    (format!("http://{}", addr), rx)
}

/// Accept one connection, read the request head and never answer. Returns the
/// base URL and a receiver that fires once the head has arrived.
pub async fn serve_silently() -> (String, oneshot::Receiver<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];

        loop {
            let n = socket.read(&mut chunk).await.unwrap_or(0);
            if n == 0 {
                return;
            }
            buf.extend_from_slice(&chunk[..n]);
            if buf.windows(4).any(|w| w == b"\r\n\r\n") {
                break;
            }
        }

        let _ = tx.send(());
        // hold the connection open without responding
        std::future::pending::<()>().await;
        drop(socket);
    });

    (format!("http://{}", addr), rx)
}
