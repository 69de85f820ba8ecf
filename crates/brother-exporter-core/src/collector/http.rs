//! Device snapshot over plain HTTP.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, StatusCode, Url};
use tokio::sync::Mutex;
use tracing::debug;

use super::{FetchError, SnapshotSource};

/// Fetches the CSV snapshot with one bounded GET per call.
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: Client,
    url: Url,
    timeout: Duration,
    /// When set, fetches are serialized so the device never sees two at once.
    gate: Option<Arc<Mutex<()>>>,
}

impl HttpSource {
    /// Creates a source for `url`. The timeout covers connect, headers and body.
    pub fn new(url: &str, timeout: Duration) -> Result<Self, FetchError> {
        if timeout.is_zero() {
            return Err(FetchError::InvalidConfig(
                "timeout must be greater than zero".to_string(),
            ));
        }
        let url = Url::parse(url)
            .map_err(|e| FetchError::InvalidConfig(format!("{}: {}", url, e)))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(FetchError::InvalidConfig(format!(
                "unsupported scheme {:?}",
                url.scheme()
            )));
        }
        // The device sits on the local network; environment proxies do not apply.
        let client = Client::builder()
            .no_proxy()
            .build()
            .map_err(|e| FetchError::InvalidConfig(e.to_string()))?;

        Ok(Self {
            client,
            url,
            timeout,
            gate: None,
        })
    }

    /// Builds the device URL from an address and a path on the device.
    pub fn for_device(address: &str, csv_path: &str, timeout: Duration) -> Result<Self, FetchError> {
        let url = format!("http://{}/{}", address, csv_path.trim_start_matches('/'));
        Self::new(&url, timeout)
    }

    /// Serializes outbound fetches behind one async mutex.
    pub fn serialized(mut self) -> Self {
        self.gate = Some(Arc::new(Mutex::new(())));
        self
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn get_body(&self) -> Result<String, FetchError> {
        let response = self
            .client
            .get(self.url.clone())
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(FetchError::Status(status.as_u16()));
        }

        response.text().await.map_err(transport_error)
    }
}

impl SnapshotSource for HttpSource {
    fn fetch(&self) -> impl Future<Output = Result<String, FetchError>> + Send {
        async move {
            let _guard = match &self.gate {
                Some(gate) => Some(gate.lock().await),
                None => None,
            };

            debug!(url = %self.url, timeout = ?self.timeout, "fetching snapshot");
            // Dropping the request future on expiry aborts the in-flight call.
            match tokio::time::timeout(self.timeout, self.get_body()).await {
                Ok(result) => result,
                Err(_) => Err(FetchError::Timeout(self.timeout)),
            }
        }
    }

    fn describe(&self) -> String {
        self.url.to_string()
    }
}

fn transport_error(e: reqwest::Error) -> FetchError {
    let mut msg = e.to_string();
    let mut source = std::error::Error::source(&e);
    while let Some(inner) = source {
        msg.push_str(": ");
        msg.push_str(&inner.to_string());
        source = inner.source();
    }
    FetchError::Transport(msg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serves one canned HTTP response per connection.
    async fn serve_once(response: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                let mut buf = [0u8; 1024];
                let _ = stream.read(&mut buf).await;
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            }
        });
        format!("http://{}/etc/mnt_info.csv", addr)
    }

    #[test]
    fn test_new_rejects_zero_timeout() {
        let err = HttpSource::new("http://10.0.0.3/etc/mnt_info.csv", Duration::ZERO).unwrap_err();
        assert!(matches!(err, FetchError::InvalidConfig(_)));
    }

    #[test]
    fn test_new_rejects_malformed_url() {
        let err = HttpSource::new("not a url", Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, FetchError::InvalidConfig(_)));
    }

    #[test]
    fn test_for_device_joins_path() {
        let source =
            HttpSource::for_device("10.0.0.3", "/etc/mnt_info.csv", Duration::from_secs(10)).unwrap();
        assert_eq!(source.url().as_str(), "http://10.0.0.3/etc/mnt_info.csv");
        assert_eq!(source.describe(), "http://10.0.0.3/etc/mnt_info.csv");
    }

    #[tokio::test]
    async fn test_fetch_ok() {
        let url = serve_once(
            "HTTP/1.1 200 OK\r\nContent-Length: 7\r\nConnection: close\r\n\r\nh1\nv1\n\n",
        )
        .await;
        let source = HttpSource::new(&url, Duration::from_secs(5)).unwrap();

        assert_eq!(source.fetch().await.unwrap(), "h1\nv1\n\n");
    }

    #[tokio::test]
    async fn test_fetch_non_ok_status() {
        let url = serve_once(
            "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        )
        .await;
        let source = HttpSource::new(&url, Duration::from_secs(5)).unwrap();

        assert_eq!(source.fetch().await.unwrap_err(), FetchError::Status(404));
    }

    #[tokio::test]
    async fn test_fetch_timeout() {
        // Accepts connections but never answers.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((stream, _)) = listener.accept().await {
                held.push(stream);
            }
        });
        let url = format!("http://{}/etc/mnt_info.csv", addr);
        let source = HttpSource::new(&url, Duration::from_millis(200)).unwrap();

        let err = source.fetch().await.unwrap_err();
        assert_eq!(err, FetchError::Timeout(Duration::from_millis(200)));
    }

    #[tokio::test]
    async fn test_fetch_connection_refused() {
        // Bind then drop to get a port nobody listens on.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let url = format!("http://{}/etc/mnt_info.csv", addr);
        let source = HttpSource::new(&url, Duration::from_secs(5)).unwrap();

        let err = source.fetch().await.unwrap_err();
        assert!(matches!(err, FetchError::Transport(_)), "got {err:?}");
    }

    /// Answers every request after 200ms and returns the highest number of
    /// requests the server held open at once.
    async fn peak_open_requests(serialized: bool) -> usize {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let open = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        {
            let (open, peak) = (open.clone(), peak.clone());
            tokio::spawn(async move {
                while let Ok((mut stream, _)) = listener.accept().await {
                    let (open, peak) = (open.clone(), peak.clone());
                    tokio::spawn(async move {
                        let mut buf = [0u8; 1024];
                        let _ = stream.read(&mut buf).await;
                        let now = open.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(200)).await;
                        // Closed before the client can see the response.
                        open.fetch_sub(1, Ordering::SeqCst);
                        let _ = stream
                            .write_all(
                                b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\nConnection: close\r\n\r\nok",
                            )
                            .await;
                        let _ = stream.shutdown().await;
                    });
                }
            });
        }

        let url = format!("http://{}/etc/mnt_info.csv", addr);
        let mut source = HttpSource::new(&url, Duration::from_secs(5)).unwrap();
        if serialized {
            source = source.serialized();
        }
        let (a, b) = tokio::join!(source.fetch(), source.fetch());
        assert_eq!(a.unwrap(), "ok");
        assert_eq!(b.unwrap(), "ok");

        peak.load(Ordering::SeqCst)
    }

    #[tokio::test]
    async fn test_serialized_device_never_sees_concurrent_requests() {
        assert_eq!(peak_open_requests(true).await, 1);
    }

    #[tokio::test]
    async fn test_unserialized_fetches_overlap() {
        assert_eq!(peak_open_requests(false).await, 2);
    }

    #[tokio::test]
    async fn test_serialized_fetches_complete() {
        let url = serve_once(
            "HTTP/1.1 200 OK\r\nContent-Length: 2\r\nConnection: close\r\n\r\nok",
        )
        .await;
        let source = HttpSource::new(&url, Duration::from_secs(5))
            .unwrap()
            .serialized();

        let (a, b) = tokio::join!(source.fetch(), source.fetch());
        assert_eq!(a.unwrap(), "ok");
        assert_eq!(b.unwrap(), "ok");
    }
}
