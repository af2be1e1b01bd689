#![allow(dead_code)]

pub mod test_server {
    use std::net::{SocketAddr, TcpListener};
    use std::sync::{Arc, Once};
    use tokengate::server::{GatewayService, HttpServer, ServerHandle};
    use tokengate::TokenValidationGateway;

    /// Ensures May coroutines are configured only once
    static MAY_INIT: Once = Once::new();

    pub fn setup_may_runtime() {
        MAY_INIT.call_once(|| {
            may::config().set_stack_size(0x8000);
        });
    }

    /// Stops the server when dropped so a failing assertion does not leak it
    pub struct GatewayTestServer {
        handle: Option<ServerHandle>,
        addr: SocketAddr,
        pub gateway: Arc<TokenValidationGateway>,
    }

    impl GatewayTestServer {
        pub fn start(gateway: TokenValidationGateway) -> Self {
            setup_may_runtime();
            let gateway = Arc::new(gateway);
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            let addr = listener.local_addr().unwrap();
            drop(listener);
            let handle = HttpServer(GatewayService::new(Arc::clone(&gateway)))
                .start(addr)
                .unwrap();
            handle.wait_ready().unwrap();
            Self {
                handle: Some(handle),
                addr,
                gateway,
            }
        }

        pub fn addr(&self) -> SocketAddr {
            self.addr
        }
    }

    impl Drop for GatewayTestServer {
        fn drop(&mut self) {
            if let Some(handle) = self.handle.take() {
                handle.stop();
            }
        }
    }
}

pub mod mock_idp {
    use std::io::{Read, Write};
    use std::net::{TcpListener, TcpStream};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::thread;
    use std::time::Duration;

    /// A one-route HTTP server standing in for the identity provider.
    ///
    /// Every request gets the same canned response; requests are counted and
    /// the last body is kept for inspection.
    pub struct MockEndpoint {
        pub url: String,
        hits: Arc<AtomicUsize>,
        last_body: Arc<Mutex<Option<String>>>,
    }

    impl MockEndpoint {
        pub fn start(path: &str, status: u16, body: &str, delay: Duration) -> Self {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            let addr = listener.local_addr().unwrap();
            let url = format!("http://127.0.0.1:{}{}", addr.port(), path);
            let hits = Arc::new(AtomicUsize::new(0));
            let last_body = Arc::new(Mutex::new(None));

            let body = body.to_string();
            let (hits_c, last_c) = (Arc::clone(&hits), Arc::clone(&last_body));
            thread::spawn(move || {
                for stream in listener.incoming() {
                    let Ok(stream) = stream else { break };
                    let body = body.clone();
                    let (hits, last) = (Arc::clone(&hits_c), Arc::clone(&last_c));
                    thread::spawn(move || serve_one(stream, status, &body, delay, &hits, &last));
                }
            });

            Self {
                url,
                hits,
                last_body,
            }
        }

        /// Introspection endpoint answering 200 with `body`
        pub fn introspection(body: &str) -> Self {
            Self::start("/oauth2/default/v1/introspect", 200, body, Duration::ZERO)
        }

        /// Key-set endpoint answering 200 with `body`
        pub fn key_set(body: &str) -> Self {
            Self::start("/oauth2/default/v1/keys", 200, body, Duration::ZERO)
        }

        pub fn hits(&self) -> usize {
            self.hits.load(Ordering::SeqCst)
        }

        pub fn last_body(&self) -> Option<String> {
            self.last_body.lock().unwrap().clone()
        }
    }

    fn serve_one(
        mut stream: TcpStream,
        status: u16,
        body: &str,
        delay: Duration,
        hits: &AtomicUsize,
        last_body: &Mutex<Option<String>>,
    ) {
        let request = read_request(&mut stream);
        hits.fetch_add(1, Ordering::SeqCst);
        *last_body.lock().unwrap() = Some(request);
        if !delay.is_zero() {
            thread::sleep(delay);
        }
        let resp = format!(
            "HTTP/1.1 {status} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        let _ = stream.write_all(resp.as_bytes());
    }

    // Reads headers and a Content-Length body; returns the body.
    fn read_request(stream: &mut TcpStream) -> String {
        let _ = stream.set_read_timeout(Some(Duration::from_millis(1000)));
        let mut buf = Vec::new();
        let mut tmp = [0u8; 2048];
        let header_end = loop {
            match stream.read(&mut tmp) {
                Ok(0) | Err(_) => return String::new(),
                Ok(n) => buf.extend_from_slice(&tmp[..n]),
            }
            if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
        };
        let headers = String::from_utf8_lossy(&buf[..header_end]).to_string();
        let content_length = headers
            .lines()
            .filter_map(|l| l.split_once(':'))
            .find(|(n, _)| n.eq_ignore_ascii_case("content-length"))
            .and_then(|(_, v)| v.trim().parse::<usize>().ok())
            .unwrap_or(0);
        while buf.len() - header_end < content_length {
            match stream.read(&mut tmp) {
                Ok(0) | Err(_) => break,
                Ok(n) => buf.extend_from_slice(&tmp[..n]),
            }
        }
        String::from_utf8_lossy(&buf[header_end..]).to_string()
    }
}

pub mod http {
    use std::io::{Read, Write};
    use std::net::{SocketAddr, TcpStream};
    use std::time::Duration;

    pub fn send_request(addr: &SocketAddr, req: &str) -> String {
        let mut stream = TcpStream::connect(addr).unwrap();
        stream.write_all(req.as_bytes()).unwrap();
        let timeout_ms: u64 = if std::env::var("ACT").is_ok() {
            1500
        } else {
            500
        };
        stream
            .set_read_timeout(Some(Duration::from_millis(timeout_ms)))
            .unwrap();

        let mut buf = Vec::new();
        let mut header_end = None;
        for _ in 0..60 {
            let mut tmp = [0u8; 2048];
            match stream.read(&mut tmp) {
                Ok(0) => break,
                Ok(n) => {
                    buf.extend_from_slice(&tmp[..n]);
                    if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                        header_end = Some(pos + 4);
                        break;
                    }
                }
                Err(ref e)
                    if e.kind() == std::io::ErrorKind::WouldBlock
                        || e.kind() == std::io::ErrorKind::TimedOut =>
                {
                    std::thread::sleep(Duration::from_millis(50));
                }
                Err(e) => panic!("read error: {:?}", e),
            }
        }

        let header_end = header_end.unwrap_or(buf.len());
        let content_length = header_value(&String::from_utf8_lossy(&buf[..header_end]), "content-length")
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(0);
        while buf.len() - header_end < content_length {
            let mut tmp = [0u8; 2048];
            match stream.read(&mut tmp) {
                Ok(0) => break,
                Ok(n) => buf.extend_from_slice(&tmp[..n]),
                Err(ref e)
                    if e.kind() == std::io::ErrorKind::WouldBlock
                        || e.kind() == std::io::ErrorKind::TimedOut =>
                {
                    std::thread::sleep(Duration::from_millis(50));
                }
                Err(e) => panic!("read error: {:?}", e),
            }
        }
        String::from_utf8_lossy(&buf).to_string()
    }

    /// `POST /validate` with an optional `Authorization` header
    pub fn validate(addr: &SocketAddr, authorization: Option<&str>) -> String {
        let auth = authorization
            .map(|a| format!("Authorization: {a}\r\n"))
            .unwrap_or_default();
        send_request(
            addr,
            &format!("POST /validate HTTP/1.1\r\nHost: localhost\r\n{auth}Content-Length: 0\r\n\r\n"),
        )
    }

    pub fn parse_status(resp: &str) -> u16 {
        resp.lines()
            .next()
            .and_then(|l| l.split_whitespace().nth(1))
            .and_then(|s| s.parse().ok())
            .unwrap_or(0)
    }

    pub fn header_value(resp: &str, name: &str) -> Option<String> {
        resp.split("\r\n\r\n")
            .next()?
            .lines()
            .skip(1)
            .filter_map(|l| l.split_once(':'))
            .find(|(n, _)| n.trim().eq_ignore_ascii_case(name))
            .map(|(_, v)| v.trim().to_string())
    }

    pub fn body(resp: &str) -> &str {
        resp.split_once("\r\n\r\n").map_or("", |(_, b)| b)
    }
}

pub mod tokens {
    use jsonwebtoken::{Algorithm, EncodingKey, Header};
    use serde_json::Value;

    /// Opaque token matching the request gate's character class
    pub fn opaque(len: usize) -> String {
        "aB3-_.".chars().cycle().take(len).collect()
    }

    pub fn now() -> i64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_secs() as i64
    }

    pub fn make_hs256_jwt(secret: &[u8], kid: &str, claims: &Value) -> String {
        let header = Header {
            kid: Some(kid.to_string()),
            alg: Algorithm::HS256,
            ..Default::default()
        };
        jsonwebtoken::encode(&header, claims, &EncodingKey::from_secret(secret)).unwrap()
    }

    pub fn oct_key_set(secret: &[u8], kid: &str) -> String {
        use base64::Engine as _;
        let k = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(secret);
        format!(r#"{{"keys":[{{"kty":"oct","kid":"{kid}","alg":"HS256","use":"sig","k":"{k}"}}]}}"#)
    }
}
