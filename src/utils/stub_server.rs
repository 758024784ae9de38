//! 测试用本地 HTTP 应答器：按路径前缀返回预设响应，未匹配返回 404

use std::net::SocketAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// 单条预设响应
#[derive(Debug, Clone)]
pub struct StubRoute {
    prefix: &'static str,
    status: u16,
    headers: Vec<(&'static str, String)>,
    body: String,
}

impl StubRoute {
    pub fn new(prefix: &'static str, status: u16, body: impl Into<String>) -> Self {
        Self {
            prefix,
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }
}

/// 启动应答器，返回监听地址；路由按声明顺序匹配
pub async fn serve(routes: Vec<StubRoute>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let routes = routes.clone();
            tokio::spawn(respond(stream, routes));
        }
    });
    addr
}

async fn respond(mut stream: TcpStream, routes: Vec<StubRoute>) {
    let mut request = Vec::new();
    let mut chunk = [0u8; 1024];
    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
        match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => request.extend_from_slice(&chunk[..n]),
        }
    }

    let request = String::from_utf8_lossy(&request);
    let path = request.split_whitespace().nth(1).unwrap_or("/");
    let route = routes
        .iter()
        .find(|route| path.starts_with(route.prefix))
        .cloned()
        .unwrap_or_else(|| StubRoute::new("/", 404, ""));

    let mut response = format!(
        "HTTP/1.1 {} {}\r\nContent-Length: {}\r\nConnection: close\r\n",
        route.status,
        if route.status < 400 { "OK" } else { "Error" },
        route.body.len()
    );
    for (name, value) in &route.headers {
        response.push_str(&format!("{}: {}\r\n", name, value));
    }
    response.push_str("\r\n");
    response.push_str(&route.body);

    let _ = stream.write_all(response.as_bytes()).await;
    let _ = stream.shutdown().await;
}
