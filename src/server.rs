//! # 监听与连接处理
//!
//! `Server` 只绑定回环地址，每个 TCP 连接处理一次交换后关闭：
//! 读取请求头 -> 收集请求体 -> 路由分发 -> 写回响应。

use std::{
    future::Future,
    io,
    net::{Ipv4Addr, SocketAddr, SocketAddrV4},
    sync::Arc,
    time::Instant,
};

use log::{debug, error, info, warn};
use tokio::{
    io::{AsyncBufRead, AsyncWrite, AsyncWriteExt, BufReader},
    net::{TcpListener, TcpStream},
};

use crate::{
    body::{read_head, BodyCollector},
    config::Config,
    exception::Exception,
    request::{BodyFraming, Request},
    response::Response,
    router::Router,
};

pub struct Server {
    listener: TcpListener,
    router: Arc<Router>,
    config: Arc<Config>,
}

impl Server {
    /// 在 `127.0.0.1:<port>` 上监听。端口为 0 时由系统分配。
    pub async fn bind(router: Router, config: Config) -> io::Result<Self> {
        let socket = SocketAddrV4::new(Ipv4Addr::LOCALHOST, config.port());
        let listener = TcpListener::bind(socket).await?;
        info!(
            "HTTP server listening on port {}",
            listener.local_addr()?.port()
        );
        Ok(Self {
            listener,
            router: Arc::new(router),
            config: Arc::new(config),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// 持续接收连接，永不返回
    pub async fn run(self) {
        self.run_until(std::future::pending()).await
    }

    /// 接收连接直到 `shutdown` 完成。已经派发的连接任务会继续执行完毕。
    pub async fn run_until<F>(self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut id: u128 = 0;
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("主循环接收到停机指令，正在退出...");
                    break;
                }
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, addr)) => {
                        debug!("[ID{}]新的连接：{}", id, addr);
                        let router = Arc::clone(&self.router);
                        let config = Arc::clone(&self.config);
                        tokio::spawn(handle_connection(stream, id, router, config));
                        id += 1;
                    }
                    Err(e) => {
                        error!("接受连接时遇到错误：{}", e);
                    }
                }
            }
        }
    }
}

/// 处理单个 TCP 连接上的一次交换
pub async fn handle_connection(
    stream: TcpStream,
    id: u128,
    router: Arc<Router>,
    config: Arc<Config>,
) {
    let start_time = Instant::now();
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    let response = match exchange(&mut reader, &mut write_half, id, &router, &config).await {
        Ok(Some(response)) => response,
        Ok(None) => {
            debug!("[ID{}]客户端未发送请求即关闭连接", id);
            return;
        }
        Err(e) => {
            warn!("[ID{}]请求无法分发：{}，返回{}", id, e, e.status_code());
            error_response(e)
        }
    };

    debug!(
        "[ID{}]HTTP响应构建完成，服务端用时{}ms。",
        id,
        start_time.elapsed().as_millis()
    );

    let response_bytes = response.as_bytes();
    if let Err(e) = write_half.write_all(&response_bytes).await {
        error!("[ID{}]发送响应失败: {}", id, e);
        return;
    }
    let _ = write_half.flush().await;
    let _ = write_half.shutdown().await;
}

/// 读取、分发一次交换并返回要写回的响应。
///
/// 对端在发送任何数据前关闭连接时返回 `Ok(None)`。
async fn exchange<R, W>(
    reader: &mut R,
    writer: &mut W,
    id: u128,
    router: &Router,
    config: &Config,
) -> Result<Option<Response>, Exception>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let head = match read_head(reader, id).await? {
        Some(head) => head,
        None => return Ok(None),
    };
    let request = Request::try_from(&head, id)?;
    debug!("[ID{}]成功解析HTTP请求头", id);

    let framing = request.body_framing()?;
    let collector = BodyCollector::new(config.max_body_size());
    collector.check_declared(framing, id)?;
    if framing != BodyFraming::Empty && expects_continue(&request) {
        if let Err(e) = writer.write_all(b"HTTP/1.1 100 Continue\r\n\r\n").await {
            warn!("[ID{}]发送100 Continue失败: {}", id, e);
        }
    }
    let body = collector.collect(reader, framing, id).await?;

    let mut response = router
        .dispatch(request.method(), request.target(), body, id)
        .await;
    if request.method() == "HEAD" {
        response.set_head_only();
    }
    if config.compression() {
        response.compress_for(&request.accept_encoding(), id);
    }

    info!(
        "[ID{}] {}, {}, {}, {}, {}, {}",
        id,
        request.version(),
        request.target(),
        request.method(),
        response.status_code(),
        response.information(),
        request.user_agent(),
    );
    Ok(Some(response))
}

fn expects_continue(request: &Request) -> bool {
    request
        .header("expect")
        .map_or(false, |v| v.eq_ignore_ascii_case("100-continue"))
}

/// 分发前的报文错误对应的纯文本响应
fn error_response(e: Exception) -> Response {
    match e.status_code() {
        413 => Response::plain(413, "Payload Too Large"),
        505 => Response::plain(505, "HTTP Version Not Supported"),
        400 => Response::plain(400, "Bad Request"),
        _ => Response::plain(500, "Internal server error"),
    }
}
