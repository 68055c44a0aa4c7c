use crate::{param::*, util::format_http_date};

use brotli::enc::{self, backward_references::BrotliEncoderParams};
use bytes::Bytes;
use chrono::prelude::*;
use flate2::{
    write::{DeflateEncoder, GzEncoder},
    Compression,
};
use log::{debug, error, warn};

use std::io::{self, Write};

/// 最终写回 Socket 的 HTTP 响应报文
#[derive(Debug, Clone)]
pub struct Response {
    version: HttpVersion,
    status_code: u16,
    information: String,
    content_type: Option<String>,
    content_encoding: Option<HttpEncoding>,
    location: Option<String>,
    date: DateTime<Utc>,
    server_name: String,
    content: Bytes,
    head_only: bool,
}

impl Response {
    pub fn new() -> Self {
        Self {
            version: HttpVersion::V1_1,
            status_code: 200,
            information: "OK".to_string(),
            content_type: None,
            content_encoding: None,
            location: None,
            date: Utc::now(),
            server_name: SERVER_NAME.to_string(),
            content: Bytes::new(),
            head_only: false,
        }
    }

    /// 带正文的响应
    pub fn from_content(content: Bytes, status_code: u16, content_type: &str) -> Self {
        let mut response = Self::new();
        response.set_code(status_code);
        response.content_type = Some(content_type.to_string());
        response.content = content;
        response
    }

    /// 纯文本响应，路由与服务器自身产生的错误均使用此形式
    pub fn plain(status_code: u16, text: &'static str) -> Self {
        Self::from_content(Bytes::from_static(text.as_bytes()), status_code, "text/plain")
    }

    /// 303 See Other，正文为空
    pub fn see_other(url: &str) -> Self {
        let mut response = Self::new();
        response.set_code(303);
        response.location = Some(url.to_string());
        response
    }

    fn set_code(&mut self, code: u16) -> &mut Self {
        self.status_code = code;
        self.information = match STATUS_CODES.get(&code) {
            Some(&phrase) => phrase.to_string(),
            None => {
                warn!("未登记的状态码：{}", code);
                "Unknown".to_string()
            }
        };
        self
    }

    /// HEAD 请求只发送报头，`Content-Length` 仍反映正文长度
    pub fn set_head_only(&mut self) -> &mut Self {
        self.head_only = true;
        self
    }

    /// 根据客户端的 `Accept-Encoding` 压缩正文。
    ///
    /// 空正文、已压缩过的正文以及图片、字体、归档等类型保持原样；
    /// 压缩失败时回退为原始正文。
    pub fn compress_for(&mut self, accept_encoding: &[HttpEncoding], id: u128) -> &mut Self {
        if self.content.is_empty() || self.content_encoding.is_some() {
            return self;
        }
        let mime = self.content_type.as_deref().unwrap_or("");
        if should_skip_compression(mime) {
            debug!("[ID{}]文件类型: {}, 跳过压缩", id, mime);
            return self;
        }
        let encoding = match decide_encoding(accept_encoding) {
            Some(e) => e,
            None => return self,
        };
        match compress(self.content.to_vec(), Some(encoding)) {
            Ok(c) => {
                debug!(
                    "[ID{}]使用{}压缩，原始: {} bytes -> 压缩后: {} bytes",
                    id,
                    encoding,
                    self.content.len(),
                    c.len()
                );
                self.content = Bytes::from(c);
                self.content_encoding = Some(encoding);
            }
            Err(e) => {
                error!("[ID{}]压缩失败: {}，返回未压缩内容", id, e);
            }
        }
        self
    }

    pub fn as_bytes(&self) -> Vec<u8> {
        let mut header = format!(
            "{} {} {}{}",
            self.version, self.status_code, self.information, CRLF
        );
        if let Some(t) = &self.content_type {
            header.push_str(&["Content-Type: ", t, CRLF].concat());
        }
        if let Some(e) = self.content_encoding {
            header.push_str(&format!("Content-Encoding: {}{}", e, CRLF));
        }
        if let Some(l) = &self.location {
            header.push_str(&["Location: ", l, CRLF].concat());
        }
        header.push_str(&format!("Content-Length: {}{}", self.content.len(), CRLF));
        header.push_str(&["Date: ", &format_http_date(&self.date), CRLF].concat());
        header.push_str(&["Server: ", &self.server_name, CRLF].concat());
        header.push_str(&["Connection: close", CRLF, CRLF].concat());

        let body: &[u8] = match self.head_only {
            true => b"",
            false => &self.content,
        };
        [header.as_bytes(), body].concat()
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

impl Response {
    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    pub fn information(&self) -> &str {
        &self.information
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    pub fn content(&self) -> &Bytes {
        &self.content
    }
}

/// 交给处理器的响应动作。
///
/// 三个终结方法都按值消费 `self` 并返回 [`Sent`]；处理器必须返回 `Sent`，
/// 因此每次交换恰好产生一个响应。
#[derive(Debug)]
pub struct Responder {
    id: u128,
}

/// 已完成的响应动作，只能由 [`Responder`] 产生
#[derive(Debug)]
#[must_use]
pub struct Sent(Response);

impl Responder {
    pub(crate) fn new(id: u128) -> Self {
        Self { id }
    }

    /// 所属连接的 ID，供处理器打日志
    pub fn id(&self) -> u128 {
        self.id
    }

    /// 以 `200 text/plain` 发送正文
    pub fn send(self, data: impl Into<Bytes>) -> Sent {
        self.send_with(data, 200, "text/plain")
    }

    /// 以指定状态码与 `Content-Type` 发送正文
    pub fn send_with(self, data: impl Into<Bytes>, status_code: u16, content_type: &str) -> Sent {
        let response = Response::from_content(data.into(), status_code, content_type);
        debug!(
            "[ID{}]处理器发送响应: {} {}",
            self.id,
            status_code,
            content_type
        );
        Sent(response)
    }

    /// 303 重定向到 `url`
    pub fn redirect(self, url: &str) -> Sent {
        debug!("[ID{}]处理器重定向到 {}", self.id, url);
        Sent(Response::see_other(url))
    }
}

impl Sent {
    pub fn response(&self) -> &Response {
        &self.0
    }

    pub fn into_response(self) -> Response {
        self.0
    }
}

fn compress(data: Vec<u8>, mode: Option<HttpEncoding>) -> io::Result<Vec<u8>> {
    match mode {
        Some(HttpEncoding::Gzip) => {
            let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(&data)?;
            encoder.finish()
        }
        Some(HttpEncoding::Deflate) => {
            let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(&data)?;
            encoder.finish()
        }
        Some(HttpEncoding::Br) => {
            let params = BrotliEncoderParams::default();
            let mut output = Vec::new();
            enc::BrotliCompress(&mut io::Cursor::new(data), &mut output, &params)?;
            Ok(output)
        }
        None => Ok(data),
    }
}

fn should_skip_compression(mime_type: &str) -> bool {
    let skip_types = [
        "image/",
        "video/",
        "audio/",
        "font/",
        "application/zip",
        "application/gzip",
        "application/x-7z-compressed",
    ];

    skip_types
        .iter()
        .any(|&skip_type| mime_type.starts_with(skip_type))
}

/// 协商顺序：gzip 优先，其次 br，最后 deflate
fn decide_encoding(accept_encoding: &[HttpEncoding]) -> Option<HttpEncoding> {
    [HttpEncoding::Gzip, HttpEncoding::Br, HttpEncoding::Deflate]
        .into_iter()
        .find(|e| accept_encoding.contains(e))
}
