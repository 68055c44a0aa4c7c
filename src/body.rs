//! # 请求报文收集
//!
//! 在调用任何处理器之前，先把请求头与请求体完整地读入内存：
//! - [`read_head`] 逐行读取请求头直到空行。
//! - [`BodyCollector`] 按到达顺序收集请求体分片，结束时拼接为一段连续的 `Bytes`。
//!
//! 请求体大小受 `max_body_size` 约束，超限返回 [`Exception::PayloadTooLarge`]。
//! 这里不设置任何读超时。

use bytes::Bytes;
use log::{debug, warn};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

use crate::{exception::Exception, request::BodyFraming};

/// 请求头的最大字节数
pub const MAX_HEAD_SIZE: usize = 16 * 1024;

/// 单次从流中读取的最大分片
const READ_CHUNK: u64 = 8 * 1024;

/// 读取请求行与全部标头（含结尾空行）。
///
/// 对端在发送任何字节前关闭连接时返回 `Ok(None)`。
pub async fn read_head<R>(reader: &mut R, id: u128) -> Result<Option<Vec<u8>>, Exception>
where
    R: AsyncBufRead + Unpin,
{
    let mut head = Vec::new();
    loop {
        let mut line = Vec::new();
        let n = reader
            .read_until(b'\n', &mut line)
            .await
            .map_err(|_| Exception::MalformedRequest)?;
        if n == 0 {
            if head.is_empty() {
                return Ok(None);
            }
            warn!("[ID{}]请求头尚未结束连接即被关闭", id);
            return Err(Exception::MalformedRequest);
        }
        // RFC 9112 允许请求行之前出现空行
        if head.is_empty() && line == b"\r\n" {
            continue;
        }
        head.extend_from_slice(&line);
        if head.len() > MAX_HEAD_SIZE {
            warn!("[ID{}]请求头超过{}字节", id, MAX_HEAD_SIZE);
            return Err(Exception::MalformedRequest);
        }
        if line == b"\r\n" {
            return Ok(Some(head));
        }
    }
}

/// 请求体收集器
pub struct BodyCollector {
    limit: Option<u64>,
    chunks: Vec<Bytes>,
    received: u64,
}

impl BodyCollector {
    /// `limit` 为 `None` 时不限制请求体大小
    pub fn new(limit: Option<u64>) -> Self {
        Self {
            limit,
            chunks: Vec::new(),
            received: 0,
        }
    }

    fn push(&mut self, chunk: Bytes) -> Result<(), Exception> {
        self.received += chunk.len() as u64;
        if let Some(limit) = self.limit {
            if self.received > limit {
                return Err(Exception::PayloadTooLarge);
            }
        }
        self.chunks.push(chunk);
        Ok(())
    }

    /// 按到达顺序拼接全部分片，没有分片时得到空缓冲
    pub fn finish(self) -> Bytes {
        match self.chunks.len() {
            0 => Bytes::new(),
            1 => self.chunks.into_iter().next().unwrap_or_default(),
            _ => Bytes::from(self.chunks.concat()),
        }
    }

    /// 在读取请求体之前检查声明的 `Content-Length` 是否超限。
    ///
    /// 分块编码的长度事先未知，只能在收集过程中检查。
    pub fn check_declared(&self, framing: BodyFraming, id: u128) -> Result<(), Exception> {
        if let BodyFraming::Length(length) = framing {
            if self.limit.map_or(false, |limit| length > limit) {
                warn!("[ID{}]Content-Length {} 超过上限", id, length);
                return Err(Exception::PayloadTooLarge);
            }
        }
        Ok(())
    }

    /// 按分帧方式读取完整的请求体。
    pub async fn collect<R>(
        mut self,
        reader: &mut R,
        framing: BodyFraming,
        id: u128,
    ) -> Result<Bytes, Exception>
    where
        R: AsyncBufRead + Unpin,
    {
        match framing {
            BodyFraming::Empty => {}
            BodyFraming::Length(length) => {
                self.check_declared(framing, id)?;
                self.read_exact_into(reader, length).await?;
            }
            BodyFraming::Chunked => loop {
                let size = read_chunk_size(reader).await?;
                if size == 0 {
                    skip_trailers(reader).await?;
                    break;
                }
                self.read_exact_into(reader, size).await?;
                let mut crlf = [0u8; 2];
                reader
                    .read_exact(&mut crlf)
                    .await
                    .map_err(|_| Exception::MalformedRequest)?;
                if &crlf != b"\r\n" {
                    return Err(Exception::MalformedRequest);
                }
            },
        }
        debug!(
            "[ID{}]请求体接收完毕，共{}个分片，{}字节",
            id,
            self.chunks.len(),
            self.received
        );
        Ok(self.finish())
    }

    async fn read_exact_into<R>(&mut self, reader: &mut R, length: u64) -> Result<(), Exception>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut remaining = length;
        while remaining > 0 {
            let mut buffer = vec![0u8; remaining.min(READ_CHUNK) as usize];
            reader
                .read_exact(&mut buffer)
                .await
                .map_err(|_| Exception::MalformedRequest)?;
            remaining -= buffer.len() as u64;
            self.push(Bytes::from(buffer))?;
        }
        Ok(())
    }
}

async fn read_crlf_line<R>(reader: &mut R) -> Result<String, Exception>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = Vec::new();
    let n = reader
        .read_until(b'\n', &mut line)
        .await
        .map_err(|_| Exception::MalformedRequest)?;
    if n == 0 || !line.ends_with(b"\r\n") || line.len() > MAX_HEAD_SIZE {
        return Err(Exception::MalformedRequest);
    }
    line.truncate(line.len() - 2);
    String::from_utf8(line).map_err(|_| Exception::MalformedRequest)
}

/// 分片大小行，忽略 `;` 之后的扩展
async fn read_chunk_size<R>(reader: &mut R) -> Result<u64, Exception>
where
    R: AsyncBufRead + Unpin,
{
    let line = read_crlf_line(reader).await?;
    let size = line.split(';').next().unwrap_or("").trim();
    u64::from_str_radix(size, 16).map_err(|_| Exception::MalformedRequest)
}

async fn skip_trailers<R>(reader: &mut R) -> Result<(), Exception>
where
    R: AsyncBufRead + Unpin,
{
    while !read_crlf_line(reader).await?.is_empty() {}
    Ok(())
}
