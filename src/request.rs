// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # HTTP 请求处理模块
//!
//! 负责将从 TCP 流中读取的请求头字节解析为强类型的 [`Request`]，
//! 并定义交给处理器的 [`RequestContext`]。涵盖：
//! 1. 请求行（Request-Line）的解析（方法、目标、版本）。
//! 2. HTTP 标头（Headers）的提取，字段名大小写不敏感。
//! 3. 请求体帧信息（`Content-Length` / `Transfer-Encoding`）。
//! 4. 内容协商相关的编码解析。

use bytes::Bytes;
use log::error;

use crate::{exception::Exception, param::*, url::Query};

/// 一次交换的请求头元数据，不包含请求体。
#[derive(Debug, Clone)]
pub struct Request {
    /// 请求行中的原始方法名，不做大小写归一化
    method: String,
    /// 原始请求目标（包含查询字符串）
    target: String,
    /// HTTP 协议版本
    version: HttpVersion,
    /// 按出现顺序保存的标头，字段名已转为小写
    headers: Vec<(String, String)>,
}

/// 交给处理器的请求上下文，每次交换一份。
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// 非空路径段，不含 `..`
    pub path: Vec<String>,
    /// 已解码的查询参数
    pub query: Query,
    /// 完整缓冲后的请求体，未发送时为空
    pub body: Bytes,
}

/// 请求体的分帧方式
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BodyFraming {
    /// 没有请求体
    Empty,
    /// 由 `Content-Length` 给出的定长请求体
    Length(u64),
    /// `Transfer-Encoding: chunked`
    Chunked,
}

impl Request {
    /// 从请求头字节（到空行为止）构建 `Request`。
    ///
    /// # 参数
    /// * `buffer` - 请求行与全部标头，可以包含结尾的空行。
    /// * `id` - 连接 ID，用于日志追踪。
    pub fn try_from(buffer: &[u8], id: u128) -> Result<Self, Exception> {
        let request_string = match std::str::from_utf8(buffer) {
            Ok(string) => string,
            Err(_) => {
                error!("[ID{}]请求头不是合法的UTF-8", id);
                return Err(Exception::RequestIsNotUtf8);
            }
        };

        let mut lines = request_string.split(CRLF);

        // 请求行 (e.g., "GET /index.html HTTP/1.1")
        let request_line = lines.next().unwrap_or("");
        let parts: Vec<&str> = request_line.split(' ').collect();
        if parts.len() != 3 || parts.iter().any(|p| p.is_empty()) {
            error!("[ID{}]HTTP请求行格式不正确：{}", id, request_line);
            return Err(Exception::MalformedRequest);
        }

        let version = match HttpVersion::from_token(parts[2]) {
            Some(v) => v,
            None => {
                error!("[ID{}]不支持的HTTP协议版本：{}", id, parts[2]);
                return Err(Exception::UnsupportedHttpVersion);
            }
        };

        let mut headers = vec![];
        for line in lines {
            if line.is_empty() {
                break;
            }
            match line.split_once(':') {
                Some((name, value)) if !name.is_empty() && !name.contains(' ') => {
                    headers.push((name.to_ascii_lowercase(), value.trim().to_string()));
                }
                _ => {
                    error!("[ID{}]无法解析的请求头：{}", id, line);
                    return Err(Exception::MalformedRequest);
                }
            }
        }

        Ok(Self {
            method: parts[0].to_string(),
            target: parts[1].to_string(),
            version,
            headers,
        })
    }
}

impl Request {
    /// 原始方法名
    pub fn method(&self) -> &str {
        &self.method
    }

    /// 原始请求目标（含查询参数）
    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn version(&self) -> HttpVersion {
        self.version
    }

    /// 查找标头，字段名大小写不敏感。重复字段取第一个。
    pub fn header(&self, name: &str) -> Option<&str> {
        let name = name.to_ascii_lowercase();
        self.headers
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn user_agent(&self) -> &str {
        self.header("user-agent").unwrap_or("")
    }

    /// 根据标头决定请求体的分帧方式。
    ///
    /// `Transfer-Encoding: chunked` 优先于 `Content-Length`；
    /// 非数字的 `Content-Length` 视为报文格式错误。
    pub fn body_framing(&self) -> Result<BodyFraming, Exception> {
        if let Some(te) = self.header("transfer-encoding") {
            if te.to_ascii_lowercase().contains("chunked") {
                return Ok(BodyFraming::Chunked);
            }
        }
        match self.header("content-length") {
            Some(len) => match len.parse::<u64>() {
                Ok(0) => Ok(BodyFraming::Empty),
                Ok(n) => Ok(BodyFraming::Length(n)),
                Err(_) => Err(Exception::MalformedRequest),
            },
            None => Ok(BodyFraming::Empty),
        }
    }

    /// 客户端支持的压缩算法列表，只要包含关键词即视为支持
    pub fn accept_encoding(&self) -> Vec<HttpEncoding> {
        let mut accept_encoding = vec![];
        if let Some(encoding) = self.header("accept-encoding") {
            if encoding.contains("gzip") {
                accept_encoding.push(HttpEncoding::Gzip);
            }
            if encoding.contains("deflate") {
                accept_encoding.push(HttpEncoding::Deflate);
            }
            if encoding.contains("br") {
                accept_encoding.push(HttpEncoding::Br);
            }
        }
        accept_encoding
    }
}
