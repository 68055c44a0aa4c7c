// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # Exception 模块
//!
//! 该模块定义了服务器在一次交换（Exchange）的生命周期中可能出现的各类异常。
//!
//! ## 设计意图
//! - **错误分类**：涵盖协议帧解析错误、URL 解码错误、文件系统错误以及处理器内部故障。
//! - **语义映射**：每个变体都对应一个确定的 HTTP 状态码，见 [`Exception::status_code`]。
//! - **统一边界**：处理器通过 `?` 传播的错误最终都由路由的错误边界转化为 500 响应。

use std::fmt;

/// 服务器处理请求过程中发生的异常类型。
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Exception {
    /// 请求头无法解析为合法的 UTF-8 字符串。
    RequestIsNotUtf8,
    /// 请求行或请求头不符合 HTTP/1.x 报文格式，或连接在报文完整前被关闭。
    MalformedRequest,
    /// 客户端使用了服务器不支持的 HTTP 协议版本。
    UnsupportedHttpVersion,
    /// 请求体超过了配置的 `max_body_size`。对应 `413`。
    PayloadTooLarge,
    /// 查询字符串中存在非法的百分号转义，或解码结果不是合法的 UTF-8。
    MalformedPercentEncoding,
    /// 请求的静态文件不存在或无法读取。对应 `404 Not Found`。
    FileNotFound,
    /// 心情数据文件无法读取或追加。
    MoodFileUnavailable,
    /// 页面模板文件无法读取。
    TemplateUnavailable,
    /// 模板编译或渲染失败。
    TemplateRenderFailed,
    /// 处理器任务在执行过程中 panic。
    HandlerPanicked,
}

use Exception::*;

impl Exception {
    /// 该异常在未被处理器显式处理时对应的 HTTP 状态码。
    pub fn status_code(&self) -> u16 {
        match self {
            RequestIsNotUtf8 | MalformedRequest => 400,
            UnsupportedHttpVersion => 505,
            PayloadTooLarge => 413,
            FileNotFound => 404,
            MalformedPercentEncoding
            | MoodFileUnavailable
            | TemplateUnavailable
            | TemplateRenderFailed
            | HandlerPanicked => 500,
        }
    }
}

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestIsNotUtf8 => write!(f, "Request bytes can't be parsed in UTF-8"),
            MalformedRequest => write!(f, "Malformed HTTP request"),
            UnsupportedHttpVersion => write!(f, "Unsupported HTTP version"),
            PayloadTooLarge => write!(f, "Request body exceeds the configured limit (413)"),
            MalformedPercentEncoding => write!(f, "URI malformed"),
            FileNotFound => write!(f, "File not found (404)"),
            MoodFileUnavailable => write!(f, "Mood file can't be read or written"),
            TemplateUnavailable => write!(f, "Template file can't be read"),
            TemplateRenderFailed => write!(f, "Template rendering failed"),
            HandlerPanicked => write!(f, "Handler panicked"),
        }
    }
}

impl std::error::Error for Exception {}
