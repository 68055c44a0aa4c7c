// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 分发路由
//!
//! 按 HTTP 方法把一次交换分发给至多一个已注册的处理器。
//! 路径级别的路由完全交给处理器自己完成。
//!
//! 每次交换的状态转换：
//! `接收请求体 -> 分发 -> (已处理 | 405 | 错误边界) -> 结束`
//!
//! 错误边界覆盖 URL 解码、处理器返回的错误以及处理器任务中的 panic，
//! 三者都会被记录并转化为 `500 Internal server error`。

use std::{collections::HashMap, future::Future, pin::Pin, sync::Arc};

use bytes::Bytes;
use log::{debug, error};

use crate::{
    exception::Exception,
    param::HttpRequestMethod,
    request::RequestContext,
    response::{Responder, Response, Sent},
    url::parse_target,
};

/// 处理器返回的 future
pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<Sent, Exception>> + Send + 'static>>;

/// 绑定到某个 HTTP 方法的处理器。
///
/// 任何 `Fn(RequestContext, Responder) -> impl Future<Output = Result<Sent, Exception>>`
/// 的闭包或函数都自动实现该 trait。
pub trait Handler: Send + Sync + 'static {
    fn call(&self, ctx: RequestContext, res: Responder) -> HandlerFuture;
}

impl<F, Fut> Handler for F
where
    F: Fn(RequestContext, Responder) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Sent, Exception>> + Send + 'static,
{
    fn call(&self, ctx: RequestContext, res: Responder) -> HandlerFuture {
        Box::pin(self(ctx, res))
    }
}

/// 方法到处理器的映射表，启动时构建，随后移交给 `Server`。
#[derive(Default)]
pub struct Router {
    handlers: HashMap<HttpRequestMethod, Arc<dyn Handler>>,
}

impl Router {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// 为 `method` 注册处理器。同一方法再次注册会静默覆盖之前的处理器。
    pub fn on<H: Handler>(&mut self, method: HttpRequestMethod, handler: H) -> &mut Self {
        if self.handlers.insert(method, Arc::new(handler)).is_some() {
            debug!("{}处理器被覆盖", method);
        }
        self
    }

    pub fn get<H: Handler>(&mut self, handler: H) -> &mut Self {
        self.on(HttpRequestMethod::Get, handler)
    }

    pub fn head<H: Handler>(&mut self, handler: H) -> &mut Self {
        self.on(HttpRequestMethod::Head, handler)
    }

    pub fn post<H: Handler>(&mut self, handler: H) -> &mut Self {
        self.on(HttpRequestMethod::Post, handler)
    }

    pub fn put<H: Handler>(&mut self, handler: H) -> &mut Self {
        self.on(HttpRequestMethod::Put, handler)
    }

    pub fn delete<H: Handler>(&mut self, handler: H) -> &mut Self {
        self.on(HttpRequestMethod::Delete, handler)
    }

    pub fn connect<H: Handler>(&mut self, handler: H) -> &mut Self {
        self.on(HttpRequestMethod::Connect, handler)
    }

    pub fn options<H: Handler>(&mut self, handler: H) -> &mut Self {
        self.on(HttpRequestMethod::Options, handler)
    }

    pub fn trace<H: Handler>(&mut self, handler: H) -> &mut Self {
        self.on(HttpRequestMethod::Trace, handler)
    }

    pub fn patch<H: Handler>(&mut self, handler: H) -> &mut Self {
        self.on(HttpRequestMethod::Patch, handler)
    }

    /// 某个方法是否已注册处理器
    pub fn handles(&self, method: HttpRequestMethod) -> bool {
        self.handlers.contains_key(&method)
    }

    /// 分发一次请求体已完整接收的交换。
    ///
    /// 方法名必须与九个标准动词之一完全一致（区分大小写），
    /// 否则与未注册的方法一样返回 405。
    pub async fn dispatch(&self, method: &str, target: &str, body: Bytes, id: u128) -> Response {
        let (path, query) = match parse_target(target) {
            Ok(parsed) => parsed,
            Err(e) => {
                error!("[ID{}]解析请求目标{}失败: {}", id, target, e);
                return internal_error();
            }
        };

        let handler = match HttpRequestMethod::from_token(method)
            .and_then(|m| self.handlers.get(&m))
        {
            Some(handler) => Arc::clone(handler),
            None => {
                debug!("[ID{}]方法{}没有注册处理器，返回405", id, method);
                return Response::plain(405, "Method Not Allowed");
            }
        };

        let ctx = RequestContext { path, query, body };
        // 处理器在独立任务中运行，同步与异步阶段的 panic 都以 JoinError 的形式返回
        let task = tokio::spawn(async move { handler.call(ctx, Responder::new(id)).await });
        match task.await {
            Ok(Ok(sent)) => sent.into_response(),
            Ok(Err(e)) => {
                error!("[ID{}]处理器返回错误: {}", id, e);
                internal_error()
            }
            Err(join_error) => {
                error!(
                    "[ID{}]{}: {}",
                    id,
                    Exception::HandlerPanicked,
                    join_error
                );
                internal_error()
            }
        }
    }
}

fn internal_error() -> Response {
    Response::plain(500, "Internal server error")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    type HandlerResult = Result<Sent, Exception>;

    async fn say_ok(_ctx: RequestContext, res: Responder) -> HandlerResult {
        Ok(res.send("ok"))
    }

    async fn say_first(_ctx: RequestContext, res: Responder) -> HandlerResult {
        Ok(res.send("first"))
    }

    async fn say_second(_ctx: RequestContext, res: Responder) -> HandlerResult {
        Ok(res.send("second"))
    }

    async fn fail(_ctx: RequestContext, _res: Responder) -> HandlerResult {
        Err(Exception::TemplateRenderFailed)
    }

    async fn panic_after_yield(_ctx: RequestContext, _res: Responder) -> HandlerResult {
        tokio::task::yield_now().await;
        panic!("boom after a suspension point");
    }

    fn panic_before_future(_ctx: RequestContext, _res: Responder) -> HandlerFuture {
        panic!("boom before the future exists");
    }

    fn body_text(response: &Response) -> String {
        String::from_utf8_lossy(response.content()).to_string()
    }

    #[tokio::test]
    async fn test_unregistered_methods_get_405() {
        let mut router = Router::new();
        router.get(say_ok);

        for method in HttpRequestMethod::ALL {
            if method == HttpRequestMethod::Get {
                continue;
            }
            let response = router.dispatch(method.as_str(), "/", Bytes::new(), 0).await;
            assert_eq!(response.status_code(), 405, "{}", method);
            assert_eq!(body_text(&response), "Method Not Allowed");
            assert_eq!(response.content_type(), Some("text/plain"));
        }
    }

    #[tokio::test]
    async fn test_unknown_and_lowercase_methods_get_405() {
        let mut router = Router::new();
        router.get(say_ok);

        for method in ["get", "Get", "BREW", ""] {
            let response = router.dispatch(method, "/", Bytes::new(), 0).await;
            assert_eq!(response.status_code(), 405);
        }
    }

    #[tokio::test]
    async fn test_handler_receives_context_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let mut router = Router::new();
        router.post(move |ctx: RequestContext, res: Responder| {
            counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if ctx.path != ["a", "b"]
                    || ctx.query.get("q") != Some(&Some("1 2".to_string()))
                    || &ctx.body[..] != b"payload"
                {
                    return Ok::<Sent, Exception>(res.send_with("wrong context", 400, "text/plain"));
                }
                Ok(res.redirect("/"))
            }
        });

        let response = router
            .dispatch("POST", "/a/../b?q=1%202", Bytes::from("payload"), 0)
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(response.status_code(), 303);
        assert_eq!(response.location(), Some("/"));
    }

    #[tokio::test]
    async fn test_later_registration_overwrites() {
        let mut router = Router::new();
        router.get(say_first);
        router.get(say_second);

        let response = router.dispatch("GET", "/", Bytes::new(), 0).await;
        assert_eq!(body_text(&response), "second");
    }

    #[tokio::test]
    async fn test_handler_error_becomes_500() {
        let mut router = Router::new();
        router.get(fail);

        let response = router.dispatch("GET", "/", Bytes::new(), 0).await;
        assert_eq!(response.status_code(), 500);
        assert_eq!(body_text(&response), "Internal server error");
    }

    #[tokio::test]
    async fn test_synchronous_panic_becomes_500() {
        let mut router = Router::new();
        router.get(panic_before_future);

        let response = router.dispatch("GET", "/", Bytes::new(), 0).await;
        assert_eq!(response.status_code(), 500);
    }

    #[tokio::test]
    async fn test_asynchronous_panic_becomes_500() {
        let mut router = Router::new();
        router.get(panic_after_yield);

        let response = router.dispatch("GET", "/", Bytes::new(), 0).await;
        assert_eq!(response.status_code(), 500);

        // 路由在 panic 之后仍然可用
        let response = router.dispatch("POST", "/", Bytes::new(), 1).await;
        assert_eq!(response.status_code(), 405);
    }

    #[tokio::test]
    async fn test_malformed_query_becomes_500() {
        let mut router = Router::new();
        router.get(say_ok);

        let response = router.dispatch("GET", "/?a=%zz", Bytes::new(), 0).await;
        assert_eq!(response.status_code(), 500);
        assert_eq!(body_text(&response), "Internal server error");
    }

    #[test]
    fn test_handles() {
        let mut router = Router::new();
        router.get(say_ok).patch(say_ok);
        assert!(router.handles(HttpRequestMethod::Get));
        assert!(router.handles(HttpRequestMethod::Patch));
        assert!(!router.handles(HttpRequestMethod::Post));
    }
}
