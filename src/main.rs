// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # mooder
//!
//! 一个只在本机回环地址上运行的心情日志服务：
//! - `GET /` 渲染历史心情记录页面
//! - `POST /<1-10>` 追加一条心情记录
//! - 其余 `GET` 请求从 `www_root` 提供静态资源
//!
//! 启动流程：初始化日志 -> 读取配置 -> 构建运行时 -> 注册处理器 -> 监听 -> (可选) 打开浏览器。

use std::{process::Command, sync::Arc};

use log::{error, info, warn, LevelFilter};
use log4rs::{
    append::console::ConsoleAppender,
    config::{Appender, Root},
};
use tokio::runtime::Builder;

use mooder::{Config, MoodApp, Router, Server};

const DEFAULT_CONFIG: &str = "config/development.toml";
const LOG_CONFIG: &str = "config/log4rs.yaml";

fn main() {
    // 1. 初始化日志系统：优先使用 YAML 配置，失败时退化为仅控制台输出
    init_logging();

    // 2. 读取配置，第一个命令行参数可以覆盖配置文件路径
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG.to_string());
    let config = Config::from_toml(&config_path);
    info!("配置文件已载入：{}", config_path);

    // 3. 根据配置分配工作线程数
    let runtime = match Builder::new_multi_thread()
        .worker_threads(config.worker_threads())
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            error!("无法构建异步运行时：{}", e);
            std::process::exit(1);
        }
    };

    runtime.block_on(serve(config));
}

async fn serve(config: Config) {
    let app = Arc::new(MoodApp::new(&config));
    if let Err(e) = app.prepare().await {
        error!("无法创建心情数据文件{}：{}", config.mood_file(), e);
    }

    let mut router = Router::new();
    app.register(&mut router);

    let port = config.port();
    let open_browser = config.open_browser();
    let server = match Server::bind(router, config).await {
        Ok(server) => server,
        Err(e) => {
            error!("无法绑定端口：{}，错误：{}", port, e);
            return;
        }
    };

    if open_browser {
        match server.local_addr() {
            Ok(addr) => open_in_browser(&format!("http://localhost:{}", addr.port())),
            Err(e) => warn!("无法获取监听地址：{}", e),
        }
    }

    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("无法监听Ctrl-C信号：{}", e);
                std::future::pending::<()>().await;
            }
        })
        .await;
}

fn init_logging() {
    if let Err(e) = log4rs::init_file(LOG_CONFIG, Default::default()) {
        eprintln!("无法载入日志配置{}：{}，仅输出到控制台", LOG_CONFIG, e);
        let stdout = ConsoleAppender::builder().build();
        let fallback = log4rs::Config::builder()
            .appender(Appender::builder().build("stdout", Box::new(stdout)))
            .build(Root::builder().appender("stdout").build(LevelFilter::Info));
        match fallback {
            Ok(cfg) => {
                let _ = log4rs::init_config(cfg);
            }
            Err(e) => eprintln!("日志系统初始化失败：{}", e),
        }
    }
}

/// 用系统默认浏览器打开页面
fn open_in_browser(url: &str) {
    let mut command = if cfg!(target_os = "macos") {
        Command::new("open")
    } else if cfg!(target_os = "windows") {
        let mut c = Command::new("cmd");
        c.args(["/C", "start"]);
        c
    } else {
        Command::new("xdg-open")
    };
    match command.arg(url).spawn() {
        Ok(_) => info!("已在浏览器中打开{}", url),
        Err(e) => warn!("无法打开浏览器：{}", e),
    }
}
