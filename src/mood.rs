// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 心情日志应用
//!
//! 注册在路由上的两个处理器：
//! - `GET /`：读取心情数据文件与页面模板，渲染历史记录页面。
//! - `GET /<path>`：从 `www_root` 提供静态资源，带 LRU 缓存。
//! - `POST /<mood>`：校验 1~10 的评分，追加一行 `<mood>,<ISO 时间戳>` 后 303 跳回首页。
//!
//! 数据文件为纯文本，每行两个逗号分隔的字段，没有表头。并发追加不做任何同步。

use std::{
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use chrono::{
    DateTime, Datelike, Local, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc,
};
use lazy_static::lazy_static;
use log::{debug, error, info, warn};
use regex::Regex;
use serde_derive::Serialize;
use tokio::{fs, io::AsyncWriteExt};

use crate::{
    cache::{StaticCache, MAX_CACHED_FILE},
    config::Config,
    exception::Exception,
    param::MOODS,
    request::RequestContext,
    response::{Responder, Sent},
    router::Router,
    util::content_type,
};

/// 页面上显示日期的格式，对应 `MMMM Do, h:mm a`
const DISPLAY_FORMAT: &str = "%B {}, %-I:%M %P";

lazy_static! {
    /// 与 JavaScript `parseInt` 相同的前缀规则：前导空白、可选符号、十六进制或十进制数字
    static ref MOOD_PREFIX: Regex =
        Regex::new(r"^\s*([+-]?)(?:0[xX]([0-9a-fA-F]+)|([0-9]+))").unwrap();
}

/// 模板中的一条心情记录
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MoodEntry {
    pub mood: String,
    pub date: String,
    #[serde(rename = "displayDate")]
    pub display_date: String,
}

/// 模板渲染上下文
#[derive(Debug, Serialize)]
pub struct PageContext {
    #[serde(rename = "moodData")]
    pub mood_data: Vec<MoodEntry>,
    pub moods: Vec<u8>,
}

pub struct MoodApp {
    mood_file: PathBuf,
    template: PathBuf,
    www_root: PathBuf,
    cache: Mutex<StaticCache>,
}

impl MoodApp {
    pub fn new(config: &Config) -> Self {
        Self {
            mood_file: PathBuf::from(config.mood_file()),
            template: PathBuf::from(config.template()),
            www_root: PathBuf::from(config.www_root()),
            cache: Mutex::new(StaticCache::new(config.cache_size(), MAX_CACHED_FILE)),
        }
    }

    /// 在路由上注册 GET 与 POST 处理器
    pub fn register(self: Arc<Self>, router: &mut Router) {
        let app = Arc::clone(&self);
        router.get(move |ctx: RequestContext, res: Responder| {
            let app = Arc::clone(&app);
            async move { app.handle_get(ctx, res).await }
        });
        let app = self;
        router.post(move |ctx: RequestContext, res: Responder| {
            let app = Arc::clone(&app);
            async move { app.handle_post(ctx, res).await }
        });
    }

    /// 确保数据文件及其目录存在
    pub async fn prepare(&self) -> std::io::Result<()> {
        if let Some(parent) = self.mood_file.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.mood_file)
            .await?;
        info!("心情数据文件：{}", self.mood_file.display());
        Ok(())
    }

    pub async fn handle_get(&self, ctx: RequestContext, res: Responder) -> Result<Sent, Exception> {
        if ctx.path.is_empty() {
            self.render_page(res).await
        } else {
            self.serve_static(&ctx.path, res).await
        }
    }

    pub async fn handle_post(
        &self,
        ctx: RequestContext,
        res: Responder,
    ) -> Result<Sent, Exception> {
        let id = res.id();
        let mood = match ctx.path.as_slice() {
            [segment] => parse_mood(segment),
            _ => None,
        };
        let mood = match mood {
            Some(m) => m,
            None => {
                warn!("[ID{}]非法的心情评分：{:?}", id, ctx.path);
                return Ok(res.send_with(
                    "Bad Request -- Invalid mood specified",
                    400,
                    "text/plain",
                ));
            }
        };

        let line = format!(
            "\n{},{}",
            mood,
            Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
        );
        if let Err(e) = append_line(&self.mood_file, &line).await {
            error!(
                "[ID{}]{}：{}，{}",
                id,
                Exception::MoodFileUnavailable,
                self.mood_file.display(),
                e
            );
            return Ok(res.send_with(
                "Internal Server Error -- could not edit moodfile",
                500,
                "text/plain",
            ));
        }
        info!("[ID{}]记录心情：{}", id, mood);
        Ok(res.redirect("/"))
    }

    async fn render_page(&self, res: Responder) -> Result<Sent, Exception> {
        let id = res.id();
        let data = match fs::read(&self.mood_file).await {
            Ok(d) => d,
            Err(e) => {
                error!(
                    "[ID{}]{}：{}，{}",
                    id,
                    Exception::MoodFileUnavailable,
                    self.mood_file.display(),
                    e
                );
                return Ok(res.send_with(
                    "Internal Server Error -- could not open moodfile",
                    500,
                    "text/plain",
                ));
            }
        };
        let mood_data = parse_moods(&String::from_utf8_lossy(&data), &Local);
        debug!("[ID{}]读取到{}条心情记录", id, mood_data.len());

        let template = match fs::read(&self.template).await {
            Ok(t) => t,
            Err(e) => {
                error!(
                    "[ID{}]{}：{}，{}",
                    id,
                    Exception::TemplateUnavailable,
                    self.template.display(),
                    e
                );
                return Ok(res.send_with(
                    "Internal Server Error -- could not open template file",
                    500,
                    "text/plain",
                ));
            }
        };

        let context = PageContext {
            mood_data,
            moods: MOODS.to_vec(),
        };
        let page = render_template(&String::from_utf8_lossy(&template), &context)?;
        Ok(res.send_with(page, 200, "text/html"))
    }

    async fn serve_static(&self, path: &[String], res: Responder) -> Result<Sent, Exception> {
        let id = res.id();
        let filepath = path.join("/");
        match self.read_static(&filepath).await {
            Ok(bytes) => Ok(res.send_with(bytes, 200, content_type(&filepath))),
            Err(e) => {
                warn!("[ID{}]请求的路径：{} 不存在，返回404：{}", id, filepath, e);
                Ok(res.send_with("Not found", 404, "text/plain"))
            }
        }
    }

    async fn read_static(&self, filepath: &str) -> Result<bytes::Bytes, Exception> {
        let full_path = self.www_root.join(filepath);
        let metadata = fs::metadata(&full_path)
            .await
            .map_err(|_| Exception::FileNotFound)?;
        if !metadata.is_file() {
            return Err(Exception::FileNotFound);
        }
        let modified = metadata.modified().ok();

        let cached = modified.and_then(|m| self.lock_cache().get(filepath, m));
        if let Some(bytes) = cached {
            debug!("缓存命中：{}", filepath);
            return Ok(bytes);
        }

        let bytes = bytes::Bytes::from(
            fs::read(&full_path)
                .await
                .map_err(|_| Exception::FileNotFound)?,
        );
        if let Some(modified) = modified {
            self.lock_cache().insert(filepath, bytes.clone(), modified);
        }
        Ok(bytes)
    }

    fn lock_cache(&self) -> std::sync::MutexGuard<'_, StaticCache> {
        match self.cache.lock() {
            Ok(lock) => lock,
            Err(poisoned) => {
                warn!("缓存锁被污染，恢复并继续");
                poisoned.into_inner()
            }
        }
    }
}

async fn append_line(path: &Path, line: &str) -> std::io::Result<()> {
    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(line.as_bytes()).await?;
    file.flush().await
}

/// 按 `parseInt` 的规则解析评分，结果必须落在 [`MOODS`] 中
pub fn parse_mood(segment: &str) -> Option<u8> {
    let caps = MOOD_PREFIX.captures(segment)?;
    let negative = caps.get(1).map_or(false, |s| s.as_str() == "-");
    let value = match (caps.get(2), caps.get(3)) {
        (Some(hex), _) => i64::from_str_radix(hex.as_str(), 16).ok()?,
        (_, Some(dec)) => dec.as_str().parse::<i64>().ok()?,
        _ => return None,
    };
    let value = if negative { -value } else { value };
    MOODS.iter().copied().find(|m| i64::from(*m) == value)
}

/// 解析数据文件内容：按行切分、跳过空行、按逗号切分并去除首尾空白
pub fn parse_moods<Tz: TimeZone>(text: &str, tz: &Tz) -> Vec<MoodEntry>
where
    Tz::Offset: std::fmt::Display,
{
    text.split('\n')
        .filter(|line| !line.is_empty())
        .map(|line| {
            let mut fields = line.split(',').map(str::trim);
            let mood = fields.next().unwrap_or("").to_string();
            let date = fields.next().unwrap_or("").to_string();
            let display_date = display_date(&date, tz);
            MoodEntry {
                mood,
                date,
                display_date,
            }
        })
        .collect()
}

/// 把 ISO-8601 时间戳格式化为 `January 1st, 12:00 am` 形式，无法解析时为 `Invalid date`
pub fn display_date<Tz: TimeZone>(date: &str, tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    match parse_iso(date, tz) {
        Some(datetime) => {
            let day = format!("{}{}", datetime.day(), ordinal_suffix(datetime.day()));
            datetime
                .format(&DISPLAY_FORMAT.replace("{}", &day))
                .to_string()
        }
        None => "Invalid date".to_string(),
    }
}

/// 带时区的时间戳直接换算；不带时区的按 `tz` 的本地时间理解
fn parse_iso<Tz: TimeZone>(date: &str, tz: &Tz) -> Option<DateTime<Tz>> {
    if let Ok(datetime) = DateTime::parse_from_rfc3339(date) {
        return Some(datetime.with_timezone(tz));
    }
    let naive = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(date, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(date, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })?;
    tz.from_local_datetime(&naive).earliest()
}

fn ordinal_suffix(day: u32) -> &'static str {
    match (day % 10, day % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    }
}

/// 用 Mustache 渲染页面模板
pub fn render_template(template: &str, context: &PageContext) -> Result<String, Exception> {
    let compiled = mustache::compile_str(template).map_err(|e| {
        error!("模板编译失败：{}", e);
        Exception::TemplateRenderFailed
    })?;
    let mut out = Vec::new();
    compiled.render(&mut out, context).map_err(|e| {
        error!("模板渲染失败：{}", e);
        Exception::TemplateRenderFailed
    })?;
    String::from_utf8(out).map_err(|_| Exception::TemplateRenderFailed)
}
