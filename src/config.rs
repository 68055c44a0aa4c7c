use serde_derive::Deserialize;
use serde_derive::Serialize;

use log::{error, warn};
use std::fs;
use std::path::Path;

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Config {
    #[serde(default = "default_port")]
    port: u16,
    #[serde(default = "default_www_root")]
    www_root: String,
    #[serde(default = "default_mood_file")]
    mood_file: String,
    #[serde(default = "default_template")]
    template: String,
    #[serde(default)]
    worker_threads: usize,
    #[serde(default = "default_cache_size")]
    cache_size: usize,
    #[serde(default = "default_max_body_size")]
    max_body_size: u64,
    #[serde(default = "default_compression")]
    compression: bool,
    #[serde(default)]
    open_browser: bool,
}

fn default_port() -> u16 {
    14351
}

fn default_www_root() -> String {
    "static".to_string()
}

fn default_mood_file() -> String {
    "data/moods.csv".to_string()
}

fn default_template() -> String {
    "static/mooder.html".to_string()
}

fn default_cache_size() -> usize {
    5
}

fn default_max_body_size() -> u64 {
    1048576 // 1MB
}

fn default_compression() -> bool {
    true
}

impl Config {
    pub fn new() -> Self {
        Self {
            port: default_port(),
            www_root: default_www_root(),
            mood_file: default_mood_file(),
            template: default_template(),
            worker_threads: 0,
            cache_size: default_cache_size(),
            max_body_size: default_max_body_size(),
            compression: default_compression(),
            open_browser: false,
        }
    }

    /// 从 TOML 文件读取配置。文件缺失或格式错误时使用默认配置。
    pub fn from_toml<P: AsRef<Path>>(filename: P) -> Self {
        let filename = filename.as_ref();
        let raw = match fs::read_to_string(filename) {
            Ok(s) => s,
            Err(e) => {
                warn!("无法读取配置文件{}：{}，使用默认配置", filename.display(), e);
                return Config::new().normalized();
            }
        };
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> Self {
        let config = match toml::from_str::<Config>(raw) {
            Ok(t) => t,
            Err(e) => {
                error!("无法成功从配置文件构建配置对象：{}，使用默认配置", e);
                Config::new()
            }
        };
        config.normalized()
    }

    fn normalized(mut self) -> Self {
        if self.worker_threads == 0 {
            self.worker_threads = num_cpus::get();
        }
        if self.cache_size == 0 {
            warn!("cache_size被设置为0，但目前尚不支持禁用缓存，因此该值将被改为5。");
            self.cache_size = default_cache_size();
        }
        self
    }

    /// 测试中常用：覆盖端口与各个路径
    pub fn with_paths(mut self, port: u16, www_root: &str, mood_file: &str, template: &str) -> Self {
        self.port = port;
        self.www_root = www_root.to_string();
        self.mood_file = mood_file.to_string();
        self.template = template.to_string();
        self
    }

    pub fn with_max_body_size(mut self, max_body_size: u64) -> Self {
        self.max_body_size = max_body_size;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn www_root(&self) -> &str {
        &self.www_root
    }

    pub fn mood_file(&self) -> &str {
        &self.mood_file
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn worker_threads(&self) -> usize {
        self.worker_threads
    }

    pub fn cache_size(&self) -> usize {
        self.cache_size
    }

    /// 请求体上限，`None` 表示不限制
    pub fn max_body_size(&self) -> Option<u64> {
        match self.max_body_size {
            0 => None,
            n => Some(n),
        }
    }

    pub fn compression(&self) -> bool {
        self.compression
    }

    pub fn open_browser(&self) -> bool {
        self.open_browser
    }
}
