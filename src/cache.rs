use std::num::NonZeroUsize;
use std::time::SystemTime;

use bytes::Bytes;
use lru::LruCache;

/// 单个文件可被缓存的最大字节数
pub const MAX_CACHED_FILE: u64 = 1024 * 1024;

#[derive(Clone)]
struct CacheEntry {
    content: Bytes,
    modified_time: SystemTime,
}

/// 静态资源缓存，以相对路径为键，以修改时间判断是否过期
pub struct StaticCache {
    cache: LruCache<String, CacheEntry>,
    max_file_size: u64,
}

impl StaticCache {
    /// `capacity` 为 0 时按 1 处理
    pub fn new(capacity: usize, max_file_size: u64) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: LruCache::new(capacity),
            max_file_size,
        }
    }

    /// 查询有效缓存，修改时间不一致视为未命中
    pub fn get(&mut self, path: &str, modified_time: SystemTime) -> Option<Bytes> {
        match self.cache.get(path) {
            Some(entry) if entry.modified_time == modified_time => Some(entry.content.clone()),
            _ => None,
        }
    }

    /// 放入缓存，超过大小上限的文件直接忽略。返回是否真正写入。
    pub fn insert(&mut self, path: &str, content: Bytes, modified_time: SystemTime) -> bool {
        if content.len() as u64 > self.max_file_size {
            return false;
        }
        self.cache.put(
            path.to_string(),
            CacheEntry {
                content,
                modified_time,
            },
        );
        true
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_zero_capacity_is_clamped() {
        let mut cache = StaticCache::new(0, MAX_CACHED_FILE);
        let time = SystemTime::now();
        cache.insert("a.css", Bytes::from("a"), time);
        cache.insert("b.css", Bytes::from("b"), time);
        assert_eq!(cache.len(), 1);
        assert!(cache.get("b.css", time).is_some());
    }

    #[test]
    fn test_insert_and_get() {
        let mut cache = StaticCache::new(3, MAX_CACHED_FILE);
        let time = SystemTime::now();
        let content = Bytes::from("body { color: red; }");

        assert!(cache.insert("style.css", content.clone(), time));
        assert_eq!(cache.get("style.css", time), Some(content));
        assert!(cache.get("other.css", time).is_none());
    }

    #[test]
    fn test_modified_time_invalidation() {
        let mut cache = StaticCache::new(3, MAX_CACHED_FILE);
        let time1 = SystemTime::now();
        let time2 = time1 + Duration::from_secs(10);

        cache.insert("style.css", Bytes::from("old"), time1);
        assert!(cache.get("style.css", time2).is_none());

        cache.insert("style.css", Bytes::from("new"), time2);
        assert!(cache.get("style.css", time1).is_none());
        assert_eq!(cache.get("style.css", time2), Some(Bytes::from("new")));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_lru_eviction() {
        let mut cache = StaticCache::new(2, MAX_CACHED_FILE);
        let time = SystemTime::now();

        cache.insert("1.css", Bytes::from("1"), time);
        cache.insert("2.css", Bytes::from("2"), time);
        cache.get("1.css", time);
        cache.insert("3.css", Bytes::from("3"), time);

        assert_eq!(cache.len(), 2);
        assert!(cache.get("2.css", time).is_none());
        assert!(cache.get("1.css", time).is_some());
        assert!(cache.get("3.css", time).is_some());
    }

    #[test]
    fn test_oversized_file_not_cached() {
        let mut cache = StaticCache::new(2, 4);
        let time = SystemTime::now();
        assert!(!cache.insert("big.js", Bytes::from("12345"), time));
        assert!(cache.insert("ok.js", Bytes::from("1234"), time));
        assert!(cache.get("big.js", time).is_none());
        assert!(!cache.is_empty());
    }
}
