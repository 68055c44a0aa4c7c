// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 请求目标（Request-Target）解析模块
//!
//! 将请求行中的原始目标字符串拆分为两部分：
//! 1. 路径段序列：去除所有 `..` 子串后按 `/` 切分，并丢弃空段。
//! 2. 查询映射：按 `&` 切分、按首个 `=` 拆出键值并进行百分号解码，重复的键以最后一次出现为准。
//!
//! 路径本身不做百分号解码。

use std::collections::HashMap;

use crate::exception::Exception;

/// 查询参数映射。值为 `None` 表示该片段中没有 `=`。
pub type Query = HashMap<String, Option<String>>;

/// 解析请求目标，返回 `(路径段, 查询映射)`。
///
/// 只有第一个 `?` 是分隔符，其后的 `?` 都属于查询字符串。
/// 查询中出现非法的百分号转义时返回 [`Exception::MalformedPercentEncoding`]。
pub fn parse_target(target: &str) -> Result<(Vec<String>, Query), Exception> {
    let (path_str, query_str) = match target.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (target, None),
    };

    let mut query = Query::new();
    if let Some(query_str) = query_str.filter(|q| !q.is_empty()) {
        for fragment in query_str.split('&') {
            let (key, value) = match fragment.split_once('=') {
                Some((k, v)) => (percent_decode(k)?, Some(percent_decode(v)?)),
                None => (percent_decode(fragment)?, None),
            };
            query.insert(key, value);
        }
    }

    Ok((parse_path(path_str), query))
}

/// 去除所有 `..`（纯文本替换，不感知路径段），再按 `/` 切分并丢弃空段。
pub fn parse_path(path: &str) -> Vec<String> {
    path.replace("..", "")
        .split('/')
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
        .collect()
}

/// 严格的百分号解码。
///
/// `%` 之后必须紧跟两个十六进制字符，且解码后的字节序列必须是合法的 UTF-8。
/// `+` 保持原样，不视为空格。
pub fn percent_decode(input: &str) -> Result<String, Exception> {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0usize;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = bytes
                .get(i + 1..i + 3)
                .ok_or(Exception::MalformedPercentEncoding)?;
            let hi = hex_value(hex[0]).ok_or(Exception::MalformedPercentEncoding)?;
            let lo = hex_value(hex[1]).ok_or(Exception::MalformedPercentEncoding)?;
            out.push((hi << 4) | lo);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).map_err(|_| Exception::MalformedPercentEncoding)
}

fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn encode(input: &str) -> String {
        let mut out = String::new();
        for byte in input.bytes() {
            if byte.is_ascii_alphanumeric() || b"-_.!~*'()".contains(&byte) {
                out.push(byte as char);
            } else {
                out.push_str(&format!("%{:02X}", byte));
            }
        }
        out
    }

    #[test]
    fn test_root_has_no_segments() {
        let (path, query) = parse_target("/").unwrap();
        assert!(path.is_empty());
        assert!(query.is_empty());
    }

    #[test]
    fn test_path_segments() {
        let (path, _) = parse_target("//hello///world/").unwrap();
        assert_eq!(path, vec!["hello", "world"]);
    }

    #[test]
    fn test_dot_dot_removed_textually() {
        assert_eq!(parse_path("/../etc/passwd"), vec!["etc", "passwd"]);
        assert_eq!(parse_path("/a..b/c"), vec!["ab", "c"]);
        assert_eq!(parse_path("/..../x"), vec!["x"]);
        assert_eq!(parse_path("/.../x"), vec![".", "x"]);
    }

    #[test]
    fn test_path_is_not_decoded() {
        assert_eq!(parse_path("/a%20b"), vec!["a%20b"]);
    }

    #[test]
    fn test_query_basic() {
        let (path, query) = parse_target("/page?id=123&name=te%20st").unwrap();
        assert_eq!(path, vec!["page"]);
        assert_eq!(query.get("id"), Some(&Some("123".to_string())));
        assert_eq!(query.get("name"), Some(&Some("te st".to_string())));
    }

    #[test]
    fn test_query_without_equals_has_no_value() {
        let (_, query) = parse_target("/?flag&x=1").unwrap();
        assert_eq!(query.get("flag"), Some(&None));
        assert_eq!(query.get("x"), Some(&Some("1".to_string())));
    }

    #[test]
    fn test_query_splits_on_first_equals() {
        let (_, query) = parse_target("/?a=b=c").unwrap();
        assert_eq!(query.get("a"), Some(&Some("b=c".to_string())));
    }

    #[test]
    fn test_only_first_question_mark_separates() {
        let (path, query) = parse_target("/x?a=1?b=2").unwrap();
        assert_eq!(path, vec!["x"]);
        assert_eq!(query.get("a"), Some(&Some("1?b=2".to_string())));
    }

    #[test]
    fn test_repeated_key_last_wins() {
        let (_, query) = parse_target("/?k=1&k=2&k=3").unwrap();
        assert_eq!(query.len(), 1);
        assert_eq!(query.get("k"), Some(&Some("3".to_string())));
    }

    #[test]
    fn test_empty_query_string() {
        let (_, query) = parse_target("/?").unwrap();
        assert!(query.is_empty());
    }

    #[test]
    fn test_plus_is_literal() {
        assert_eq!(percent_decode("a+b").unwrap(), "a+b");
    }

    #[test]
    fn test_malformed_escapes() {
        assert_eq!(parse_target("/?a=%"), Err(Exception::MalformedPercentEncoding));
        assert_eq!(parse_target("/?a=%4"), Err(Exception::MalformedPercentEncoding));
        assert_eq!(parse_target("/?%zz=1"), Err(Exception::MalformedPercentEncoding));
        assert_eq!(parse_target("/?a=%FF"), Err(Exception::MalformedPercentEncoding));
    }

    #[test]
    fn test_multibyte_decoding() {
        assert_eq!(percent_decode("%E4%BD%A0%E5%A5%BD").unwrap(), "你好");
    }

    proptest! {
        #[test]
        fn prop_path_has_no_empty_or_dot_dot_segments(raw in ".*") {
            for segment in parse_path(&raw) {
                prop_assert!(!segment.is_empty());
                prop_assert!(!segment.contains(".."));
            }
        }

        #[test]
        fn prop_percent_round_trip(key in "\\PC+", value in "\\PC*") {
            let target = format!("/?{}={}", encode(&key), encode(&value));
            let (_, query) = parse_target(&target).unwrap();
            prop_assert_eq!(query.get(&key), Some(&Some(value)));
        }

        #[test]
        fn prop_last_value_wins(values in proptest::collection::vec("[a-z0-9]{0,8}", 1..6)) {
            let target = format!(
                "/?{}",
                values.iter().map(|v| format!("k={}", v)).collect::<Vec<_>>().join("&")
            );
            let (_, query) = parse_target(&target).unwrap();
            prop_assert_eq!(query.get("k"), Some(&Some(values.last().unwrap().clone())));
        }
    }
}
