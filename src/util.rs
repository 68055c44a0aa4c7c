use chrono::{DateTime, Utc};

/// 按子串（而不是扩展名）判断静态资源的 `Content-Type`。
///
/// 依次检查 `.html`、`.css`、`.js`，都不包含时为 `text/plain`。
/// 因此 `foo.htmlx` 也会被当作 HTML。
pub fn content_type(filepath: &str) -> &'static str {
    if filepath.contains(".html") {
        "text/html"
    } else if filepath.contains(".css") {
        "text/css"
    } else if filepath.contains(".js") {
        "application/javascript"
    } else {
        "text/plain"
    }
}

/// `Date` 响应头使用的 IMF-fixdate 格式
pub fn format_http_date(date: &DateTime<Utc>) -> String {
    date.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_content_type() {
        assert_eq!(content_type("mooder.html"), "text/html");
        assert_eq!(content_type("style.css"), "text/css");
        assert_eq!(content_type("js/app.js"), "application/javascript");
        assert_eq!(content_type("missing.txt"), "text/plain");
        assert_eq!(content_type("image.png"), "text/plain");
    }

    #[test]
    fn test_content_type_is_substring_match() {
        assert_eq!(content_type("foo.htmlx"), "text/html");
        assert_eq!(content_type("data.json"), "application/javascript");
        assert_eq!(content_type("a.css/b.html"), "text/html");
    }

    #[test]
    fn test_format_http_date() {
        let date = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(format_http_date(&date), "Sun, 01 Jan 2023 00:00:00 GMT");
    }
}
