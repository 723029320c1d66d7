//! 画面上の数値テキストの解析
//!
//! ドイツ語圏のサイトでは桁区切りに `.` や空白が使われる (`8.100 m`, `1 150 km`)。
//! 小数 (`12,5 km`) や負数は受け付けない。

use std::sync::OnceLock;

use regex::Regex;

use crate::error::SyncError;

fn count_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)^([0-9]{1,3}(?:[.\s][0-9]{3})+|[0-9]+)\s*(?:km|hm|m)?$")
            .expect("count pattern is valid")
    })
}

/// `"8.100 m"` → `8100`
pub fn parse_count(field: &str, text: &str) -> Result<u64, SyncError> {
    let parse_error = || SyncError::Parse {
        field: field.to_string(),
        text: text.to_string(),
    };

    let caps = count_pattern()
        .captures(text.trim())
        .ok_or_else(parse_error)?;

    let digits: String = caps[1].chars().filter(char::is_ascii_digit).collect();
    digits.parse::<u64>().map_err(|_| parse_error())
}

/// `"Höhenmeter 8.100 m"` のような統計行から数値を取り出す。ラベルが違えば `None`
pub fn labeled_count(label: &str, unit: &str, text: &str) -> Option<u64> {
    let pattern = format!(
        r"(?i)^{}\s*([0-9][0-9.\s]*?)\s*{}$",
        regex::escape(label),
        regex::escape(unit)
    );
    let regex = Regex::new(&pattern).ok()?;
    let caps = regex.captures(text.trim())?;
    parse_count(label, &caps[1]).ok()
}
