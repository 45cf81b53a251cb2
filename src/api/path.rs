use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use std::borrow::Cow;

/// 与浏览器 `encodeURIComponent` 相同的保留字符集。
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// 统一远端目录格式：以 `/` 开头、不以 `/` 结尾（根目录除外）。
pub fn normalize_folder(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        format!("/{trimmed}")
    }
}

pub fn join_remote_path(folder: &str, file_name: &str) -> String {
    let folder = folder.trim_end_matches('/');
    format!("{folder}/{file_name}")
}

/// 逐段编码，`/` 作为分隔符保留。
pub fn encode_remote_path(path: &str) -> String {
    path.split('/')
        .map(|segment| utf8_percent_encode(segment, SEGMENT).to_string())
        .collect::<Vec<_>>()
        .join("/")
}

pub fn decode_remote_path(encoded: &str) -> Cow<'_, str> {
    percent_decode_str(encoded).decode_utf8_lossy()
}
