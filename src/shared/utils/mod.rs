//! 工具函数模块

use uuid::Uuid;

/// 生成请求ID
pub fn generate_request_id() -> String {
    format!("req_{}", Uuid::new_v4().simple())
}

/// 按字符截断字符串（不会切断多字节字符）
pub fn truncate_chars(input: &str, max_chars: usize) -> &str {
    match input.char_indices().nth(max_chars) {
        Some((byte_index, _)) => &input[..byte_index],
        None => input,
    }
}

/// 统计空白分隔的单词数
pub fn word_count(input: &str) -> u32 {
    input.split_whitespace().count() as u32
}

/// 粗略估算Token数量（约4个字符一个Token）
pub fn estimate_tokens(input: &str) -> u32 {
    let chars = input.chars().count() as u32;
    if chars == 0 {
        0
    } else {
        (chars + 3) / 4
    }
}

/// 日志中展示密钥时只保留长度
pub fn redact_secret(secret: &str) -> String {
    format!("<redacted:{}>", secret.len())
}
