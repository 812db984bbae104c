//! 配置值检查
//!
//! 把原始配置值分为 present / placeholder / absent 三类

use serde::Serialize;

use crate::infrastructure::config::ConfigSource;

/// 大小写不敏感的占位符子串
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your_",
    "your-",
    "xxx",
    "test_",
    "sk_test_",
    "placeholder",
    "example",
    "<your",
    "change_me",
    "todo",
    "fixme",
    "replaceme",
    "your_key_here",
    "add_your_",
    "insert_",
    "dummy",
    "sample",
];

/// 精确匹配的占位值
const PLACEHOLDER_VALUES: &[&str] = &[
    "demo",
    "sk_test_1234567890",
    "eyJhbGciOi...",
    "https://example.supabase.co",
    "your-api-key-here",
];

/// 配置值状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Presence {
    Present,
    Placeholder,
    Absent,
}

impl Presence {
    pub fn is_present(&self) -> bool {
        matches!(self, Presence::Present)
    }
}

/// 判断原始配置值的状态
pub fn classify(raw: Option<&str>) -> Presence {
    let Some(value) = raw.map(str::trim).filter(|v| !v.is_empty()) else {
        return Presence::Absent;
    };

    let lowered = value.to_lowercase();
    let exact = PLACEHOLDER_VALUES
        .iter()
        .any(|candidate| candidate.to_lowercase() == lowered);
    let pattern = PLACEHOLDER_PATTERNS
        .iter()
        .any(|pattern| lowered.contains(pattern));

    if exact || pattern {
        Presence::Placeholder
    } else {
        Presence::Present
    }
}

/// 第一个不可用的配置变量
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingVariable {
    pub name: String,
    pub presence: Presence,
}

impl MissingVariable {
    pub fn reason(&self) -> String {
        match self.presence {
            Presence::Placeholder => format!("{} 是占位值", self.name),
            _ => format!("缺少 {}", self.name),
        }
    }
}

/// 按顺序检查一组变量，返回第一个不可用的变量
pub fn inspect_all(source: &dyn ConfigSource, vars: &[&str]) -> Result<(), MissingVariable> {
    for var in vars {
        let presence = classify(source.get(var).as_deref());
        if !presence.is_present() {
            return Err(MissingVariable {
                name: (*var).to_string(),
                presence,
            });
        }
    }
    Ok(())
}
