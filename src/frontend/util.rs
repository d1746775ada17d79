// src/frontend/util.rs
use crate::utils::fast::FastMap;

/// 按顶层逗号切分（逐字符追踪括号深度，`numeric(10,2)` 不会被拆开）
pub fn split_top_level(s: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth: i32 = 0;
    let mut start = 0usize;

    for (i, ch) in s.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => depth -= 1,
            ',' if depth == 0 => {
                let part = s[start..i].trim();
                if !part.is_empty() {
                    parts.push(part);
                }
                start = i + 1;
            }
            _ => {}
        }
    }
    let tail = s[start..].trim();
    if !tail.is_empty() {
        parts.push(tail);
    }
    parts
}

/// 以标识符为单位做替换；字符串/字符字面量内部不动
pub fn rename_idents(text: &str, renames: &FastMap<String, String>) -> String {
    if renames.is_empty() {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len() + 8);
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if c.is_ascii_alphabetic() || c == '_' {
            let mut end = i + c.len_utf8();
            while let Some(&(j, n)) = chars.peek() {
                if n.is_ascii_alphanumeric() || n == '_' {
                    end = j + n.len_utf8();
                    chars.next();
                } else {
                    break;
                }
            }
            let word = &text[i..end];
            match renames.get(word) {
                Some(to) => out.push_str(to),
                None => out.push_str(word),
            }
        } else if c == '"' || c == '\'' {
            out.push(c);
            let mut escaped = false;
            for (_, n) in chars.by_ref() {
                out.push(n);
                if escaped {
                    escaped = false;
                } else if n == '\\' {
                    escaped = true;
                } else if n == c {
                    break;
                }
            }
        } else if c.is_ascii_digit() {
            // 数字字面量整体跳过，避免 `1e5f` 之类被当成标识符
            out.push(c);
            while let Some(&(_, n)) = chars.peek() {
                if n.is_ascii_alphanumeric() || n == '_' || n == '.' {
                    out.push(n);
                    chars.next();
                } else {
                    break;
                }
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// 1 起始的行号
#[inline]
pub fn line_of(src: &str, offset: usize) -> usize {
    src[..offset.min(src.len())].matches('\n').count() + 1
}
