// src/backend/mangle.rs
//! 消歧键与生成函数名

pub const CAST_SUFFIX: &str = "_cast";

/// 类型名化为标识符片段：`double precision` -> `double_precision`，`numeric(10,2)` -> `numeric_10_2`
pub fn mangle_ty(t: &str) -> String {
    let mut out = String::with_capacity(t.len());
    let mut last_us = false;
    for c in t.trim().chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c);
            last_us = false;
        } else if !last_us {
            out.push('_');
            last_us = true;
        }
    }
    out.trim_matches('_').to_string()
}

/// 重载键：symbol_T1_T2...
pub fn mangle_overload(symbol: &str, types: &[&str]) -> String {
    if types.is_empty() {
        return symbol.to_string();
    }
    let parts: Vec<String> = types.iter().map(|t| mangle_ty(t)).collect();
    format!("{}_{}", symbol, parts.join("_"))
}

#[inline]
pub fn cast_key(key: &str) -> String {
    format!("{key}{CAST_SUFFIX}")
}

#[inline]
pub fn is_cast_key(key: &str) -> bool {
    key.ends_with(CAST_SUFFIX)
}

/// 生成的 C++ 成员函数名：键的首字母大写
pub fn wrapper_name(key: &str) -> String {
    let mut chars = key.chars();
    match chars.next() {
        Some(c) => c.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overload_keys() {
        assert_eq!(mangle_overload("Number_to_tbox", &["integer"]), "Number_to_tbox_integer");
        assert_eq!(
            mangle_overload("Number_timestamptz_to_tbox", &["float", "timestamptz"]),
            "Number_timestamptz_to_tbox_float_timestamptz"
        );
        assert_eq!(mangle_overload("f", &["double precision", "numeric(10,2)"]), "f_double_precision_numeric_10_2");
        assert_eq!(mangle_overload("g", &[]), "g");
    }

    #[test]
    fn names() {
        assert_eq!(wrapper_name("tbox_in_cast"), "Tbox_in_cast");
        assert_eq!(wrapper_name("Tbox_out"), "Tbox_out");
        assert!(is_cast_key(&cast_key("Tbox_in")));
        assert!(!is_cast_key("Tbox_in"));
    }
}
