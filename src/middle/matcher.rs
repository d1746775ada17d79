// src/middle/matcher.rs
//! 声明 <-> 原生实现 的匹配与重载消歧

use crate::backend::mangle::{cast_key, mangle_overload, wrapper_name};
use crate::error::GenError;
use crate::frontend::ast::{FunctionDeclaration, NativeImplementation};
use crate::utils::fast::{fast_map, FastMap, SmallVec4};

/// 一条声明及其匹配到的实现与消歧键
#[derive(Debug)]
pub struct MatchedUnit<'a> {
    pub decl: &'a FunctionDeclaration,
    pub native: &'a NativeImplementation,
    /// 普通键在前，`_cast` 变体在后
    pub keys: SmallVec4<String>,
}

#[derive(Debug, Default)]
pub struct MatchResult<'a> {
    /// symbol -> 实现
    pub matches: FastMap<String, &'a NativeImplementation>,
    /// symbol -> 全部键（按声明出现顺序）
    pub keys: FastMap<String, Vec<String>>,
    /// 按声明顺序排列
    pub units: Vec<MatchedUnit<'a>>,
    /// 找不到实现的声明
    pub unmatched: Vec<&'a FunctionDeclaration>,
}

pub fn match_and_disambiguate<'a>(
    decls: &'a [FunctionDeclaration],
    natives: &'a [NativeImplementation],
) -> Result<MatchResult<'a>, GenError> {
    let mut res = MatchResult::default();

    // 同名实现只认第一个
    let mut by_symbol: FastMap<&str, &'a NativeImplementation> = fast_map();
    for n in natives {
        by_symbol.entry(n.symbol.as_str()).or_insert(n);
    }

    let mut refs: FastMap<&str, usize> = fast_map();
    for d in decls {
        if by_symbol.contains_key(d.symbol.as_str()) {
            *refs.entry(d.symbol.as_str()).or_insert(0) += 1;
        }
    }

    // C++ 成员名 -> 首个产生它的声明（首字母大写后才比较）
    let mut owners: FastMap<String, String> = fast_map();

    for d in decls {
        let Some(native) = by_symbol.get(d.symbol.as_str()).copied() else {
            res.unmatched.push(d);
            continue;
        };

        let base = if refs.get(d.symbol.as_str()).copied().unwrap_or(0) > 1 {
            mangle_overload(&d.symbol, &d.param_types())
        } else {
            d.symbol.clone()
        };
        let mut keys: SmallVec4<String> = SmallVec4::new();
        keys.push(base.clone());
        if d.is_cast {
            keys.push(cast_key(&base));
        }

        for k in &keys {
            let member = wrapper_name(k);
            if let Some(first) = owners.get(&member) {
                return Err(GenError::KeyCollision {
                    key: member,
                    first: first.clone(),
                    second: d.to_string(),
                });
            }
            owners.insert(member, d.to_string());
        }

        res.matches.entry(d.symbol.clone()).or_insert(native);
        res.keys.entry(d.symbol.clone()).or_default().extend(keys.iter().cloned());
        res.units.push(MatchedUnit { decl: d, native, keys });
    }

    Ok(res)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::ast::{BodyShape, Param};
    use crate::frontend::span::Span;

    fn decl(name: &str, symbol: &str, types: &[&str], is_cast: bool) -> FunctionDeclaration {
        FunctionDeclaration {
            name: name.into(),
            return_type: "tbox".into(),
            params: types
                .iter()
                .enumerate()
                .map(|(i, t)| Param { ty: t.to_string(), name: format!("arg{i}") })
                .collect(),
            defaults: vec![],
            symbol: symbol.into(),
            sql_definition: String::new(),
            category: "unknown".into(),
            is_operator: false,
            is_aggregate: false,
            is_cast,
            operator_symbol: None,
            line: 1,
            span: Span::DUMMY,
        }
    }

    fn native(symbol: &str) -> NativeImplementation {
        NativeImplementation {
            symbol: symbol.into(),
            slots: vec![],
            needs_type_tag: false,
            type_tag_var: None,
            delegated: None,
            return_kind: None,
            nullable: false,
            body: String::new(),
            shape: BodyShape::Unclassified { lines: vec![] },
            span: Span::DUMMY,
        }
    }

    #[test]
    fn single_declaration_keeps_symbol() {
        let decls = vec![decl("tbox_hasx", "Tbox_hasx", &["tbox"], false)];
        let natives = vec![native("Tbox_hasx")];
        let r = match_and_disambiguate(&decls, &natives).unwrap();
        assert_eq!(r.keys["Tbox_hasx"], vec!["Tbox_hasx".to_string()]);
        assert_eq!(r.units.len(), 1);
    }

    #[test]
    fn single_cast_declaration_adds_cast_key() {
        let decls = vec![decl("tbox_in", "Tbox_in", &["cstring"], true)];
        let natives = vec![native("Tbox_in")];
        let r = match_and_disambiguate(&decls, &natives).unwrap();
        assert_eq!(r.keys["Tbox_in"], vec!["Tbox_in".to_string(), "Tbox_in_cast".to_string()]);
    }

    #[test]
    fn overloads_get_distinct_prefixed_keys() {
        let decls = vec![
            decl("tbox", "Number_to_tbox", &["integer"], true),
            decl("tbox", "Number_to_tbox", &["float"], true),
            decl("tbox", "Number_to_tbox", &["bigint"], false),
        ];
        let natives = vec![native("Number_to_tbox")];
        let r = match_and_disambiguate(&decls, &natives).unwrap();
        let plain: Vec<&String> = r.units.iter().map(|u| &u.keys[0]).collect();
        assert_eq!(plain.len(), 3);
        assert!(plain.iter().all(|k| k.starts_with("Number_to_tbox")));
        assert_eq!(
            r.keys["Number_to_tbox"],
            vec![
                "Number_to_tbox_integer".to_string(),
                "Number_to_tbox_integer_cast".to_string(),
                "Number_to_tbox_float".to_string(),
                "Number_to_tbox_float_cast".to_string(),
                "Number_to_tbox_bigint".to_string(),
            ]
        );
    }

    #[test]
    fn identical_overloads_collide() {
        let decls = vec![
            decl("a", "F", &["integer"], false),
            decl("b", "F", &["integer"], false),
        ];
        let natives = vec![native("F")];
        let err = match_and_disambiguate(&decls, &natives).unwrap_err();
        assert!(matches!(err, GenError::KeyCollision { ref key, .. } if key == "F_integer"));
    }

    #[test]
    fn symbols_differing_in_first_letter_case_collide() {
        let decls = vec![
            decl("tbox_in", "tbox_in", &["cstring"], false),
            decl("tbox_in2", "Tbox_in", &["cstring"], false),
        ];
        let natives = vec![native("tbox_in"), native("Tbox_in")];
        let err = match_and_disambiguate(&decls, &natives).unwrap_err();
        assert!(matches!(err, GenError::KeyCollision { ref key, .. } if key == "Tbox_in"));
    }

    #[test]
    fn unmatched_declarations_are_reported() {
        let decls = vec![decl("a", "Missing", &[], false), decl("b", "Here", &[], false)];
        let natives = vec![native("Here"), native("Unused")];
        let r = match_and_disambiguate(&decls, &natives).unwrap();
        assert_eq!(r.unmatched.len(), 1);
        assert_eq!(r.unmatched[0].symbol, "Missing");
        assert_eq!(r.units[0].decl.name, "b");
        assert!(!r.matches.contains_key("Unused"));
    }
}
