// src/frontend/native.rs
//! 原生方言解析：导出符号 -> 函数体 -> 参数槽 / 返回宏 / 委托调用 / 结构形态

use anyhow::{anyhow, Result};
use pest::iterators::Pair;
use pest::Parser;

use crate::frontend::ast::*;
use crate::frontend::span::{FileId, Span};
use crate::frontend::util::split_top_level;
use crate::utils::fast::{fast_map, FastMap};

#[derive(pest_derive::Parser)]
#[grammar = "grammar/native.pest"]
pub struct NativeGrammar;

/// 需要运行时类型标签的函数体里一定出现这一行
pub const TYPE_TAG_MARKER: &str = "meosType basetype =";
const NULL_KIND: &str = "NULL";

/// 单个 C 文件的解析结果
#[derive(Debug, Default)]
pub struct NativeUnit {
    pub functions: Vec<NativeImplementation>,
    /// 有导出声明但找不到函数体的符号
    pub dropped: Vec<String>,
}

pub fn parse_native(src: &str, file: FileId) -> Result<NativeUnit> {
    let mut pairs = NativeGrammar::parse(Rule::native_file, src)?;
    let root = pairs.next().ok_or_else(|| anyhow!("empty native file"))?;

    let mut exports: Vec<String> = Vec::new();
    let mut bodies: FastMap<String, (String, Span)> = fast_map();

    for it in root.into_inner() {
        match it.as_rule() {
            Rule::export_decl => {
                if let Some(name) = first_ident(it) {
                    exports.push(name);
                }
            }
            Rule::function_def => {
                let s = it.as_span();
                let span = Span::new(file, s.start(), s.end());
                let mut name = None;
                let mut body = None;
                for child in it.into_inner() {
                    match child.as_rule() {
                        Rule::ident     => name = Some(child.as_str().to_string()),
                        Rule::body_text => body = Some(child.as_str().to_string()),
                        _ => {}
                    }
                }
                if let (Some(n), Some(b)) = (name, body) {
                    // 同名定义只认第一个
                    bodies.entry(n).or_insert((b, span));
                }
            }
            _ => {}
        }
    }

    let mut unit = NativeUnit::default();
    for sym in exports {
        match bodies.get(&sym) {
            Some((body, span)) => unit.functions.push(build_implementation(&sym, body, *span)?),
            None => unit.dropped.push(sym),
        }
    }
    Ok(unit)
}

fn first_ident(p: Pair<Rule>) -> Option<String> {
    p.into_inner()
        .find(|c| c.as_rule() == Rule::ident)
        .map(|c| c.as_str().to_string())
}

pub fn build_implementation(symbol: &str, body: &str, span: Span) -> Result<NativeImplementation> {
    let slots = find_arg_slots(body)?;
    let (return_kind, nullable) = scan_return_macros(body)?;
    let needs_type_tag = body.contains(TYPE_TAG_MARKER);
    let type_tag_var = needs_type_tag.then(|| type_tag_var_name(TYPE_TAG_MARKER));

    let lines = processing_lines(body);
    let delegated = lines
        .iter()
        .filter_map(|l| parse_return_line(l))
        .find(|(kind, _)| kind != NULL_KIND)
        .map(|(_, expr)| parse_call(&expr));
    let shape = classify_shape(&lines, nullable);

    Ok(NativeImplementation {
        symbol: symbol.to_string(),
        slots,
        needs_type_tag,
        type_tag_var,
        delegated,
        return_kind,
        nullable,
        body: body.to_string(),
        shape,
        span,
    })
}

/* ================================
 * 参数槽：两遍扫描
 * ================================ */

/// 第一遍：声明式绑定；第二遍：赋值式绑定（与第一遍重叠的跳过）。结果按 index 升序。
pub fn find_arg_slots(body: &str) -> Result<Vec<ArgSlot>> {
    let mut slots = Vec::new();
    let mut seen: Vec<Span> = Vec::new();

    let root = NativeGrammar::parse(Rule::decl_scan, body)?
        .next()
        .ok_or_else(|| anyhow!("empty decl scan"))?;
    for p in root.into_inner().filter(|p| p.as_rule() == Rule::decl_binding) {
        let s = p.as_span();
        if let Some(slot) = build_binding(p) {
            seen.push(Span::new(FileId::DUMMY, s.start(), s.end()));
            slots.push(slot);
        }
    }

    let root = NativeGrammar::parse(Rule::assign_scan, body)?
        .next()
        .ok_or_else(|| anyhow!("empty assign scan"))?;
    for p in root.into_inner().filter(|p| p.as_rule() == Rule::assign_binding) {
        let s = p.as_span();
        let here = Span::new(FileId::DUMMY, s.start(), s.end());
        if seen.iter().any(|o| o.overlaps(&here)) {
            continue;
        }
        if let Some(slot) = build_binding(p) {
            slots.push(slot);
        }
    }

    slots.sort_by_key(|s| s.index);
    Ok(slots)
}

fn build_binding(p: Pair<Rule>) -> Option<ArgSlot> {
    let mut ty = None;
    let mut var = None;
    let mut cast = None;
    let mut kind = None;
    let mut index = None;

    for child in p.into_inner() {
        match child.as_rule() {
            Rule::type_spec => ty = Some(normalize_type(child.as_str())),
            Rule::ident     => var = Some(child.as_str().to_string()),
            Rule::cast => {
                cast = child.into_inner().next().map(|c| normalize_type(c.as_str()));
            }
            Rule::getarg => {
                for g in child.into_inner() {
                    match g.as_rule() {
                        Rule::getarg_kind => kind = Some(g.as_str().to_string()),
                        Rule::number      => index = g.as_str().parse::<usize>().ok(),
                        _ => {}
                    }
                }
            }
            _ => {}
        }
    }

    Some(ArgSlot {
        kind: kind?,
        var: var?,
        index: index?,
        // 显式强转优先
        c_type: cast.or(ty),
    })
}

/// `Span  *` -> `Span *`
fn normalize_type(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn type_tag_var_name(marker: &str) -> String {
    marker
        .trim_end_matches('=')
        .split_whitespace()
        .last()
        .unwrap_or("basetype")
        .to_string()
}

/* ================================
 * 返回宏
 * ================================ */

/// (首个非 NULL 返回宏后缀, 是否出现 PG_RETURN_NULL)
pub fn scan_return_macros(body: &str) -> Result<(Option<String>, bool)> {
    let root = NativeGrammar::parse(Rule::macro_scan, body)?
        .next()
        .ok_or_else(|| anyhow!("empty macro scan"))?;

    let kinds: Vec<String> = root
        .into_inner()
        .filter(|p| p.as_rule() == Rule::return_macro)
        .filter_map(|p| p.into_inner().next().map(|k| k.as_str().to_string()))
        .collect();

    let nullable = kinds.iter().any(|k| k == NULL_KIND);
    let first = kinds.into_iter().find(|k| k != NULL_KIND);
    Ok((first, nullable))
}

/// `PG_RETURN_KIND(expr);` -> (KIND, expr)
pub fn parse_return_line(line: &str) -> Option<(String, String)> {
    let root = NativeGrammar::parse(Rule::return_line, line).ok()?.next()?;
    let mut kind = None;
    let mut expr = String::new();
    for child in root.into_inner() {
        match child.as_rule() {
            Rule::return_macro => kind = child.into_inner().next().map(|k| k.as_str().to_string()),
            Rule::return_expr  => expr = child.as_str().trim().to_string(),
            _ => {}
        }
    }
    Some((kind?, expr))
}

/// `f(a, g(b))` -> Some(f), [a, g(b)]；其它表达式按裸项处理
pub fn parse_call(expr: &str) -> CallExpr {
    let expr = expr.trim();
    let Ok(mut pairs) = NativeGrammar::parse(Rule::call_expr, expr) else {
        return CallExpr::bare(expr);
    };
    let Some(root) = pairs.next() else {
        return CallExpr::bare(expr);
    };
    let mut name = None;
    let mut args = Vec::new();
    for child in root.into_inner() {
        match child.as_rule() {
            Rule::ident     => name = Some(child.as_str().to_string()),
            Rule::call_args => args = split_top_level(child.as_str()).into_iter().map(str::to_string).collect(),
            _ => {}
        }
    }
    match name {
        Some(n) => CallExpr { name: Some(n), args },
        None => CallExpr::bare(expr),
    }
}

/* ================================
 * 处理行与结构形态
 * ================================ */

/// 去掉注释、参数绑定、类型标签、PG_FREE_IF_COPY 与孤立花括号后的逻辑行。
/// 括号未闭合的物理行会并入下一行；`if (c) PG_RETURN_NULL();` 拆成两行。
pub fn processing_lines(body: &str) -> Vec<String> {
    let stripped = strip_comments(body);
    let mut logical: Vec<String> = Vec::new();
    let mut pending = String::new();
    let mut depth: i32 = 0;

    for raw in stripped.lines() {
        let t = raw.trim();
        if t.is_empty() {
            continue;
        }
        if !pending.is_empty() {
            pending.push(' ');
        }
        pending.push_str(t);
        depth += paren_delta(t);
        if depth <= 0 {
            logical.push(std::mem::take(&mut pending));
            depth = 0;
        }
    }
    if !pending.is_empty() {
        logical.push(pending);
    }

    let mut out = Vec::new();
    for line in logical {
        let line = line.trim_matches(|c| c == '{' || c == '}').trim().to_string();
        if line.is_empty()
            || line == ";"
            || line.contains("PG_GETARG_")
            || line.contains(TYPE_TAG_MARKER)
            || line.starts_with("PG_FREE_IF_COPY")
        {
            continue;
        }
        match split_if_statement(&line) {
            Some((head, tail)) => {
                out.push(head);
                out.push(tail);
            }
            None => out.push(line),
        }
    }
    out
}

fn paren_delta(s: &str) -> i32 {
    let mut d = 0;
    let mut in_str: Option<char> = None;
    let mut escaped = false;
    for c in s.chars() {
        if let Some(q) = in_str {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                in_str = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => in_str = Some(c),
            '(' => d += 1,
            ')' => d -= 1,
            _ => {}
        }
    }
    d
}

/// `if (c) stmt;` -> ("if (c)", "stmt;")
fn split_if_statement(line: &str) -> Option<(String, String)> {
    let rest = line.strip_prefix("if")?;
    if rest.starts_with(|c: char| c.is_ascii_alphanumeric() || c == '_') {
        return None;
    }
    let open = line.find('(')?;
    let mut depth = 0;
    for (i, c) in line[open..].char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    let end = open + i + 1;
                    let tail = line[end..].trim().trim_matches(|c| c == '{' || c == '}').trim();
                    if tail.is_empty() {
                        return None;
                    }
                    return Some((line[..end].to_string(), tail.to_string()));
                }
            }
            _ => {}
        }
    }
    None
}

fn strip_comments(src: &str) -> String {
    let mut out = String::with_capacity(src.len());
    let mut chars = src.chars().peekable();
    let mut in_str: Option<char> = None;
    let mut escaped = false;

    while let Some(c) = chars.next() {
        if let Some(q) = in_str {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                in_str = None;
            }
            continue;
        }
        match (c, chars.peek()) {
            ('/', Some('*')) => {
                chars.next();
                let mut prev = '\0';
                for n in chars.by_ref() {
                    if n == '\n' {
                        out.push('\n');
                    }
                    if prev == '*' && n == '/' {
                        break;
                    }
                    prev = n;
                }
            }
            ('/', Some('/')) => {
                for n in chars.by_ref() {
                    if n == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            }
            ('"', _) | ('\'', _) => {
                in_str = Some(c);
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}

/// `T *v = expr;` -> (Some("T *"), v, expr)；`v = expr;` -> (None, v, expr)
pub fn split_assignment(line: &str) -> Option<(Option<String>, String, String)> {
    let line = line.trim().trim_end_matches(';').trim();
    let bytes = line.as_bytes();
    let mut eq = None;
    for i in 0..bytes.len() {
        if bytes[i] != b'=' {
            continue;
        }
        let prev = if i > 0 { bytes[i - 1] } else { b' ' };
        let next = bytes.get(i + 1).copied().unwrap_or(b' ');
        if next != b'=' && !matches!(prev, b'=' | b'!' | b'<' | b'>') {
            eq = Some(i);
            break;
        }
    }
    let eq = eq?;
    let lhs = line[..eq].trim();
    let rhs = line[eq + 1..].trim();
    if rhs.is_empty() || lhs.contains('(') {
        return None;
    }
    let var_start = lhs
        .rfind(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .map(|i| i + 1)
        .unwrap_or(0);
    let var = &lhs[var_start..];
    if !is_ident(var) {
        return None;
    }
    let ty = lhs[..var_start].trim();
    let ty = (!ty.is_empty()).then(|| normalize_type(ty));
    Some((ty, var.to_string(), rhs.to_string()))
}

/// 按处理行数与可空性判定结构形态
pub fn classify_shape(lines: &[String], nullable: bool) -> BodyShape {
    let unclassified = || BodyShape::Unclassified { lines: lines.to_vec() };

    let Some((kind, ret_expr)) = lines.last().and_then(|l| parse_return_line(l)) else {
        return unclassified();
    };
    if kind == NULL_KIND {
        return unclassified();
    }
    let ret_var = parse_call(&ret_expr).bare_ident().map(str::to_string);
    let body = &lines[..lines.len() - 1];
    // 最后一行之外不允许再出现非 NULL 的返回
    let stray_return = body
        .iter()
        .filter_map(|l| parse_return_line(l))
        .any(|(k, _)| k != NULL_KIND);
    if stray_return {
        return unclassified();
    }
    // setup / call 行不能是守卫头或 PG_RETURN_NULL
    let plain = |l: &String| !is_if_head(l) && !is_null_return(l);

    match (lines.len(), nullable) {
        (1, _) => BodyShape::SingleCall { expr: ret_expr },
        (2, _) => match (split_assignment(&body[0]), ret_var) {
            (Some((ty, var, call)), Some(rv)) if var == rv => BodyShape::PreAssignedCall {
                c_type: ty.unwrap_or_else(|| "auto".to_string()),
                var,
                call,
            },
            _ => unclassified(),
        },
        (3, _) => match guard_condition(&body[0]) {
            Some(guard) if is_null_return(&body[1]) => BodyShape::NullGuarded { setup: None, guard, ret: ret_expr },
            _ if body.iter().all(plain) => BodyShape::PreallocatedOutput {
                setup: body[0].clone(),
                call: body[1].clone(),
                ret: ret_expr,
            },
            _ => unclassified(),
        },
        (4, true) => match guard_condition(&body[1]) {
            Some(guard) if plain(&body[0]) && is_null_return(&body[2]) => BodyShape::NullGuarded {
                setup: Some(body[0].clone()),
                guard,
                ret: ret_expr,
            },
            _ => unclassified(),
        },
        (4, false) => BodyShape::Verbatim { lines: body.to_vec(), ret: ret_expr },
        _ => unclassified(),
    }
}

fn is_null_return(line: &str) -> bool {
    matches!(parse_return_line(line), Some((k, _)) if k == NULL_KIND)
}

/// `if (...)` 独占一行
fn is_if_head(line: &str) -> bool {
    line.strip_prefix("if").is_some_and(|rest| rest.trim_start().starts_with('('))
}

/// `if (cond)` -> cond
fn guard_condition(line: &str) -> Option<String> {
    let rest = line.strip_prefix("if")?.trim();
    let inner = rest.strip_prefix('(')?.strip_suffix(')')?;
    Some(inner.trim().to_string())
}
