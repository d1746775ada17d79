// src/frontend/ddl.rs
//! 声明方言解析：函数签名、类型、区段标记、CAST 与 OPERATOR

use anyhow::{anyhow, Result};
use pest::iterators::Pair;
use pest::Parser;

use crate::frontend::ast::*;
use crate::frontend::span::{FileId, Span};
use crate::frontend::util::{line_of, split_top_level};
use crate::middle::tables::CategoryTable;

#[derive(pest_derive::Parser)]
#[grammar = "grammar/ddl.pest"]
pub struct DdlGrammar;

/// 尚未分类的函数签名（分类需要整份文件的区段与 CAST 信息）
struct RawFunction {
    name: String,
    params: Vec<Param>,
    defaults: Vec<String>,
    return_type: String,
    symbol: String,
    text: String,
    line: usize,
    span: Span,
}

pub fn parse_ddl(src: &str, file: FileId, tables: &CategoryTable) -> Result<DdlUnit> {
    let mut pairs = DdlGrammar::parse(Rule::ddl_file, src)?;
    let root = pairs.next().ok_or_else(|| anyhow!("empty ddl file"))?;

    let mut unit = DdlUnit::default();
    let mut raw = Vec::new();

    for it in root.into_inner() {
        match it.as_rule() {
            Rule::section_mark => {
                let line = line_of(src, it.as_span().start());
                if let Some(label) = it.into_inner().find(|p| p.as_rule() == Rule::section_label) {
                    unit.marks.push(SectionMark { label: label.as_str().trim().to_string(), line });
                }
            }
            Rule::create_function => {
                // 个别语句不完整时跳过，不影响整个文件
                if let Some(f) = build_function(it, src, file) {
                    raw.push(f);
                }
            }
            Rule::create_cast => unit.casts.extend(build_cast(it)),
            Rule::create_type => {
                if let Some(name) = it.into_inner().find(|p| p.as_rule() == Rule::ident) {
                    unit.types.push(name.as_str().to_string());
                }
            }
            Rule::create_operator => unit.operators.extend(build_operator(it)),
            _ => {}
        }
    }

    for f in raw {
        let category = categorize(&unit.marks, f.line);
        let is_cast = is_cast_function(&f.name, &f.symbol, &f.params, &unit.casts, tables);
        let operator_symbol = unit
            .operators
            .iter()
            .find(|op| operator_matches(op, &f.name, &f.params))
            .map(|op| op.symbol.clone());
        unit.decls.push(FunctionDeclaration {
            is_operator: tables.is_operator(&category),
            is_aggregate: tables.is_aggregate(&category),
            is_cast,
            operator_symbol,
            category,
            name: f.name,
            return_type: f.return_type,
            params: f.params,
            defaults: f.defaults,
            symbol: f.symbol,
            sql_definition: f.text,
            line: f.line,
            span: f.span,
        });
    }

    Ok(unit)
}

fn build_function(p: Pair<Rule>, src: &str, file: FileId) -> Option<RawFunction> {
    let s = p.as_span();
    let mut name = None;
    let mut params_text = "";
    let mut return_type = None;
    let mut quoted = Vec::new();

    for child in p.clone().into_inner() {
        match child.as_rule() {
            Rule::ident       => name = Some(child.as_str().to_string()),
            Rule::param_text  => params_text = child.as_str(),
            Rule::return_type => return_type = Some(child.as_str().to_string()),
            Rule::quoted      => quoted.push(child.as_str().trim_matches('\'').to_string()),
            _ => {}
        }
    }

    // AS 'path', 'SYMBOL'：取第二个字符串
    let symbol = quoted.get(1).filter(|s| !s.trim().is_empty())?.trim().to_string();
    let (params, defaults) = parse_parameters(params_text);

    Some(RawFunction {
        name: name?,
        params,
        defaults,
        return_type: return_type?,
        symbol,
        text: p.as_str().to_string(),
        line: line_of(src, s.start()),
        span: Span::new(file, s.start(), s.end()),
    })
}

/// `TYPE [NAME]` 列表；带默认值的参数被丢弃，只保留默认字面量
pub fn parse_parameters(params_str: &str) -> (Vec<Param>, Vec<String>) {
    let mut params = Vec::new();
    let mut defaults = Vec::new();

    for seg in split_top_level(params_str) {
        if let Some(default) = default_value(seg) {
            defaults.push(default);
            continue;
        }
        let mut words = seg.split_whitespace();
        let Some(ty) = words.next() else { continue };
        let name = match words.next() {
            Some(n) => n.to_string(),
            None => format!("arg{}", params.len()),
        };
        params.push(Param { ty: ty.to_string(), name });
    }
    (params, defaults)
}

/// `x int DEFAULT 15` / `x int = 15` -> Some("15")
fn default_value(seg: &str) -> Option<String> {
    if let Some((_, rhs)) = seg.split_once('=') {
        return Some(rhs.trim().to_string());
    }
    let lower = seg.to_ascii_lowercase();
    let mut offset = 0usize;
    for w in lower.split_whitespace() {
        let at = offset + lower[offset..].find(w)?;
        offset = at + w.len();
        if w == "default" {
            return Some(seg[offset..].trim().to_string());
        }
    }
    None
}

/// 分类 = 行号不超过声明行的最大区段标记；之前没有任何标记时为 "unknown"
pub fn categorize(marks: &[SectionMark], line: usize) -> String {
    marks
        .iter()
        .filter(|m| m.line <= line)
        .max_by_key(|m| m.line)
        .map(|m| m.key())
        .unwrap_or_else(|| "unknown".to_string())
}

fn is_cast_function(
    name: &str,
    symbol: &str,
    params: &[Param],
    casts: &[CastRelation],
    tables: &CategoryTable,
) -> bool {
    let matches_cast = casts.iter().any(|c| {
        c.function == name
            && c.function_args.len() == params.len()
            && c.function_args.iter().zip(params).all(|(a, p)| *a == p.ty)
    });
    matches_cast || tables.has_io_suffix(symbol)
}

fn build_cast(p: Pair<Rule>) -> Option<CastRelation> {
    let mut idents = Vec::new();
    let mut args = "";
    for child in p.into_inner() {
        match child.as_rule() {
            Rule::ident     => idents.push(child.as_str().to_string()),
            Rule::cast_args => args = child.as_str(),
            _ => {}
        }
    }
    // (SRC AS DST) WITH FUNCTION SYM(ARGS) [AS IMPLICIT]
    let mut it = idents.into_iter();
    let source = it.next()?;
    let target = it.next()?;
    let function = it.next()?;
    let function_args = args
        .split(',')
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(str::to_string)
        .collect();
    Some(CastRelation { source, target, function, function_args })
}

fn build_operator(p: Pair<Rule>) -> Option<OperatorDef> {
    let mut symbol = None;
    let mut procedure = None;
    let mut left = None;
    let mut right = None;

    for child in p.into_inner() {
        match child.as_rule() {
            Rule::op_symbol => symbol = Some(child.as_str().to_string()),
            Rule::op_attr => {
                let mut kv = child.into_inner();
                let key = kv.next()?.as_str().to_ascii_lowercase();
                let value = kv.next()?.as_str().trim().to_string();
                match key.as_str() {
                    "procedure" | "function" => procedure = Some(value),
                    "leftarg" => left = Some(value),
                    "rightarg" => right = Some(value),
                    _ => {}
                }
            }
            _ => {}
        }
    }
    Some(OperatorDef { symbol: symbol?, procedure: procedure?, left, right })
}

fn operator_matches(op: &OperatorDef, name: &str, params: &[Param]) -> bool {
    if op.procedure != name {
        return false;
    }
    let args: Vec<&str> = op.left.iter().chain(op.right.iter()).map(String::as_str).collect();
    args.len() == params.len() && args.iter().zip(params).all(|(a, p)| *a == p.ty)
}
