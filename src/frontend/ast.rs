//! 生成器的数据模型：两种方言解析后的结构化结果
//! - 声明方言（SQL DDL）：FunctionDeclaration / SectionMark / CastRelation / OperatorDef
//! - 原生方言（fmgr C 函数体）：NativeImplementation / ArgSlot / BodyShape
//!
//! 所有节点创建后不再修改。

use std::fmt;
use crate::frontend::span::Span;

/* =========================
 *        声明方言
 * ========================= */

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Param {
    pub ty: String,
    pub name: String,
}

#[derive(Clone, Debug)]
pub struct FunctionDeclaration {
    pub name: String,
    pub return_type: String,
    pub params: Vec<Param>,
    /// 带默认值而被丢弃的参数的默认字面量（按出现顺序，位于 params 之后）
    pub defaults: Vec<String>,
    /// 实现该函数的原生符号（`AS 'path', 'SYMBOL'` 中的 SYMBOL）
    pub symbol: String,
    pub sql_definition: String,
    pub category: String,
    pub is_operator: bool,
    pub is_aggregate: bool,
    pub is_cast: bool,
    pub operator_symbol: Option<String>,
    /// 1 起始的行号
    pub line: usize,
    pub span: Span,
}

impl FunctionDeclaration {
    pub fn param_types(&self) -> Vec<&str> {
        self.params.iter().map(|p| p.ty.as_str()).collect()
    }

    /// 只能作为类型转换存在的函数：输入/输出函数（签名里出现 cstring）
    pub fn is_cast_only(&self) -> bool {
        self.is_cast
            && (self.return_type.eq_ignore_ascii_case("cstring")
                || self.params.iter().any(|p| p.ty.eq_ignore_ascii_case("cstring")))
    }
}

impl fmt::Display for FunctionDeclaration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (i, p) in self.params.iter().enumerate() {
            if i > 0 { write!(f, ", ")?; }
            write!(f, "{}", p.ty)?;
        }
        write!(f, ") -> {} [{}]", self.return_type, self.symbol)
    }
}

/// 区段标记：形如
/// ```text
/// /*****************************************************************************
///  * Conversion functions
///  *****************************************************************************/
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SectionMark {
    pub label: String,
    pub line: usize,
}

impl SectionMark {
    /// 区段键：标签首个单词的小写形式
    pub fn key(&self) -> String {
        self.label
            .split_whitespace()
            .next()
            .unwrap_or("")
            .to_ascii_lowercase()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CastRelation {
    pub source: String,
    pub target: String,
    pub function: String,
    pub function_args: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OperatorDef {
    pub symbol: String,
    pub procedure: String,
    pub left: Option<String>,
    pub right: Option<String>,
}

/// 单个 DDL 文件的解析结果
#[derive(Clone, Debug, Default)]
pub struct DdlUnit {
    pub decls: Vec<FunctionDeclaration>,
    pub marks: Vec<SectionMark>,
    pub casts: Vec<CastRelation>,
    pub types: Vec<String>,
    pub operators: Vec<OperatorDef>,
}

/* =========================
 *        原生方言
 * ========================= */

/// `TYPE var = (CAST) PG_GETARG_KIND(index)`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArgSlot {
    /// 宏后缀，如 `TBOX_P`、`INT32`
    pub kind: String,
    pub var: String,
    pub index: usize,
    /// 显式类型或强转文本
    pub c_type: Option<String>,
}

/// 被委托的原生调用：`name(args)`；裸项时 name 为空，args 只有一项
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallExpr {
    pub name: Option<String>,
    pub args: Vec<String>,
}

impl CallExpr {
    pub fn bare(term: &str) -> Self {
        Self { name: None, args: vec![term.to_string()] }
    }

    /// 裸标识符（直接透传先前计算出的值）
    pub fn bare_ident(&self) -> Option<&str> {
        match (&self.name, self.args.as_slice()) {
            (None, [t]) if is_ident(t) => Some(t.as_str()),
            _ => None,
        }
    }
}

impl fmt::Display for CallExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(n) => write!(f, "{}({})", n, self.args.join(", ")),
            None => write!(f, "{}", self.args.join(", ")),
        }
    }
}

/// 原生函数体的结构形态（按处理行数与可空性分类，解析时计算一次）
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BodyShape {
    /// 1 行：`PG_RETURN_X(call(...))`
    SingleCall { expr: String },
    /// 2 行：`T v = call(...);` + `PG_RETURN_X(v)`
    PreAssignedCall { c_type: String, var: String, call: String },
    /// 3 行：预分配输出缓冲，按引用传入调用；`ret` 为返回宏内的表达式
    PreallocatedOutput { setup: String, call: String, ret: String },
    /// 可空：带空值守卫的调用（3 行时没有 setup）
    NullGuarded { setup: Option<String>, guard: String, ret: String },
    /// 4 行且不可空：原样复制处理行
    Verbatim { lines: Vec<String>, ret: String },
    /// 其余形态：留给人工补全
    Unclassified { lines: Vec<String> },
}

impl BodyShape {
    /// 返回宏里直接透传的变量名
    pub fn returned_var(&self) -> Option<&str> {
        match self {
            BodyShape::PreAssignedCall { var, .. } => Some(var.as_str()),
            BodyShape::PreallocatedOutput { ret, .. }
            | BodyShape::NullGuarded { ret, .. }
            | BodyShape::Verbatim { ret, .. } => Some(ret.as_str()).filter(|r| is_ident(r)),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            BodyShape::SingleCall { .. } => "single-call",
            BodyShape::PreAssignedCall { .. } => "pre-assigned-call",
            BodyShape::PreallocatedOutput { .. } => "pre-allocated-output",
            BodyShape::NullGuarded { .. } => "null-guarded-call",
            BodyShape::Verbatim { .. } => "verbatim-block",
            BodyShape::Unclassified { .. } => "unclassified",
        }
    }
}

#[derive(Clone, Debug)]
pub struct NativeImplementation {
    pub symbol: String,
    /// 已按 index 升序排列
    pub slots: Vec<ArgSlot>,
    pub needs_type_tag: bool,
    /// `meosType <var> = ...` 中的变量名
    pub type_tag_var: Option<String>,
    pub delegated: Option<CallExpr>,
    pub return_kind: Option<String>,
    pub nullable: bool,
    pub body: String,
    pub shape: BodyShape,
    pub span: Span,
}

impl NativeImplementation {
    pub fn slot_vars(&self) -> impl Iterator<Item = &str> {
        self.slots.iter().map(|s| s.var.as_str())
    }
}

pub fn is_ident(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
