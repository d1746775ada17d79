// src/backend/emit.rs
//! 模板发射：(声明, 实现, 键) -> 包装函数源码 + 头文件声明

use serde::Deserialize;

use crate::backend::mangle::{is_cast_key, wrapper_name};
use crate::backend::templates::{self as tpl, ExecutorCall};
use crate::error::GenError;
use crate::frontend::ast::*;
use crate::frontend::native::split_assignment;
use crate::frontend::util::rename_idents;
use crate::middle::tables::{ArgRepr, CategoryTable, RetRepr, TypeMap};
use crate::utils::fast::{fast_map, FastMap};

/// 未识别函数体的处理策略
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaceholderPolicy {
    /// 输出占位体并告警
    #[default]
    Warn,
    /// 该单元失败
    Deny,
}

#[derive(Clone, Debug)]
pub struct EmitConfig {
    pub struct_name: String,
    pub placeholder: PlaceholderPolicy,
}

impl Default for EmitConfig {
    fn default() -> Self {
        Self { struct_name: "TemporaryStruct".into(), placeholder: PlaceholderPolicy::Warn }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnitKind {
    Scalar,
    Cast,
}

#[derive(Clone, Debug)]
pub struct EmittedUnit {
    pub decl_name: String,
    pub key: String,
    pub kind: UnitKind,
    /// 生成的 C++ 成员函数名
    pub function: String,
    /// 头文件中的静态成员声明
    pub declaration: String,
    pub source: String,
    /// 函数体是占位符，需要人工补全
    pub placeholder: bool,
}

/// 被跳过的原因（用于 trace）
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Skip {
    Category(String),
    WireFunction,
    CastOnly,
}

pub struct Emitter<'a> {
    pub types: &'a TypeMap,
    pub categories: &'a CategoryTable,
    pub config: &'a EmitConfig,
}

/// 单个闭包：类型参数、返回类型与函数体行
struct Closure {
    executor: &'static str,
    type_params: Vec<String>,
    ret_type: String,
    with_nulls: bool,
    body: Vec<String>,
    placeholder: bool,
}

impl<'a> Emitter<'a> {
    pub fn new(types: &'a TypeMap, categories: &'a CategoryTable, config: &'a EmitConfig) -> Self {
        Self { types, categories, config }
    }

    /// 普通键的跳过规则；`_cast` 键从不跳过
    pub fn skip_reason(&self, decl: &FunctionDeclaration, key: &str) -> Option<Skip> {
        if is_cast_key(key) {
            return None;
        }
        if self.categories.is_excluded(&decl.category) {
            return Some(Skip::Category(decl.category.clone()));
        }
        if self.categories.has_wire_marker(&decl.symbol) {
            return Some(Skip::WireFunction);
        }
        if decl.is_cast_only() {
            return Some(Skip::CastOnly);
        }
        None
    }

    pub fn emit(
        &self,
        decl: &FunctionDeclaration,
        native: &NativeImplementation,
        key: &str,
    ) -> Result<Option<EmittedUnit>, GenError> {
        if self.skip_reason(decl, key).is_some() {
            return Ok(None);
        }

        let kind = if is_cast_key(key) { UnitKind::Cast } else { UnitKind::Scalar };
        let function = wrapper_name(key);
        let closure = self.closure(decl, native, &function, kind)?;
        let struct_name = &self.config.struct_name;

        let (source, declaration) = match kind {
            UnitKind::Scalar => {
                let inputs: Vec<String> = (0..decl.params.len()).map(|i| format!("args.data[{i}]")).collect();
                let call = executor_call(&closure, &inputs, "args.size()");
                (tpl::scalar_func(struct_name, &function, &call), tpl::scalar_decl(&function))
            }
            UnitKind::Cast => {
                let inputs = vec!["source".to_string()];
                let call = executor_call(&closure, &inputs, "count");
                (tpl::cast_func(struct_name, &function, &call), tpl::cast_decl(&function))
            }
        };

        Ok(Some(EmittedUnit {
            decl_name: decl.name.clone(),
            key: key.to_string(),
            kind,
            function,
            declaration,
            source,
            placeholder: closure.placeholder,
        }))
    }

    fn closure(
        &self,
        decl: &FunctionDeclaration,
        native: &NativeImplementation,
        fname: &str,
        kind: UnitKind,
    ) -> Result<Closure, GenError> {
        let arity = decl.params.len();
        let executor = match (kind, arity) {
            (UnitKind::Cast, 1) | (UnitKind::Scalar, 1) => "UnaryExecutor",
            (UnitKind::Scalar, 2) => "BinaryExecutor",
            (UnitKind::Scalar, 3) => "TernaryExecutor",
            (UnitKind::Cast, _) => {
                return Err(GenError::UnsupportedArity { decl: decl.to_string(), arity, expected: "1" });
            }
            (UnitKind::Scalar, _) => {
                return Err(GenError::UnsupportedArity { decl: decl.to_string(), arity, expected: "1..=3" });
            }
        };

        let type_params = decl
            .params
            .iter()
            .map(|p| self.executor_type(decl, &p.ty))
            .collect::<Result<Vec<_>, _>>()?;
        let ret_type = self.executor_type(decl, &decl.return_type)?;

        let renames = output_renames(native);
        let mut body = Vec::new();
        let mut frees: Vec<String> = Vec::new();

        // (i) 参数物化
        for slot in &native.slots {
            let var = rename_idents(&slot.var, &renames);
            let c_type = slot
                .c_type
                .clone()
                .or_else(|| self.types.kind_ctype(&slot.kind).map(str::to_string));

            if slot.index >= arity {
                let Some(default) = decl.defaults.get(slot.index - arity) else {
                    return Err(GenError::MissingSlotBinding {
                        symbol: native.symbol.clone(),
                        var: slot.var.clone(),
                        index: slot.index,
                    });
                };
                body.extend(tpl::plain_arg(c_type.as_deref().unwrap_or("auto"), &var, default));
                continue;
            }

            let i = slot.index;
            let src = format!("args{i}");
            let param_ty = &decl.params[i].ty;
            if slot.kind == "DATUM" {
                body.extend(tpl::datum_arg(&var, &type_params[i], &src));
                continue;
            }
            match self.types.arg_repr(param_ty) {
                ArgRepr::Opaque => {
                    let c = c_type
                        .or_else(|| self.types.custom(param_ty).map(|c| c.c_type.clone()))
                        .unwrap_or_else(|| "void *".into());
                    body.extend(tpl::opaque_arg(&c, &var, &src, fname));
                    frees.push(var);
                }
                ArgRepr::Timestamp => body.extend(tpl::timestamp_arg(&var, &src)),
                ArgRepr::Interval => {
                    body.extend(tpl::interval_arg(&var, &src));
                    frees.push(var);
                }
                ArgRepr::Text => {
                    let as_text = slot.kind == "TEXT_P";
                    body.extend(tpl::text_arg(i, &var, &src, as_text));
                    if as_text {
                        frees.push(var);
                    }
                }
                ArgRepr::Scalar => {
                    let c = c_type.unwrap_or_else(|| type_params[i].clone());
                    body.extend(tpl::plain_arg(&c, &var, &src));
                }
            }
        }

        // (ii) 运行时类型标签
        if native.needs_type_tag {
            let var = native.type_tag_var.as_deref().unwrap_or("basetype");
            let i = native
                .slots
                .iter()
                .find(|s| s.kind == "DATUM" && s.index < arity)
                .map(|s| s.index)
                .unwrap_or(0);
            body.extend(tpl::type_tag(var, &type_params[i], &format!("args{i}")));
        }

        // (iii) 委托调用
        let ret_ctype = self.return_ctype(decl, native);
        let r = |s: &str| rename_idents(s, &renames);
        let mut placeholder = false;
        match &native.shape {
            BodyShape::SingleCall { expr } => {
                body.extend(tpl::plain_arg(&ret_ctype, "ret", &r(expr)));
            }
            BodyShape::PreAssignedCall { c_type, call, .. } => {
                body.extend(tpl::plain_arg(c_type, "ret", &r(call)));
            }
            BodyShape::PreallocatedOutput { setup, call, ret } => {
                body.push(cast_alloc(&r(setup)));
                body.push(r(call));
                bind_ret(&mut body, &mut frees, &ret_ctype, &r(ret));
            }
            BodyShape::NullGuarded { setup, guard, ret } => {
                // 守卫失败时输出缓冲也要释放
                let mut on_null = frees.clone();
                if let Some(setup) = setup {
                    let line = cast_alloc(&r(setup));
                    if allocates(&line, "ret") {
                        on_null.push("ret".to_string());
                    }
                    body.push(line);
                }
                body.extend(tpl::null_guard(&r(guard), &on_null, &ret_type));
                bind_ret(&mut body, &mut frees, &ret_ctype, &r(ret));
            }
            BodyShape::Verbatim { lines, ret } => {
                body.extend(lines.iter().map(|l| cast_alloc(&r(l))));
                bind_ret(&mut body, &mut frees, &ret_ctype, &r(ret));
            }
            BodyShape::Unclassified { .. } => {
                if self.config.placeholder == PlaceholderPolicy::Deny {
                    return Err(GenError::UnclassifiedBody { symbol: native.symbol.clone() });
                }
                placeholder = true;
            }
        }

        // (iv) 输出转换与释放
        body.push(String::new());
        if placeholder {
            body.push(tpl::PLACEHOLDER.to_string());
            body.extend(tpl::frees(&frees));
            body.push(format!("return {ret_type}();"));
        } else {
            body.extend(self.output(decl, &ret_type, &frees));
        }

        Ok(Closure {
            executor,
            type_params,
            ret_type,
            with_nulls: native.nullable,
            body,
            placeholder,
        })
    }

    fn executor_type(&self, decl: &FunctionDeclaration, ty: &str) -> Result<String, GenError> {
        self.types
            .executor_type(ty)
            .map(str::to_string)
            .ok_or_else(|| GenError::UnsupportedType { decl: decl.to_string(), ty: ty.to_string() })
    }

    /// 原生返回值的 C 类型：返回宏后缀 -> 声明返回类型 -> auto
    fn return_ctype(&self, decl: &FunctionDeclaration, native: &NativeImplementation) -> String {
        native
            .return_kind
            .as_deref()
            .and_then(|k| self.types.kind_ctype(k))
            .or_else(|| self.types.custom(&decl.return_type).map(|c| c.c_type.as_str()))
            .unwrap_or("auto")
            .to_string()
    }

    fn output(&self, decl: &FunctionDeclaration, ret_type: &str, frees: &[String]) -> Vec<String> {
        let mut v = Vec::new();
        let mut free_ret = Vec::new();
        match self.types.ret_repr(&decl.return_type) {
            RetRepr::Blob => {
                let size = self
                    .types
                    .custom(&decl.return_type)
                    .map(|c| c.size.size_expr("ret"))
                    .unwrap_or_else(|| "VARSIZE(ret)".into());
                v.push(format!("string_t out = StringVector::AddStringOrBlob(result, (const char *)ret, {size});"));
                free_ret.push("free(ret);".to_string());
            }
            RetRepr::Timestamp => {
                v.push("timestamp_tz_t out = MeosToDuckDBTimestamp((timestamp_tz_t)ret);".into());
            }
            RetRepr::CString => {
                v.push("string_t out = StringVector::AddString(result, ret);".into());
                free_ret.push("free(ret);".to_string());
            }
            RetRepr::Text => {
                v.push("char *ret_str = text2cstring(ret);".into());
                v.push("string_t out = StringVector::AddString(result, ret_str);".into());
                free_ret.push("free(ret_str);".to_string());
                free_ret.push("free(ret);".to_string());
            }
            RetRepr::Scalar => {
                v.push(format!("{ret_type} out = ret;"));
            }
        }
        v.extend(tpl::frees(frees));
        v.extend(free_ret);
        v.push("return out;".into());
        v
    }
}

fn executor_call<'c>(c: &'c Closure, inputs: &'c [String], count: &'c str) -> ExecutorCall<'c> {
    ExecutorCall {
        executor: c.executor,
        with_nulls: c.with_nulls,
        type_params: &c.type_params,
        ret_type: &c.ret_type,
        inputs,
        count,
        body: &c.body,
    }
}

/// 返回表达式不是输出变量本身时补一行 `T ret = expr;`
fn bind_ret(body: &mut Vec<String>, frees: &mut Vec<String>, ret_ctype: &str, expr: &str) {
    if expr == "ret" {
        return;
    }
    body.extend(tpl::plain_arg(ret_ctype, "ret", expr));
    // 直接返回参数缓冲：由输出段统一释放 ret
    frees.retain(|f| f != expr);
}

/// `T *v = malloc(n);` -> `T *v = (T *)malloc(n);`
fn cast_alloc(line: &str) -> String {
    match split_assignment(line) {
        Some((Some(ty), var, rhs)) if ty.ends_with('*') && rhs.starts_with("malloc(") => {
            tpl::plain_arg(&ty, &var, &format!("({ty}){rhs}")).concat()
        }
        _ => line.to_string(),
    }
}

fn allocates(line: &str, var: &str) -> bool {
    matches!(split_assignment(line), Some((_, v, rhs)) if v == var && rhs.contains("malloc("))
}

/// 输出变量统一叫 `ret`；`palloc`/`pfree` 换成 libc
fn output_renames(native: &NativeImplementation) -> FastMap<String, String> {
    let mut m = fast_map();
    m.insert("result".to_string(), "ret".to_string());
    m.insert("palloc".to_string(), "malloc".to_string());
    m.insert("pfree".to_string(), "free".to_string());

    if let Some(v) = native.shape.returned_var() {
        // 直接返回入参时不改名
        if !native.slot_vars().any(|s| s == v) {
            m.insert(v.to_string(), "ret".to_string());
        }
    }
    m
}
