// src/backend/templates.rs
//! 目标 C++ 文本骨架。只负责拼接，不做任何判断。

use std::fmt::Write as _;

const IND: &str = "    ";

pub const DEFAULT_INCLUDES: &[&str] = &[
    "meos_wrapper_simple.hpp",
    "common.hpp",
    "time_util.hpp",
    "type_util.hpp",
    "tydef.hpp",
    "duckdb/common/exception.hpp",
];

const HEADER_INCLUDES: &[&str] = &[
    "meos_wrapper_simple.hpp",
    "duckdb/common/typedefs.hpp",
    "duckdb/function/scalar_function.hpp",
];

/// 执行器调用：`XExecutor::Execute[WithNulls]<T..., R>(inputs, result, count, [&](...) { body });`
pub struct ExecutorCall<'a> {
    pub executor: &'a str,
    pub with_nulls: bool,
    pub type_params: &'a [String],
    pub ret_type: &'a str,
    pub inputs: &'a [String],
    pub count: &'a str,
    pub body: &'a [String],
}

impl ExecutorCall<'_> {
    pub fn render(&self, depth: usize) -> String {
        let pad = IND.repeat(depth);
        let mut lambda: Vec<String> = self
            .type_params
            .iter()
            .enumerate()
            .map(|(i, t)| format!("{t} args{i}"))
            .collect();
        if self.with_nulls {
            lambda.push("ValidityMask &mask".into());
            lambda.push("idx_t idx".into());
        }

        let mut s = String::new();
        let _ = writeln!(
            s,
            "{pad}{}::Execute{}<{}, {}>(",
            self.executor,
            if self.with_nulls { "WithNulls" } else { "" },
            self.type_params.join(", "),
            self.ret_type
        );
        let _ = writeln!(s, "{pad}{IND}{}, result, {},", self.inputs.join(", "), self.count);
        let _ = writeln!(s, "{pad}{IND}[&]({}) {{", lambda.join(", "));
        for line in self.body {
            if line.is_empty() {
                s.push('\n');
            } else {
                let _ = writeln!(s, "{pad}{IND}{IND}{line}");
            }
        }
        let _ = writeln!(s, "{pad}{IND}}}");
        let _ = writeln!(s, "{pad});");
        s
    }
}

pub fn scalar_func(struct_name: &str, name: &str, call: &ExecutorCall) -> String {
    let mut s = String::new();
    let _ = writeln!(
        s,
        "void {struct_name}::{name}(DataChunk &args, ExpressionState &state, Vector &result) {{"
    );
    s.push_str(&call.render(1));
    let _ = writeln!(s, "{IND}if (args.size() == 1) {{");
    let _ = writeln!(s, "{IND}{IND}result.SetVectorType(VectorType::CONSTANT_VECTOR);");
    let _ = writeln!(s, "{IND}}}");
    s.push_str("}\n");
    s
}

pub fn cast_func(struct_name: &str, name: &str, call: &ExecutorCall) -> String {
    let mut s = String::new();
    let _ = writeln!(
        s,
        "bool {struct_name}::{name}(Vector &source, Vector &result, idx_t count, CastParameters &parameters) {{"
    );
    let _ = writeln!(s, "{IND}bool success = true;");
    let _ = writeln!(s, "{IND}try {{");
    s.push_str(&call.render(2));
    let _ = writeln!(s, "{IND}}} catch (const std::exception &e) {{");
    let _ = writeln!(s, "{IND}{IND}HandleCastError::AssignError(e.what(), parameters);");
    let _ = writeln!(s, "{IND}{IND}success = false;");
    let _ = writeln!(s, "{IND}}}");
    let _ = writeln!(s, "{IND}return success;");
    s.push_str("}\n");
    s
}

pub fn scalar_decl(name: &str) -> String {
    format!("static void {name}(DataChunk &args, ExpressionState &state, Vector &result);")
}

pub fn cast_decl(name: &str) -> String {
    format!("static bool {name}(Vector &source, Vector &result, idx_t count, CastParameters &parameters);")
}

pub fn header_file(struct_name: &str, decls: &[String]) -> String {
    let mut s = String::from("#pragma once\n\n");
    for inc in HEADER_INCLUDES {
        let _ = writeln!(s, "#include \"{inc}\"");
    }
    let _ = writeln!(s, "\nnamespace duckdb {{\n");
    let _ = writeln!(s, "struct {struct_name} {{");
    for d in decls {
        let _ = writeln!(s, "\t{d}");
    }
    let _ = writeln!(s, "}};\n");
    s.push_str("} // namespace duckdb\n");
    s
}

pub fn source_file(includes: &[String], module: &str, bodies: &[String]) -> String {
    let mut s = String::new();
    for inc in includes {
        let _ = writeln!(s, "#include \"{inc}\"");
    }
    let _ = writeln!(s, "#include \"gen/{module}.hpp\"");
    let _ = writeln!(s, "\nnamespace duckdb {{");
    for b in bodies {
        s.push('\n');
        s.push_str(b);
    }
    s.push_str("\n} // namespace duckdb\n");
    s
}

/* ================================
 * 闭包片段
 * ================================ */

/// 不透明参数：分配并拷贝字节
pub fn opaque_arg(c_type: &str, var: &str, src: &str, fname: &str) -> Vec<String> {
    vec![
        format!("{c_type}{sp}{var} = nullptr;", sp = ptr_space(c_type)),
        format!("if ({src}.GetSize() > 0) {{"),
        format!("{IND}{var} = ({c_type})malloc({src}.GetSize());"),
        format!("{IND}memcpy({var}, {src}.GetDataUnsafe(), {src}.GetSize());"),
        "}".into(),
        format!("if (!{var}) {{"),
        format!("{IND}throw InternalException(\"Failure in {fname}: unable to cast binary to {c_type}\");"),
        "}".into(),
    ]
}

pub fn timestamp_arg(var: &str, src: &str) -> Vec<String> {
    vec![format!("TimestampTz {var} = (TimestampTz) DuckDBToMeosTimestamp({src});")]
}

pub fn interval_arg(var: &str, src: &str) -> Vec<String> {
    vec![format!("MeosInterval *{var} = IntervaltToInterval({src});")]
}

/// 文本参数：先落成 std::string；`as_text` 时再转成 varlena text
pub fn text_arg(slot: usize, var: &str, src: &str, as_text: bool) -> Vec<String> {
    let mut v = vec![format!("std::string input_{slot}({src}.GetDataUnsafe(), {src}.GetSize());")];
    if as_text {
        v.push(format!("text *{var} = cstring2text(input_{slot}.c_str());"));
    } else {
        v.push(format!("const char *{var} = input_{slot}.c_str();"));
    }
    v
}

pub fn datum_arg(var: &str, elem_ty: &str, src: &str) -> Vec<String> {
    vec![format!("Datum {var} = DataHelpers::getDatum<{elem_ty}>({src});")]
}

pub fn type_tag(var: &str, elem_ty: &str, src: &str) -> Vec<String> {
    vec![format!("meosType {var} = DataHelpers::getMeosType<{elem_ty}>({src});")]
}

pub fn plain_arg(c_type: &str, var: &str, value: &str) -> Vec<String> {
    vec![format!("{c_type}{sp}{var} = {value};", sp = ptr_space(c_type))]
}

pub fn null_guard(cond: &str, frees: &[String], ret_type: &str) -> Vec<String> {
    let mut v = vec![format!("if ({cond}) {{")];
    v.extend(frees.iter().map(|f| format!("{IND}free({f});")));
    v.push(format!("{IND}mask.SetInvalid(idx);"));
    v.push(format!("{IND}return {ret_type}();"));
    v.push("}".into());
    v
}

pub fn frees(vars: &[String]) -> Vec<String> {
    vars.iter().map(|f| format!("free({f});")).collect()
}

pub const PLACEHOLDER: &str = "// TODO: handle this case";

/// `TBox *` 后不再补空格
fn ptr_space(c_type: &str) -> &'static str {
    if c_type.ends_with('*') { "" } else { " " }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unary_scalar_wrapper_layout() {
        let tps = vec!["string_t".to_string()];
        let inputs = vec!["args.data[0]".to_string()];
        let body = vec!["return true;".to_string()];
        let call = ExecutorCall {
            executor: "UnaryExecutor",
            with_nulls: false,
            type_params: &tps,
            ret_type: "bool",
            inputs: &inputs,
            count: "args.size()",
            body: &body,
        };
        let out = scalar_func("TboxFunctions", "Tbox_hasx", &call);
        assert!(out.starts_with("void TboxFunctions::Tbox_hasx(DataChunk &args, ExpressionState &state, Vector &result) {\n"));
        assert!(out.contains("    UnaryExecutor::Execute<string_t, bool>(\n"));
        assert!(out.contains("        args.data[0], result, args.size(),\n"));
        assert!(out.contains("        [&](string_t args0) {\n            return true;\n"));
        assert!(out.contains("result.SetVectorType(VectorType::CONSTANT_VECTOR);"));
    }

    #[test]
    fn cast_wrapper_returns_false_on_failure() {
        let tps = vec!["string_t".to_string()];
        let inputs = vec!["source".to_string()];
        let call = ExecutorCall {
            executor: "UnaryExecutor",
            with_nulls: true,
            type_params: &tps,
            ret_type: "string_t",
            inputs: &inputs,
            count: "count",
            body: &[],
        };
        let out = cast_func("S", "Tbox_in_cast", &call);
        assert!(out.contains("ExecuteWithNulls<string_t, string_t>("));
        assert!(out.contains("source, result, count,"));
        assert!(out.contains("[&](string_t args0, ValidityMask &mask, idx_t idx)"));
        assert!(out.contains("success = false;"));
        assert!(out.trim_end().ends_with("return success;\n}"));
    }

    #[test]
    fn opaque_argument_block() {
        let lines = opaque_arg("TBox *", "box", "args0", "Tbox_xmin");
        assert_eq!(lines[0], "TBox *box = nullptr;");
        assert_eq!(lines[2], "    box = (TBox *)malloc(args0.GetSize());");
        assert!(lines[6].contains("unable to cast binary to TBox *"));
    }

    #[test]
    fn files() {
        let h = header_file("S", &[scalar_decl("F")]);
        assert!(h.contains("struct S {\n\tstatic void F(DataChunk &args, ExpressionState &state, Vector &result);\n};"));
        let c = source_file(&["a.hpp".to_string()], "gen_mod", &["void S::F() {}\n".to_string()]);
        assert!(c.starts_with("#include \"a.hpp\"\n#include \"gen/gen_mod.hpp\"\n"));
        assert!(c.ends_with("} // namespace duckdb\n"));
    }
}
