// src/middle/tables.rs
//! 静态查找表：SQL 类型 -> 宿主类型、宏后缀 -> C 类型、区段 -> 分类。
//! 启动时构建一次，之后只读，显式传给解析器与发射器。

use crate::utils::fast::{fast_map, fast_set, FastMap, FastSet};

/* ================================
 * 类型映射
 * ================================ */

/// 不透明类型的字节长度来源
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BlobSize {
    /// `sizeof(Struct)`
    Fixed(String),
    /// `VARSIZE(ptr)`
    Varlena,
}

impl BlobSize {
    /// `"varlena"` / `"fixed:TBox"`
    pub fn parse(s: &str) -> Option<BlobSize> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("varlena") {
            return Some(BlobSize::Varlena);
        }
        let name = s.strip_prefix("fixed:")?.trim();
        (!name.is_empty()).then(|| BlobSize::Fixed(name.to_string()))
    }

    pub fn size_expr(&self, var: &str) -> String {
        match self {
            BlobSize::Fixed(s) => format!("sizeof({s})"),
            BlobSize::Varlena => format!("VARSIZE({var})"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CustomType {
    pub c_type: String,
    pub size: BlobSize,
}

impl CustomType {
    fn new(c_type: &str, size: BlobSize) -> Self {
        Self { c_type: c_type.to_string(), size }
    }
}

/// 参数在闭包里如何物化
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArgRepr {
    /// 分配 + 拷贝字节
    Opaque,
    Timestamp,
    Interval,
    /// 先物化为 std::string
    Text,
    Scalar,
}

/// 返回值如何写回输出批
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetRepr {
    Blob,
    Timestamp,
    CString,
    Text,
    Scalar,
}

const SCALARS: &[(&str, &str)] = &[
    ("boolean", "bool"),
    ("bool", "bool"),
    ("smallint", "int16_t"),
    ("int2", "int16_t"),
    ("integer", "int32_t"),
    ("int", "int32_t"),
    ("int4", "int32_t"),
    ("bigint", "int64_t"),
    ("int8", "int64_t"),
    ("real", "float"),
    ("float4", "float"),
    ("float", "double"),
    ("float8", "double"),
    ("double precision", "double"),
    ("timestamptz", "timestamp_tz_t"),
    ("timestamp", "timestamp_t"),
    ("date", "date_t"),
    ("interval", "interval_t"),
    ("text", "string_t"),
    ("cstring", "string_t"),
    ("varchar", "string_t"),
];

const KINDS: &[(&str, &str)] = &[
    ("TBOX_P", "TBox *"),
    ("STBOX_P", "STBox *"),
    ("SPAN_P", "Span *"),
    ("SET_P", "Set *"),
    ("SPANSET_P", "SpanSet *"),
    ("TEMPORAL_P", "Temporal *"),
    ("INTERVAL_P", "MeosInterval *"),
    ("TIMESTAMPTZ", "TimestampTz"),
    ("DATEADT", "DateADT"),
    ("BOOL", "bool"),
    ("INT16", "int16"),
    ("INT32", "int32"),
    ("INT64", "int64"),
    ("FLOAT8", "double"),
    ("CSTRING", "char *"),
    ("TEXT_P", "text *"),
    ("BYTEA_P", "bytea *"),
    ("DATUM", "Datum"),
];

/// SQL 类型名 -> 宿主类型
#[derive(Clone, Debug)]
pub struct TypeMap {
    scalar: FastMap<String, String>,
    custom: FastMap<String, CustomType>,
    kinds: FastMap<String, String>,
}

impl Default for TypeMap {
    fn default() -> Self {
        let mut tm = TypeMap { scalar: fast_map(), custom: fast_map(), kinds: fast_map() };
        for (sql, host) in SCALARS {
            tm.scalar.insert((*sql).to_string(), (*host).to_string());
        }
        for (kind, c) in KINDS {
            tm.kinds.insert((*kind).to_string(), (*c).to_string());
        }

        let temporal = ["tint", "tfloat", "tbool", "ttext", "tgeometry", "tgeompoint"];
        let spans = ["intspan", "bigintspan", "floatspan", "datespan", "tstzspan"];
        let sets = ["intset", "bigintset", "floatset", "textset", "dateset", "tstzset"];
        let spansets = ["intspanset", "bigintspanset", "floatspanset", "textspanset", "datespanset", "tstzspanset"];

        for t in temporal {
            tm.custom.insert(t.to_string(), CustomType::new("Temporal *", BlobSize::Varlena));
        }
        for t in spans {
            tm.custom.insert(t.to_string(), CustomType::new("Span *", BlobSize::Fixed("Span".into())));
        }
        for t in sets {
            tm.custom.insert(t.to_string(), CustomType::new("Set *", BlobSize::Varlena));
        }
        for t in spansets {
            tm.custom.insert(t.to_string(), CustomType::new("SpanSet *", BlobSize::Varlena));
        }
        tm.custom.insert("tbox".into(), CustomType::new("TBox *", BlobSize::Fixed("TBox".into())));
        tm.custom.insert("stbox".into(), CustomType::new("STBox *", BlobSize::Fixed("STBox".into())));
        tm.custom.insert("bytea".into(), CustomType::new("bytea *", BlobSize::Varlena));
        tm
    }
}

impl TypeMap {
    pub fn add_scalar(&mut self, sql: &str, host: &str) {
        self.scalar.insert(sql.trim().to_ascii_lowercase(), host.trim().to_string());
    }

    pub fn add_custom(&mut self, sql: &str, ty: CustomType) {
        self.custom.insert(sql.trim().to_ascii_lowercase(), ty);
    }

    /// `CREATE TYPE` 声明的类型：未知的按变长不透明类型处理
    pub fn declare_types<'a>(&mut self, names: impl IntoIterator<Item = &'a String>) {
        for n in names {
            let key = n.trim().to_ascii_lowercase();
            if !self.scalar.contains_key(&key) && !self.custom.contains_key(&key) {
                self.custom.insert(key, CustomType::new("void *", BlobSize::Varlena));
            }
        }
    }

    #[inline]
    pub fn is_custom(&self, sql: &str) -> bool {
        self.custom.contains_key(&sql.trim().to_ascii_lowercase())
    }

    pub fn custom(&self, sql: &str) -> Option<&CustomType> {
        self.custom.get(&sql.trim().to_ascii_lowercase())
    }

    /// 向量化执行器的元素类型；不透明类型一律是 `string_t`
    pub fn executor_type(&self, sql: &str) -> Option<&str> {
        let key = sql.trim().to_ascii_lowercase();
        if self.custom.contains_key(&key) {
            return Some("string_t");
        }
        self.scalar.get(&key).map(String::as_str)
    }

    /// 宏后缀 -> C 类型（`TBOX_P` -> `TBox *`）
    pub fn kind_ctype(&self, kind: &str) -> Option<&str> {
        self.kinds.get(kind).map(String::as_str)
    }

    pub fn arg_repr(&self, sql: &str) -> ArgRepr {
        let key = sql.trim().to_ascii_lowercase();
        if self.custom.contains_key(&key) {
            return ArgRepr::Opaque;
        }
        match key.as_str() {
            "timestamptz" => ArgRepr::Timestamp,
            "interval" => ArgRepr::Interval,
            "text" | "cstring" | "varchar" => ArgRepr::Text,
            _ => ArgRepr::Scalar,
        }
    }

    pub fn ret_repr(&self, sql: &str) -> RetRepr {
        let key = sql.trim().to_ascii_lowercase();
        if self.custom.contains_key(&key) {
            return RetRepr::Blob;
        }
        match key.as_str() {
            "timestamptz" => RetRepr::Timestamp,
            "cstring" => RetRepr::CString,
            "text" | "varchar" => RetRepr::Text,
            _ => RetRepr::Scalar,
        }
    }
}

/* ================================
 * 分类表
 * ================================ */

#[derive(Clone, Debug)]
pub struct CategoryTable {
    operator: FastSet<String>,
    aggregate: FastSet<String>,
    excluded: FastSet<String>,
    wire_markers: Vec<String>,
    io_suffixes: Vec<String>,
}

impl Default for CategoryTable {
    fn default() -> Self {
        let set = |xs: &[&str]| {
            let mut s = fast_set();
            s.extend(xs.iter().map(|x| x.to_string()));
            s
        };
        CategoryTable {
            operator: set(&["topological", "position", "set", "comparison"]),
            aggregate: set(&["extent"]),
            excluded: set(&["selectivity", "topological", "position", "set", "extent", "comparison"]),
            wire_markers: vec!["_send".into(), "_recv".into()],
            io_suffixes: vec!["_in".into(), "_out".into()],
        }
    }
}

impl CategoryTable {
    #[inline]
    pub fn is_operator(&self, category: &str) -> bool {
        self.operator.contains(category)
    }

    #[inline]
    pub fn is_aggregate(&self, category: &str) -> bool {
        self.aggregate.contains(category)
    }

    /// 不生成普通包装的分类
    #[inline]
    pub fn is_excluded(&self, category: &str) -> bool {
        self.excluded.contains(category)
    }

    /// 二进制收发函数（`tbox_send` / `Tbox_recv`）
    pub fn has_wire_marker(&self, symbol: &str) -> bool {
        let s = symbol.to_ascii_lowercase();
        self.wire_markers.iter().any(|m| s.contains(m.as_str()))
    }

    /// 输入/输出函数后缀（大小写不敏感）
    pub fn has_io_suffix(&self, symbol: &str) -> bool {
        let s = symbol.to_ascii_lowercase();
        self.io_suffixes.iter().any(|m| s.ends_with(m.as_str()))
    }
}
