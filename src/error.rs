// src/error.rs
//! 单元级生成错误：由编排器逐单元捕获、记录，批处理继续

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum GenError {
    #[error("unsupported type `{ty}` in `{decl}`")]
    UnsupportedType { decl: String, ty: String },

    #[error("unsupported arity {arity} for `{decl}` (expected {expected})")]
    UnsupportedArity { decl: String, arity: usize, expected: &'static str },

    #[error("native slot {index} (`{var}`) of `{symbol}` has no declared parameter or default")]
    MissingSlotBinding { symbol: String, var: String, index: usize },

    #[error("native body of `{symbol}` has no recognized shape")]
    UnclassifiedBody { symbol: String },

    #[error("disambiguation key `{key}` is produced by both `{first}` and `{second}`")]
    KeyCollision { key: String, first: String, second: String },
}

impl GenError {
    /// 诊断码
    pub fn code(&self) -> &'static str {
        match self {
            GenError::UnsupportedType { .. } => "E0101",
            GenError::UnsupportedArity { .. } => "E0102",
            GenError::MissingSlotBinding { .. } => "E0103",
            GenError::UnclassifiedBody { .. } => "E0104",
            GenError::KeyCollision { .. } => "E0201",
        }
    }
}
