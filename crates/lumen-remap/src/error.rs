use thiserror::Error;

#[derive(Debug, Error)]
pub enum RemapError {
    #[error("classfile error: {0}")]
    ClassFile(#[from] lumen_classfile::Error),
    /// A lambda-factory call site whose bootstrap arguments do not have the
    /// expected shape. Fatal: rewriting around it would miss the rename.
    #[error("unrecognized lambda bootstrap shape at constant {index}")]
    LambdaShape { index: u16 },
    #[error("malformed manifest: {0}")]
    Manifest(&'static str),
}

pub type Result<T> = std::result::Result<T, RemapError>;
