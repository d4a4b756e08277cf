use thiserror::Error;

#[derive(Debug, Error)]
pub enum MappingError {
    /// Any line that does not fit its context: wrong column count, member or
    /// parameter line with no active class/method, unparsable descriptor or
    /// parameter position. Fatal for the whole mapping load.
    #[error("failed to process line: `{line}`")]
    MalformedLine { line: String },
}
