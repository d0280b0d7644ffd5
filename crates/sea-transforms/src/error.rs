use thiserror::Error;

/// A stage could not establish its postcondition on the module.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{}{message}{}", function_prefix(.function), code_suffix(.code))]
pub struct TransformError {
    pub message: String,
    pub function: Option<String>,
    pub code: Option<String>,
}

impl TransformError {
    pub fn in_function(mut self, function: impl Into<String>) -> Self {
        if self.function.is_none() {
            self.function = Some(function.into());
        }
        self
    }
}

fn function_prefix(function: &Option<String>) -> String {
    function
        .as_ref()
        .map(|function| format!("in function `{}`: ", function))
        .unwrap_or_default()
}

fn code_suffix(code: &Option<String>) -> String {
    code.as_ref()
        .map(|code| format!(" ({})", code))
        .unwrap_or_default()
}

pub type Result<T> = std::result::Result<T, TransformError>;

pub fn transform_error(message: impl Into<String>) -> TransformError {
    TransformError {
        message: message.into(),
        function: None,
        code: None,
    }
}

pub fn transform_error_with_code(
    message: impl Into<String>,
    code: impl Into<String>,
) -> TransformError {
    TransformError {
        message: message.into(),
        function: None,
        code: Some(code.into()),
    }
}

/// Return early with a transform error.
#[macro_export]
macro_rules! transform_bail {
    ($message:expr) => {
        return Err($crate::error::transform_error($message))
    };
    ($message:expr, $code:expr) => {
        return Err($crate::error::transform_error_with_code($message, $code))
    };
}

/// Ensure a condition holds, or return a transform error.
#[macro_export]
macro_rules! transform_ensure {
    ($cond:expr, $message:expr) => {
        if !($cond) {
            $crate::transform_bail!($message);
        }
    };
    ($cond:expr, $message:expr, $code:expr) => {
        if !($cond) {
            $crate::transform_bail!($message, $code);
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checked(value: i64) -> Result<i64> {
        transform_ensure!(value >= 0, "negative input", "test::negative");
        Ok(value)
    }

    #[test]
    fn ensure_reports_code_and_function() {
        let err = checked(-1).unwrap_err().in_function("main");
        assert_eq!(
            err.to_string(),
            "in function `main`: negative input (test::negative)"
        );
        assert_eq!(checked(2), Ok(2));
    }
}
