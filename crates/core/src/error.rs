use thiserror::Error;

/// A failure reported by the host environment (browser API, DOM).
///
/// `name` carries the `DOMException` name when the host provides one, e.g.
/// `NotAllowedError` when the user dismisses the permission prompt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", describe(.name, .message))]
pub struct HostFailure {
    pub name: Option<String>,
    pub message: String,
}

impl HostFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            name: None,
            message: message.into(),
        }
    }

    pub fn named(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            message: message.into(),
        }
    }
}

fn describe(name: &Option<String>, message: &str) -> String {
    match name {
        Some(name) if !message.is_empty() => format!("{name}: {message}"),
        Some(name) => name.clone(),
        None => message.to_owned(),
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CaptureError {
    #[error("screen capture failed: screen capture not supported")]
    Unsupported,

    #[error("screen capture failed: permission denied ({0})")]
    PermissionDenied(String),

    #[error("screen capture failed: {0}")]
    Failed(String),

    #[error("video setup failed: {0}")]
    Setup(String),

    #[error("a screen capture request is already pending")]
    Busy,
}

impl CaptureError {
    /// Classify a failure from the display-media request.
    pub fn from_request(failure: HostFailure) -> Self {
        match failure.name.as_deref() {
            Some("NotAllowedError" | "AbortError" | "SecurityError") => {
                Self::PermissionDenied(failure.to_string())
            }
            Some("NotSupportedError") => Self::Unsupported,
            _ => Self::Failed(failure.to_string()),
        }
    }

    /// Message shown to the user in a blocking alert.
    pub fn user_message(&self) -> String {
        format!("Operation failed: {self}")
    }
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("invalid export options: {0}")]
    InvalidOptions(String),

    #[error("canvas snapshot failed: {0}")]
    Snapshot(String),

    #[error("frame is {actual} bytes, expected {expected} for {width}x{height} RGBA")]
    FrameSize {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },

    #[error("animation encoding failed: {0}")]
    Encode(#[from] image::ImageError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_errors_are_classified() {
        let err = CaptureError::from_request(HostFailure::named(
            "NotAllowedError",
            "Permission denied by user",
        ));
        assert_eq!(
            err,
            CaptureError::PermissionDenied("NotAllowedError: Permission denied by user".into())
        );
    }

    #[test]
    fn unknown_errors_keep_host_message() {
        let err = CaptureError::from_request(HostFailure::new("device lost"));
        assert_eq!(err.to_string(), "screen capture failed: device lost");
        assert_eq!(
            err.user_message(),
            "Operation failed: screen capture failed: device lost"
        );
    }

    #[test]
    fn host_failure_reports_dom_name() {
        assert_eq!(HostFailure::named("AbortError", "").to_string(), "AbortError");
        let err: &dyn std::error::Error = &HostFailure::named("NotFoundError", "no track");
        assert_eq!(err.to_string(), "NotFoundError: no track");
        assert_eq!(HostFailure::new("gone").to_string(), "gone");
    }
}
