//! Error handling for the solvers and the settings loader

/// Unified error to report precondition violations. Non-convergence of the IK is not an
/// error, it is reported as `success = false` in [crate::kinematic_traits::IkSolution].
#[derive(Debug)]
pub enum IkError {
    ParseError(String),
    UnknownJoint(String),
    UnknownFrame(String),
    DimensionMismatch { what: &'static str, expected: usize, found: usize },
    InvalidParameter(String),
    ThreadPoolError(String),
    BackendError(String),
}

impl std::fmt::Display for IkError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match *self {
            IkError::ParseError(ref msg) =>
                write!(f, "Parse Error: {}", msg),
            IkError::UnknownJoint(ref name) =>
                write!(f, "Unknown joint: {}", name),
            IkError::UnknownFrame(ref name) =>
                write!(f, "Unknown frame: {}", name),
            IkError::DimensionMismatch { what, expected, found } =>
                write!(f, "Dimension mismatch for {}: expected {}, found {}", what, expected, found),
            IkError::InvalidParameter(ref msg) =>
                write!(f, "Invalid parameter: {}", msg),
            IkError::ThreadPoolError(ref msg) =>
                write!(f, "Thread pool error: {}", msg),
            IkError::BackendError(ref msg) =>
                write!(f, "IK backend error: {}", msg),
        }
    }
}

impl std::error::Error for IkError {}

/// Checks that a vector has the expected length.
pub(crate) fn check_dimension(what: &'static str, expected: usize, found: usize) -> Result<(), IkError> {
    if expected != found {
        return Err(IkError::DimensionMismatch { what, expected, found });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimension_message() {
        let err = check_dimension("x0", 2, 3).unwrap_err();
        assert_eq!(format!("{}", err), "Dimension mismatch for x0: expected 2, found 3");
    }

    #[test]
    fn test_matching_dimension() {
        assert!(check_dimension("x0", 3, 3).is_ok());
    }

    #[test]
    fn test_error_has_no_source() {
        use std::error::Error;
        let err: Box<dyn Error> = Box::new(IkError::UnknownJoint("j9".to_string()));
        assert!(err.source().is_none());
        assert_eq!(err.to_string(), "Unknown joint: j9");
    }
}
