//! Request status and the rolling per-chunk update rule.

use shared_types::{ErrorKind, StatusCode, STATUS_OK};

/// Status of the operation tracked by a request context.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RequestStatus {
    /// Armed, no terminal chunk seen yet.
    #[default]
    Pending,
    /// Terminal chunk seen and every chunk reported success.
    Success,
    /// At least one chunk reported a failure.
    Failed(ErrorKind),
}

impl RequestStatus {
    /// Fold one chunk's firmware code into the rolling status.
    ///
    /// A failure is sticky for the rest of the operation.
    pub fn fold(&self, code: StatusCode) -> RequestStatus {
        match self {
            RequestStatus::Failed(_) => self.clone(),
            _ if code != STATUS_OK => RequestStatus::Failed(ErrorKind::Firmware { code }),
            _ => RequestStatus::Success,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, RequestStatus::Success)
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, RequestStatus::Pending)
    }

    /// Label used in logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Success => "success",
            RequestStatus::Failed(_) => "failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fold_success() {
        assert_eq!(RequestStatus::Pending.fold(STATUS_OK), RequestStatus::Success);
        assert_eq!(RequestStatus::Success.fold(STATUS_OK), RequestStatus::Success);
    }

    #[test]
    fn test_failure_is_sticky() {
        let failed = RequestStatus::Pending.fold(-22);
        assert_eq!(
            failed,
            RequestStatus::Failed(ErrorKind::Firmware { code: -22 })
        );
        // A later success chunk does not clear the failure, nor does a
        // later, different failure replace the first code.
        assert_eq!(failed.fold(STATUS_OK), failed);
        assert_eq!(failed.fold(-5), failed);
    }
}
