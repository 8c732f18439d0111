//! Status codes returned by every native lifecycle call

use std::fmt::{self, Display};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    Ok,
    Failed,
    NoResponse,
    ParamError,
    Unknown(i32),
}

impl StatusCode {
    pub fn code(&self) -> i32 {
        match self {
            StatusCode::Ok => 0,
            StatusCode::Failed => -1,
            StatusCode::NoResponse => -2,
            StatusCode::ParamError => -3,
            StatusCode::Unknown(code) => *code,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            StatusCode::Ok => "AGLASS_OK",
            StatusCode::Failed => "AGLASS_FAILED",
            StatusCode::NoResponse => "AGLASS_NO_RESPONSE",
            StatusCode::ParamError => "AGLASS_PARAM_ERROR",
            StatusCode::Unknown(_) => "UNKNOWN",
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, StatusCode::Ok)
    }
}

impl From<i32> for StatusCode {
    fn from(code: i32) -> Self {
        match code {
            0 => StatusCode::Ok,
            -1 => StatusCode::Failed,
            -2 => StatusCode::NoResponse,
            -3 => StatusCode::ParamError,
            other => StatusCode::Unknown(other),
        }
    }
}

impl Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.label(), self.code())
    }
}
