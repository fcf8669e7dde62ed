//! Response envelope handed to request-handling layers.

use serde::{Deserialize, Serialize};

use crate::{EngineError, ResultEngine};

/// `{status, data, message}` wrapper around an engine result.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub status: bool,
    pub data: Option<T>,
    pub message: String,
}

impl<T> Envelope<T> {
    pub fn success(data: T, message: impl Into<String>) -> Self {
        Self {
            status: true,
            data: Some(data),
            message: message.into(),
        }
    }

    pub fn failure(err: &EngineError) -> Self {
        Self {
            status: false,
            data: None,
            message: err.user_message(),
        }
    }

    pub fn from_result(result: ResultEngine<T>, message: impl Into<String>) -> Self {
        match result {
            Ok(data) => Self::success(data, message),
            Err(err) => Self::failure(&err),
        }
    }
}
