//! The `{ success, data | error }` envelope most endpoints answer with.

use serde::Deserialize;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ApiEnvelope<T> {
    #[serde(default)]
    pub success: bool,
    #[serde(default = "Option::default")]
    pub data: Option<T>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl<T> ApiEnvelope<T> {
    /// Unwrap the payload of a 2xx response.
    pub fn into_data(self, status: u16) -> Result<T> {
        if !self.success {
            return Err(Error::Backend {
                status,
                message: self
                    .error
                    .or(self.message)
                    .unwrap_or_else(|| "request was not successful".into()),
            });
        }
        self.data
            .ok_or_else(|| Error::Decode("response envelope has no data".into()))
    }
}

/// Pull a human message out of an error body, whatever its shape.
pub(crate) fn error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    ["error", "message", "detail"]
        .iter()
        .find_map(|k| value.get(*k).and_then(|v| v.as_str()).map(str::to_string))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_into_data() {
        let ok: ApiEnvelope<u32> =
            serde_json::from_value(json!({"success": true, "data": 7})).unwrap();
        assert_eq!(ok.into_data(200).unwrap(), 7);

        let failed: ApiEnvelope<u32> =
            serde_json::from_value(json!({"success": false, "error": "boom"})).unwrap();
        match failed.into_data(200) {
            Err(Error::Backend { message, .. }) => assert_eq!(message, "boom"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_error_message() {
        assert_eq!(
            error_message(r#"{"success":false,"error":"Invalid epochs"}"#).as_deref(),
            Some("Invalid epochs")
        );
        assert_eq!(error_message("<html>502</html>"), None);
    }
}
