use serde_json::{Value, json};
use tracing::{info, instrument};

use super::OdooSession;
use crate::error::{ReportError, Result};

const AUTHENTICATE_PATH: &str = "/web/session/authenticate";

/// What the server tells us about the user after a successful login.
#[derive(Debug, Clone, PartialEq)]
pub struct UserInfo {
    pub uid: i64,
    /// Raw `user_companies` block: allowed and current companies.
    pub user_companies: Value,
}

impl OdooSession {
    /// Logs in and captures the user id for later calls.
    #[instrument(level = "info", skip(self, password), fields(url = %self.base_url))]
    pub fn login(&mut self, db: &str, login: &str, password: &str) -> Result<UserInfo> {
        let payload = json!({
            "jsonrpc": "2.0",
            "params": {"db": db, "login": login, "password": password},
        });

        let body = self.post_json(AUTHENTICATE_PATH, &payload)?;
        let response: Value = serde_json::from_str(&body)?;
        let info = parse_login_response(&response)?;

        self.uid = Some(info.uid);
        info!(uid = info.uid, "logged in");
        Ok(info)
    }
}

fn parse_login_response(response: &Value) -> Result<UserInfo> {
    let result = response.get("result").filter(|value| value.is_object());
    match result.and_then(|result| result.get("uid")).and_then(Value::as_i64) {
        Some(uid) => Ok(UserInfo {
            uid,
            user_companies: result
                .and_then(|result| result.get("user_companies"))
                .cloned()
                .unwrap_or(Value::Null),
        }),
        None => Err(ReportError::LoginFailed(
            rpc_error_message(response).unwrap_or_else(|| "no user id in response".to_string()),
        )),
    }
}

/// Pulls the most specific message out of a JSON-RPC `error` block.
pub(crate) fn rpc_error_message(response: &Value) -> Option<String> {
    let error = response.get("error")?;
    error
        .pointer("/data/message")
        .or_else(|| error.get("message"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .or_else(|| Some(error.to_string()))
}
