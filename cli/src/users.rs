use anyhow::Result;
use tracing::{debug, warn};

use crate::error::GalasaError;
use crate::http_client::CommsClient;
use crate::run_types::UserData;

pub async fn run_users_get<C: CommsClient>(comms: &C, login_id: Option<&str>) -> Result<()> {
    let users = get_user_data_from_rest_api(comms, login_id).await?;
    print!("{}", format_user_summary(&users));
    Ok(())
}

pub async fn get_user_data_from_rest_api<C: CommsClient>(
    comms: &C,
    login_id: Option<&str>,
) -> Result<Vec<UserData>, GalasaError> {
    let login_id = login_id_filter(login_id)?;

    let users = comms
        .run_authenticated_command_with_rate_limit_retries(|api| {
            let mut call = api.get_users();
            if let Some(id) = &login_id {
                call = call.login_id(id);
            }
            async move {
                call.execute()
                    .await
                    .map(|response| response.body)
                    .map_err(|e| {
                        warn!("failed to retrieve list of users from API server");
                        GalasaError::RetrievingUserListFailed {
                            status: e.status_code(),
                            reason: e.message,
                        }
                    })
            }
        })
        .await?;

    debug!(users = users.len(), "users collected");
    Ok(users)
}

/// An empty login id means no filter; anything else must validate.
fn login_id_filter(login_id: Option<&str>) -> Result<Option<String>, GalasaError> {
    login_id
        .filter(|id| !id.is_empty())
        .map(validate_login_id)
        .transpose()
}

/// Trims the login id; it must be non-empty and contain no whitespace.
pub fn validate_login_id(login_id: &str) -> Result<String, GalasaError> {
    let trimmed = login_id.trim();
    if trimmed.is_empty() || trimmed.chars().any(char::is_whitespace) {
        return Err(GalasaError::InvalidLoginId {
            login_id: login_id.to_string(),
        });
    }
    Ok(trimmed.to_string())
}

pub fn format_user_summary(users: &[UserData]) -> String {
    let mut out = String::new();
    if !users.is_empty() {
        out.push_str("login-id\n");
        for user in users {
            out.push_str(user.login_id.as_deref().unwrap_or(""));
            out.push('\n');
        }
        out.push('\n');
    }
    out.push_str(&format!("Total:{}\n", users.len()));
    out
}
