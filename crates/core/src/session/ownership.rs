//! Running-app ownership rules
//!
//! A host reports which app it is running and which client started it. Only
//! that client may resume or quit the app remotely.

use crate::capabilities::{ClientId, HostCapabilities};
use crate::error::SessionError;
use crate::transport::LaunchMode;

/// Decide whether starting `app_id` launches it fresh or resumes it.
pub fn plan_launch(
    caps: &HostCapabilities,
    app_id: u32,
    requester: ClientId,
    host_name: &str,
) -> Result<LaunchMode, SessionError> {
    let Some(running_app_id) = caps.running_app_id else {
        return Ok(LaunchMode::Launch);
    };

    if caps.running_session_owner != Some(requester) {
        return Err(SessionError::NotOwner {
            host_name: host_name.to_string(),
            app_id: running_app_id,
        });
    }

    if running_app_id == app_id {
        Ok(LaunchMode::Resume)
    } else {
        Err(SessionError::OtherAppRunning {
            host_name: host_name.to_string(),
            running_app_id,
        })
    }
}

/// Check that `requester` may quit the running app. Returns its id.
///
/// An app without a recorded owner was not started by this client.
pub fn authorize_quit(
    caps: &HostCapabilities,
    requester: ClientId,
    host_name: &str,
) -> Result<u32, SessionError> {
    let app_id = caps.running_app_id.ok_or_else(|| SessionError::NoRunningApp {
        host_name: host_name.to_string(),
    })?;

    match caps.running_session_owner {
        Some(owner) if owner == requester => Ok(app_id),
        _ => Err(SessionError::NotOwner {
            host_name: host_name.to_string(),
            app_id,
        }),
    }
}
