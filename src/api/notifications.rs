use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::api::{AppState, IdentityQuery};
use crate::domain::{Channel, Notification, OwnerRef, TimeMs};
use crate::engine::notifications::{FeedUpdate, Recipient, Role, Watermarks};
use crate::error::AppError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipientQuery {
    pub provider_id: Option<String>,
    pub emails: Option<String>,
    pub role: Option<String>,
}

impl RecipientQuery {
    fn recipient(&self) -> Result<Recipient, AppError> {
        let identity = IdentityQuery {
            provider_id: self.provider_id.clone(),
            emails: self.emails.clone(),
        }
        .identity();
        if let Some(identity) = identity {
            return Ok(Recipient::provider(identity));
        }
        match self.role.as_deref() {
            None => Ok(Recipient::administrator()),
            Some(raw) => Role::parse(raw)
                .map(|role| Recipient::Role { role })
                .ok_or_else(|| AppError::BadRequest(format!("Unknown role: {}", raw))),
        }
    }
}

pub async fn get_feed(
    Query(params): Query<RecipientQuery>,
    State(state): State<AppState>,
) -> Result<Json<FeedUpdate>, AppError> {
    let recipient = params.recipient()?;
    Ok(Json(state.marketplace.notification_feed(&recipient).await))
}

pub async fn mark_seen(
    Query(params): Query<RecipientQuery>,
    State(state): State<AppState>,
) -> Result<Json<Watermarks>, AppError> {
    let recipient = params.recipient()?;
    Ok(Json(
        state
            .marketplace
            .mark_notifications_seen(&recipient, TimeMs::now())
            .await,
    ))
}

pub async fn clear(
    Query(params): Query<RecipientQuery>,
    State(state): State<AppState>,
) -> Result<Json<Watermarks>, AppError> {
    let recipient = params.recipient()?;
    Ok(Json(
        state
            .marketplace
            .clear_notifications(&recipient, TimeMs::now())
            .await,
    ))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewNotification {
    #[serde(default)]
    pub audience: String,
    pub channel: Option<String>,
    pub subject: String,
    #[serde(default)]
    pub message: String,
    pub provider_email: Option<String>,
    pub provider_id: Option<String>,
}

pub async fn send(
    State(state): State<AppState>,
    Json(body): Json<NewNotification>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    if body.subject.trim().is_empty() {
        return Err(AppError::BadRequest("subject is required".to_string()));
    }
    let channel = body
        .channel
        .as_deref()
        .map(Channel::parse)
        .unwrap_or(Channel::InApp);

    let notification = Notification::broadcast(
        body.audience,
        channel,
        body.subject,
        body.message,
        TimeMs::now(),
    )
    .targeted_at(OwnerRef::new(
        body.provider_email.as_deref(),
        body.provider_id.as_deref(),
    ));

    let id = state.marketplace.send_notification(notification).await?;
    Ok((StatusCode::CREATED, Json(json!({ "id": id }))))
}
