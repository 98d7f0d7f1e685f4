//! 通知房间管理与扇出

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::mpsc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// 通知事件类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotifyEvent {
    NewPatient,
    PatientStatusUpdated,
    DiagnosisCompleted,
    DiagnosisUpdated,
}

impl NotifyEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NewPatient => "new_patient",
            Self::PatientStatusUpdated => "patient_status_updated",
            Self::DiagnosisCompleted => "diagnosis_completed",
            Self::DiagnosisUpdated => "diagnosis_updated",
        }
    }
}

/// 投递给连接的通知信封
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub event: NotifyEvent,
    pub message: String,
    pub payload: serde_json::Value,
    pub sent_at: DateTime<Utc>,
}

impl Envelope {
    pub fn new(event: NotifyEvent, message: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            event,
            message: message.into(),
            payload,
            sent_at: Utc::now(),
        }
    }
}

/// 连接标识
pub type ConnectionId = Uuid;

/// 通知分发中心
///
/// 作为显式依赖注入工作流引擎，而不是挂在全局上下文里。
#[derive(Debug, Default)]
pub struct NotificationHub {
    rooms: RwLock<HashMap<Uuid, HashMap<ConnectionId, mpsc::UnboundedSender<Envelope>>>>,
}

impl NotificationHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// 把一个新连接加入用户的房间，返回连接ID和接收端
    pub async fn join(&self, user_id: Uuid) -> (ConnectionId, mpsc::UnboundedReceiver<Envelope>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let connection_id = Uuid::new_v4();

        let mut rooms = self.rooms.write().await;
        rooms.entry(user_id).or_default().insert(connection_id, tx);
        tracing::info!("Connection {} joined room {}", connection_id, user_id);

        (connection_id, rx)
    }

    /// 把连接从用户的房间移除
    pub async fn leave(&self, user_id: Uuid, connection_id: ConnectionId) {
        let mut rooms = self.rooms.write().await;
        if let Some(room) = rooms.get_mut(&user_id) {
            room.remove(&connection_id);
            if room.is_empty() {
                rooms.remove(&user_id);
            }
            tracing::info!("Connection {} left room {}", connection_id, user_id);
        }
    }

    /// 向用户的所有活跃连接投递事件，返回成功投递的连接数
    ///
    /// 没有连接时静默丢弃；发送失败的连接被认为已死并从房间剔除。
    pub async fn emit(
        &self,
        user_id: Uuid,
        event: NotifyEvent,
        message: impl Into<String>,
        payload: serde_json::Value,
    ) -> usize {
        let envelope = Envelope::new(event, message, payload);

        let mut rooms = self.rooms.write().await;
        let Some(room) = rooms.get_mut(&user_id) else {
            tracing::debug!(
                "No active connections for user {}, dropping {}",
                user_id,
                event.as_str()
            );
            return 0;
        };

        let mut delivered = 0usize;
        let mut dead: Vec<ConnectionId> = Vec::new();
        for (connection_id, tx) in room.iter() {
            if tx.send(envelope.clone()).is_ok() {
                delivered += 1;
            } else {
                dead.push(*connection_id);
            }
        }

        for connection_id in dead {
            tracing::warn!(
                "Dropping dead connection {} in room {}",
                connection_id,
                user_id
            );
            room.remove(&connection_id);
        }
        if room.is_empty() {
            rooms.remove(&user_id);
        }

        tracing::debug!(
            "Emitted {} to user {} ({} connections)",
            event.as_str(),
            user_id,
            delivered
        );
        delivered
    }

    /// 用户当前的活跃连接数
    pub async fn connection_count(&self, user_id: Uuid) -> usize {
        self.rooms
            .read()
            .await
            .get(&user_id)
            .map(|room| room.len())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_emit_without_connections_is_dropped() {
        let hub = NotificationHub::new();
        let delivered = hub
            .emit(Uuid::new_v4(), NotifyEvent::NewPatient, "ignored", json!({}))
            .await;
        assert_eq!(delivered, 0);
    }

    #[tokio::test]
    async fn test_emit_fans_out_to_all_connections() {
        let hub = NotificationHub::new();
        let user = Uuid::new_v4();

        let (_, mut rx1) = hub.join(user).await;
        let (_, mut rx2) = hub.join(user).await;

        let delivered = hub
            .emit(
                user,
                NotifyEvent::PatientStatusUpdated,
                "Patient status updated",
                json!({"patient_id": "p1"}),
            )
            .await;
        assert_eq!(delivered, 2);

        let envelope = rx1.recv().await.unwrap();
        assert_eq!(envelope.event, NotifyEvent::PatientStatusUpdated);
        assert_eq!(envelope.payload["patient_id"], "p1");
        assert!(rx2.recv().await.is_some());
    }

    #[tokio::test]
    async fn test_dead_connections_are_pruned() {
        let hub = NotificationHub::new();
        let user = Uuid::new_v4();

        let (_, rx) = hub.join(user).await;
        drop(rx);

        let delivered = hub
            .emit(user, NotifyEvent::DiagnosisUpdated, "ignored", json!({}))
            .await;
        assert_eq!(delivered, 0);
        assert_eq!(hub.connection_count(user).await, 0);
    }

    #[tokio::test]
    async fn test_leave_removes_connection() {
        let hub = NotificationHub::new();
        let user = Uuid::new_v4();

        let (connection_id, _rx) = hub.join(user).await;
        assert_eq!(hub.connection_count(user).await, 1);

        hub.leave(user, connection_id).await;
        assert_eq!(hub.connection_count(user).await, 0);
    }

    #[test]
    fn test_event_wire_names() {
        assert_eq!(NotifyEvent::NewPatient.as_str(), "new_patient");
        assert_eq!(
            serde_json::to_string(&NotifyEvent::DiagnosisCompleted).unwrap(),
            "\"diagnosis_completed\""
        );
    }
}
