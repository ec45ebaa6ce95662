//! 实时连接注册表（Hub）。
//!
//! 持有所有在线 WebSocket 连接的出站队列，把写路径产生的事件
//! 扇出到每一个连接。所有注册表变更都经过同一把互斥锁，
//! 保证成员变更不会交错、广播看到一致的成员快照。
//!
//! 背压策略：每个连接的出站队列是有界的，广播用非阻塞投递；
//! 队列满的连接被视为慢消费者，立即关闭其队列并从注册表移除，
//! 不等待它自己的读写循环察觉。慢消费者永远不能拖慢广播方或其他连接。
//!
//! 注意：当前广播不做订阅过滤，事件携带的 post_id 不与连接的
//! 关注范围比对，所有在线连接都会收到全部事件。

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use domain::UserId;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::events::{EventPublisher, FanoutEvent, PublishError};

/// 连接标识，每次升级成功时生成。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub Uuid);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

struct ConnectionHandle {
    user_id: UserId,
    // Hub 持有的是队列的唯一发送端；把它从表里移除即关闭队列。
    sender: mpsc::Sender<String>,
}

/// 在线连接注册表 + 广播扇出。
pub struct Hub {
    connections: Mutex<HashMap<ConnectionId, ConnectionHandle>>,
    queue_capacity: usize,
    connected: AtomicUsize,
}

impl Hub {
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            connections: Mutex::new(HashMap::new()),
            queue_capacity,
            connected: AtomicUsize::new(0),
        }
    }

    /// 注册一个新连接，返回连接标识和出站队列的接收端。
    ///
    /// 接收端由会话的写循环独占；队列只会被 Hub 关闭
    /// （unregister 或广播时发现慢消费者），写循环收到 `None` 即结束。
    pub fn register(&self, user_id: UserId) -> (ConnectionId, mpsc::Receiver<String>) {
        let id = ConnectionId(Uuid::new_v4());
        let (sender, receiver) = mpsc::channel(self.queue_capacity);

        let mut connections = self.lock_connections();
        connections.insert(id, ConnectionHandle { user_id, sender });
        self.connected.store(connections.len(), Ordering::Relaxed);

        tracing::info!(connection_id = %id, user_id = %user_id, "client connected");
        (id, receiver)
    }

    /// 注销一个连接。重复注销是空操作：队列只被关闭一次。
    pub fn unregister(&self, id: ConnectionId) {
        let mut connections = self.lock_connections();
        if let Some(handle) = connections.remove(&id) {
            self.connected.store(connections.len(), Ordering::Relaxed);
            tracing::info!(connection_id = %id, user_id = %handle.user_id, "client disconnected");
        }
    }

    /// 把事件广播给所有在线连接。
    ///
    /// 事件只序列化一次；对每个连接做非阻塞投递，队列已满或已关闭的
    /// 连接当场移除。返回成功投递的连接数。
    pub fn broadcast(&self, event: &FanoutEvent) -> Result<usize, PublishError> {
        let payload = serde_json::to_string(event)
            .map_err(|err| PublishError::Serialization(err.to_string()))?;

        let mut connections = self.lock_connections();
        let mut delivered = 0;
        let mut dead = Vec::new();

        for (id, handle) in connections.iter() {
            match handle.sender.try_send(payload.clone()) {
                Ok(()) => delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    tracing::warn!(connection_id = %id, user_id = %handle.user_id,
                        "outbound queue full, dropping slow consumer");
                    dead.push(*id);
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    dead.push(*id);
                }
            }
        }

        for id in dead {
            connections.remove(&id);
        }
        self.connected.store(connections.len(), Ordering::Relaxed);

        Ok(delivered)
    }

    /// 当前在线连接数（可观测指标）。
    pub fn connection_count(&self) -> usize {
        self.connected.load(Ordering::Relaxed)
    }

    fn lock_connections(&self) -> std::sync::MutexGuard<'_, HashMap<ConnectionId, ConnectionHandle>> {
        // 临界区内没有会 panic 的操作；即便有毒化也继续使用内部数据
        self.connections.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl EventPublisher for Hub {
    async fn publish(&self, event: FanoutEvent) -> Result<(), PublishError> {
        let delivered = self.broadcast(&event)?;
        tracing::debug!(delivered, event_type = %event.event_type, "event fanned out");
        Ok(())
    }
}
