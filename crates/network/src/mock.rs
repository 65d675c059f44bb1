//! An in-process [`Transport`] used by unit tests elsewhere in the
//! workspace: peers are registered by hand instead of discovered via mDNS,
//! and `send` delivers directly into the target's handler table rather than
//! going over a real socket.

use crate::transport::{StreamHandler, Transport};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tss_types::PeerError;

#[derive(Clone, Default)]
pub struct InMemoryTransport {
    local_peer_id: String,
    registry: Arc<Mutex<HashMap<String, InMemoryTransport>>>,
    handlers: Arc<Mutex<HashMap<String, StreamHandler>>>,
}

impl InMemoryTransport {
    /// Creates a transport and registers it into the shared `registry` so
    /// other instances built from the same registry can `send` to it.
    pub fn new(local_peer_id: impl Into<String>, registry: Arc<Mutex<HashMap<String, InMemoryTransport>>>) -> Self {
        let local_peer_id = local_peer_id.into();
        let transport = Self {
            local_peer_id: local_peer_id.clone(),
            registry: registry.clone(),
            handlers: Arc::new(Mutex::new(HashMap::new())),
        };
        registry
            .lock()
            .expect("registry lock poisoned")
            .insert(local_peer_id, transport.clone());
        transport
    }

    pub fn registry() -> Arc<Mutex<HashMap<String, InMemoryTransport>>> {
        Arc::new(Mutex::new(HashMap::new()))
    }
}

#[async_trait]
impl Transport for InMemoryTransport {
    fn local_peer_id(&self) -> String {
        self.local_peer_id.clone()
    }

    async fn dial(&self, _multiaddr: &str) -> Result<(), PeerError> {
        Ok(())
    }

    async fn send(&self, peer_id: &str, protocol_id: &str, bytes: Vec<u8>) -> Result<(), PeerError> {
        let target = self
            .registry
            .lock()
            .expect("registry lock poisoned")
            .get(peer_id)
            .cloned()
            .ok_or_else(|| PeerError::DialFailed {
                peer_id: peer_id.to_string(),
                reason: "no such peer registered".into(),
            })?;
        let handler = target
            .handlers
            .lock()
            .expect("handlers lock poisoned")
            .get(protocol_id)
            .cloned();
        if let Some(handler) = handler {
            handler(self.local_peer_id.clone(), bytes);
        }
        Ok(())
    }

    async fn set_stream_handler(
        &self,
        protocol_id: &str,
        handler: StreamHandler,
    ) -> Result<(), PeerError> {
        let mut handlers = self.handlers.lock().expect("handlers lock poisoned");
        if handlers.contains_key(protocol_id) {
            return Err(PeerError::DialFailed {
                peer_id: self.local_peer_id.clone(),
                reason: format!("handler already registered for {protocol_id}"),
            });
        }
        handlers.insert(protocol_id.to_string(), handler);
        Ok(())
    }

    async fn remove_stream_handler(&self, protocol_id: &str) -> Result<(), PeerError> {
        self.handlers
            .lock()
            .expect("handlers lock poisoned")
            .remove(protocol_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[tokio::test]
    async fn send_invokes_the_target_handler() {
        let registry = InMemoryTransport::registry();
        let a = InMemoryTransport::new("peer-a", registry.clone());
        let b = InMemoryTransport::new("peer-b", registry);

        let received = Arc::new(AtomicBool::new(false));
        let received_clone = received.clone();
        b.set_stream_handler(
            "/hash/1.0.0",
            Arc::new(move |_sender, _bytes| {
                received_clone.store(true, Ordering::SeqCst);
            }),
        )
        .await
        .unwrap();

        a.send("peer-b", "/hash/1.0.0", b"hello".to_vec())
            .await
            .unwrap();
        assert!(received.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn double_registration_is_rejected() {
        let registry = InMemoryTransport::registry();
        let a = InMemoryTransport::new("peer-a", registry);
        a.set_stream_handler("/hash/1.0.0", Arc::new(|_, _| {}))
            .await
            .unwrap();
        let err = a
            .set_stream_handler("/hash/1.0.0", Arc::new(|_, _| {}))
            .await
            .expect_err("should reject re-registration");
        assert!(matches!(err, PeerError::DialFailed { .. }));
    }
}
