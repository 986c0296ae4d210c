//! # Publishing Facade Flows
//!
//! `Connection::send` over a live bus: addressing rules decide how many
//! backplane calls happen, and misuse never reaches the store.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use backplane_bus::{ConnectionManager, MemoryPool};
    use backplane_redis::InMemoryBackplane;
    use backplane_types::{BusError, ConnectionMessage, ScaleoutBatch, SequencedFrame};

    use crate::integration::support::{spawn_process, wait_connected, Process, EVENT_KEY};

    async fn setup() -> (Arc<InMemoryBackplane>, Process, ConnectionManager) {
        let backplane = Arc::new(InMemoryBackplane::new());
        let process = spawn_process(&backplane);
        wait_connected(&process).await;
        let manager = ConnectionManager::new(process.bus.clone(), Arc::new(MemoryPool::new()));
        (backplane, process, manager)
    }

    #[tokio::test]
    async fn test_signal_list_fans_out_one_batch_per_signal() {
        let (backplane, _process, manager) = setup().await;
        let mut subscriber = backplane.subscribe(EVENT_KEY);
        let connection = manager.get_connection("hub.default");

        let message = ConnectionMessage::to_signals(
            vec!["hub.a".into(), "hub.b".into(), "hub.c".into()],
            json!({"n": 1}),
        )
        .excluding(vec!["conn-9".into()]);
        connection.send(message).await.unwrap();
        assert_eq!(backplane.script_calls(), 3);

        let mut keys = Vec::new();
        for expected in 1..=3u64 {
            let payload = subscriber.recv().await.unwrap();
            let frame = SequencedFrame::parse(&payload).unwrap();
            assert_eq!(frame.sequence, expected);

            let batch = ScaleoutBatch::decode(frame.body).unwrap();
            let delivered = &batch.messages[0];
            assert_eq!(delivered.source(), connection.connection_id());
            assert_eq!(delivered.value(), br#"{"n":1}"#);
            assert_eq!(delivered.filter(), Some("conn-9"));
            keys.push(delivered.key().to_string());
        }
        keys.sort();
        assert_eq!(keys, vec!["hub.a", "hub.b", "hub.c"]);
    }

    #[tokio::test]
    async fn test_empty_signal_list_makes_no_calls() {
        let (backplane, _process, manager) = setup().await;
        let connection = manager.get_connection("hub.default");

        connection
            .send(ConnectionMessage::to_signals(Vec::new(), json!("x")))
            .await
            .unwrap();
        assert_eq!(backplane.script_calls(), 0);
        assert_eq!(backplane.counter(0, EVENT_KEY), None);
    }

    #[tokio::test]
    async fn test_ambiguous_message_fails_before_backplane() {
        let (backplane, _process, manager) = setup().await;
        let connection = manager.get_connection("hub.default");

        let mut message = ConnectionMessage::to_signal("hub.a", json!(1));
        message.signals = Some(vec!["hub.b".into()]);

        let err = connection.send(message).await.unwrap_err();
        assert!(matches!(err, BusError::AmbiguousMessage { .. }));
        assert!(!err.is_transient());
        assert_eq!(backplane.script_calls(), 0);
    }

    #[tokio::test]
    async fn test_ack_request_fails_before_backplane() {
        let (backplane, _process, manager) = setup().await;
        let connection = manager.get_connection("hub.default");

        let err = connection
            .send(ConnectionMessage::to_signal("hub.a", json!(1)).with_ack())
            .await
            .unwrap_err();
        assert_eq!(err, BusError::AckNotSupported);
        assert_eq!(backplane.script_calls(), 0);
    }

    #[tokio::test]
    async fn test_single_signal_defaults_and_sequence() {
        let (backplane, _process, manager) = setup().await;
        let mut subscriber = backplane.subscribe(EVENT_KEY);
        let connection = manager.get_connection("hub.default");

        let mut message = ConnectionMessage::to_signal("", json!(true));
        message.signal = None;
        connection.send(message).await.unwrap();

        let payload = subscriber.recv().await.unwrap();
        let frame = SequencedFrame::parse(&payload).unwrap();
        let batch = ScaleoutBatch::decode(frame.body).unwrap();
        assert_eq!(batch.messages[0].key(), "hub.default");
        assert_eq!(batch.messages[0].value(), b"true");
    }
}
