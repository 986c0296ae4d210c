//! # Sequencing Flows
//!
//! Many processes publishing on one event key must produce sequence numbers
//! that are unique, strictly increasing and gap-free as seen by subscribers.

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::time::Duration;

    use futures::future::join_all;
    use tokio::time::timeout;
    use tokio_stream::wrappers::BroadcastStream;
    use tokio_stream::StreamExt;

    use backplane_bus::MessageBus;
    use backplane_redis::InMemoryBackplane;
    use backplane_types::{Message, ScaleoutBatch, SequencedFrame};

    use crate::integration::support::{spawn_process, wait_connected, wait_until, EVENT_KEY};

    const PROCESSES: usize = 3;
    const PER_PROCESS: usize = 50;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_publishers_share_gap_free_sequence() {
        let backplane = Arc::new(InMemoryBackplane::new());
        let subscriber = BroadcastStream::new(backplane.subscribe(EVENT_KEY));

        let processes: Vec<_> = (0..PROCESSES).map(|_| spawn_process(&backplane)).collect();
        for process in &processes {
            wait_connected(process).await;
        }

        let mut receipts = Vec::new();
        for (p, process) in processes.iter().enumerate() {
            for n in 0..PER_PROCESS {
                let bus = process.bus.clone();
                receipts.push(tokio::spawn(async move {
                    let value = format!("{p}:{n}").into_bytes();
                    let message = Message::new(format!("proc-{p}"), EVENT_KEY, value);
                    bus.publish_batch(0, &[message]).await
                }));
            }
        }

        let sequences: Vec<u64> = join_all(receipts)
            .await
            .into_iter()
            .map(|joined| joined.unwrap().unwrap().sequence)
            .collect();

        let total = (PROCESSES * PER_PROCESS) as u64;
        let unique: HashSet<_> = sequences.iter().copied().collect();
        assert_eq!(unique.len() as u64, total);
        assert_eq!(unique, (1..=total).collect::<HashSet<_>>());

        let observed: Vec<u64> = timeout(
            Duration::from_secs(10),
            subscriber
                .take(total as usize)
                .map(|payload| SequencedFrame::parse(&payload.unwrap()).unwrap().sequence)
                .collect::<Vec<_>>(),
        )
        .await
        .expect("subscriber did not receive every payload");

        assert_eq!(observed, (1..=total).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_subscriber_recovers_published_messages() {
        let backplane = Arc::new(InMemoryBackplane::new());
        let mut subscriber = backplane.subscribe(EVENT_KEY);
        let process = spawn_process(&backplane);
        wait_connected(&process).await;

        let message = Message::new("conn-1", "hub.chat", br#"{"text":"hi"}"#.to_vec())
            .with_filter("conn-2");
        process.bus.publish(message.clone()).await.unwrap();

        let payload = subscriber.recv().await.unwrap();
        let frame = SequencedFrame::parse(&payload).unwrap();
        assert_eq!(frame.sequence, 1);
        assert_eq!(ScaleoutBatch::decode(frame.body).unwrap().messages, vec![message]);
    }

    #[tokio::test]
    async fn test_event_keys_are_independent() {
        use backplane_redis::{
            ConnectionState, InMemoryConnector, RedisMessageBus, RedisScaleoutConfiguration,
        };

        let backplane = Arc::new(InMemoryBackplane::new());
        let chat = spawn_process(&backplane);
        let other = RedisMessageBus::with_connector(
            RedisScaleoutConfiguration::new("memory", "presence"),
            Arc::new(InMemoryConnector::new(backplane.clone())),
        )
        .unwrap();
        wait_connected(&chat).await;
        wait_until(|| other.connection().state() == ConnectionState::Connected).await;

        for _ in 0..3 {
            chat.bus.publish(Message::new("a", EVENT_KEY, b"x".to_vec())).await.unwrap();
        }
        let receipt = other
            .publish_batch(0, &[Message::new("b", "presence", b"y".to_vec())])
            .await
            .unwrap();

        assert_eq!(receipt.sequence, 1);
        assert_eq!(backplane.counter(0, EVENT_KEY), Some(3));
        assert_eq!(backplane.counter(0, "presence"), Some(1));
    }
}
