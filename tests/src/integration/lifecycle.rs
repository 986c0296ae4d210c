//! # Lifecycle Flows
//!
//! Reconnect with retry, restore after an outage, and disposal while other
//! processes keep publishing.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use backplane_bus::MessageBus;
    use backplane_redis::{ConnectionState, InMemoryBackplane};
    use backplane_types::{BusError, Message};

    use crate::integration::support::{spawn_process, wait_connected, wait_until, EVENT_KEY};

    fn message(value: &str) -> Message {
        Message::new("conn-1", EVENT_KEY, value.as_bytes().to_vec())
    }

    #[tokio::test(start_paused = true)]
    async fn test_three_failed_connects_then_single_open_stream() {
        let backplane = Arc::new(InMemoryBackplane::new());
        backplane.fail_next_connects(3);
        let process = spawn_process(&backplane);

        wait_until(|| process.hook.opened() == 1).await;
        assert_eq!(backplane.connect_attempts(), 4);

        // Nothing else happens once connected.
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(process.hook.opened(), 1);
        assert_eq!(backplane.connect_attempts(), 4);

        process.bus.publish(message("a")).await.unwrap();
        assert_eq!(backplane.counter(0, EVENT_KEY), Some(1));
    }

    #[tokio::test]
    async fn test_outage_and_restore_reopen_every_process() {
        let backplane = Arc::new(InMemoryBackplane::new());
        let first = spawn_process(&backplane);
        let second = spawn_process(&backplane);
        wait_until(|| first.hook.opened() == 1 && second.hook.opened() == 1).await;

        backplane.simulate_outage();
        let err = first.bus.publish(message("during")).await.unwrap_err();
        assert!(err.is_transient());

        backplane.simulate_restore();
        wait_until(|| first.hook.opened() == 2 && second.hook.opened() == 2).await;

        first.bus.publish(message("a")).await.unwrap();
        second.bus.publish(message("b")).await.unwrap();
        assert_eq!(backplane.counter(0, EVENT_KEY), Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_restore_waits_until_key_is_ready() {
        let backplane = Arc::new(InMemoryBackplane::new());
        let process = spawn_process(&backplane);
        wait_until(|| process.hook.opened() == 1).await;

        backplane.set_ready(false);
        backplane.simulate_restore();

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(process.hook.opened(), 1);

        backplane.set_ready(true);
        wait_until(|| process.hook.opened() == 2).await;
    }

    #[tokio::test]
    async fn test_disposed_process_leaves_others_running() {
        let backplane = Arc::new(InMemoryBackplane::new());
        let leaving = spawn_process(&backplane);
        let staying = spawn_process(&backplane);
        wait_connected(&leaving).await;
        wait_connected(&staying).await;
        assert_eq!(backplane.open_connections(), 2);

        leaving.bus.dispose().await;
        assert_eq!(leaving.bus.connection().state(), ConnectionState::Disposed);
        assert_eq!(backplane.open_connections(), 1);
        assert_eq!(
            leaving.bus.publish(message("late")).await,
            Err(BusError::NotStarted)
        );

        staying.bus.publish(message("ok")).await.unwrap();
        assert_eq!(backplane.counter(0, EVENT_KEY), Some(1));

        // A second dispose is a no-op.
        leaving.bus.dispose().await;
        assert_eq!(backplane.open_connections(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispose_during_retries_never_connects() {
        let backplane = Arc::new(InMemoryBackplane::new());
        backplane.fail_next_connects(usize::MAX);
        let process = spawn_process(&backplane);

        tokio::time::sleep(Duration::from_secs(7)).await;
        process.bus.dispose().await;
        backplane.fail_next_connects(0);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(process.hook.opened(), 0);
        assert_eq!(backplane.open_connections(), 0);
        assert_eq!(process.bus.connection().state(), ConnectionState::Disposed);
    }
}
