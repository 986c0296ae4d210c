//! # Integration Flows
//!
//! Each simulated process is one `RedisMessageBus` with its own connection,
//! all sharing one `InMemoryBackplane`, exactly as separate servers share a
//! Redis instance.

pub mod facade;
pub mod lifecycle;
pub mod sequencing;

#[cfg(test)]
pub(crate) mod support {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use backplane_bus::{MemoryPool, StreamHook};
    use backplane_redis::{
        BackplaneConnection, ConnectionState, InMemoryBackplane, InMemoryConnector,
        RedisMessageBus, RedisScaleoutConfiguration,
    };
    use backplane_types::StreamIndex;
    use tokio::time::timeout;

    pub const EVENT_KEY: &str = "chat";

    /// Counts `open_stream` calls.
    #[derive(Default)]
    pub struct CountingHook {
        opened: AtomicUsize,
    }

    impl CountingHook {
        pub fn opened(&self) -> usize {
            self.opened.load(Ordering::SeqCst)
        }
    }

    impl StreamHook for CountingHook {
        fn open_stream(&self, _stream_index: StreamIndex) {
            self.opened.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// One simulated server process.
    pub struct Process {
        pub bus: Arc<RedisMessageBus>,
        pub hook: Arc<CountingHook>,
    }

    pub fn spawn_process(backplane: &Arc<InMemoryBackplane>) -> Process {
        let config = RedisScaleoutConfiguration::new("memory", EVENT_KEY);
        let connection = Arc::new(BackplaneConnection::with_poll_interval(
            Arc::new(InMemoryConnector::new(backplane.clone())),
            config.restore_poll_interval,
        ));
        let hook = Arc::new(CountingHook::default());
        let bus = RedisMessageBus::new(config, connection, hook.clone(), Arc::new(MemoryPool::new()))
            .expect("valid configuration");
        Process {
            bus: Arc::new(bus),
            hook,
        }
    }

    pub async fn wait_until(condition: impl Fn() -> bool) {
        timeout(Duration::from_secs(30), async {
            while !condition() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }

    pub async fn wait_connected(process: &Process) {
        wait_until(|| process.bus.connection().state() == ConnectionState::Connected).await;
    }
}
