//! Simple stateless pub-sub event handler.
//!
//! Notification concerns (buyer emails, courier SMS, payout OTPs) subscribe to engine events
//! through this module. Handlers are stateless: all they receive is the event itself. A failed
//! publish is logged and never propagated, so notification trouble can never roll back ledger
//! state.
use std::{
    future::Future,
    pin::Pin,
    sync::{atomic::AtomicI64, Arc},
};

use log::*;
use tokio::sync::mpsc;

pub type Handler<E> = Arc<dyn Fn(E) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

pub struct EventHandler<E: Send + Sync + 'static> {
    listener: mpsc::Receiver<E>,
    sender: mpsc::Sender<E>,
    handler: Handler<E>,
}

impl<E: Send + Sync + 'static> EventHandler<E> {
    pub fn new(buffer_size: usize, handler: Handler<E>) -> Self {
        let (sender, receiver) = mpsc::channel(buffer_size);
        Self { listener: receiver, sender, handler }
    }

    pub fn subscribe(&self) -> EventProducer<E> {
        EventProducer::new(self.sender.clone())
    }

    pub async fn start_handler(mut self) {
        debug!("📬️ Starting event handler");
        // Drop the internal sender so the handler shuts down when the last producer is dropped.
        drop(self.sender);
        let jobs = Arc::new(AtomicI64::new(0));
        while let Some(event) = self.listener.recv().await {
            trace!("📬️ Handling event");
            let handler = Arc::clone(&self.handler);
            jobs.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            let job = jobs.clone();
            tokio::spawn(async move {
                (handler)(event).await;
                job.fetch_sub(1, std::sync::atomic::Ordering::Relaxed);
                trace!("📬️ Event handled");
            });
        }
        while jobs.load(std::sync::atomic::Ordering::SeqCst) > 0 {
            debug!("📬️ Waiting for in-flight notifications to complete");
            tokio::time::sleep(tokio::time::Duration::from_millis(250)).await;
        }
        debug!("📬️ Event handler has shut down");
    }
}

#[derive(Clone)]
pub struct EventProducer<E: Send + Sync> {
    sender: mpsc::Sender<E>,
}

impl<E: Send + Sync> EventProducer<E> {
    pub fn new(sender: mpsc::Sender<E>) -> Self {
        Self { sender }
    }

    pub async fn publish_event(&self, event: E) {
        if let Err(e) = self.sender.send(event).await {
            error!("📬️ Failed to publish event: {e}");
        }
    }
}

#[cfg(test)]
mod test {
    use std::sync::atomic::AtomicU64;

    use super::*;

    #[tokio::test]
    async fn events_reach_the_handler() {
        let _ = env_logger::try_init();
        let total = Arc::new(AtomicU64::new(0));
        let tally = total.clone();
        let handler = Arc::new(move |v: u64| {
            let total = total.clone();
            Box::pin(async move {
                total.fetch_add(v, std::sync::atomic::Ordering::SeqCst);
            }) as Pin<Box<dyn Future<Output = ()> + Send>>
        });
        let event_handler = EventHandler::new(4, handler);
        let producer = event_handler.subscribe();
        tokio::spawn(async move {
            for v in 1..=10u64 {
                producer.publish_event(v).await;
            }
        });
        event_handler.start_handler().await;
        assert_eq!(tally.load(std::sync::atomic::Ordering::SeqCst), 55);
    }
}
