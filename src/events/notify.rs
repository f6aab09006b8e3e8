use std::collections::HashMap;

use anyhow::{Context, Result};
use log::{debug, info, warn};
use tokio::select;
use tokio::sync::{broadcast, mpsc, oneshot};

use super::Notification;

/// Hands committed notifications to in-process subscribers, one broadcast
/// channel per kanaal. Cloning is cheap.
#[derive(Clone)]
pub struct Notifier {
    events_tx: mpsc::UnboundedSender<Vec<Notification>>,
    subs_tx: mpsc::Sender<SubscribeRequest>,
}

impl Notifier {
    /// Spawns the dispatcher, must be called inside a tokio runtime.
    pub fn start() -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (subs_tx, subs_rx) = mpsc::channel(100);

        let mut dispatcher = Dispatcher {
            events_rx,
            subs_rx,
            subs: HashMap::new(),
        };
        tokio::spawn(async move {
            dispatcher.main_loop().await;
        });

        Self { events_tx, subs_tx }
    }

    /// Queues notifications of one committed transaction.
    pub fn publish(&self, notifications: Vec<Notification>) {
        if notifications.is_empty() {
            return;
        }
        for n in notifications.iter() {
            info!(
                "Notify {} {} {} ({})",
                n.kanaal,
                n.actie.as_str(),
                n.resource_url,
                n.resource
            );
        }
        if self.events_tx.send(notifications).is_err() {
            warn!("Events dispatcher stopped, notifications dropped");
        }
    }

    pub async fn subscribe(&self, kanaal: &str) -> Result<broadcast::Receiver<Notification>> {
        let (resp_tx, resp_rx) = oneshot::channel();
        let req = SubscribeRequest {
            kanaal: kanaal.to_string(),
            resp_tx,
        };
        self.subs_tx
            .send(req)
            .await
            .context("send subscribe request")?;

        resp_rx.await.context("wait subscription")
    }
}

struct SubscribeRequest {
    kanaal: String,
    resp_tx: oneshot::Sender<broadcast::Receiver<Notification>>,
}

struct Dispatcher {
    events_rx: mpsc::UnboundedReceiver<Vec<Notification>>,
    subs_rx: mpsc::Receiver<SubscribeRequest>,

    subs: HashMap<String, broadcast::Sender<Notification>>,
}

impl Dispatcher {
    async fn main_loop(&mut self) {
        info!("Start events dispatcher main loop");
        loop {
            select! {
                Some(req) = self.subs_rx.recv() => {
                    self.handle_sub(req);
                },

                Some(batch) = self.events_rx.recv() => {
                    self.handle_batch(batch);
                },

                else => break,
            }
        }
        info!("Events dispatcher stopped");
    }

    fn handle_sub(&mut self, req: SubscribeRequest) {
        debug!("Allocate new subscription for kanaal {}", req.kanaal);
        let sub_rx = match self.subs.get(&req.kanaal) {
            Some(sub_tx) => sub_tx.subscribe(),
            None => {
                let (sub_tx, sub_rx) = broadcast::channel(500);
                self.subs.insert(req.kanaal, sub_tx);
                sub_rx
            }
        };
        if req.resp_tx.send(sub_rx).is_err() {
            debug!("Subscriber went away before receiving its channel");
        }

        debug!("Current subscriptions: {:?}", self.subs.keys());
    }

    fn handle_batch(&mut self, batch: Vec<Notification>) {
        for notification in batch {
            let kanaal = notification.kanaal.clone();
            let need_remove = match self.subs.get(&kanaal) {
                Some(sub_tx) => {
                    if sub_tx.receiver_count() == 0 {
                        info!("No more subscribers for kanaal {kanaal}, remove subscription");
                        true
                    } else {
                        debug!("Send notification to kanaal {kanaal}: {notification:?}");
                        // Only fails without receivers, checked above.
                        let _ = sub_tx.send(notification);
                        false
                    }
                }
                None => {
                    debug!("Kanaal {kanaal} has no subscription, skip {notification:?}");
                    false
                }
            };
            if need_remove {
                self.subs.remove(&kanaal);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use crate::events::{Action, CHANNEL_AUTHORIZATIONS};

    use super::*;

    #[tokio::test]
    async fn test_publish_subscribe() {
        let notifier = Notifier::start();
        let mut rx = notifier.subscribe(CHANNEL_AUTHORIZATIONS).await.unwrap();
        let mut rx2 = notifier.subscribe(CHANNEL_AUTHORIZATIONS).await.unwrap();
        let mut cases = notifier.subscribe("zaken").await.unwrap();

        let now = Utc::now();
        notifier.publish(vec![
            Notification::application("http://ac", "a1", Action::Create, now),
            Notification::application("http://ac", "a2", Action::Update, now),
        ]);

        for rx in [&mut rx, &mut rx2] {
            let n = rx.recv().await.unwrap();
            assert!(n.resource_url.ends_with("/a1"));
            assert_eq!(n.actie, Action::Create);
            let n = rx.recv().await.unwrap();
            assert!(n.resource_url.ends_with("/a2"));
        }
        assert!(cases.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_publish_without_subscribers() {
        let notifier = Notifier::start();
        notifier.publish(Vec::new());
        notifier.publish(vec![Notification::application(
            "http://ac",
            "a1",
            Action::Destroy,
            Utc::now(),
        )]);

        // Subscriptions taken later only see later notifications.
        let mut rx = notifier.subscribe(CHANNEL_AUTHORIZATIONS).await.unwrap();
        notifier.publish(vec![Notification::application(
            "http://ac",
            "a2",
            Action::Update,
            Utc::now(),
        )]);
        loop {
            let n = rx.recv().await.unwrap();
            if n.resource_url.ends_with("/a2") {
                break;
            }
        }
    }
}
