//! End-to-end bridge tests: fake mailbox → real handler → fake Blink API → fake SMTP.

mod support;

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::timeout;

use alarm_sync::actuator::{Actuator, BlinkClient};
use alarm_sync::bridge::{BridgeSettings, BridgeState, Connector, EventBridge, SyncLabels};
use alarm_sync::config::NetworkSelection;
use alarm_sync::error::{ActuatorError, BridgeError, Error, MailError};
use alarm_sync::mail::{Notifier, RawMessage};

use support::{
    ChannelMailbox, ChannelNotifier, FakeBlink, FixedPin, SentEmail, TEST_TIMEOUT, blink_config,
    status_email,
};

const REPORT_TO: &str = "me@gmail.com";

struct TestConnector {
    mailbox: Mutex<Option<ChannelMailbox>>,
    mailbox_fails: bool,
    blink: BlinkClient,
    notifier: Arc<ChannelNotifier>,
    calls: Mutex<Vec<&'static str>>,
}

#[async_trait]
impl Connector for TestConnector {
    type Mailbox = ChannelMailbox;

    async fn connect_mailbox(&self) -> Result<ChannelMailbox, MailError> {
        self.calls.lock().unwrap().push("mailbox");
        if self.mailbox_fails {
            return Err(MailError::Connection("LOGIN rejected: NO".into()));
        }
        let mailbox = self.mailbox.lock().unwrap().take();
        mailbox.ok_or_else(|| MailError::Connection("mailbox already taken".into()))
    }

    async fn connect_actuator(&self) -> Result<Arc<dyn Actuator>, ActuatorError> {
        self.calls.lock().unwrap().push("actuator");
        Ok(Arc::new(self.blink.login().await?))
    }

    fn notifier(&self) -> Arc<dyn Notifier> {
        self.notifier.clone()
    }
}

struct Harness {
    bridge: EventBridge,
    connector: TestConnector,
    signals: mpsc::UnboundedSender<Vec<RawMessage>>,
    sent: mpsc::UnboundedReceiver<SentEmail>,
}

fn harness(port: u16, pin: &str) -> Harness {
    let (mailbox, signals) = ChannelMailbox::new();
    let (notifier, sent) = ChannelNotifier::new();
    let connector = TestConnector {
        mailbox: Mutex::new(Some(mailbox)),
        mailbox_fails: false,
        blink: BlinkClient::new(
            blink_config(port, NetworkSelection::All),
            Arc::new(FixedPin(pin.to_string())),
        ),
        notifier: Arc::new(notifier),
        calls: Mutex::new(Vec::new()),
    };
    let bridge = EventBridge::new(BridgeSettings {
        alarm_sender: "no-reply@info.simplisafe.com".into(),
        report_recipient: REPORT_TO.into(),
        labels: SyncLabels::default(),
    });
    Harness {
        bridge,
        connector,
        signals,
        sent,
    }
}

fn sent(subject: &str, body: &str) -> SentEmail {
    (REPORT_TO.to_string(), subject.to_string(), body.to_string())
}

#[tokio::test]
async fn disarm_email_syncs_and_confirms() {
    timeout(TEST_TIMEOUT, async {
        let fake = FakeBlink::with_networks(&[1, 2]);
        let port = fake.serve().await;
        let mut h = harness(port, "");

        let _subscription = h.bridge.start(&h.connector).await.expect("start failed");
        assert_eq!(h.bridge.state(), BridgeState::Active);
        assert_eq!(*h.connector.calls.lock().unwrap(), vec!["mailbox", "actuator"]);

        h.signals
            .send(vec![status_email(1, "SimpliSafe System Disarmed")])
            .unwrap();

        assert_eq!(
            h.sent.recv().await.unwrap(),
            sent("Synced Simplisafe -> Blink", "Disarmed")
        );
        let mut actions = fake.actions();
        actions.sort();
        assert_eq!(actions, vec!["disarm:1", "disarm:2"]);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn batch_is_applied_oldest_first() {
    timeout(TEST_TIMEOUT, async {
        let fake = FakeBlink::with_networks(&[1]);
        let port = fake.serve().await;
        let mut h = harness(port, "");
        let _subscription = h.bridge.start(&h.connector).await.unwrap();

        h.signals
            .send(vec![
                status_email(6, "SimpliSafe System Armed (away mode)"),
                status_email(5, "SimpliSafe System Disarmed"),
            ])
            .unwrap();

        assert_eq!(h.sent.recv().await.unwrap().2, "Disarmed");
        assert_eq!(h.sent.recv().await.unwrap().2, "Armed");
        assert_eq!(fake.actions(), vec!["disarm:1", "arm:1"]);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn redelivered_messages_are_not_reapplied() {
    timeout(TEST_TIMEOUT, async {
        let fake = FakeBlink::with_networks(&[1]);
        let port = fake.serve().await;
        let mut h = harness(port, "");
        let _subscription = h.bridge.start(&h.connector).await.unwrap();

        h.signals
            .send(vec![status_email(3, "SimpliSafe System Armed (home mode)")])
            .unwrap();
        assert_eq!(h.sent.recv().await.unwrap().2, "Armed");

        h.signals
            .send(vec![
                status_email(2, "SimpliSafe System Disarmed"),
                status_email(3, "SimpliSafe System Armed (home mode)"),
            ])
            .unwrap();
        h.signals
            .send(vec![status_email(4, "SimpliSafe System Disarmed")])
            .unwrap();
        assert_eq!(h.sent.recv().await.unwrap().2, "Disarmed");

        assert_eq!(fake.actions(), vec!["arm:1", "disarm:1"]);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn partial_arm_failure_reports_failing_network() {
    timeout(TEST_TIMEOUT, async {
        let fake = FakeBlink::with_networks(&[1, 2, 3]).fail_network(2);
        let port = fake.serve().await;
        let mut h = harness(port, "");
        let _subscription = h.bridge.start(&h.connector).await.unwrap();

        h.signals
            .send(vec![status_email(1, "SimpliSafe System Armed (home mode)")])
            .unwrap();

        let (to, subject, body) = h.sent.recv().await.unwrap();
        assert_eq!(to, REPORT_TO);
        assert_eq!(subject, "Sync Failed Simplisafe -> Blink");
        assert!(body.contains("network 2"), "body was: {body}");
        assert!(body.contains("status 500"), "body was: {body}");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn unrelated_subject_is_dropped_without_side_effects() {
    timeout(TEST_TIMEOUT, async {
        let fake = FakeBlink::with_networks(&[1]);
        let port = fake.serve().await;
        let mut h = harness(port, "");
        let _subscription = h.bridge.start(&h.connector).await.unwrap();

        h.signals
            .send(vec![status_email(1, "Your SimpliSafe monthly summary")])
            .unwrap();
        h.signals
            .send(vec![status_email(2, "SimpliSafe System Disarmed")])
            .unwrap();

        assert_eq!(
            h.sent.recv().await.unwrap(),
            sent("Synced Simplisafe -> Blink", "Disarmed")
        );
        assert_eq!(fake.actions(), vec!["disarm:1"]);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn verified_login_becomes_active() {
    timeout(TEST_TIMEOUT, async {
        let fake = FakeBlink::with_networks(&[1]).require_pin("424242");
        let port = fake.serve().await;
        let mut h = harness(port, "424242");

        assert_eq!(h.bridge.state(), BridgeState::Uninitialized);
        h.bridge.start(&h.connector).await.expect("start failed");
        assert_eq!(h.bridge.state(), BridgeState::Active);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn wrong_pin_is_fatal_at_startup() {
    timeout(TEST_TIMEOUT, async {
        let fake = FakeBlink::with_networks(&[1]).require_pin("424242");
        let port = fake.serve().await;
        let mut h = harness(port, "111111");

        let err = h.bridge.start(&h.connector).await.err().expect("start should fail");

        assert!(matches!(
            err,
            Error::Actuator(ActuatorError::Verification { .. })
        ));
        assert_eq!(h.bridge.state(), BridgeState::Uninitialized);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn mailbox_login_failure_stops_before_actuator_login() {
    timeout(TEST_TIMEOUT, async {
        let fake = FakeBlink::with_networks(&[1]);
        let port = fake.serve().await;
        let mut h = harness(port, "");
        h.connector.mailbox_fails = true;

        let err = h.bridge.start(&h.connector).await.err().expect("start should fail");

        assert!(matches!(err, Error::Mail(MailError::Connection(_))));
        assert_eq!(*h.connector.calls.lock().unwrap(), vec!["mailbox"]);
        assert_eq!(fake.state.lock().unwrap().logins, 0);
        assert_eq!(h.bridge.state(), BridgeState::Uninitialized);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn second_start_is_rejected() {
    timeout(TEST_TIMEOUT, async {
        let fake = FakeBlink::with_networks(&[1]);
        let port = fake.serve().await;
        let mut h = harness(port, "");

        let _subscription = h.bridge.start(&h.connector).await.unwrap();
        let err = h.bridge.start(&h.connector).await.err().expect("restart should fail");

        assert!(matches!(err, Error::Bridge(BridgeError::AlreadyActive)));
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn dropped_mailbox_connection_ends_subscription_with_error() {
    timeout(TEST_TIMEOUT, async {
        let fake = FakeBlink::with_networks(&[1]);
        let port = fake.serve().await;
        let mut h = harness(port, "");
        let subscription = h.bridge.start(&h.connector).await.unwrap();

        drop(h.signals);

        assert!(matches!(
            subscription.closed().await,
            Err(MailError::Connection(_))
        ));
    })
    .await
    .expect("test timed out");
}
