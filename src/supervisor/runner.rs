//! Supervisor - the per-cycle connection-and-command loop

use super::dispatch::CommandDispatcher;
use crate::link::{LinkError, LinkManager, LinkState};
use crate::session::{SessionManager, SessionState};
use led_shared::{SupervisorEvent, SupervisorState, SupervisorStateMachine, TransitionResult};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

/// Drives the link, then the session, then pumps messages, once per cycle
///
/// Reconnection never blocks a cycle: while a layer is backing off the cycle
/// returns early and the loop keeps its cadence.
pub struct Supervisor {
    link: LinkManager,
    session: SessionManager,
    fsm: SupervisorStateMachine,
    device_type: String,
    cycle_interval: Duration,
}

impl Supervisor {
    /// Wire the components and register the dispatcher as the delivery handler
    pub fn new(
        link: LinkManager,
        mut session: SessionManager,
        dispatcher: CommandDispatcher,
        device_type: impl Into<String>,
        cycle_interval: Duration,
    ) -> Self {
        session.on_message(dispatcher);
        Self {
            link,
            session,
            fsm: SupervisorStateMachine::new(),
            device_type: device_type.into(),
            cycle_interval,
        }
    }

    pub fn state(&self) -> SupervisorState {
        self.fsm.state()
    }

    pub fn link(&self) -> &LinkManager {
        &self.link
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    /// Blocking initial bring-up: link first, then session
    ///
    /// Only fails when the link manager has a start timeout configured.
    pub async fn bring_up(&mut self) -> Result<(), LinkError> {
        if self.fsm.state() == SupervisorState::Init {
            self.transition(SupervisorEvent::Started);
        }
        self.link.start().await?;
        self.transition(SupervisorEvent::LinkEstablished);

        let device = self.link.device_info(&self.device_type);
        self.session.ensure_connected(&device).await;
        self.transition(SupervisorEvent::SessionEstablished);
        Ok(())
    }

    /// Run one cycle and return the resulting phase
    pub async fn cycle(&mut self) -> SupervisorState {
        if self.fsm.state() == SupervisorState::Init {
            self.transition(SupervisorEvent::Started);
        }

        // 1. Link
        if self.link.check().await != LinkState::Connected {
            if self.fsm.session_allowed() {
                self.transition(SupervisorEvent::LinkLost);
            }
            if self.session.state() != SessionState::Disconnected {
                self.session.reset().await;
            }
            if self.link.poll().await != LinkState::Connected {
                debug!("Link {}", self.link.state());
                return self.fsm.state();
            }
            self.transition(SupervisorEvent::LinkEstablished);
        }

        // 2. Session
        if !self.session.is_connected() {
            if self.fsm.state() == SupervisorState::Running {
                self.transition(SupervisorEvent::SessionLost);
            }
            let device = self.link.device_info(&self.device_type);
            let state = self
                .session
                .poll_connect(&device, self.link.is_connected())
                .await;
            if state != SessionState::Connected {
                debug!("Session {}", state);
                return self.fsm.state();
            }
            self.transition(SupervisorEvent::SessionEstablished);
        }

        // 3. Pump
        let delivered = self.session.pump().await;
        if delivered > 0 {
            debug!("Handled {} message(s)", delivered);
        }

        self.fsm.state()
    }

    /// Cycle until `shutdown` resolves, then drop the session
    pub async fn run(&mut self, shutdown: impl Future<Output = ()>) {
        tokio::pin!(shutdown);
        info!("Supervisor started (cycle: {:?})", self.cycle_interval);

        loop {
            self.cycle().await;

            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested");
                    break;
                }
                _ = sleep(self.cycle_interval) => {}
            }
        }

        self.session.reset().await;
    }

    fn transition(&mut self, event: SupervisorEvent) {
        let from = self.fsm.state();
        match self.fsm.process_event(event) {
            TransitionResult::Success(to) if from != to => {
                info!("[SUPERVISOR] {} -> {}", from, to);
            }
            TransitionResult::Success(_) => {}
            TransitionResult::Regressed { from, to } => {
                warn!(
                    "[SUPERVISOR] {:?} observed: {} -> {} (link drops: {}, session drops: {})",
                    event,
                    from,
                    to,
                    self.fsm.link_drops(),
                    self.fsm.session_drops()
                );
            }
            TransitionResult::Invalid { from, event } => {
                error!("[SUPERVISOR] Invalid event {:?} in state {}", event, from);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actuator::{ActuatorDriver, Polarity};
    use crate::testing::{link_config, session_config, FakeBroker, RecordingPin, ScriptedLink};

    struct Harness {
        supervisor: Supervisor,
        link: ScriptedLink,
        broker: FakeBroker,
        pin: RecordingPin,
    }

    fn harness() -> Harness {
        let link = ScriptedLink::new();
        let broker = FakeBroker::new();
        let pin = RecordingPin::default();

        let supervisor = Supervisor::new(
            LinkManager::new(Box::new(link.clone()), link_config()),
            SessionManager::new(Box::new(broker.client()), session_config()),
            CommandDispatcher::new(ActuatorDriver::new(
                Box::new(pin.clone()),
                Polarity::ActiveLow,
            )),
            "ESP8266",
            Duration::from_millis(500),
        );
        pin.clear();

        Harness {
            supervisor,
            link,
            broker,
            pin,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_converges_to_running() {
        let mut h = harness();

        assert_eq!(h.supervisor.cycle().await, SupervisorState::Running);
        assert!(h.supervisor.link().is_connected());
        assert!(h.supervisor.session().is_connected());
        assert_eq!(
            h.broker.published(),
            vec!["Device online - MAC: AA:BB:CC:DD:EE:FF".to_string()]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_bring_up_blocks_until_both_layers_are_up() {
        let mut h = harness();
        h.link.fail_next(3);
        h.broker.refuse_next(2);

        h.supervisor.bring_up().await.unwrap();

        assert_eq!(h.supervisor.state(), SupervisorState::Running);
        assert_eq!(h.link.attempts(), 4);
        assert_eq!(h.broker.client_ids().len(), 3);
        assert_eq!(h.broker.subscriptions(), vec!["esp8266/led".to_string()]);

        // The loop takes over without reconnecting
        assert_eq!(h.supervisor.cycle().await, SupervisorState::Running);
        assert_eq!(h.broker.client_ids().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_link_backoff_keeps_cycling() {
        let mut h = harness();
        h.link.fail_next(1);

        assert_eq!(h.supervisor.cycle().await, SupervisorState::LinkUp);
        assert!(h.broker.client_ids().is_empty());

        tokio::time::advance(Duration::from_millis(250)).await;
        assert_eq!(h.supervisor.cycle().await, SupervisorState::Running);
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_backoff_keeps_cycling() {
        let mut h = harness();
        h.broker.refuse_next(1);

        assert_eq!(h.supervisor.cycle().await, SupervisorState::SessionUp);
        assert_eq!(h.supervisor.cycle().await, SupervisorState::SessionUp);
        assert_eq!(h.broker.client_ids().len(), 1);

        tokio::time::advance(Duration::from_millis(2500)).await;
        assert_eq!(h.supervisor.cycle().await, SupervisorState::Running);
    }

    #[tokio::test(start_paused = true)]
    async fn test_commands_are_acknowledged() {
        let mut h = harness();
        h.supervisor.cycle().await;
        h.broker.clear_published();

        h.broker.deliver("1");
        h.broker.deliver("on");
        h.broker.deliver("toggle");
        h.broker.deliver("toggle");
        h.broker.deliver("blink");
        h.supervisor.cycle().await;

        assert_eq!(
            h.broker.published(),
            vec![
                "LED: ON".to_string(),
                "LED: ON".to_string(),
                "LED: OFF".to_string(),
                "LED: ON".to_string(),
                "Error: Unknown command: blink".to_string(),
            ]
        );
        // Active-low: on = low; blink performs no write
        assert_eq!(h.pin.levels(), vec![false, false, true, false]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_uses_link_identity() {
        let mut h = harness();
        h.supervisor.cycle().await;
        h.broker.clear_published();

        h.broker.deliver("Status");
        h.supervisor.cycle().await;

        assert_eq!(
            h.broker.published(),
            vec!["Device: ESP8266, IP: 192.168.4.2, MAC: AA:BB:CC:DD:EE:FF".to_string()]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_link_drop_reannounces_with_fresh_identity() {
        let mut h = harness();
        assert_eq!(h.supervisor.cycle().await, SupervisorState::Running);

        h.link.drop_link();
        h.link.fail_next(1);
        assert_eq!(h.supervisor.cycle().await, SupervisorState::LinkUp);
        assert!(!h.supervisor.session().is_connected());

        tokio::time::advance(Duration::from_millis(250)).await;
        assert_eq!(h.supervisor.cycle().await, SupervisorState::Running);

        let ids = h.broker.client_ids();
        assert_eq!(ids.len(), 2);
        assert_eq!(h.broker.subscriptions().len(), 2);
        assert_eq!(
            h.broker.published(),
            vec![
                "Device online - MAC: AA:BB:CC:DD:EE:FF".to_string(),
                "Device online - MAC: AA:BB:CC:DD:EE:FF".to_string(),
            ]
        );

        // Pumping resumes
        h.broker.deliver("on");
        h.supervisor.cycle().await;
        assert_eq!(h.broker.published().last().map(String::as_str), Some("LED: ON"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_drop_reconnects_without_relinking() {
        let mut h = harness();
        h.supervisor.cycle().await;

        h.broker.kill_session();
        assert_eq!(h.supervisor.cycle().await, SupervisorState::Running);
        assert_eq!(h.link.attempts(), 1);
        assert_eq!(h.broker.client_ids().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_on_shutdown() {
        let mut h = harness();
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();

        let stop = async move {
            tokio::time::sleep(Duration::from_secs(3)).await;
            let _ = tx.send(());
        };
        let shutdown = async move {
            let _ = rx.await;
        };

        tokio::join!(h.supervisor.run(shutdown), stop);
        assert!(!h.supervisor.session().is_connected());
    }
}
