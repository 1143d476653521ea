//! Client state
//!
//! The owning value behind the public API: the active server list, the
//! scheduler, the offline flag and the client's endpoint name. All
//! mutation happens on the single cooperative context that owns the
//! scheduler; jobs never carry references back into this state.

use crate::config::ServerConfig;
use crate::error::{Error, Result};
use crate::query::{make_query_string_list, LWM2M_VERSION};
use crate::sched::{RetryBackoff, Scheduler};
use crate::server::{Servers, Ssid};

/// An LwM2M client's registration state
pub struct Client {
    pub(crate) servers: Servers,
    pub(crate) scheduler: Box<dyn Scheduler>,
    pub(crate) offline: bool,
    pub(crate) retry_backoff: RetryBackoff,
    endpoint_name: String,
}

impl Client {
    /// Create a client with the given endpoint name and scheduler
    pub fn new(endpoint_name: impl Into<String>, scheduler: Box<dyn Scheduler>) -> Self {
        Self {
            servers: Servers::new(),
            scheduler,
            offline: false,
            retry_backoff: RetryBackoff::default(),
            endpoint_name: endpoint_name.into(),
        }
    }

    /// Create a client with a non-default retry backoff policy
    pub fn with_retry_backoff(
        endpoint_name: impl Into<String>,
        scheduler: Box<dyn Scheduler>,
        retry_backoff: RetryBackoff,
    ) -> Self {
        Self {
            retry_backoff,
            ..Self::new(endpoint_name, scheduler)
        }
    }

    /// The client's endpoint name, sent as the `ep=` query argument
    pub fn endpoint_name(&self) -> &str {
        &self.endpoint_name
    }

    /// The active server list
    pub fn servers(&self) -> &Servers {
        &self.servers
    }

    /// Whether the client is offline
    pub fn is_offline(&self) -> bool {
        self.offline
    }

    /// Go offline: cancel every pending Update job and stop scheduling
    /// new ones until [`schedule_reconnect`](Self::schedule_reconnect).
    pub fn enter_offline(&mut self) {
        for server in self.servers.iter_mut() {
            self.scheduler.cancel(&mut server.update_handle);
        }
        self.offline = true;
        log::info!("client entered offline mode");
    }

    /// Activate a configured server.
    ///
    /// Validates the configuration, inserts the server into the active
    /// list and, unless the client is offline, schedules an immediate
    /// Update job so the first Register runs through the normal
    /// pipeline.
    pub fn activate_server(&mut self, config: &ServerConfig) -> Result<()> {
        let server = config.to_active_server()?;
        let ssid = server.ssid();
        self.servers.activate(server)?;
        log::info!("activated server with SSID = {}", ssid);

        if !self.offline {
            self.schedule_registration_update(ssid)?;
        }
        Ok(())
    }

    /// Deactivate a server, cancelling its pending Update job.
    ///
    /// Returns whether a server with that SSID was active.
    pub fn deactivate_server(&mut self, ssid: Ssid) -> bool {
        match self.servers.deactivate(ssid) {
            Some(mut server) => {
                self.scheduler.cancel(&mut server.update_handle);
                log::info!("server with SSID = {} deactivated", ssid);
                true
            }
            None => false,
        }
    }

    /// Build the registration query list for an active server.
    pub fn registration_query(&self, ssid: Ssid) -> Result<Vec<String>> {
        let server = self
            .servers
            .find_active(ssid)
            .ok_or(Error::NoActiveServer(ssid.0))?;
        let params = server.registration_info.last_update_params();

        make_query_string_list(
            Some(LWM2M_VERSION),
            Some(&self.endpoint_name),
            Some(params.lifetime.as_secs() as i64),
            params.binding_mode,
            server.sms_msisdn(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sched::{Job, SchedHandle};
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingState {
        next_handle: u64,
        pending: Vec<(SchedHandle, Duration, Job)>,
    }

    #[derive(Clone, Default)]
    struct RecordingScheduler {
        state: Rc<RefCell<RecordingState>>,
    }

    impl RecordingScheduler {
        fn push(&self, delay: Duration, job: Job) -> SchedHandle {
            let mut state = self.state.borrow_mut();
            state.next_handle += 1;
            let handle = SchedHandle(state.next_handle);
            state.pending.push((handle, delay, job));
            handle
        }
    }

    impl Scheduler for RecordingScheduler {
        fn schedule_now(&mut self, job: Job) -> Result<SchedHandle> {
            Ok(self.push(Duration::ZERO, job))
        }

        fn schedule_retryable(
            &mut self,
            delay: Duration,
            _backoff: RetryBackoff,
            job: Job,
        ) -> Result<SchedHandle> {
            Ok(self.push(delay, job))
        }

        fn cancel(&mut self, handle: &mut Option<SchedHandle>) {
            if let Some(handle) = handle.take() {
                self.state.borrow_mut().pending.retain(|(h, _, _)| *h != handle);
            }
        }
    }

    fn test_config(ssid: u16) -> ServerConfig {
        ServerConfig {
            ssid,
            uri: "coap://example.com".to_string(),
            lifetime_s: 600,
            binding: None,
            sms_msisdn: None,
        }
    }

    fn test_client() -> (Client, Rc<RefCell<RecordingState>>) {
        let scheduler = RecordingScheduler::default();
        let state = scheduler.state.clone();
        (Client::new("dev1", Box::new(scheduler)), state)
    }

    #[test]
    fn test_activation_schedules_immediate_update() {
        let (mut client, state) = test_client();
        client.activate_server(&test_config(7)).unwrap();

        let state = state.borrow();
        assert_eq!(state.pending.len(), 1);
        let (handle, delay, job) = state.pending[0];
        assert_eq!(delay, Duration::ZERO);
        match job {
            Job::Update(args) => {
                assert_eq!(args.ssid, Ssid(7));
                assert!(!args.reconnect_required);
            }
            other => panic!("unexpected job: {:?}", other),
        }
        assert_eq!(
            client.servers().find_active(Ssid(7)).unwrap().update_handle(),
            Some(handle)
        );
    }

    #[test]
    fn test_activation_rejects_duplicates() {
        let (mut client, _) = test_client();
        client.activate_server(&test_config(7)).unwrap();
        assert!(client.activate_server(&test_config(7)).is_err());
    }

    #[test]
    fn test_activation_while_offline_schedules_nothing() {
        let (mut client, state) = test_client();
        client.enter_offline();
        client.activate_server(&test_config(7)).unwrap();

        assert!(state.borrow().pending.is_empty());
        assert!(client.servers().find_active(Ssid(7)).is_some());
    }

    #[test]
    fn test_enter_offline_cancels_pending_updates() {
        let (mut client, state) = test_client();
        client.activate_server(&test_config(7)).unwrap();
        client.activate_server(&test_config(8)).unwrap();
        assert_eq!(state.borrow().pending.len(), 2);

        client.enter_offline();
        assert!(client.is_offline());
        assert!(state.borrow().pending.is_empty());
        assert_eq!(
            client.servers().find_active(Ssid(7)).unwrap().update_handle(),
            None
        );
    }

    #[test]
    fn test_deactivation_cancels_pending_update() {
        let (mut client, state) = test_client();
        client.activate_server(&test_config(7)).unwrap();

        assert!(client.deactivate_server(Ssid(7)));
        assert!(state.borrow().pending.is_empty());
        assert!(!client.deactivate_server(Ssid(7)));
    }

    #[test]
    fn test_registration_query_contents() {
        let (mut client, _) = test_client();
        let mut config = test_config(7);
        config.binding = Some("UQ".to_string());
        config.sms_msisdn = Some("+48123456789".to_string());
        client.activate_server(&config).unwrap();

        let query = client.registration_query(Ssid(7)).unwrap();
        assert_eq!(
            query,
            [
                "lwm2m=1.0",
                "ep=dev1",
                "lt=600",
                "b=UQ",
                "sms=+48123456789"
            ]
        );
    }

    #[test]
    fn test_registration_query_unknown_server() {
        let (client, _) = test_client();
        assert!(matches!(
            client.registration_query(Ssid(9)),
            Err(Error::NoActiveServer(9))
        ));
    }
}
