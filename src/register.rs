//! Registration lifecycle engine
//!
//! Keeps each active server's registration alive: schedules Updates,
//! decides between Update and Re-Register, survives network failures by
//! deferring to the scheduler's backoff, and folds the bootstrap server
//! into the same pipeline with its own post-reconnect hook.
//!
//! Per server, the connection moves through four modes:
//!
//! | Mode        | Meaning                                              |
//! |-------------|------------------------------------------------------|
//! | Unbound     | no connection selected (`ConnType::Wildcard`)        |
//! | Bound-Idle  | connection up, next Update scheduled                 |
//! | In-Request  | a Register/Update/Deregister exchange is under way   |
//! | Suspended   | socket disconnected after a network error            |
//!
//! A successful Register moves Unbound to Bound-Idle; a firing Update job
//! moves Bound-Idle to In-Request; a rejected Update falls back to
//! Unbound and forces a Re-Register; a network error suspends the
//! connection and leaves re-entry timing to the scheduler's retry
//! backoff.

use std::time::{Duration, Instant};

use crate::client::Client;
use crate::connection::Collaborators;
use crate::error::{Error, Result};
use crate::sched::{Job, RetryBackoff, SchedHandle, Scheduler, UpdateArgs};
use crate::server::{ActiveServer, ConnType, Ssid};

/// Update messages are targeted `lifetime / UPDATE_INTERVAL_MARGIN_FACTOR`
/// seconds before the registration expires, leaving one retry window.
pub const UPDATE_INTERVAL_MARGIN_FACTOR: u32 = 2;

/// To avoid flooding the network in case of a very small lifetime, Update
/// messages are not scheduled closer than this.
pub const MIN_UPDATE_INTERVAL: Duration = Duration::from_secs(1);

fn update_interval(server: &ActiveServer) -> Duration {
    server.registration_info.lifetime() / UPDATE_INTERVAL_MARGIN_FACTOR
}

fn schedule_update(
    scheduler: &mut dyn Scheduler,
    backoff: RetryBackoff,
    server: &ActiveServer,
    delay: Duration,
    reconnect_required: bool,
) -> Result<SchedHandle> {
    log::debug!(
        "scheduling update for SSID {} after {:?}",
        server.ssid(),
        delay
    );
    scheduler.schedule_retryable(
        delay,
        backoff,
        Job::Update(UpdateArgs {
            ssid: server.ssid(),
            reconnect_required,
        }),
    )
}

fn schedule_next_update(
    scheduler: &mut dyn Scheduler,
    backoff: RetryBackoff,
    server: &ActiveServer,
    now: Instant,
) -> Result<SchedHandle> {
    let remaining = server.registration_info.time_remaining(now);
    let mut delay = remaining.saturating_sub(update_interval(server));
    if delay < MIN_UPDATE_INTERVAL {
        delay = MIN_UPDATE_INTERVAL;
    }
    schedule_update(scheduler, backoff, server, delay, false)
}

fn reschedule_update_job(
    scheduler: &mut dyn Scheduler,
    backoff: RetryBackoff,
    server: &mut ActiveServer,
    now: Instant,
) -> Result<()> {
    scheduler.cancel(&mut server.update_handle);
    match schedule_next_update(scheduler, backoff, server, now) {
        Ok(handle) => {
            server.update_handle = Some(handle);
            Ok(())
        }
        Err(err) => {
            log::error!("could not schedule next Update for server {}", server.ssid());
            Err(err)
        }
    }
}

fn reschedule_update_for_server(
    scheduler: &mut dyn Scheduler,
    backoff: RetryBackoff,
    server: &mut ActiveServer,
    reconnect_required: bool,
) -> Result<()> {
    scheduler.cancel(&mut server.update_handle);
    match schedule_update(scheduler, backoff, server, Duration::ZERO, reconnect_required) {
        Ok(handle) => {
            server.update_handle = Some(handle);
            Ok(())
        }
        Err(err) => {
            log::error!("could not schedule update job for server {}", server.ssid());
            Err(err)
        }
    }
}

/// Queue an immediate Re-Register job for the server.
///
/// Re-Register goes through the scheduler rather than running inline so
/// its failures stay subject to the same retryable-job discipline.
fn force_reregister(scheduler: &mut dyn Scheduler, server: &ActiveServer) -> Result<()> {
    match scheduler.schedule_now(Job::Reregister(server.ssid())) {
        Ok(_) => Ok(()),
        Err(err) => {
            log::debug!("could not schedule server re-registration");
            Err(err)
        }
    }
}

fn send_update(
    scheduler: &mut dyn Scheduler,
    collab: &mut Collaborators<'_>,
    server: &mut ActiveServer,
    now: Instant,
) -> Result<()> {
    if let Err(err) = collab.connections.bind_stream(server) {
        log::error!("could not get stream for server {}", server.ssid());
        return Err(err);
    }

    let mut result = collab.protocol.update(server);
    if matches!(result, Err(Error::UpdateRejected)) {
        log::debug!(
            "update rejected for SSID = {}; re-registering",
            server.ssid()
        );
        result = force_reregister(scheduler, server);
    } else if let Err(err) = &result {
        log::error!("could not send registration update: {}", err);
    } else {
        let params = server.registration_info.last_update_params();
        server.registration_info.renew(now, params);
        collab.observe.flush_current_connection();
    }

    collab.connections.reset_stream();
    collab.connections.release_stream();
    result
}

fn update_or_reregister(
    scheduler: &mut dyn Scheduler,
    collab: &mut Collaborators<'_>,
    server: &mut ActiveServer,
    now: Instant,
) -> Result<()> {
    let mut needs_reregister = false;

    if server.registration_info.conn_type == ConnType::Wildcard
        || !collab.connections.is_online(server)
    {
        log::info!(
            "no valid existing connection to the registration interface for SSID = {}, \
             re-registering",
            server.ssid()
        );
        needs_reregister = true;
        collab.connections.setup_registration_connection(server)?;
    }

    if !needs_reregister && server.registration_info.is_expired(now) {
        log::debug!(
            "registration lifetime expired for SSID = {}, forcing re-register",
            server.ssid()
        );
        needs_reregister = true;
    }

    if needs_reregister {
        force_reregister(scheduler, server)
    } else {
        send_update(scheduler, collab, server, now)
    }
}

fn server_register(
    scheduler: &mut dyn Scheduler,
    backoff: RetryBackoff,
    collab: &mut Collaborators<'_>,
    server: &mut ActiveServer,
    now: Instant,
) -> Result<()> {
    collab.connections.setup_registration_connection(server)?;
    collab.connections.bind_stream(server)?;

    let result = collab.protocol.register(server);
    collab.connections.reset_stream();

    if result.is_ok() {
        let params = server.registration_info.last_update_params();
        server.registration_info.renew(now, params);

        scheduler.cancel(&mut server.update_handle);
        match schedule_next_update(scheduler, backoff, server, now) {
            Ok(handle) => server.update_handle = Some(handle),
            Err(_) => log::warn!("could not schedule Update for server {}", server.ssid()),
        }

        collab.observe.flush_current_connection();
        collab.bootstrap.notify_regular_connection_available();
    }

    collab.connections.release_stream();
    result
}

fn server_deregister(collab: &mut Collaborators<'_>, server: &mut ActiveServer) -> Result<()> {
    if server.registration_info.conn_type == ConnType::Wildcard
        || collab.connections.bind_stream(server).is_err()
    {
        log::error!(
            "could not get stream for server {}, skipping",
            server.ssid()
        );
        return Ok(());
    }

    let result = collab.protocol.deregister(server);
    if let Err(err) = &result {
        log::error!("could not send De-Register request: {}", err);
    }

    collab.connections.reset_stream();
    collab.connections.release_stream_without_scheduling_queue();
    result
}

impl Client {
    /// Execute a job delivered by the scheduler.
    ///
    /// `now` is the instant the scheduler fires the job at; all deadline
    /// arithmetic is relative to it. A non-error return means the job is
    /// done; an error invites the scheduler's retry-with-backoff.
    pub fn run_job(
        &mut self,
        collab: &mut Collaborators<'_>,
        job: Job,
        now: Instant,
    ) -> Result<()> {
        match job {
            Job::Update(args) => self.update_job(collab, args, now),
            Job::Reregister(ssid) => self.reregister_job(collab, ssid, now),
        }
    }

    fn update_job(
        &mut self,
        collab: &mut Collaborators<'_>,
        args: UpdateArgs,
        now: Instant,
    ) -> Result<()> {
        debug_assert!(args.ssid != Ssid::ANY);

        let backoff = self.retry_backoff;
        let scheduler = self.scheduler.as_mut();
        let server = match self.servers.find_active_mut(args.ssid) {
            Some(server) => server,
            None => {
                log::debug!(
                    "update job fired for SSID {} which is not an active server",
                    args.ssid
                );
                return Ok(());
            }
        };
        let is_bootstrap = server.is_bootstrap();

        collab
            .connections
            .refresh(server, args.reconnect_required)?;

        if args.reconnect_required && is_bootstrap {
            collab.bootstrap.update_reconnected()?;
        } else if !is_bootstrap {
            if let Err(err) = update_or_reregister(scheduler, collab, server, now) {
                if matches!(err, Error::Network) {
                    log::error!(
                        "network communication error while updating registration \
                         for SSID = {}",
                        args.ssid
                    );
                    // Scheduling our own reconnect here would mean an endless
                    // loop without backoff if the server is down. Disconnect
                    // the socket instead and rely on the scheduler's backoff;
                    // the next refresh will reconnect it.
                    collab.connections.suspend(server);
                }
                return Err(err);
            }
        }

        // Updates are retryable, so rescheduling only happens after success
        reschedule_update_job(scheduler, backoff, server, now)
    }

    fn reregister_job(
        &mut self,
        collab: &mut Collaborators<'_>,
        ssid: Ssid,
        now: Instant,
    ) -> Result<()> {
        let backoff = self.retry_backoff;
        let scheduler = self.scheduler.as_mut();
        let server = match self.servers.find_active_mut(ssid) {
            Some(server) => server,
            None => {
                log::debug!(
                    "ignoring forced re-registration of server {}: not an active server",
                    ssid
                );
                return Ok(());
            }
        };

        if server_register(scheduler, backoff, collab, server, now).is_err() {
            log::debug!("re-registration failed");
            self.deactivate_server(ssid);
        }
        Ok(())
    }

    /// Cancel the server's pending Update and schedule a fresh one at
    /// delay zero.
    ///
    /// With [`Ssid::ANY`], every active server is rescheduled; the first
    /// failure is remembered but all servers are attempted. Fails without
    /// touching the scheduler while the client is offline.
    pub fn schedule_registration_update(&mut self, ssid: Ssid) -> Result<()> {
        if self.offline {
            log::error!("cannot schedule registration update while being offline");
            return Err(Error::Offline);
        }

        if ssid == Ssid::ANY {
            self.reschedule_update_for_all_servers(false)
        } else {
            let backoff = self.retry_backoff;
            let scheduler = self.scheduler.as_mut();
            match self.servers.find_active_mut(ssid) {
                Some(server) => {
                    reschedule_update_for_server(scheduler, backoff, server, false)
                }
                None => {
                    log::error!("no active server with SSID = {}", ssid);
                    Err(Error::NoActiveServer(ssid.0))
                }
            }
        }
    }

    /// Schedule reconnect attempts for every active server and, once all
    /// of them are queued, clear the offline flag. This is how the client
    /// comes back online.
    pub fn schedule_reconnect(&mut self) -> Result<()> {
        self.reschedule_update_for_all_servers(true)?;
        self.offline = false;
        Ok(())
    }

    /// Schedule a reconnect attempt for a single active server.
    pub fn schedule_server_reconnect(&mut self, ssid: Ssid) -> Result<()> {
        let backoff = self.retry_backoff;
        let scheduler = self.scheduler.as_mut();
        match self.servers.find_active_mut(ssid) {
            Some(server) => reschedule_update_for_server(scheduler, backoff, server, true),
            None => {
                log::error!("no active server with SSID = {}", ssid);
                Err(Error::NoActiveServer(ssid.0))
            }
        }
    }

    /// Send a best-effort De-Register for an active server.
    ///
    /// Never retried; an unbound connection or stream failure is logged
    /// and treated as success.
    pub fn deregister_server(
        &mut self,
        collab: &mut Collaborators<'_>,
        ssid: Ssid,
    ) -> Result<()> {
        match self.servers.find_active_mut(ssid) {
            Some(server) => server_deregister(collab, server),
            None => {
                log::error!("no active server with SSID = {}", ssid);
                Err(Error::NoActiveServer(ssid.0))
            }
        }
    }

    fn reschedule_update_for_all_servers(&mut self, reconnect_required: bool) -> Result<()> {
        let backoff = self.retry_backoff;
        let scheduler = self.scheduler.as_mut();
        let mut result = Ok(());
        for server in self.servers.iter_mut() {
            let partial =
                reschedule_update_for_server(scheduler, backoff, server, reconnect_required);
            if result.is_ok() {
                result = partial;
            }
        }
        result
    }
}
