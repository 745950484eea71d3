// SPDX-FileCopyrightText: 2026 Joe Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The per-channel message pipeline.
//!
//! One [`ProcessingService`] is bound to one chat channel of one transport.
//! Transports spawn a task per inbound event and call
//! [`ProcessingService::handle`]; the user's session lock serialises
//! commands of a single user while different users run in parallel.

use std::sync::Arc;

use chrono::Duration;
use joe_config::JoeConfig;
use joe_config::model::ChannelConfig;
use joe_core::types::{
    CloneInfo, CommandRecord, DblabParams, IncomingMessage, Message, MessageKind, MessageStatus,
    PlatformSession,
};
use joe_core::{
    Clock, ConnectionFactory, DblabClient, JoeError, Messenger, PlanAnalyzer, PlatformClient,
    PsqlRunner, UserInformer, Validator,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::clone::{CloneDirectory, CloneManager};
use crate::commands::help::help_message;
use crate::commands::{
    CommandContext, CommandHandler, ExecCommand, ExplainCommand, HypoCommand, MetaCommand,
    PlanCommand,
};
use crate::edition::EditionPack;
use crate::parser::{Command, hint_for, normalize, parse};
use crate::session::{Session, SessionState};
use crate::users::{User, UserRegistry};

pub const SESSION_STARTING: &str = "Starting new session...";
pub const SESSION_CLOSED_BY_DBLAB: &str = "Session was closed by Database Lab.";
pub const RESET_STARTED: &str = "Resetting the state of the database...";
pub const RESET_DONE: &str = "The state of the database has been reset.";

/// Settings of one channel's pipeline.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub transport: String,
    pub channel_id: String,
    pub project: String,
    pub version: String,
    pub min_notify_secs: u64,
    pub quota_limit: u32,
    pub quota_interval_secs: u64,
    pub audit_enabled: bool,
    pub history_enabled: bool,
    pub unfurl_links: bool,
    pub instance_limit: u32,
    pub dblab_params: DblabParams,
    /// Platform id of the Database Lab instance, registered by the web UI transport.
    pub platform_instance_id: Option<String>,
}

impl ServiceConfig {
    pub fn from_config(config: &JoeConfig, transport: &str, channel: &ChannelConfig) -> Self {
        let project = if channel.project.is_empty() {
            config.platform.project.clone()
        } else {
            channel.project.clone()
        };

        Self {
            transport: transport.to_string(),
            channel_id: channel.channel_id.clone(),
            project,
            version: config.app.version.clone(),
            min_notify_secs: config.app.min_notify_duration,
            quota_limit: config.enterprise.quota.limit,
            quota_interval_secs: config.enterprise.quota.interval,
            audit_enabled: config.enterprise.audit.enabled,
            history_enabled: config.platform.history_enabled,
            unfurl_links: false,
            instance_limit: config.enterprise.dblab.instance_limit,
            dblab_params: DblabParams::from(&channel.dblab_params),
            platform_instance_id: None,
        }
    }
}

/// Collaborators shared by all channels of a transport.
#[derive(Clone)]
pub struct ServiceDeps {
    pub messenger: Arc<dyn Messenger>,
    pub validator: Arc<dyn Validator>,
    pub informer: Arc<dyn UserInformer>,
    pub platform: Option<Arc<dyn PlatformClient>>,
    pub connections: Arc<dyn ConnectionFactory>,
    pub analyzer: Arc<dyn PlanAnalyzer>,
    pub psql: Arc<dyn PsqlRunner>,
    pub edition: EditionPack,
    pub clock: Arc<dyn Clock>,
}

/// Collaborators that do not depend on the chat transport.
#[derive(Clone)]
pub struct EngineDeps {
    pub platform: Option<Arc<dyn PlatformClient>>,
    pub connections: Arc<dyn ConnectionFactory>,
    pub analyzer: Arc<dyn PlanAnalyzer>,
    pub psql: Arc<dyn PsqlRunner>,
    pub edition: EditionPack,
    pub clock: Arc<dyn Clock>,
}

impl EngineDeps {
    /// Completes the engine collaborators with a transport's own.
    pub fn with_transport(
        self,
        messenger: Arc<dyn Messenger>,
        validator: Arc<dyn Validator>,
        informer: Arc<dyn UserInformer>,
    ) -> ServiceDeps {
        ServiceDeps {
            messenger,
            validator,
            informer,
            platform: self.platform,
            connections: self.connections,
            analyzer: self.analyzer,
            psql: self.psql,
            edition: self.edition,
            clock: self.clock,
        }
    }
}

/// State shared by all channels of one transport.
///
/// A user has one session per transport; it lives in the channel the user
/// last wrote to.
#[derive(Clone)]
pub struct SharedState {
    pub users: Arc<UserRegistry>,
    pub clones: CloneDirectory,
}

impl SharedState {
    pub fn new(deps: &ServiceDeps, quota_limit: u32, quota_interval_secs: u64) -> Self {
        Self {
            users: Arc::new(UserRegistry::new(
                Arc::clone(&deps.informer),
                Arc::clone(&deps.clock),
                quota_limit,
                quota_interval_secs,
            )),
            clones: CloneDirectory::default(),
        }
    }
}

pub struct ProcessingService {
    pub(crate) config: ServiceConfig,
    pub(crate) deps: ServiceDeps,
    pub(crate) shared: SharedState,
    pub(crate) users: Arc<UserRegistry>,
    pub(crate) clones: Arc<CloneManager>,
    pub(crate) cancel: CancellationToken,
}

impl ProcessingService {
    /// A service with its own user registry.
    pub fn new(
        config: ServiceConfig,
        deps: ServiceDeps,
        dblab: Arc<dyn DblabClient>,
        cancel: CancellationToken,
    ) -> Self {
        let shared = SharedState::new(&deps, config.quota_limit, config.quota_interval_secs);
        Self::with_shared(config, deps, dblab, shared, cancel)
    }

    /// A service whose users are shared with the other channels of its transport.
    pub fn with_shared(
        config: ServiceConfig,
        deps: ServiceDeps,
        dblab: Arc<dyn DblabClient>,
        shared: SharedState,
        cancel: CancellationToken,
    ) -> Self {
        let clones = Arc::new(CloneManager::new(
            dblab,
            Arc::clone(&deps.connections),
            config.dblab_params.clone(),
            config.instance_limit,
        ));

        Self {
            config,
            deps,
            users: Arc::clone(&shared.users),
            shared,
            clones,
            cancel,
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn users(&self) -> &UserRegistry {
        &self.users
    }

    pub fn clones(&self) -> &Arc<CloneManager> {
        &self.clones
    }

    pub fn shared(&self) -> &SharedState {
        &self.shared
    }

    /// Whether the session belongs to this service's channel.
    pub(crate) fn owns(&self, session: &Session) -> bool {
        session.channel_id == self.config.channel_id
    }

    pub fn messenger(&self) -> &Arc<dyn Messenger> {
        &self.deps.messenger
    }

    /// Processes one event and logs the outcome.
    pub async fn handle(&self, incoming: IncomingMessage) {
        let user_id = incoming.user_id.clone();
        let channel_id = incoming.channel_id.clone();

        match self.process_message(incoming).await {
            Ok(()) => {}
            Err(JoeError::Validation(reason)) => {
                debug!(
                    user_id = user_id.as_str(),
                    channel_id = channel_id.as_str(),
                    %reason,
                    "message dropped"
                );
            }
            Err(JoeError::Cancelled) => {
                debug!(
                    user_id = user_id.as_str(),
                    channel_id = channel_id.as_str(),
                    "processing cancelled"
                );
            }
            Err(e) => {
                error!(
                    user_id = user_id.as_str(),
                    channel_id = channel_id.as_str(),
                    error = %e,
                    "failed to process message"
                );
            }
        }
    }

    /// Runs the full pipeline for one inbound event.
    ///
    /// Errors shown to the user are handled here; the returned error means the
    /// message was dropped or the failure could not be presented.
    pub async fn process_message(&self, incoming: IncomingMessage) -> Result<(), JoeError> {
        self.deps.validator.validate(&incoming)?;

        let user = self
            .users
            .get_or_create(&incoming.user_id, &incoming.channel_id, incoming.direct)
            .await?;
        let mut session = user.session.lock().await;

        if session.channel_id != incoming.channel_id {
            info!(
                user_id = incoming.user_id.as_str(),
                from = session.channel_id.as_str(),
                to = incoming.channel_id.as_str(),
                "user switched channels, closing previous session"
            );
            let previous = self
                .shared
                .clones
                .get(&session.channel_id)
                .await
                .unwrap_or_else(|| Arc::clone(&self.clones));
            if let Err(e) = previous.destroy_session(&mut session).await {
                warn!(error = %e, "failed to destroy previous session");
            }
            session.channel_id = incoming.channel_id.clone();
        }
        session.direct = incoming.direct;

        let text = match &incoming.snippet_url {
            Some(url) => match self.deps.messenger.download_artifact(url).await {
                Ok(body) => body,
                Err(e) => {
                    let mut msg = Message::reply_to(&incoming, "");
                    return self.present_failure(&mut msg, &e).await;
                }
            },
            None => incoming.text.clone(),
        };
        let text = normalize(&text, self.config.unfurl_links);
        let (token, query) = parse(&text);

        if let Some(hint) = hint_for(&token, &query) {
            let mut note = Message::reply_to(&incoming, hint).with_kind(MessageKind::Ephemeral);
            if let Err(e) = self.deps.messenger.publish(&mut note).await {
                warn!(error = %e, "failed to publish hint");
            }
        }

        let Some(command) = Command::from_token(&token) else {
            debug!(command = token.as_str(), "unsupported command");
            return Ok(());
        };

        let mut msg = Message::reply_to(&incoming, format!("```{text}```"));
        if !incoming.direct {
            let secs = i64::try_from(self.config.min_notify_secs)
                .unwrap_or(i64::MAX)
                .min(i64::MAX / 1000);
            msg.set_notify_at(self.deps.clock.now() + Duration::seconds(secs));
        }

        if let Err(e) = session.quota.request(self.deps.clock.now()) {
            return self.present_failure(&mut msg, &e).await;
        }

        if self.config.audit_enabled {
            info!(
                target: "joe::audit",
                id = user.info.id.as_str(),
                name = user.info.display_name.as_str(),
                real_name = user.info.real_name.as_str(),
                command = command.name(),
                query = query.as_str(),
                "audit"
            );
        }

        if command == Command::Help {
            msg.set_text(help_message(
                self.deps.edition.entertainer.as_ref(),
                &self.config.version,
            ));
            return self.deps.messenger.publish(&mut msg).await;
        }

        if let Err(e) = self.ensure_session(&mut session, &user, &incoming).await {
            return self.present_failure(&mut msg, &e).await;
        }
        if !incoming.direct {
            msg.session_id = session.platform_session_id.clone();
        }

        self.deps.messenger.publish(&mut msg).await?;
        self.deps
            .messenger
            .update_status(&mut msg, MessageStatus::Running)
            .await?;

        let mut record = CommandRecord::new(command.name(), query.as_str());
        record.session_id = session.platform_session_id.clone();

        let result = self
            .dispatch(&command, &mut session, &user, &incoming, &mut record, &mut msg)
            .await;

        if let Err(err) = result {
            if matches!(err, JoeError::Cancelled) || self.cancel.is_cancelled() {
                return Err(JoeError::Cancelled);
            }
            record.error = err.to_string();

            if err.is_connection_error()
                && let Some(clone_id) = session.clone_id().map(str::to_string)
                && !self.clones.is_active(&clone_id).await
            {
                warn!(clone_id = clone_id.as_str(), error = %err, "clone is gone, stopping session");
                msg.append_text(SESSION_CLOSED_BY_DBLAB);
                self.clones.stop_session(&mut session).await;
            }

            self.present_failure(&mut msg, &err).await?;
            if let Err(e) = self.persist(&record, &mut msg, &command).await {
                warn!(error = %e, "failed to save failed command");
            }
            return Ok(());
        }

        if let Err(e) = self.persist(&record, &mut msg, &command).await {
            return self.present_failure(&mut msg, &e).await;
        }

        session.touch(self.deps.clock.now());
        self.deps.messenger.ok(&mut msg, self.deps.clock.now()).await
    }

    async fn dispatch(
        &self,
        command: &Command,
        session: &mut Session,
        user: &User,
        incoming: &IncomingMessage,
        record: &mut CommandRecord,
        msg: &mut Message,
    ) -> Result<(), JoeError> {
        if *command == Command::Reset {
            return self.reset(session, user, incoming, record, msg).await;
        }

        let (Some(connection), Some(params)) =
            (session.connection(), session.connection_params().cloned())
        else {
            return Err(JoeError::session("session has no active clone"));
        };

        let builder = &self.deps.edition.builder;
        let handler: Arc<dyn CommandHandler> = match command {
            Command::Plan => Arc::new(PlanCommand),
            Command::Explain => Arc::new(ExplainCommand),
            Command::Exec => Arc::new(ExecCommand),
            Command::Hypo => Arc::new(HypoCommand),
            Command::Activity => builder.activity(),
            Command::Terminate => builder.terminate(),
            Command::Meta(_) => Arc::new(MetaCommand),
            Command::Help | Command::Reset => {
                return Err(JoeError::Internal(format!(
                    "`{}` has no handler",
                    command.name()
                )));
            }
        };

        let ctx = CommandContext {
            messenger: self.deps.messenger.as_ref(),
            connection,
            params: &params,
            connections: self.deps.connections.as_ref(),
            analyzer: self.deps.analyzer.as_ref(),
            psql: self.deps.psql.as_ref(),
            estimator: builder.estimator(),
            cancel: &self.cancel,
        };
        handler.execute(&ctx, record, msg).await
    }

    async fn reset(
        &self,
        session: &mut Session,
        user: &User,
        incoming: &IncomingMessage,
        record: &mut CommandRecord,
        msg: &mut Message,
    ) -> Result<(), JoeError> {
        msg.append_text(RESET_STARTED);
        self.deps.messenger.update_text(msg).await?;

        if self.clones.reset(session).await?.is_some() {
            self.ensure_platform_session(session, user, incoming).await?;
            record.session_id = session.platform_session_id.clone();
        }
        if self.cancel.is_cancelled() {
            return Err(JoeError::Cancelled);
        }

        msg.append_text(RESET_DONE);
        record.response = RESET_DONE.to_string();
        self.deps.messenger.update_text(msg).await
    }

    /// Acquires a clone when needed and announces new sessions.
    async fn ensure_session(
        &self,
        session: &mut Session,
        user: &User,
        incoming: &IncomingMessage,
    ) -> Result<(), JoeError> {
        let mut banner = if session.state() == SessionState::Empty {
            let mut banner = Message::reply_to(incoming, SESSION_STARTING);
            if let Err(e) = self.deps.messenger.publish(&mut banner).await {
                warn!(error = %e, "failed to publish session banner");
            }
            Some(banner)
        } else {
            None
        };

        let acquired = self.clones.ensure_clone(session).await?;

        if let Some(clone) = acquired {
            let details = session_started(&clone, &self.config.dblab_params.dbname, session);
            let banner = match banner.as_mut() {
                Some(banner) if banner.is_published() => {
                    banner.set_text(details);
                    self.deps.messenger.update_text(banner).await
                }
                _ => {
                    let mut fresh = Message::reply_to(incoming, details);
                    self.deps.messenger.publish(&mut fresh).await
                }
            };
            if let Err(e) = banner {
                warn!(error = %e, "failed to announce session");
            }
        }

        self.ensure_platform_session(session, user, incoming).await
    }

    /// Links the session to platform history.
    async fn ensure_platform_session(
        &self,
        session: &mut Session,
        user: &User,
        incoming: &IncomingMessage,
    ) -> Result<(), JoeError> {
        if incoming.direct {
            session.platform_session_id = incoming.session_id.clone().unwrap_or_default();
            return Ok(());
        }

        let Some(platform) = self.deps.platform.as_ref() else {
            return Ok(());
        };
        if !self.config.history_enabled || !session.platform_session_id.is_empty() {
            return Ok(());
        }

        let request = PlatformSession {
            project: self.config.project.clone(),
            user_id: user.info.id.clone(),
            user_name: user.info.display_name.clone(),
            channel_id: incoming.channel_id.clone(),
            dblab_instance_id: self.config.platform_instance_id.clone(),
        };
        session.platform_session_id = platform.create_session(&request).await?;
        debug!(
            platform_session_id = session.platform_session_id.as_str(),
            "platform session created"
        );
        Ok(())
    }

    /// Saves the command to platform history and links it from `explain` output.
    async fn persist(
        &self,
        record: &CommandRecord,
        msg: &mut Message,
        command: &Command,
    ) -> Result<(), JoeError> {
        if !self.config.history_enabled {
            return Ok(());
        }
        let Some(platform) = self.deps.platform.as_ref() else {
            return Ok(());
        };

        let posted = platform.post_command(record).await?;
        if *command == Command::Explain && !posted.permalink.is_empty() {
            msg.append_text(&format!("Details: {}", posted.permalink));
            if let Err(e) = self.deps.messenger.update_text(msg).await {
                warn!(error = %e, "failed to append command permalink");
            }
        }
        Ok(())
    }

    /// Shows `err` on the message unless the service is shutting down.
    async fn present_failure(&self, msg: &mut Message, err: &JoeError) -> Result<(), JoeError> {
        if self.cancel.is_cancelled() {
            return Err(JoeError::Cancelled);
        }
        debug!(error = %err, "command failed");
        self.deps.messenger.fail(msg, &err.to_string()).await
    }
}

fn session_started(clone: &CloneInfo, dbname: &str, session: &Session) -> String {
    let data_state = if clone.metadata.data_state_at.is_empty() {
        "unknown"
    } else {
        clone.metadata.data_state_at.as_str()
    };
    format!(
        "Session started\nClone: `{}`\nDatabase: `{dbname}`\nData state at: {data_state}\nThe session will be stopped after {} minutes of inactivity",
        clone.id, session.idle_limit_minutes
    )
}
