// SPDX-FileCopyrightText: 2026 Joe Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Edition packs.
//!
//! An [`EditionPack`] bundles the two edition hooks: a [`CommandBuilder`] for
//! edition-dependent commands and an [`Entertainer`] naming the edition in
//! help output. Exactly one pack is chosen when the assistant starts.

use std::sync::Arc;

use async_trait::async_trait;
use joe_config::model::EstimatorConfig;
use joe_core::JoeError;
use joe_core::types::{CommandRecord, Message};

use crate::commands::{ActivityCommand, CommandContext, CommandHandler, TerminateCommand};
use crate::estimator::Estimator;

pub const COMMUNITY_EDITION: &str = "Community";
pub const ENTERPRISE_EDITION: &str = "Enterprise";

pub trait CommandBuilder: Send + Sync {
    fn activity(&self) -> Arc<dyn CommandHandler>;
    fn terminate(&self) -> Arc<dyn CommandHandler>;
    /// Timing estimator attached to `explain`, if the edition has one.
    fn estimator(&self) -> Option<&Estimator>;
}

pub trait Entertainer: Send + Sync {
    fn edition(&self) -> &str;
    fn help_addendum(&self) -> &str;
}

/// Replies that the command belongs to the Enterprise Edition.
#[derive(Debug)]
pub struct EnterpriseOnly {
    command: &'static str,
}

impl EnterpriseOnly {
    pub fn message(&self) -> String {
        format!("`{}` is available only in the Enterprise Edition", self.command)
    }
}

#[async_trait]
impl CommandHandler for EnterpriseOnly {
    async fn execute(
        &self,
        ctx: &CommandContext<'_>,
        record: &mut CommandRecord,
        msg: &mut Message,
    ) -> Result<(), JoeError> {
        let reply = self.message();
        msg.append_text(&reply);
        record.response = reply;
        ctx.refresh(msg).await
    }
}

#[derive(Debug, Default)]
pub struct CommunityBuilder;

impl CommandBuilder for CommunityBuilder {
    fn activity(&self) -> Arc<dyn CommandHandler> {
        Arc::new(EnterpriseOnly {
            command: "activity",
        })
    }

    fn terminate(&self) -> Arc<dyn CommandHandler> {
        Arc::new(EnterpriseOnly {
            command: "terminate",
        })
    }

    fn estimator(&self) -> Option<&Estimator> {
        None
    }
}

#[derive(Debug)]
pub struct EnterpriseBuilder {
    estimator: Estimator,
}

impl EnterpriseBuilder {
    pub fn new(estimator: EstimatorConfig) -> Self {
        Self {
            estimator: Estimator::new(estimator),
        }
    }
}

impl CommandBuilder for EnterpriseBuilder {
    fn activity(&self) -> Arc<dyn CommandHandler> {
        Arc::new(ActivityCommand)
    }

    fn terminate(&self) -> Arc<dyn CommandHandler> {
        Arc::new(TerminateCommand)
    }

    fn estimator(&self) -> Option<&Estimator> {
        Some(&self.estimator)
    }
}

#[derive(Debug, Default)]
pub struct CommunityEntertainer;

impl Entertainer for CommunityEntertainer {
    fn edition(&self) -> &str {
        COMMUNITY_EDITION
    }

    fn help_addendum(&self) -> &str {
        "`activity` and `terminate` are available in the Enterprise Edition."
    }
}

#[derive(Debug, Default)]
pub struct EnterpriseEntertainer;

impl Entertainer for EnterpriseEntertainer {
    fn edition(&self) -> &str {
        ENTERPRISE_EDITION
    }

    fn help_addendum(&self) -> &str {
        ""
    }
}

#[derive(Clone)]
pub struct EditionPack {
    pub builder: Arc<dyn CommandBuilder>,
    pub entertainer: Arc<dyn Entertainer>,
}

impl std::fmt::Debug for EditionPack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditionPack")
            .field("edition", &self.entertainer.edition())
            .finish()
    }
}

impl EditionPack {
    pub fn community() -> Self {
        Self {
            builder: Arc::new(CommunityBuilder),
            entertainer: Arc::new(CommunityEntertainer),
        }
    }

    pub fn enterprise(estimator: EstimatorConfig) -> Self {
        Self {
            builder: Arc::new(EnterpriseBuilder::new(estimator)),
            entertainer: Arc::new(EnterpriseEntertainer),
        }
    }

    pub fn edition(&self) -> &str {
        self.entertainer.edition()
    }
}
