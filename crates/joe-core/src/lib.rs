// SPDX-FileCopyrightText: 2026 Joe Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Joe assistant.
//!
//! Error type, shared data model and the collaborator traits that transports,
//! HTTP clients and the processing engine meet at.

pub mod clock;
pub mod error;
pub mod text;
pub mod traits;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::JoeError;
pub use types::{
    CloneInfo, CommandRecord, ConnectionParams, DblabParams, IncomingMessage, Message,
    MessageKind, MessageStatus, QueryRows, Tip, UserInfo,
};

pub use traits::{
    ConnectionFactory, DblabClient, Messenger, PlanAnalyzer, PlatformClient, PsqlRunner,
    SqlConnection, UserInformer, Validator,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collaborator_traits_are_object_safe() {
        fn _messenger(_: &dyn Messenger) {}
        fn _dblab(_: &dyn DblabClient) {}
        fn _platform(_: &dyn PlatformClient) {}
        fn _sql(_: &dyn SqlConnection) {}
        fn _factory(_: &dyn ConnectionFactory) {}
        fn _psql(_: &dyn PsqlRunner) {}
        fn _analyzer(_: &dyn PlanAnalyzer) {}
        fn _informer(_: &dyn UserInformer) {}
        fn _validator(_: &dyn Validator) {}
    }
}
