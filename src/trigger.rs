//! Lifecycle triggers fired by the dispatcher.

use crate::agent::{Agent, SetupReport, UpgradeReport};
use crate::cache::{CacheStorage, Served};
use crate::error::AgentResult;
use crate::http::Request;

/// A lifecycle event the engine reacts to.
#[derive(Debug)]
pub enum Trigger {
  /// A new generation is being installed
  Setup,
  /// The installed generation takes over
  Upgrade,
  /// A page issued a request
  Intercept(Request),
}

/// What a trigger produced once its handler completed.
#[derive(Debug)]
pub enum TriggerOutcome {
  Installed(SetupReport),
  Activated(UpgradeReport),
  Responded(Served),
}

impl<S: CacheStorage> Agent<S> {
  /// Run the handler for `trigger`.
  ///
  /// The trigger counts as finished when the returned future resolves; work
  /// spawned by an intercept keeps running until [`Agent::settle`].
  pub async fn dispatch(&self, trigger: Trigger) -> AgentResult<TriggerOutcome> {
    match trigger {
      Trigger::Setup => self.on_setup().await.map(TriggerOutcome::Installed),
      Trigger::Upgrade => self.on_upgrade().await.map(TriggerOutcome::Activated),
      Trigger::Intercept(request) => self
        .intercept(&request)
        .await
        .map(TriggerOutcome::Responded),
    }
  }
}
