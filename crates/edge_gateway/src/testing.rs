//! Actors for unit tests that only need to observe what they are sent.

use ractor::{Actor, ActorProcessingErr, ActorRef};
use std::marker::PhantomData;
use tokio::sync::mpsc;

/// Forwards every message into a channel.
pub(crate) struct Forward<M>(PhantomData<fn() -> M>);

impl<M: Send + 'static> Actor for Forward<M> {
    type Msg = M;
    type State = mpsc::UnboundedSender<M>;
    type Arguments = mpsc::UnboundedSender<M>;

    async fn pre_start(&self, _myself: ActorRef<M>, tx: Self::Arguments) -> Result<Self::State, ActorProcessingErr> {
        Ok(tx)
    }

    async fn handle(&self, _myself: ActorRef<M>, message: M, tx: &mut Self::State) -> Result<(), ActorProcessingErr> {
        let _ = tx.send(message);
        Ok(())
    }
}

/// Spawns a [`Forward`] actor under `name`.
pub(crate) async fn forward<M: Send + 'static>(name: &str) -> (ActorRef<M>, mpsc::UnboundedReceiver<M>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let (actor, _) = Actor::spawn(Some(name.to_string()), Forward(PhantomData), tx)
        .await
        .unwrap();
    (actor, rx)
}
