//! # Group: run actors together, stop them together.
//!
//! A [`Group`] runs every registered actor concurrently and applies
//! **first exit wins**: as soon as one `execute` returns, every *other* actor is
//! interrupted exactly once with the error that caused the exit (`None` for a
//! clean exit). `run` returns once all `execute` calls have returned, yielding the
//! first result.
//!
//! ```text
//! run(self)
//!   ├─► spawn execute[0..N]                  (one task per actor)
//!   ├─► first (index, result) arrives
//!   ├─► spawn interrupt[i](cause) for i != index   (concurrently, at most once each)
//!   ├─► join remaining executes and interrupt calls together
//!   └─► return first result
//! ```
//!
//! ## Rules
//! - Zero actors: `run` returns `Ok(())` immediately.
//! - `run` consumes the group; registration is frozen once it starts.
//! - Panics are **not** caught: a panicking `execute` or `interrupt` is resumed on
//!   the caller of `run`.
//! - Executes are never aborted; a misbehaving actor that ignores its interrupt
//!   keeps `run` pending.

use std::future::Future;
use std::panic;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::task::{JoinError, JoinSet};

use crate::core::actor::ActorRef;
use crate::error::ActorError;
use crate::events::{Bus, Event, EventKind, PublishExt};

type ExecuteFuture = BoxFuture<'static, Result<(), ActorError>>;
type InterruptFn = Box<dyn FnOnce(Option<ActorError>) -> BoxFuture<'static, ()> + Send>;

struct Member {
    name: Arc<str>,
    execute: ExecuteFuture,
    interrupt: InterruptFn,
}

/// Collection of actors sharing one lifetime.
///
/// ## Example
/// ```rust
/// use gracevisor::{ActorError, Group};
/// use tokio_util::sync::CancellationToken;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let mut group = Group::new();
///
/// group.add("done", async { Ok(()) }, |_cause| async {});
///
/// let stop = CancellationToken::new();
/// let wait = stop.clone();
/// group.add(
///     "waiter",
///     async move {
///         wait.cancelled().await;
///         Ok(())
///     },
///     move |_cause: Option<ActorError>| async move { stop.cancel() },
/// );
///
/// assert_eq!(group.run().await, Ok(()));
/// # }
/// ```
#[derive(Default)]
pub struct Group {
    members: Vec<Member>,
    bus: Option<Bus>,
}

impl Group {
    /// Creates an empty group.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes actor lifecycle events on `bus`.
    #[must_use]
    pub fn with_bus(mut self, bus: Bus) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Registers an actor given as an `execute` future and an `interrupt` callback.
    ///
    /// `interrupt` receives the error that stopped the group and must cause
    /// `execute` to return.
    pub fn add<E, I, F>(&mut self, name: impl Into<Arc<str>>, execute: E, interrupt: I)
    where
        E: Future<Output = Result<(), ActorError>> + Send + 'static,
        I: FnOnce(Option<ActorError>) -> F + Send + 'static,
        F: Future<Output = ()> + Send + 'static,
    {
        self.members.push(Member {
            name: name.into(),
            execute: execute.boxed(),
            interrupt: Box::new(move |cause| interrupt(cause).boxed()),
        });
    }

    /// Registers a trait actor.
    pub fn register(&mut self, actor: ActorRef) {
        let name: Arc<str> = actor.name().into();
        let runner = Arc::clone(&actor);
        self.add(
            name,
            async move { runner.execute().await },
            move |cause| async move { actor.interrupt(cause).await },
        );
    }

    /// Registers several trait actors, keeping their order.
    pub fn register_all(&mut self, actors: impl IntoIterator<Item = ActorRef>) {
        for actor in actors {
            self.register(actor);
        }
    }

    /// Number of registered actors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// True if no actor is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Runs all actors until every `execute` has returned; yields the first result.
    ///
    /// Must be called inside a tokio runtime.
    pub async fn run(self) -> Result<(), ActorError> {
        let Group { members, bus } = self;
        if members.is_empty() {
            return Ok(());
        }

        let mut names = Vec::with_capacity(members.len());
        let mut interrupts = Vec::with_capacity(members.len());
        let mut executes = JoinSet::new();

        for (idx, member) in members.into_iter().enumerate() {
            bus.emit(|| Event::new(EventKind::ActorStarting).with_actor(Arc::clone(&member.name)));
            names.push(member.name);
            interrupts.push(Some(member.interrupt));

            let execute = member.execute;
            executes.spawn(async move { (idx, execute.await) });
        }

        let Some(joined) = executes.join_next().await else {
            return Ok(());
        };
        let (winner, first) = settle(joined);
        if let Some(idx) = winner {
            publish_exit(&bus, &names[idx], &first);
        }

        let cause = first.as_ref().err().cloned();
        let mut pending = JoinSet::new();
        for (idx, slot) in interrupts.iter_mut().enumerate() {
            if Some(idx) == winner {
                continue;
            }
            if let Some(interrupt) = slot.take() {
                bus.emit(|| {
                    Event::new(EventKind::InterruptRequested)
                        .with_actor(Arc::clone(&names[idx]))
                        .with_cause(cause.as_ref())
                });
                pending.spawn(interrupt(cause.clone()));
            }
        }

        // An interrupt may panic before releasing its execute; surface it right away.
        loop {
            tokio::select! {
                Some(joined) = pending.join_next() => {
                    if let Err(err) = joined {
                        resume_if_panicked(err);
                    }
                }
                Some(joined) = executes.join_next() => {
                    if let (Some(idx), result) = settle(joined) {
                        publish_exit(&bus, &names[idx], &result);
                    }
                }
                else => break,
            }
        }

        bus.emit(|| Event::new(EventKind::GroupStopped).with_cause(first.as_ref().err()));
        first
    }
}

/// Unpacks a joined execute; panics are resumed, cancellation maps to [`ActorError::Canceled`].
fn settle(
    joined: Result<(usize, Result<(), ActorError>), JoinError>,
) -> (Option<usize>, Result<(), ActorError>) {
    match joined {
        Ok((idx, result)) => (Some(idx), result),
        Err(err) => {
            resume_if_panicked(err);
            (None, Err(ActorError::Canceled))
        }
    }
}

fn resume_if_panicked(err: JoinError) {
    if let Ok(payload) = err.try_into_panic() {
        panic::resume_unwind(payload);
    }
}

fn publish_exit(bus: &Option<Bus>, name: &Arc<str>, result: &Result<(), ActorError>) {
    bus.emit(|| {
        Event::new(EventKind::ActorExited)
            .with_actor(Arc::clone(name))
            .with_cause(result.as_ref().err())
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::actor::ActorFn;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    /// Adds an actor that waits for its interrupt and records every cause it receives.
    fn add_waiter(group: &mut Group, name: &'static str, causes: Arc<Mutex<Vec<Option<ActorError>>>>) {
        let token = CancellationToken::new();
        let wait = token.clone();
        group.add(
            name,
            async move {
                wait.cancelled().await;
                Ok(())
            },
            move |cause| async move {
                causes.lock().unwrap().push(cause);
                token.cancel();
            },
        );
    }

    #[tokio::test]
    async fn empty_group_returns_immediately() {
        assert_eq!(Group::new().run().await, Ok(()));
    }

    #[tokio::test]
    async fn first_error_is_returned_and_handed_to_the_others() {
        let mut group = Group::new();
        let winner_interrupts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&winner_interrupts);
        group.add(
            "failing",
            async { Err(ActorError::fail("boom")) },
            move |_| async move {
                counter.fetch_add(1, Ordering::SeqCst);
            },
        );

        let b = Arc::new(Mutex::new(Vec::new()));
        let c = Arc::new(Mutex::new(Vec::new()));
        add_waiter(&mut group, "b", Arc::clone(&b));
        add_waiter(&mut group, "c", Arc::clone(&c));

        assert_eq!(group.run().await, Err(ActorError::fail("boom")));
        assert_eq!(winner_interrupts.load(Ordering::SeqCst), 0);
        assert_eq!(*b.lock().unwrap(), vec![Some(ActorError::fail("boom"))]);
        assert_eq!(*c.lock().unwrap(), vec![Some(ActorError::fail("boom"))]);
    }

    #[tokio::test]
    async fn clean_exit_interrupts_with_none() {
        let mut group = Group::new();
        group.add("done", async { Ok(()) }, |_| async {});

        let causes = Arc::new(Mutex::new(Vec::new()));
        add_waiter(&mut group, "waiter", Arc::clone(&causes));

        assert_eq!(group.run().await, Ok(()));
        assert_eq!(*causes.lock().unwrap(), vec![None]);
    }

    #[tokio::test]
    async fn later_errors_do_not_replace_the_first_result() {
        let mut group = Group::new();
        group.add("done", async { Ok(()) }, |_| async {});

        let token = CancellationToken::new();
        let wait = token.clone();
        group.add(
            "grumpy",
            async move {
                wait.cancelled().await;
                Err(ActorError::fail("late"))
            },
            move |_| async move { token.cancel() },
        );

        assert_eq!(group.run().await, Ok(()));
    }

    #[tokio::test]
    async fn run_waits_for_slow_actors() {
        let finished = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&finished);

        let mut group = Group::new();
        group.add("done", async { Ok(()) }, |_| async {});

        let token = CancellationToken::new();
        let wait = token.clone();
        group.add(
            "slow",
            async move {
                wait.cancelled().await;
                tokio::time::sleep(Duration::from_millis(50)).await;
                flag.store(true, Ordering::SeqCst);
                Ok(())
            },
            move |_| async move { token.cancel() },
        );

        group.run().await.unwrap();
        assert!(finished.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn trait_actors_can_be_registered() {
        let mut group = Group::new();
        group.register_all([
            ActorFn::arc("quick", |_ctx: CancellationToken| async {
                Ok::<_, ActorError>(())
            }) as ActorRef,
            ActorFn::arc("waiting", |ctx: CancellationToken| async move {
                ctx.cancelled().await;
                Ok::<_, ActorError>(())
            }) as ActorRef,
        ]);
        assert_eq!(group.len(), 2);
        assert_eq!(group.run().await, Ok(()));
    }

    #[tokio::test]
    async fn lifecycle_events_are_published() {
        let bus = Bus::new(64);
        let mut rx = bus.subscribe();

        let mut group = Group::new().with_bus(bus);
        group.add("done", async { Err(ActorError::fail("stop")) }, |_| async {});
        add_waiter(&mut group, "waiter", Arc::new(Mutex::new(Vec::new())));
        let _ = group.run().await;

        let mut kinds = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            kinds.push(ev.kind);
        }
        assert_eq!(kinds.first(), Some(&EventKind::ActorStarting));
        assert!(kinds.contains(&EventKind::InterruptRequested));
        assert_eq!(kinds.last(), Some(&EventKind::GroupStopped));
        assert_eq!(
            kinds.iter().filter(|k| **k == EventKind::ActorExited).count(),
            2
        );
    }

    #[tokio::test]
    #[should_panic(expected = "actor exploded")]
    async fn panics_propagate_to_the_caller() {
        let mut group = Group::new();
        group.add(
            "panicking",
            async {
                if true {
                    panic!("actor exploded");
                }
                Ok(())
            },
            |_| async {},
        );
        add_waiter(&mut group, "waiter", Arc::new(Mutex::new(Vec::new())));
        let _ = group.run().await;
    }

    #[tokio::test]
    #[should_panic(expected = "interrupt exploded")]
    async fn interrupt_panic_reaches_the_caller_while_its_execute_waits() {
        let mut group = Group::new();
        group.add("done", async { Ok(()) }, |_| async {});

        let token = CancellationToken::new();
        let wait = token.clone();
        group.add(
            "stubborn",
            async move {
                wait.cancelled().await;
                Ok(())
            },
            move |_| async move {
                if true {
                    panic!("interrupt exploded");
                }
                token.cancel();
            },
        );

        let _ = tokio::time::timeout(Duration::from_secs(5), group.run()).await;
    }
}
