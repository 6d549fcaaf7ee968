//! Shared feature used by the store, harness and stress tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream;

use crate::effect::EffectHandler;
use crate::outcome::EffectOutcome;
use crate::reducer::{Reducer, Reduction};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedState {
    pub count: i64,
    pub value: Option<String>,
    pub is_loading: bool,
    pub ticks: Vec<u32>,
    pub sources: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FeedAction {
    Increment,
    Decrement,
    Load,
    Loaded(String),
    Watch { count: u32, every: Duration },
    Tick(u32),
    Countdown(u32),
    FetchBoth,
    Fetched(String),
    Hang,
    Silent,
    Explode,
}

#[derive(Debug, PartialEq)]
pub enum FeedMutation {
    SetCount(i64),
    SetLoading(bool),
    SetValue(Option<String>),
    PushTick(u32),
    PushSource(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum FeedEffect {
    FetchValue,
    Ticks { count: u32, every: Duration },
    CountdownStep(u32),
    Fetch { source: &'static str, delay: Duration },
    Sleep(Duration),
    Nothing,
    Panic,
}

pub struct FeedReducer;

impl Reducer for FeedReducer {
    type State = FeedState;
    type Action = FeedAction;
    type Mutation = FeedMutation;
    type Effect = FeedEffect;

    fn reduce(&self, state: &FeedState, action: &FeedAction) -> Reduction<FeedMutation, FeedEffect> {
        match action {
            FeedAction::Increment => Reduction::mutation(FeedMutation::SetCount(state.count + 1)),
            FeedAction::Decrement => Reduction::mutation(FeedMutation::SetCount(state.count - 1)),
            FeedAction::Load => Reduction::mutation(FeedMutation::SetLoading(true))
                .with_effect(FeedEffect::FetchValue),
            FeedAction::Loaded(value) => {
                Reduction::mutation(FeedMutation::SetValue(Some(value.clone())))
                    .with_mutation(FeedMutation::SetLoading(false))
            }
            FeedAction::Watch { count, every } => Reduction::effect(FeedEffect::Ticks {
                count: *count,
                every: *every,
            }),
            FeedAction::Tick(n) => Reduction::mutation(FeedMutation::PushTick(*n)),
            FeedAction::Countdown(n) => {
                let reduction = Reduction::mutation(FeedMutation::SetCount(i64::from(*n)));
                if *n > 0 {
                    reduction.with_effect(FeedEffect::CountdownStep(n - 1))
                } else {
                    reduction
                }
            }
            FeedAction::FetchBoth => Reduction::new(
                [FeedMutation::SetLoading(true)],
                [
                    FeedEffect::Fetch {
                        source: "left",
                        delay: Duration::from_millis(20),
                    },
                    FeedEffect::Fetch {
                        source: "right",
                        delay: Duration::from_millis(5),
                    },
                ],
            ),
            FeedAction::Fetched(source) => Reduction::mutation(FeedMutation::PushSource(
                source.clone(),
            ))
            .with_mutation(FeedMutation::SetLoading(state.sources.is_empty())),
            FeedAction::Hang => Reduction::effect(FeedEffect::Sleep(Duration::from_secs(10))),
            FeedAction::Silent => Reduction::effect(FeedEffect::Nothing),
            FeedAction::Explode => Reduction::effect(FeedEffect::Panic),
        }
    }

    fn mutate(&self, state: &mut FeedState, mutation: FeedMutation) {
        match mutation {
            FeedMutation::SetCount(count) => state.count = count,
            FeedMutation::SetLoading(loading) => state.is_loading = loading,
            FeedMutation::SetValue(value) => state.value = value,
            FeedMutation::PushTick(n) => state.ticks.push(n),
            FeedMutation::PushSource(source) => state.sources.push(source),
        }
    }
}

pub struct FeedEffects {
    pub delay: Duration,
    pub value: String,
    pub calls: Arc<AtomicUsize>,
}

impl FeedEffects {
    pub fn new(value: &str) -> Self {
        Self {
            delay: Duration::from_millis(5),
            value: value.to_string(),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl EffectHandler<FeedEffect, FeedAction> for FeedEffects {
    async fn handle(&self, effect: FeedEffect) -> EffectOutcome<FeedAction> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match effect {
            FeedEffect::FetchValue => {
                tokio::time::sleep(self.delay).await;
                EffectOutcome::single(FeedAction::Loaded(self.value.clone()))
            }
            FeedEffect::Ticks { count, every } => {
                EffectOutcome::stream(stream::unfold(0u32, move |n| async move {
                    if n >= count {
                        return None;
                    }
                    tokio::time::sleep(every).await;
                    Some((FeedAction::Tick(n), n + 1))
                }))
            }
            FeedEffect::CountdownStep(n) => EffectOutcome::single(FeedAction::Countdown(n)),
            FeedEffect::Fetch { source, delay } => {
                tokio::time::sleep(delay).await;
                EffectOutcome::single(FeedAction::Fetched(source.to_string()))
            }
            FeedEffect::Sleep(duration) => {
                tokio::time::sleep(duration).await;
                EffectOutcome::single(FeedAction::Loaded("late".into()))
            }
            FeedEffect::Nothing => EffectOutcome::none(),
            FeedEffect::Panic => panic!("effect exploded"),
        }
    }
}

/// Route test logs through the test writer. Filter with `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
