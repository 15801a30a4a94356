//! Integration tests of the inbox event iterators.
#![cfg(feature = "test-utils")]

use alloy_primitives::Address;
use rollup_node_primitives::ProvedEventPayload;
use rollup_node_providers::test_utils::MockL1Provider;
use rollup_node_watcher::{
    test_utils::{legacy_batch_proposed_log_data, proposed_payload, proved_payload},
    BlockRangeConfig, ChainIteratorError, EventHandler, EventKind, EventSource, InboxEvent,
    IterControl, ProposedEvent, ProposedEventIterator, ProposedEvents, ProvedEventIterator, Step,
};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Mutex,
};
use tokio_util::sync::CancellationToken;
use tracing::{subscriber::set_global_default, Level};

const INBOX: Address = Address::repeat_byte(0x11);

fn setup() {
    let sub = tracing_subscriber::FmtSubscriber::builder().with_max_level(Level::TRACE).finish();
    let _ = set_global_default(sub);
}

/// Collects the ids of the events, stopping once on `stop_at`.
#[derive(Debug, Default)]
struct Collector {
    ids: Mutex<Vec<u64>>,
    stop_at: Option<u64>,
    stopped: AtomicBool,
}

impl Collector {
    fn stopping_at(id: u64) -> Self {
        Self { stop_at: Some(id), ..Default::default() }
    }

    fn record(&self, id: u64) -> IterControl {
        self.ids.lock().unwrap().push(id);
        if self.stop_at == Some(id) && !self.stopped.swap(true, Ordering::SeqCst) {
            return IterControl::Stop
        }
        IterControl::Continue
    }

    fn ids(&self) -> Vec<u64> {
        self.ids.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl EventHandler<ProposedEvent> for Collector {
    async fn on_event(
        &self,
        event: InboxEvent<ProposedEvent>,
    ) -> Result<IterControl, ChainIteratorError> {
        Ok(self.record(ProposedEvents::sequence_id(&event.event)))
    }
}

#[async_trait::async_trait]
impl EventHandler<ProvedEventPayload> for Collector {
    async fn on_event(
        &self,
        event: InboxEvent<ProvedEventPayload>,
    ) -> Result<IterControl, ChainIteratorError> {
        Ok(self.record(event.event.proposal_id))
    }
}

fn config(start: u64, batch: u64) -> BlockRangeConfig {
    BlockRangeConfig { max_blocks_per_batch: batch, ..BlockRangeConfig::range(start, None) }
}

#[tokio::test]
async fn test_should_yield_legacy_then_current_proposals() -> eyre::Result<()> {
    // Given
    setup();
    let provider = MockL1Provider::new(100);
    provider.push_log(3, INBOX, legacy_batch_proposed_log_data(1, Address::ZERO)).await;
    provider.push_log(4, INBOX, legacy_batch_proposed_log_data(2, Address::ZERO)).await;
    for id in 3..=8 {
        provider.push_proposed(id * 10 + 1, INBOX, &proposed_payload(id, 0)).await;
    }
    // an event from another contract is ignored.
    provider.push_proposed(15, Address::ZERO, &proposed_payload(42, 0)).await;

    // When
    let mut iterator = ProposedEventIterator::new(
        provider,
        INBOX,
        config(0, 16),
        Collector::default(),
        CancellationToken::new(),
    )
    .await?;
    let step = iterator.iterate().await?;

    // Then
    assert_eq!(step, Step::Done);
    assert_eq!(iterator.handler().ids(), (1..=8).collect::<Vec<_>>());

    Ok(())
}

#[tokio::test]
async fn test_should_yield_proofs() -> eyre::Result<()> {
    // Given
    setup();
    let provider = MockL1Provider::new(50);
    for id in 1..=4 {
        provider.push_proved(10 + id, INBOX, &proved_payload(id)).await;
    }
    provider.push_proposed(12, INBOX, &proposed_payload(9, 0)).await;

    // When
    let mut iterator = ProvedEventIterator::new(
        provider,
        INBOX,
        config(0, 100),
        Collector::default(),
        CancellationToken::new(),
    )
    .await?;
    iterator.iterate().await?;

    // Then
    assert_eq!(iterator.handler().ids(), vec![1, 2, 3, 4]);

    Ok(())
}

#[tokio::test]
async fn test_should_abort_on_non_continuous_events() -> eyre::Result<()> {
    // Given
    setup();
    let provider = MockL1Provider::new(50);
    provider.push_proposed(5, INBOX, &proposed_payload(1, 0)).await;
    provider.push_proposed(6, INBOX, &proposed_payload(2, 0)).await;
    provider.push_proposed(7, INBOX, &proposed_payload(4, 0)).await;

    // When
    let mut iterator = ProposedEventIterator::new(
        provider,
        INBOX,
        config(0, 100),
        Collector::default(),
        CancellationToken::new(),
    )
    .await?;
    let result = iterator.iterate().await;

    // Then
    assert!(matches!(
        result,
        Err(ChainIteratorError::NonContinuous { kind: EventSource::Proposed, expected: 3, got: 4 })
    ));
    assert_eq!(iterator.handler().ids(), vec![1, 2]);

    Ok(())
}

#[tokio::test]
async fn test_should_skip_removed_logs() -> eyre::Result<()> {
    // Given
    setup();
    let provider = MockL1Provider::new(50);
    let removed = rollup_node_providers::test_utils::proposed_log_data(&proposed_payload(7, 0));
    provider.push_proposed(5, INBOX, &proposed_payload(1, 0)).await;
    provider.push_removed_log(5, INBOX, removed).await;
    provider.push_proposed(6, INBOX, &proposed_payload(2, 0)).await;

    // When
    let mut iterator = ProposedEventIterator::new(
        provider,
        INBOX,
        config(0, 100),
        Collector::default(),
        CancellationToken::new(),
    )
    .await?;
    iterator.iterate().await?;

    // Then
    assert_eq!(iterator.handler().ids(), vec![1, 2]);

    Ok(())
}

#[tokio::test]
async fn test_should_resume_after_stop() -> eyre::Result<()> {
    // Given
    setup();
    let provider = MockL1Provider::new(100);
    for id in 1..=8 {
        provider.push_proposed(id * 5, INBOX, &proposed_payload(id, 0)).await;
    }
    let mut iterator = ProposedEventIterator::new(
        provider,
        INBOX,
        config(0, 100),
        Collector::stopping_at(5),
        CancellationToken::new(),
    )
    .await?;

    // When
    let first = iterator.iterate().await?;
    let cursor = iterator.cursor().number;
    let second = iterator.iterate().await?;

    // Then
    assert_eq!(first, Step::Ended);
    assert_eq!(cursor, 20);
    assert_eq!(second, Step::Done);
    assert_eq!(iterator.handler().ids(), (1..=8).collect::<Vec<_>>());

    Ok(())
}

#[tokio::test]
async fn test_should_resume_inside_stopped_block() -> eyre::Result<()> {
    // Given
    setup();
    let provider = MockL1Provider::new(50);
    for id in 1..=3 {
        provider.push_proposed(10, INBOX, &proposed_payload(id, 0)).await;
    }
    let mut iterator = ProposedEventIterator::new(
        provider,
        INBOX,
        config(0, 100),
        Collector::stopping_at(2),
        CancellationToken::new(),
    )
    .await?;

    // When
    let first = iterator.iterate().await?;
    let second = iterator.iterate().await?;

    // Then
    assert_eq!(first, Step::Ended);
    assert_eq!(second, Step::Done);
    assert_eq!(iterator.handler().ids(), vec![1, 2, 3]);

    Ok(())
}

#[tokio::test]
async fn test_should_yield_boundary_events_once() -> eyre::Result<()> {
    // Given
    setup();
    let provider = MockL1Provider::new(50);
    provider.push_proposed(10, INBOX, &proposed_payload(1, 0)).await;
    provider.push_proposed(10, INBOX, &proposed_payload(2, 0)).await;
    provider.push_proposed(15, INBOX, &proposed_payload(3, 0)).await;
    provider.push_proposed(20, INBOX, &proposed_payload(4, 0)).await;

    // When
    let mut iterator = ProposedEventIterator::new(
        provider,
        INBOX,
        config(0, 10),
        Collector::default(),
        CancellationToken::new(),
    )
    .await?;
    let step = iterator.iterate().await?;

    // Then
    assert_eq!(step, Step::Done);
    assert_eq!(iterator.handler().ids(), vec![1, 2, 3, 4]);

    Ok(())
}

#[tokio::test]
async fn test_should_retry_failed_log_queries() -> eyre::Result<()> {
    // Given
    setup();
    let provider = MockL1Provider::new(50);
    provider.push_proposed(10, INBOX, &proposed_payload(1, 0)).await;
    provider.push_proposed(30, INBOX, &proposed_payload(2, 0)).await;
    provider.fail_next_log_queries(3).await;

    // When
    let mut iterator = ProposedEventIterator::new(
        provider,
        INBOX,
        config(0, 20),
        Collector::default(),
        CancellationToken::new(),
    )
    .await?;
    let step = iterator.iterate().await?;

    // Then
    assert_eq!(step, Step::Done);
    assert_eq!(iterator.handler().ids(), vec![1, 2]);

    Ok(())
}
