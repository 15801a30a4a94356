//! Integration tests of the state indexer.
#![cfg(feature = "test-utils")]

use alloy_primitives::Address;
use rollup_node_indexer::{IndexerConfig, StateIndexer};
use rollup_node_primitives::{InboxConfig, ProposalPayload};
use rollup_node_providers::test_utils::MockL1Provider;
use rollup_node_watcher::test_utils::{proposed_payload, proved_payload};
use std::time::Duration;
use tracing::{subscriber::set_global_default, Level};

const INBOX: Address = Address::repeat_byte(0x33);

fn setup() {
    let sub = tracing_subscriber::FmtSubscriber::builder().with_max_level(Level::TRACE).finish();
    let _ = set_global_default(sub);
}

fn ids(indexer: &StateIndexer<MockL1Provider>) -> Vec<u64> {
    indexer.proposals().iter().map(ProposalPayload::id).collect()
}

fn config(max_blocks_per_filter: u64) -> IndexerConfig {
    IndexerConfig { max_blocks_per_filter, ..IndexerConfig::new(INBOX) }
}

/// Waits until the indexer indexed the block with the provided hash.
async fn wait_for_indexed(
    indexer: &StateIndexer<MockL1Provider>,
    hash: alloy_primitives::B256,
) -> eyre::Result<()> {
    tokio::time::timeout(Duration::from_secs(5), async {
        while indexer.last_indexed_block().await.map(|header| header.hash) != Some(hash) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await?;
    Ok(())
}

#[tokio::test]
async fn test_should_backfill_a_ring_buffer_of_proposals() -> eyre::Result<()> {
    // Given
    setup();
    let inbox_config = InboxConfig {
        ring_buffer_size: 3,
        finalization_grace_period: 0,
        max_finalization_count: 8,
    };
    let provider = MockL1Provider::new(100).with_inbox_config(inbox_config);
    for id in 0..=9 {
        let payload = proposed_payload(id, id.saturating_sub(2));
        provider.push_proposed(id * 10 + 5, INBOX, &payload).await;
        provider.push_proved(id * 10 + 6, INBOX, &proved_payload(id)).await;
    }
    let indexer = StateIndexer::new(provider.clone(), config(10)).await?;

    // When
    indexer.start().await?;

    // Then
    assert!(indexer.is_historical_fetch_completed().await);
    assert_eq!(ids(&indexer), vec![7, 8, 9]);
    let records = indexer.transition_records().iter().map(|r| r.proposal_id).collect::<Vec<_>>();
    assert_eq!(records, vec![7, 8, 9]);
    assert_eq!(indexer.last_indexed_block().await.map(|h| h.number), Some(99));
    assert_eq!(indexer.get_last_core_state().map(|s| s.next_proposal_id), Some(10));

    let input = indexer.get_proposals_input(8).await?;
    let proposals = input.proposals.iter().map(ProposalPayload::id).collect::<Vec<_>>();
    assert_eq!(proposals, vec![9, 7]);
    let transitions = input.transitions.iter().map(|r| r.proposal_id).collect::<Vec<_>>();
    assert_eq!(transitions, vec![8, 9]);

    indexer.stop();
    Ok(())
}

#[tokio::test]
async fn test_should_backfill_down_to_genesis() -> eyre::Result<()> {
    // Given
    setup();
    let provider = MockL1Provider::new(50);
    for id in 1..=3 {
        provider.push_proposed(id * 10 + 3, INBOX, &proposed_payload(id, 0)).await;
    }
    let indexer = StateIndexer::new(provider, config(10)).await?;

    // When
    indexer.start().await?;
    indexer.wait_historical_fetch().await?;

    // Then
    assert_eq!(ids(&indexer), vec![1, 2, 3]);
    assert!(matches!(
        indexer.start().await,
        Err(rollup_node_indexer::IndexerError::AlreadyStarted)
    ));

    indexer.stop();
    Ok(())
}

#[tokio::test]
async fn test_should_restart_backfill_from_empty_caches() -> eyre::Result<()> {
    // Given
    setup();
    let provider = MockL1Provider::new(50);
    for (id, block) in [(1, 5), (2, 6), (4, 7)] {
        provider.push_proposed(block, INBOX, &proposed_payload(id, 0)).await;
    }
    let indexer = StateIndexer::new(provider.clone(), config(100)).await?;
    assert!(matches!(
        indexer.start().await,
        Err(rollup_node_indexer::IndexerError::ChainIterator(
            rollup_node_watcher::ChainIteratorError::NonContinuous { expected: 3, got: 4, .. }
        ))
    ));

    // When
    provider.reorg(5, 20).await;
    provider.push_proposed(8, INBOX, &proposed_payload(1, 0)).await;
    indexer.start().await?;

    // Then
    assert_eq!(ids(&indexer), vec![1]);
    assert_eq!(indexer.get_last_proposal().map(|p| p.block_info.number), Some(8));

    indexer.stop();
    Ok(())
}

#[tokio::test]
async fn test_should_index_new_heads() -> eyre::Result<()> {
    // Given
    setup();
    let provider = MockL1Provider::new(50);
    provider.push_proposed(11, INBOX, &proposed_payload(1, 0)).await;
    let indexer = StateIndexer::new(provider.clone(), config(16)).await?;
    indexer.start().await?;

    // When
    provider.push_proposed(55, INBOX, &proposed_payload(2, 1)).await;
    provider.push_proved(57, INBOX, &proved_payload(2)).await;
    let head = provider.mine(20).await;
    wait_for_indexed(&indexer, head.hash).await?;

    // Then
    assert_eq!(ids(&indexer), vec![1, 2]);
    assert!(indexer.get_transition_record_by_proposal_id(2).is_some());

    indexer.stop();
    Ok(())
}

#[tokio::test]
async fn test_should_recover_from_reorg_while_live() -> eyre::Result<()> {
    // Given
    setup();
    let provider = MockL1Provider::new(121);
    for (id, block) in [(1, 90), (2, 100), (3, 105), (4, 110)] {
        provider.push_proposed(block, INBOX, &proposed_payload(id, 0)).await;
    }
    let indexer = StateIndexer::new(provider.clone(), IndexerConfig::new(INBOX)).await?;
    indexer.start().await?;
    assert_eq!(ids(&indexer), vec![1, 2, 3, 4]);

    // When
    let head = provider.reorg(103, 20).await;
    wait_for_indexed(&indexer, head.hash).await?;

    // Then
    assert_eq!(ids(&indexer), vec![1, 2]);
    assert_eq!(indexer.get_last_proposal().map(|p| p.block_info.number), Some(100));

    indexer.stop();
    Ok(())
}

#[tokio::test]
async fn test_should_stop_waiting_when_stopped() -> eyre::Result<()> {
    // Given
    setup();
    let indexer = StateIndexer::new(MockL1Provider::new(10), IndexerConfig::new(INBOX)).await?;

    // When
    indexer.stop();

    // Then
    assert!(indexer.wait_historical_fetch().await.is_err());
    assert!(indexer.start().await.is_err());

    Ok(())
}
