//! Balance monitor tests: polling, optimistic updates, reconciliation.

use std::sync::Arc;
use std::time::Duration;
use tipvault::chain::{ChainClient, MockChainClient};
use tipvault::domain::{Address, Wad};
use tipvault::monitor::spawn_balance_monitor;

const OWNER: &str = "0x1111111111111111111111111111111111111111";

fn monitor(chain: &Arc<MockChainClient>) -> tipvault::monitor::BalanceHandle {
    spawn_balance_monitor(
        chain.clone() as Arc<dyn ChainClient>,
        Address::parse(OWNER).unwrap(),
        Duration::from_millis(30),
        Duration::from_millis(10),
    )
}

async fn wait_until(mut cond: impl FnMut() -> bool) {
    for _ in 0..500 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not met within timeout");
}

#[tokio::test]
async fn polls_the_chain_on_an_interval() {
    let chain = Arc::new(MockChainClient::new());
    chain.set_balance(Wad::from_int(100));
    let handle = monitor(&chain);

    wait_until(|| handle.current().on_chain == Some(Wad::from_int(100))).await;

    chain.set_balance(Wad::from_int(80));
    wait_until(|| handle.current().on_chain == Some(Wad::from_int(80))).await;
    assert!(chain.balance_calls() >= 2);
}

#[tokio::test]
async fn optimistic_update_is_visible_immediately_and_clamped() {
    let chain = Arc::new(MockChainClient::new());
    chain.set_balance(Wad::from_int(5));
    let handle = monitor(&chain);
    wait_until(|| handle.current().on_chain.is_some()).await;

    // Sending 10 from a balance of 5 must display 0, never negative.
    handle.update_optimistically(Wad::from_int(10));
    assert_eq!(handle.current().displayed(), Some(Wad::ZERO));
}

#[tokio::test]
async fn optimistic_override_clears_once_the_chain_catches_up() {
    let chain = Arc::new(MockChainClient::new());
    chain.set_balance(Wad::from_int(100));
    let handle = monitor(&chain);
    wait_until(|| handle.current().on_chain == Some(Wad::from_int(100))).await;

    handle.update_optimistically(Wad::from_int(30));
    assert_eq!(handle.current().displayed(), Some(Wad::from_int(70)));

    // Chain still reads 100: the override keeps displaying.
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(handle.current().displayed(), Some(Wad::from_int(70)));
    assert!(handle.current().optimistic.is_some());

    // Chain catches up; polled value becomes authoritative again.
    chain.set_balance(Wad::from_int(70));
    wait_until(|| handle.current().optimistic.is_none()).await;
    assert_eq!(handle.current().displayed(), Some(Wad::from_int(70)));
}

#[tokio::test]
async fn optimistic_update_triggers_a_prompt_poll() {
    let chain = Arc::new(MockChainClient::new());
    chain.set_balance(Wad::from_int(100));
    // Long interval: only the settle-delay poll can explain a second read.
    let handle = spawn_balance_monitor(
        chain.clone() as Arc<dyn ChainClient>,
        Address::parse(OWNER).unwrap(),
        Duration::from_secs(3_600),
        Duration::from_millis(10),
    );
    wait_until(|| handle.current().on_chain.is_some()).await;
    let polls_before = chain.balance_calls();

    handle.update_optimistically(Wad::from_int(10));
    wait_until(|| chain.balance_calls() > polls_before).await;
}

#[tokio::test]
async fn refetch_clears_the_override_and_polls_now() {
    let chain = Arc::new(MockChainClient::new());
    chain.set_balance(Wad::from_int(100));
    let handle = spawn_balance_monitor(
        chain.clone() as Arc<dyn ChainClient>,
        Address::parse(OWNER).unwrap(),
        Duration::from_secs(3_600),
        Duration::from_millis(10),
    );
    wait_until(|| handle.current().on_chain.is_some()).await;

    handle.update_optimistically(Wad::from_int(40));
    handle.refetch();
    assert!(handle.current().optimistic.is_none());
    wait_until(|| handle.current().displayed() == Some(Wad::from_int(100))).await;
}
