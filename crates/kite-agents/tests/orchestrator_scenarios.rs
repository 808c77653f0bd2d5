//! Orchestrator scenarios driven by scripted collaborators on paused time.
//!
//! Run with:
//! ```bash
//! cargo test -p kite-agents --test orchestrator_scenarios
//! ```

use std::time::Duration;

use kite_agents::test_support::{
    harness, test_agents, AskRecord, MockBehavior, MockQuery, RecordingUsage,
};
use kite_models::{ConnectionMode, CycleConfig, ReportOutcome, RunEvent, WalletStats};
use tokio::time::Instant;

const P1: &str = "http://10.0.0.1:8080";
const P2: &str = "socks5://10.0.0.2:1080";
const P3: &str = "http://10.0.0.3:8080";

fn proxies(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn ids(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

#[tokio::test(start_paused = true)]
async fn agents_queried_in_fixed_order_every_cycle() {
    let h = harness(
        test_agents(),
        MockQuery::answering("42"),
        RecordingUsage::default(),
        vec![],
        ConnectionMode::Direct,
        CycleConfig::default(),
    );
    let cancel = h.orchestrator.cancel_token();
    let handle = tokio::spawn(h.orchestrator.clone().run(vec!["0xabc".to_string()]));

    // cycles start at t=0 and t=15
    tokio::time::sleep(Duration::from_secs(20)).await;
    cancel.cancel();
    let stats = handle.await.unwrap();

    assert_eq!(stats.cycles, 2);
    assert_eq!(
        h.query.asked_agents(),
        ids(&[
            "deployment_a",
            "deployment_b",
            "deployment_c",
            "deployment_a",
            "deployment_b",
            "deployment_c",
        ])
    );
    let reports = h.usage.reports();
    assert_eq!(reports.len(), 6);
    assert!(reports.iter().all(|r| r.wallet == "0xabc" && r.answer == "42"));
    assert_eq!(stats.reports_ok, 6);
}

#[tokio::test(start_paused = true)]
async fn cancellation_lets_in_flight_query_finish_and_starts_nothing_new() {
    let h = harness(
        test_agents(),
        MockQuery::answering("slow").with_delay(Duration::from_secs(5)),
        RecordingUsage::default(),
        vec![],
        ConnectionMode::Direct,
        CycleConfig::default(),
    );
    let cancel = h.orchestrator.cancel_token();
    let handle = tokio::spawn(h.orchestrator.clone().run_wallet("0xabc".to_string()));

    tokio::time::sleep(Duration::from_secs(1)).await;
    cancel.cancel();
    let stats = handle.await.unwrap();

    assert_eq!(h.query.asked().len(), 1, "no new query after cancellation");
    assert_eq!(h.query.completed(), 1, "in-flight query completes");
    assert_eq!(h.usage.reports().len(), 1, "in-flight exchange is still reported");
    assert_eq!(stats.cycles, 0);
    assert_eq!(stats.queries_ok, 1);
}

#[tokio::test(start_paused = true)]
async fn cancellation_interrupts_inter_cycle_pause() {
    let h = harness(
        test_agents(),
        MockQuery::answering("42"),
        RecordingUsage::default(),
        vec![],
        ConnectionMode::Direct,
        CycleConfig::default(),
    );
    let cancel = h.orchestrator.cancel_token();
    let start = Instant::now();
    let handle = tokio::spawn(h.orchestrator.clone().run_wallet("0xabc".to_string()));

    tokio::time::sleep(Duration::from_secs(2)).await;
    cancel.cancel();
    let stats = handle.await.unwrap();

    assert_eq!(stats.cycles, 1);
    assert!(start.elapsed() < Duration::from_secs(15));
}

#[tokio::test]
async fn cancelled_before_start_does_no_work() {
    let h = harness(
        test_agents(),
        MockQuery::answering("42"),
        RecordingUsage::default(),
        vec![],
        ConnectionMode::Direct,
        CycleConfig::default(),
    );
    h.orchestrator.cancel_token().cancel();
    let stats = h.orchestrator.clone().run(vec!["0xabc".to_string()]).await;

    assert_eq!(stats, WalletStats::default());
    assert!(h.query.asked().is_empty());

    let events = h.events.events();
    assert!(matches!(events.first(), Some(RunEvent::WalletStarted { .. })));
    assert!(matches!(events.last(), Some(RunEvent::WalletStopped { .. })));
}

#[tokio::test]
async fn egress_failure_marks_proxy_failed() {
    let agents = test_agents()[..2].to_vec();
    let h = harness(
        agents,
        MockQuery::with_behavior(MockBehavior::EgressFailure),
        RecordingUsage::default(),
        proxies(&[P1, P2, P3]),
        ConnectionMode::Proxy,
        CycleConfig::default(),
    );

    let mut stats = WalletStats::default();
    assert!(h.orchestrator.run_cycle("0xabc", &mut stats).await);

    assert_eq!(
        h.query.asked(),
        vec![
            AskRecord {
                agent_id: "deployment_a".to_string(),
                proxy: Some(P1.to_string()),
            },
            AskRecord {
                agent_id: "deployment_b".to_string(),
                proxy: Some(P2.to_string()),
            },
        ]
    );
    assert_eq!(h.rotator.failed(), proxies(&[P1, P2]));
    assert!(h.usage.reports().is_empty(), "failed queries are not reported");
    assert_eq!(stats.queries_failed, 2);
}

#[tokio::test]
async fn server_failure_keeps_proxy_in_rotation() {
    let h = harness(
        test_agents(),
        MockQuery::with_behavior(MockBehavior::ServerFailure),
        RecordingUsage::default(),
        proxies(&[P1, P2]),
        ConnectionMode::Proxy,
        CycleConfig::default(),
    );

    let mut stats = WalletStats::default();
    h.orchestrator.run_cycle("0xabc", &mut stats).await;

    assert!(h.rotator.failed().is_empty());
    let used: Vec<_> = h.query.asked().into_iter().map(|r| r.proxy).collect();
    assert_eq!(
        used,
        vec![Some(P1.to_string()), Some(P2.to_string()), Some(P1.to_string())]
    );

    let failures = h
        .events
        .events()
        .into_iter()
        .filter(|e| matches!(e, RunEvent::QueryFailed { .. }))
        .count();
    assert_eq!(failures, 3);
}

#[tokio::test]
async fn query_dropped_on_shutdown_is_not_a_failure() {
    let h = harness(
        test_agents(),
        MockQuery::with_behavior(MockBehavior::Cancelled),
        RecordingUsage::default(),
        proxies(&[P1]),
        ConnectionMode::Proxy,
        CycleConfig::default(),
    );

    let mut stats = WalletStats::default();
    h.orchestrator.run_cycle("0xabc", &mut stats).await;

    assert_eq!(stats, WalletStats::default());
    assert!(h.rotator.failed().is_empty());
    assert!(h.usage.reports().is_empty());
    assert!(!h
        .events
        .events()
        .iter()
        .any(|e| matches!(e, RunEvent::QueryFailed { .. })));
}

#[tokio::test]
async fn direct_mode_ignores_proxy_pool() {
    let h = harness(
        test_agents(),
        MockQuery::answering("42"),
        RecordingUsage::default(),
        proxies(&[P1, P2]),
        ConnectionMode::Direct,
        CycleConfig::default(),
    );

    let mut stats = WalletStats::default();
    h.orchestrator.run_cycle("0xabc", &mut stats).await;

    assert!(h.query.asked().iter().all(|r| r.proxy.is_none()));
}

#[tokio::test]
async fn unusable_proxy_is_excluded_and_call_goes_direct() {
    let agents = test_agents()[..2].to_vec();
    let h = harness(
        agents,
        MockQuery::answering("42"),
        RecordingUsage::default(),
        proxies(&["bogus://10.0.0.9:1", P1]),
        ConnectionMode::Proxy,
        CycleConfig::default(),
    );

    let mut stats = WalletStats::default();
    h.orchestrator.run_cycle("0xabc", &mut stats).await;

    let used: Vec<_> = h.query.asked().into_iter().map(|r| r.proxy).collect();
    assert_eq!(used, vec![None, Some(P1.to_string())]);
    assert_eq!(h.rotator.failed(), proxies(&["bogus://10.0.0.9:1"]));
}

#[tokio::test(start_paused = true)]
async fn wallets_run_concurrently() {
    let h = harness(
        test_agents(),
        MockQuery::answering("42"),
        RecordingUsage::default(),
        vec![],
        ConnectionMode::Direct,
        CycleConfig::default(),
    );
    let cancel = h.orchestrator.cancel_token();
    let handle = tokio::spawn(
        h.orchestrator
            .clone()
            .run(vec!["0xaaa".to_string(), "0xbbb".to_string()]),
    );

    tokio::time::sleep(Duration::from_secs(1)).await;
    cancel.cancel();
    let total = handle.await.unwrap();

    assert_eq!(total.cycles, 2, "one cycle per wallet");
    let reports = h.usage.reports();
    assert_eq!(reports.iter().filter(|r| r.wallet == "0xaaa").count(), 3);
    assert_eq!(reports.iter().filter(|r| r.wallet == "0xbbb").count(), 3);

    let stopped = h
        .events
        .events()
        .into_iter()
        .filter(|e| matches!(e, RunEvent::WalletStopped { .. }))
        .count();
    assert_eq!(stopped, 2);
}

#[tokio::test(start_paused = true)]
async fn parallel_agents_share_one_cycle_window() {
    let h = harness(
        test_agents(),
        MockQuery::answering("42").with_delay(Duration::from_secs(5)),
        RecordingUsage::default(),
        vec![],
        ConnectionMode::Direct,
        CycleConfig {
            parallel_agents: true,
            ..CycleConfig::default()
        },
    );

    let start = Instant::now();
    let mut stats = WalletStats::default();
    assert!(h.orchestrator.run_cycle("0xabc", &mut stats).await);

    assert_eq!(start.elapsed(), Duration::from_secs(5));
    let mut asked = h.query.asked_agents();
    asked.sort();
    assert_eq!(asked, ids(&["deployment_a", "deployment_b", "deployment_c"]));
    assert_eq!(stats.queries_ok, 3);
}

#[tokio::test]
async fn exchange_is_emitted_before_usage_outcome() {
    let agents = test_agents()[..1].to_vec();
    let h = harness(
        agents,
        MockQuery::answering("Blocks are batches of transactions"),
        RecordingUsage::new(ReportOutcome::Exhausted),
        proxies(&[P1]),
        ConnectionMode::Proxy,
        CycleConfig::default(),
    );

    let mut stats = WalletStats::default();
    h.orchestrator.run_cycle("0xabc", &mut stats).await;

    let events = h.events.events();
    assert_eq!(events.len(), 3);
    assert!(matches!(&events[0], RunEvent::ProxySelected { proxy, .. } if proxy == P1));
    assert!(
        matches!(&events[1], RunEvent::Exchange { result, agent_name, .. }
            if result.answer == "Blocks are batches of transactions" && agent_name == "Alpha")
    );
    assert!(matches!(
        &events[2],
        RunEvent::UsageReported {
            outcome: ReportOutcome::Exhausted,
            ..
        }
    ));
    assert_eq!(stats.reports_failed, 1);
}
