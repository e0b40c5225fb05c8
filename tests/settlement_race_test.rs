//! Settlement under concurrent callers
//!
//! Every test races several settle calls against the same duel and checks
//! that the reward side effects ran exactly once.

mod common;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use common::*;
use quizduel::duel::{Disposition, Outcome};
use quizduel::progression::ProgressionEvent;
use quizduel::store::DocPath;
use quizduel::{DuelStatus, NotificationKind};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_settles_reward_once() {
    let f = fixture();
    let duel = played_duel(&f.engine, (9, 50), (7, 20)).await;

    let calls = (0..16).map(|i| {
        let engine = f.engine.clone();
        let id = duel.id.clone();
        let user = if i % 2 == 0 { alice() } else { bob() };
        tokio::spawn(async move { engine.settlement().settle(&id, &user).await })
    });
    let reports: Vec<_> = futures::future::join_all(calls)
        .await
        .into_iter()
        .map(|r| r.unwrap().unwrap())
        .collect();

    let settled = reports
        .iter()
        .filter(|r| r.disposition == Disposition::Settled)
        .count();
    assert_eq!(settled, 1);
    assert!(reports.iter().all(|r| r.disposition != Disposition::NotReady));

    // 100 XP win reward exactly once fills level 1; the rest is the
    // daily_duel_play (15) and daily_duel_win (50) quests
    let progress = f.engine.progression().progress(&alice()).await.unwrap();
    assert_eq!(progress.level, 2);
    assert_eq!(progress.xp, 65);
    assert_eq!(progress.coins, 50 + 5 + 25);
    let bob_progress = f.engine.progression().progress(&bob()).await.unwrap();
    assert_eq!(bob_progress.coins, 5);

    let stored = f.engine.duels().get_duel(&duel.id).await.unwrap();
    assert_eq!(stored.status, DuelStatus::Completed);
    assert!(stored.has_both_results());
    assert!(stored.settled_by.is_some());
}

#[tokio::test]
async fn test_both_players_notified_once() {
    let f = fixture();
    let duel = played_duel(&f.engine, (3, 30), (8, 30)).await;

    let (ua, ub) = (alice(), bob());
    let (a, b) = tokio::join!(
        f.engine.settlement().settle(&duel.id, &ua),
        f.engine.settlement().settle(&duel.id, &ub),
    );
    let (a, b) = (a.unwrap(), b.unwrap());
    assert_eq!(a.self_outcome, Some(Outcome::Lose));
    assert_eq!(b.self_outcome, Some(Outcome::Win));

    for user in [alice(), bob()] {
        let results = f
            .engine
            .notifications()
            .unread(&user)
            .await
            .unwrap()
            .into_iter()
            .filter(|n| n.kind == NotificationKind::DuelResult)
            .count();
        assert_eq!(results, 1, "{} should get one result notification", user);
    }
}

#[tokio::test]
async fn test_conflicts_are_retried() {
    let f = fixture();
    let duel = played_duel(&f.engine, (5, 10), (4, 10)).await;

    f.store.inject_conflicts(3);
    let report = f.engine.settlement().settle(&duel.id, &bob()).await.unwrap();
    assert_eq!(report.disposition, Disposition::Settled);
    assert_eq!(report.self_outcome, Some(Outcome::Lose));
    assert!(f.store.conflict_count() >= 3);
}

#[tokio::test]
async fn test_exhausted_retries_are_soft() {
    let mut config = test_config();
    config.settlement.max_attempts = 2;
    let f = fixture_with(config);
    let duel = played_duel(&f.engine, (5, 10), (4, 10)).await;

    f.store.inject_conflicts(2);
    let err = f
        .engine
        .settlement()
        .settle(&duel.id, &alice())
        .await
        .unwrap_err();
    assert!(err.is_soft());
    assert_eq!(err.user_message(), quizduel::GENERIC_FAILURE);

    // Nothing was applied, so a later attempt still settles
    let report = f.engine.settlement().settle(&duel.id, &alice()).await.unwrap();
    assert_eq!(report.disposition, Disposition::Settled);
}

#[tokio::test]
async fn test_other_device_wins_between_read_and_commit() {
    let f = fixture();
    let duel = played_duel(&f.engine, (6, 12), (6, 15)).await;

    // Right before our first commit the other device completes the duel
    let fired = Arc::new(AtomicBool::new(false));
    let other = {
        let mut d = f.engine.duels().get_duel(&duel.id).await.unwrap();
        d.mark_completed(&bob(), start_time()).unwrap();
        serde_json::to_value(&d).unwrap()
    };
    let path = DocPath::Duel(duel.id.clone());
    let hook_fired = fired.clone();
    f.store.set_commit_hook(move |store, p| {
        if *p == path && !hook_fired.swap(true, Ordering::SeqCst) {
            store.force_put(p, other.clone());
        }
    });

    let report = f.engine.settlement().settle(&duel.id, &alice()).await.unwrap();
    f.store.clear_commit_hook();

    assert!(fired.load(Ordering::SeqCst));
    assert_eq!(report.disposition, Disposition::AlreadySettled);
    assert_eq!(report.self_outcome, Some(Outcome::Win));
    assert!(report.events.is_empty());

    // The forced write carried no rewards, and we applied none either
    let progress = f.engine.progression().progress(&alice()).await.unwrap();
    assert_eq!(progress.xp, 0);
    assert_eq!(progress.level, 1);
}

#[tokio::test]
async fn test_report_lists_level_up() {
    let f = fixture();
    let duel = played_duel(&f.engine, (10, 10), (1, 10)).await;

    let report = f.engine.settlement().settle(&duel.id, &alice()).await.unwrap();
    assert!(report.events.iter().any(|e| matches!(
        e,
        ProgressionEvent::LevelUp { user, level_up } if *user == alice() && level_up.new_level == 2
    )));
    assert!(report
        .events
        .iter()
        .any(|e| matches!(e, ProgressionEvent::QuestCompleted(c) if c.quest_id == "daily_duel_win")));
}

#[tokio::test]
async fn test_not_ready_until_both_results() {
    let f = fixture();
    let duel = f
        .engine
        .duels()
        .issue_challenge(&alice(), &bob(), "geometry", 6)
        .await
        .unwrap();
    f.engine
        .duels()
        .submit_result(&duel.id, &alice(), 4, 40, "Alice")
        .await
        .unwrap();

    let report = f.engine.settlement().settle(&duel.id, &alice()).await.unwrap();
    assert_eq!(report.disposition, Disposition::NotReady);
    assert_eq!(report.self_outcome, None);
    let stored = f.engine.duels().get_duel(&duel.id).await.unwrap();
    assert_eq!(stored.status, DuelStatus::Pending);
}
