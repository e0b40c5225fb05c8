//! Daily quest progress through the store

mod common;

use chrono::Duration;

use common::*;
use quizduel::domain::Reward;
use quizduel::progression::{QuestDefinition, QuestEvent};
use quizduel::NotificationKind;

fn two_test_quests() -> Vec<QuestDefinition> {
    vec![
        QuestDefinition::new("one", "Finish a test", QuestEvent::TestComplete, 1, Reward::xp_coins(20, 10)),
        QuestDefinition::new("two", "Finish 2 tests", QuestEvent::TestComplete, 2, Reward::xp_coins(60, 30)),
    ]
}

#[tokio::test]
async fn test_one_event_feeds_every_matching_quest() {
    let mut config = test_config();
    config.quests = two_test_quests();
    let f = fixture_with(config);
    let quests = f.engine.quests();

    let done = quests.record_event(&alice(), QuestEvent::TestComplete).await.unwrap();
    assert_eq!(done.iter().map(|c| c.quest_id.as_str()).collect::<Vec<_>>(), vec!["one"]);

    let state = quests.daily_state(&alice()).await.unwrap();
    assert_eq!(state.progress_of("one"), 1);
    assert_eq!(state.progress_of("two"), 1);
    assert!(state.is_completed("one"));
    assert!(!state.is_completed("two"));

    let done = quests.record_event(&alice(), QuestEvent::TestComplete).await.unwrap();
    assert_eq!(done.iter().map(|c| c.quest_id.as_str()).collect::<Vec<_>>(), vec!["two"]);

    // 20 + 60 XP crosses the first threshold
    let progress = f.engine.progression().progress(&alice()).await.unwrap();
    assert_eq!((progress.level, progress.xp, progress.coins), (1, 80, 40));

    // Nothing left to complete today
    let done = quests.record_event(&alice(), QuestEvent::TestComplete).await.unwrap();
    assert!(done.is_empty());
}

#[tokio::test]
async fn test_yesterday_progress_is_reset() {
    let mut config = test_config();
    config.quests = two_test_quests();
    let f = fixture_with(config);
    let quests = f.engine.quests();

    quests.record_event(&alice(), QuestEvent::TestComplete).await.unwrap();
    assert!(quests.daily_state(&alice()).await.unwrap().is_completed("one"));

    f.clock.advance(Duration::days(1));

    // Reads see an empty day before anything is written
    let state = quests.daily_state(&alice()).await.unwrap();
    assert!(state.progress.is_empty());
    assert!(state.completed.is_empty());

    let done = quests.record_event(&alice(), QuestEvent::TestComplete).await.unwrap();
    assert_eq!(done.len(), 1);
    assert_eq!(done[0].quest_id, "one");
    let state = quests.daily_state(&alice()).await.unwrap();
    assert_eq!(state.progress_of("two"), 1);
}

#[tokio::test]
async fn test_same_day_keeps_progress() {
    let mut config = test_config();
    config.quests = two_test_quests();
    let f = fixture_with(config);
    let quests = f.engine.quests();

    quests.record_event(&alice(), QuestEvent::TestComplete).await.unwrap();
    f.clock.advance(Duration::hours(6));
    quests.record_event(&alice(), QuestEvent::TestComplete).await.unwrap();

    let state = quests.daily_state(&alice()).await.unwrap();
    assert!(state.is_completed("two"));
}

#[tokio::test]
async fn test_completion_notifies_player() {
    let f = fixture();
    f.engine
        .quests()
        .record_event(&bob(), QuestEvent::PuzzleSolved)
        .await
        .unwrap();
    let done = f
        .engine
        .quests()
        .record_event(&bob(), QuestEvent::PuzzleSolved)
        .await
        .unwrap();
    assert_eq!(done[0].quest_id, "daily_puzzle_2");

    let unread = f.engine.notifications().unread(&bob()).await.unwrap();
    assert_eq!(unread.len(), 1);
    assert_eq!(unread[0].kind, NotificationKind::QuestCompleted);
    assert_eq!(unread[0].data["questId"], "daily_puzzle_2");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_events_all_count() {
    let mut config = test_config();
    config.quests = vec![QuestDefinition::new(
        "five",
        "Five rounds",
        QuestEvent::MiniGameComplete,
        5,
        Reward::xp_coins(40, 20),
    )];
    let f = fixture_with(config);

    let events = (0..5).map(|_| {
        let engine = f.engine.clone();
        tokio::spawn(async move {
            engine
                .quests()
                .record_event(&alice(), QuestEvent::MiniGameComplete)
                .await
        })
    });
    let completions: usize = futures::future::join_all(events)
        .await
        .into_iter()
        .map(|r| r.unwrap().unwrap().len())
        .sum();

    assert_eq!(completions, 1);
    let progress = f.engine.progression().progress(&alice()).await.unwrap();
    assert_eq!(progress.xp, 40);
}
