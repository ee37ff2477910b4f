use cyberwise_game::{
    AppliedReward, ClaimError, ClueOutcome, CodeRedStatus, GameSession, MemoryBackend,
    MissionStatus, PurchaseError, QuizOutcome, RewardKey, SessionError, ThemeId, open_session,
};

fn session_with_agent(name: &str) -> GameSession<MemoryBackend> {
    let mut session = open_session(MemoryBackend::new(), 0xC0FFEE).unwrap();
    let profile = session.create_profile(name).unwrap();
    session.select_profile(&profile.id).unwrap();
    session
}

#[test]
fn first_mission_credits_plain_reward() {
    let mut session = session_with_agent("Neo");
    let report = session.complete_mission("phishing_01").unwrap();

    assert_eq!(report.salary_earned, 50);
    assert_eq!(report.card_collected.as_deref(), Some("phishing101"));
    assert!(report.promotions.is_empty());

    let state = session.state().unwrap();
    assert_eq!(state.salary, 150);
    assert_eq!(state.xp, 100);
    assert_eq!(state.data_pass.xp, 50);
    assert_eq!(state.missions_completed.in_city("inbox_isles"), 1);
}

#[test]
fn career_progresses_through_quiz_promotion_and_bonuses() {
    let mut session = session_with_agent("Trinity");
    session.complete_mission("phishing_01").unwrap();

    let quiz = session.submit_quiz_answer("phishing101", "False").unwrap();
    assert!(matches!(quiz.outcome, QuizOutcome::Passed { newly_earned: true, .. }));
    assert_eq!(quiz.promotions.len(), 1);
    assert_eq!(quiz.promotions[0].to, "Junior Analyst");
    assert_eq!(quiz.promotions[0].tool_granted.as_deref(), Some("socialscope"));
    assert_eq!(quiz.achievements_unlocked, vec!["junior_agent"]);

    let second = session.complete_mission("phishing_01").unwrap();
    assert_eq!(second.salary_earned, 50);
    assert_eq!(second.data_pass_levels_gained, 1);
    assert!(second.promotions.is_empty());
    assert_eq!(second.achievements_unlocked, vec!["scam_spotter"]);

    let third = session.complete_mission("phishing_01").unwrap();
    assert_eq!(third.salary_earned, 55);
    assert_eq!(session.state().unwrap().salary, 255);

    assert!(matches!(
        session.complete_mission("data_leak_01"),
        Err(SessionError::CityLocked(_))
    ));
    assert_eq!(session.state().unwrap().salary, 255);

    let social = session.complete_mission("fake_profile_01").unwrap();
    assert_eq!(social.salary_earned, 75);
    assert_eq!(session.state().unwrap().rank, "Junior Analyst");
}

#[test]
fn passing_quiz_opens_next_city_without_another_mission() {
    let mut session = session_with_agent("Ghost");
    session.complete_mission("phishing_01").unwrap();
    assert!(matches!(
        session.start_mission("fake_profile_01"),
        Err(SessionError::CityLocked(_))
    ));

    let quiz = session.submit_quiz_answer("phishing101", "False").unwrap();
    assert_eq!(quiz.promotions.len(), 1);
    let state = session.state().unwrap();
    assert_eq!(state.rank, "Junior Analyst");
    assert_eq!(state.inventory.tool_level("socialscope"), Some(1));

    session.start_mission("fake_profile_01").unwrap();
    let social = session.complete_mission("fake_profile_01").unwrap();
    assert_eq!(social.city_id, "social_square");

    let again = session.submit_quiz_answer("phishing101", "False").unwrap();
    assert!(matches!(again.outcome, QuizOutcome::Passed { newly_earned: false, .. }));
    assert!(again.promotions.is_empty());
    assert!(again.achievements_unlocked.is_empty());
}

#[test]
fn failed_quiz_changes_no_rank() {
    let mut session = session_with_agent("Dozer");
    session.complete_mission("phishing_01").unwrap();
    let quiz = session.submit_quiz_answer("phishing101", "True").unwrap();
    assert_eq!(quiz.outcome, QuizOutcome::Failed);
    assert!(quiz.promotions.is_empty());
    assert_eq!(session.state().unwrap().rank, "Digital Intern");
}

#[test]
fn unknown_mission_is_rejected() {
    let mut session = session_with_agent("Lost");
    assert!(matches!(
        session.complete_mission("heist_99"),
        Err(SessionError::UnknownMission(_))
    ));
}

#[test]
fn operations_need_an_active_profile() {
    let mut session = open_session(MemoryBackend::new(), 1).unwrap();
    assert!(matches!(
        session.complete_mission("phishing_01"),
        Err(SessionError::NoActiveProfile)
    ));
    assert!(matches!(
        session.claim_reward(RewardKey::free(1)),
        Err(SessionError::NoActiveProfile)
    ));
    assert!(matches!(session.save(), Err(SessionError::NoActiveProfile)));
}

#[test]
fn data_pass_claims_follow_the_ladder() {
    let mut session = session_with_agent("Claimer");
    assert_eq!(
        session.claim_reward(RewardKey::free(1)).unwrap(),
        AppliedReward::Salary { amount: 50 }
    );
    assert!(matches!(
        session.claim_reward(RewardKey::free(1)),
        Err(SessionError::Claim(ClaimError::AlreadyClaimed(_)))
    ));
    assert!(matches!(
        session.claim_reward(RewardKey::premium(1)),
        Err(SessionError::Claim(ClaimError::PremiumLocked(_)))
    ));

    session.complete_mission("phishing_01").unwrap();
    session.complete_mission("phishing_01").unwrap();
    assert_eq!(session.state().unwrap().data_pass.level, 2);
    assert_eq!(
        session.claim_reward(RewardKey::free(2)).unwrap(),
        AppliedReward::DuplicateCard {
            card_id: "phishing101".to_string(),
            bonus: 100
        }
    );
}

#[test]
fn shop_purchases_respect_salary() {
    let mut session = session_with_agent("Shopper");
    assert!(matches!(
        session.purchase_tool_upgrade("phishsniffer"),
        Err(SessionError::Purchase(PurchaseError::InsufficientFunds { .. }))
    ));
    session.with_state_mut(|state| state.salary = 2_000).unwrap();
    assert_eq!(session.purchase_tool_upgrade("phishsniffer").unwrap(), 2);
    session.buy_premium_pass().unwrap();
    assert!(matches!(
        session.buy_premium_pass(),
        Err(SessionError::Purchase(PurchaseError::AlreadyPremium))
    ));
    let theme = session.purchase_theme("theme_cyber").unwrap();
    assert_eq!(theme.charged, 500);

    let state = session.state().unwrap();
    assert_eq!(state.salary, 2_000 - 150 - 500 - 500);
    assert_eq!(state.settings.theme, ThemeId::Cyber);
    assert!(state.data_pass.is_premium);
}

#[test]
fn clue_hunt_pays_out_when_solved() {
    let mut session = session_with_agent("Hunter");
    let run = session.start_mission("phishing_01").unwrap();
    assert_eq!(run.progress(), (0, 5));

    let clues = ["sender", "salutation", "link", "urgency"];
    for clue in clues {
        let progress = session.inspect_clue(clue).unwrap();
        assert!(progress.report.is_none());
    }
    assert_eq!(
        session.inspect_clue("logo").unwrap().outcome,
        ClueOutcome::Ignored
    );
    let finished = session.inspect_clue("attachment").unwrap();
    let report = finished.report.unwrap();
    assert_eq!(report.mission_id, "phishing_01");
    assert!(session.mission_run().is_none());
    assert_eq!(session.state().unwrap().salary, 150);
}

#[test]
fn breached_firewall_ends_run_without_pay() {
    let mut session = session_with_agent("Veteran");
    session
        .with_state_mut(|state| state.rank = "Senior Agent".to_string())
        .unwrap();
    let run = session.start_mission("ransomware_01").unwrap();
    assert_eq!(run.firewall_integrity(), Some(100));
    assert_eq!(run.status(), MissionStatus::Active);

    for _ in 0..3 {
        session.inspect_clue("explorer.exe").unwrap();
    }
    let last = session.inspect_clue("explorer.exe").unwrap();
    assert_eq!(last.outcome, ClueOutcome::Breached);
    assert!(last.report.is_none());
    assert!(session.mission_run().is_none());
    assert_eq!(session.state().unwrap().salary, 100);
    assert!(matches!(
        session.inspect_clue("process"),
        Err(SessionError::NoMissionRun)
    ));
}

#[test]
fn code_red_success_pays_salary_and_pass_xp() {
    let mut session = session_with_agent("Reflex");
    let sequence = session.start_code_red().unwrap().sequence().to_vec();
    assert_eq!(sequence.len(), 3);
    assert!(matches!(
        session.resolve_code_red(),
        Err(SessionError::CodeRedUnfinished)
    ));
    session.tick_code_red().unwrap();

    let mut status = CodeRedStatus::Succeeded;
    for node in sequence {
        status = session.press_code_red_node(node).unwrap();
    }
    assert_eq!(status, CodeRedStatus::Succeeded);

    let reward = session.resolve_code_red().unwrap().unwrap();
    assert_eq!(reward.salary, 150);
    let state = session.state().unwrap();
    assert_eq!(state.salary, 250);
    assert_eq!(state.data_pass.xp, 50);
    assert!(matches!(
        session.resolve_code_red(),
        Err(SessionError::NoCodeRed)
    ));
}

#[test]
fn code_red_timeout_pays_nothing() {
    let mut session = session_with_agent("Slow");
    session.start_code_red().unwrap();
    let mut status = session.tick_code_red().unwrap();
    while !status.is_finished() {
        status = session.tick_code_red().unwrap();
    }
    assert!(session.resolve_code_red().unwrap().is_none());
    assert_eq!(session.state().unwrap().salary, 100);
}

#[test]
fn daily_login_bonus_once_per_day() {
    let mut session = session_with_agent("Regular");
    let day = chrono::NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();
    assert_eq!(session.check_daily_login(day).unwrap(), Some(100));
    assert_eq!(session.check_daily_login(day).unwrap(), None);
    assert_eq!(session.state().unwrap().salary, 200);
}

#[test]
fn hacker_messages_come_from_the_catalog() {
    let mut session = session_with_agent("Target");
    let messages = session.catalog().hacker_group.messages.clone();
    let taunt = session.hacker_message().unwrap().to_string();
    assert!(messages.contains(&taunt));
}
