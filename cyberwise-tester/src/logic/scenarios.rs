use anyhow::{Context, Result, bail, ensure};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;

use cyberwise_game::constants::{
    CODE_RED_NODE_COUNT, CODE_RED_SALARY_REWARD, CODE_RED_TIME_LIMIT_SECS, LEGACY_SAVE_KEY,
    PREMIUM_PASS_COST, STARTING_SALARY, STARTING_TOOL_ID,
};
use cyberwise_game::{
    ClaimError, ClueOutcome, CodeRedFailure, CodeRedStatus, GameSession, MissionReport,
    PersistentStore, PlayerState, PostMissionEvent, ProfileError, PurchaseError, QuizOutcome,
    RewardKey, RewardTrack, SessionError, StorageBackend, ThemeId, open_session, random_choice,
    unlocked_cities,
};

use super::backend::HarnessBackend;

const CAREER_STEPS: u32 = 40;
const MAX_GRIND: usize = 60;

/// Everything one scenario iteration needs.
#[derive(Debug, Clone)]
pub struct ScenarioCtx {
    pub seed: u64,
    pub backend: HarnessBackend,
}

impl ScenarioCtx {
    #[must_use]
    pub const fn new(seed: u64, backend: HarnessBackend) -> Self {
        Self { seed, backend }
    }

    fn open(&self) -> Result<GameSession<HarnessBackend>> {
        open_session(self.backend.clone(), self.seed).context("opening session")
    }

    fn session_with_agent(&self, name: &str) -> Result<GameSession<HarnessBackend>> {
        let mut session = self.open()?;
        let profile = session.create_profile(name)?;
        session.select_profile(&profile.id)?;
        Ok(session)
    }

    fn rng(&self) -> ChaCha20Rng {
        ChaCha20Rng::seed_from_u64(self.seed)
    }
}

pub type ScenarioFn = fn(&ScenarioCtx) -> Result<()>;

/// A named script driven against a fresh save.
#[derive(Clone, Copy)]
pub struct Scenario {
    pub key: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    run: ScenarioFn,
}

impl Scenario {
    /// # Errors
    ///
    /// Returns the first expectation the run violated.
    pub fn run(&self, ctx: &ScenarioCtx) -> Result<()> {
        (self.run)(ctx)
    }
}

impl std::fmt::Debug for Scenario {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scenario").field("key", &self.key).finish()
    }
}

const SCENARIOS: &[Scenario] = &[
    Scenario {
        key: "smoke",
        name: "Smoke",
        description: "Create an agent and clear the first mission",
        run: smoke,
    },
    Scenario {
        key: "career",
        name: "Career",
        description: "Random walk through open missions, quizzes and Code Red events",
        run: career,
    },
    Scenario {
        key: "clue-hunt",
        name: "Clue Hunt",
        description: "Find every clue of a mission in shuffled order",
        run: clue_hunt,
    },
    Scenario {
        key: "data-pass",
        name: "Data Pass",
        description: "Level the pass and claim every slot exactly once",
        run: data_pass,
    },
    Scenario {
        key: "economy",
        name: "Economy",
        description: "Tool upgrades to max level and theme purchases",
        run: economy,
    },
    Scenario {
        key: "code-red",
        name: "Code Red",
        description: "Defend one intrusion and let another time out",
        run: code_red,
    },
    Scenario {
        key: "profiles",
        name: "Profiles",
        description: "Several agents sharing one save, switching and deleting",
        run: profiles,
    },
    Scenario {
        key: "migration",
        name: "Legacy Migration",
        description: "Single-slot save is imported once into a profile",
        run: migration,
    },
];

pub fn list_scenarios() -> impl Iterator<Item = (&'static str, &'static str)> {
    SCENARIOS
        .iter()
        .map(|scenario| (scenario.key, scenario.description))
}

#[must_use]
pub fn scenario_keys() -> Vec<&'static str> {
    SCENARIOS.iter().map(|scenario| scenario.key).collect()
}

#[must_use]
pub fn find_scenario(key: &str) -> Option<&'static Scenario> {
    SCENARIOS
        .iter()
        .find(|scenario| scenario.key.eq_ignore_ascii_case(key))
}

// Helpers ---

fn live_state<B: StorageBackend>(session: &GameSession<B>) -> Result<&PlayerState> {
    session.state().context("no live profile")
}

/// Repeat `mission_id` until `done` holds.
fn grind<B, F>(session: &mut GameSession<B>, mission_id: &str, done: F) -> Result<()>
where
    B: StorageBackend,
    F: Fn(&PlayerState) -> bool,
{
    for _ in 0..MAX_GRIND {
        if done(live_state(session)?) {
            return Ok(());
        }
        session.complete_mission(mission_id)?;
    }
    bail!("goal not reached after {MAX_GRIND} runs of {mission_id}")
}

fn open_missions<B: StorageBackend>(session: &GameSession<B>) -> Result<Vec<String>> {
    let state = live_state(session)?;
    let catalog = session.catalog();
    let cities: Vec<&str> = unlocked_cities(state, catalog)
        .into_iter()
        .map(|city| city.id.as_str())
        .collect();
    Ok(catalog
        .missions
        .iter()
        .filter(|mission| cities.contains(&mission.city_id.as_str()))
        .map(|mission| mission.id.clone())
        .collect())
}

fn check_mission_delta<B: StorageBackend>(
    session: &GameSession<B>,
    before: &PlayerState,
    report: &MissionReport,
) -> Result<()> {
    let after = live_state(session)?;
    ensure!(
        after.salary == before.salary + report.salary_earned,
        "salary went {} -> {} but {} was reported",
        before.salary,
        after.salary,
        report.salary_earned
    );
    ensure!(
        after.xp == before.xp + report.xp_gained,
        "xp went {} -> {}",
        before.xp,
        after.xp
    );
    ensure!(
        after.missions_completed.in_city(&report.city_id)
            == before.missions_completed.in_city(&report.city_id) + 1,
        "{} counter did not move",
        report.city_id
    );

    let ladder = &session.catalog().ranks;
    let from = ladder
        .index_of(&before.rank)
        .with_context(|| format!("unknown rank {}", before.rank))?;
    let to = ladder
        .index_of(&after.rank)
        .with_context(|| format!("unknown rank {}", after.rank))?;
    ensure!(to >= from, "rank fell from {} to {}", before.rank, after.rank);
    ensure!(
        to - from == report.promotions.len(),
        "{} promotions reported for {} rungs climbed",
        report.promotions.len(),
        to - from
    );
    for promotion in &report.promotions {
        ensure!(
            ladder.index_of(&promotion.to) == ladder.index_of(&promotion.from).map(|i| i + 1),
            "promotion {} -> {} skipped a rung",
            promotion.from,
            promotion.to
        );
    }
    Ok(())
}

fn check_invariants<B: StorageBackend>(session: &GameSession<B>) -> Result<()> {
    let state = live_state(session)?;
    let catalog = session.catalog();
    ensure!(
        catalog.ranks.contains(&state.rank),
        "rank {} is off the ladder",
        state.rank
    );
    ensure!(state.data_pass.level >= 1, "data pass level dropped to 0");
    ensure!(
        state.data_pass.xp < catalog.data_pass.xp_per_level,
        "data pass xp {} left unsettled",
        state.data_pass.xp
    );
    for tool in &state.inventory.tools {
        let def = catalog
            .tool(&tool.id)
            .with_context(|| format!("owned tool {} is not in the catalog", tool.id))?;
        ensure!(
            (1..=def.max_level()).contains(&tool.level),
            "{} at level {} (max {})",
            tool.id,
            tool.level,
            def.max_level()
        );
    }
    ensure!(
        state.owns_theme(state.settings.theme),
        "theme {} equipped without owning it",
        state.settings.theme
    );
    Ok(())
}

fn play_code_red<B: StorageBackend>(
    session: &mut GameSession<B>,
    rng: &mut ChaCha20Rng,
) -> Result<()> {
    let sequence = session
        .code_red()
        .context("code red event without a challenge")?
        .sequence()
        .to_vec();
    let salary_before = live_state(session)?.salary;
    let defend = rng.gen_bool(0.5);

    for (index, node) in sequence.iter().enumerate() {
        let pressed = if defend || index > 0 {
            *node
        } else {
            (node + 1) % CODE_RED_NODE_COUNT
        };
        if session.press_code_red_node(pressed)?.is_finished() {
            break;
        }
    }

    let reward = session.resolve_code_red()?;
    let salary_after = live_state(session)?.salary;
    match (defend, reward) {
        (true, Some(reward)) => ensure!(
            salary_after == salary_before + reward.salary,
            "code red paid {} but salary moved {salary_before} -> {salary_after}",
            reward.salary
        ),
        (false, None) => ensure!(
            salary_after == salary_before,
            "failed code red changed salary"
        ),
        (defend, reward) => bail!("code red defended={defend} resolved to {reward:?}"),
    }
    Ok(())
}

fn study_cards<B: StorageBackend>(
    session: &mut GameSession<B>,
    rng: &mut ChaCha20Rng,
) -> Result<()> {
    let pending: Vec<(String, String)> = {
        let state = live_state(session)?;
        session
            .catalog()
            .cards
            .iter()
            .filter(|card| {
                state.inventory.cyber_cards.contains(&card.id)
                    && !state.inventory.licenses.contains(&card.license)
            })
            .map(|card| (card.id.clone(), card.quiz.answer.clone()))
            .collect()
    };

    for (card_id, answer) in pending {
        let attempt = if rng.gen_bool(0.7) {
            answer.as_str()
        } else {
            "Not sure"
        };
        let rank_before = live_state(session)?.rank.clone();
        let report = session.submit_quiz_answer(&card_id, attempt)?;
        let passed = matches!(report.outcome, QuizOutcome::Passed { .. });
        ensure!(
            passed == (attempt == answer),
            "quiz on {card_id} graded {:?} for {attempt:?}",
            report.outcome
        );
        let ladder = &session.catalog().ranks;
        let from = ladder.index_of(&rank_before).context("rank off the ladder")?;
        let to = ladder
            .index_of(&live_state(session)?.rank)
            .context("rank off the ladder")?;
        ensure!(
            to.checked_sub(from) == Some(report.promotions.len()) && (passed || to == from),
            "quiz on {card_id} moved rank {from} -> {to} with {} promotions",
            report.promotions.len()
        );
    }
    Ok(())
}

// Scenarios ---

fn smoke(ctx: &ScenarioCtx) -> Result<()> {
    let mut session = ctx.session_with_agent("Smoke Test")?;
    let report = session.complete_mission("phishing_01")?;
    ensure!(
        report.salary_earned == 50,
        "first mission paid {}",
        report.salary_earned
    );

    let state = live_state(&session)?;
    ensure!(state.salary == STARTING_SALARY + 50, "salary {}", state.salary);
    ensure!(state.xp == 100, "xp {}", state.xp);
    ensure!(state.data_pass.xp == 50, "data pass xp {}", state.data_pass.xp);
    check_invariants(&session)
}

fn career(ctx: &ScenarioCtx) -> Result<()> {
    let mut session = ctx.session_with_agent("Career Agent")?;
    let mut rng = ctx.rng();

    for step in 1..=CAREER_STEPS {
        let before = live_state(&session)?.clone();
        let missions = open_missions(&session)?;
        let mission_id = random_choice(&missions, &mut rng)
            .context("no mission is open")?
            .clone();
        let report = session
            .complete_mission(&mission_id)
            .with_context(|| format!("step {step}: {mission_id}"))?;
        check_mission_delta(&session, &before, &report)
            .with_context(|| format!("step {step}: {mission_id}"))?;
        log::debug!(
            "step {step}: {mission_id} +{} ({:?})",
            report.salary_earned,
            report.event
        );

        if report.event == PostMissionEvent::CodeRed {
            play_code_red(&mut session, &mut rng)?;
        }
        study_cards(&mut session, &mut rng)?;
        check_invariants(&session).with_context(|| format!("after step {step}"))?;
    }

    let state = live_state(&session)?.clone();
    ensure!(
        state.missions_completed.total == CAREER_STEPS,
        "{} missions counted",
        state.missions_completed.total
    );

    session.save()?;
    let reopened = ctx.open()?;
    ensure!(
        reopened.state() == Some(&state),
        "reloaded agent differs from the saved one"
    );
    Ok(())
}

fn clue_hunt(ctx: &ScenarioCtx) -> Result<()> {
    let mut session = ctx.session_with_agent("Analyst")?;
    let mut rng = ctx.rng();
    let mission = session
        .catalog()
        .mission("phishing_01")
        .context("phishing_01 missing from catalog")?
        .clone();

    let mut clues = mission.clues.clone();
    clues.shuffle(&mut rng);
    session.start_mission(&mission.id)?;

    let (last, rest) = clues.split_last().context("mission has no clues")?;
    for clue in rest {
        if rng.gen_bool(0.3) {
            let decoy = session.inspect_clue("company_logo")?;
            ensure!(
                decoy.outcome == ClueOutcome::Ignored,
                "decoy answered {:?}",
                decoy.outcome
            );
        }
        let progress = session.inspect_clue(clue)?;
        ensure!(
            matches!(progress.outcome, ClueOutcome::Found { .. }) && progress.report.is_none(),
            "{clue} gave {:?}",
            progress.outcome
        );
        let run = session.mission_run().context("mission run closed early")?;
        ensure!(
            run.found().contains(clue),
            "{clue} missing from found list {:?}",
            run.found()
        );
    }

    let finished = session.inspect_clue(last)?;
    let report = finished
        .report
        .context("last clue did not complete the mission")?;
    ensure!(report.mission_id == mission.id, "wrong mission paid out");
    ensure!(session.mission_run().is_none(), "mission run left open");
    ensure!(
        live_state(&session)?.salary == STARTING_SALARY + report.salary_earned,
        "clue hunt payout not credited"
    );
    Ok(())
}

fn data_pass(ctx: &ScenarioCtx) -> Result<()> {
    let mut session = ctx.session_with_agent("Pass Holder")?;
    let id = session
        .active_profile_id()
        .context("no active profile")?
        .to_string();

    ensure!(
        matches!(
            session.claim_reward(RewardKey::free(2)),
            Err(SessionError::Claim(ClaimError::Locked { .. }))
        ),
        "level 2 reward claimable at level 1"
    );
    ensure!(
        matches!(
            session.claim_reward(RewardKey::premium(1)),
            Err(SessionError::Claim(ClaimError::PremiumLocked(_)))
        ),
        "premium reward claimable without the pass"
    );

    let keys = session.catalog().data_pass.keys();
    let top = keys.iter().map(|key| key.level).max().context("empty data pass")?;
    grind(&mut session, "phishing_01", |state| state.data_pass.level >= top)?;

    for key in keys.iter().filter(|key| key.track == RewardTrack::Free) {
        let applied = session
            .claim_reward(*key)
            .with_context(|| format!("claiming {key}"))?;
        log::debug!("{key}: {applied:?}");
        ensure!(
            matches!(
                session.claim_reward(*key),
                Err(SessionError::Claim(ClaimError::AlreadyClaimed(_)))
            ),
            "{key} paid out twice"
        );
    }

    grind(&mut session, "phishing_01", |state| {
        state.salary >= PREMIUM_PASS_COST
    })?;
    session.buy_premium_pass()?;
    for key in keys.iter().filter(|key| key.track == RewardTrack::Premium) {
        session
            .claim_reward(*key)
            .with_context(|| format!("claiming {key}"))?;
    }

    let saved = session
        .registry()
        .profile(&id)
        .context("profile missing from storage")?;
    ensure!(saved.game_data.data_pass.is_premium, "premium pass not saved");
    ensure!(
        saved.game_data.data_pass.claimed_rewards.len() == keys.len(),
        "{} of {} claims saved",
        saved.game_data.data_pass.claimed_rewards.len(),
        keys.len()
    );
    check_invariants(&session)
}

fn economy(ctx: &ScenarioCtx) -> Result<()> {
    let mut session = ctx.session_with_agent("Big Spender")?;
    let mut rng = ctx.rng();

    ensure!(
        matches!(
            session.purchase_tool_upgrade(STARTING_TOOL_ID),
            Err(SessionError::Purchase(
                PurchaseError::InsufficientFunds { .. }
            ))
        ),
        "upgrade sold on a starting salary"
    );
    ensure!(
        live_state(&session)?.salary == STARTING_SALARY,
        "rejected purchase charged salary"
    );

    let tool = session
        .catalog()
        .tool(STARTING_TOOL_ID)
        .context("starting tool missing from catalog")?
        .clone();
    loop {
        let level = live_state(&session)?
            .inventory
            .tool_level(&tool.id)
            .context("starting tool not owned")?;
        if level >= tool.max_level() {
            break;
        }
        let cost = tool.upgrade_to(level + 1).context("missing upgrade")?.cost;
        grind(&mut session, "phishing_01", |state| state.salary >= cost)?;
        let before = live_state(&session)?.salary;
        let upgraded = session.purchase_tool_upgrade(&tool.id)?;
        let after = live_state(&session)?.salary;
        ensure!(upgraded == level + 1, "upgrade reached level {upgraded}");
        ensure!(after == before - cost, "upgrade charged {}", before - after);
    }

    ensure!(
        matches!(
            session.purchase_tool_upgrade(&tool.id),
            Err(SessionError::Purchase(PurchaseError::MaxLevel { .. }))
        ),
        "upgrade past max level"
    );
    ensure!(
        matches!(
            session.purchase_tool_upgrade("firewallforge"),
            Err(SessionError::Purchase(PurchaseError::NotOwned(_)))
        ),
        "upgraded a tool the agent does not own"
    );
    ensure!(
        matches!(
            session.purchase_tool_upgrade("quantum_decoder"),
            Err(SessionError::Purchase(PurchaseError::UnknownTool(_)))
        ),
        "upgraded an unknown tool"
    );

    let themes: Vec<(String, u64)> = session
        .catalog()
        .shop
        .items
        .iter()
        .filter(|item| item.theme != ThemeId::Default)
        .map(|item| (item.id.clone(), item.cost))
        .collect();
    let (item_id, cost) = random_choice(&themes, &mut rng)
        .context("shop has no themes")?
        .clone();
    grind(&mut session, "phishing_01", |state| state.salary >= cost)?;
    let first = session.purchase_theme(&item_id)?;
    ensure!(first.charged == cost, "{item_id} charged {}", first.charged);

    let default_item = session
        .catalog()
        .shop
        .item_for_theme(ThemeId::Default)
        .context("default theme missing from shop")?
        .id
        .clone();
    ensure!(
        session.purchase_theme(&default_item)?.charged == 0,
        "default theme is not free"
    );
    let again = session.purchase_theme(&item_id)?;
    ensure!(again.charged == 0, "owned theme charged {}", again.charged);
    ensure!(
        live_state(&session)?.settings.theme == first.theme,
        "owned theme not re-equipped"
    );
    check_invariants(&session)
}

fn code_red(ctx: &ScenarioCtx) -> Result<()> {
    let mut session = ctx.session_with_agent("Responder")?;

    let sequence = session.start_code_red()?.sequence().to_vec();
    ensure!(
        matches!(
            session.resolve_code_red(),
            Err(SessionError::CodeRedUnfinished)
        ),
        "unfinished challenge resolved"
    );
    for node in sequence {
        session.press_code_red_node(node)?;
    }
    let reward = session
        .resolve_code_red()?
        .context("defended intrusion paid nothing")?;
    ensure!(
        reward.salary == CODE_RED_SALARY_REWARD,
        "code red paid {}",
        reward.salary
    );

    session.start_code_red()?;
    let mut status = session.tick_code_red()?;
    for _ in 0..CODE_RED_TIME_LIMIT_SECS {
        if status.is_finished() {
            break;
        }
        status = session.tick_code_red()?;
    }
    ensure!(
        status
            == CodeRedStatus::Failed {
                reason: CodeRedFailure::Timeout
            },
        "countdown ended as {status:?}"
    );
    ensure!(
        session.resolve_code_red()?.is_none(),
        "timed out challenge paid out"
    );
    ensure!(
        live_state(&session)?.salary == STARTING_SALARY + CODE_RED_SALARY_REWARD,
        "salary {}",
        live_state(&session)?.salary
    );
    Ok(())
}

fn profiles(ctx: &ScenarioCtx) -> Result<()> {
    let mut session = ctx.open()?;
    let mut ids = Vec::new();
    for name in ["Alpha", "Bravo", "Charlie"] {
        ids.push(session.create_profile(name)?.id);
    }
    ensure!(
        matches!(
            session.create_profile("alpha"),
            Err(SessionError::Profile(ProfileError::DuplicateName(_)))
        ),
        "duplicate name accepted"
    );

    for (round, id) in ids.iter().enumerate() {
        session.select_profile(id)?;
        for _ in 0..=round {
            session.complete_mission("phishing_01")?;
        }
    }
    session.save()?;

    for (round, id) in ids.iter().enumerate() {
        let saved = session
            .registry()
            .profile(id)
            .with_context(|| format!("profile {id} vanished"))?;
        let expected = u32::try_from(round + 1)?;
        ensure!(
            saved.game_data.missions_completed.total == expected,
            "{} saved {} missions, expected {expected}",
            saved.name,
            saved.game_data.missions_completed.total
        );
    }

    let (first, last) = ids
        .first()
        .zip(ids.last())
        .context("no profiles created")?;
    session.delete_profile(first)?;
    ensure!(session.registry().profile_count() == 2, "profile not deleted");
    ensure!(
        session.active_profile_id() == Some(last.as_str()),
        "deleting another profile unloaded the live one"
    );
    Ok(())
}

fn migration(ctx: &ScenarioCtx) -> Result<()> {
    let mut rng = ctx.rng();
    let mut legacy = PlayerState::new("Legacy Agent");
    legacy.salary = rng.gen_range(100..5_000);
    legacy.xp = rng.gen_range(0..400);
    legacy.data_pass.claimed_rewards.insert(RewardKey::free(1));

    let store = PersistentStore::new(ctx.backend.clone());
    store.try_save(LEGACY_SAVE_KEY, &legacy)?;

    let session = ctx.open()?;
    let state = live_state(&session)?;
    ensure!(
        state.name == legacy.name && state.salary == legacy.salary && state.xp == legacy.xp,
        "migrated agent does not match the legacy save"
    );
    ensure!(
        store.load::<PlayerState>(LEGACY_SAVE_KEY).is_none(),
        "legacy save kept after migration"
    );

    let mut reopened = ctx.open()?;
    ensure!(
        reopened.registry().profile_count() == 1,
        "legacy save migrated twice"
    );
    ensure!(
        matches!(
            reopened.claim_reward(RewardKey::free(1)),
            Err(SessionError::Claim(ClaimError::AlreadyClaimed(_)))
        ),
        "legacy claim replayed"
    );
    Ok(())
}
