//! The scenario and walkthrough files shipped with the repository

mod support;

use std::path::PathBuf;

use coursecheck_e2e::playwright::PlaywrightDriver;
use coursecheck_e2e::{ScenarioRunner, ScenarioSpec, WalkStep, WalkthroughSpec};
use support::StubServer;

fn repo_dir(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../..").join(name)
}

#[test]
fn shipped_scenarios_parse() {
    let specs = ScenarioSpec::load_all(&repo_dir("scenarios")).unwrap();
    let names: Vec<&str> = specs.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "course-roster",
            "instructor-analytics-unrated",
            "instructor-course-listing",
            "instructor-recent-enrollments"
        ]
    );
}

#[tokio::test]
async fn shipped_scenarios_pass_against_stub() {
    let stub = StubServer::start().await;
    let runner = ScenarioRunner::new(&stub.config()).unwrap();
    let specs = ScenarioSpec::load_all(&repo_dir("scenarios")).unwrap();

    let suite = runner.run_specs(&specs).await;

    for result in &suite.results {
        assert!(result.passed(), "{}: {:?}", result.name(), result.failure());
    }
    assert_eq!(stub.live_rows(), 0);
}

#[test]
fn shipped_walkthroughs_render_to_scripts() {
    let walkthroughs = WalkthroughSpec::load_all(&repo_dir("walkthroughs")).unwrap();
    let names: Vec<&str> = walkthroughs.iter().map(|w| w.name.as_str()).collect();
    for expected in ["instructor-earnings", "course-player-progress", "admin-access-control"] {
        assert!(names.contains(&expected), "{:?}", names);
    }

    let driver = PlaywrightDriver::new("http://localhost:3000", &Default::default()).unwrap();
    for walkthrough in &walkthroughs {
        let script = driver.build_script(walkthrough);
        assert!(script.contains("chromium"), "{}", walkthrough.name);
        assert!(script.contains("page.goto"), "{}", walkthrough.name);
        let asserts = walkthrough.steps.iter().any(|s| matches!(s, WalkStep::Assert { .. }));
        assert_eq!(script.contains("@playwright/test"), asserts, "{}", walkthrough.name);
    }
}
