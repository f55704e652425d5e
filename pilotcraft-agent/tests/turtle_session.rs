//! Turtle scenarios driven by scripted code actions

mod common;

use common::{answer, code, ScriptedProvider};
use pilotcraft_agent::{Agent, AgentConfig, TurtleSession};
use pilotcraft_core::Color;

fn close_to(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-6
}

#[tokio::test]
async fn draws_a_square_from_one_code_block() {
    let session = TurtleSession::default();
    let square = ["move_forward(100)", "turn(90)"].repeat(4).join("\n");
    let provider = ScriptedProvider::new([code(&square)]);
    let mut agent = Agent::new(provider, AgentConfig::turtle());

    let outcome = agent.run(session.tools(), "draw a square").await.unwrap();
    assert_eq!(outcome.observations.len(), 8);
    assert_eq!(outcome.summary(), Some("Turned by 90 degrees."));

    let canvas = session.snapshot();
    assert_eq!(canvas.segments().len(), 4);
    assert!(close_to(canvas.position().x, 0.0));
    assert!(close_to(canvas.position().y, 0.0));
    assert!(close_to(canvas.heading(), 0.0) || close_to(canvas.heading(), 360.0));
}

#[tokio::test]
async fn invalid_color_is_reported_and_pen_keeps_its_color() {
    let session = TurtleSession::default();
    let provider = ScriptedProvider::new([code("change_pen_color(\"not-a-colour\")"), code("change_pen_color(color=\"red\")")]);
    let mut agent = Agent::new(provider, AgentConfig::turtle());

    let outcome = agent.run(session.tools(), "paint it weird").await.unwrap();
    assert_eq!(outcome.summary(), Some("Error: 'not-a-colour' is not a valid color."));
    assert_eq!(session.snapshot().pen_color(), Color::BLACK);

    let outcome = agent.run(session.tools(), "paint it red").await.unwrap();
    assert_eq!(outcome.summary(), Some("Pen color changed to red."));
    assert_eq!(session.snapshot().pen_color(), Color::rgb(255, 0, 0));
}

#[tokio::test]
async fn pen_up_moves_without_drawing() {
    let session = TurtleSession::default();
    let provider = ScriptedProvider::new([code("pen_up()\nmove_forward(50)\npen_down()\nmove_forward(25)")]);
    let mut agent = Agent::new(provider, AgentConfig::turtle());

    agent.run(session.tools(), "skip ahead then draw").await.unwrap();
    let canvas = session.snapshot();
    assert_eq!(canvas.segments().len(), 1);
    assert!(close_to(canvas.segments()[0].from.x, 50.0));
    assert!(close_to(canvas.position().x, 75.0));
}

#[tokio::test]
async fn circle_lands_in_the_saved_drawing() {
    let session = TurtleSession::default();
    let provider = ScriptedProvider::new([
        code("change_pen_color(\"blue\")\ndraw_circle(30)"),
        answer("Drew a blue circle."),
    ]);
    let mut agent = Agent::new(provider, AgentConfig::turtle().with_max_steps(3));

    let outcome = agent.run(session.tools(), "draw a blue circle").await.unwrap();
    assert_eq!(outcome.steps, 2);
    assert_eq!(outcome.final_answer.as_deref(), Some("Drew a blue circle."));

    let canvas = session.snapshot();
    assert_eq!(canvas.segments().len(), 17);
    assert!(close_to(canvas.position().x, 0.0));
    assert!(close_to(canvas.position().y, 0.0));

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("circle.svg");
    session.save_svg(&path).unwrap();
    let svg = std::fs::read_to_string(&path).unwrap();
    assert_eq!(svg.matches("<line").count(), 17);
    assert!(svg.contains("stroke=\"#0000ff\""));
}

#[tokio::test]
async fn unknown_tool_becomes_an_observation() {
    let session = TurtleSession::default();
    let provider = ScriptedProvider::new([code("draw_star(5)")]);
    let mut agent = Agent::new(provider, AgentConfig::turtle());

    let outcome = agent.run(session.tools(), "draw a star").await.unwrap();
    assert_eq!(outcome.summary(), Some("Error: unknown tool 'draw_star'"));
    assert!(session.snapshot().segments().is_empty());
}
