use serde_json::json;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use trellis_core::{
    Action, Binding, Component, ControlState, Dashboard, Dispatcher, Freshness, PageSpec, Result,
    UiEvent, ViewState,
};

mod common;

/// Custom action writing `card_b.children`; sleeps for the number of
/// milliseconds found under `delay_ms` in the event value
fn delayed_card(id: &str, label: &'static str) -> Action {
    Action::custom(id, move |ctx| {
        let delay = ctx.event().value.get("delay_ms").and_then(|v| v.as_u64()).unwrap_or(0);
        thread::sleep(Duration::from_millis(delay));
        Ok(vec![json!(format!("{label} after {delay}ms"))])
    })
    .with_outputs(["card_b.children"])
    .expect("valid outputs")
}

fn card_dashboard() -> Result<Dashboard> {
    Dashboard::builder()
        .data_frame("gapminder", common::gapminder())
        .page(
            PageSpec::new("overview")
                .component(Component::card("card_b", ""))
                .component(Component::card("echo", "")),
        )
        .on(Binding::new("echo", "children"), delayed_card("echo_card", "echo"))
        .on(Binding::new("overview", "load"), delayed_card("load_card", "load"))
        .build()
}

#[tokio::test]
async fn superseded_result_is_delivered_stale() -> Result<()> {
    let dashboard = card_dashboard()?;
    let dispatcher = Arc::new(Dispatcher::new(Arc::new(dashboard.executor()), 4));
    let view = ViewState::new();

    let slow_dispatcher = Arc::clone(&dispatcher);
    let slow = tokio::spawn(async move {
        slow_dispatcher
            .submit(
                UiEvent::new("echo", "children", json!({ "delay_ms": 300 })),
                ControlState::new(),
            )
            .await
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    let fast = dispatcher
        .submit(
            UiEvent::new("echo", "children", json!({ "delay_ms": 0 })),
            ControlState::new(),
        )
        .await?;
    assert_eq!(fast.generation, 2);
    assert!(fast.is_fresh());
    view.apply(&fast);

    let slow = slow.await.expect("dispatch task panicked")?;
    assert_eq!(slow.generation, 1);
    assert_eq!(slow.freshness, Freshness::Stale { superseded_by: 2 });
    assert_eq!(view.apply(&slow), 0);

    assert_eq!(view.get("card_b.children"), Some(json!("echo after 0ms")));
    assert_eq!(dispatcher.latest_generation(&Binding::new("echo", "children")), 2);
    Ok(())
}

#[tokio::test]
async fn last_completed_trigger_wins_shared_output() -> Result<()> {
    let dashboard = card_dashboard()?;
    let dispatcher = Arc::new(Dispatcher::new(Arc::new(dashboard.executor()), 4));
    let view = ViewState::new();

    let slow_dispatcher = Arc::clone(&dispatcher);
    let slow = tokio::spawn(async move {
        slow_dispatcher
            .submit(
                UiEvent::new("overview", "load", json!({ "delay_ms": 200 })),
                ControlState::new(),
            )
            .await
    });
    tokio::time::sleep(Duration::from_millis(20)).await;

    let fast = dispatcher
        .submit(
            UiEvent::new("echo", "children", json!({ "delay_ms": 0 })),
            ControlState::new(),
        )
        .await?;
    view.apply(&fast);
    assert_eq!(view.writer("card_b.children"), Some(Binding::new("echo", "children")));

    // Different sources never mark each other stale
    let slow = slow.await.expect("dispatch task panicked")?;
    assert!(slow.is_fresh());
    view.apply(&slow);

    assert_eq!(view.get("card_b.children"), Some(json!("load after 200ms")));
    assert_eq!(view.writer("card_b.children"), Some(Binding::new("overview", "load")));
    Ok(())
}

#[tokio::test]
async fn failures_arrive_as_error_payloads() -> Result<()> {
    let dashboard = common::dashboard();
    let dispatcher = Dispatcher::new(Arc::new(dashboard.executor()), 1);

    let delivery = dispatcher
        .submit(UiEvent::control("ghost", json!("x")), ControlState::new())
        .await?;

    assert!(delivery.is_fresh());
    assert!(delivery.error.as_deref().unwrap_or_default().contains("ghost"));
    assert!(delivery.outputs["ghost.value"]["error"].is_object());
    Ok(())
}

#[tokio::test]
async fn sequential_submissions_are_all_fresh() -> Result<()> {
    let dashboard = common::dashboard();
    let dispatcher = Dispatcher::new(Arc::new(dashboard.executor()), 1);
    let view = ViewState::new();

    for continent in ["Asia", "Europe", "Americas"] {
        let delivery = dispatcher
            .submit(
                UiEvent::control("continent_filter", json!([continent])),
                ControlState::new(),
            )
            .await?;
        assert!(delivery.is_fresh());
        assert_eq!(view.apply(&delivery), 2);
    }

    assert_eq!(view.len(), 2);
    assert_eq!(view.get("card_b.children"), Some(json!("2 rows")));
    assert_eq!(dispatcher.executor().stats().dispatched, 3);
    Ok(())
}
