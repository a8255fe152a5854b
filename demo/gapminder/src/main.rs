mod config;

use config::GapminderConfig;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};
use trellis_core::figure;
use trellis_core::telemetry::init_tracing;
use trellis_core::{
    Action, Binding, Component, Control, ControlState, Dashboard, DataFrame, Delivery,
    Dispatcher, EngineConfig, PageSpec, Selector, UiEvent, ViewState,
};

const BUNDLED_CSV: &str = include_str!("../data/gapminder.csv");

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logging / tracing
    init_tracing(&EngineConfig::default());

    info!(target: "gapminder", "Starting Gapminder explorer demo");

    // Load configuration (defaults + env + optional TOML overlay)
    let cfg = GapminderConfig::load();

    let dashboard = build_dashboard(&cfg)?;
    let executor = Arc::new(dashboard.executor_with(&cfg.engine));
    let dispatcher = Dispatcher::new(Arc::clone(&executor), cfg.engine.max_concurrent_dispatches);
    let view = ViewState::new();
    let mut state = ControlState::new();

    for event in load_script(&cfg)? {
        // The UI layer keeps the selection of every control
        if dashboard.registry().is_control(&event.component_id) {
            state.set(event.component_id.clone(), event.value.clone());
        }
        let delivery = dispatcher.submit(event, state.clone()).await?;
        view.apply(&delivery);
        print_delivery(&delivery, cfg.verbose);
    }

    let stats = executor.stats();
    info!(
        target: "gapminder",
        dispatched = stats.dispatched,
        failed = stats.failed,
        empty_results = stats.empty_results,
        outputs = view.len(),
        "Script finished"
    );
    Ok(())
}

fn build_dashboard(cfg: &GapminderConfig) -> trellis_core::Result<Dashboard> {
    let data_path = cfg.data_path.clone();
    let explorer = PageSpec::new("explorer")
        .title("Gapminder explorer")
        .component(Component::graph(
            "life_chart",
            "gapminder",
            figure::scatter("gdpPercap", "lifeExp")
                .arg("color", "continent")
                .arg("title", "Life expectancy vs. GDP per capita"),
        ))
        .component(Component::graph(
            "pop_chart",
            "gapminder",
            figure::bar("country", "pop").arg("title", "Population"),
        ))
        .component(Component::table_with(
            "country_table",
            "gapminder",
            figure::table().arg("columns", json!(["country", "continent", "year", "lifeExp"])),
        ))
        .component(Component::card("summary", "Select a continent"))
        .component(Component::download("download"))
        .control(Control::filter("continent_filter", "continent", Selector::dropdown()))
        .control(Control::filter("year_range", "year", Selector::range_slider()))
        .control(Control::parameter(
            "y_param",
            ["pop_chart.y"],
            Selector::radio_items().with_options(["pop", "gdpPercap", "lifeExp"]),
        ));

    Dashboard::builder()
        .data_source("gapminder", move || {
            let frame = match &data_path {
                Some(path) => DataFrame::from_csv_path(path)?,
                None => DataFrame::from_csv_reader(BUNDLED_CSV.as_bytes())?,
            };
            Ok(frame)
        })
        .page(explorer)
        .on(Binding::new("continent_filter", "value"), summary_action("summary_on_continent")?)
        .on(Binding::new("year_range", "value"), summary_action("summary_on_year")?)
        .on(
            Binding::new("download", "n_clicks"),
            Action::export_data("export_table", "download", ["country_table"]),
        )
        .build()
}

/// Row count and mean life expectancy of the table's current rows
fn summary_action(id: &str) -> trellis_core::Result<Action> {
    Action::custom(id, |ctx| {
        let frame = ctx.filtered("country_table")?;
        let life: Vec<f64> = frame
            .column("lifeExp")
            .map(|c| c.values().iter().filter_map(|v| v.as_f64()).collect())
            .unwrap_or_default();
        let text = if life.is_empty() {
            "No countries match the selection".to_string()
        } else {
            format!(
                "{} rows, mean life expectancy {:.1}",
                frame.num_rows(),
                life.iter().sum::<f64>() / life.len() as f64
            )
        };
        Ok(vec![Value::String(text)])
    })
    .with_outputs(["summary.children"])
}

fn load_script(cfg: &GapminderConfig) -> Result<Vec<UiEvent>, Box<dyn std::error::Error>> {
    let Some(path) = &cfg.script_path else {
        return Ok(vec![
            UiEvent::page_load("explorer"),
            UiEvent::control("continent_filter", json!(["Asia", "Europe"])),
            UiEvent::control("year_range", json!([2002, 2007])),
            UiEvent::control("y_param", json!("gdpPercap")),
            UiEvent::control("continent_filter", json!(["Antarctica"])),
            UiEvent::control("continent_filter", json!("ALL")),
            UiEvent::new("download", "n_clicks", json!(1)),
        ]);
    };

    let raw = std::fs::read_to_string(path)?;
    let mut events = Vec::new();
    for (n, line) in raw.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match serde_json::from_str::<UiEvent>(line) {
            Ok(event) => events.push(event),
            Err(e) => {
                warn!(target: "gapminder", line = n + 1, error = %e, "Skipping malformed event")
            }
        }
    }
    Ok(events)
}

fn print_delivery(delivery: &Delivery, verbose: bool) {
    println!("== {} (generation {})", delivery.source, delivery.generation);
    if let Some(error) = &delivery.error {
        println!("   error: {}", error);
    }
    for (key, value) in &delivery.outputs {
        if verbose {
            println!(
                "   {} = {}",
                key,
                serde_json::to_string_pretty(value).unwrap_or_default()
            );
        } else {
            println!("   {} = {}", key, describe(value));
        }
    }
}

fn describe(value: &Value) -> String {
    if let Some(message) = value.pointer("/error/message").and_then(Value::as_str) {
        return format!("error: {}", message);
    }
    if let Some(text) = value.as_str() {
        return text.to_string();
    }
    if let Some(files) = value.get("files").and_then(Value::as_array) {
        let names: Vec<&str> = files
            .iter()
            .filter_map(|f| f.get("filename").and_then(Value::as_str))
            .collect();
        return format!("download {}", names.join(", "));
    }
    if let Some(rows) = value.get("rows").and_then(Value::as_array) {
        return format!("table with {} rows", rows.len());
    }
    if let Some(traces) = value.get("data").and_then(Value::as_array) {
        if traces.is_empty() {
            let note = value
                .pointer("/layout/annotations/0/text")
                .and_then(Value::as_str)
                .unwrap_or("");
            return format!("placeholder figure ({})", note);
        }
        let points: usize = traces
            .iter()
            .filter_map(|t| t.get("x").and_then(Value::as_array).map(Vec::len))
            .sum();
        return format!("figure with {} traces, {} points", traces.len(), points);
    }
    value.to_string()
}
