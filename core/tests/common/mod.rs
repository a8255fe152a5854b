#![allow(dead_code)]

use serde_json::json;
use trellis_core::figure;
use trellis_core::{
    Action, Binding, Component, Control, Dashboard, DashboardBuilder, DataFrame, PageSpec, Scalar,
    Selector,
};

pub const GAPMINDER_CSV: &str = "\
country,continent,year,lifeExp,pop,gdpPercap
China,Asia,2002,72.028,1280400000,3119.28
China,Asia,2007,72.961,1318683096,4959.11
India,Asia,2002,62.879,1034172547,1746.77
India,Asia,2007,64.698,1110396331,2452.21
Japan,Asia,2007,82.603,127467972,31656.07
Germany,Europe,2002,78.67,82350671,30035.8
Germany,Europe,2007,79.406,82400996,32170.37
France,Europe,2007,80.657,61083916,30470.02
Nigeria,Africa,2007,46.859,135031164,2013.98
Egypt,Africa,2007,71.338,80264543,5581.18
Brazil,Americas,2007,72.39,190010647,9065.8
United States,Americas,2007,78.242,301139947,42951.65
";

pub fn gapminder() -> DataFrame {
    DataFrame::from_csv_reader(GAPMINDER_CSV.as_bytes()).expect("fixture csv parses")
}

pub fn rows_where(frame: &DataFrame, column: &str, value: &str) -> usize {
    frame
        .column(column)
        .unwrap()
        .values()
        .iter()
        .filter(|v| **v == Scalar::from(value))
        .count()
}

/// One page: `chart_a` (bar over gapminder), `card_b`, `table_c`, `dl`,
/// a continent filter on `chart_a` and an x-axis parameter
pub fn overview_page() -> PageSpec {
    PageSpec::new("overview")
        .title("Overview")
        .component(Component::graph(
            "chart_a",
            "gapminder",
            figure::bar("country", "pop"),
        ))
        .component(Component::card("card_b", "Select a continent"))
        .component(Component::table("table_c", "gapminder"))
        .component(Component::download("dl"))
        .control(
            Control::filter("continent_filter", "continent", Selector::dropdown())
                .with_targets(["chart_a"]),
        )
        .control(Control::parameter(
            "x_param",
            ["chart_a.x"],
            Selector::radio_items().with_options(["country", "continent"]),
        ))
}

pub fn count_rows_action() -> Action {
    Action::custom("count_rows", |ctx| {
        let frame = ctx.filtered("chart_a")?;
        Ok(vec![json!(format!("{} rows", frame.num_rows()))])
    })
    .with_outputs(["card_b.children"])
    .expect("valid outputs")
}

pub fn builder() -> DashboardBuilder {
    Dashboard::builder()
        .data_frame("gapminder", gapminder())
        .page(overview_page())
}

/// Overview dashboard whose filter chain ends with the row-count card
pub fn dashboard() -> Dashboard {
    builder()
        .on(Binding::new("continent_filter", "value"), count_rows_action())
        .build()
        .expect("fixture dashboard builds")
}
