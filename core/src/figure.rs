//! Render functions that turn a (filtered) data frame into a JSON artifact.
//!
//! Figures follow the plotly document shape `{"data": [...], "layout": {...}}`
//! so that any front end able to draw plotly JSON can consume them. Nothing in
//! this crate draws them.

use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::data::{DataFrame, Scalar};
use crate::{Result, TrellisError};

/// Keyword arguments passed to a render function
pub type Kwargs = BTreeMap<String, Value>;

type RenderFn = dyn Fn(&DataFrame, &Kwargs) -> Result<Value> + Send + Sync;

/// A named render function with default keyword arguments.
///
/// Parameters override entries of `defaults` at resolution time; only
/// arguments present in `defaults` can be targeted.
#[derive(Clone)]
pub struct FigureFn {
    name: String,
    defaults: Kwargs,
    render: Arc<RenderFn>,
}

impl FigureFn {
    pub fn new<F>(name: impl Into<String>, render: F) -> Self
    where
        F: Fn(&DataFrame, &Kwargs) -> Result<Value> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            defaults: Kwargs::new(),
            render: Arc::new(render),
        }
    }

    pub fn arg(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.defaults.insert(key.into(), value.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn defaults(&self) -> &Kwargs {
        &self.defaults
    }

    pub fn accepts(&self, arg: &str) -> bool {
        self.defaults.contains_key(arg)
    }

    /// Render with defaults overlaid by `overrides`
    pub fn call(&self, frame: &DataFrame, overrides: &Kwargs) -> Result<Value> {
        let mut kwargs = self.defaults.clone();
        for (k, v) in overrides {
            kwargs.insert(k.clone(), v.clone());
        }
        (self.render)(frame, &kwargs)
    }
}

impl fmt::Debug for FigureFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FigureFn")
            .field("name", &self.name)
            .field("defaults", &self.defaults)
            .finish()
    }
}

/// Bar chart; `color` splits traces by the values of another column
pub fn bar(x: &str, y: &str) -> FigureFn {
    FigureFn::new("bar", |df, kw| xy_figure("bar", df, kw))
        .arg("x", x)
        .arg("y", y)
        .arg("color", Value::Null)
        .arg("title", Value::Null)
}

pub fn line(x: &str, y: &str) -> FigureFn {
    FigureFn::new("line", |df, kw| xy_figure("scatter", df, kw).map(with_mode("lines")))
        .arg("x", x)
        .arg("y", y)
        .arg("color", Value::Null)
        .arg("title", Value::Null)
}

pub fn scatter(x: &str, y: &str) -> FigureFn {
    FigureFn::new("scatter", |df, kw| {
        xy_figure("scatter", df, kw).map(with_mode("markers"))
    })
    .arg("x", x)
    .arg("y", y)
    .arg("color", Value::Null)
    .arg("title", Value::Null)
}

/// Table rows; `columns` restricts and orders the emitted columns
pub fn table() -> FigureFn {
    FigureFn::new("table", |df, kw| {
        let columns: Vec<String> = match kw.get("columns") {
            Some(Value::Array(cols)) => cols
                .iter()
                .filter_map(|c| c.as_str().map(str::to_string))
                .collect(),
            _ => df.column_names().into_iter().map(str::to_string).collect(),
        };
        for c in &columns {
            if !df.has_column(c) {
                return Err(TrellisError::Render(format!("table column `{}` not found", c)));
            }
        }
        let records: Vec<Value> = df
            .to_records()
            .into_iter()
            .map(|mut r| {
                if let Value::Object(obj) = &mut r {
                    obj.retain(|k, _| columns.iter().any(|c| c == k));
                }
                r
            })
            .collect();
        Ok(json!({ "columns": columns, "rows": records }))
    })
    .arg("columns", Value::Null)
}

/// Empty figure carrying a centred annotation
pub fn placeholder_figure(text: &str) -> Value {
    json!({
        "data": [],
        "layout": {
            "xaxis": { "visible": false },
            "yaxis": { "visible": false },
            "annotations": [{ "text": text, "showarrow": false }]
        }
    })
}

fn with_mode(mode: &'static str) -> impl Fn(Value) -> Value {
    move |mut fig| {
        if let Some(traces) = fig.get_mut("data").and_then(Value::as_array_mut) {
            for t in traces {
                t["mode"] = Value::from(mode);
            }
        }
        fig
    }
}

fn str_arg<'a>(kw: &'a Kwargs, key: &str) -> Option<&'a str> {
    kw.get(key).and_then(Value::as_str)
}

fn xy_figure(trace_type: &str, df: &DataFrame, kw: &Kwargs) -> Result<Value> {
    let x = str_arg(kw, "x").ok_or_else(|| TrellisError::Render("missing `x` argument".into()))?;
    let y = str_arg(kw, "y").ok_or_else(|| TrellisError::Render("missing `y` argument".into()))?;
    let x_col = df
        .column(x)
        .ok_or_else(|| TrellisError::Render(format!("column `{}` not found", x)))?;
    let y_col = df
        .column(y)
        .ok_or_else(|| TrellisError::Render(format!("column `{}` not found", y)))?;

    let traces = match str_arg(kw, "color") {
        Some(color) => {
            let c_col = df
                .column(color)
                .ok_or_else(|| TrellisError::Render(format!("column `{}` not found", color)))?;
            c_col
                .unique()
                .into_iter()
                .map(|group| {
                    let rows: Vec<usize> = c_col
                        .values()
                        .iter()
                        .enumerate()
                        .filter(|(_, v)| *v == &group)
                        .map(|(i, _)| i)
                        .collect();
                    json!({
                        "type": trace_type,
                        "name": group.to_string(),
                        "x": pick(x_col.values(), &rows),
                        "y": pick(y_col.values(), &rows),
                    })
                })
                .collect::<Vec<_>>()
        }
        None => vec![json!({
            "type": trace_type,
            "x": x_col.values().iter().map(Scalar::to_json).collect::<Vec<_>>(),
            "y": y_col.values().iter().map(Scalar::to_json).collect::<Vec<_>>(),
        })],
    };

    let mut layout = json!({ "xaxis": { "title": x }, "yaxis": { "title": y } });
    if let Some(title) = str_arg(kw, "title") {
        layout["title"] = json!({ "text": title });
    }
    Ok(json!({ "data": traces, "layout": layout }))
}

fn pick(values: &[Scalar], rows: &[usize]) -> Vec<Value> {
    rows.iter().map(|i| values[*i].to_json()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> DataFrame {
        DataFrame::from_rows(
            &["continent", "year", "pop"],
            vec![
                vec!["Asia".into(), 2007.into(), 10.into()],
                vec!["Europe".into(), 2007.into(), 5.into()],
                vec!["Asia".into(), 2002.into(), 8.into()],
            ],
        )
        .unwrap()
    }

    #[test]
    fn overrides_replace_defaults() {
        let fig = bar("year", "pop");
        let mut kw = Kwargs::new();
        kw.insert("x".into(), "continent".into());
        let out = fig.call(&frame(), &kw).unwrap();
        assert_eq!(out["data"][0]["x"][0], "Asia");
        assert_eq!(out["layout"]["xaxis"]["title"], "continent");
    }

    #[test]
    fn color_splits_traces() {
        let fig = scatter("year", "pop").arg("color", "continent");
        let out = fig.call(&frame(), &Kwargs::new()).unwrap();
        let traces = out["data"].as_array().unwrap();
        assert_eq!(traces.len(), 2);
        assert_eq!(traces[0]["name"], "Asia");
        assert_eq!(traces[0]["mode"], "markers");
        assert_eq!(traces[0]["y"], json!([10, 8]));
    }

    #[test]
    fn table_restricts_columns() {
        let fig = table().arg("columns", json!(["pop"]));
        let out = fig.call(&frame(), &Kwargs::new()).unwrap();
        assert_eq!(out["rows"][0], json!({ "pop": 10 }));
    }
}
