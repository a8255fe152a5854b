use crate::figure::{self, FigureFn};
use crate::model::Binding;

/// What a component renders and where its artifact comes from
#[derive(Debug, Clone)]
pub enum ComponentKind {
    Graph { data_source: String, figure: FigureFn },
    Table { data_source: String, figure: FigureFn },
    Card { text: String },
    /// File download sink for export actions
    Download,
}

/// A dashboard component; the id is immutable once registered
#[derive(Debug, Clone)]
pub struct Component {
    id: String,
    kind: ComponentKind,
}

impl Component {
    pub fn new(id: impl Into<String>, kind: ComponentKind) -> Self {
        Self {
            id: id.into(),
            kind,
        }
    }

    pub fn graph(id: impl Into<String>, data_source: impl Into<String>, figure: FigureFn) -> Self {
        Self::new(
            id,
            ComponentKind::Graph {
                data_source: data_source.into(),
                figure,
            },
        )
    }

    /// Table over every column of the data source
    pub fn table(id: impl Into<String>, data_source: impl Into<String>) -> Self {
        Self::table_with(id, data_source, figure::table())
    }

    pub fn table_with(
        id: impl Into<String>,
        data_source: impl Into<String>,
        figure: FigureFn,
    ) -> Self {
        Self::new(
            id,
            ComponentKind::Table {
                data_source: data_source.into(),
                figure,
            },
        )
    }

    pub fn card(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(id, ComponentKind::Card { text: text.into() })
    }

    pub fn download(id: impl Into<String>) -> Self {
        Self::new(id, ComponentKind::Download)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> &ComponentKind {
        &self.kind
    }

    /// The property updated when this component is recomputed
    pub fn output_property(&self) -> &'static str {
        match self.kind {
            ComponentKind::Graph { .. } => "figure",
            ComponentKind::Table { .. } => "data",
            ComponentKind::Card { .. } => "children",
            ComponentKind::Download => "data",
        }
    }

    pub fn output_binding(&self) -> Binding {
        Binding::new(self.id.clone(), self.output_property())
    }

    pub fn data_source(&self) -> Option<&str> {
        match &self.kind {
            ComponentKind::Graph { data_source, .. } | ComponentKind::Table { data_source, .. } => {
                Some(data_source)
            }
            _ => None,
        }
    }

    pub fn figure(&self) -> Option<&FigureFn> {
        match &self.kind {
            ComponentKind::Graph { figure, .. } | ComponentKind::Table { figure, .. } => {
                Some(figure)
            }
            _ => None,
        }
    }

    /// Whether the component is recomputed from data by controls
    pub fn is_data_bound(&self) -> bool {
        self.data_source().is_some()
    }
}
