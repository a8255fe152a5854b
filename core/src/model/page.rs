/// A registered page: ids of the components and controls it owns
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    id: String,
    title: String,
    components: Vec<String>,
    controls: Vec<String>,
}

impl Page {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        components: Vec<String>,
        controls: Vec<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            components,
            controls,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn components(&self) -> &[String] {
        &self.components
    }

    pub fn controls(&self) -> &[String] {
        &self.controls
    }

    pub fn contains(&self, id: &str) -> bool {
        self.components.iter().any(|c| c == id) || self.controls.iter().any(|c| c == id)
    }
}
