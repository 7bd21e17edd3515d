use crate::types::{AttributePath, DynamicValue};
use std::collections::BTreeMap;

/// One managed resource instance as tracked between steps
#[derive(Debug, Clone)]
pub struct ResourceState {
    pub type_name: String,
    pub name: String,
    pub attributes: DynamicValue,
}

impl ResourceState {
    pub fn address(&self) -> String {
        format!("{}.{}", self.type_name, self.name)
    }

    /// The `id` attribute, the handle used for import and destroy checks
    pub fn id(&self) -> Option<String> {
        self.attributes
            .get_optional_string(&AttributePath::new("id"))
            .ok()
            .flatten()
    }

    pub fn flatten(&self) -> BTreeMap<String, String> {
        self.attributes.flatten()
    }
}

/// Tracked state, in the order resources were created
#[derive(Debug, Clone, Default)]
pub struct State {
    resources: Vec<ResourceState>,
}

impl State {
    pub fn resources(&self) -> &[ResourceState] {
        &self.resources
    }

    pub fn resource(&self, address: &str) -> Option<&ResourceState> {
        self.resources.iter().find(|r| r.address() == address)
    }

    pub fn resources_of_type<'a>(
        &'a self,
        type_name: &'a str,
    ) -> impl Iterator<Item = &'a ResourceState> + 'a {
        self.resources.iter().filter(move |r| r.type_name == type_name)
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Replace in place when the address is tracked, append otherwise
    pub fn upsert(&mut self, resource: ResourceState) {
        let address = resource.address();
        match self.resources.iter_mut().find(|r| r.address() == address) {
            Some(existing) => *existing = resource,
            None => self.resources.push(resource),
        }
    }

    pub fn remove(&mut self, address: &str) -> Option<ResourceState> {
        let idx = self.resources.iter().position(|r| r.address() == address)?;
        Some(self.resources.remove(idx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Dynamic;

    fn resource(name: &str, id: &str) -> ResourceState {
        ResourceState {
            type_name: "aws_sns_application".to_string(),
            name: name.to_string(),
            attributes: DynamicValue::new(Dynamic::from(serde_json::json!({"id": id}))),
        }
    }

    #[test]
    fn upsert_keeps_creation_order() {
        let mut state = State::default();
        state.upsert(resource("a", "1"));
        state.upsert(resource("b", "2"));
        state.upsert(resource("a", "3"));

        let ids: Vec<_> = state.resources().iter().filter_map(|r| r.id()).collect();
        assert_eq!(ids, vec!["3", "2"]);
    }

    #[test]
    fn remove_returns_tracked_resource() {
        let mut state = State::default();
        state.upsert(resource("a", "1"));

        assert!(state.remove("aws_sns_application.b").is_none());
        let removed = state.remove("aws_sns_application.a").unwrap();
        assert_eq!(removed.id().as_deref(), Some("1"));
        assert!(state.is_empty());
    }
}
