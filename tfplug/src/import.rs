//! Import helpers for simplifying resource import implementations

use crate::resource::{ImportResourceStateRequest, ImportResourceStateResponse, ImportedResource};
use crate::types::{AttributePath, Diagnostic, DynamicValue};

/// Copies the import ID into each of the given attributes of a fresh state
///
/// This is the whole import for resources whose ID is enough for a read to
/// recover everything else, e.g. an ARN-identified object:
/// ID "arn:...:app/GCM/x" -> state.id = state.arn = "arn:...:app/GCM/x"
pub fn import_state_passthrough_id(
    attr_paths: &[AttributePath],
    request: &ImportResourceStateRequest,
) -> ImportResourceStateResponse {
    let mut response = ImportResourceStateResponse {
        imported_resources: vec![],
        diagnostics: vec![],
    };

    if request.id.is_empty() {
        response.diagnostics.push(Diagnostic::error(
            "Missing import ID",
            format!("an ID is required to import {}", request.type_name),
        ));
        return response;
    }

    let mut state = DynamicValue::object();
    for path in attr_paths {
        if let Err(e) = state.set_string(path, request.id.clone()) {
            response.diagnostics.push(
                Diagnostic::error(
                    format!("Failed to set import ID: {}", e),
                    format!("Could not set attribute '{}' to '{}'", path, request.id),
                )
                .with_attribute(path.clone()),
            );
            return response;
        }
    }

    response.imported_resources.push(ImportedResource {
        type_name: request.type_name.clone(),
        state,
    });
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(id: &str) -> ImportResourceStateRequest {
        ImportResourceStateRequest {
            type_name: "test_resource".to_string(),
            id: id.to_string(),
        }
    }

    #[test]
    fn passthrough_sets_every_path() {
        let response = import_state_passthrough_id(
            &[AttributePath::new("id"), AttributePath::new("arn")],
            &request("arn:aws:sns:us-east-1:123:app/GCM/x"),
        );

        assert!(response.diagnostics.is_empty());
        assert_eq!(response.imported_resources.len(), 1);
        let state = &response.imported_resources[0].state;
        assert_eq!(
            state.get_string(&AttributePath::new("id")).unwrap(),
            "arn:aws:sns:us-east-1:123:app/GCM/x"
        );
        assert_eq!(
            state.get_string(&AttributePath::new("arn")).unwrap(),
            "arn:aws:sns:us-east-1:123:app/GCM/x"
        );
    }

    #[test]
    fn passthrough_rejects_empty_id() {
        let response = import_state_passthrough_id(&[AttributePath::new("id")], &request(""));
        assert!(response.imported_resources.is_empty());
        assert_eq!(response.diagnostics[0].summary, "Missing import ID");
    }
}
